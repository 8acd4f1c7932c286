use pretty_assertions::assert_eq;
use sakinah_crypto::KdfParams;
use sakinah_model::{JournalEntry, MoodEntry, MoodLevel, VaultRecord};
use sakinah_storage::RecordStore;
use sakinah_vault::{ExportBundle, ImportExportService, SecureVault, TransferError, APP_NAME};

fn vault() -> SecureVault {
    SecureVault::new(RecordStore::open_in_memory().unwrap(), KdfParams::fast_for_tests())
}

fn seeded() -> (SecureVault, VaultRecord) {
    let v = vault();
    v.create_profile("amir").unwrap();
    let mut record = VaultRecord::new("amir");
    record
        .mood_entries
        .push(MoodEntry::new(MoodLevel::Good, 4, 2, 7.0).with_notes("felt productive"));
    record.mood_entries.push(MoodEntry::new(MoodLevel::Low, 2, 4, 5.0));
    let mut page = JournalEntry::new("dear diary");
    page.title = Some("private".into());
    page.is_private = true;
    record.journal_entries.push(page);
    record.sort_entries();
    v.save_user_data(&record, "correcthorse").unwrap();
    (v, record)
}

#[test]
fn export_import_into_fresh_store_under_new_passphrase() {
    let (v, _) = seeded();
    let before = v.load_user_data("amir", "correcthorse").unwrap().unwrap();
    let bundle = ImportExportService::new(v)
        .export_data("amir", "correcthorse", true)
        .unwrap();
    assert!(bundle.encrypted);
    assert!(!bundle.data.contains("felt productive"));
    let text = bundle.to_json().unwrap();

    let fresh = vault();
    let service = ImportExportService::new(fresh.clone());
    service
        .import_data(&text, "correcthorse", "amir", "correcthorse2", false)
        .unwrap();

    let after = fresh.load_user_data("amir", "correcthorse2").unwrap().unwrap();
    assert_eq!(after.mood_entries, before.mood_entries);
    assert_eq!(after.journal_entries, before.journal_entries);
    assert!(fresh.load_user_data("amir", "correcthorse").unwrap().is_none());
    assert!(fresh.profile("amir").unwrap().is_some());
}

#[test]
fn plain_export_is_readable_json() {
    let (v, record) = seeded();
    let bundle = ImportExportService::new(v)
        .export_data("amir", "correcthorse", false)
        .unwrap();
    assert!(!bundle.encrypted);
    let inner: VaultRecord = serde_json::from_str(&bundle.data).unwrap();
    assert_eq!(inner, record);

    let json: serde_json::Value = serde_json::from_str(&bundle.to_json().unwrap()).unwrap();
    assert_eq!(json["version"], "1.0.0");
    assert_eq!(json["appName"], APP_NAME);
    assert_eq!(json["encrypted"], false);
}

#[test]
fn export_with_wrong_passphrase_fails() {
    let (v, _) = seeded();
    assert!(matches!(
        ImportExportService::new(v).export_data("amir", "incorrect", true),
        Err(TransferError::WrongPassphrase)
    ));
}

#[test]
fn import_with_wrong_passphrase_is_decryption_failure() {
    let (v, _) = seeded();
    let text = ImportExportService::new(v)
        .export_data("amir", "correcthorse", true)
        .unwrap()
        .to_json()
        .unwrap();
    let err = ImportExportService::new(vault())
        .import_data(&text, "wrongpass", "amir", "correcthorse", false)
        .unwrap_err();
    assert!(matches!(err, TransferError::DecryptionFailed));
}

#[test]
fn import_refuses_existing_user_without_overwrite() {
    let (v, _) = seeded();
    let service = ImportExportService::new(v.clone());
    let text = service
        .export_data("amir", "correcthorse", false)
        .unwrap()
        .to_json()
        .unwrap();
    assert!(matches!(
        service.import_data(&text, "", "amir", "correcthorse", false),
        Err(TransferError::DuplicateUser(_))
    ));
}

#[test]
fn overwrite_replaces_rows_atomically() {
    let (v, _) = seeded();
    let service = ImportExportService::new(v.clone());

    let mut smaller = VaultRecord::new("someone-else");
    smaller
        .mood_entries
        .push(MoodEntry::new(MoodLevel::Excellent, 5, 1, 8.0).with_notes("imported"));
    let bundle = ExportBundle {
        version: "1.0.0".into(),
        timestamp: chrono::Utc::now(),
        app_name: APP_NAME.into(),
        encrypted: false,
        data: serde_json::to_string(&smaller).unwrap(),
    };

    let imported = service
        .import_data(&bundle.to_json().unwrap(), "", "amir", "newpassphrase", true)
        .unwrap();
    assert_eq!(imported.user.username, "amir");

    let loaded = v.load_user_data("amir", "newpassphrase").unwrap().unwrap();
    assert_eq!(loaded.mood_entries, smaller.mood_entries);
    assert!(loaded.journal_entries.is_empty());
    assert_eq!(loaded.user.username, "amir");
}

#[test]
fn import_into_another_profile_leaves_the_exporter_intact() {
    let (v, _) = seeded();
    let before = v.load_user_data("amir", "correcthorse").unwrap().unwrap();
    let service = ImportExportService::new(v.clone());
    let text = service
        .export_data("amir", "correcthorse", true)
        .unwrap()
        .to_json()
        .unwrap();

    v.create_user("sara", "sarapass").unwrap();
    let imported = service
        .import_data(&text, "correcthorse", "sara", "sarapass", true)
        .unwrap();
    for entry in &imported.mood_entries {
        assert!(before.mood_entries.iter().all(|m| m.id != entry.id));
    }

    let amir = v.load_user_data("amir", "correcthorse").unwrap().unwrap();
    assert_eq!(amir, before);
    let sara = v.load_user_data("sara", "sarapass").unwrap().unwrap();
    assert_eq!(sara.mood_entries, imported.mood_entries);
    assert_eq!(sara.journal_entries, imported.journal_entries);
    let notes: Vec<_> = sara.mood_entries.iter().map(|e| e.notes.clone()).collect();
    let expected: Vec<_> = before.mood_entries.iter().map(|e| e.notes.clone()).collect();
    assert_eq!(notes, expected);

    // A second overwrite replaces sara's copies instead of piling up more.
    service
        .import_data(&text, "correcthorse", "sara", "sarapass", true)
        .unwrap();
    let sara = v.load_user_data("sara", "sarapass").unwrap().unwrap();
    assert_eq!(sara.mood_entries.len(), before.mood_entries.len());
    assert_eq!(sara.journal_entries.len(), before.journal_entries.len());
    assert_eq!(v.load_user_data("amir", "correcthorse").unwrap().unwrap(), before);
}

#[test]
fn import_creates_the_missing_profile() {
    let (v, _) = seeded();
    let text = ImportExportService::new(v)
        .export_data("amir", "correcthorse", false)
        .unwrap()
        .to_json()
        .unwrap();

    let fresh = vault();
    ImportExportService::new(fresh.clone())
        .import_data(&text, "", "omar", "omarpass", false)
        .unwrap();
    assert!(fresh.profile("omar").unwrap().is_some());
    assert!(fresh.load_user_data("omar", "omarpass").unwrap().is_some());
}

#[test]
fn import_rejects_bad_payloads() {
    let service = ImportExportService::new(vault());
    let wrap = |data: &str, encrypted: bool| {
        serde_json::json!({
            "version": "1.0.0",
            "timestamp": "2024-01-01T00:00:00Z",
            "appName": APP_NAME,
            "encrypted": encrypted,
            "data": data,
        })
        .to_string()
    };

    assert!(matches!(
        service.import_data(
            &wrap(r#"{"user":{"username":"x"}}"#, false),
            "",
            "amir",
            "correcthorse",
            false
        ),
        Err(TransferError::InvalidUserData(_))
    ));
    assert!(matches!(
        service.import_data(
            &wrap("not an envelope", true),
            "correcthorse",
            "amir",
            "correcthorse",
            false
        ),
        Err(TransferError::DecryptionFailed)
    ));
    assert!(matches!(
        service.import_data("[]", "", "amir", "correcthorse", false),
        Err(TransferError::MissingField("version"))
    ));
}

#[test]
fn import_bundle_demanding_huge_kdf_memory_is_rejected() {
    let (v, _) = seeded();
    let bundle = ImportExportService::new(v)
        .export_data("amir", "correcthorse", true)
        .unwrap();
    let mut envelope: serde_json::Value = serde_json::from_str(&bundle.data).unwrap();
    envelope["kdf"]["memory_kib"] = serde_json::json!(4_000_000_000u64);
    let tampered = ExportBundle {
        data: envelope.to_string(),
        ..bundle
    };

    let err = ImportExportService::new(vault())
        .import_data(&tampered.to_json().unwrap(), "correcthorse", "amir", "correcthorse", false)
        .unwrap_err();
    assert!(matches!(err, TransferError::DecryptionFailed));
}

#[test]
fn foreign_app_name_is_refused() {
    let (v, _) = seeded();
    let text = ImportExportService::with_app_name(v, "Another App")
        .export_data("amir", "correcthorse", false)
        .unwrap()
        .to_json()
        .unwrap();
    assert!(matches!(
        ImportExportService::new(vault()).validate_import_file(&text),
        Err(TransferError::WrongApp { .. })
    ));
}
