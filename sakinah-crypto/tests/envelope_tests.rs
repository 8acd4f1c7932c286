use proptest::prelude::*;
use sakinah_crypto::{
    decrypt_with_passphrase, encrypt_with_passphrase, CipherEnvelope, CryptoContext, CryptoError,
    KdfParams,
};

fn params() -> KdfParams {
    KdfParams::fast_for_tests()
}

#[test]
fn encrypting_twice_yields_different_envelopes() {
    let a = encrypt_with_passphrase(b"same input", "correcthorse", &params()).unwrap();
    let b = encrypt_with_passphrase(b"same input", "correcthorse", &params()).unwrap();

    assert_ne!(a.salt, b.salt);
    assert_ne!(a.encrypted.nonce, b.encrypted.nonce);
    assert_ne!(a.encrypted.ciphertext, b.encrypted.ciphertext);
    assert_ne!(a.encode().unwrap(), b.encode().unwrap());
}

#[test]
fn empty_plaintext_roundtrips() {
    let env = encrypt_with_passphrase(b"", "correcthorse", &params()).unwrap();
    assert!(decrypt_with_passphrase(&env, "correcthorse").unwrap().is_empty());
}

#[test]
fn tampered_salt_fails_authentication() {
    let mut env = encrypt_with_passphrase(b"journal", "correcthorse", &params()).unwrap();
    env.salt[0] ^= 0xFF;
    let err = decrypt_with_passphrase(&env, "correcthorse").unwrap_err();
    assert!(matches!(err, CryptoError::Decryption(_)));
}

#[test]
fn tampered_kdf_params_fail_authentication() {
    let mut env = encrypt_with_passphrase(b"journal", "correcthorse", &params()).unwrap();
    env.kdf = KdfParams::Pbkdf2Sha256 { iterations: 1000 };
    assert!(decrypt_with_passphrase(&env, "correcthorse").is_err());
}

#[test]
fn legacy_pbkdf2_envelope_still_opens() {
    let legacy = KdfParams::Pbkdf2Sha256 { iterations: 1000 };
    let env = encrypt_with_passphrase(b"old notes", "1234", &legacy).unwrap();
    assert!(env.kdf.is_legacy());
    assert_eq!(decrypt_with_passphrase(&env, "1234").unwrap(), b"old notes");
}

#[test]
fn decoded_envelope_with_huge_memory_is_rejected_before_derivation() {
    let env = encrypt_with_passphrase(b"x", "correcthorse", &params()).unwrap();
    let text = env
        .encode()
        .unwrap()
        .replace(r#""memory_kib":8"#, r#""memory_kib":4000000000"#);
    let tampered = CipherEnvelope::decode(&text).unwrap();
    assert!(matches!(
        decrypt_with_passphrase(&tampered, "correcthorse"),
        Err(CryptoError::UnsupportedKdf(_))
    ));
}

#[test]
fn context_and_standalone_are_interchangeable() {
    let mut ctx = CryptoContext::new("correcthorse", params()).unwrap();
    let sealed = ctx.seal_str("from context").unwrap();
    let standalone = encrypt_with_passphrase(b"standalone", "correcthorse", &params()).unwrap();

    assert_eq!(decrypt_with_passphrase(&sealed, "correcthorse").unwrap(), b"from context");
    assert_eq!(ctx.open(&standalone).unwrap(), b"standalone");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn roundtrip_any_plaintext(
        plaintext in proptest::collection::vec(any::<u8>(), 0..512),
        passphrase in "[ -~]{4,24}",
    ) {
        let env = encrypt_with_passphrase(&plaintext, &passphrase, &params()).unwrap();
        prop_assert_eq!(decrypt_with_passphrase(&env, &passphrase).unwrap(), plaintext);
    }

    #[test]
    fn wrong_passphrase_never_decrypts(
        plaintext in proptest::collection::vec(any::<u8>(), 0..256),
        pw1 in "[a-z0-9]{4,16}",
        pw2 in "[a-z0-9]{4,16}",
    ) {
        prop_assume!(pw1 != pw2);
        let env = encrypt_with_passphrase(&plaintext, &pw1, &params()).unwrap();
        let result = decrypt_with_passphrase(&env, &pw2);
        prop_assert!(matches!(result, Err(CryptoError::Decryption(_))));
    }

    #[test]
    fn string_form_survives_roundtrip(plaintext in ".{0,64}") {
        let env = encrypt_with_passphrase(plaintext.as_bytes(), "correcthorse", &params()).unwrap();
        let decoded = CipherEnvelope::decode(&env.encode().unwrap()).unwrap();
        let opened = decrypt_with_passphrase(&decoded, "correcthorse").unwrap();
        prop_assert_eq!(opened, plaintext.as_bytes());
    }
}
