//! Row-level record store.
//!
//! Every collection lives in one `records` table. A row is addressed by
//! `(collection, key)` and carries an opaque JSON document plus two plaintext
//! index columns: `owner` (a username) and `sort_key` (usually the entry date
//! in epoch millis). Encryption happens above this layer; the store never
//! looks inside `data_json`.

use crate::error::{StorageError, StorageResult};
use duckdb::{params, Connection};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Named collections.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Collection {
    Profiles,
    Sessions,
    MoodEntries,
    JournalEntries,
    Settings,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Profiles,
        Collection::Sessions,
        Collection::MoodEntries,
        Collection::JournalEntries,
        Collection::Settings,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Collection::Profiles => "profiles",
            Collection::Sessions => "sessions",
            Collection::MoodEntries => "moodEntries",
            Collection::JournalEntries => "journalEntries",
            Collection::Settings => "settings",
        }
    }
}

/// One stored row.
#[derive(Clone, Debug, PartialEq)]
pub struct Record {
    pub key: String,
    pub owner: Option<String>,
    pub sort_key: i64,
    pub data: serde_json::Value,
    /// Unix millis, set on first insert and kept across updates.
    pub created_at: i64,
    /// Unix millis of the last write.
    pub modified_at: i64,
}

impl Record {
    pub fn new(key: impl Into<String>, data: serde_json::Value) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            key: key.into(),
            owner: None,
            sort_key: 0,
            data,
            created_at: now,
            modified_at: now,
        }
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_sort_key(mut self, sort_key: i64) -> Self {
        self.sort_key = sort_key;
        self
    }
}

#[derive(Clone, Debug)]
enum BatchOp {
    Put(Record),
    Delete,
}

/// A set of puts and deletes committed atomically by [`RecordStore::apply`].
///
/// Operations on the same `(collection, key)` collapse: the last one wins.
#[derive(Clone, Debug, Default)]
pub struct WriteBatch {
    ops: Vec<((Collection, String), BatchOp)>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, collection: Collection, record: Record) -> &mut Self {
        self.ops
            .push(((collection, record.key.clone()), BatchOp::Put(record)));
        self
    }

    pub fn delete(&mut self, collection: Collection, key: impl Into<String>) -> &mut Self {
        self.ops.push(((collection, key.into()), BatchOp::Delete));
        self
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Final operation per key, in first-seen order.
    fn collapse(self) -> Vec<((Collection, String), BatchOp)> {
        let mut order: Vec<(Collection, String)> = Vec::new();
        let mut last: HashMap<(Collection, String), BatchOp> = HashMap::new();
        for (addr, op) in self.ops {
            if last.insert(addr.clone(), op).is_none() {
                order.push(addr);
            }
        }
        order
            .into_iter()
            .filter_map(|addr| last.remove(&addr).map(|op| (addr, op)))
            .collect()
    }
}

/// Storage usage as reported to the UI.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StorageInfo {
    pub used_bytes: u64,
    pub quota_bytes: Option<u64>,
}

/// Record store backed by DuckDB.
#[derive(Clone)]
pub struct RecordStore {
    conn: Arc<Mutex<Connection>>,
    quota_bytes: Option<u64>,
}

impl std::fmt::Debug for RecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordStore")
            .field("quota_bytes", &self.quota_bytes)
            .finish_non_exhaustive()
    }
}

impl RecordStore {
    /// Opens or creates a store at the given path.
    pub fn open(
        path: &Path,
        memory_limit: &str,
        threads: u32,
        quota_bytes: Option<u64>,
    ) -> StorageResult<Self> {
        let conn = crate::open_duckdb_with_wal_recovery(path, memory_limit, threads)?;
        initialize_record_schema(&conn)?;
        tracing::debug!(path = %path.display(), "opened record store");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            quota_bytes,
        })
    }

    /// Opens an in-memory store (for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_record_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            quota_bytes: None,
        })
    }

    /// Same store, with a byte quota on `key + data_json`.
    pub fn with_quota(mut self, quota_bytes: Option<u64>) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Unavailable("record store lock poisoned".into()))
    }

    /// Insert or replace a single row.
    pub fn put(&self, collection: Collection, record: &Record) -> StorageResult<()> {
        let conn = self.lock()?;
        let data_json = serde_json::to_string(&record.data)?;

        if let Some(quota) = self.quota_bytes {
            let used = usage_bytes(&conn)?;
            let existing = row_size(&conn, collection, &record.key)?;
            let projected = used - existing + (record.key.len() + data_json.len()) as u64;
            check_quota(projected, quota)?;
        }

        upsert(&conn, collection, record, &data_json)
    }

    /// Get a single row by key.
    pub fn get(&self, collection: Collection, key: &str) -> StorageResult<Option<Record>> {
        let conn = self.lock()?;
        let result = conn.query_row(
            "SELECT key, owner, sort_key, data_json, created_at, modified_at
             FROM records WHERE collection = ? AND key = ?",
            params![collection.as_str(), key],
            read_row,
        );
        match result {
            Ok(raw) => Ok(Some(raw.into_record()?)),
            Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All rows in a collection, ordered by `sort_key` then key.
    pub fn get_all(&self, collection: Collection) -> StorageResult<Vec<Record>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT key, owner, sort_key, data_json, created_at, modified_at
             FROM records WHERE collection = ?
             ORDER BY sort_key, key",
        )?;
        let rows = stmt
            .query_map(params![collection.as_str()], read_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawRow::into_record).collect()
    }

    /// Rows belonging to `owner`, ordered by `sort_key` then key.
    pub fn get_all_by_owner(
        &self,
        collection: Collection,
        owner: &str,
    ) -> StorageResult<Vec<Record>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT key, owner, sort_key, data_json, created_at, modified_at
             FROM records WHERE collection = ? AND owner = ?
             ORDER BY sort_key, key",
        )?;
        let rows = stmt
            .query_map(params![collection.as_str(), owner], read_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawRow::into_record).collect()
    }

    /// Rows belonging to `owner` with `from <= sort_key <= to`.
    pub fn get_by_owner_between(
        &self,
        collection: Collection,
        owner: &str,
        from: i64,
        to: i64,
    ) -> StorageResult<Vec<Record>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT key, owner, sort_key, data_json, created_at, modified_at
             FROM records WHERE collection = ? AND owner = ? AND sort_key BETWEEN ? AND ?
             ORDER BY sort_key, key",
        )?;
        let rows = stmt
            .query_map(params![collection.as_str(), owner, from, to], read_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RawRow::into_record).collect()
    }

    /// Delete a row. Returns whether it existed.
    pub fn delete(&self, collection: Collection, key: &str) -> StorageResult<bool> {
        let conn = self.lock()?;
        let n = conn.execute(
            "DELETE FROM records WHERE collection = ? AND key = ?",
            params![collection.as_str(), key],
        )?;
        Ok(n > 0)
    }

    /// Delete a row only if it belongs to `owner`. Returns whether it did.
    pub fn delete_owned(
        &self,
        collection: Collection,
        key: &str,
        owner: &str,
    ) -> StorageResult<bool> {
        let conn = self.lock()?;
        let n = conn.execute(
            "DELETE FROM records WHERE collection = ? AND key = ? AND owner = ?",
            params![collection.as_str(), key, owner],
        )?;
        Ok(n > 0)
    }

    /// Delete every row in a collection. Returns the number removed.
    pub fn clear(&self, collection: Collection) -> StorageResult<usize> {
        let conn = self.lock()?;
        let n = conn.execute(
            "DELETE FROM records WHERE collection = ?",
            params![collection.as_str()],
        )?;
        Ok(n)
    }

    /// Delete every row in every collection.
    pub fn clear_all(&self) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM records", [])?;
        Ok(())
    }

    pub fn count(&self, collection: Collection) -> StorageResult<usize> {
        let conn = self.lock()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE collection = ?",
            params![collection.as_str()],
            |row| row.get(0),
        )?;
        Ok(n.max(0) as usize)
    }

    /// Bytes counted against the quota: `key + data_json` summed over all rows.
    pub fn usage_bytes(&self) -> StorageResult<u64> {
        let conn = self.lock()?;
        usage_bytes(&conn)
    }

    pub fn quota_bytes(&self) -> Option<u64> {
        self.quota_bytes
    }

    /// Current usage next to the configured quota.
    pub fn info(&self) -> StorageResult<StorageInfo> {
        Ok(StorageInfo {
            used_bytes: self.usage_bytes()?,
            quota_bytes: self.quota_bytes,
        })
    }

    /// Commit a batch in one transaction. Either every operation lands or none do.
    pub fn apply(&self, batch: WriteBatch) -> StorageResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let ops = batch.collapse();

        let mut encoded = Vec::with_capacity(ops.len());
        for ((collection, key), op) in ops {
            let op = match op {
                BatchOp::Put(record) => {
                    let json = serde_json::to_string(&record.data)?;
                    Some((record, json))
                }
                BatchOp::Delete => None,
            };
            encoded.push((collection, key, op));
        }

        let mut conn = self.lock()?;

        let has_puts = encoded.iter().any(|(_, _, op)| op.is_some());
        if let (Some(quota), true) = (self.quota_bytes, has_puts) {
            let mut projected = usage_bytes(&conn)?;
            for (collection, key, op) in &encoded {
                projected -= row_size(&conn, *collection, key)?;
                if let Some((record, json)) = op {
                    projected += (record.key.len() + json.len()) as u64;
                }
            }
            check_quota(projected, quota)?;
        }

        let tx = conn.transaction()?;
        for (collection, key, op) in &encoded {
            match op {
                Some((record, json)) => upsert(&tx, *collection, record, json)?,
                None => {
                    tx.execute(
                        "DELETE FROM records WHERE collection = ? AND key = ?",
                        params![collection.as_str(), key],
                    )?;
                }
            }
        }
        tx.commit()?;
        tracing::debug!(ops = encoded.len(), "applied write batch");
        Ok(())
    }
}

struct RawRow {
    key: String,
    owner: Option<String>,
    sort_key: i64,
    data_json: String,
    created_at: i64,
    modified_at: i64,
}

impl RawRow {
    fn into_record(self) -> StorageResult<Record> {
        Ok(Record {
            key: self.key,
            owner: self.owner,
            sort_key: self.sort_key,
            data: serde_json::from_str(&self.data_json)?,
            created_at: self.created_at,
            modified_at: self.modified_at,
        })
    }
}

fn read_row(row: &duckdb::Row<'_>) -> duckdb::Result<RawRow> {
    Ok(RawRow {
        key: row.get(0)?,
        owner: row.get(1)?,
        sort_key: row.get(2)?,
        data_json: row.get(3)?,
        created_at: row.get(4)?,
        modified_at: row.get(5)?,
    })
}

fn upsert(
    conn: &Connection,
    collection: Collection,
    record: &Record,
    data_json: &str,
) -> StorageResult<()> {
    // Keep the original creation time across replaces.
    let created_at = match conn.query_row(
        "SELECT created_at FROM records WHERE collection = ? AND key = ?",
        params![collection.as_str(), record.key],
        |row| row.get::<_, i64>(0),
    ) {
        Ok(ts) => ts,
        Err(duckdb::Error::QueryReturnedNoRows) => record.created_at,
        Err(e) => return Err(e.into()),
    };
    let modified_at = chrono::Utc::now().timestamp_millis();

    conn.execute(
        r#"
        INSERT OR REPLACE INTO records (
            collection, key, owner, sort_key, data_json, created_at, modified_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            collection.as_str(),
            record.key,
            record.owner.as_deref(),
            record.sort_key,
            data_json,
            created_at,
            modified_at,
        ],
    )?;
    Ok(())
}

fn usage_bytes(conn: &Connection) -> StorageResult<u64> {
    let used: i64 = conn.query_row(
        "SELECT CAST(COALESCE(SUM(strlen(key) + strlen(data_json)), 0) AS BIGINT) FROM records",
        [],
        |row| row.get(0),
    )?;
    Ok(used.max(0) as u64)
}

fn row_size(conn: &Connection, collection: Collection, key: &str) -> StorageResult<u64> {
    match conn.query_row(
        "SELECT CAST(strlen(key) + strlen(data_json) AS BIGINT) FROM records
         WHERE collection = ? AND key = ?",
        params![collection.as_str(), key],
        |row| row.get::<_, i64>(0),
    ) {
        Ok(n) => Ok(n.max(0) as u64),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Deletes never go through this check, so space can always be freed.
fn check_quota(projected: u64, quota: u64) -> StorageResult<()> {
    if projected > quota {
        tracing::warn!(projected, quota, "write rejected: storage quota exceeded");
        return Err(StorageError::QuotaExceeded {
            used: projected,
            quota,
        });
    }
    Ok(())
}

fn initialize_record_schema(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            collection VARCHAR NOT NULL,
            key VARCHAR NOT NULL,
            owner VARCHAR,
            sort_key BIGINT NOT NULL DEFAULT 0,
            data_json VARCHAR NOT NULL,
            created_at BIGINT NOT NULL,
            modified_at BIGINT NOT NULL,
            PRIMARY KEY (collection, key)
        );
        CREATE INDEX IF NOT EXISTS idx_records_owner ON records(collection, owner, sort_key);
        "#,
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_collapses_to_last_op_per_key() {
        let mut batch = WriteBatch::new();
        batch
            .put(Collection::MoodEntries, Record::new("a", serde_json::json!(1)))
            .delete(Collection::MoodEntries, "a")
            .put(Collection::MoodEntries, Record::new("b", serde_json::json!(2)))
            .put(Collection::JournalEntries, Record::new("a", serde_json::json!(3)));
        let ops = batch.collapse();
        assert_eq!(ops.len(), 3);
        assert!(matches!(ops[0].1, BatchOp::Delete));
        assert_eq!(ops[2].0, (Collection::JournalEntries, "a".to_string()));
    }

    #[test]
    fn quota_is_inclusive() {
        assert!(check_quota(100, 100).is_ok());
        assert!(check_quota(101, 100).is_err());
    }

    #[test]
    fn collection_names_are_distinct() {
        let names: std::collections::HashSet<_> =
            Collection::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(names.len(), Collection::ALL.len());
    }
}
