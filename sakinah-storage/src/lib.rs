//! DuckDB storage layer for Sakinah.
//!
//! Provides row-level persistence for named collections (profiles, sessions,
//! mood entries, journal entries, settings). Rows are opaque JSON documents
//! plus a few plaintext index columns (owner, date) so that lookups and
//! ordering never need decryption.
//!
//! # Architecture
//!
//! - All collections share a single `records` table keyed by
//!   `(collection, key)`
//! - Updating or deleting one entry never rewrites its siblings
//! - Multi-row writes go through [`WriteBatch`] and commit in one transaction

mod error;
mod record_store;

pub use error::{StorageError, StorageResult};
pub use record_store::{Collection, Record, RecordStore, StorageInfo, WriteBatch};

/// Open a DuckDB connection with stale WAL recovery and resource limits.
///
/// If the initial open fails and a `.wal` file exists alongside the database,
/// it is removed and the open is retried once. This handles the common case
/// where an unclean shutdown leaves a WAL file that prevents reopening.
pub fn open_duckdb_with_wal_recovery(
    path: &std::path::Path,
    memory_limit: &str,
    threads: u32,
) -> StorageResult<duckdb::Connection> {
    let conn = match duckdb::Connection::open(path) {
        Ok(c) => c,
        Err(first_err) => {
            let wal_path = path.with_extension(
                path.extension()
                    .map(|ext| format!("{}.wal", ext.to_string_lossy()))
                    .unwrap_or_else(|| "wal".to_string()),
            );
            if wal_path.exists() {
                tracing::warn!(
                    "DuckDB open failed, removing stale WAL and retrying: {}",
                    wal_path.display()
                );
                if std::fs::remove_file(&wal_path).is_ok() {
                    let c = duckdb::Connection::open(path)
                        .map_err(|e| StorageError::Unavailable(e.to_string()))?;
                    apply_resource_limits(&c, memory_limit, threads)?;
                    return Ok(c);
                }
            }
            return Err(StorageError::Unavailable(first_err.to_string()));
        }
    };
    apply_resource_limits(&conn, memory_limit, threads)?;
    Ok(conn)
}

/// Apply memory and thread limits to a DuckDB connection.
fn apply_resource_limits(
    conn: &duckdb::Connection,
    memory_limit: &str,
    threads: u32,
) -> StorageResult<()> {
    conn.execute_batch(&format!(
        "PRAGMA memory_limit='{}'; PRAGMA threads={};",
        memory_limit.replace('\'', ""),
        threads.max(1)
    ))?;
    Ok(())
}
