//! State store: SQLite-backed record of every file ever seen per source.
//!
//! One table, `files`, keyed by the absolute source path. Rows are never
//! deleted: a file that disappears from its source keeps its row with
//! `exists_in_source = 0`. Deleting the database file forces a full resync.
//!
//! Mutations during a pass go through a [`StateTxn`], which commits once at
//! the end of the pass and rolls back if dropped.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use serde::Serialize;

use folder_sync_core::SourceKind;

use crate::error::{io_err, SyncError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS files (
    id               INTEGER PRIMARY KEY,
    source_name      TEXT NOT NULL,
    source_type      TEXT NOT NULL,
    source_path      TEXT NOT NULL UNIQUE,
    relative_path    TEXT NOT NULL,
    mtime            INTEGER NOT NULL,
    size             INTEGER NOT NULL,
    exists_in_source INTEGER NOT NULL DEFAULT 0,
    exists_in_dest   INTEGER NOT NULL DEFAULT 0,
    last_check       INTEGER NOT NULL,
    quarantined      INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX IF NOT EXISTS files_source_name ON files (source_name);
";

const RECORD_COLUMNS: &str = "id, source_name, source_type, source_path, relative_path, \
     mtime, size, exists_in_source, exists_in_dest, last_check, quarantined";

/// A persisted row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: i64,
    pub source_name: String,
    pub source_type: String,
    pub source_path: PathBuf,
    pub relative_path: PathBuf,
    /// Whole seconds since the Unix epoch.
    pub mtime: i64,
    pub size: u64,
    pub exists_in_source: bool,
    pub exists_in_dest: bool,
    /// Unix seconds of the last time this row was written.
    pub last_check: i64,
    pub quarantined: bool,
}

impl FileRecord {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            source_name: row.get(1)?,
            source_type: row.get(2)?,
            source_path: PathBuf::from(row.get::<_, String>(3)?),
            relative_path: PathBuf::from(row.get::<_, String>(4)?),
            mtime: row.get(5)?,
            size: row.get::<_, i64>(6)?.max(0) as u64,
            exists_in_source: row.get(7)?,
            exists_in_dest: row.get(8)?,
            last_check: row.get(9)?,
            quarantined: row.get(10)?,
        })
    }

    /// True when `mtime` and `size` both match what is recorded.
    pub fn matches(&self, mtime: i64, size: u64) -> bool {
        self.mtime == mtime && self.size == size
    }
}

/// Values written when a stable file is (re)recorded.
#[derive(Debug, Clone, Copy)]
pub struct RecordUpdate<'a> {
    pub source_name: &'a str,
    pub source_kind: SourceKind,
    pub source_path: &'a Path,
    pub relative_path: &'a Path,
    pub mtime: i64,
    pub size: u64,
    pub quarantined: bool,
}

/// Per-source counters for `folder-sync status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub source_name: String,
    pub source_type: String,
    pub tracked: u64,
    pub present: u64,
    pub linked: u64,
    pub quarantined: u64,
    pub stale: u64,
    pub last_check: Option<i64>,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Handle to the persisted state. Owned by the caller of a run and borrowed
/// by the reconciler and the cleanup pass.
pub struct StateStore {
    conn: Connection,
}

impl StateStore {
    /// Open (creating if needed) the database at `path`.
    pub fn open_at(path: &Path) -> Result<Self, SyncError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        Self::init(Connection::open(path)?)
    }

    /// A throwaway store, used by tests and dry runs without a database.
    pub fn open_in_memory() -> Result<Self, SyncError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, SyncError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Start a transaction for one pass.
    pub fn begin(&mut self) -> Result<StateTxn<'_>, SyncError> {
        Ok(StateTxn {
            tx: self.conn.transaction()?,
        })
    }

    pub fn find(&self, source_path: &Path) -> Result<Option<FileRecord>, SyncError> {
        find_record(&self.conn, source_path)
    }

    /// Every row, in insertion order.
    pub fn records(&self) -> Result<Vec<FileRecord>, SyncError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {RECORD_COLUMNS} FROM files ORDER BY id"))?;
        let rows = stmt.query_map([], FileRecord::from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Counters grouped by source, sorted by source name.
    pub fn summary(&self) -> Result<Vec<SourceSummary>, SyncError> {
        let mut stmt = self.conn.prepare(
            "SELECT source_name,
                    MAX(source_type),
                    COUNT(*),
                    SUM(exists_in_source),
                    SUM(CASE WHEN exists_in_dest = 1 AND quarantined = 0 THEN 1 ELSE 0 END),
                    SUM(quarantined),
                    SUM(CASE WHEN exists_in_source = 0 THEN 1 ELSE 0 END),
                    MAX(last_check)
             FROM files
             GROUP BY source_name
             ORDER BY source_name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(SourceSummary {
                source_name: row.get(0)?,
                source_type: row.get(1)?,
                tracked: count(row.get(2)?),
                present: count(row.get(3)?),
                linked: count(row.get(4)?),
                quarantined: count(row.get(5)?),
                stale: count(row.get(6)?),
                last_check: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn count(value: Option<i64>) -> u64 {
    value.unwrap_or(0).max(0) as u64
}

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// Mutations for one pass. Dropping without [`StateTxn::commit`] rolls back.
pub struct StateTxn<'a> {
    tx: Transaction<'a>,
}

impl StateTxn<'_> {
    /// Clear both existence flags for every row of `source_name`.
    pub fn reset_source(&self, source_name: &str) -> Result<usize, SyncError> {
        Ok(self.tx.execute(
            "UPDATE files SET exists_in_source = 0, exists_in_dest = 0 WHERE source_name = ?1",
            params![source_name],
        )?)
    }

    pub fn find(&self, source_path: &Path) -> Result<Option<FileRecord>, SyncError> {
        find_record(&self.tx, source_path)
    }

    /// Insert a new row or refresh the metadata of an existing one.
    ///
    /// New rows start with `exists_in_dest = 0`; existing rows keep their
    /// destination flag until [`StateTxn::mark_in_dest`].
    pub fn upsert(&self, record: &RecordUpdate<'_>) -> Result<(), SyncError> {
        self.tx.execute(
            "INSERT INTO files
                 (source_name, source_type, source_path, relative_path,
                  mtime, size, exists_in_source, exists_in_dest, last_check, quarantined)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, 0, ?7, ?8)
             ON CONFLICT(source_path) DO UPDATE SET
                 mtime = excluded.mtime,
                 size = excluded.size,
                 exists_in_source = 1,
                 last_check = excluded.last_check,
                 quarantined = excluded.quarantined",
            params![
                record.source_name,
                record.source_kind.as_str(),
                path_key(record.source_path),
                path_key(record.relative_path),
                record.mtime,
                size_value(record.size),
                now(),
                record.quarantined,
            ],
        )?;
        Ok(())
    }

    pub fn mark_in_source(&self, source_path: &Path) -> Result<(), SyncError> {
        self.tx.execute(
            "UPDATE files SET exists_in_source = 1 WHERE source_path = ?1",
            params![path_key(source_path)],
        )?;
        Ok(())
    }

    pub fn mark_in_dest(&self, source_path: &Path) -> Result<(), SyncError> {
        self.tx.execute(
            "UPDATE files SET exists_in_dest = 1 WHERE source_path = ?1",
            params![path_key(source_path)],
        )?;
        Ok(())
    }

    /// Rows whose file was absent from its source's latest listing.
    pub fn stale(&self) -> Result<Vec<FileRecord>, SyncError> {
        let mut stmt = self.tx.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM files WHERE exists_in_source = 0 ORDER BY id"
        ))?;
        let rows = stmt.query_map([], FileRecord::from_row)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Record that a stale row's destination has been dealt with.
    pub fn retire(&self, source_path: &Path) -> Result<(), SyncError> {
        self.tx.execute(
            "UPDATE files SET exists_in_dest = 0, last_check = ?1 WHERE source_path = ?2",
            params![now(), path_key(source_path)],
        )?;
        Ok(())
    }

    pub fn commit(self) -> Result<(), SyncError> {
        self.tx.commit()?;
        Ok(())
    }

    pub fn rollback(self) -> Result<(), SyncError> {
        self.tx.rollback()?;
        Ok(())
    }
}

fn find_record(conn: &Connection, source_path: &Path) -> Result<Option<FileRecord>, SyncError> {
    Ok(conn
        .query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM files WHERE source_path = ?1"),
            params![path_key(source_path)],
            FileRecord::from_row,
        )
        .optional()?)
}

fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn size_value(size: u64) -> i64 {
    i64::try_from(size).unwrap_or(i64::MAX)
}

fn now() -> i64 {
    Utc::now().timestamp()
}
