//! Connection ownership: a single writer-and-reader handle behind a mutex.
//!
//! Grounded on the teacher crate's own doc comment for `SyncAdapter`
//! ("All methods are synchronous. The `Adapter<B>` implementation uses
//! synchronous SQLite. Callers that use this from async contexts should
//! be aware that these calls will block the current thread.") — rather
//! than build a writer-actor-plus-channel, this crate takes the same
//! documented trade-off: a `parking_lot::Mutex<Connection>` serializes
//! every access, and async callers (the sync engine) are expected to
//! cross the blocking boundary themselves (`tokio::task::spawn_blocking`).

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::Connection;
use tracing::{info, instrument, warn};

use crate::db::{file_protection, schema};
use crate::error::{Result, StoreError};

enum Location {
    Memory,
    File(PathBuf),
}

/// Owns the one `rusqlite::Connection` for the process.
pub struct Db {
    conn: Mutex<Connection>,
    location: Location,
}

impl Db {
    /// Open (or create) the database at `path`, recovering from corruption
    /// by renaming the existing file aside and starting fresh.
    ///
    /// Returns `(Db, recovered)` where `recovered` is true iff the prior
    /// file failed its integrity check and was replaced.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<(Self, bool)> {
        let path = path.as_ref().to_path_buf();
        let existed = path.exists();

        let conn = Connection::open(&path)?;
        let sound = !existed || schema::integrity_check(&conn)?;

        let (conn, recovered) = if sound {
            (conn, false)
        } else {
            drop(conn);
            let backup = backup_path(&path);
            warn!(backup = %backup.display(), "database failed integrity check; quarantining");
            std::fs::rename(&path, &backup)?;
            (Connection::open(&path)?, true)
        };

        schema::enable_wal(&conn)?;
        schema::init(&conn)?;
        file_protection::apply(&path);

        if recovered {
            info!("database recreated after corruption");
        }

        Ok((
            Self {
                conn: Mutex::new(conn),
                location: Location::File(path),
            },
            recovered,
        ))
    }

    /// An in-memory database, for unit tests and scratch use. Never
    /// "recovers" since there is no prior file to corrupt.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: Location::Memory,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.location {
            Location::Memory => None,
            Location::File(p) => Some(p),
        }
    }

    /// Run `f` with exclusive access to the connection. All reads and
    /// writes funnel through this to avoid TOCTOU windows between a
    /// resurrection-guard check and the write it gates (spec §5).
    pub fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let guard = self.conn.lock();
        f(&guard)
    }

    /// Run `f` inside a single SQLite transaction, committing on `Ok` and
    /// rolling back on `Err`.
    pub fn with_tx<T>(&self, f: impl FnOnce(&rusqlite::Transaction) -> Result<T>) -> Result<T> {
        let mut guard = self.conn.lock();
        let tx = guard.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }

    /// Physically remove every user-owned row and reclaim disk space
    /// (spec §4.1 `deleteAllUserData`, called on sign-out).
    pub fn wipe_all(&self) -> Result<()> {
        self.with_tx(|tx| {
            for table in [
                "food_log",
                "perishables",
                "weight_entries",
                "settings",
                "fasting_sessions",
                "fasting_plans",
                "reaction_logs",
                "favorites",
                "sync_queue",
                "failed_operations",
                "sync_conflicts",
            ] {
                tx.execute(&format!("DELETE FROM {table}"), [])?;
            }
            Ok(())
        })?;
        // VACUUM cannot run inside a transaction.
        self.with_conn(|conn| {
            conn.execute("VACUUM", []).map_err(StoreError::from)?;
            Ok(())
        })
    }
}

fn backup_path(path: &Path) -> PathBuf {
    let epoch = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("store");
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or("sqlite");
    let mut backup = path.to_path_buf();
    backup.set_file_name(format!("{stem}_corrupt_{epoch}.{ext}"));
    backup
}
