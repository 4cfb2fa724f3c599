//! `sync_conflicts` table access (spec §4.4.1).

use std::str::FromStr;
use std::sync::Arc;

use rusqlite::params;

use crate::clock::Clock;
use crate::db::connection::Db;
use crate::error::Result;
use crate::types::{Collection, ConflictRecord};

pub struct ConflictLog {
    db: Arc<Db>,
    clock: Arc<dyn Clock>,
}

impl ConflictLog {
    pub fn new(db: Arc<Db>, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Record a version divergence. Overwrites any unresolved conflict
    /// already on file for the same document — only the most recent
    /// divergence is useful to a reviewing user.
    pub fn record(
        &self,
        collection: Collection,
        document_id: &str,
        local_data: &[u8],
        server_data: &[u8],
        local_version: i64,
        server_version: i64,
    ) -> Result<()> {
        let id = ConflictRecord::key(collection, document_id);
        let now = self.clock.now();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sync_conflicts (id, collection, document_id, local_data, server_data, local_version, server_version, detected_at, resolved) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0) \
                 ON CONFLICT(id) DO UPDATE SET local_data = excluded.local_data, server_data = excluded.server_data, \
                     local_version = excluded.local_version, server_version = excluded.server_version, \
                     detected_at = excluded.detected_at, resolved = 0",
                params![id, collection.as_str(), document_id, local_data, server_data, local_version, server_version, now],
            )?;
            Ok(())
        })
    }

    pub fn unresolved(&self) -> Result<Vec<ConflictRecord>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, collection, document_id, local_data, server_data, local_version, server_version, detected_at, resolved \
                 FROM sync_conflicts WHERE resolved = 0 ORDER BY detected_at ASC",
            )?;
            let rows = stmt
                .query_map([], row_to_conflict)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn mark_resolved(&self, id: &str) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE sync_conflicts SET resolved = 1 WHERE id = ?1",
                params![id],
            )?;
            Ok(())
        })
    }
}

fn row_to_conflict(row: &rusqlite::Row) -> rusqlite::Result<ConflictRecord> {
    let collection: String = row.get(1)?;
    Ok(ConflictRecord {
        id: row.get(0)?,
        collection: Collection::from_str(&collection).unwrap_or(Collection::FoodLog),
        document_id: row.get(2)?,
        local_data: row.get(3)?,
        server_data: row.get(4)?,
        local_version: row.get(5)?,
        server_version: row.get(6)?,
        detected_at: row.get(7)?,
        resolved: row.get::<_, i64>(8)? != 0,
    })
}
