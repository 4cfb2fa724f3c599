//! `cleanupDeletedRecords` (spec I5) and the stale-tombstone GC (spec §4.1,
//! §6 `staleTombstoneGC`). Both are the same predicate — a tombstone with
//! no remaining trace in `sync_queue` or `failed_operations` — applied
//! with or without an age cutoff.

use crate::db::connection::Db;
use crate::error::Result;
use crate::types::Collection;

const ENTITY_TABLES: [&str; 8] = [
    "food_log",
    "perishables",
    "weight_entries",
    "settings",
    "fasting_sessions",
    "fasting_plans",
    "reaction_logs",
    "favorites",
];

/// Hard-delete every tombstoned row whose delete op has fully settled
/// (absent from both `sync_queue` and `failed_operations`) and, when
/// `max_age_secs` is given, whose `last_modified` is at least that old.
///
/// Called unconditionally (no age cutoff) after every drain cycle, and
/// with the 30-day cutoff from `initialize()` housekeeping.
pub fn cleanup_deleted_records(db: &Db, now: i64, max_age_secs: Option<i64>) -> Result<u64> {
    let mut removed = 0u64;
    db.with_conn(|conn| {
        for table in ENTITY_TABLES {
            let age_clause = match max_age_secs {
                Some(age) => format!("AND last_modified <= {}", now - age),
                None => String::new(),
            };
            let sql = format!(
                "DELETE FROM {table} WHERE sync_status = 'deleted' {age_clause} \
                 AND id NOT IN (SELECT document_id FROM sync_queue WHERE collection = '{table}') \
                 AND id NOT IN (SELECT document_id FROM failed_operations WHERE collection = '{table}')"
            );
            removed += conn.execute(&sql, [])? as u64;
        }
        Ok(())
    })?;
    Ok(removed)
}

/// Whether `cleanupDeletedRecords` would currently remove this specific
/// document — used by tests asserting I5 directly rather than through
/// the aggregate count.
pub fn is_settled_tombstone(db: &Db, collection: Collection, document_id: &str) -> Result<bool> {
    db.with_conn(|conn| {
        let table = collection.as_str();
        let in_queue: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sync_queue WHERE collection = ?1 AND document_id = ?2",
            [table, document_id],
            |r| r.get(0),
        )?;
        let in_failed: i64 = conn.query_row(
            "SELECT COUNT(*) FROM failed_operations WHERE collection = ?1 AND document_id = ?2",
            [table, document_id],
            |r| r.get(0),
        )?;
        let is_deleted: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE id = ?1 AND sync_status = 'deleted'"),
            [document_id],
            |r| r.get(0),
        )?;
        Ok(is_deleted > 0 && in_queue == 0 && in_failed == 0)
    })
}
