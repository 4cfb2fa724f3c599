//! Opaque-payload collections (spec §3): fasting sessions/plans, reaction
//! logs, favorite foods. Each has its own table but an identical shape —
//! an indexed `user_id`/`created_at` plus an encoded payload blob — so one
//! set of functions serves all four, parameterized by `Collection`.

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::types::{Collection, SyncStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpaqueDocument {
    pub id: String,
    pub user_id: Option<String>,
    pub created_at: i64,
    pub payload: Value,
}

fn table(collection: Collection) -> &'static str {
    debug_assert!(collection.is_opaque_payload());
    collection.as_str()
}

pub fn upsert(conn: &Connection, collection: Collection, doc: &OpaqueDocument, now: i64) -> Result<String> {
    let payload = serde_json::to_vec(&doc.payload)?;
    conn.execute(
        &format!(
            "INSERT INTO {t} (id, user_id, created_at, payload, sync_status, last_modified) \
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5) \
             ON CONFLICT(id) DO UPDATE SET user_id = excluded.user_id, created_at = excluded.created_at, \
                payload = excluded.payload, sync_status = 'pending', last_modified = excluded.last_modified",
            t = table(collection)
        ),
        params![doc.id, doc.user_id, doc.created_at, payload, now],
    )?;
    Ok(doc.id.clone())
}

pub fn import_upsert(conn: &Connection, collection: Collection, doc: &OpaqueDocument, now: i64) -> Result<bool> {
    let payload = serde_json::to_vec(&doc.payload)?;
    let changed = conn.execute(
        &format!(
            "INSERT INTO {t} (id, user_id, created_at, payload, sync_status, last_modified) \
             VALUES (?1, ?2, ?3, ?4, 'synced', ?5) \
             ON CONFLICT(id) DO UPDATE SET user_id = excluded.user_id, created_at = excluded.created_at, \
                payload = excluded.payload, sync_status = 'synced', last_modified = excluded.last_modified",
            t = table(collection)
        ),
        params![doc.id, doc.user_id, doc.created_at, payload, now],
    )?;
    Ok(changed > 0)
}

pub fn get(conn: &Connection, collection: Collection, id: &str) -> Result<Option<OpaqueDocument>> {
    conn.query_row(
        &format!(
            "SELECT id, user_id, created_at, payload FROM {t} WHERE id = ?1 AND sync_status != 'deleted'",
            t = table(collection)
        ),
        params![id],
        row_to_doc,
    )
    .optional()
    .map_err(Into::into)
}

pub fn list_for_user(conn: &Connection, collection: Collection, user_id: &str) -> Result<Vec<OpaqueDocument>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, user_id, created_at, payload FROM {t} WHERE user_id = ?1 AND sync_status != 'deleted' ORDER BY created_at DESC",
        t = table(collection)
    ))?;
    let rows = stmt
        .query_map(params![user_id], row_to_doc)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn soft_delete(conn: &Connection, collection: Collection, id: &str, now: i64) -> Result<()> {
    conn.execute(
        &format!(
            "UPDATE {t} SET sync_status = 'deleted', last_modified = ?1 WHERE id = ?2",
            t = table(collection)
        ),
        params![now, id],
    )?;
    Ok(())
}

pub fn hard_delete(conn: &Connection, collection: Collection, id: &str) -> Result<()> {
    conn.execute(
        &format!("DELETE FROM {t} WHERE id = ?1", t = table(collection)),
        params![id],
    )?;
    Ok(())
}

pub fn mark_synced(conn: &Connection, collection: Collection, id: &str) -> Result<()> {
    conn.execute(
        &format!(
            "UPDATE {t} SET sync_status = ?1 WHERE id = ?2 AND sync_status != 'deleted'",
            t = table(collection)
        ),
        params![SyncStatus::Synced.as_str(), id],
    )?;
    Ok(())
}

fn row_to_doc(row: &rusqlite::Row) -> rusqlite::Result<OpaqueDocument> {
    let payload_bytes: Vec<u8> = row.get(3)?;
    let payload = serde_json::from_slice(&payload_bytes)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Blob, Box::new(e)))?;
    Ok(OpaqueDocument {
        id: row.get(0)?,
        user_id: row.get(1)?,
        created_at: row.get(2)?,
        payload,
    })
}
