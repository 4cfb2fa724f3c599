//! Perishable inventory item table access (spec §3).

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::types::SyncStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerishableItem {
    pub id: String,
    pub name: String,
    pub quantity: f64,
    pub expiry_date: i64,
    pub added_date: i64,
    pub metadata: Option<Value>,
}

pub fn upsert(conn: &Connection, item: &PerishableItem, now: i64) -> Result<String> {
    let metadata_json = item.metadata.as_ref().map(serde_json::to_string).transpose()?;
    conn.execute(
        "INSERT INTO perishables (id, name, quantity, expiry_date, added_date, metadata_json, sync_status, last_modified) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7) \
         ON CONFLICT(id) DO UPDATE SET name = excluded.name, quantity = excluded.quantity, \
            expiry_date = excluded.expiry_date, added_date = excluded.added_date, metadata_json = excluded.metadata_json, \
            sync_status = 'pending', last_modified = excluded.last_modified",
        params![item.id, item.name, item.quantity, item.expiry_date, item.added_date, metadata_json, now],
    )?;
    Ok(item.id.clone())
}

pub fn import_upsert(conn: &Connection, item: &PerishableItem, now: i64) -> Result<bool> {
    let metadata_json = item.metadata.as_ref().map(serde_json::to_string).transpose()?;
    let changed = conn.execute(
        "INSERT INTO perishables (id, name, quantity, expiry_date, added_date, metadata_json, sync_status, last_modified) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'synced', ?7) \
         ON CONFLICT(id) DO UPDATE SET name = excluded.name, quantity = excluded.quantity, \
            expiry_date = excluded.expiry_date, added_date = excluded.added_date, metadata_json = excluded.metadata_json, \
            sync_status = 'synced', last_modified = excluded.last_modified",
        params![item.id, item.name, item.quantity, item.expiry_date, item.added_date, metadata_json, now],
    )?;
    Ok(changed > 0)
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<PerishableItem>> {
    conn.query_row(
        "SELECT id, name, quantity, expiry_date, added_date, metadata_json FROM perishables \
         WHERE id = ?1 AND sync_status != 'deleted'",
        params![id],
        row_to_item,
    )
    .optional()
    .map_err(Into::into)
}

pub fn list_expiring_before(conn: &Connection, cutoff: i64) -> Result<Vec<PerishableItem>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, quantity, expiry_date, added_date, metadata_json FROM perishables \
         WHERE expiry_date <= ?1 AND sync_status != 'deleted' ORDER BY expiry_date ASC",
    )?;
    let rows = stmt
        .query_map(params![cutoff], row_to_item)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn soft_delete(conn: &Connection, id: &str, now: i64) -> Result<()> {
    conn.execute(
        "UPDATE perishables SET sync_status = 'deleted', last_modified = ?1 WHERE id = ?2",
        params![now, id],
    )?;
    Ok(())
}

pub fn hard_delete(conn: &Connection, id: &str) -> Result<()> {
    conn.execute("DELETE FROM perishables WHERE id = ?1", params![id])?;
    Ok(())
}

pub fn mark_synced(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        "UPDATE perishables SET sync_status = ?1 WHERE id = ?2 AND sync_status != 'deleted'",
        params![SyncStatus::Synced.as_str(), id],
    )?;
    Ok(())
}

fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<PerishableItem> {
    let metadata_json: Option<String> = row.get(5)?;
    let metadata = metadata_json
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e)))?;
    Ok(PerishableItem {
        id: row.get(0)?,
        name: row.get(1)?,
        quantity: row.get(2)?,
        expiry_date: row.get(3)?,
        added_date: row.get(4)?,
        metadata,
    })
}
