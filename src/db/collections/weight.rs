//! Body-weight entry table access (spec §3).

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::SyncStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightEntry {
    pub id: String,
    pub weight: f64,
    pub date: i64,
    pub bmi: Option<f64>,
    pub waist: Option<f64>,
    pub dress_size: Option<String>,
    pub photos: Option<Vec<String>>,
}

pub fn upsert(conn: &Connection, entry: &WeightEntry, now: i64) -> Result<String> {
    let photos_json = entry.photos.as_ref().map(serde_json::to_string).transpose()?;
    conn.execute(
        "INSERT INTO weight_entries (id, weight, date, bmi, waist, dress_size, photos_json, sync_status, last_modified) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8) \
         ON CONFLICT(id) DO UPDATE SET weight = excluded.weight, date = excluded.date, bmi = excluded.bmi, \
            waist = excluded.waist, dress_size = excluded.dress_size, photos_json = excluded.photos_json, \
            sync_status = 'pending', last_modified = excluded.last_modified",
        params![entry.id, entry.weight, entry.date, entry.bmi, entry.waist, entry.dress_size, photos_json, now],
    )?;
    Ok(entry.id.clone())
}

pub fn import_upsert(conn: &Connection, entry: &WeightEntry, now: i64) -> Result<bool> {
    let photos_json = entry.photos.as_ref().map(serde_json::to_string).transpose()?;
    let changed = conn.execute(
        "INSERT INTO weight_entries (id, weight, date, bmi, waist, dress_size, photos_json, sync_status, last_modified) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'synced', ?8) \
         ON CONFLICT(id) DO UPDATE SET weight = excluded.weight, date = excluded.date, bmi = excluded.bmi, \
            waist = excluded.waist, dress_size = excluded.dress_size, photos_json = excluded.photos_json, \
            sync_status = 'synced', last_modified = excluded.last_modified",
        params![entry.id, entry.weight, entry.date, entry.bmi, entry.waist, entry.dress_size, photos_json, now],
    )?;
    Ok(changed > 0)
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<WeightEntry>> {
    conn.query_row(
        "SELECT id, weight, date, bmi, waist, dress_size, photos_json FROM weight_entries \
         WHERE id = ?1 AND sync_status != 'deleted'",
        params![id],
        row_to_entry,
    )
    .optional()
    .map_err(Into::into)
}

pub fn list_history(conn: &Connection, limit: i64) -> Result<Vec<WeightEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, weight, date, bmi, waist, dress_size, photos_json FROM weight_entries \
         WHERE sync_status != 'deleted' ORDER BY date DESC LIMIT ?1",
    )?;
    let rows = stmt
        .query_map(params![limit], row_to_entry)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn soft_delete(conn: &Connection, id: &str, now: i64) -> Result<()> {
    conn.execute(
        "UPDATE weight_entries SET sync_status = 'deleted', last_modified = ?1 WHERE id = ?2",
        params![now, id],
    )?;
    Ok(())
}

pub fn hard_delete(conn: &Connection, id: &str) -> Result<()> {
    conn.execute("DELETE FROM weight_entries WHERE id = ?1", params![id])?;
    Ok(())
}

pub fn mark_synced(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        "UPDATE weight_entries SET sync_status = ?1 WHERE id = ?2 AND sync_status != 'deleted'",
        params![SyncStatus::Synced.as_str(), id],
    )?;
    Ok(())
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<WeightEntry> {
    let photos_json: Option<String> = row.get(6)?;
    let photos = photos_json
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e)))?;
    Ok(WeightEntry {
        id: row.get(0)?,
        weight: row.get(1)?,
        date: row.get(2)?,
        bmi: row.get(3)?,
        waist: row.get(4)?,
        dress_size: row.get(5)?,
        photos,
    })
}
