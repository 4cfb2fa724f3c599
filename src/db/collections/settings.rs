//! User settings: a singleton row keyed `"current"` (spec §3, §9 open question).

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::SyncStatus;

pub const SETTINGS_ID: &str = "current";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserSettings {
    pub calorie_goal: f64,
    pub protein_pct: f64,
    pub carbs_pct: f64,
    pub fat_pct: f64,
    pub allergens: Vec<String>,
}

/// Upsert the singleton settings row. There is only ever one row
/// (`id = "current"`); `mark_synced` on it is the same status flip every
/// other collection gets — no singleton-specific sync semantics needed
/// (DESIGN.md: resolved open question).
pub fn upsert(conn: &Connection, settings: &UserSettings, now: i64) -> Result<String> {
    let allergens_json = serde_json::to_string(&settings.allergens)?;
    conn.execute(
        "INSERT INTO settings (id, calorie_goal, protein_pct, carbs_pct, fat_pct, allergens_json, sync_status, last_modified) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', ?7) \
         ON CONFLICT(id) DO UPDATE SET calorie_goal = excluded.calorie_goal, protein_pct = excluded.protein_pct, \
            carbs_pct = excluded.carbs_pct, fat_pct = excluded.fat_pct, allergens_json = excluded.allergens_json, \
            sync_status = 'pending', last_modified = excluded.last_modified",
        params![SETTINGS_ID, settings.calorie_goal, settings.protein_pct, settings.carbs_pct, settings.fat_pct, allergens_json, now],
    )?;
    Ok(SETTINGS_ID.to_string())
}

pub fn import_upsert(conn: &Connection, settings: &UserSettings, now: i64) -> Result<bool> {
    let allergens_json = serde_json::to_string(&settings.allergens)?;
    let changed = conn.execute(
        "INSERT INTO settings (id, calorie_goal, protein_pct, carbs_pct, fat_pct, allergens_json, sync_status, last_modified) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'synced', ?7) \
         ON CONFLICT(id) DO UPDATE SET calorie_goal = excluded.calorie_goal, protein_pct = excluded.protein_pct, \
            carbs_pct = excluded.carbs_pct, fat_pct = excluded.fat_pct, allergens_json = excluded.allergens_json, \
            sync_status = 'synced', last_modified = excluded.last_modified",
        params![SETTINGS_ID, settings.calorie_goal, settings.protein_pct, settings.carbs_pct, settings.fat_pct, allergens_json, now],
    )?;
    Ok(changed > 0)
}

pub fn get(conn: &Connection) -> Result<Option<UserSettings>> {
    conn.query_row(
        "SELECT calorie_goal, protein_pct, carbs_pct, fat_pct, allergens_json FROM settings \
         WHERE id = ?1 AND sync_status != 'deleted'",
        params![SETTINGS_ID],
        row_to_settings,
    )
    .optional()
    .map_err(Into::into)
}

pub fn mark_synced(conn: &Connection) -> Result<()> {
    conn.execute(
        "UPDATE settings SET sync_status = ?1 WHERE id = ?2 AND sync_status != 'deleted'",
        params![SyncStatus::Synced.as_str(), SETTINGS_ID],
    )?;
    Ok(())
}

fn row_to_settings(row: &rusqlite::Row) -> rusqlite::Result<UserSettings> {
    let allergens_json: String = row.get(4)?;
    let allergens = serde_json::from_str(&allergens_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e)))?;
    Ok(UserSettings {
        calorie_goal: row.get(0)?,
        protein_pct: row.get(1)?,
        carbs_pct: row.get(2)?,
        fat_pct: row.get(3)?,
        allergens,
    })
}
