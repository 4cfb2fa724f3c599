//! Food log entry table access (spec §3: individually-typed columns).

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::types::SyncStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoodLogEntry {
    pub id: String,
    pub user_id: String,
    pub food_name: String,
    pub serving_size: f64,
    pub serving_unit: String,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fat_g: f64,
    pub micros: Option<Value>,
    pub meal_type: String,
    /// Date the food was consumed, seconds since epoch (day granularity).
    pub consumed_date: i64,
    pub logged_at: i64,
}

/// Insert or update by id; if the dedup index (I6) rejects this as a
/// duplicate of a *different* row, fold the write into that existing row
/// instead of erroring — this is the "save" half of P8. Returns the id of
/// the row actually written, which the caller must enqueue under: on a
/// dedup fold that is the *existing* row's id, not `entry.id`.
pub fn upsert(conn: &Connection, entry: &FoodLogEntry, now: i64) -> Result<String> {
    let micros_json = entry
        .micros
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;

    let outcome = conn.execute(
        "INSERT INTO food_log (id, user_id, food_name, serving_size, serving_unit, calories, protein_g, carbs_g, fat_g, micros_json, meal_type, consumed_date, logged_at, sync_status, last_modified) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 'pending', ?14) \
         ON CONFLICT(id) DO UPDATE SET \
            user_id = excluded.user_id, food_name = excluded.food_name, serving_size = excluded.serving_size, \
            serving_unit = excluded.serving_unit, calories = excluded.calories, protein_g = excluded.protein_g, \
            carbs_g = excluded.carbs_g, fat_g = excluded.fat_g, micros_json = excluded.micros_json, \
            meal_type = excluded.meal_type, consumed_date = excluded.consumed_date, logged_at = excluded.logged_at, \
            sync_status = 'pending', last_modified = excluded.last_modified",
        params![
            entry.id, entry.user_id, entry.food_name, entry.serving_size, entry.serving_unit,
            entry.calories, entry.protein_g, entry.carbs_g, entry.fat_g, micros_json,
            entry.meal_type, entry.consumed_date, entry.logged_at, now,
        ],
    );

    match outcome {
        Ok(_) => Ok(entry.id.clone()),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            dedupe_into_existing(conn, entry, &micros_json, now)
        }
        Err(e) => Err(e.into()),
    }
}

fn dedupe_into_existing(
    conn: &Connection,
    entry: &FoodLogEntry,
    micros_json: &Option<String>,
    now: i64,
) -> Result<String> {
    let existing_id: String = conn.query_row(
        "SELECT id FROM food_log WHERE user_id = ?1 AND food_name = ?2 AND consumed_date = ?3 \
            AND meal_type = ?4 AND serving_size = ?5 AND serving_unit = ?6 AND sync_status != 'deleted'",
        params![
            entry.user_id, entry.food_name, entry.consumed_date,
            entry.meal_type, entry.serving_size, entry.serving_unit,
        ],
        |row| row.get(0),
    )?;
    conn.execute(
        "UPDATE food_log SET calories = ?1, protein_g = ?2, carbs_g = ?3, fat_g = ?4, micros_json = ?5, \
            logged_at = ?6, sync_status = 'pending', last_modified = ?7 WHERE id = ?8",
        params![
            entry.calories, entry.protein_g, entry.carbs_g, entry.fat_g, micros_json,
            entry.logged_at, now, existing_id,
        ],
    )?;
    Ok(existing_id)
}

/// Import path: INSERT-OR-IGNORE tolerates a cross-device duplicate that
/// already landed locally (spec §4.1).
pub fn import_upsert(conn: &Connection, entry: &FoodLogEntry, now: i64) -> Result<bool> {
    let micros_json = entry
        .micros
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let changed = conn.execute(
        "INSERT OR IGNORE INTO food_log (id, user_id, food_name, serving_size, serving_unit, calories, protein_g, carbs_g, fat_g, micros_json, meal_type, consumed_date, logged_at, sync_status, last_modified) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, 'synced', ?14)",
        params![
            entry.id, entry.user_id, entry.food_name, entry.serving_size, entry.serving_unit,
            entry.calories, entry.protein_g, entry.carbs_g, entry.fat_g, micros_json,
            entry.meal_type, entry.consumed_date, entry.logged_at, now,
        ],
    )?;
    Ok(changed > 0)
}

pub fn get(conn: &Connection, id: &str) -> Result<Option<FoodLogEntry>> {
    conn.query_row(
        "SELECT id, user_id, food_name, serving_size, serving_unit, calories, protein_g, carbs_g, fat_g, micros_json, meal_type, consumed_date, logged_at \
         FROM food_log WHERE id = ?1 AND sync_status != 'deleted'",
        params![id],
        row_to_entry,
    )
    .optional()
    .map_err(Into::into)
}

pub fn list_for_user(conn: &Connection, user_id: &str) -> Result<Vec<FoodLogEntry>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, food_name, serving_size, serving_unit, calories, protein_g, carbs_g, fat_g, micros_json, meal_type, consumed_date, logged_at \
         FROM food_log WHERE user_id = ?1 AND sync_status != 'deleted' ORDER BY consumed_date DESC",
    )?;
    let rows = stmt
        .query_map(params![user_id], row_to_entry)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn soft_delete(conn: &Connection, id: &str, now: i64) -> Result<()> {
    conn.execute(
        "UPDATE food_log SET sync_status = 'deleted', last_modified = ?1 WHERE id = ?2",
        params![now, id],
    )?;
    Ok(())
}

pub fn hard_delete(conn: &Connection, id: &str) -> Result<()> {
    conn.execute("DELETE FROM food_log WHERE id = ?1", params![id])?;
    Ok(())
}

pub fn mark_synced(conn: &Connection, id: &str) -> Result<()> {
    conn.execute(
        "UPDATE food_log SET sync_status = ?1 WHERE id = ?2 AND sync_status != 'deleted'",
        params![SyncStatus::Synced.as_str(), id],
    )?;
    Ok(())
}

fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<FoodLogEntry> {
    let micros_json: Option<String> = row.get(9)?;
    let micros = micros_json
        .map(|s| serde_json::from_str(&s))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e)))?;
    Ok(FoodLogEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        food_name: row.get(2)?,
        serving_size: row.get(3)?,
        serving_unit: row.get(4)?,
        calories: row.get(5)?,
        protein_g: row.get(6)?,
        carbs_g: row.get(7)?,
        fat_g: row.get(8)?,
        micros,
        meal_type: row.get(10)?,
        consumed_date: row.get(11)?,
        logged_at: row.get(12)?,
    })
}
