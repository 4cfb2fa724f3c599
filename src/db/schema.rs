//! Table/index DDL and schema versioning.
//!
//! Mirrors the shape of `mozilla-application-services`' `places` schema
//! module: a set of `CREATE TABLE IF NOT EXISTS` constants, a single
//! `init` entry point, and an `integrity_check` helper run on open.

use rusqlite::Connection;
use tracing::{info, warn};

use crate::error::Result;

/// Bumped whenever a table/index definition below changes shape.
pub const SCHEMA_VERSION: i64 = 1;

const CREATE_META_SQL: &str = "CREATE TABLE IF NOT EXISTS store_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)";

const CREATE_FOOD_LOG_SQL: &str = "CREATE TABLE IF NOT EXISTS food_log (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    food_name TEXT NOT NULL,
    serving_size REAL NOT NULL,
    serving_unit TEXT NOT NULL,
    calories REAL NOT NULL,
    protein_g REAL NOT NULL,
    carbs_g REAL NOT NULL,
    fat_g REAL NOT NULL,
    micros_json TEXT,
    meal_type TEXT NOT NULL,
    consumed_date INTEGER NOT NULL,
    logged_at INTEGER NOT NULL,
    sync_status TEXT NOT NULL DEFAULT 'pending',
    last_modified INTEGER NOT NULL,
    remote_version INTEGER NOT NULL DEFAULT 0
)";

const CREATE_FOOD_LOG_DEDUP_INDEX_SQL: &str = "CREATE UNIQUE INDEX IF NOT EXISTS \
    idx_food_log_dedup ON food_log(user_id, food_name, consumed_date, meal_type, serving_size, serving_unit) \
    WHERE sync_status != 'deleted'";

const CREATE_FOOD_LOG_STATUS_INDEX_SQL: &str =
    "CREATE INDEX IF NOT EXISTS idx_food_log_sync_status ON food_log(sync_status)";

const CREATE_PERISHABLES_SQL: &str = "CREATE TABLE IF NOT EXISTS perishables (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    quantity REAL NOT NULL,
    expiry_date INTEGER NOT NULL,
    added_date INTEGER NOT NULL,
    metadata_json TEXT,
    sync_status TEXT NOT NULL DEFAULT 'pending',
    last_modified INTEGER NOT NULL,
    remote_version INTEGER NOT NULL DEFAULT 0
)";

const CREATE_PERISHABLES_EXPIRY_INDEX_SQL: &str =
    "CREATE INDEX IF NOT EXISTS idx_perishables_expiry ON perishables(expiry_date)";

const CREATE_PERISHABLES_STATUS_INDEX_SQL: &str =
    "CREATE INDEX IF NOT EXISTS idx_perishables_sync_status ON perishables(sync_status)";

const CREATE_WEIGHT_ENTRIES_SQL: &str = "CREATE TABLE IF NOT EXISTS weight_entries (
    id TEXT PRIMARY KEY,
    weight REAL NOT NULL,
    date INTEGER NOT NULL,
    bmi REAL,
    waist REAL,
    dress_size TEXT,
    photos_json TEXT,
    sync_status TEXT NOT NULL DEFAULT 'pending',
    last_modified INTEGER NOT NULL,
    remote_version INTEGER NOT NULL DEFAULT 0
)";

const CREATE_WEIGHT_ENTRIES_STATUS_INDEX_SQL: &str =
    "CREATE INDEX IF NOT EXISTS idx_weight_entries_sync_status ON weight_entries(sync_status)";

const CREATE_SETTINGS_SQL: &str = "CREATE TABLE IF NOT EXISTS settings (
    id TEXT PRIMARY KEY,
    calorie_goal REAL NOT NULL,
    protein_pct REAL NOT NULL,
    carbs_pct REAL NOT NULL,
    fat_pct REAL NOT NULL,
    allergens_json TEXT NOT NULL,
    sync_status TEXT NOT NULL DEFAULT 'pending',
    last_modified INTEGER NOT NULL,
    remote_version INTEGER NOT NULL DEFAULT 0
)";

/// One DDL statement per opaque-payload collection (fasting sessions,
/// fasting plans, reaction logs, favorites). Shape is identical; table
/// name is the only variable, substituted from `Collection::as_str()`
/// which is never user input.
const OPAQUE_COLLECTION_TABLES: [&str; 4] =
    ["fasting_sessions", "fasting_plans", "reaction_logs", "favorites"];

fn create_opaque_table_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id TEXT PRIMARY KEY,
            user_id TEXT,
            created_at INTEGER NOT NULL,
            payload BLOB NOT NULL,
            sync_status TEXT NOT NULL DEFAULT 'pending',
            last_modified INTEGER NOT NULL,
            remote_version INTEGER NOT NULL DEFAULT 0
        )"
    )
}

fn create_opaque_status_index_sql(table: &str) -> String {
    format!("CREATE INDEX IF NOT EXISTS idx_{table}_sync_status ON {table}(sync_status)")
}

const CREATE_SYNC_QUEUE_SQL: &str = "CREATE TABLE IF NOT EXISTS sync_queue (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL,
    collection TEXT NOT NULL,
    document_id TEXT NOT NULL,
    data BLOB,
    timestamp INTEGER NOT NULL,
    retry_count INTEGER NOT NULL DEFAULT 0,
    next_retry_time INTEGER NOT NULL DEFAULT 0
)";

const CREATE_SYNC_QUEUE_DEDUP_INDEX_SQL: &str = "CREATE UNIQUE INDEX IF NOT EXISTS \
    idx_sync_queue_dedup ON sync_queue(collection, document_id, type)";

const CREATE_SYNC_QUEUE_READY_INDEX_SQL: &str =
    "CREATE INDEX IF NOT EXISTS idx_sync_queue_ready ON sync_queue(next_retry_time, timestamp)";

const CREATE_FAILED_OPERATIONS_SQL: &str = "CREATE TABLE IF NOT EXISTS failed_operations (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL,
    collection TEXT NOT NULL,
    document_id TEXT NOT NULL,
    data BLOB,
    timestamp INTEGER NOT NULL,
    failed_at INTEGER NOT NULL,
    error_message TEXT NOT NULL,
    retry_count INTEGER NOT NULL DEFAULT 0
)";

const CREATE_FAILED_OPERATIONS_LOOKUP_INDEX_SQL: &str = "CREATE INDEX IF NOT EXISTS \
    idx_failed_operations_lookup ON failed_operations(collection, document_id)";

const CREATE_SYNC_CONFLICTS_SQL: &str = "CREATE TABLE IF NOT EXISTS sync_conflicts (
    id TEXT PRIMARY KEY,
    collection TEXT NOT NULL,
    document_id TEXT NOT NULL,
    local_data BLOB NOT NULL,
    server_data BLOB NOT NULL,
    local_version INTEGER NOT NULL,
    server_version INTEGER NOT NULL,
    detected_at INTEGER NOT NULL,
    resolved INTEGER NOT NULL DEFAULT 0
)";

/// Create every table and index idempotently. Safe to call on every open.
pub fn init(conn: &Connection) -> Result<()> {
    conn.execute(CREATE_META_SQL, [])?;

    conn.execute(CREATE_FOOD_LOG_SQL, [])?;
    conn.execute(CREATE_FOOD_LOG_DEDUP_INDEX_SQL, [])?;
    conn.execute(CREATE_FOOD_LOG_STATUS_INDEX_SQL, [])?;

    conn.execute(CREATE_PERISHABLES_SQL, [])?;
    conn.execute(CREATE_PERISHABLES_EXPIRY_INDEX_SQL, [])?;
    conn.execute(CREATE_PERISHABLES_STATUS_INDEX_SQL, [])?;

    conn.execute(CREATE_WEIGHT_ENTRIES_SQL, [])?;
    conn.execute(CREATE_WEIGHT_ENTRIES_STATUS_INDEX_SQL, [])?;

    conn.execute(CREATE_SETTINGS_SQL, [])?;

    for table in OPAQUE_COLLECTION_TABLES {
        conn.execute(&create_opaque_table_sql(table), [])?;
        conn.execute(&create_opaque_status_index_sql(table), [])?;
    }

    conn.execute(CREATE_SYNC_QUEUE_SQL, [])?;
    conn.execute(CREATE_SYNC_QUEUE_DEDUP_INDEX_SQL, [])?;
    conn.execute(CREATE_SYNC_QUEUE_READY_INDEX_SQL, [])?;

    conn.execute(CREATE_FAILED_OPERATIONS_SQL, [])?;
    conn.execute(CREATE_FAILED_OPERATIONS_LOOKUP_INDEX_SQL, [])?;

    conn.execute(CREATE_SYNC_CONFLICTS_SQL, [])?;

    conn.execute(
        "INSERT OR IGNORE INTO store_meta(key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;

    Ok(())
}

/// Run `PRAGMA integrity_check` and report whether the database is sound.
pub fn integrity_check(conn: &Connection) -> Result<bool> {
    let result: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
    let ok = result.eq_ignore_ascii_case("ok");
    if !ok {
        warn!(result = %result, "integrity_check failed");
    } else {
        info!("integrity_check ok");
    }
    Ok(ok)
}

/// Enable write-ahead logging. Returns the resulting journal mode so
/// callers can log it.
pub fn enable_wal(conn: &Connection) -> Result<String> {
    let mode: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
    Ok(mode)
}
