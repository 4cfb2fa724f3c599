//! Shared value types used across the store and the sync engine.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// The collections this store knows how to persist and sync.
///
/// New collections are added here and nowhere else needs to branch on a
/// raw string — every table name, queue row, and conflict record uses
/// this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    FoodLog,
    Perishables,
    WeightEntries,
    Settings,
    FastingSessions,
    FastingPlans,
    ReactionLogs,
    Favorites,
}

impl Collection {
    pub const ALL: [Collection; 8] = [
        Collection::FoodLog,
        Collection::Perishables,
        Collection::WeightEntries,
        Collection::Settings,
        Collection::FastingSessions,
        Collection::FastingPlans,
        Collection::ReactionLogs,
        Collection::Favorites,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::FoodLog => "food_log",
            Collection::Perishables => "perishables",
            Collection::WeightEntries => "weight_entries",
            Collection::Settings => "settings",
            Collection::FastingSessions => "fasting_sessions",
            Collection::FastingPlans => "fasting_plans",
            Collection::ReactionLogs => "reaction_logs",
            Collection::Favorites => "favorites",
        }
    }

    /// Whether rows in this collection carry a payload blob rather than
    /// individually-typed columns (spec §3: fasting/reactions/favorites).
    pub fn is_opaque_payload(&self) -> bool {
        matches!(
            self,
            Collection::FastingSessions
                | Collection::FastingPlans
                | Collection::ReactionLogs
                | Collection::Favorites
        )
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Collection {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "food_log" => Ok(Collection::FoodLog),
            "perishables" => Ok(Collection::Perishables),
            "weight_entries" => Ok(Collection::WeightEntries),
            "settings" => Ok(Collection::Settings),
            "fasting_sessions" => Ok(Collection::FastingSessions),
            "fasting_plans" => Ok(Collection::FastingPlans),
            "reaction_logs" => Ok(Collection::ReactionLogs),
            "favorites" => Ok(Collection::Favorites),
            other => Err(StoreError::UnknownCollection(other.to_string())),
        }
    }
}

/// The kind of mutation a `sync_queue` row represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpType {
    Add,
    Update,
    Delete,
}

impl OpType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OpType::Add => "add",
            OpType::Update => "update",
            OpType::Delete => "delete",
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, OpType::Add | OpType::Update)
    }
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OpType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(OpType::Add),
            "update" => Ok(OpType::Update),
            "delete" => Ok(OpType::Delete),
            other => Err(StoreError::DecodingFailed(format!(
                "invalid op type: {other}"
            ))),
        }
    }
}

/// Per-row sync lifecycle status (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncStatus {
    Pending,
    Synced,
    Failed,
    Deleted,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Failed => "failed",
            SyncStatus::Deleted => "deleted",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(SyncStatus::Pending),
            "synced" => Ok(SyncStatus::Synced),
            "failed" => Ok(SyncStatus::Failed),
            "deleted" => Ok(SyncStatus::Deleted),
            other => Err(StoreError::DecodingFailed(format!(
                "invalid sync status: {other}"
            ))),
        }
    }
}

/// A pending operation row as read back from `sync_queue`.
#[derive(Debug, Clone)]
pub struct PendingOp {
    pub id: String,
    pub op_type: OpType,
    pub collection: Collection,
    pub document_id: String,
    pub data: Option<Vec<u8>>,
    pub enqueued_at: i64,
    pub retry_count: u32,
    pub next_retry_at: i64,
}

/// A dead-lettered operation as read back from `failed_operations`.
#[derive(Debug, Clone)]
pub struct FailedOp {
    pub id: String,
    pub op_type: OpType,
    pub collection: Collection,
    pub document_id: String,
    pub data: Option<Vec<u8>>,
    pub enqueued_at: i64,
    pub failed_at: i64,
    pub error_message: String,
    pub retry_count: u32,
}

/// A recorded conflict between a local and a server document (spec §4.4.1).
#[derive(Debug, Clone)]
pub struct ConflictRecord {
    pub id: String,
    pub collection: Collection,
    pub document_id: String,
    pub local_data: Vec<u8>,
    pub server_data: Vec<u8>,
    pub local_version: i64,
    pub server_version: i64,
    pub detected_at: i64,
    pub resolved: bool,
}

impl ConflictRecord {
    pub fn key(collection: Collection, document_id: &str) -> String {
        format!("{collection}_{document_id}")
    }
}

/// Outcome of draining the sync queue once (spec §4.4 step 6).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DrainReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub retried: usize,
    pub dead_lettered: usize,
    pub new_failures: usize,
    pub total_failures: usize,
    pub conflicts_detected: usize,
}

/// Outcome of a full `pull_all_data` pass (spec §4.4).
#[derive(Debug, Clone, Default)]
pub struct PullReport {
    pub collections_pulled: usize,
    pub documents_imported: usize,
    pub documents_skipped: usize,
}
