//! `SyncQueue` (spec §4.2): durable FIFO with per-document dedup and
//! backoff-aware selection over the `sync_queue` / `failed_operations`
//! tables.

use std::str::FromStr;
use std::sync::Arc;

use rusqlite::{params, OptionalExtension};
use tracing::debug;
use uuid::Uuid;

use crate::clock::Clock;
use crate::db::connection::Db;
use crate::error::Result;
use crate::events::{Event, EventBus};
use crate::types::{Collection, FailedOp, OpType, PendingOp};

pub struct SyncQueue {
    db: Arc<Db>,
    clock: Arc<dyn Clock>,
    events: EventBus,
}

impl SyncQueue {
    pub fn new(db: Arc<Db>, clock: Arc<dyn Clock>, events: EventBus) -> Self {
        Self { db, clock, events }
    }

    /// Insert or update the queue row for `(collection, document_id, op_type)`
    /// (spec I4). Resets backoff state on every call — a fresh edit
    /// deserves an immediate retry, not whatever backoff a prior failed
    /// attempt had accrued.
    pub fn enqueue(
        &self,
        op_type: OpType,
        collection: Collection,
        document_id: &str,
        data: Option<&[u8]>,
    ) -> Result<()> {
        let now = self.clock.now();
        self.db.with_conn(|conn| {
            let existing: Option<String> = conn
                .query_row(
                    "SELECT id FROM sync_queue WHERE collection = ?1 AND document_id = ?2 AND type = ?3",
                    params![collection.as_str(), document_id, op_type.as_str()],
                    |row| row.get(0),
                )
                .optional()?;

            match existing {
                Some(id) => {
                    conn.execute(
                        "UPDATE sync_queue SET data = ?1, timestamp = ?2, retry_count = 0, next_retry_time = 0 \
                         WHERE id = ?3",
                        params![data, now, id],
                    )?;
                }
                None => {
                    let id = Uuid::new_v4().to_string();
                    conn.execute(
                        "INSERT INTO sync_queue (id, type, collection, document_id, data, timestamp, retry_count, next_retry_time) \
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0)",
                        params![id, op_type.as_str(), collection.as_str(), document_id, data, now],
                    )?;
                }
            }
            Ok(())
        })?;

        debug!(%collection, document_id, %op_type, "enqueued sync op");
        self.events.publish(Event::PendingSync);
        Ok(())
    }

    /// Rows whose backoff has elapsed, oldest first (spec P4).
    pub fn ready_operations(&self) -> Result<Vec<PendingOp>> {
        let now = self.clock.now();
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, type, collection, document_id, data, timestamp, retry_count, next_retry_time \
                 FROM sync_queue WHERE next_retry_time <= ?1 ORDER BY timestamp ASC",
            )?;
            let rows = stmt
                .query_map(params![now], row_to_pending_op)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn increment_retry(&self, id: &str, backoff_seconds: i64) -> Result<()> {
        let next_retry_at = self.clock.now() + backoff_seconds;
        self.db.with_conn(|conn| {
            conn.execute(
                "UPDATE sync_queue SET retry_count = retry_count + 1, next_retry_time = ?1 WHERE id = ?2",
                params![next_retry_at, id],
            )?;
            Ok(())
        })
    }

    pub fn remove(&self, id: &str) -> Result<()> {
        self.db.with_conn(|conn| {
            conn.execute("DELETE FROM sync_queue WHERE id = ?1", params![id])?;
            Ok(())
        })
    }

    /// Move `op` into `failed_operations` and drop it from the active
    /// queue. If a `delete` has since been enqueued for the same document
    /// while `op` (an `add`/`update`) was retrying, the dead-letter is
    /// superseded and discarded rather than recorded (DESIGN.md: resolved
    /// open question).
    pub fn dead_letter(&self, op: &PendingOp, error_message: &str) -> Result<()> {
        let now = self.clock.now();
        self.db.with_conn(|conn| {
            if op.op_type.is_write() {
                let superseded: Option<String> = conn
                    .query_row(
                        "SELECT id FROM sync_queue WHERE collection = ?1 AND document_id = ?2 AND type = 'delete'",
                        params![op.collection.as_str(), op.document_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                if superseded.is_some() {
                    conn.execute("DELETE FROM sync_queue WHERE id = ?1", params![op.id])?;
                    return Ok(());
                }
            }

            conn.execute(
                "INSERT INTO failed_operations (id, type, collection, document_id, data, timestamp, failed_at, error_message, retry_count) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    op.id,
                    op.op_type.as_str(),
                    op.collection.as_str(),
                    op.document_id,
                    op.data,
                    op.enqueued_at,
                    now,
                    error_message,
                    op.retry_count,
                ],
            )?;
            conn.execute("DELETE FROM sync_queue WHERE id = ?1", params![op.id])?;
            Ok(())
        })
    }

    /// Move a dead-lettered op back into the active queue with a fresh id
    /// and reset retry state.
    pub fn retry_failed(&self, failed_op_id: &str) -> Result<()> {
        let now = self.clock.now();
        self.db.with_conn(|conn| {
            let failed = conn
                .query_row(
                    "SELECT id, type, collection, document_id, data, timestamp, retry_count \
                     FROM failed_operations WHERE id = ?1",
                    params![failed_op_id],
                    |row| {
                        Ok((
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, Option<Vec<u8>>>(4)?,
                        ))
                    },
                )
                .optional()?;

            let Some((op_type, collection, document_id, data)) = failed else {
                return Ok(());
            };

            let new_id = Uuid::new_v4().to_string();
            conn.execute(
                "INSERT INTO sync_queue (id, type, collection, document_id, data, timestamp, retry_count, next_retry_time) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, 0)",
                params![new_id, op_type, collection, document_id, data, now],
            )?;
            conn.execute(
                "DELETE FROM failed_operations WHERE id = ?1",
                params![failed_op_id],
            )?;
            Ok(())
        })
    }

    pub fn list_failed(&self) -> Result<Vec<FailedOp>> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, type, collection, document_id, data, timestamp, failed_at, error_message, retry_count \
                 FROM failed_operations ORDER BY failed_at ASC",
            )?;
            let rows = stmt
                .query_map([], row_to_failed_op)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// `SELECT COUNT(*) FROM sync_queue` — backs the "N changes pending"
    /// indicator (spec §7).
    pub fn pending_count(&self) -> Result<i64> {
        self.db
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM sync_queue", [], |r| r.get(0))?))
    }

    /// `SELECT COUNT(*) FROM failed_operations` — backs the "N changes
    /// need attention" indicator (spec §7).
    pub fn failed_count(&self) -> Result<i64> {
        self.db.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM failed_operations", [], |r| r.get(0))?)
        })
    }

    /// Whether a pending `delete` exists for `(collection, document_id)`
    /// (ResurrectionGuard predicate, spec §4.3 — kept here since it reads
    /// the same table this module owns; re-exported via `db::guard`).
    pub fn has_pending_delete(&self, collection: Collection, document_id: &str) -> Result<bool> {
        self.db
            .with_conn(|conn| has_pending_delete_conn(conn, collection, document_id))
    }

    /// Whether *any* op is pending for `(collection, document_id)`,
    /// regardless of type — used by `importFromServer` to decide that
    /// local work wins until flushed (spec §4.1).
    pub fn has_any_pending(&self, collection: Collection, document_id: &str) -> Result<bool> {
        self.db
            .with_conn(|conn| has_any_pending_conn(conn, collection, document_id))
    }
}

/// Connection-level version of [`SyncQueue::has_pending_delete`], usable
/// from inside an already-open transaction (e.g. `importFromServer`)
/// without re-locking the single writer mutex.
pub fn has_pending_delete_conn(
    conn: &rusqlite::Connection,
    collection: Collection,
    document_id: &str,
) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sync_queue WHERE collection = ?1 AND document_id = ?2 AND type = 'delete'",
        params![collection.as_str(), document_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Connection-level version of [`SyncQueue::has_any_pending`].
pub fn has_any_pending_conn(
    conn: &rusqlite::Connection,
    collection: Collection,
    document_id: &str,
) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sync_queue WHERE collection = ?1 AND document_id = ?2",
        params![collection.as_str(), document_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn row_to_pending_op(row: &rusqlite::Row) -> rusqlite::Result<PendingOp> {
    let op_type: String = row.get(1)?;
    let collection: String = row.get(2)?;
    Ok(PendingOp {
        id: row.get(0)?,
        op_type: OpType::from_str(&op_type).unwrap_or(OpType::Update),
        collection: Collection::from_str(&collection).unwrap_or(Collection::FoodLog),
        document_id: row.get(3)?,
        data: row.get(4)?,
        enqueued_at: row.get(5)?,
        retry_count: row.get(6)?,
        next_retry_at: row.get(7)?,
    })
}

fn row_to_failed_op(row: &rusqlite::Row) -> rusqlite::Result<FailedOp> {
    let op_type: String = row.get(1)?;
    let collection: String = row.get(2)?;
    Ok(FailedOp {
        id: row.get(0)?,
        op_type: OpType::from_str(&op_type).unwrap_or(OpType::Update),
        collection: Collection::from_str(&collection).unwrap_or(Collection::FoodLog),
        document_id: row.get(3)?,
        data: row.get(4)?,
        enqueued_at: row.get(5)?,
        failed_at: row.get(6)?,
        error_message: row.get(7)?,
        retry_count: row.get(8)?,
    })
}
