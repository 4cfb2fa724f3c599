//! ResurrectionGuard (spec §4.3): the single chokepoint that stops a
//! deleted document from reappearing via a late save or an import.

use std::sync::Arc;

use crate::db::connection::Db;
use crate::db::queue::{self, SyncQueue};
use crate::error::Result;
use crate::types::Collection;

pub struct ResurrectionGuard {
    db: Arc<Db>,
    queue: Arc<SyncQueue>,
}

impl ResurrectionGuard {
    pub fn new(db: Arc<Db>, queue: Arc<SyncQueue>) -> Self {
        Self { db, queue }
    }

    /// True if a row for `(collection, document_id)` exists locally with
    /// `sync_status = 'deleted'`.
    pub fn is_tombstoned(&self, collection: Collection, document_id: &str) -> Result<bool> {
        self.db
            .with_conn(|conn| is_tombstoned_conn(conn, collection, document_id))
    }

    /// True if a `delete` op is queued for `(collection, document_id)`.
    pub fn has_pending_delete(&self, collection: Collection, document_id: &str) -> Result<bool> {
        self.queue.has_pending_delete(collection, document_id)
    }

    /// Convenience: either predicate holding forbids an (add|update) apply
    /// (spec §4.3 contract), both locally and at send time in the engine.
    pub fn blocks_write(&self, collection: Collection, document_id: &str) -> Result<bool> {
        Ok(self.is_tombstoned(collection, document_id)?
            || self.has_pending_delete(collection, document_id)?)
    }
}

/// Connection-level version of [`ResurrectionGuard::is_tombstoned`], usable
/// from inside an already-open transaction.
pub fn is_tombstoned_conn(
    conn: &rusqlite::Connection,
    collection: Collection,
    document_id: &str,
) -> Result<bool> {
    let count: i64 = conn.query_row(
        &format!(
            "SELECT COUNT(*) FROM {} WHERE id = ?1 AND sync_status = 'deleted'",
            collection.as_str()
        ),
        [document_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Connection-level version of [`ResurrectionGuard::blocks_write`].
pub fn blocks_write_conn(
    conn: &rusqlite::Connection,
    collection: Collection,
    document_id: &str,
) -> Result<bool> {
    Ok(is_tombstoned_conn(conn, collection, document_id)?
        || queue::has_pending_delete_conn(conn, collection, document_id)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::events::EventBus;
    use crate::types::OpType;

    fn harness() -> (Arc<Db>, ResurrectionGuard) {
        let db = Arc::new(Db::open_in_memory().unwrap());
        let clock: Arc<dyn crate::clock::Clock> = Arc::new(FakeClock::default());
        let queue = Arc::new(SyncQueue::new(db.clone(), clock, EventBus::new()));
        let guard = ResurrectionGuard::new(db.clone(), queue);
        (db, guard)
    }

    #[test]
    fn blocks_write_when_tombstoned() {
        let (db, guard) = harness();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO food_log (id, user_id, food_name, serving_size, serving_unit, calories, protein_g, carbs_g, fat_g, meal_type, consumed_date, logged_at, sync_status, last_modified) \
                 VALUES ('f1', 'u1', 'Egg', 1.0, 'unit', 70.0, 6.0, 0.5, 5.0, 'breakfast', 100, 100, 'deleted', 100)",
                [],
            )?;
            Ok(())
        }).unwrap();

        assert!(guard.is_tombstoned(Collection::FoodLog, "f1").unwrap());
        assert!(guard.blocks_write(Collection::FoodLog, "f1").unwrap());
    }

    #[test]
    fn blocks_write_when_pending_delete_queued() {
        let (_db, guard) = harness();
        guard
            .queue
            .enqueue(OpType::Delete, Collection::FoodLog, "f2", None)
            .unwrap();
        assert!(!guard.is_tombstoned(Collection::FoodLog, "f2").unwrap());
        assert!(guard.has_pending_delete(Collection::FoodLog, "f2").unwrap());
        assert!(guard.blocks_write(Collection::FoodLog, "f2").unwrap());
    }

    #[test]
    fn does_not_block_when_neither_holds() {
        let (_db, guard) = harness();
        assert!(!guard.blocks_write(Collection::FoodLog, "f3").unwrap());
    }
}
