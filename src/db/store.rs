//! `LocalStore` (spec §4.1): the public surface every collection's CRUD
//! goes through, wiring the resurrection guard and sync queue into every
//! write so callers never have to remember to do it themselves.

use std::path::Path;
use std::sync::Arc;

use rusqlite::Connection;
use tracing::instrument;

use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::db::collections::{
    food_log, opaque, perishables,
    settings::{self, SETTINGS_ID},
    weight, FoodLogEntry, OpaqueDocument, PerishableItem, UserSettings, WeightEntry,
};
use crate::db::connection::Db;
use crate::db::conflicts::ConflictLog;
use crate::db::guard::{self, ResurrectionGuard};
use crate::db::housekeeping;
use crate::db::queue::{self, SyncQueue};
use crate::db::version;
use crate::error::Result;
use crate::events::{Event, EventBus};
use crate::types::{Collection, OpType, PullReport};
use serde_json::Value;

pub struct LocalStore {
    db: Arc<Db>,
    queue: Arc<SyncQueue>,
    guard: Arc<ResurrectionGuard>,
    conflicts: Arc<ConflictLog>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    config: SyncConfig,
}

impl LocalStore {
    /// Open the on-disk store, run housekeeping, and report whether the
    /// prior file was corrupt and had to be recreated (spec §4.1 `initialize`).
    #[instrument(skip_all)]
    pub fn open(
        path: impl AsRef<Path>,
        config: SyncConfig,
        clock: Arc<dyn Clock>,
        events: EventBus,
    ) -> Result<(Self, bool)> {
        let (db, recovered) = Db::open(path)?;
        let store = Self::from_db(Arc::new(db), config, clock, events);
        store.initialize(recovered)?;
        Ok((store, recovered))
    }

    pub fn open_in_memory(config: SyncConfig, clock: Arc<dyn Clock>, events: EventBus) -> Result<Self> {
        let db = Db::open_in_memory()?;
        let store = Self::from_db(Arc::new(db), config, clock, events);
        store.initialize(false)?;
        Ok(store)
    }

    fn from_db(db: Arc<Db>, config: SyncConfig, clock: Arc<dyn Clock>, events: EventBus) -> Self {
        let queue = Arc::new(SyncQueue::new(db.clone(), clock.clone(), events.clone()));
        let guard = Arc::new(ResurrectionGuard::new(db.clone(), queue.clone()));
        let conflicts = Arc::new(ConflictLog::new(db.clone(), clock.clone()));
        Self {
            db,
            queue,
            guard,
            conflicts,
            clock,
            events,
            config,
        }
    }

    fn initialize(&self, recovered: bool) -> Result<()> {
        if recovered {
            self.events.publish(Event::DatabaseRecovered);
        }
        let now = self.clock.now();
        let max_age = self.config.stale_tombstone_gc.as_secs() as i64;
        housekeeping::cleanup_deleted_records(&self.db, now, Some(max_age))?;
        Ok(())
    }

    pub fn queue(&self) -> &Arc<SyncQueue> {
        &self.queue
    }

    pub fn guard(&self) -> &Arc<ResurrectionGuard> {
        &self.guard
    }

    pub fn conflicts(&self) -> &Arc<ConflictLog> {
        &self.conflicts
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// "N changes pending" indicator (spec §7).
    pub fn pending_count(&self) -> Result<i64> {
        self.queue.pending_count()
    }

    /// "N changes need attention" indicator (spec §7).
    pub fn failed_count(&self) -> Result<i64> {
        self.queue.failed_count()
    }

    /// Run the stale-tombstone sweep with no age cutoff — called after
    /// every drain cycle (spec §4.4 step 6), not just at `initialize()`.
    pub fn run_housekeeping(&self) -> Result<u64> {
        let now = self.clock.now();
        housekeeping::cleanup_deleted_records(&self.db, now, None)
    }

    /// Sign-out: physically wipe every user-owned row (spec §4.1 `deleteAllUserData`).
    pub fn delete_all_user_data(&self) -> Result<()> {
        self.db.wipe_all()
    }

    /// Hard-delete a row and drop any trace of it from the sync tables —
    /// called by the sync engine once the server confirms a delete (spec §4.4 step 4).
    pub fn hard_delete(&self, collection: Collection, id: &str) -> Result<()> {
        self.db.with_conn(|conn| hard_delete_row(conn, collection, id))
    }

    /// Flip a row's status to `synced` — called by the sync engine after a
    /// successful send (spec §4.4 step 4).
    pub fn mark_synced(&self, collection: Collection, id: &str) -> Result<()> {
        self.db.with_conn(|conn| mark_synced_row(conn, collection, id))
    }

    /// The `remote_version` baseline the sync engine hands to
    /// `RemoteStore::run_conflict_transaction` (spec §4.4.1); `0` if the
    /// document has never been synced.
    pub fn local_version(&self, collection: Collection, id: &str) -> Result<i64> {
        self.db.with_conn(|conn| version::local_version_conn(conn, collection, id))
    }

    /// Stamp the version the remote store assigned after a successful
    /// conflict-resolved write (spec §4.4.1 step 3).
    pub fn set_remote_version(&self, collection: Collection, id: &str, new_version: i64) -> Result<()> {
        self.db
            .with_conn(|conn| version::set_remote_version_conn(conn, collection, id, new_version))
    }

    /// Generic import entry point used by the sync engine's `pullAllData`
    /// (spec §4.4): deserializes a wire `Value` into the collection's
    /// typed entity, applies the same resurrection-guard + pending-op
    /// skip rule every typed `import_*` uses, and stamps `remote_version`
    /// so the next push has a baseline to compare against.
    pub fn import_remote_document(
        &self,
        collection: Collection,
        document_id: &str,
        data: Value,
        remote_version: i64,
    ) -> Result<bool> {
        let now = self.clock.now();
        self.db.with_tx(|tx| {
            if should_skip_import(tx, collection, document_id)? {
                return Ok(false);
            }
            let imported = match collection {
                Collection::FoodLog => {
                    let entry: FoodLogEntry = serde_json::from_value(data)?;
                    food_log::import_upsert(tx, &entry, now)?
                }
                Collection::Perishables => {
                    let item: PerishableItem = serde_json::from_value(data)?;
                    perishables::import_upsert(tx, &item, now)?
                }
                Collection::WeightEntries => {
                    let entry: WeightEntry = serde_json::from_value(data)?;
                    weight::import_upsert(tx, &entry, now)?
                }
                Collection::Settings => {
                    let parsed: UserSettings = serde_json::from_value(data)?;
                    settings::import_upsert(tx, &parsed, now)?
                }
                opaque_collection => {
                    let doc: OpaqueDocument = serde_json::from_value(data)?;
                    opaque::import_upsert(tx, opaque_collection, &doc, now)?
                }
            };
            if imported {
                version::set_remote_version_conn(tx, collection, document_id, remote_version)?;
            }
            Ok(imported)
        })
    }

    /// Queue-level dedup check, shared by all typed `save_*` methods: an
    /// `add` becomes an `update` once the document already exists locally.
    fn save_op_type(&self, existed: bool) -> OpType {
        if existed {
            OpType::Update
        } else {
            OpType::Add
        }
    }

    /// `write` returns the id of the row it actually wrote to — usually
    /// `id`, but for food log saves that fold into an existing row via the
    /// dedup index (P8) it is that existing row's id. The queue entry must
    /// follow the real row, not the id the caller asked to write.
    fn guarded_write(
        &self,
        collection: Collection,
        id: &str,
        op_type: OpType,
        data: Vec<u8>,
        write: impl FnOnce(&Connection, i64) -> Result<String>,
    ) -> Result<bool> {
        if self.guard.blocks_write(collection, id)? {
            return Ok(false);
        }
        let now = self.clock.now();
        let written_id = self.db.with_conn(|conn| write(conn, now))?;
        self.queue.enqueue(op_type, collection, &written_id, Some(&data))?;
        Ok(true)
    }

    // ---- food_log --------------------------------------------------

    pub fn save_food_log(&self, entry: &FoodLogEntry) -> Result<bool> {
        let existed = self.get_food_log(&entry.id)?.is_some();
        let op_type = self.save_op_type(existed);
        let data = serde_json::to_vec(entry)?;
        self.guarded_write(Collection::FoodLog, &entry.id, op_type, data, |conn, now| {
            food_log::upsert(conn, entry, now)
        })
    }

    pub fn get_food_log(&self, id: &str) -> Result<Option<FoodLogEntry>> {
        self.db.with_conn(|conn| food_log::get(conn, id))
    }

    pub fn list_food_log(&self, user_id: &str) -> Result<Vec<FoodLogEntry>> {
        self.db.with_conn(|conn| food_log::list_for_user(conn, user_id))
    }

    pub fn delete_food_log(&self, id: &str) -> Result<()> {
        let now = self.clock.now();
        self.db.with_conn(|conn| food_log::soft_delete(conn, id, now))?;
        self.queue.enqueue(OpType::Delete, Collection::FoodLog, id, None)
    }

    /// Apply a batch of server-authoritative food log entries (spec §4.1
    /// `importFromServer`): anything tombstoned, pending-delete, or with
    /// any other pending local op for the same document is skipped rather
    /// than overwritten, so local work always wins until it drains.
    pub fn import_food_log(&self, entries: &[FoodLogEntry]) -> Result<PullReport> {
        let now = self.clock.now();
        let mut report = PullReport {
            collections_pulled: 1,
            ..Default::default()
        };
        self.db.with_tx(|tx| {
            for entry in entries {
                if should_skip_import(tx, Collection::FoodLog, &entry.id)? {
                    report.documents_skipped += 1;
                    continue;
                }
                if food_log::import_upsert(tx, entry, now)? {
                    report.documents_imported += 1;
                }
            }
            Ok(())
        })?;
        Ok(report)
    }

    // ---- perishables -------------------------------------------------

    pub fn save_perishable(&self, item: &PerishableItem) -> Result<bool> {
        let existed = self.get_perishable(&item.id)?.is_some();
        let op_type = self.save_op_type(existed);
        let data = serde_json::to_vec(item)?;
        self.guarded_write(Collection::Perishables, &item.id, op_type, data, |conn, now| {
            perishables::upsert(conn, item, now)
        })
    }

    pub fn get_perishable(&self, id: &str) -> Result<Option<PerishableItem>> {
        self.db.with_conn(|conn| perishables::get(conn, id))
    }

    pub fn list_perishables_expiring_before(&self, cutoff: i64) -> Result<Vec<PerishableItem>> {
        self.db.with_conn(|conn| perishables::list_expiring_before(conn, cutoff))
    }

    pub fn delete_perishable(&self, id: &str) -> Result<()> {
        let now = self.clock.now();
        self.db.with_conn(|conn| perishables::soft_delete(conn, id, now))?;
        self.queue.enqueue(OpType::Delete, Collection::Perishables, id, None)
    }

    pub fn import_perishables(&self, items: &[PerishableItem]) -> Result<PullReport> {
        let now = self.clock.now();
        let mut report = PullReport {
            collections_pulled: 1,
            ..Default::default()
        };
        self.db.with_tx(|tx| {
            for item in items {
                if should_skip_import(tx, Collection::Perishables, &item.id)? {
                    report.documents_skipped += 1;
                    continue;
                }
                if perishables::import_upsert(tx, item, now)? {
                    report.documents_imported += 1;
                }
            }
            Ok(())
        })?;
        Ok(report)
    }

    // ---- weight_entries -----------------------------------------------

    pub fn save_weight_entry(&self, entry: &WeightEntry) -> Result<bool> {
        let existed = self.get_weight_entry(&entry.id)?.is_some();
        let op_type = self.save_op_type(existed);
        let data = serde_json::to_vec(entry)?;
        self.guarded_write(Collection::WeightEntries, &entry.id, op_type, data, |conn, now| {
            weight::upsert(conn, entry, now)
        })
    }

    pub fn get_weight_entry(&self, id: &str) -> Result<Option<WeightEntry>> {
        self.db.with_conn(|conn| weight::get(conn, id))
    }

    pub fn list_weight_history(&self, limit: i64) -> Result<Vec<WeightEntry>> {
        self.db.with_conn(|conn| weight::list_history(conn, limit))
    }

    pub fn delete_weight_entry(&self, id: &str) -> Result<()> {
        let now = self.clock.now();
        self.db.with_conn(|conn| weight::soft_delete(conn, id, now))?;
        self.queue.enqueue(OpType::Delete, Collection::WeightEntries, id, None)
    }

    pub fn import_weight_entries(&self, entries: &[WeightEntry]) -> Result<PullReport> {
        let now = self.clock.now();
        let mut report = PullReport {
            collections_pulled: 1,
            ..Default::default()
        };
        self.db.with_tx(|tx| {
            for entry in entries {
                if should_skip_import(tx, Collection::WeightEntries, &entry.id)? {
                    report.documents_skipped += 1;
                    continue;
                }
                if weight::import_upsert(tx, entry, now)? {
                    report.documents_imported += 1;
                }
            }
            Ok(())
        })?;
        Ok(report)
    }

    // ---- settings (singleton) -----------------------------------------

    pub fn save_settings(&self, settings: &UserSettings) -> Result<bool> {
        let existed = self.get_settings()?.is_some();
        let op_type = self.save_op_type(existed);
        let data = serde_json::to_vec(settings)?;
        self.guarded_write(Collection::Settings, SETTINGS_ID, op_type, data, |conn, now| {
            self::settings::upsert(conn, settings, now)
        })
    }

    pub fn get_settings(&self) -> Result<Option<UserSettings>> {
        self.db.with_conn(self::settings::get)
    }

    pub fn import_settings(&self, settings: &UserSettings) -> Result<bool> {
        let now = self.clock.now();
        self.db.with_tx(|tx| {
            if should_skip_import(tx, Collection::Settings, SETTINGS_ID)? {
                return Ok(false);
            }
            self::settings::import_upsert(tx, settings, now)
        })
    }

    // ---- opaque-payload collections (fasting, reactions, favorites) ---

    pub fn save_opaque(&self, collection: Collection, doc: &OpaqueDocument) -> Result<bool> {
        debug_assert!(collection.is_opaque_payload());
        let existed = self.get_opaque(collection, &doc.id)?.is_some();
        let op_type = self.save_op_type(existed);
        let data = serde_json::to_vec(doc)?;
        self.guarded_write(collection, &doc.id, op_type, data, |conn, now| {
            opaque::upsert(conn, collection, doc, now)
        })
    }

    pub fn get_opaque(&self, collection: Collection, id: &str) -> Result<Option<OpaqueDocument>> {
        self.db.with_conn(|conn| opaque::get(conn, collection, id))
    }

    pub fn list_opaque_for_user(&self, collection: Collection, user_id: &str) -> Result<Vec<OpaqueDocument>> {
        self.db.with_conn(|conn| opaque::list_for_user(conn, collection, user_id))
    }

    pub fn delete_opaque(&self, collection: Collection, id: &str) -> Result<()> {
        debug_assert!(collection.is_opaque_payload());
        let now = self.clock.now();
        self.db.with_conn(|conn| opaque::soft_delete(conn, collection, id, now))?;
        self.queue.enqueue(OpType::Delete, collection, id, None)
    }

    pub fn import_opaque(&self, collection: Collection, docs: &[OpaqueDocument]) -> Result<PullReport> {
        debug_assert!(collection.is_opaque_payload());
        let now = self.clock.now();
        let mut report = PullReport {
            collections_pulled: 1,
            ..Default::default()
        };
        self.db.with_tx(|tx| {
            for doc in docs {
                if should_skip_import(tx, collection, &doc.id)? {
                    report.documents_skipped += 1;
                    continue;
                }
                if opaque::import_upsert(tx, collection, doc, now)? {
                    report.documents_imported += 1;
                }
            }
            Ok(())
        })?;
        Ok(report)
    }
}

/// A document is skipped on import if it is tombstoned, has a pending
/// delete, or has *any* other pending local op — local work always wins
/// until it drains (spec §4.1, §4.3).
fn should_skip_import(conn: &Connection, collection: Collection, id: &str) -> Result<bool> {
    Ok(guard::blocks_write_conn(conn, collection, id)?
        || queue::has_any_pending_conn(conn, collection, id)?)
}

fn hard_delete_row(conn: &Connection, collection: Collection, id: &str) -> Result<()> {
    match collection {
        Collection::FoodLog => food_log::hard_delete(conn, id),
        Collection::Perishables => perishables::hard_delete(conn, id),
        Collection::WeightEntries => weight::hard_delete(conn, id),
        Collection::Settings => {
            conn.execute("DELETE FROM settings WHERE id = ?1", [id])?;
            Ok(())
        }
        opaque_collection => opaque::hard_delete(conn, opaque_collection, id),
    }
}

fn mark_synced_row(conn: &Connection, collection: Collection, id: &str) -> Result<()> {
    match collection {
        Collection::FoodLog => food_log::mark_synced(conn, id),
        Collection::Perishables => perishables::mark_synced(conn, id),
        Collection::WeightEntries => weight::mark_synced(conn, id),
        Collection::Settings => self::settings::mark_synced(conn),
        opaque_collection => opaque::mark_synced(conn, opaque_collection, id),
    }
}
