//! `SyncEngine` (spec §4.4): the network-aware drainer. Pushes ready queue
//! operations to the remote store with conflict resolution, a circuit
//! breaker, and bounded batch concurrency; pulls remote collections into
//! the local store under an auth-generation guard.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use futures_util::stream::{FuturesUnordered, StreamExt};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::clock::Clock;
use crate::config::SyncConfig;
use crate::db::store::LocalStore;
use crate::error::{ErrorKind, Result, StoreError};
use crate::events::{ConflictPayload, Event, EventBus, SyncCompletedPayload, SyncFailedPayload};
use crate::sync::circuit_breaker::CircuitBreaker;
use crate::sync::remote::{AuthProvider, NetworkMonitor, RemoteStore};
use crate::types::{Collection, DrainReport, OpType, PendingOp, PullReport};

/// Result of [`SyncEngine::drain_report`]; an alias so call sites read the
/// way the spec names the concept (`DrainOutcome`) without a duplicate type.
pub type DrainOutcome = DrainReport;

/// Outcome of [`SyncEngine::pull_all_data`] (spec §4.4.5): a mid-flight
/// auth change aborts rather than applying partial data to the wrong user.
#[derive(Debug, Clone)]
pub enum PullOutcome {
    Completed(PullReport),
    AuthChanged,
}

pub struct SyncEngine {
    store: Arc<LocalStore>,
    remote: Arc<dyn RemoteStore>,
    auth: Arc<dyn AuthProvider>,
    network: Arc<dyn NetworkMonitor>,
    events: EventBus,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
    circuit: CircuitBreaker,
    is_syncing: AtomicBool,
    last_attempt_at: AtomicI64,
}

impl SyncEngine {
    pub fn new(
        store: Arc<LocalStore>,
        remote: Arc<dyn RemoteStore>,
        auth: Arc<dyn AuthProvider>,
        network: Arc<dyn NetworkMonitor>,
        events: EventBus,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
    ) -> Self {
        let circuit = CircuitBreaker::new(clock.clone(), &config);
        Self {
            store,
            remote,
            auth,
            network,
            events,
            clock,
            config,
            circuit,
            is_syncing: AtomicBool::new(false),
            last_attempt_at: AtomicI64::new(0),
        }
    }

    pub fn network(&self) -> &Arc<dyn NetworkMonitor> {
        &self.network
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Atomic `tryStartSync()` (spec §4.4 drain step 1, §5 mutual
    /// exclusion). No reentrancy: a second caller observing `true` simply
    /// does not get the gate.
    fn try_start_sync(&self) -> bool {
        self.is_syncing
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn release_sync(&self) {
        self.is_syncing.store(false, Ordering::SeqCst);
    }

    /// Fire-and-forget (spec §4.4 `triggerSync`): returns immediately.
    /// No-ops unless connected, idle since at least `min_sync_interval`,
    /// and not already syncing. Callers that need the result should use
    /// [`Self::force_sync`] instead.
    pub fn trigger_sync(self: &Arc<Self>) {
        if !self.network.is_connected() {
            return;
        }
        let now = self.clock.now();
        let last = self.last_attempt_at.load(Ordering::SeqCst);
        let min_interval = self.config.min_sync_interval.as_secs() as i64;
        if now - last < min_interval {
            return;
        }
        if self.is_syncing.load(Ordering::SeqCst) {
            return;
        }
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(err) = engine.force_sync().await {
                warn!(error = %err, "triggered sync failed");
            }
        });
    }

    /// Awaitable drain (spec §4.4 `forceSync`): ignores `min_sync_interval`
    /// but still respects connectivity and the `isSyncing` gate.
    #[instrument(skip(self))]
    pub async fn force_sync(&self) -> Result<DrainOutcome> {
        if !self.network.is_connected() {
            return Err(StoreError::NoNetwork);
        }
        if !self.try_start_sync() {
            return Err(StoreError::SyncInProgress);
        }
        self.last_attempt_at.store(self.clock.now(), Ordering::SeqCst);
        let outcome = self.drain().await;
        self.release_sync();
        outcome
    }

    /// Drain algorithm (spec §4.4 steps 2-6). Assumes the `isSyncing` gate
    /// is already held by the caller.
    async fn drain(&self) -> Result<DrainOutcome> {
        let mut report = DrainOutcome::default();

        let ready = self.store.queue().ready_operations()?;
        if ready.is_empty() {
            return Ok(report);
        }

        if self.circuit.is_open() {
            debug!("circuit breaker open; skipping drain");
            return Ok(report);
        }

        for batch in ready.chunks(self.config.max_concurrent_operations) {
            let mut futures = FuturesUnordered::new();
            for op in batch {
                futures.push(self.process_op(op.clone()));
            }

            let mut attempted = 0usize;
            let mut failed = 0usize;
            while let Some(outcome) = futures.next().await {
                attempted += 1;
                report.attempted += 1;
                match outcome {
                    OpOutcome::Succeeded { conflicted } => {
                        report.succeeded += 1;
                        if conflicted {
                            report.conflicts_detected += 1;
                        }
                    }
                    OpOutcome::Retried => {
                        report.retried += 1;
                        failed += 1;
                    }
                    OpOutcome::DeadLettered => {
                        report.dead_lettered += 1;
                        report.new_failures += 1;
                        failed += 1;
                    }
                }
            }
            self.circuit.record_batch(attempted, failed);
            if self.circuit.is_open() {
                info!("circuit breaker tripped mid-drain; stopping remaining batches");
                break;
            }
        }

        self.store.run_housekeeping()?;
        report.total_failures = self.store.failed_count()? as usize;

        self.events.publish(Event::SyncCompleted(SyncCompletedPayload {
            new_failures: report.new_failures,
            total_failures: report.total_failures,
        }));
        if report.new_failures > 0 {
            self.events
                .publish(Event::SyncOperationsFailed(SyncFailedPayload { count: report.new_failures }));
        }

        Ok(report)
    }

    /// One queue row through the send path (spec §4.4 step 5).
    async fn process_op(&self, op: PendingOp) -> OpOutcome {
        if op.op_type.is_write() {
            let blocked = self
                .store
                .guard()
                .blocks_write(op.collection, &op.document_id)
                .unwrap_or(false);
            if blocked {
                // The delete will do the remote work; this write is a no-op.
                let _ = self.store.queue().remove(&op.id);
                return OpOutcome::Succeeded { conflicted: false };
            }
        }

        let result = self.run_with_timeout(self.send_one(&op)).await;

        match result {
            Ok(conflicted) => {
                let _ = self.store.queue().remove(&op.id);
                match op.op_type {
                    OpType::Delete => {
                        let _ = self.store.hard_delete(op.collection, &op.document_id);
                    }
                    OpType::Add | OpType::Update => {
                        let _ = self.store.mark_synced(op.collection, &op.document_id);
                    }
                }
                OpOutcome::Succeeded { conflicted }
            }
            Err(err) => self.handle_failure(&op, err),
        }
    }

    async fn run_with_timeout<F>(&self, fut: F) -> Result<bool>
    where
        F: Future<Output = Result<bool>>,
    {
        match tokio::time::timeout(self.config.transaction_timeout, fut).await {
            Ok(inner) => inner,
            Err(_) => Err(StoreError::TransactionTimeout),
        }
    }

    /// The remote write for a single op. Returns whether a conflict was
    /// detected and recorded (spec §4.4.1).
    async fn send_one(&self, op: &PendingOp) -> Result<bool> {
        match op.op_type {
            OpType::Delete => {
                self.remote.delete_document(op.collection, &op.document_id).await?;
                Ok(false)
            }
            OpType::Add | OpType::Update => {
                let data = op
                    .data
                    .as_ref()
                    .ok_or(StoreError::MissingData)?;
                let value: Value = serde_json::from_slice(data).map_err(|e| StoreError::DecodingFailed(e.to_string()))?;
                let local_version = self.store.local_version(op.collection, &op.document_id)?;
                let outcome = self
                    .remote
                    .run_conflict_transaction(op.collection, &op.document_id, value, local_version)
                    .await?;
                self.store
                    .set_remote_version(op.collection, &op.document_id, outcome.written_version)?;
                if let Some(conflict) = outcome.conflict {
                    self.store.conflicts().record(
                        op.collection,
                        &op.document_id,
                        op.data.as_deref().unwrap_or_default(),
                        &serde_json::to_vec(&conflict.server_data).unwrap_or_default(),
                        conflict.local_version,
                        conflict.server_version,
                    )?;
                    self.events.publish(Event::SyncConflictDetected(ConflictPayload {
                        collection: op.collection,
                        document_id: op.document_id.clone(),
                    }));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }

    /// Retry-vs-dead-letter decision (spec §4.4 step 5, §7 taxonomy).
    fn handle_failure(&self, op: &PendingOp, err: StoreError) -> OpOutcome {
        warn!(collection = %op.collection, document_id = %op.document_id, retry_count = op.retry_count, error = %err, "sync op failed");

        if err.kind() == ErrorKind::Permanent || op.retry_count >= self.config.max_retry {
            let _ = self.store.queue().dead_letter(op, &err.to_string());
            return OpOutcome::DeadLettered;
        }

        let backoff = self.config.backoff_for(op.retry_count);
        let _ = self
            .store
            .queue()
            .increment_retry(&op.id, backoff.as_secs() as i64);
        OpOutcome::Retried
    }

    /// `pullAllData` (spec §4.4): fetch every collection and import,
    /// aborting without applying partial data if the signed-in user
    /// changes mid-flight (spec §4.4.5).
    #[instrument(skip(self))]
    pub async fn pull_all_data(&self) -> Result<PullOutcome> {
        let token = self.auth.capture_auth_state();
        let mut report = PullReport::default();
        let cutoff = self.clock.now() - self.config.initial_pull_window.as_secs() as i64;

        for collection in Collection::ALL {
            let documents = self.remote.list_documents(collection).await?;
            if self.auth.check_unchanged(&token).is_err() {
                return Ok(PullOutcome::AuthChanged);
            }

            report.collections_pulled += 1;
            for doc in documents {
                if collection == Collection::FoodLog && !within_pull_window(&doc.data, cutoff) {
                    report.documents_skipped += 1;
                    continue;
                }
                let document_id = document_id_of(collection, &doc.data);
                let Some(document_id) = document_id else {
                    report.documents_skipped += 1;
                    continue;
                };
                match self
                    .store
                    .import_remote_document(collection, &document_id, doc.data.clone(), doc.version)
                {
                    Ok(true) => report.documents_imported += 1,
                    Ok(false) => report.documents_skipped += 1,
                    Err(err) => {
                        warn!(%collection, document_id, error = %err, "import failed");
                        report.documents_skipped += 1;
                    }
                }
            }
        }

        Ok(PullOutcome::Completed(report))
    }
}

enum OpOutcome {
    Succeeded { conflicted: bool },
    Retried,
    DeadLettered,
}

/// The settings table is a singleton keyed `"current"` with no `id` field
/// of its own (spec §3, §9 open question); every other collection's wire
/// shape carries its own `id`.
fn document_id_of(collection: Collection, data: &Value) -> Option<String> {
    if collection == Collection::Settings {
        return Some(crate::db::collections::settings::SETTINGS_ID.to_string());
    }
    data.get("id").and_then(Value::as_str).map(str::to_owned)
}

/// Only food log entries within `initial_pull_window` (spec §6) are
/// rehydrated on pull; every other collection pulls in full (spec E6:
/// "90 days of food entries plus full inventories").
fn within_pull_window(data: &Value, cutoff: i64) -> bool {
    data.get("consumed_date")
        .and_then(Value::as_i64)
        .map(|consumed| consumed >= cutoff)
        .unwrap_or(true)
}
