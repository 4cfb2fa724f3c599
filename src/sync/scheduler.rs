//! Scheduler glue (spec §2 "Scheduler glue", §4.4.4): foreground/background
//! lifecycle, the periodic pull timer, and the debounced network-reconnect
//! task. Grounded on the teacher crate's `SyncScheduler` (interval-driven
//! background sync re-armed on foreground, invalidated on background) and
//! spec §5's "small critical section" guidance for the debounce handle.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::sync::engine::{PullOutcome, SyncEngine};

/// Owns the two cancellable background tasks the engine itself does not
/// run on its own: the periodic pull timer and the debounced
/// network-reconnect trigger. Both handles are guarded by a small mutex
/// (spec §5 "Network state... and the pending debounce task are each
/// guarded by a small critical section") rather than held across awaits.
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    periodic_pull: Mutex<Option<JoinHandle<()>>>,
    reconnect_debounce: Mutex<Option<JoinHandle<()>>>,
    network_listener: Mutex<Option<JoinHandle<()>>>,
}

impl SyncScheduler {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self {
            engine,
            periodic_pull: Mutex::new(None),
            reconnect_debounce: Mutex::new(None),
            network_listener: Mutex::new(None),
        }
    }

    /// Start listening for connectivity edges. Safe to call once; a
    /// second call replaces the prior listener task.
    pub fn start(self: &Arc<Self>) {
        let mut rx = self.engine.network().subscribe();
        let scheduler = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut was_connected = *rx.borrow();
            loop {
                if rx.changed().await.is_err() {
                    break;
                }
                let connected = *rx.borrow();
                if connected && !was_connected {
                    scheduler.on_network_reconnect();
                }
                was_connected = connected;
            }
        });
        *self.network_listener.lock() = Some(handle);
    }

    /// Disconnect → connect edge (spec §4.4.4): debounce
    /// `network_reconnect_debounce`, restarting the window on every new
    /// edge so interface flapping collapses into a single drain.
    fn on_network_reconnect(self: &Arc<Self>) {
        let mut slot = self.reconnect_debounce.lock();
        if let Some(prev) = slot.take() {
            prev.abort();
        }
        let scheduler = Arc::clone(self);
        let debounce = scheduler.engine.config().network_reconnect_debounce;
        *slot = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            debug!("network reconnect debounce elapsed; triggering sync");
            scheduler.engine.trigger_sync();
        }));
    }

    /// App entered foreground (spec §4.4.4): trigger a sync immediately
    /// and re-arm the periodic pull timer.
    pub fn on_foreground(self: &Arc<Self>) {
        self.engine.trigger_sync();
        self.arm_periodic_pull();
    }

    /// App entered background: cancel the periodic pull timer to
    /// preserve battery. The reconnect debounce and any in-flight drain
    /// are left alone — they are short-lived and near completion either way.
    pub fn on_background(&self) {
        if let Some(handle) = self.periodic_pull.lock().take() {
            handle.abort();
            info!("periodic pull timer invalidated on background entry");
        }
    }

    fn arm_periodic_pull(self: &Arc<Self>) {
        let mut slot = self.periodic_pull.lock();
        if slot.is_some() {
            return;
        }
        let scheduler = Arc::clone(self);
        let interval = scheduler.engine.config().periodic_pull_interval;
        *slot = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                match scheduler.engine.pull_all_data().await {
                    Ok(PullOutcome::AuthChanged) => {
                        warn!("periodic pull aborted: auth changed mid-flight");
                    }
                    Ok(PullOutcome::Completed(report)) => {
                        debug!(
                            imported = report.documents_imported,
                            skipped = report.documents_skipped,
                            "periodic pull completed"
                        );
                    }
                    Err(err) => warn!(error = %err, "periodic pull failed"),
                }
            }
        }));
    }

    /// Stop every background task. Called at teardown (sign-out, process
    /// shutdown) so no orphaned callback fires after the scheduler is dropped.
    pub fn stop(&self) {
        if let Some(h) = self.network_listener.lock().take() {
            h.abort();
        }
        if let Some(h) = self.periodic_pull.lock().take() {
            h.abort();
        }
        if let Some(h) = self.reconnect_debounce.lock().take() {
            h.abort();
        }
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}
