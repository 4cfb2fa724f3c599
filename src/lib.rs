//! Offline-first local store and bidirectional sync engine (see `DESIGN.md`
//! for the grounding ledger and `SPEC_FULL.md` for the full requirements
//! this crate implements).

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod sync;
pub mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::SyncConfig;
pub use db::{ConflictLog, Db, LocalStore, ResurrectionGuard, SyncQueue};
pub use error::{ErrorKind, Result, StoreError};
pub use events::{Event, EventBus};
pub use sync::{
    AuthProvider, AuthToken, CircuitBreaker, DrainOutcome, NetworkMonitor, PullOutcome,
    RemoteStore, SyncEngine, SyncScheduler,
};
pub use types::{Collection, OpType, SyncStatus};
