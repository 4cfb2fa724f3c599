pub mod circuit_breaker;
pub mod engine;
pub mod remote;
pub mod scheduler;

pub use circuit_breaker::CircuitBreaker;
pub use engine::{DrainOutcome, PullOutcome, SyncEngine};
pub use remote::{
    AuthProvider, AuthToken, ConflictInfo, NetworkMonitor, RemoteDocument, RemoteStore,
    TransactionOutcome,
};
pub use scheduler::SyncScheduler;
