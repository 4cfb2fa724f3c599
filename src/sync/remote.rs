//! Abstract collaborator interfaces (spec §6): `RemoteStore`, `AuthProvider`,
//! `NetworkMonitor`. The engine is generic over these traits so the whole
//! drain algorithm can run against an in-memory fake in tests
//! ([`crate::test_support`]) as faithfully as it runs against a real backend.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;

use crate::error::Result;
use crate::types::Collection;

/// A document as read back from the remote store, carrying the monotonic
/// `_version` counter the conflict rule (spec §4.4.1) compares against.
#[derive(Debug, Clone)]
pub struct RemoteDocument {
    pub data: Value,
    pub version: i64,
}

/// What a conflict-aware write observed (spec §4.4.1 step 3).
#[derive(Debug, Clone)]
pub struct ConflictInfo {
    pub local_version: i64,
    pub server_version: i64,
    pub server_data: Value,
}

/// Outcome of [`RemoteStore::run_conflict_transaction`].
#[derive(Debug, Clone)]
pub struct TransactionOutcome {
    pub written_version: i64,
    pub conflict: Option<ConflictInfo>,
}

/// The remote backend this crate syncs against. Read/write/delete are
/// plain remote calls; `run_conflict_transaction` packages the whole
/// read-compare-write sequence from §4.4.1 as one method because only the
/// backend can make that sequence atomic — decomposing it into separate
/// `get`/`set` calls from the engine would reopen the race the transaction
/// exists to close.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn get_document(&self, collection: Collection, document_id: &str) -> Result<Option<RemoteDocument>>;

    async fn set_document(&self, collection: Collection, document_id: &str, data: Value) -> Result<()>;

    async fn delete_document(&self, collection: Collection, document_id: &str) -> Result<()>;

    /// Run the §4.4.1 conflict rule transactionally: read the current
    /// server document, compare versions, write `local_data` tagged with
    /// the next version, and report a conflict if the server had moved
    /// ahead of `local_version_hint` — without dropping the local write.
    async fn run_conflict_transaction(
        &self,
        collection: Collection,
        document_id: &str,
        local_data: Value,
        local_version_hint: i64,
    ) -> Result<TransactionOutcome>;

    /// Every collection the remote store currently holds documents for,
    /// used by `pullAllData` (spec §4.4) to fetch a page per collection.
    async fn list_documents(&self, collection: Collection) -> Result<Vec<RemoteDocument>>;
}

/// Opaque auth-generation token captured at the start of a pull and
/// re-checked after every remote call (spec §4.4.5). Two tokens are equal
/// iff the signed-in user and their session generation are both unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthToken {
    pub user_id: Option<String>,
    pub generation: u64,
}

pub trait AuthProvider: Send + Sync {
    fn current_user_id(&self) -> Option<String>;

    fn capture_auth_state(&self) -> AuthToken;

    /// `Err(StoreError::AuthChangedMidOperation)` if `token` no longer
    /// matches the live auth state.
    fn check_unchanged(&self, token: &AuthToken) -> Result<()>;

    fn subscribe_auth_changes(&self) -> watch::Receiver<AuthToken>;
}

/// Connectivity edge source for the reconnect-debounce task (spec §4.4.4).
pub trait NetworkMonitor: Send + Sync {
    fn is_connected(&self) -> bool;

    fn subscribe(&self) -> watch::Receiver<bool>;
}
