//! In-memory fakes for the abstract collaborator traits (spec §6, §10.4),
//! built the way the teacher crate's `tests/reactive/adapter.rs` builds
//! fakes for its own reactive layer: plain structs backed by a
//! `Mutex`/`HashMap`, with an injectable failure mode so the sync engine's
//! retry/circuit-breaker/dead-letter paths are exercisable without a real
//! network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;

use crate::error::{Result, StoreError};
use crate::sync::remote::{
    AuthProvider, AuthToken, ConflictInfo, NetworkMonitor, RemoteDocument, RemoteStore,
    TransactionOutcome,
};
use crate::types::Collection;

/// How [`InMemoryRemoteStore`] should behave on its next N calls.
#[derive(Debug, Clone, Copy)]
pub enum FailureMode {
    None,
    /// Fail every call with this error kind until reset.
    AlwaysFail,
    /// Fail the next `n` calls, then succeed.
    FailNext(u32),
}

struct Entry {
    data: Value,
    version: i64,
}

/// A `RemoteStore` backed by an in-memory map, implementing the §4.4.1
/// conflict rule exactly as a real document database transaction would.
pub struct InMemoryRemoteStore {
    docs: Mutex<HashMap<(Collection, String), Entry>>,
    failure: Mutex<FailureMode>,
}

impl InMemoryRemoteStore {
    pub fn new() -> Self {
        Self {
            docs: Mutex::new(HashMap::new()),
            failure: Mutex::new(FailureMode::None),
        }
    }

    pub fn set_failure_mode(&self, mode: FailureMode) {
        *self.failure.lock() = mode;
    }

    /// Seed a document as if it already existed on the server, for pull tests.
    pub fn seed(&self, collection: Collection, document_id: &str, data: Value, version: i64) {
        self.docs
            .lock()
            .insert((collection, document_id.to_string()), Entry { data, version });
    }

    pub fn contains(&self, collection: Collection, document_id: &str) -> bool {
        self.docs.lock().contains_key(&(collection, document_id.to_string()))
    }

    pub fn version_of(&self, collection: Collection, document_id: &str) -> Option<i64> {
        self.docs
            .lock()
            .get(&(collection, document_id.to_string()))
            .map(|e| e.version)
    }

    fn check_failure(&self) -> Result<()> {
        let mut mode = self.failure.lock();
        match *mode {
            FailureMode::None => Ok(()),
            FailureMode::AlwaysFail => Err(StoreError::Remote("injected failure".into())),
            FailureMode::FailNext(0) => Ok(()),
            FailureMode::FailNext(n) => {
                *mode = FailureMode::FailNext(n - 1);
                Err(StoreError::Remote("injected failure".into()))
            }
        }
    }
}

impl Default for InMemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemoteStore {
    async fn get_document(&self, collection: Collection, document_id: &str) -> Result<Option<RemoteDocument>> {
        self.check_failure()?;
        Ok(self
            .docs
            .lock()
            .get(&(collection, document_id.to_string()))
            .map(|e| RemoteDocument { data: e.data.clone(), version: e.version }))
    }

    async fn set_document(&self, collection: Collection, document_id: &str, data: Value) -> Result<()> {
        self.check_failure()?;
        let mut docs = self.docs.lock();
        let version = docs
            .get(&(collection, document_id.to_string()))
            .map(|e| e.version)
            .unwrap_or(0)
            + 1;
        docs.insert((collection, document_id.to_string()), Entry { data, version });
        Ok(())
    }

    async fn delete_document(&self, collection: Collection, document_id: &str) -> Result<()> {
        self.check_failure()?;
        self.docs.lock().remove(&(collection, document_id.to_string()));
        Ok(())
    }

    async fn run_conflict_transaction(
        &self,
        collection: Collection,
        document_id: &str,
        local_data: Value,
        local_version_hint: i64,
    ) -> Result<TransactionOutcome> {
        self.check_failure()?;
        let mut docs = self.docs.lock();
        let key = (collection, document_id.to_string());

        match docs.get(&key) {
            None => {
                docs.insert(key, Entry { data: local_data, version: 1 });
                Ok(TransactionOutcome { written_version: 1, conflict: None })
            }
            Some(existing) => {
                let server_version = existing.version;
                let conflict = if server_version > local_version_hint {
                    Some(ConflictInfo {
                        local_version: local_version_hint,
                        server_version,
                        server_data: existing.data.clone(),
                    })
                } else {
                    None
                };
                let written_version = server_version + 1;
                docs.insert(key, Entry { data: local_data, version: written_version });
                Ok(TransactionOutcome { written_version, conflict })
            }
        }
    }

    async fn list_documents(&self, collection: Collection) -> Result<Vec<RemoteDocument>> {
        self.check_failure()?;
        Ok(self
            .docs
            .lock()
            .iter()
            .filter(|((c, _), _)| *c == collection)
            .map(|(_, e)| RemoteDocument { data: e.data.clone(), version: e.version })
            .collect())
    }
}

/// A settable `AuthProvider`: current user + monotonic generation, with a
/// broadcast of changes for the engine's mid-pull abort check.
pub struct FakeAuthProvider {
    user_id: Mutex<Option<String>>,
    generation: AtomicU64,
    sender: watch::Sender<AuthToken>,
}

impl FakeAuthProvider {
    pub fn new(user_id: impl Into<String>) -> Self {
        let user = Some(user_id.into());
        let (sender, _) = watch::channel(AuthToken { user_id: user.clone(), generation: 0 });
        Self {
            user_id: Mutex::new(user),
            generation: AtomicU64::new(0),
            sender,
        }
    }

    pub fn signed_out() -> Self {
        let (sender, _) = watch::channel(AuthToken { user_id: None, generation: 0 });
        Self {
            user_id: Mutex::new(None),
            generation: AtomicU64::new(0),
            sender,
        }
    }

    /// Simulate a sign-out followed by a different user signing in —
    /// bumps the generation so any captured token goes stale (spec E5).
    pub fn switch_user(&self, new_user_id: impl Into<String>) {
        *self.user_id.lock() = Some(new_user_id.into());
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = AuthToken { user_id: self.user_id.lock().clone(), generation };
        let _ = self.sender.send(token);
    }
}

impl AuthProvider for FakeAuthProvider {
    fn current_user_id(&self) -> Option<String> {
        self.user_id.lock().clone()
    }

    fn capture_auth_state(&self) -> AuthToken {
        AuthToken {
            user_id: self.user_id.lock().clone(),
            generation: self.generation.load(Ordering::SeqCst),
        }
    }

    fn check_unchanged(&self, token: &AuthToken) -> Result<()> {
        if self.capture_auth_state() == *token {
            Ok(())
        } else {
            Err(StoreError::AuthChangedMidOperation)
        }
    }

    fn subscribe_auth_changes(&self) -> watch::Receiver<AuthToken> {
        self.sender.subscribe()
    }
}

/// A `NetworkMonitor` driven by test code instead of the OS.
pub struct FakeNetworkMonitor {
    sender: watch::Sender<bool>,
}

impl FakeNetworkMonitor {
    pub fn new(connected: bool) -> Self {
        let (sender, _) = watch::channel(connected);
        Self { sender }
    }

    pub fn set_connected(&self, connected: bool) {
        let _ = self.sender.send(connected);
    }
}

impl Default for FakeNetworkMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

impl NetworkMonitor for FakeNetworkMonitor {
    fn is_connected(&self) -> bool {
        *self.sender.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

/// Convenience bundle for wiring up a [`crate::sync::SyncEngine`] in tests.
pub struct TestHarness {
    pub remote: Arc<InMemoryRemoteStore>,
    pub auth: Arc<FakeAuthProvider>,
    pub network: Arc<FakeNetworkMonitor>,
    pub clock: Arc<crate::clock::FakeClock>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            remote: Arc::new(InMemoryRemoteStore::new()),
            auth: Arc::new(FakeAuthProvider::new("test-user")),
            network: Arc::new(FakeNetworkMonitor::new(true)),
            clock: Arc::new(crate::clock::FakeClock::default()),
        }
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
