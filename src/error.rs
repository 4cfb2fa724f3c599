//! Error taxonomy (spec §7) and its propagation-policy classification.

use thiserror::Error;

/// How the sync engine should treat a failed operation.
///
/// This lets the drain loop make its retry/dead-letter/surface decision
/// with a single `match` on `kind()` instead of re-deriving policy from
/// the concrete variant at every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Worth retrying with backoff (network blips, timeouts, transient
    /// server errors).
    Retryable,
    /// Will never succeed by retrying; dead-letter immediately.
    Permanent,
    /// Authentication/authorization related; surfaced distinctly and
    /// counted toward the circuit breaker.
    Auth,
    /// Aborts the enclosing operation outright (auth changed mid-pull).
    Fatal,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not authenticated")]
    NotAuthenticated,

    #[error("no network connection")]
    NoNetwork,

    #[error("remote transaction timed out")]
    TransactionTimeout,

    #[error("conflict detected for {collection}/{document_id}")]
    ConflictDetected {
        collection: String,
        document_id: String,
    },

    #[error("failed to decode record: {0}")]
    DecodingFailed(String),

    #[error("missing data for record")]
    MissingData,

    #[error("unknown collection: {0}")]
    UnknownCollection(String),

    #[error("permission denied")]
    PermissionDenied,

    #[error("database corrupted: {0}")]
    DatabaseCorrupted(String),

    #[error("auth changed mid-operation")]
    AuthChangedMidOperation,

    #[error("sync already in progress")]
    SyncInProgress,

    #[error("circuit breaker open until {reset_at}")]
    CircuitOpen { reset_at: i64 },

    #[error("remote store error: {0}")]
    Remote(String),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotAuthenticated => ErrorKind::Auth,
            StoreError::PermissionDenied => ErrorKind::Auth,
            StoreError::AuthChangedMidOperation => ErrorKind::Fatal,
            StoreError::NoNetwork => ErrorKind::Retryable,
            StoreError::TransactionTimeout => ErrorKind::Retryable,
            StoreError::ConflictDetected { .. } => ErrorKind::Retryable,
            StoreError::SyncInProgress => ErrorKind::Retryable,
            StoreError::CircuitOpen { .. } => ErrorKind::Retryable,
            StoreError::Remote(_) => ErrorKind::Retryable,
            StoreError::DecodingFailed(_) => ErrorKind::Permanent,
            StoreError::MissingData => ErrorKind::Permanent,
            StoreError::UnknownCollection(_) => ErrorKind::Permanent,
            StoreError::DatabaseCorrupted(_) => ErrorKind::Fatal,
            StoreError::Sqlite(_) => ErrorKind::Retryable,
            StoreError::Json(_) => ErrorKind::Permanent,
            StoreError::Io(_) => ErrorKind::Retryable,
        }
    }

    /// Whether this error, once it exhausts the retry budget, should
    /// dead-letter rather than being surfaced to the caller as a bare
    /// sync failure. Permanent errors skip the retry budget entirely
    /// (spec §7: `DecodingFailed`/`MissingData`/`UnknownCollection`
    /// dead-letter immediately, never retried).
    pub fn is_immediately_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Permanent)
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
