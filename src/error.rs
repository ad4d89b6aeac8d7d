//! Error taxonomy for the offline-first core.
//!
//! Validation and storage failures surface synchronously to the caller.
//! Remote-application failures never appear here: they only keep outbox
//! entries queued and are reported through the pending-sync count.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Rejected before any write reaches storage (empty name, negative price).
    #[error("validation: {0}")]
    Validation(String),

    /// SQLite-level failure. Fatal to the triggering call; the enclosing
    /// transaction rolls back, so no partial outbox entry can survive.
    #[error("storage: {0}")]
    Storage(#[from] rusqlite::Error),

    /// An outbox payload could not be encoded or decoded.
    #[error("payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// A stored outbox row names a kind/action pair this build does not know.
    #[error("unknown mutation {kind}/{action}")]
    UnknownMutation { kind: String, action: String },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Another thread panicked while holding the connection lock.
    #[error("database lock poisoned")]
    LockPoisoned,
}

pub type Result<T> = std::result::Result<T, Error>;
