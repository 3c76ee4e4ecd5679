//! Remote store abstraction.
//!
//! The remote store owns committed feedback. It is an external system; this
//! crate only relies on the three operations of [`RemoteStore`].

mod memory;
mod rest;

use async_trait::async_trait;
use thiserror::Error;

use crate::feedback::{FeedbackRecord, FeedbackValues};

pub use memory::MemoryRemoteStore;
pub use rest::{RestRemoteStore, RestSettings};

/// Errors returned by a remote store.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The request never got a response (DNS, connect, TLS, timeout).
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The network is known to be unreachable.
    #[error("remote store unreachable: {0}")]
    Unreachable(String),

    /// The store answered with a non-success status.
    #[error("remote store returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, usually the store's error message.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Decode(String),

    /// A create call succeeded but returned no rows.
    #[error("no rows returned")]
    EmptyResponse,
}

impl RemoteError {
    /// Check if the store rejected the request, as opposed to never seeing it.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Status { status, .. } if (400..500).contains(status))
    }
}

/// Result type for remote store operations.
pub type Result<T> = std::result::Result<T, RemoteError>;

/// The hosted data store holding committed feedback.
#[async_trait]
pub trait RemoteStore: Send + Sync + std::fmt::Debug {
    /// List all committed feedback, newest first.
    async fn list_feedback(&self) -> Result<Vec<FeedbackRecord>>;

    /// Insert a new record and return the store's canonical copy.
    ///
    /// The store assigns the id and the creation timestamp.
    async fn create_feedback(&self, values: &FeedbackValues) -> Result<FeedbackRecord>;

    /// Delete the record with the given id.
    async fn delete_feedback(&self, id: &str) -> Result<()>;
}
