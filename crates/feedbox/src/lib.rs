//! `feedbox` - Offline-tolerant feedback submission and synchronization
//!
//! Submissions go straight to a hosted data store when the network is up and
//! into a durable local queue when it is not. Queued entries are flushed to
//! the store once connectivity returns, and reads merge both sources.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cli;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod feedback;
pub mod logging;
pub mod reconciler;
pub mod remote;
pub mod storage;
pub mod validation;

pub use config::Config;
pub use connectivity::{ConnectivityEvent, ConnectivityMonitor, ReachabilityProbe, TcpProbe};
pub use error::{Error, Result};
pub use feedback::{Deletion, FeedbackRecord, FeedbackValues, Submission};
pub use logging::init_logging;
pub use reconciler::{FlushReport, SubmissionReconciler};
pub use remote::{MemoryRemoteStore, RemoteError, RemoteStore, RestRemoteStore};
pub use storage::{PendingQueueStore, QueueStats, SqliteQueueStore};
pub use validation::{Field, FieldError, Validator};
