//! In-process remote store.
//!
//! Behaves like the hosted store (server-assigned ids and timestamps,
//! newest-first listing) and adds switches for simulating outages and
//! rejected writes. Used by the test suite and by embedders that want a
//! store double.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::{RemoteError, RemoteStore, Result};
use crate::feedback::{sort_newest_first, FeedbackRecord, FeedbackValues};

#[derive(Debug, Default)]
struct State {
    records: Vec<FeedbackRecord>,
    next_id: u64,
    rejected_messages: HashSet<String>,
    create_delay: Option<Duration>,
}

/// A remote store kept in memory.
#[derive(Debug)]
pub struct MemoryRemoteStore {
    state: Mutex<State>,
    reachable: AtomicBool,
    list_calls: AtomicUsize,
    create_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl MemoryRemoteStore {
    /// Create an empty, reachable store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                next_id: 1,
                ..State::default()
            }),
            reachable: AtomicBool::new(true),
            list_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        }
    }

    /// Make every call fail with [`RemoteError::Unreachable`] (or succeed again).
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Reject creates whose message equals `message` with a 400 status.
    pub fn reject_message(&self, message: impl Into<String>) {
        self.with_state(|state| {
            state.rejected_messages.insert(message.into());
        });
    }

    /// Stop rejecting creates for `message`.
    pub fn accept_message(&self, message: &str) {
        self.with_state(|state| {
            state.rejected_messages.remove(message);
        });
    }

    /// Delay each create by `delay` before it is applied.
    pub fn set_create_delay(&self, delay: Option<Duration>) {
        self.with_state(|state| state.create_delay = delay);
    }

    /// Insert a committed record directly, bypassing the call counters.
    pub fn seed(&self, record: FeedbackRecord) {
        self.with_state(|state| state.records.push(record));
    }

    /// Snapshot of the committed records, newest first.
    #[must_use]
    pub fn records(&self) -> Vec<FeedbackRecord> {
        self.with_state(|state| {
            let mut records = state.records.clone();
            sort_newest_first(&mut records);
            records
        })
    }

    /// Number of list calls received.
    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of create calls received.
    #[must_use]
    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    /// Number of delete calls received.
    #[must_use]
    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut State) -> T) -> T {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        f(&mut state)
    }

    fn ensure_reachable(&self) -> Result<()> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RemoteError::Unreachable("memory store is offline".to_string()))
        }
    }
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn list_feedback(&self) -> Result<Vec<FeedbackRecord>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_reachable()?;
        Ok(self.records())
    }

    async fn create_feedback(&self, values: &FeedbackValues) -> Result<FeedbackRecord> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_reachable()?;

        if let Some(delay) = self.with_state(|state| state.create_delay) {
            tokio::time::sleep(delay).await;
        }

        self.with_state(|state| {
            if state.rejected_messages.contains(&values.message) {
                return Err(RemoteError::Status {
                    status: 400,
                    body: "rejected by store".to_string(),
                });
            }
            let record = FeedbackRecord {
                id: format!("srv-{}", state.next_id),
                name: values.name.clone(),
                email: values.email.clone(),
                message: values.message.clone(),
                created_at: Utc::now(),
            };
            state.next_id += 1;
            state.records.push(record.clone());
            Ok(record)
        })
    }

    async fn delete_feedback(&self, id: &str) -> Result<()> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.ensure_reachable()?;
        self.with_state(|state| state.records.retain(|r| r.id != id));
        Ok(())
    }
}
