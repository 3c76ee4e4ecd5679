//! Offline-tolerant submission and synchronization.
//!
//! [`SubmissionReconciler`] decides per submission whether to write to the
//! remote store or park the record in the pending queue, and moves queued
//! records to the remote store once the network is back.
//!
//! Concurrency rules:
//! - Every read-modify-write of the queue happens under one lock, and that
//!   lock is never held across a network call, so offline submissions never
//!   wait on the network.
//! - Flushes are single-flight. A second trigger waits for the running flush
//!   and then sees the queue it left behind.
//! - The post-flush rewrite re-reads the queue and removes only the entries
//!   that were committed, so records queued mid-flush survive.
//!
//! Flushing is at-least-once: if the process dies after the remote store
//! accepted an entry but before the queue rewrite, that entry is sent again on
//! the next flush.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use futures::future::join_all;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::connectivity::{ConnectivityEvent, ConnectivityMonitor, SubscriptionId};
use crate::error::{Error, Result};
use crate::feedback::{sort_newest_first, Deletion, FeedbackRecord, FeedbackValues, Submission};
use crate::remote::{RemoteError, RemoteStore};
use crate::storage::PendingQueueStore;

/// A queued entry that reached the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlushedEntry {
    /// The id the entry had in the pending queue.
    pub local_id: String,
    /// The store's canonical record.
    pub record: FeedbackRecord,
}

/// A queued entry that could not be flushed and stays queued.
#[derive(Debug)]
pub struct FailedEntry {
    /// The id of the entry in the pending queue.
    pub local_id: String,
    /// Why the remote create failed.
    pub error: RemoteError,
}

/// Outcome of one flush attempt.
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Entries committed to the remote store and removed from the queue.
    pub flushed: Vec<FlushedEntry>,
    /// Entries that failed and remain queued.
    pub failed: Vec<FailedEntry>,
    /// The flush did not run because the network is unreachable.
    pub skipped_offline: bool,
}

impl FlushReport {
    fn offline() -> Self {
        Self {
            skipped_offline: true,
            ..Self::default()
        }
    }

    /// Number of remote creates attempted.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.flushed.len() + self.failed.len()
    }

    /// Check if every attempted entry was committed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && !self.skipped_offline
    }
}

/// Routes submissions to the remote store or the pending queue.
#[derive(Debug)]
pub struct SubmissionReconciler {
    remote: Arc<dyn RemoteStore>,
    queue: Arc<dyn PendingQueueStore>,
    connectivity: ConnectivityMonitor,
    /// Serializes read-modify-write cycles on the queue.
    queue_lock: Mutex<()>,
    /// Makes flushes single-flight.
    flush_gate: tokio::sync::Mutex<()>,
}

impl SubmissionReconciler {
    /// Create a reconciler over the given collaborators.
    #[must_use]
    pub fn new(
        remote: Arc<dyn RemoteStore>,
        queue: Arc<dyn PendingQueueStore>,
        connectivity: ConnectivityMonitor,
    ) -> Self {
        Self {
            remote,
            queue,
            connectivity,
            queue_lock: Mutex::new(()),
            flush_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// The connectivity monitor this reconciler consults.
    #[must_use]
    pub fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    /// Submit new feedback.
    ///
    /// Offline, the record is synthesized locally, appended to the pending
    /// queue and returned as [`Submission::Queued`] without touching the
    /// network. Online, the remote store's canonical record is returned as
    /// [`Submission::Committed`]; a remote failure is not queued.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteWrite`] if the online create fails, or a
    /// storage error if the offline append cannot be persisted.
    pub async fn create(&self, values: FeedbackValues) -> Result<Submission> {
        if !self.connectivity.is_online() {
            let record = FeedbackRecord::local(values);
            self.modify_queue(|queue| {
                queue.push(record.clone());
                ((), true)
            })?;
            info!(id = %record.id, "Offline: feedback queued");
            return Ok(Submission::Queued(record));
        }

        match self.remote.create_feedback(&values).await {
            Ok(record) => {
                debug!(id = %record.id, "Feedback committed");
                Ok(Submission::Committed(record))
            }
            Err(e) => {
                warn!(error = %e, "Remote create failed");
                Err(Error::remote_write(e))
            }
        }
    }

    /// Move every queued entry to the remote store.
    ///
    /// Does nothing while offline. Each entry is sent independently and
    /// concurrently; failures stay queued for the next flush and are listed
    /// in the report instead of being returned as errors.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the queue cannot be read or rewritten.
    pub async fn flush_pending(&self) -> Result<FlushReport> {
        if !self.connectivity.is_online() {
            debug!("Offline: skipping flush");
            return Ok(FlushReport::offline());
        }

        let _gate = self.flush_gate.lock().await;

        let snapshot = {
            let _guard = self.lock_queue()?;
            self.queue.read_queue()?
        };
        if snapshot.is_empty() {
            return Ok(FlushReport::default());
        }
        debug!(entries = snapshot.len(), "Flushing pending queue");

        let attempts = snapshot.into_iter().map(|entry| async move {
            let outcome = self.remote.create_feedback(&entry.values()).await;
            (entry.id, outcome)
        });

        let mut report = FlushReport::default();
        for (local_id, outcome) in join_all(attempts).await {
            match outcome {
                Ok(record) => report.flushed.push(FlushedEntry { local_id, record }),
                Err(error) => {
                    debug!(id = %local_id, error = %error, "Pending entry not flushed");
                    report.failed.push(FailedEntry { local_id, error });
                }
            }
        }

        if !report.flushed.is_empty() {
            let committed: HashSet<&str> =
                report.flushed.iter().map(|f| f.local_id.as_str()).collect();
            let removal = self.modify_queue(|queue| {
                let before = queue.len();
                queue.retain(|r| !committed.contains(r.id.as_str()));
                ((), queue.len() != before)
            });
            if let Err(e) = removal {
                error!(
                    error = %e,
                    committed = committed.len(),
                    "Flushed entries could not be removed from the queue and will be resubmitted"
                );
                return Err(e);
            }
        }

        info!(
            flushed = report.flushed.len(),
            failed = report.failed.len(),
            "Pending queue flushed"
        );
        Ok(report)
    }

    /// Get every visible feedback record.
    ///
    /// Flushes first (best effort), then returns entries still pending,
    /// newest first, followed by the remote collection, newest first. If the
    /// remote collection cannot be fetched, only the pending entries are
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteRead`] only if the remote fetch fails and the
    /// pending queue cannot be read either.
    pub async fn get_all(&self) -> Result<Vec<FeedbackRecord>> {
        if let Err(e) = self.flush_pending().await {
            warn!(error = %e, "Flush before read failed");
        }

        let fetched = if self.connectivity.is_online() {
            self.remote.list_feedback().await
        } else {
            Err(RemoteError::Unreachable("connectivity monitor reports offline".to_string()))
        };

        match fetched {
            Ok(mut remote) => {
                sort_newest_first(&mut remote);
                let mut visible = match self.pending_newest_first() {
                    Ok(pending) => pending,
                    Err(e) => {
                        warn!(error = %e, "Pending queue unreadable; showing remote records only");
                        Vec::new()
                    }
                };
                visible.extend(remote);
                Ok(visible)
            }
            Err(fetch_err) => {
                warn!(error = %fetch_err, "Remote fetch failed; showing pending entries only");
                self.pending_newest_first().map_err(|e| {
                    warn!(error = %e, "Pending queue unreadable");
                    Error::remote_read(fetch_err)
                })
            }
        }
    }

    /// Delete a record from whichever store owns it.
    ///
    /// Pending entries are removed locally without a remote call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RemoteDelete`] if the remote delete fails, or a
    /// storage error if the queue cannot be rewritten.
    pub async fn delete(&self, id: &str) -> Result<Deletion> {
        let removed = self.modify_queue(|queue| {
            let before = queue.len();
            queue.retain(|r| r.id != id);
            let removed = queue.len() != before;
            (removed, removed)
        })?;
        if removed {
            info!(id, "Pending entry deleted");
            return Ok(Deletion::Pending);
        }

        if !self.connectivity.is_online() {
            return Err(Error::remote_delete(
                id,
                RemoteError::Unreachable("connectivity monitor reports offline".to_string()),
            ));
        }

        self.remote
            .delete_feedback(id)
            .await
            .map_err(|e| Error::remote_delete(id, e))?;
        debug!(id, "Remote record deleted");
        Ok(Deletion::Remote)
    }

    /// The pending queue in submission order.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the queue cannot be read.
    pub fn pending(&self) -> Result<Vec<FeedbackRecord>> {
        let _guard = self.lock_queue()?;
        self.queue.read_queue()
    }

    /// Flush the queue every time the network comes back.
    ///
    /// Subscribes to the connectivity monitor and spawns a task that runs
    /// [`flush_pending`](Self::flush_pending) on each offline-to-online
    /// transition. Unsubscribing the returned id ends the task.
    pub fn flush_on_reconnect(self: &Arc<Self>) -> (SubscriptionId, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = self.connectivity.subscribe(move |event| {
            if event == ConnectivityEvent::WentOnline {
                let _ = tx.send(());
            }
        });

        let reconciler = Arc::clone(self);
        let task = tokio::spawn(async move {
            while rx.recv().await.is_some() {
                match reconciler.flush_pending().await {
                    Ok(report) if report.attempted() > 0 => info!(
                        flushed = report.flushed.len(),
                        failed = report.failed.len(),
                        "Reconnect flush finished"
                    ),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "Reconnect flush failed"),
                }
            }
        });

        (id, task)
    }

    fn pending_newest_first(&self) -> Result<Vec<FeedbackRecord>> {
        let mut pending = self.pending()?;
        sort_newest_first(&mut pending);
        Ok(pending)
    }

    fn lock_queue(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.queue_lock
            .lock()
            .map_err(|_| Error::internal("pending queue lock poisoned"))
    }

    /// Apply `f` to the queue under the queue lock.
    ///
    /// `f` returns its result and whether the queue changed; the queue is
    /// only rewritten when it did.
    fn modify_queue<T>(&self, f: impl FnOnce(&mut Vec<FeedbackRecord>) -> (T, bool)) -> Result<T> {
        let _guard = self.lock_queue()?;
        let mut queue = self.queue.read_queue()?;
        let (result, changed) = f(&mut queue);
        if changed {
            self.queue.write_queue(&queue)?;
        }
        Ok(result)
    }
}
