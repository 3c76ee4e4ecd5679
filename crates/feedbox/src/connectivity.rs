//! Network connectivity tracking.
//!
//! [`ConnectivityMonitor`] holds a single "is the network reachable" flag and
//! notifies subscribers on every transition. It does not poll; something else
//! pushes state into it, either the host environment or a
//! [`ReachabilityProbe`] driven by [`spawn_probe`]. With no source at all the
//! monitor assumes the network is up and lets remote failures surface through
//! the reconciler's error path.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};
use url::Url;

/// A change in network reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectivityEvent {
    /// The network became reachable.
    WentOnline,
    /// The network became unreachable.
    WentOffline,
}

impl fmt::Display for ConnectivityEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WentOnline => write!(f, "online"),
            Self::WentOffline => write!(f, "offline"),
        }
    }
}

/// Identifies a subscription so it can be removed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Arc<dyn Fn(ConnectivityEvent) + Send + Sync>;

struct Inner {
    online: AtomicBool,
    next_id: AtomicU64,
    subscribers: Mutex<Vec<(SubscriptionId, Callback)>>,
}

/// Tracks whether the network is reachable.
///
/// Cheap to clone; clones share state and subscribers.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    inner: Arc<Inner>,
}

impl fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("online", &self.is_online())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl ConnectivityMonitor {
    /// Create a monitor with a known initial state.
    #[must_use]
    pub fn new(online: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                online: AtomicBool::new(online),
                next_id: AtomicU64::new(0),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Create a monitor for a host with no reachability signal.
    #[must_use]
    pub fn assume_online() -> Self {
        Self::new(true)
    }

    /// Create a monitor whose initial state comes from `probe`.
    ///
    /// Without a probe the monitor assumes the network is up.
    pub async fn detect(probe: Option<&dyn ReachabilityProbe>) -> Self {
        match probe {
            Some(probe) => {
                let online = probe.check().await;
                debug!(online, probe = %probe.describe(), "Initial reachability");
                Self::new(online)
            }
            None => Self::assume_online(),
        }
    }

    /// Whether the network is currently considered reachable.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Record the current reachability.
    ///
    /// Notifies subscribers and returns `true` only if the state changed.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.inner.online.swap(online, Ordering::SeqCst);
        if previous == online {
            return false;
        }

        let event = if online {
            ConnectivityEvent::WentOnline
        } else {
            ConnectivityEvent::WentOffline
        };
        info!(%event, "Connectivity changed");

        let callbacks: Vec<Callback> = self
            .lock_subscribers()
            .iter()
            .map(|(_, cb)| Arc::clone(cb))
            .collect();
        for callback in callbacks {
            callback(event);
        }
        true
    }

    /// Register a callback for connectivity transitions.
    ///
    /// Callbacks run on the thread that reports the change and must not
    /// block. There is no ordering between subscribers.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(ConnectivityEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        self.lock_subscribers().push((id, Arc::new(callback)));
        id
    }

    /// Remove a callback. Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock_subscribers();
        let before = subscribers.len();
        subscribers.retain(|(sub, _)| *sub != id);
        subscribers.len() != before
    }

    /// Number of registered callbacks.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock_subscribers().len()
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, Callback)>> {
        match self.inner.subscribers.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::assume_online()
    }
}

/// A source of reachability readings.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Check whether the network is reachable right now.
    async fn check(&self) -> bool;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Probe that opens a TCP connection to a host.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    /// Create a probe for `host:port`.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            timeout,
        }
    }

    /// Create a probe for the host of `url`.
    ///
    /// Returns `None` if the URL has no host or no known default port.
    #[must_use]
    pub fn from_url(url: &Url, timeout: Duration) -> Option<Self> {
        let host = url.host_str()?;
        let port = url.port_or_known_default()?;
        Some(Self::new(host, port, timeout))
    }
}

#[async_trait]
impl ReachabilityProbe for TcpProbe {
    async fn check(&self) -> bool {
        let target = (self.host.as_str(), self.port);
        match tokio::time::timeout(self.timeout, TcpStream::connect(target)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                trace!(error = %e, "Reachability probe failed");
                false
            }
            Err(_) => {
                trace!("Reachability probe timed out");
                false
            }
        }
    }

    fn describe(&self) -> String {
        format!("tcp://{}:{}", self.host, self.port)
    }
}

/// A handle to stop a running probe loop.
///
/// Lightweight and cloneable; all clones share the same stop signal.
#[derive(Debug, Clone, Default)]
pub struct ProbeHandle {
    stop_signal: Arc<AtomicBool>,
}

impl ProbeHandle {
    /// Create a new handle.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal the probe loop to stop after its current check.
    pub fn stop(&self) {
        self.stop_signal.store(true, Ordering::SeqCst);
    }

    /// Check if the stop signal has been sent.
    #[must_use]
    pub fn should_stop(&self) -> bool {
        self.stop_signal.load(Ordering::SeqCst)
    }
}

/// Run `probe` every `interval`, pushing readings into `monitor`.
///
/// Returns a handle to stop the loop and the task running it.
pub fn spawn_probe(
    monitor: ConnectivityMonitor,
    probe: Arc<dyn ReachabilityProbe>,
    interval: Duration,
) -> (ProbeHandle, JoinHandle<()>) {
    let handle = ProbeHandle::new();
    let loop_handle = handle.clone();

    let task = tokio::spawn(async move {
        debug!(probe = %probe.describe(), ?interval, "Reachability probe started");
        while !loop_handle.should_stop() {
            let online = probe.check().await;
            if loop_handle.should_stop() {
                break;
            }
            monitor.set_online(online);
            tokio::time::sleep(interval).await;
        }
        debug!("Reachability probe stopped");
    });

    (handle, task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Probe that replays a scripted sequence, then repeats the last reading.
    struct ScriptedProbe {
        readings: Mutex<Vec<bool>>,
    }

    impl ScriptedProbe {
        fn new(mut readings: Vec<bool>) -> Self {
            readings.reverse();
            Self {
                readings: Mutex::new(readings),
            }
        }
    }

    #[async_trait]
    impl ReachabilityProbe for ScriptedProbe {
        async fn check(&self) -> bool {
            let mut readings = self.readings.lock().unwrap();
            if readings.len() > 1 {
                readings.pop().unwrap()
            } else {
                readings.last().copied().unwrap_or(true)
            }
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    fn recording(monitor: &ConnectivityMonitor) -> Arc<Mutex<Vec<ConnectivityEvent>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        monitor.subscribe(move |event| sink.lock().unwrap().push(event));
        events
    }

    #[test]
    fn test_default_assumes_online() {
        assert!(ConnectivityMonitor::default().is_online());
        assert!(ConnectivityMonitor::assume_online().is_online());
        assert!(!ConnectivityMonitor::new(false).is_online());
    }

    #[test]
    fn test_transitions_notify_subscribers() {
        let monitor = ConnectivityMonitor::new(true);
        let events = recording(&monitor);

        assert!(monitor.set_online(false));
        assert!(monitor.set_online(true));

        assert_eq!(
            *events.lock().unwrap(),
            vec![ConnectivityEvent::WentOffline, ConnectivityEvent::WentOnline]
        );
    }

    #[test]
    fn test_same_state_is_not_a_transition() {
        let monitor = ConnectivityMonitor::new(true);
        let events = recording(&monitor);

        assert!(!monitor.set_online(true));
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_every_subscriber_is_called() {
        let monitor = ConnectivityMonitor::new(false);
        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let count = Arc::clone(&count);
            monitor.subscribe(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        monitor.set_online(true);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_unsubscribe() {
        let monitor = ConnectivityMonitor::new(true);
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let id = monitor.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(monitor.unsubscribe(id));
        assert!(!monitor.unsubscribe(id));
        monitor.set_online(false);

        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(monitor.subscriber_count(), 0);
    }

    #[test]
    fn test_subscriber_may_read_monitor() {
        let monitor = ConnectivityMonitor::new(false);
        let seen = Arc::new(AtomicBool::new(false));
        let (inner, flag) = (monitor.clone(), Arc::clone(&seen));
        monitor.subscribe(move |_| flag.store(inner.is_online(), Ordering::SeqCst));

        monitor.set_online(true);
        assert!(seen.load(Ordering::SeqCst));
    }

    #[test]
    fn test_clones_share_state() {
        let a = ConnectivityMonitor::new(true);
        let b = a.clone();
        b.set_online(false);
        assert!(!a.is_online());
    }

    #[test]
    fn test_event_display() {
        assert_eq!(ConnectivityEvent::WentOnline.to_string(), "online");
        assert_eq!(ConnectivityEvent::WentOffline.to_string(), "offline");
    }

    #[test]
    fn test_tcp_probe_from_url() {
        let url = Url::parse("https://demo.example.co").unwrap();
        let probe = TcpProbe::from_url(&url, Duration::from_secs(1)).unwrap();
        assert_eq!(probe.describe(), "tcp://demo.example.co:443");

        let url = Url::parse("http://localhost:54321/x").unwrap();
        let probe = TcpProbe::from_url(&url, Duration::from_secs(1)).unwrap();
        assert_eq!(probe.describe(), "tcp://localhost:54321");

        let url = Url::parse("unix:/run/socket").unwrap();
        assert!(TcpProbe::from_url(&url, Duration::from_secs(1)).is_none());
    }

    #[tokio::test]
    async fn test_tcp_probe_reaches_local_listener() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let probe = TcpProbe::new("127.0.0.1", port, Duration::from_secs(2));
        assert!(probe.check().await);
    }

    #[tokio::test]
    async fn test_tcp_probe_fails_on_closed_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let probe = TcpProbe::new("127.0.0.1", port, Duration::from_secs(2));
        assert!(!probe.check().await);
    }

    #[tokio::test]
    async fn test_detect_without_probe_assumes_online() {
        assert!(ConnectivityMonitor::detect(None).await.is_online());
    }

    #[tokio::test]
    async fn test_detect_uses_probe() {
        let probe = ScriptedProbe::new(vec![false]);
        assert!(!ConnectivityMonitor::detect(Some(&probe)).await.is_online());
    }

    #[tokio::test]
    async fn test_probe_loop_drives_transitions() {
        let monitor = ConnectivityMonitor::new(true);
        let events = recording(&monitor);
        let probe = Arc::new(ScriptedProbe::new(vec![false, false, true]));

        let (handle, task) = spawn_probe(monitor.clone(), probe, Duration::from_millis(5));
        tokio::time::timeout(Duration::from_secs(5), async {
            while events.lock().unwrap().len() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("probe loop never reported both transitions");

        handle.stop();
        task.await.unwrap();

        assert_eq!(
            *events.lock().unwrap(),
            vec![ConnectivityEvent::WentOffline, ConnectivityEvent::WentOnline]
        );
        assert!(monitor.is_online());
    }

    #[test]
    fn test_probe_handle_clone_shares_signal() {
        let a = ProbeHandle::new();
        let b = a.clone();
        assert!(!b.should_stop());
        a.stop();
        assert!(b.should_stop());
    }
}
