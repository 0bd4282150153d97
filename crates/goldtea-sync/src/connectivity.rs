//! # Connectivity Monitor
//!
//! Tracks whether the document store is reachable and tells one listener
//! when that changes.
//!
//! ## State Machine
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │          update(Online)                                                │
//! │   ┌─────────┐ ─────────────────────────► ┌─────────┐                   │
//! │   │ OFFLINE │                            │ ONLINE  │                   │
//! │   │(initial)│ ◄───────────────────────── │         │                   │
//! │   └─────────┘  update(Offline) or        └─────────┘                   │
//! │                probe error                                              │
//! │                                                                         │
//! │   Repeating the current state is a no-op: the listener only hears      │
//! │   real transitions. Subscribing delivers the current state at once.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Polling
//! A [`ConnectivityProbe`] answers "is the store reachable right now".
//! [`ConnectivityMonitor::spawn_polling`] runs one on an interval and feeds
//! the result into [`ConnectivityMonitor::update`].

use async_trait::async_trait;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::ConnectivitySettings;
use crate::error::{SyncError, SyncResult};

// =============================================================================
// Connection Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    Online,
    #[default]
    Offline,
}

impl ConnectionStatus {
    pub fn is_online(&self) -> bool {
        matches!(self, ConnectionStatus::Online)
    }
}

impl From<bool> for ConnectionStatus {
    fn from(online: bool) -> Self {
        if online {
            ConnectionStatus::Online
        } else {
            ConnectionStatus::Offline
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionStatus::Online => write!(f, "online"),
            ConnectionStatus::Offline => write!(f, "offline"),
        }
    }
}

// =============================================================================
// Monitor
// =============================================================================

type Listener = Arc<dyn Fn(ConnectionStatus) + Send + Sync>;

struct MonitorState {
    status: ConnectionStatus,
    listener: Option<Listener>,
}

/// Process-wide connectivity state with a single status listener.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct ConnectivityMonitor {
    state: Arc<Mutex<MonitorState>>,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("status", &self.current_status())
            .finish()
    }
}

impl ConnectivityMonitor {
    /// Starts offline until something reports otherwise.
    pub fn new() -> Self {
        Self::with_status(ConnectionStatus::Offline)
    }

    pub fn with_status(status: ConnectionStatus) -> Self {
        ConnectivityMonitor {
            state: Arc::new(Mutex::new(MonitorState {
                status,
                listener: None,
            })),
        }
    }

    pub fn current_status(&self) -> ConnectionStatus {
        self.lock().status
    }

    pub fn is_online(&self) -> bool {
        self.current_status().is_online()
    }

    /// Registers the listener, replacing any previous one, and immediately
    /// delivers the current status to it.
    pub fn subscribe<F>(&self, listener: F)
    where
        F: Fn(ConnectionStatus) + Send + Sync + 'static,
    {
        let listener: Listener = Arc::new(listener);
        let status = {
            let mut state = self.lock();
            state.listener = Some(Arc::clone(&listener));
            state.status
        };
        listener(status);
    }

    pub fn unsubscribe(&self) {
        self.lock().listener = None;
    }

    /// Records a new status. Returns true and notifies the listener only
    /// when the status actually changed.
    pub fn update(&self, status: ConnectionStatus) -> bool {
        let listener = {
            let mut state = self.lock();
            if state.status == status {
                return false;
            }
            state.status = status;
            state.listener.clone()
        };

        info!(status = %status, "Connectivity changed");
        if let Some(listener) = listener {
            listener(status);
        }
        true
    }

    /// Folds a probe outcome into the status; errors count as offline.
    pub fn report_probe(&self, outcome: SyncResult<bool>) -> bool {
        let status = match outcome {
            Ok(reachable) => ConnectionStatus::from(reachable),
            Err(e) => {
                debug!(error = %e, "Connectivity probe failed");
                ConnectionStatus::Offline
            }
        };
        self.update(status)
    }

    /// Probes once now and then on every `interval` until shut down.
    pub fn spawn_polling(
        &self,
        probe: Arc<dyn ConnectivityProbe>,
        interval: Duration,
    ) -> ConnectivityPollerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let monitor = self.clone();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        monitor.report_probe(probe.probe().await);
                    }
                    _ = shutdown_rx.recv() => {
                        debug!("Connectivity polling stopped");
                        break;
                    }
                }
            }
        });

        ConnectivityPollerHandle { shutdown_tx }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Stops a polling task started by [`ConnectivityMonitor::spawn_polling`].
#[derive(Clone)]
pub struct ConnectivityPollerHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl ConnectivityPollerHandle {
    pub async fn shutdown(&self) -> SyncResult<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| SyncError::ChannelError("Connectivity shutdown channel closed".into()))
    }
}

// =============================================================================
// Probes
// =============================================================================

/// Answers whether the store is reachable.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    async fn probe(&self) -> SyncResult<bool>;
}

/// Reachability by opening a TCP connection.
///
/// A refused or timed-out connection means offline; it is not an error.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    pub fn new(addr: impl Into<String>, timeout: Duration) -> Self {
        TcpProbe {
            addr: addr.into(),
            timeout,
        }
    }

    pub fn from_settings(settings: &ConnectivitySettings) -> Self {
        Self::new(settings.probe_addr.clone(), settings.timeout())
    }
}

#[async_trait]
impl ConnectivityProbe for TcpProbe {
    async fn probe(&self) -> SyncResult<bool> {
        match tokio::time::timeout(self.timeout, TcpStream::connect(self.addr.as_str())).await {
            Ok(Ok(_)) => Ok(true),
            Ok(Err(e)) => {
                debug!(addr = %self.addr, error = %e, "Probe connection failed");
                Ok(false)
            }
            Err(_) => {
                debug!(addr = %self.addr, "Probe timed out");
                Ok(false)
            }
        }
    }
}
