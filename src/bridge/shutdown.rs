//! Shutdown coordination
//!
//! A [`ShutdownHandle`] is shared between the session loop and the signal
//! listener. The first request wins; later requests are no-ops.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::Notify;
use tracing::{debug, info};

/// Lifecycle of the broker connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    ShuttingDown,
    Terminated,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::ShuttingDown => write!(f, "shutting down"),
            ConnectionState::Terminated => write!(f, "terminated"),
        }
    }
}

struct Inner {
    requested: AtomicBool,
    notify: Notify,
    state: RwLock<ConnectionState>,
}

/// Cloneable, thread-safe shutdown request flag
#[derive(Clone)]
pub struct ShutdownHandle {
    inner: Arc<Inner>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ShutdownHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShutdownHandle")
            .field("requested", &self.is_requested())
            .field("state", &self.state())
            .finish()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                requested: AtomicBool::new(false),
                notify: Notify::new(),
                state: RwLock::new(ConnectionState::Disconnected),
            }),
        }
    }

    /// Request shutdown. Returns `true` only for the first request.
    pub fn request(&self) -> bool {
        let first = self
            .inner
            .requested
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();

        if first {
            {
                let mut state = self.inner.state.write();
                if *state != ConnectionState::Terminated {
                    *state = ConnectionState::ShuttingDown;
                }
            }
            self.inner.notify.notify_waiters();
        }
        first
    }

    /// Whether shutdown has been requested
    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::Acquire)
    }

    /// Wait until shutdown is requested. Returns immediately if it already was.
    pub async fn wait(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent request is not missed
        notified.as_mut().enable();
        if self.is_requested() {
            return;
        }
        notified.await;
    }

    /// Handle a termination signal by name.
    ///
    /// Returns `true` if this signal started the shutdown.
    pub fn on_termination_signal(&self, signal: &str) -> bool {
        if self.request() {
            info!("Received signal {}. Disconnecting from MQTT broker", signal);
            true
        } else {
            debug!("Received signal {}, shutdown already in progress", signal);
            false
        }
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        *self.inner.state.read()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        *self.inner.state.write() = state;
    }
}
