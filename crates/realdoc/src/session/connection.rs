use std::sync::{Arc, Mutex};

use tracing::debug;

use super::registry::{ConnectionId, PeerSender, SubscriberRegistry};

/// States a connection moves through
///
/// `Closed` is terminal; there is no path back to `Open`. A connection that
/// closes must be re-established from `Connecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closing,
    Closed,
}

/// Governs one peer's admission into and removal from the registry
///
/// The lifecycle binds a connection to exactly one document. Closing is
/// idempotent: an explicit disconnect and a failure-triggered cleanup can
/// both run it without double-removing anything.
pub struct ConnectionLifecycle {
    id: ConnectionId,
    doc_id: String,
    registry: Arc<SubscriberRegistry>,
    state: Mutex<ConnectionState>,
}

impl ConnectionLifecycle {
    /// Create a lifecycle in the `Connecting` state, bound to `doc_id`
    pub fn new(registry: Arc<SubscriberRegistry>, doc_id: impl Into<String>) -> Self {
        Self {
            id: ConnectionId::new(),
            doc_id: doc_id.into(),
            registry,
            state: Mutex::new(ConnectionState::Connecting),
        }
    }

    /// Get this connection's ID
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Get the document this connection is bound to
    pub fn doc_id(&self) -> &str {
        &self.doc_id
    }

    /// Get the current state
    pub fn state(&self) -> ConnectionState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or(ConnectionState::Closed)
    }

    /// Handshake succeeded: join the document's subscriber set
    ///
    /// Only valid from `Connecting`; a closed connection cannot be reopened.
    pub fn open(&self, sender: PeerSender) {
        let admitted = match self.state.lock() {
            Ok(mut state) => {
                if *state == ConnectionState::Connecting {
                    *state = ConnectionState::Open;
                    true
                } else {
                    debug!(
                        "Refusing to open connection {} from state {:?}",
                        self.id, *state
                    );
                    false
                }
            }
            Err(_) => false,
        };

        if admitted {
            self.registry.join(&self.doc_id, self.id, sender);
        }
    }

    /// The transport signalled closure, or a delivery to this peer failed
    pub fn begin_close(&self) {
        if let Ok(mut state) = self.state.lock() {
            if *state == ConnectionState::Open {
                *state = ConnectionState::Closing;
            }
        }
    }

    /// Leave the registry and release the connection
    ///
    /// Idempotent and safe to invoke more than once; the second call (from
    /// whichever of explicit disconnect or broadcast cleanup loses the race)
    /// finds the state already `Closed` and does nothing.
    pub fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            if *state == ConnectionState::Closed {
                return;
            }
            *state = ConnectionState::Closed;
        }

        self.registry.leave(&self.doc_id, self.id);
        debug!("Connection {} closed (document '{}')", self.id, self.doc_id);
    }
}

impl Drop for ConnectionLifecycle {
    fn drop(&mut self) {
        // Registry entries must never outlive the transport handle
        self.close();
    }
}
