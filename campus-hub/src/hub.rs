//! Broadcast hub: the registry of open observer connections
//!
//! Fans every published event out to all currently open connections.
//! Best-effort delivery: at most once per connection, FIFO within a
//! connection, nothing across connections, no replay for late subscribers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use campus_common::events::CampusEvent;
use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A pre-serialized event ready for transport
///
/// Serialization happens once per publish, not once per connection.
#[derive(Debug, Clone)]
pub struct EventFrame {
    /// Event type name, used for the SSE `event:` field
    pub kind: &'static str,
    /// JSON payload, shared across all connections
    pub data: Arc<str>,
}

impl EventFrame {
    fn encode(event: &CampusEvent) -> Option<Self> {
        match serde_json::to_string(event) {
            Ok(json) => Some(Self {
                kind: event.event_type(),
                data: Arc::from(json.as_str()),
            }),
            Err(e) => {
                warn!("Failed to serialize event {}: {e}", event.event_type());
                None
            }
        }
    }
}

/// Handle returned to the SSE endpoint for one observer connection
///
/// Receiving on `rx` yields frames in publish order. Dropping the
/// subscription (the client disconnected) unregisters the connection
/// promptly, without waiting for a failed write.
pub struct Subscription {
    pub id: Uuid,
    pub rx: mpsc::Receiver<EventFrame>,
    _guard: SubscriptionGuard,
}

struct SubscriptionGuard {
    id: Uuid,
    registry: Arc<Registry>,
}

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

struct Registry {
    connections: Mutex<HashMap<Uuid, mpsc::Sender<EventFrame>>>,
}

impl Registry {
    fn remove(&self, id: Uuid) {
        let mut conns = self.connections.lock().unwrap();
        if conns.remove(&id).is_some() {
            info!("Observer connection {id} closed, total {}", conns.len());
        }
    }
}

/// Owned registry of open observer connections
///
/// Cheap to clone; all clones share one registry. The registry map is the
/// only shared state, behind a single Mutex. `publish` never blocks and
/// never fails toward its caller: a closed connection is evicted, a full
/// (slow) connection just misses that frame.
#[derive(Clone)]
pub struct EventHub {
    registry: Arc<Registry>,
    /// Per-connection buffered frames before a slow consumer drops frames
    buffer: usize,
    heartbeat: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl EventHub {
    pub fn new(buffer: usize) -> Self {
        info!("Event hub initialized with per-connection buffer {buffer}");
        Self {
            registry: Arc::new(Registry {
                connections: Mutex::new(HashMap::new()),
            }),
            buffer,
            heartbeat: Arc::new(Mutex::new(None)),
        }
    }

    /// Register a new observer connection
    ///
    /// The connection's first frame is a `ConnectionStatus { connected }`
    /// so clients can distinguish an open stream from a stalled request.
    /// Events published before this call are never delivered.
    pub fn subscribe(&self) -> Subscription {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.buffer);

        let connected = CampusEvent::ConnectionStatus {
            status: "connected".to_string(),
            timestamp: Utc::now(),
        };
        if let Some(frame) = EventFrame::encode(&connected) {
            // Buffer is empty at this point, try_send cannot fail on capacity
            let _ = tx.try_send(frame);
        }

        let mut conns = self.registry.connections.lock().unwrap();
        conns.insert(id, tx);
        info!("Observer connection {id} opened, total {}", conns.len());
        drop(conns);

        Subscription {
            id,
            rx,
            _guard: SubscriptionGuard {
                id,
                registry: Arc::clone(&self.registry),
            },
        }
    }

    /// Remove a connection on normal client disconnect
    pub fn unsubscribe(&self, id: Uuid) {
        self.registry.remove(id);
    }

    /// Broadcast an event to every open connection
    ///
    /// Serializes once, then attempts a non-blocking write per connection.
    /// A closed channel evicts that connection; a full channel drops the
    /// frame for that connection only. Returns the number of connections
    /// the frame was written to.
    pub fn publish(&self, event: &CampusEvent) -> usize {
        let Some(frame) = EventFrame::encode(event) else {
            return 0;
        };

        let mut conns = self.registry.connections.lock().unwrap();
        let mut delivered = 0;
        let mut closed = Vec::new();

        for (id, tx) in conns.iter() {
            match tx.try_send(frame.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!("Connection {id} lagging, dropped {} frame", frame.kind);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*id),
            }
        }

        for id in closed {
            conns.remove(&id);
            warn!("Connection {id} no longer writable, removed from hub");
        }

        debug!("Broadcast {} to {delivered} connections", frame.kind);
        delivered
    }

    /// Current number of open connections
    pub fn connection_count(&self) -> usize {
        self.registry.connections.lock().unwrap().len()
    }

    /// Start the hub-owned heartbeat task
    ///
    /// Publishes a `ConnectionStatus { heartbeat }` frame on a fixed cadence
    /// so idle connections keep flowing through proxies. Owned by the hub
    /// lifecycle and cancelled by `shutdown`.
    pub fn start_heartbeat(&self, interval: Duration) {
        let hub = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick completes immediately
            loop {
                ticker.tick().await;
                debug!("Publishing heartbeat");
                hub.publish(&CampusEvent::ConnectionStatus {
                    status: "heartbeat".to_string(),
                    timestamp: Utc::now(),
                });
            }
        });

        let mut heartbeat = self.heartbeat.lock().unwrap();
        if let Some(old) = heartbeat.replace(handle) {
            old.abort();
        }
    }

    /// Stop the heartbeat and close every open connection
    ///
    /// Dropping the senders ends each observer's stream; a fresh hub can be
    /// constructed and started afterwards.
    pub fn shutdown(&self) {
        if let Some(handle) = self.heartbeat.lock().unwrap().take() {
            handle.abort();
        }

        let mut conns = self.registry.connections.lock().unwrap();
        let count = conns.len();
        conns.clear();
        info!("Event hub shut down, closed {count} connections");
    }
}
