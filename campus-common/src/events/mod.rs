//! Event types for the campus live coordination layer
//!
//! Provides the shared event vocabulary and EventBus used by the broadcast
//! hub, the redemption path, and dashboard observers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

use crate::session::SessionScope;

/// Resources the dashboards know about.
///
/// Serialized as the lowercase resource name so that event frames stay
/// compatible with the string keys dashboards use for their local caches.
/// Unknown names round-trip losslessly through `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Resource {
    Materials,
    Messages,
    Students,
    Faculty,
    Exams,
    Attendance,
    Marks,
    Schedule,
    Assignments,
    Fees,
    Other(String),
}

impl Resource {
    /// Canonical lowercase name used on the wire and as a cache key
    pub fn as_str(&self) -> &str {
        match self {
            Resource::Materials => "materials",
            Resource::Messages => "messages",
            Resource::Students => "students",
            Resource::Faculty => "faculty",
            Resource::Exams => "exams",
            Resource::Attendance => "attendance",
            Resource::Marks => "marks",
            Resource::Schedule => "schedule",
            Resource::Assignments => "assignments",
            Resource::Fees => "fees",
            Resource::Other(name) => name,
        }
    }
}

impl From<String> for Resource {
    fn from(s: String) -> Self {
        match s.as_str() {
            "materials" => Resource::Materials,
            "messages" => Resource::Messages,
            "students" => Resource::Students,
            "faculty" => Resource::Faculty,
            "exams" => Resource::Exams,
            "attendance" => Resource::Attendance,
            "marks" => Resource::Marks,
            "schedule" => Resource::Schedule,
            "assignments" => Resource::Assignments,
            "fees" => Resource::Fees,
            _ => Resource::Other(s),
        }
    }
}

impl From<Resource> for String {
    fn from(r: Resource) -> Self {
        r.as_str().to_string()
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Campus event types
///
/// Events are broadcast through the hub and can be serialized for SSE
/// transmission. All producers use this central enum so consumers get
/// exhaustive matching; `ResourceChanged` is the catch-all for bulk or
/// otherwise untyped changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum CampusEvent {
    /// A record was created in the record store
    ///
    /// Triggers:
    /// - SSE: dashboards append/upsert when `data` carries the full entity,
    ///   otherwise re-fetch the resource
    RecordCreated {
        /// Resource the record belongs to
        resource: Resource,
        /// Record identity, when the producer knows it
        id: Option<String>,
        /// Full entity payload, when cheap to include
        data: Option<Value>,
        /// When the mutation happened
        timestamp: DateTime<Utc>,
    },

    /// A record was updated in the record store
    ///
    /// Triggers:
    /// - SSE: point upsert when `id` and full `data` are present,
    ///   otherwise re-fetch
    RecordUpdated {
        /// Resource the record belongs to
        resource: Resource,
        /// Record identity, when the producer knows it
        id: Option<String>,
        /// Full entity payload, when cheap to include
        data: Option<Value>,
        /// When the mutation happened
        timestamp: DateTime<Utc>,
    },

    /// A record was deleted from the record store
    ///
    /// Triggers:
    /// - SSE: dashboards drop the matching local item without a re-fetch
    RecordDeleted {
        /// Resource the record belonged to
        resource: Resource,
        /// Identity of the deleted record
        id: String,
        /// When the deletion happened
        timestamp: DateTime<Utc>,
    },

    /// Something about a resource changed in a way no typed variant covers
    ///
    /// Carries the producer's resource and action names verbatim. Consumers
    /// treat it as "local cache may be stale" and re-fetch.
    ResourceChanged {
        /// Resource name as the producer spelled it
        resource: String,
        /// Producer-defined action name (e.g. "batch-update")
        action: String,
        /// When the change happened
        timestamp: DateTime<Utc>,
    },

    /// A student redeemed an attendance code
    ///
    /// Emitted by the redemption path exactly once per accepted redemption.
    ///
    /// Triggers:
    /// - Faculty dashboard: increment live join counter, append log entry
    AttendanceJoin {
        /// Redeeming student
        student_id: String,
        /// Session the redemption belongs to
        scope: SessionScope,
        /// When the redemption was accepted
        timestamp: DateTime<Utc>,
    },

    /// A faculty member opened an attendance verification window
    SessionOpened {
        /// Session scope the window covers
        scope: SessionScope,
        /// Server-authoritative expiry
        expires_at: DateTime<Utc>,
        /// When the window opened
        timestamp: DateTime<Utc>,
    },

    /// Connection status frame (initial "connected" plus periodic heartbeat)
    ConnectionStatus {
        /// "connected" or "heartbeat"
        status: String,
        /// When the frame was produced
        timestamp: DateTime<Utc>,
    },
}

impl CampusEvent {
    /// Get event type as string for SSE event naming and filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            CampusEvent::RecordCreated { .. } => "RecordCreated",
            CampusEvent::RecordUpdated { .. } => "RecordUpdated",
            CampusEvent::RecordDeleted { .. } => "RecordDeleted",
            CampusEvent::ResourceChanged { .. } => "ResourceChanged",
            CampusEvent::AttendanceJoin { .. } => "AttendanceJoin",
            CampusEvent::SessionOpened { .. } => "SessionOpened",
            CampusEvent::ConnectionStatus { .. } => "ConnectionStatus",
        }
    }

    /// Resource name the event is about, when it is about one
    pub fn resource_name(&self) -> Option<&str> {
        match self {
            CampusEvent::RecordCreated { resource, .. }
            | CampusEvent::RecordUpdated { resource, .. }
            | CampusEvent::RecordDeleted { resource, .. } => Some(resource.as_str()),
            CampusEvent::ResourceChanged { resource, .. } => Some(resource),
            CampusEvent::AttendanceJoin { .. } => Some("attendance"),
            CampusEvent::SessionOpened { .. } | CampusEvent::ConnectionStatus { .. } => None,
        }
    }
}

// ========================================
// EventBus Implementation
// ========================================

/// Central in-process event distribution bus
///
/// Thin wrapper over tokio::broadcast, providing:
/// - Non-blocking emit (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
///
/// The HTTP hub maintains its own per-connection registry; EventBus is for
/// embedders that want in-process fan-out without an HTTP boundary.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CampusEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    ///
    /// Capacity bounds how many events a slow subscriber may lag before
    /// older events are dropped for it.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<CampusEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)`, or `Err` if no subscribers listen.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: CampusEvent,
    ) -> std::result::Result<usize, broadcast::error::SendError<CampusEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring whether anyone is listening
    pub fn emit_lossy(&self, event: CampusEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
