//! campus-hub library - live coordination service
//!
//! Hosts the broadcast hub (observer fan-out), the session token service
//! (attendance windows), and the redemption path, behind a small Axum HTTP
//! surface. The embedding record-store layer publishes change events through
//! [`AppState::publish`]; dashboards consume them over `GET /api/stream`.

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use campus_common::config::HubConfig;
use campus_common::events::CampusEvent;

pub mod api;
pub mod attendance;
pub mod hub;
pub mod session;

pub use hub::EventHub;
pub use session::SessionService;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Broadcast connection registry
    pub hub: EventHub,
    /// Attendance token service
    pub sessions: Arc<SessionService>,
    /// Resolved service configuration
    pub config: HubConfig,
}

impl AppState {
    /// Create application state from resolved configuration
    pub fn new(config: HubConfig) -> Self {
        Self {
            hub: EventHub::new(config.event_buffer),
            sessions: Arc::new(SessionService::new(config.code_digits)),
            config,
        }
    }

    /// Publish a change event to every open observer connection
    ///
    /// This is the internal call the record-store layer makes on every
    /// create/update/delete. Best-effort: never fails toward the caller.
    pub fn publish(&self, event: &CampusEvent) -> usize {
        self.hub.publish(event)
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    Router::new()
        .route("/api/stream", get(api::event_stream))
        .route("/api/attendance/session", post(api::create_session))
        .route("/api/attendance/session/:code", get(api::session_status))
        .route("/api/attendance/verify", post(api::verify_session))
        .merge(api::health_routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
