//! HTTP API handlers for campus-hub

pub mod attendance;
pub mod health;
pub mod stream;

pub use attendance::{create_session, session_status, verify_session};
pub use health::health_routes;
pub use stream::event_stream;
