//! # Campus Observer Library
//!
//! Dashboard-side reconciliation over the hub's event stream:
//! - Per-resource reducers: pure functions from event and cache to cache
//! - A live-session view (join counter + security log) for open windows
//! - A reconnecting SSE client that keeps local caches converged with the
//!   record store
//!
//! Events are a latency optimization, not the source of truth: every cache
//! must converge to what a fresh full fetch would produce, and the client
//! falls back to re-fetching whenever an event is ambiguous.

pub mod client;
pub mod reducer;
pub mod sse;
pub mod view;

pub use client::{ObserverClient, RecordFetcher};
pub use reducer::{reduce_live_session, reduce_resource, Reaction};
pub use view::{Freshness, JoinLogEntry, LiveSessionView, ResourceCache, ViewState};
