//! Reconnecting observer client
//!
//! Owns one dashboard's connection to the hub: subscribe, establish a
//! baseline with full fetches, reduce every received event into the view,
//! and resubscribe after a fixed delay when the stream drops. Until
//! resubscription succeeds the view is marked stale, not blocked.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use campus_common::events::{CampusEvent, Resource};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

use crate::reducer::{self, Reaction};
use crate::sse;
use crate::view::{Freshness, ViewState};

/// Delay before attempting resubscription after a lost connection
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// The record-store boundary: where full fetches come from
///
/// Events are only a latency optimization; this is the source of truth the
/// caches converge to.
#[async_trait]
pub trait RecordFetcher: Send + Sync {
    /// Full fetch of one resource's documents
    async fn fetch_all(&self, resource: &Resource) -> anyhow::Result<Vec<Value>>;
}

/// One dashboard's connection to the hub's event stream
pub struct ObserverClient {
    stream_url: String,
    http: reqwest::Client,
}

impl ObserverClient {
    /// `base_url` is the hub root, e.g. `http://127.0.0.1:5730`
    pub fn new(base_url: &str) -> Self {
        Self {
            stream_url: format!("{}/api/stream", base_url.trim_end_matches('/')),
            http: reqwest::Client::new(),
        }
    }

    /// Run until the owning task is cancelled
    ///
    /// Each pass subscribes, fetches the baseline, and reduces events until
    /// the stream ends; then the view goes stale and the loop retries.
    pub async fn run(&self, state: Arc<Mutex<ViewState>>, fetcher: Arc<dyn RecordFetcher>) {
        loop {
            match self.observe_once(&state, fetcher.as_ref()).await {
                Ok(()) => info!("Event stream closed by server"),
                Err(e) => warn!("Event stream error: {e}"),
            }

            state.lock().await.freshness = Freshness::Stale;
            info!("View marked stale, resubscribing in {RECONNECT_DELAY:?}");
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    }

    /// One subscribe + baseline + reduce pass; returns when the stream ends
    async fn observe_once(
        &self,
        state: &Mutex<ViewState>,
        fetcher: &dyn RecordFetcher,
    ) -> anyhow::Result<()> {
        let response = self
            .http
            .get(&self.stream_url)
            .send()
            .await?
            .error_for_status()?;
        debug!("Subscribed to {}", self.stream_url);

        // Subscribed; establish the baseline before applying any events.
        // Frames buffered by the transport meanwhile are reduced afterwards,
        // which at worst repeats what the fetch already reflected.
        {
            let mut view = state.lock().await;
            let resources: Vec<Resource> = view.tracked().cloned().collect();
            for resource in resources {
                let items = fetcher.fetch_all(&resource).await?;
                if let Some(cache) = view.cache_mut(&resource) {
                    cache.replace_all(items);
                }
            }
            view.freshness = Freshness::Live;
        }

        let byte_stream = Box::pin(response.bytes_stream());
        let mut payloads = Box::pin(sse::data_payload_stream(byte_stream));
        while let Some(payload) = payloads.next().await {
            let event: CampusEvent = match serde_json::from_str(&payload) {
                Ok(event) => event,
                Err(e) => {
                    warn!("Skipping unparseable event frame: {e}");
                    continue;
                }
            };
            self.apply(state, fetcher, &event).await?;
        }

        Ok(())
    }

    /// Reduce one event into the view, fetching where the reducer asks
    async fn apply(
        &self,
        state: &Mutex<ViewState>,
        fetcher: &dyn RecordFetcher,
        event: &CampusEvent,
    ) -> anyhow::Result<()> {
        let reaction = {
            let mut view = state.lock().await;
            if let Some(live) = view.live_session.as_mut() {
                reducer::reduce_live_session(live, event);
            }
            reducer::reduce_resource(&mut view, event)
        };

        if let Reaction::Refetch(resource) = reaction {
            debug!("Re-fetching {resource} after coarse event");
            let items = fetcher.fetch_all(&resource).await?;
            let mut view = state.lock().await;
            if let Some(cache) = view.cache_mut(&resource) {
                cache.replace_all(items);
            }
        }

        Ok(())
    }
}
