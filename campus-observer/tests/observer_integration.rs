//! End-to-end reconciliation tests against a live hub
//!
//! Spins up a real campus-hub server on an ephemeral port, points the
//! observer client at it, and checks that dashboards converge: baseline
//! fetch on subscribe, optimistic deletes, re-fetch on coarse events, and
//! the live join counter fed by the redemption path.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use campus_common::config::HubConfig;
use campus_common::events::{CampusEvent, Resource};
use campus_common::session::SessionScope;
use campus_hub::{attendance, build_router, AppState};
use campus_observer::{Freshness, LiveSessionView, ObserverClient, RecordFetcher, ViewState};
use chrono::Utc;
use serde_json::{json, Value};
use tokio::sync::Mutex;

/// In-memory stand-in for the record store
struct MemoryFetcher {
    records: Mutex<HashMap<String, Vec<Value>>>,
}

impl MemoryFetcher {
    fn with_materials(items: Vec<Value>) -> Self {
        let mut records = HashMap::new();
        records.insert("materials".to_string(), items);
        Self {
            records: Mutex::new(records),
        }
    }

    async fn set(&self, resource: &str, items: Vec<Value>) {
        self.records
            .lock()
            .await
            .insert(resource.to_string(), items);
    }
}

#[async_trait]
impl RecordFetcher for MemoryFetcher {
    async fn fetch_all(&self, resource: &Resource) -> anyhow::Result<Vec<Value>> {
        Ok(self
            .records
            .lock()
            .await
            .get(resource.as_str())
            .cloned()
            .unwrap_or_default())
    }
}

/// Start a hub server on an ephemeral port
async fn spawn_hub() -> (AppState, SocketAddr) {
    let state = AppState::new(HubConfig::default());
    let app = build_router(state.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    (state, addr)
}

fn scope() -> SessionScope {
    SessionScope::normalized("F42", "2", "A", "CSE", "DS", 3)
}

/// Poll until `check` passes or a 5 s deadline expires
async fn converge<F>(view: &Arc<Mutex<ViewState>>, what: &str, check: F)
where
    F: Fn(&ViewState) -> bool,
{
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        if check(&*view.lock().await) {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn test_baseline_fetch_then_optimistic_delete() {
    let (state, addr) = spawn_hub().await;
    let fetcher = Arc::new(MemoryFetcher::with_materials(vec![
        json!({ "_id": "m1", "title": "Lecture 1" }),
        json!({ "_id": "m2", "title": "Lecture 2" }),
    ]));
    let view = Arc::new(Mutex::new(ViewState::tracking([Resource::Materials])));

    let client = ObserverClient::new(&format!("http://{addr}"));
    let run_view = Arc::clone(&view);
    let run_fetcher: Arc<dyn RecordFetcher> = Arc::clone(&fetcher) as Arc<dyn RecordFetcher>;
    let runner = tokio::spawn(async move { client.run(run_view, run_fetcher).await });

    // Subscribe + baseline: the cache holds the full fetch
    converge(&view, "baseline", |v| {
        v.freshness == Freshness::Live
            && v.cache(&Resource::Materials).map(|c| c.len()) == Some(2)
    })
    .await;

    // A delete event patches the cache without any re-fetch
    state.publish(&CampusEvent::RecordDeleted {
        resource: Resource::Materials,
        id: "m1".to_string(),
        timestamp: Utc::now(),
    });

    converge(&view, "optimistic delete", |v| {
        v.cache(&Resource::Materials).map(|c| c.len()) == Some(1)
    })
    .await;
    let guard = view.lock().await;
    let cache = guard.cache(&Resource::Materials).expect("cache");
    assert_eq!(cache.items()[0]["_id"], "m2");
    drop(guard);

    runner.abort();
}

#[tokio::test]
async fn test_coarse_event_triggers_refetch() {
    let (state, addr) = spawn_hub().await;
    let fetcher = Arc::new(MemoryFetcher::with_materials(vec![
        json!({ "_id": "m1", "title": "Lecture 1" }),
    ]));
    let view = Arc::new(Mutex::new(ViewState::tracking([Resource::Materials])));

    let client = ObserverClient::new(&format!("http://{addr}"));
    let run_view = Arc::clone(&view);
    let run_fetcher: Arc<dyn RecordFetcher> = Arc::clone(&fetcher) as Arc<dyn RecordFetcher>;
    let runner = tokio::spawn(async move { client.run(run_view, run_fetcher).await });

    converge(&view, "baseline", |v| v.freshness == Freshness::Live).await;

    // The store changes in a way the event does not describe; the reducer
    // must fall back to a full re-fetch
    fetcher
        .set(
            "materials",
            vec![
                json!({ "_id": "m1", "title": "Lecture 1" }),
                json!({ "_id": "m2", "title": "Lecture 2" }),
                json!({ "_id": "m3", "title": "Lecture 3" }),
            ],
        )
        .await;
    state.publish(&CampusEvent::RecordUpdated {
        resource: Resource::Materials,
        id: None,
        data: None,
        timestamp: Utc::now(),
    });

    converge(&view, "refetch", |v| {
        v.cache(&Resource::Materials).map(|c| c.len()) == Some(3)
    })
    .await;

    runner.abort();
}

#[tokio::test]
async fn test_redemption_drives_live_join_counter() {
    let (state, addr) = spawn_hub().await;
    let fetcher = Arc::new(MemoryFetcher::with_materials(Vec::new()));
    let view = Arc::new(Mutex::new({
        let mut v = ViewState::tracking([Resource::Materials]);
        v.live_session = Some(LiveSessionView::new(scope()));
        v
    }));

    let client = ObserverClient::new(&format!("http://{addr}"));
    let run_view = Arc::clone(&view);
    let run_fetcher: Arc<dyn RecordFetcher> = Arc::clone(&fetcher) as Arc<dyn RecordFetcher>;
    let runner = tokio::spawn(async move { client.run(run_view, run_fetcher).await });

    converge(&view, "baseline", |v| v.freshness == Freshness::Live).await;

    // Full redemption path: open a window, redeem twice (one accepted)
    let token = state.sessions.create_token(scope(), 60).expect("token");
    let first = attendance::redeem(&state.sessions, &state.hub, &token.code, "2311");
    assert!(first.accepted);
    let second = attendance::redeem(&state.sessions, &state.hub, &token.code, "2311");
    assert!(!second.accepted);

    // Exactly one join reaches the live counter, no re-fetch involved
    converge(&view, "join counter", |v| {
        v.live_session.as_ref().map(|l| l.join_count) == Some(1)
    })
    .await;
    let guard = view.lock().await;
    let live = guard.live_session.as_ref().expect("live session");
    assert_eq!(live.log.len(), 1);
    assert_eq!(live.log[0].student_id, "2311");
    drop(guard);

    runner.abort();
}
