//! Client-held view state
//!
//! Caches mirror record-store documents as raw JSON objects keyed by their
//! `_id`/`id` field, the shape the dashboards render directly.

use std::collections::HashMap;

use campus_common::events::Resource;
use campus_common::session::SessionScope;
use chrono::{DateTime, Utc};
use serde_json::Value;

/// Whether the view is connected to the event stream
///
/// A `Stale` view keeps rendering and accepting user actions; it is only
/// marked so the user can see the data may lag until resubscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Live,
    Stale,
}

/// Extract a document's identity, accepting both `_id` and `id`
pub fn item_id(item: &Value) -> Option<&str> {
    item.get("_id")
        .or_else(|| item.get("id"))
        .and_then(Value::as_str)
}

/// Local cache of one resource's documents
#[derive(Debug, Default)]
pub struct ResourceCache {
    items: Vec<Value>,
}

impl ResourceCache {
    pub fn items(&self) -> &[Value] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Replace the whole cache with a fresh full fetch
    pub fn replace_all(&mut self, items: Vec<Value>) {
        self.items = items;
    }

    /// Point upsert: replace the item with a matching id, or append
    pub fn upsert(&mut self, id: &str, item: Value) {
        match self.items.iter_mut().find(|i| item_id(i) == Some(id)) {
            Some(existing) => *existing = item,
            None => self.items.push(item),
        }
    }

    /// Remove the item with a matching id; true if something was removed
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|i| item_id(i) != Some(id));
        self.items.len() != before
    }
}

/// One entry in the faculty view's security log
#[derive(Debug, Clone)]
pub struct JoinLogEntry {
    pub student_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Live state of the attendance window a faculty dashboard is showing
///
/// Updated straight from join events so the counter stays responsive under
/// high event frequency; the attendance records themselves reconcile later
/// through the normal fetch path.
#[derive(Debug)]
pub struct LiveSessionView {
    pub scope: SessionScope,
    pub join_count: u64,
    pub log: Vec<JoinLogEntry>,
}

impl LiveSessionView {
    pub fn new(scope: SessionScope) -> Self {
        Self {
            scope,
            join_count: 0,
            log: Vec::new(),
        }
    }
}

/// Everything one dashboard instance holds locally
#[derive(Debug)]
pub struct ViewState {
    caches: HashMap<Resource, ResourceCache>,
    pub freshness: Freshness,
    /// Present while the dashboard displays an open attendance window
    pub live_session: Option<LiveSessionView>,
}

impl ViewState {
    /// A view tracking the given resources, initially stale until the first
    /// subscribe + baseline fetch completes
    pub fn tracking(resources: impl IntoIterator<Item = Resource>) -> Self {
        Self {
            caches: resources
                .into_iter()
                .map(|r| (r, ResourceCache::default()))
                .collect(),
            freshness: Freshness::Stale,
            live_session: None,
        }
    }

    pub fn is_tracked(&self, resource: &Resource) -> bool {
        self.caches.contains_key(resource)
    }

    pub fn tracked(&self) -> impl Iterator<Item = &Resource> {
        self.caches.keys()
    }

    pub fn cache(&self, resource: &Resource) -> Option<&ResourceCache> {
        self.caches.get(resource)
    }

    pub fn cache_mut(&mut self, resource: &Resource) -> Option<&mut ResourceCache> {
        self.caches.get_mut(resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_id_prefers_underscore_id() {
        let item = json!({ "_id": "m1", "id": "other" });
        assert_eq!(item_id(&item), Some("m1"));
        assert_eq!(item_id(&json!({ "id": "m2" })), Some("m2"));
        assert_eq!(item_id(&json!({ "title": "no id" })), None);
    }

    #[test]
    fn test_upsert_replaces_in_place_or_appends() {
        let mut cache = ResourceCache::default();
        cache.replace_all(vec![json!({ "_id": "m1", "v": 1 })]);

        cache.upsert("m1", json!({ "_id": "m1", "v": 2 }));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.items()[0]["v"], 2);

        cache.upsert("m2", json!({ "_id": "m2", "v": 1 }));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_remove_by_either_id_field() {
        let mut cache = ResourceCache::default();
        cache.replace_all(vec![
            json!({ "_id": "m1" }),
            json!({ "id": "m2" }),
        ]);

        assert!(cache.remove("m2"));
        assert!(!cache.remove("m2"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_tracking_starts_stale() {
        let view = ViewState::tracking([Resource::Materials, Resource::Messages]);
        assert_eq!(view.freshness, Freshness::Stale);
        assert!(view.is_tracked(&Resource::Materials));
        assert!(!view.is_tracked(&Resource::Exams));
    }
}
