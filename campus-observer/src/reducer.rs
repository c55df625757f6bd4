//! Reducers: event x view state -> view state
//!
//! Total and pure over their inputs, so every merge rule is unit-testable
//! without a live connection. The client applies these per received event
//! and performs the I/O a `Refetch` reaction asks for.

use campus_common::events::{CampusEvent, Resource};
use tracing::debug;

use crate::view::{JoinLogEntry, LiveSessionView, ViewState};

/// What a reduced event asks of the caller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    /// The cache was patched in place; nothing to fetch
    Applied,
    /// The event was too coarse to patch; re-fetch this resource
    Refetch(Resource),
    /// The event does not concern this view
    Ignored,
}

/// Apply one event to the per-resource caches
///
/// Deletes are applied optimistically by id. Creates/updates are applied as
/// point upserts only when the event carries both an id and the full entity;
/// anything coarser degrades to a re-fetch of that resource. Join events are
/// left to [`reduce_live_session`], which skips the fetch round-trip.
pub fn reduce_resource(state: &mut ViewState, event: &CampusEvent) -> Reaction {
    match event {
        CampusEvent::RecordDeleted { resource, id, .. } => {
            match state.cache_mut(resource) {
                Some(cache) => {
                    cache.remove(id);
                    Reaction::Applied
                }
                None => Reaction::Ignored,
            }
        }

        CampusEvent::RecordCreated {
            resource,
            id: Some(id),
            data: Some(data),
            ..
        }
        | CampusEvent::RecordUpdated {
            resource,
            id: Some(id),
            data: Some(data),
            ..
        } => match state.cache_mut(resource) {
            Some(cache) => {
                cache.upsert(id, data.clone());
                Reaction::Applied
            }
            None => Reaction::Ignored,
        },

        CampusEvent::RecordCreated { resource, .. }
        | CampusEvent::RecordUpdated { resource, .. } => {
            if state.is_tracked(resource) {
                Reaction::Refetch(resource.clone())
            } else {
                Reaction::Ignored
            }
        }

        CampusEvent::ResourceChanged { resource, action, .. } => {
            let resource = Resource::from(resource.clone());
            if state.is_tracked(&resource) {
                debug!("Bulk change ({action}) on {resource}, re-fetching");
                Reaction::Refetch(resource)
            } else {
                Reaction::Ignored
            }
        }

        CampusEvent::AttendanceJoin { .. }
        | CampusEvent::SessionOpened { .. }
        | CampusEvent::ConnectionStatus { .. } => Reaction::Ignored,
    }
}

/// Apply one event to the live attendance window view
///
/// A join for the displayed scope increments the counter and appends to the
/// security log without any fetch. Joins for other scopes are ignored.
/// Returns whether the view changed.
pub fn reduce_live_session(view: &mut LiveSessionView, event: &CampusEvent) -> bool {
    if let CampusEvent::AttendanceJoin {
        student_id,
        scope,
        timestamp,
    } = event
    {
        if *scope == view.scope {
            view.join_count += 1;
            view.log.push(JoinLogEntry {
                student_id: student_id.clone(),
                timestamp: *timestamp,
            });
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use campus_common::session::SessionScope;
    use chrono::Utc;
    use serde_json::json;

    fn tracked_view() -> ViewState {
        let mut view = ViewState::tracking([Resource::Materials, Resource::Messages]);
        view.cache_mut(&Resource::Materials)
            .unwrap()
            .replace_all(vec![
                json!({ "_id": "m1", "title": "Lecture 1" }),
                json!({ "_id": "m2", "title": "Lecture 2" }),
            ]);
        view
    }

    fn scope() -> SessionScope {
        SessionScope::normalized("F42", "2", "A", "CSE", "DS", 3)
    }

    #[test]
    fn test_delete_removes_matching_item_without_refetch() {
        let mut view = tracked_view();
        let event = CampusEvent::RecordDeleted {
            resource: Resource::Materials,
            id: "m1".to_string(),
            timestamp: Utc::now(),
        };

        assert_eq!(reduce_resource(&mut view, &event), Reaction::Applied);

        let cache = view.cache(&Resource::Materials).unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.items()[0]["_id"], "m2");
    }

    #[test]
    fn test_delete_of_absent_id_still_applies_cleanly() {
        let mut view = tracked_view();
        let event = CampusEvent::RecordDeleted {
            resource: Resource::Materials,
            id: "m9".to_string(),
            timestamp: Utc::now(),
        };

        assert_eq!(reduce_resource(&mut view, &event), Reaction::Applied);
        assert_eq!(view.cache(&Resource::Materials).unwrap().len(), 2);
    }

    #[test]
    fn test_update_with_full_payload_is_a_point_upsert() {
        let mut view = tracked_view();
        let event = CampusEvent::RecordUpdated {
            resource: Resource::Materials,
            id: Some("m2".to_string()),
            data: Some(json!({ "_id": "m2", "title": "Lecture 2 (rev)" })),
            timestamp: Utc::now(),
        };

        assert_eq!(reduce_resource(&mut view, &event), Reaction::Applied);

        let cache = view.cache(&Resource::Materials).unwrap();
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.items()[1]["title"], "Lecture 2 (rev)");
    }

    #[test]
    fn test_update_without_payload_degrades_to_refetch() {
        let mut view = tracked_view();
        let event = CampusEvent::RecordUpdated {
            resource: Resource::Materials,
            id: Some("m2".to_string()),
            data: None,
            timestamp: Utc::now(),
        };

        assert_eq!(
            reduce_resource(&mut view, &event),
            Reaction::Refetch(Resource::Materials)
        );
        // The stale item stays until the fetch lands
        assert_eq!(view.cache(&Resource::Materials).unwrap().len(), 2);
    }

    #[test]
    fn test_bulk_change_on_tracked_resource_refetches() {
        let mut view = tracked_view();
        let event = CampusEvent::ResourceChanged {
            resource: "messages".to_string(),
            action: "batch-update".to_string(),
            timestamp: Utc::now(),
        };

        assert_eq!(
            reduce_resource(&mut view, &event),
            Reaction::Refetch(Resource::Messages)
        );
    }

    #[test]
    fn test_events_for_untracked_resources_are_ignored() {
        let mut view = tracked_view();
        let event = CampusEvent::RecordDeleted {
            resource: Resource::Exams,
            id: "e1".to_string(),
            timestamp: Utc::now(),
        };
        assert_eq!(reduce_resource(&mut view, &event), Reaction::Ignored);

        let event = CampusEvent::ResourceChanged {
            resource: "exam-monitor".to_string(),
            action: "update".to_string(),
            timestamp: Utc::now(),
        };
        assert_eq!(reduce_resource(&mut view, &event), Reaction::Ignored);
    }

    #[test]
    fn test_join_events_do_not_touch_resource_caches() {
        let mut view = tracked_view();
        let event = CampusEvent::AttendanceJoin {
            student_id: "2311".to_string(),
            scope: scope(),
            timestamp: Utc::now(),
        };
        assert_eq!(reduce_resource(&mut view, &event), Reaction::Ignored);
    }

    #[test]
    fn test_join_for_displayed_scope_increments_and_logs() {
        let mut live = LiveSessionView::new(scope());
        let event = CampusEvent::AttendanceJoin {
            student_id: "2311".to_string(),
            scope: scope(),
            timestamp: Utc::now(),
        };

        assert!(reduce_live_session(&mut live, &event));
        assert!(reduce_live_session(&mut live, &CampusEvent::AttendanceJoin {
            student_id: "2312".to_string(),
            scope: scope(),
            timestamp: Utc::now(),
        }));

        assert_eq!(live.join_count, 2);
        assert_eq!(live.log.len(), 2);
        assert_eq!(live.log[0].student_id, "2311");
    }

    #[test]
    fn test_join_for_other_scope_is_ignored() {
        let mut live = LiveSessionView::new(scope());
        let other = SessionScope::normalized("F42", "3", "B", "CSE", "DS", 3);
        let event = CampusEvent::AttendanceJoin {
            student_id: "2311".to_string(),
            scope: other,
            timestamp: Utc::now(),
        };

        assert!(!reduce_live_session(&mut live, &event));
        assert_eq!(live.join_count, 0);
        assert!(live.log.is_empty());
    }

    #[test]
    fn test_non_join_events_leave_live_view_unchanged() {
        let mut live = LiveSessionView::new(scope());
        let event = CampusEvent::ConnectionStatus {
            status: "heartbeat".to_string(),
            timestamp: Utc::now(),
        };
        assert!(!reduce_live_session(&mut live, &event));
    }
}
