//! Redemption path: code verification to live join broadcast
//!
//! Joins the token service and the hub: a valid first-time redemption is
//! recorded once and announced once. Join counts change through here only;
//! everything an observer sees comes from the event stream plus the ledger.

use campus_common::events::CampusEvent;
use campus_common::session::RedemptionOutcome;
use chrono::{DateTime, Utc};

use crate::hub::EventHub;
use crate::session::SessionService;

/// Redeem `code` for `redeemer_id`, broadcasting a join event on success
///
/// Rejections (expired/unknown code, repeat redemption) are normal outcomes
/// reported to the caller with a reason; they publish nothing and are never
/// surfaced as server errors.
pub fn redeem(
    sessions: &SessionService,
    hub: &EventHub,
    code: &str,
    redeemer_id: &str,
) -> RedemptionOutcome {
    redeem_at(sessions, hub, code, redeemer_id, Utc::now())
}

pub fn redeem_at(
    sessions: &SessionService,
    hub: &EventHub,
    code: &str,
    redeemer_id: &str,
    now: DateTime<Utc>,
) -> RedemptionOutcome {
    let (outcome, scope) = sessions.redeem_at(code, redeemer_id, now);

    if let Some(scope) = scope {
        hub.publish(&CampusEvent::AttendanceJoin {
            student_id: redeemer_id.to_string(),
            scope,
            timestamp: now,
        });
    }

    outcome
}
