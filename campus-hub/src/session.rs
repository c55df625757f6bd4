//! Session token service for attendance verification windows
//!
//! Issues short-lived numeric codes scoped to one (faculty, year, section,
//! branch, subject, period) tuple, answers authoritative status queries, and
//! keeps the redemption ledger. Expiry is lazy: tokens are judged against
//! the clock at read time and purged opportunistically, never by a sweeper.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use campus_common::events::CampusEvent;
use campus_common::session::{
    Redemption, RedemptionOutcome, RejectReason, SessionScope, SessionToken, TokenStatus,
};
use campus_common::{Error, Result};
use chrono::{DateTime, Utc};
use rand::Rng;
use tracing::{debug, info};

struct ServiceState {
    /// Currently resolvable tokens, keyed by code. Superseded tokens are
    /// removed eagerly; expired ones are purged lazily on create/status.
    tokens: HashMap<String, SessionToken>,
    /// Every accepted redemption, append-only
    redemptions: Vec<Redemption>,
    /// (code, redeemer) pairs already accepted, for idempotent rejection
    redeemed: HashSet<(String, String)>,
    /// Live join counter per code, for the issuing dashboard
    joins: HashMap<String, u64>,
}

/// In-memory token service; the single Mutex is the whole concurrency story
pub struct SessionService {
    code_digits: u32,
    state: Mutex<ServiceState>,
}

impl SessionService {
    pub fn new(code_digits: u32) -> Self {
        Self {
            code_digits,
            state: Mutex::new(ServiceState {
                tokens: HashMap::new(),
                redemptions: Vec::new(),
                redeemed: HashSet::new(),
                joins: HashMap::new(),
            }),
        }
    }

    /// Open a new attendance window for `scope`
    ///
    /// At most one token is active per scope: an existing active token for
    /// an equal scope is superseded and its code becomes unresolvable
    /// immediately, even though its wall-clock TTL has not elapsed.
    pub fn create_token(&self, scope: SessionScope, ttl_seconds: u64) -> Result<SessionToken> {
        self.create_token_at(scope, ttl_seconds, Utc::now())
    }

    pub fn create_token_at(
        &self,
        scope: SessionScope,
        ttl_seconds: u64,
        now: DateTime<Utc>,
    ) -> Result<SessionToken> {
        let mut state = self.state.lock().unwrap();

        // Lazy purge: drop expired tokens and their counters so the code
        // space only has to be unique among live windows
        let expired: Vec<String> = state
            .tokens
            .values()
            .filter(|t| t.is_expired(now))
            .map(|t| t.code.clone())
            .collect();
        for code in expired {
            state.tokens.remove(&code);
            state.joins.remove(&code);
            debug!("Purged expired token {code}");
        }

        // Supersede any active token for the same scope
        let superseded: Option<String> = state
            .tokens
            .values()
            .find(|t| t.scope == scope)
            .map(|t| t.code.clone());
        if let Some(code) = superseded {
            state.tokens.remove(&code);
            state.joins.remove(&code);
            info!("Superseded active token {code} for scope {scope:?}");
        }

        let code = generate_code(self.code_digits, &state.tokens)?;
        let token = SessionToken::new(code.clone(), scope, ttl_seconds, now);
        state.joins.insert(code.clone(), 0);
        state.tokens.insert(code.clone(), token.clone());
        info!("Opened attendance window {code}, ttl {ttl_seconds}s");

        Ok(token)
    }

    /// Authoritative status for a code
    ///
    /// Valid iff the code resolves to a stored token that has not been
    /// superseded and whose expiry lies in the future. Client countdowns
    /// must reconcile to this answer, not their own timers.
    pub fn status(&self, code: &str) -> TokenStatus {
        self.status_at(code, Utc::now())
    }

    pub fn status_at(&self, code: &str, now: DateTime<Utc>) -> TokenStatus {
        let mut state = self.state.lock().unwrap();
        match state.tokens.get(code) {
            Some(token) if !token.is_expired(now) => TokenStatus::valid_for(token, now),
            Some(_) => {
                // Expired but not yet purged; drop it on the way out
                state.tokens.remove(code);
                state.joins.remove(code);
                TokenStatus::invalid()
            }
            None => TokenStatus::invalid(),
        }
    }

    /// Redeem `code` for `redeemer_id`
    ///
    /// Check-then-write runs under the service lock, so in-process
    /// concurrent duplicates cannot double-count. Returns the outcome and,
    /// on acceptance, the scope for the caller's join event.
    pub fn redeem(&self, code: &str, redeemer_id: &str) -> (RedemptionOutcome, Option<SessionScope>) {
        self.redeem_at(code, redeemer_id, Utc::now())
    }

    pub fn redeem_at(
        &self,
        code: &str,
        redeemer_id: &str,
        now: DateTime<Utc>,
    ) -> (RedemptionOutcome, Option<SessionScope>) {
        let mut state = self.state.lock().unwrap();

        let scope = match state.tokens.get(code) {
            Some(token) if !token.is_expired(now) => token.scope.clone(),
            _ => {
                debug!("Rejected redemption of {code}: expired or unknown");
                return (
                    RedemptionOutcome::rejected(RejectReason::ExpiredOrUnknown),
                    None,
                );
            }
        };

        let key = (code.to_string(), redeemer_id.to_string());
        if state.redeemed.contains(&key) {
            debug!("Rejected redemption of {code} by {redeemer_id}: already redeemed");
            return (
                RedemptionOutcome::rejected(RejectReason::AlreadyRedeemed),
                None,
            );
        }

        state.redeemed.insert(key);
        state.redemptions.push(Redemption {
            code: code.to_string(),
            redeemer_id: redeemer_id.to_string(),
            timestamp: now,
        });
        *state.joins.entry(code.to_string()).or_insert(0) += 1;
        info!("Accepted redemption of {code} by {redeemer_id}");

        (RedemptionOutcome::accepted(), Some(scope))
    }

    /// Live join count for an open window (zero for unknown codes)
    pub fn join_count(&self, code: &str) -> u64 {
        let state = self.state.lock().unwrap();
        state.joins.get(code).copied().unwrap_or(0)
    }

    /// Snapshot of the redemption ledger
    pub fn redemptions(&self) -> Vec<Redemption> {
        self.state.lock().unwrap().redemptions.clone()
    }

    /// Number of currently resolvable tokens (expired entries may linger
    /// until the next create/status touches them)
    pub fn active_token_count(&self) -> usize {
        self.state.lock().unwrap().tokens.len()
    }

    /// Event describing a freshly opened window, for broadcast by the caller
    pub fn opened_event(token: &SessionToken) -> CampusEvent {
        CampusEvent::SessionOpened {
            scope: token.scope.clone(),
            expires_at: token.expires_at,
            timestamp: token.created_at,
        }
    }
}

/// Generate a numeric code of `digits` digits not currently in use
///
/// The short numeric space is acceptable because uniqueness is only needed
/// among live tokens. Random probing falls back to a linear scan before
/// reporting the space exhausted.
fn generate_code(digits: u32, active: &HashMap<String, SessionToken>) -> Result<String> {
    let lower = 10u64.pow(digits.saturating_sub(1));
    let upper = 10u64.pow(digits);

    let mut rng = rand::thread_rng();
    for _ in 0..50 {
        let code = rng.gen_range(lower..upper).to_string();
        if !active.contains_key(&code) {
            return Ok(code);
        }
    }

    // Dense occupancy; scan for the first free code
    for n in lower..upper {
        let code = n.to_string();
        if !active.contains_key(&code) {
            return Ok(code);
        }
    }

    Err(Error::Internal(format!(
        "No free {digits}-digit codes among {} active windows",
        active.len()
    )))
}
