//! Attendance session domain model
//!
//! Scopes, short-lived numeric tokens, and redemption records shared by the
//! hub service and dashboard observers. Expiry is always computed from stored
//! timestamps at read time; nothing here runs a background sweep.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// The tuple identifying which attendance session a token or redemption
/// belongs to. Equality (and the one-active-token-per-scope rule) is over
/// the normalized form, so callers must construct scopes via `normalized`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionScope {
    pub faculty_id: String,
    pub year: String,
    pub section: String,
    pub branch: String,
    pub subject: String,
    pub period: u32,
}

impl SessionScope {
    /// Build a scope with the input hygiene dashboards rely on: year reduced
    /// to its digits, section upper-cased with any leading "Section" label
    /// stripped, branch and subject trimmed.
    pub fn normalized(
        faculty_id: &str,
        year: &str,
        section: &str,
        branch: &str,
        subject: &str,
        period: u32,
    ) -> Self {
        let year: String = year.chars().filter(|c| c.is_ascii_digit()).collect();

        let mut section = section.trim();
        for label in ["Section", "section", "SECTION"] {
            if let Some(rest) = section.strip_prefix(label) {
                section = rest.trim();
                break;
            }
        }

        Self {
            faculty_id: faculty_id.trim().to_string(),
            year,
            section: section.to_uppercase(),
            branch: branch.trim().to_string(),
            subject: subject.trim().to_string(),
            period,
        }
    }
}

/// One open attendance-verification window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionToken {
    /// Short numeric code, unique among currently active tokens only
    pub code: String,
    pub scope: SessionScope,
    pub created_at: DateTime<Utc>,
    pub ttl_seconds: u64,
    /// Server-authoritative expiry; client countdowns are advisory
    pub expires_at: DateTime<Utc>,
}

impl SessionToken {
    pub fn new(code: String, scope: SessionScope, ttl_seconds: u64, now: DateTime<Utc>) -> Self {
        Self {
            code,
            scope,
            created_at: now,
            ttl_seconds,
            expires_at: now + Duration::seconds(ttl_seconds as i64),
        }
    }

    /// Lazy expiry check: expired iff `now` has reached `expires_at`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Whole seconds until expiry, zero once expired
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> u64 {
        (self.expires_at - now).num_seconds().max(0) as u64
    }
}

/// Authoritative answer to "is this code still redeemable"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenStatus {
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<SessionScope>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<u64>,
}

impl TokenStatus {
    pub fn invalid() -> Self {
        Self {
            valid: false,
            scope: None,
            remaining_seconds: None,
        }
    }

    pub fn valid_for(token: &SessionToken, now: DateTime<Utc>) -> Self {
        Self {
            valid: true,
            scope: Some(token.scope.clone()),
            remaining_seconds: Some(token.remaining_seconds(now)),
        }
    }
}

/// Durable record of one successful code use by one redeemer.
/// Never mutated or deleted once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Redemption {
    pub code: String,
    pub redeemer_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Why a redemption was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Code is expired, superseded, or was never issued
    ExpiredOrUnknown,
    /// This redeemer already used this code; idempotent rejection
    AlreadyRedeemed,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::ExpiredOrUnknown => f.write_str("expired_or_unknown"),
            RejectReason::AlreadyRedeemed => f.write_str("already_redeemed"),
        }
    }
}

/// Result of a redeem call; rejection is a normal outcome, not an error
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedemptionOutcome {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
}

impl RedemptionOutcome {
    pub fn accepted() -> Self {
        Self {
            accepted: true,
            reason: None,
        }
    }

    pub fn rejected(reason: RejectReason) -> Self {
        Self {
            accepted: false,
            reason: Some(reason),
        }
    }
}
