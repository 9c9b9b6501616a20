//! Session entity types.

use serde::{Deserialize, Serialize};

use crate::clock::{DurationParts, Instant};

/// Lifecycle status of a session.
///
/// `Active` is the only state that permits further transitions; the rest are
/// terminal and the record may only be deleted from them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Active,
    Inactive,
    UserTerminated,
    ErrorTerminated,
    Expired,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "Active",
            SessionStatus::Inactive => "Inactive",
            SessionStatus::UserTerminated => "UserTerminated",
            SessionStatus::ErrorTerminated => "ErrorTerminated",
            SessionStatus::Expired => "Expired",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Active" => Some(SessionStatus::Active),
            "Inactive" => Some(SessionStatus::Inactive),
            "UserTerminated" => Some(SessionStatus::UserTerminated),
            "ErrorTerminated" => Some(SessionStatus::ErrorTerminated),
            "Expired" => Some(SessionStatus::Expired),
            _ => None,
        }
    }

    /// Terminal statuses admit no further transition.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Active)
    }
}

/// Network attribution for one side of the connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEndpoint {
    pub ip: String,
    pub mac_address: String,
}

/// One tracked login session.
///
/// `session_id`, `client`, `server`, and `created_at` are immutable after
/// creation. Connection and inactivity durations are never stored; they are
/// derived on read from `created_at` and `last_accessed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub session_id: String,
    pub email: String,
    pub nickname: String,
    pub client: NetworkEndpoint,
    pub server: NetworkEndpoint,
    pub status: SessionStatus,
    pub created_at: Instant,
    pub last_accessed: Instant,
}

/// Detached read projection: a record copy plus freshly computed durations.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    pub record: SessionRecord,
    /// Elapsed time since session creation.
    pub connection: DurationParts,
    /// Elapsed time since the last refresh.
    pub inactivity: DurationParts,
}

impl SessionSnapshot {
    /// Derive durations for a record against the clock's current instant.
    pub fn compute(record: SessionRecord, clock: &crate::clock::SessionClock) -> Self {
        let now = clock.now();
        let connection =
            DurationParts::from_seconds(clock.elapsed_seconds(record.created_at, now));
        let inactivity =
            DurationParts::from_seconds(clock.elapsed_seconds(record.last_accessed, now));
        Self {
            record,
            connection,
            inactivity,
        }
    }
}
