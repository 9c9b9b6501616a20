//! Session lifecycle engine.
//!
//! Owns the state machine over session records: creation, liveness refresh,
//! explicit termination, and the inactivity sweep. Works against any
//! [`SessionStore`] implementation; the expiry policy is fixed per
//! deployment and never mixed.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::clock::{Instant, SessionClock};
use crate::error::{Error, Result};
use crate::session::{NetworkEndpoint, SessionRecord, SessionSnapshot, SessionStatus};
use crate::store::SessionStore;

/// What happens to a session on expiry (and, symmetrically, on logout).
///
/// `Delete` removes the record outright; `MarkExpired` flips its status and
/// keeps it observable. One deployment uses exactly one policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryPolicy {
    Delete,
    MarkExpired,
}

/// Caller-supplied identity for a new session.
#[derive(Debug, Clone)]
pub struct LoginInput {
    pub email: String,
    pub nickname: String,
    pub mac_address: String,
    pub client_ip: String,
}

/// Partial update applied by a touch. Absent fields stay unchanged.
#[derive(Debug, Clone, Default)]
pub struct TouchInput {
    pub email: Option<String>,
    pub nickname: Option<String>,
    /// Explicit refresh instant; defaults to `now()` when absent. Must not
    /// regress behind the record's `created_at`.
    pub last_accessed: Option<Instant>,
}

/// Result of one sweep pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct SweepOutcome {
    /// Non-terminal records examined.
    pub examined: usize,
    /// Records expired this pass.
    pub expired: usize,
}

/// Lifecycle engine over a session store.
pub struct SessionEngine {
    store: Arc<dyn SessionStore>,
    clock: SessionClock,
    server: NetworkEndpoint,
    inactivity_timeout: Duration,
    policy: ExpiryPolicy,
}

impl SessionEngine {
    pub fn new(
        store: Arc<dyn SessionStore>,
        server: NetworkEndpoint,
        inactivity_timeout: Duration,
        policy: ExpiryPolicy,
    ) -> Self {
        Self {
            store,
            clock: SessionClock::new(),
            server,
            inactivity_timeout,
            policy,
        }
    }

    pub fn clock(&self) -> &SessionClock {
        &self.clock
    }

    /// Create a new session. All identity fields must be non-empty.
    ///
    /// Returns the generated session id.
    pub fn login(&self, input: LoginInput) -> Result<String> {
        if input.email.trim().is_empty() {
            return Err(Error::MissingField("email"));
        }
        if input.nickname.trim().is_empty() {
            return Err(Error::MissingField("nickname"));
        }
        if input.mac_address.trim().is_empty() {
            return Err(Error::MissingField("macAddress"));
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        let now = self.clock.now();
        let record = SessionRecord {
            session_id: session_id.clone(),
            email: input.email,
            nickname: input.nickname,
            client: NetworkEndpoint {
                ip: input.client_ip,
                mac_address: input.mac_address,
            },
            server: self.server.clone(),
            status: SessionStatus::Active,
            created_at: now,
            last_accessed: now,
        };

        self.store.create(record)?;
        info!(session_id = %session_id, "Session created");
        Ok(session_id)
    }

    /// Terminate a session explicitly.
    ///
    /// Under `Delete` the record is removed; under `MarkExpired` its status
    /// becomes `UserTerminated`. A session already in a terminal status is
    /// reported as not found, matching the "no active session" contract.
    pub fn logout(&self, session_id: &str) -> Result<()> {
        match self.policy {
            ExpiryPolicy::Delete => {
                if !self.store.delete(session_id)? {
                    return Err(Error::SessionNotFound(session_id.to_string()));
                }
            }
            ExpiryPolicy::MarkExpired => {
                let updated = self.store.update_with(session_id, &mut |record| {
                    if record.status.is_terminal() {
                        return Err(Error::SessionNotFound(record.session_id.clone()));
                    }
                    record.status = SessionStatus::UserTerminated;
                    Ok(())
                })?;
                if updated.is_none() {
                    return Err(Error::SessionNotFound(session_id.to_string()));
                }
            }
        }
        info!(session_id = %session_id, "Session terminated by user");
        Ok(())
    }

    /// Refresh a session's liveness, optionally updating identity fields.
    ///
    /// Returns the updated record with freshly computed durations.
    pub fn touch(&self, session_id: &str, input: TouchInput) -> Result<SessionSnapshot> {
        let refreshed_at = match input.last_accessed {
            Some(explicit) => explicit,
            None => self.clock.now(),
        };

        let updated = self.store.update_with(session_id, &mut |record| {
            if record.status.is_terminal() {
                return Err(Error::SessionNotFound(record.session_id.clone()));
            }
            if refreshed_at < record.created_at {
                return Err(Error::NonMonotonicTimestamp {
                    created_at: self.clock.format(record.created_at),
                    last_accessed: self.clock.format(refreshed_at),
                });
            }
            if let Some(email) = &input.email {
                if email.trim().is_empty() {
                    return Err(Error::MissingField("email"));
                }
                record.email = email.clone();
            }
            if let Some(nickname) = &input.nickname {
                if nickname.trim().is_empty() {
                    return Err(Error::MissingField("nickname"));
                }
                record.nickname = nickname.clone();
            }
            record.last_accessed = refreshed_at;
            Ok(())
        })?;

        let record = updated.ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
        debug!(session_id = %session_id, "Session refreshed");
        Ok(SessionSnapshot::compute(record, &self.clock))
    }

    /// Administrative reset: remove every record, return how many.
    pub fn delete_all(&self) -> Result<usize> {
        let removed = self.store.delete_all()?;
        info!(removed, "All sessions deleted");
        Ok(removed)
    }

    /// Expire every active session idle past the configured threshold.
    ///
    /// The idle check re-runs inside the store's critical section, so a
    /// record refreshed between listing and expiry survives. Running the
    /// sweep twice in a row has no further effect: the first pass leaves no
    /// active idle records behind.
    pub fn sweep_expired(&self) -> Result<SweepOutcome> {
        let cutoff = self.cutoff();
        let candidates = self.store.find_by_status(SessionStatus::Active)?;

        let mut outcome = SweepOutcome {
            examined: candidates.len(),
            ..Default::default()
        };
        for record in candidates {
            if record.last_accessed > cutoff {
                continue;
            }
            let expired = match self.policy {
                ExpiryPolicy::Delete => self.store.delete_if_idle(&record.session_id, cutoff),
                ExpiryPolicy::MarkExpired => {
                    self.store.mark_expired_if_idle(&record.session_id, cutoff)
                }
            };
            match expired {
                Ok(true) => {
                    info!(session_id = %record.session_id, "Session expired for inactivity");
                    outcome.expired += 1;
                }
                Ok(false) => {}
                // A single bad record must not abort the pass.
                Err(e) if e.is_corrupt_record() => {
                    warn!(session_id = %record.session_id, error = %e, "Skipping corrupt session in sweep");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(outcome)
    }

    fn cutoff(&self) -> Instant {
        self.clock.now() - chrono::Duration::seconds(self.inactivity_timeout.as_secs() as i64)
    }
}
