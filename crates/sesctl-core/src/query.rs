//! Read-only projections over the session store.
//!
//! Every read returns a detached snapshot with durations derived at the
//! moment of the call; nothing here mutates `last_accessed`. A status query
//! is not a liveness signal.

use std::sync::Arc;

use crate::clock::SessionClock;
use crate::error::{Error, Result};
use crate::session::{SessionSnapshot, SessionStatus};
use crate::store::SessionStore;

/// Query façade consumed by the interface layer.
pub struct SessionQueries {
    store: Arc<dyn SessionStore>,
    clock: SessionClock,
}

impl SessionQueries {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            clock: SessionClock::new(),
        }
    }

    /// One session with computed durations. Terminal records are returned
    /// as-is so an expired durable record stays observable.
    pub fn get(&self, session_id: &str) -> Result<SessionSnapshot> {
        let record = self
            .store
            .find_by_id(session_id)?
            .ok_or_else(|| Error::SessionNotFound(session_id.to_string()))?;
        Ok(SessionSnapshot::compute(record, &self.clock))
    }

    /// Every session with computed durations. Corrupt records are excluded
    /// by the store, never failing the whole listing.
    pub fn list_all(&self) -> Result<Vec<SessionSnapshot>> {
        let records = self.store.find_all()?;
        Ok(records
            .into_iter()
            .map(|r| SessionSnapshot::compute(r, &self.clock))
            .collect())
    }

    /// Only `Active` sessions, with computed durations.
    pub fn list_active(&self) -> Result<Vec<SessionSnapshot>> {
        let records = self.store.find_by_status(SessionStatus::Active)?;
        Ok(records
            .into_iter()
            .map(|r| SessionSnapshot::compute(r, &self.clock))
            .collect())
    }

    /// Count of `Active` sessions (health reporting).
    pub fn active_count(&self) -> Result<usize> {
        self.store.count_by_status(SessionStatus::Active)
    }
}
