//! Volatile in-memory session store.
//!
//! A single map behind a `Mutex`; every operation, including the
//! read-modify-write of `update_with`, runs inside one critical section, so
//! a concurrent refresh and sweep can never interleave on the same record.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::clock::Instant;
use crate::error::{Error, Result};
use crate::session::{SessionRecord, SessionStatus};
use crate::store::{RecordMutator, SessionStore};

/// In-memory session store. No persistence across restarts.
#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, SessionRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, SessionRecord>>> {
        self.sessions.lock().map_err(|_| Error::LockPoisoned)
    }
}

impl SessionStore for MemoryStore {
    fn create(&self, record: SessionRecord) -> Result<()> {
        let mut sessions = self.lock()?;
        if sessions.contains_key(&record.session_id) {
            return Err(Error::SessionExists(record.session_id));
        }
        sessions.insert(record.session_id.clone(), record);
        Ok(())
    }

    fn find_by_id(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let sessions = self.lock()?;
        Ok(sessions.get(session_id).cloned())
    }

    fn update_with(
        &self,
        session_id: &str,
        apply: RecordMutator<'_>,
    ) -> Result<Option<SessionRecord>> {
        let mut sessions = self.lock()?;
        match sessions.get_mut(session_id) {
            Some(record) => {
                // Mutate a copy so a failed mutator leaves the record intact.
                let mut updated = record.clone();
                apply(&mut updated)?;
                *record = updated.clone();
                Ok(Some(updated))
            }
            None => Ok(None),
        }
    }

    fn delete(&self, session_id: &str) -> Result<bool> {
        let mut sessions = self.lock()?;
        Ok(sessions.remove(session_id).is_some())
    }

    fn delete_if_idle(&self, session_id: &str, cutoff: Instant) -> Result<bool> {
        let mut sessions = self.lock()?;
        let idle = sessions
            .get(session_id)
            .map(|r| r.status == SessionStatus::Active && r.last_accessed <= cutoff)
            .unwrap_or(false);
        if idle {
            sessions.remove(session_id);
        }
        Ok(idle)
    }

    fn mark_expired_if_idle(&self, session_id: &str, cutoff: Instant) -> Result<bool> {
        let mut sessions = self.lock()?;
        match sessions.get_mut(session_id) {
            Some(r) if r.status == SessionStatus::Active && r.last_accessed <= cutoff => {
                r.status = SessionStatus::Expired;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn delete_all(&self) -> Result<usize> {
        let mut sessions = self.lock()?;
        let count = sessions.len();
        sessions.clear();
        Ok(count)
    }

    fn find_all(&self) -> Result<Vec<SessionRecord>> {
        let sessions = self.lock()?;
        Ok(sessions.values().cloned().collect())
    }

    fn find_by_status(&self, status: SessionStatus) -> Result<Vec<SessionRecord>> {
        let sessions = self.lock()?;
        Ok(sessions
            .values()
            .filter(|r| r.status == status)
            .cloned()
            .collect())
    }

    fn count_by_status(&self, status: SessionStatus) -> Result<usize> {
        let sessions = self.lock()?;
        Ok(sessions.values().filter(|r| r.status == status).count())
    }

    fn ping(&self) -> Result<()> {
        self.lock().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SessionClock;
    use crate::session::NetworkEndpoint;

    fn sample_record(id: &str) -> SessionRecord {
        let clock = SessionClock::new();
        let now = clock.now();
        SessionRecord {
            session_id: id.to_string(),
            email: "a@x.com".to_string(),
            nickname: "a".to_string(),
            client: NetworkEndpoint {
                ip: "10.0.0.1".to_string(),
                mac_address: "AA:BB".to_string(),
            },
            server: NetworkEndpoint {
                ip: "10.0.0.2".to_string(),
                mac_address: "CC:DD".to_string(),
            },
            status: SessionStatus::Active,
            created_at: now,
            last_accessed: now,
        }
    }

    #[test]
    fn test_create_and_find() {
        let store = MemoryStore::new();
        store.create(sample_record("s1")).unwrap();

        let found = store.find_by_id("s1").unwrap().unwrap();
        assert_eq!(found.nickname, "a");
        assert!(store.find_by_id("missing").unwrap().is_none());
    }

    #[test]
    fn test_create_duplicate_rejected() {
        let store = MemoryStore::new();
        store.create(sample_record("s1")).unwrap();

        let err = store.create(sample_record("s1")).unwrap_err();
        assert!(matches!(err, Error::SessionExists(_)));
    }

    #[test]
    fn test_update_with_applies_mutation() {
        let store = MemoryStore::new();
        store.create(sample_record("s1")).unwrap();

        let updated = store
            .update_with("s1", &mut |r| {
                r.nickname = "b".to_string();
                Ok(())
            })
            .unwrap()
            .unwrap();
        assert_eq!(updated.nickname, "b");
        assert_eq!(store.find_by_id("s1").unwrap().unwrap().nickname, "b");
    }

    #[test]
    fn test_update_with_missing_is_none() {
        let store = MemoryStore::new();
        let result = store.update_with("nope", &mut |_| Ok(())).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_failed_mutator_leaves_record_unchanged() {
        let store = MemoryStore::new();
        store.create(sample_record("s1")).unwrap();

        let err = store.update_with("s1", &mut |r| {
            r.nickname = "broken".to_string();
            Err(Error::MissingField("nickname"))
        });
        assert!(err.is_err());
        assert_eq!(store.find_by_id("s1").unwrap().unwrap().nickname, "a");
    }

    #[test]
    fn test_delete_if_idle_respects_refresh() {
        let clock = SessionClock::new();
        let store = MemoryStore::new();
        store.create(sample_record("s1")).unwrap();

        // Cutoff in the past: the record was touched after it, so it stays.
        let old_cutoff = clock.parse("01-01-2020 00:00:00").unwrap();
        assert!(!store.delete_if_idle("s1", old_cutoff).unwrap());
        assert!(store.find_by_id("s1").unwrap().is_some());

        // Cutoff in the future: record is idle, so it goes.
        let future_cutoff = clock.parse("01-01-2099 00:00:00").unwrap();
        assert!(store.delete_if_idle("s1", future_cutoff).unwrap());
        assert!(store.find_by_id("s1").unwrap().is_none());
    }

    #[test]
    fn test_mark_expired_if_idle_only_hits_active() {
        let clock = SessionClock::new();
        let store = MemoryStore::new();
        store.create(sample_record("s1")).unwrap();

        let future_cutoff = clock.parse("01-01-2099 00:00:00").unwrap();
        assert!(store.mark_expired_if_idle("s1", future_cutoff).unwrap());
        assert_eq!(
            store.find_by_id("s1").unwrap().unwrap().status,
            SessionStatus::Expired
        );

        // Already terminal: second pass is a no-op.
        assert!(!store.mark_expired_if_idle("s1", future_cutoff).unwrap());
    }

    #[test]
    fn test_delete_all_returns_count() {
        let store = MemoryStore::new();
        store.create(sample_record("s1")).unwrap();
        store.create(sample_record("s2")).unwrap();

        assert_eq!(store.delete_all().unwrap(), 2);
        assert_eq!(store.find_all().unwrap().len(), 0);
        assert_eq!(store.delete_all().unwrap(), 0);
    }

    #[test]
    fn test_find_by_status() {
        let store = MemoryStore::new();
        store.create(sample_record("s1")).unwrap();
        let mut terminated = sample_record("s2");
        terminated.status = SessionStatus::UserTerminated;
        store.create(terminated).unwrap();

        let active = store.find_by_status(SessionStatus::Active).unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].session_id, "s1");
        assert_eq!(store.count_by_status(SessionStatus::Active).unwrap(), 1);
    }
}
