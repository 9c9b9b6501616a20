//! Durable SQLite session store.
//!
//! Thread-safe via an internal `Mutex<Connection>`; read-modify-write
//! sequences additionally run inside an immediate transaction so the
//! conditional update is atomic at the backend, keyed by `session_id`.
//!
//! Timestamps are stored in the canonical text form and validated on every
//! read. A row that fails to decode is reported as corrupt on point lookup
//! and logged-and-skipped on bulk listing.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tracing::warn;

use crate::clock::{Instant, SessionClock};
use crate::error::{Error, Result};
use crate::session::{NetworkEndpoint, SessionRecord, SessionStatus};
use crate::store::{RecordMutator, SessionStore};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS session (
    session_id    TEXT PRIMARY KEY,
    email         TEXT NOT NULL,
    nickname      TEXT NOT NULL,
    client_ip     TEXT NOT NULL,
    client_mac    TEXT NOT NULL,
    server_ip     TEXT NOT NULL,
    server_mac    TEXT NOT NULL,
    status        TEXT NOT NULL,
    created_at    TEXT NOT NULL,
    last_accessed TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_session_status ON session(status);
";

const COLUMNS: &str = "session_id, email, nickname, client_ip, client_mac, \
                       server_ip, server_mac, status, created_at, last_accessed";

/// Raw row as stored, before timestamp/status validation.
struct RawRow {
    session_id: String,
    email: String,
    nickname: String,
    client_ip: String,
    client_mac: String,
    server_ip: String,
    server_mac: String,
    status: String,
    created_at: String,
    last_accessed: String,
}

/// SQLite-backed session store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    clock: SessionClock,
}

impl SqliteStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock: SessionClock::new(),
        })
    }

    /// Open an in-memory database (tests and throwaway deployments).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock: SessionClock::new(),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::LockPoisoned)
    }

    fn map_raw(row: &rusqlite::Row) -> rusqlite::Result<RawRow> {
        Ok(RawRow {
            session_id: row.get(0)?,
            email: row.get(1)?,
            nickname: row.get(2)?,
            client_ip: row.get(3)?,
            client_mac: row.get(4)?,
            server_ip: row.get(5)?,
            server_mac: row.get(6)?,
            status: row.get(7)?,
            created_at: row.get(8)?,
            last_accessed: row.get(9)?,
        })
    }

    /// Validate a stored row into a record. Any undecodable field makes the
    /// whole record corrupt; durations must never be computed from it.
    fn decode(&self, raw: RawRow) -> Result<SessionRecord> {
        let status =
            SessionStatus::parse(&raw.status).ok_or_else(|| Error::CorruptStatus {
                session_id: raw.session_id.clone(),
                value: raw.status.clone(),
            })?;
        let created_at = self.parse_stored(&raw.session_id, &raw.created_at)?;
        let last_accessed = self.parse_stored(&raw.session_id, &raw.last_accessed)?;
        Ok(SessionRecord {
            session_id: raw.session_id,
            email: raw.email,
            nickname: raw.nickname,
            client: NetworkEndpoint {
                ip: raw.client_ip,
                mac_address: raw.client_mac,
            },
            server: NetworkEndpoint {
                ip: raw.server_ip,
                mac_address: raw.server_mac,
            },
            status,
            created_at,
            last_accessed,
        })
    }

    fn parse_stored(&self, session_id: &str, value: &str) -> Result<Instant> {
        self.clock
            .parse(value)
            .map_err(|_| Error::CorruptTimestamp {
                session_id: session_id.to_string(),
                value: value.to_string(),
            })
    }

    fn decode_all(&self, raws: Vec<RawRow>) -> Vec<SessionRecord> {
        let mut records = Vec::with_capacity(raws.len());
        for raw in raws {
            let id = raw.session_id.clone();
            match self.decode(raw) {
                Ok(record) => records.push(record),
                Err(e) => warn!(session_id = %id, error = %e, "Skipping corrupt session row"),
            }
        }
        records
    }
}

impl SessionStore for SqliteStore {
    fn create(&self, record: SessionRecord) -> Result<()> {
        let conn = self.lock()?;
        let result = conn.execute(
            "INSERT INTO session (session_id, email, nickname, client_ip, client_mac,
                                  server_ip, server_mac, status, created_at, last_accessed)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.session_id,
                record.email,
                record.nickname,
                record.client.ip,
                record.client.mac_address,
                record.server.ip,
                record.server.mac_address,
                record.status.as_str(),
                self.clock.format(record.created_at),
                self.clock.format(record.last_accessed),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::SessionExists(record.session_id))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn find_by_id(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM session WHERE session_id = ?1"),
                params![session_id],
                Self::map_raw,
            )
            .optional()?;
        drop(conn);

        raw.map(|r| self.decode(r)).transpose()
    }

    fn update_with(
        &self,
        session_id: &str,
        apply: RecordMutator<'_>,
    ) -> Result<Option<SessionRecord>> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let raw = tx
            .query_row(
                &format!("SELECT {COLUMNS} FROM session WHERE session_id = ?1"),
                params![session_id],
                Self::map_raw,
            )
            .optional()?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        let mut record = self.decode(raw)?;
        apply(&mut record)?;

        // Write back every column the mutator may have touched so the
        // returned record always matches the stored row.
        tx.execute(
            "UPDATE session
             SET email = ?1, nickname = ?2, client_ip = ?3, client_mac = ?4,
                 server_ip = ?5, server_mac = ?6, status = ?7, created_at = ?8,
                 last_accessed = ?9
             WHERE session_id = ?10",
            params![
                record.email,
                record.nickname,
                record.client.ip,
                record.client.mac_address,
                record.server.ip,
                record.server.mac_address,
                record.status.as_str(),
                self.clock.format(record.created_at),
                self.clock.format(record.last_accessed),
                session_id,
            ],
        )?;
        tx.commit()?;

        Ok(Some(record))
    }

    fn delete(&self, session_id: &str) -> Result<bool> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM session WHERE session_id = ?1",
            params![session_id],
        )?;
        Ok(removed > 0)
    }

    fn delete_if_idle(&self, session_id: &str, cutoff: Instant) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // The canonical text form does not sort chronologically, so the idle
        // comparison happens on the parsed value inside the transaction.
        let stored: Option<(String, String)> = tx
            .query_row(
                "SELECT status, last_accessed FROM session WHERE session_id = ?1",
                params![session_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((status, last_accessed)) = stored else {
            return Ok(false);
        };
        if SessionStatus::parse(&status) != Some(SessionStatus::Active) {
            return Ok(false);
        }
        if self.parse_stored(session_id, &last_accessed)? > cutoff {
            return Ok(false);
        }

        tx.execute(
            "DELETE FROM session WHERE session_id = ?1",
            params![session_id],
        )?;
        tx.commit()?;
        Ok(true)
    }

    fn mark_expired_if_idle(&self, session_id: &str, cutoff: Instant) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let stored: Option<(String, String)> = tx
            .query_row(
                "SELECT status, last_accessed FROM session WHERE session_id = ?1",
                params![session_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((status, last_accessed)) = stored else {
            return Ok(false);
        };
        if SessionStatus::parse(&status) != Some(SessionStatus::Active) {
            return Ok(false);
        }
        if self.parse_stored(session_id, &last_accessed)? > cutoff {
            return Ok(false);
        }

        tx.execute(
            "UPDATE session SET status = ?1 WHERE session_id = ?2",
            params![SessionStatus::Expired.as_str(), session_id],
        )?;
        tx.commit()?;
        Ok(true)
    }

    fn delete_all(&self) -> Result<usize> {
        let conn = self.lock()?;
        let removed = conn.execute("DELETE FROM session", [])?;
        Ok(removed)
    }

    fn find_all(&self) -> Result<Vec<SessionRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM session"))?;
        let raws = stmt
            .query_map([], Self::map_raw)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        drop(stmt);
        drop(conn);

        Ok(self.decode_all(raws))
    }

    fn find_by_status(&self, status: SessionStatus) -> Result<Vec<SessionRecord>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {COLUMNS} FROM session WHERE status = ?1"))?;
        let raws = stmt
            .query_map(params![status.as_str()], Self::map_raw)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        drop(stmt);
        drop(conn);

        Ok(self.decode_all(raws))
    }

    fn count_by_status(&self, status: SessionStatus) -> Result<usize> {
        let conn = self.lock()?;
        let count: usize = conn.query_row(
            "SELECT COUNT(*) FROM session WHERE status = ?1",
            params![status.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn ping(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch("SELECT 1")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SessionClock;

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
    fn test_open_creates_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        let store = SqliteStore::open(&path).unwrap();
        store.ping().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_create_find_roundtrip() {
        let store = SqliteStore::open_in_memory().unwrap();
        let record = sample_record("s1");
        store.create(record.clone()).unwrap();

        let found = store.find_by_id("s1").unwrap().unwrap();
        assert_eq!(found, record);
    }

    #[test]
    fn test_create_duplicate_rejected() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create(sample_record("s1")).unwrap();

        let err = store.create(sample_record("s1")).unwrap_err();
        assert!(matches!(err, Error::SessionExists(_)));
    }

    #[test]
    fn test_update_with_persists() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create(sample_record("s1")).unwrap();

        store
            .update_with("s1", &mut |r| {
                r.email = "b@x.com".to_string();
                r.status = SessionStatus::UserTerminated;
                Ok(())
            })
            .unwrap()
            .unwrap();

        let found = store.find_by_id("s1").unwrap().unwrap();
        assert_eq!(found.email, "b@x.com");
        assert_eq!(found.status, SessionStatus::UserTerminated);
    }

    #[test]
    fn test_update_with_persists_every_field() {
        let clock = SessionClock::new();
        let store = SqliteStore::open_in_memory().unwrap();
        store.create(sample_record("s1")).unwrap();

        let old = clock.parse("01-01-2020 00:00:00").unwrap();
        let returned = store
            .update_with("s1", &mut |r| {
                r.created_at = old;
                r.last_accessed = old;
                r.client.ip = "10.9.9.9".to_string();
                Ok(())
            })
            .unwrap()
            .unwrap();

        // The stored row must never lag behind the returned record.
        let stored = store.find_by_id("s1").unwrap().unwrap();
        assert_eq!(stored, returned);
        assert_eq!(stored.created_at, old);
        assert_eq!(stored.client.ip, "10.9.9.9");
    }

    #[test]
    fn test_update_with_missing_is_none() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.update_with("nope", &mut |_| Ok(())).unwrap().is_none());
    }

    #[test]
    fn test_corrupt_timestamp_on_point_lookup() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create(sample_record("s1")).unwrap();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "UPDATE session SET last_accessed = 'garbage' WHERE session_id = 's1'",
                [],
            )
            .unwrap();
        }

        let err = store.find_by_id("s1").unwrap_err();
        assert!(matches!(err, Error::CorruptTimestamp { .. }));
    }

    #[test]
    fn test_corrupt_row_skipped_in_listing() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create(sample_record("s1")).unwrap();
        store.create(sample_record("s2")).unwrap();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "UPDATE session SET created_at = 'garbage' WHERE session_id = 's2'",
                [],
            )
            .unwrap();
        }

        let all = store.find_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].session_id, "s1");
    }

    #[test]
    fn test_mark_expired_if_idle() {
        let clock = SessionClock::new();
        let store = SqliteStore::open_in_memory().unwrap();
        store.create(sample_record("s1")).unwrap();

        let past = clock.parse("01-01-2020 00:00:00").unwrap();
        assert!(!store.mark_expired_if_idle("s1", past).unwrap());

        let future = clock.parse("01-01-2099 00:00:00").unwrap();
        assert!(store.mark_expired_if_idle("s1", future).unwrap());
        assert_eq!(
            store.find_by_id("s1").unwrap().unwrap().status,
            SessionStatus::Expired
        );
        // Terminal now: a second pass changes nothing.
        assert!(!store.mark_expired_if_idle("s1", future).unwrap());
    }

    #[test]
    fn test_delete_all_counts() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create(sample_record("s1")).unwrap();
        store.create(sample_record("s2")).unwrap();
        assert_eq!(store.delete_all().unwrap(), 2);
        assert_eq!(store.find_all().unwrap().len(), 0);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.create(sample_record("s1")).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert!(store.find_by_id("s1").unwrap().is_some());
    }
}
