//! Session storage backends.
//!
//! The lifecycle engine depends only on the [`SessionStore`] contract and
//! works unmodified against either implementation:
//!
//! - [`MemoryStore`]: volatile, process-local map
//! - [`SqliteStore`]: durable SQLite collection

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::clock::Instant;
use crate::error::Result;
use crate::session::{SessionRecord, SessionStatus};

/// Mutator applied to a record inside the store's critical section.
pub type RecordMutator<'a> = &'a mut dyn FnMut(&mut SessionRecord) -> Result<()>;

/// Storage contract for session records.
///
/// Read-modify-write sequences go through [`SessionStore::update_with`] so
/// each backend can make them atomic on its own terms: the memory store holds
/// its map lock for the whole mutation, the SQLite store wraps it in an
/// immediate transaction.
pub trait SessionStore: Send + Sync {
    /// Persist a new record. Fails with `SessionExists` if the id collides.
    fn create(&self, record: SessionRecord) -> Result<()>;

    /// Look up one record. Absence is `Ok(None)`, not an error.
    fn find_by_id(&self, session_id: &str) -> Result<Option<SessionRecord>>;

    /// Atomically mutate the record with the given id.
    ///
    /// Returns the updated record, or `Ok(None)` if no record exists. If the
    /// mutator fails, nothing is written and its error is propagated.
    fn update_with(
        &self,
        session_id: &str,
        apply: RecordMutator<'_>,
    ) -> Result<Option<SessionRecord>>;

    /// Remove one record. Returns whether a record was removed.
    fn delete(&self, session_id: &str) -> Result<bool>;

    /// Remove a record only if it is still `Active` and has not been touched
    /// after `cutoff`. Used by the sweep under the hard-delete policy; the
    /// condition runs inside the backend so a concurrent refresh wins.
    fn delete_if_idle(&self, session_id: &str, cutoff: Instant) -> Result<bool>;

    /// Flip a record to `Expired` under the same condition as
    /// [`SessionStore::delete_if_idle`]. Used under the mark-expired policy.
    fn mark_expired_if_idle(&self, session_id: &str, cutoff: Instant) -> Result<bool>;

    /// Remove every record, returning how many were removed.
    fn delete_all(&self) -> Result<usize>;

    /// All records, in unspecified order. Records with unreadable timestamps
    /// are logged and skipped, never failing the whole listing.
    fn find_all(&self) -> Result<Vec<SessionRecord>>;

    /// All records with the given status.
    fn find_by_status(&self, status: SessionStatus) -> Result<Vec<SessionRecord>>;

    /// Count records with the given status.
    fn count_by_status(&self, status: SessionStatus) -> Result<usize>;

    /// Check backend connectivity.
    fn ping(&self) -> Result<()>;
}
