//! sesctl-core - Core library for the session control service
//!
//! This crate provides the session lifecycle domain shared by the server:
//!
//! - **clock**: fixed-zone time source and canonical timestamp codec
//! - **session**: session record, status, and snapshot types
//! - **store**: storage contract with in-memory and SQLite backends
//! - **engine**: lifecycle state machine and inactivity sweep
//! - **query**: read-only projections with computed durations

pub mod clock;
pub mod engine;
pub mod error;
pub mod query;
pub mod session;
pub mod store;

// Re-export commonly used types
pub use clock::{DurationParts, Instant, SessionClock};
pub use engine::{ExpiryPolicy, LoginInput, SessionEngine, SweepOutcome, TouchInput};
pub use error::{Error, Result};
pub use query::SessionQueries;
pub use session::{NetworkEndpoint, SessionRecord, SessionSnapshot, SessionStatus};
pub use store::{MemoryStore, SessionStore, SqliteStore};
