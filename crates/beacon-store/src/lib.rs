//! Durable storage for the tracking pipeline: the pending-event queue the
//! emitter drains and the per-namespace session record, both on one SQLite
//! database, plus in-memory twins for tests and no-persistence configs.

mod database;
mod error;
mod events;
mod memory;
mod row_helpers;
mod schema;
mod sessions;

pub use database::Database;
pub use error::StoreError;
pub use events::{EventStore, SqliteEventStore, StoredEvent};
pub use memory::{MemoryEventStore, MemorySessionStore};
pub use sessions::{SessionStore, SqliteSessionStore};
