//! Core data model for the beacon event-tracking pipeline: branded ids,
//! events and context entities, wire payloads, and protocol constants.

pub mod event;
pub mod ids;
pub mod payload;
pub mod protocol;
pub mod session_record;

pub use event::{Entity, Event, EventKind};
pub use ids::{BatchId, EventId, SessionId};
pub use payload::Payload;
pub use session_record::SessionRecord;
