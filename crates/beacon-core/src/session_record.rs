use serde::{Deserialize, Serialize};

use crate::ids::{EventId, SessionId};
use crate::protocol;

/// The durable per-namespace session record.
///
/// Persisted as one row per namespace; a tracker constructed with the same
/// namespace after a process restart loads the prior record, so the session
/// index and previous-id chain survive restarts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: SessionId,
    pub previous_session_id: Option<SessionId>,
    pub user_id: String,
    /// Monotonically increasing; bumps by exactly 1 per rollover.
    pub session_index: u32,
    pub first_event_id: EventId,
    /// Capture timestamp of the session's first event (ms since epoch).
    pub first_event_timestamp: i64,
    /// Events resolved against this session so far.
    pub event_count: u32,
    /// Last `resolve` wall-clock time (ms since epoch). Persisted so timeout
    /// evaluation works across restarts; never sent on the wire.
    #[serde(default)]
    pub last_access_ms: i64,
}

impl SessionRecord {
    /// Start the first session of a namespace.
    pub fn first(user_id: impl Into<String>, event_id: EventId, event_timestamp: i64) -> Self {
        Self {
            session_id: SessionId::new(),
            previous_session_id: None,
            user_id: user_id.into(),
            session_index: 1,
            first_event_id: event_id,
            first_event_timestamp: event_timestamp,
            event_count: 1,
            last_access_ms: event_timestamp,
        }
    }

    /// Roll over into a new session triggered by `event_id`.
    pub fn rolled_over(&self, event_id: EventId, event_timestamp: i64) -> Self {
        Self {
            session_id: SessionId::new(),
            previous_session_id: Some(self.session_id.clone()),
            user_id: self.user_id.clone(),
            session_index: self.session_index + 1,
            first_event_id: event_id,
            first_event_timestamp: event_timestamp,
            event_count: 1,
            last_access_ms: event_timestamp,
        }
    }

    /// View with the user id replaced by the anonymous sentinel and the
    /// previous-session link dropped.
    pub fn anonymized(&self) -> Self {
        Self {
            previous_session_id: None,
            user_id: protocol::ANONYMOUS_USER_ID.to_string(),
            ..self.clone()
        }
    }
}
