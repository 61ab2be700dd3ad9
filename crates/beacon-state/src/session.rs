use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use tracing::{debug, warn};

use beacon_core::{protocol, Entity, EventId, SessionRecord};
use beacon_store::SessionStore;

use crate::machine::{CapturedEvent, State, StateMachine, Transition, WILDCARD_SCHEMA};

/// Registry identifier of the session machine.
pub const SESSION_MACHINE_ID: &str = "session";

/// Session timeouts and identity configuration.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub foreground_timeout: Duration,
    pub background_timeout: Duration,
    /// Owning user id stored in the session record.
    pub user_id: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            foreground_timeout: Duration::from_secs(30 * 60),
            background_timeout: Duration::from_secs(30 * 60),
            user_id: String::new(),
        }
    }
}

/// Where the session tracker currently is in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    /// No session has been started in this process and none was persisted.
    Uninitialized,
    /// Foreground/background accrual with timeout evaluation.
    Active,
    /// Timeout evaluation paused; `resolve` reuses the session unchanged.
    Suspended,
}

struct SessionInner {
    record: Option<SessionRecord>,
    is_background: bool,
    suspended: bool,
}

/// Timeout-driven session identity, persisted per namespace.
///
/// Constructing a tracker with a namespace that already has a persisted
/// record resumes it: the session index and previous-id chain survive
/// process restarts. Access is synchronized per instance; independent
/// namespaces never share a record and never contend.
pub struct SessionTracker {
    namespace: String,
    config: SessionConfig,
    store: Arc<dyn SessionStore>,
    inner: Mutex<SessionInner>,
}

impl SessionTracker {
    pub fn new(
        namespace: impl Into<String>,
        config: SessionConfig,
        store: Arc<dyn SessionStore>,
    ) -> Self {
        let namespace = namespace.into();
        let record = match store.load(&namespace) {
            Ok(record) => record,
            Err(e) => {
                warn!(namespace, error = %e, "failed to load persisted session record");
                None
            }
        };
        Self {
            namespace,
            config,
            store,
            inner: Mutex::new(SessionInner {
                record,
                is_background: false,
                suspended: false,
            }),
        }
    }

    /// Resolve the session for one event, creating, continuing or rolling
    /// over as the elapsed time dictates.
    ///
    /// With `anonymize` set, the returned record carries the anonymous user
    /// id sentinel and omits the previous-session link; the persisted record
    /// keeps the real identity so de-anonymizing later does not break the
    /// chain.
    pub fn resolve(
        &self,
        event_id: &EventId,
        event_timestamp: i64,
        anonymize: bool,
    ) -> SessionRecord {
        let now = Utc::now().timestamp_millis();
        let mut inner = self.inner.lock();

        let resolved = match inner.record.take() {
            None => {
                let record =
                    SessionRecord::first(self.config.user_id.clone(), event_id.clone(), event_timestamp);
                debug!(namespace = %self.namespace, session_id = %record.session_id, "session started");
                record
            }
            Some(mut record) if inner.suspended => {
                // Timeout evaluation is skipped while suspended.
                record.last_access_ms = now;
                record
            }
            Some(mut record) => {
                let timeout = if inner.is_background {
                    self.config.background_timeout
                } else {
                    self.config.foreground_timeout
                };
                let elapsed = now.saturating_sub(record.last_access_ms);
                if elapsed >= timeout.as_millis() as i64 {
                    let next = record.rolled_over(event_id.clone(), event_timestamp);
                    debug!(
                        namespace = %self.namespace,
                        session_id = %next.session_id,
                        session_index = next.session_index,
                        "session rolled over"
                    );
                    next
                } else {
                    record.event_count += 1;
                    record.last_access_ms = now;
                    record
                }
            }
        };

        inner.record = Some(resolved.clone());
        if let Err(e) = self.store.save(&self.namespace, &resolved) {
            // Best-effort persistence; the in-memory session stays coherent.
            warn!(namespace = %self.namespace, error = %e, "failed to persist session record");
        }

        if anonymize {
            resolved.anonymized()
        } else {
            resolved
        }
    }

    /// Lifecycle notification: the app moved to the background or back.
    /// Toggling alone never rolls the session; only a later `resolve` past
    /// the applicable timeout does.
    pub fn set_background(&self, is_background: bool) {
        self.inner.lock().is_background = is_background;
    }

    /// Pause timeout evaluation (e.g. the app is fully stopped).
    pub fn suspend(&self) {
        self.inner.lock().suspended = true;
    }

    /// Re-enable timeout evaluation from the next `resolve` on.
    pub fn resume(&self) {
        self.inner.lock().suspended = false;
    }

    pub fn phase(&self) -> SessionPhase {
        let inner = self.inner.lock();
        if inner.suspended {
            SessionPhase::Suspended
        } else if inner.record.is_none() {
            SessionPhase::Uninitialized
        } else {
            SessionPhase::Active
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }
}

/// The session record as machine state.
#[derive(Clone, Debug, PartialEq)]
pub struct SessionState {
    pub record: SessionRecord,
}

impl SessionState {
    /// Client-session context entity.
    pub fn to_entity(&self) -> Entity {
        let record = &self.record;
        let mut data = json!({
            "sessionId": record.session_id.as_str(),
            "userId": record.user_id,
            "sessionIndex": record.session_index,
            "firstEventId": record.first_event_id.as_str(),
            "firstEventTimestamp": record.first_event_timestamp,
            "eventIndex": record.event_count,
        });
        if let Some(previous) = &record.previous_session_id {
            data["previousSessionId"] = json!(previous.as_str());
        }
        Entity::new(protocol::SCHEMA_CLIENT_SESSION, data)
    }
}

/// Adapts the session tracker into the state-machine contract: every event
/// resolves the session and carries the client-session entity. This is the
/// specialised machine the contract's no-I/O rule carves out: `transition`
/// consults the durable session store through the tracker.
pub struct SessionMachine {
    tracker: Arc<SessionTracker>,
    anonymize: bool,
}

impl SessionMachine {
    pub fn new(tracker: Arc<SessionTracker>, anonymize: bool) -> Self {
        Self { tracker, anonymize }
    }
}

impl StateMachine for SessionMachine {
    fn subscribed_schemas_for_transitions(&self) -> Vec<String> {
        vec![WILDCARD_SCHEMA.to_string()]
    }

    fn subscribed_schemas_for_entities(&self) -> Vec<String> {
        vec![WILDCARD_SCHEMA.to_string()]
    }

    fn subscribed_schemas_for_payload(&self) -> Vec<String> {
        Vec::new()
    }

    fn transition(&self, event: &CapturedEvent<'_>, _state: Option<&State>) -> Transition {
        let record = self.tracker.resolve(event.id, event.timestamp, self.anonymize);
        Transition::Next(State::Session(SessionState { record }))
    }

    fn entities(&self, _event: &CapturedEvent<'_>, state: Option<&State>) -> Option<Vec<Entity>> {
        match state {
            Some(State::Session(session)) => Some(vec![session.to_entity()]),
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
