use std::any::Any;
use std::collections::HashMap;

use serde_json::Value;

use beacon_core::{Entity, Event, EventId};

use crate::deep_link::DeepLinkState;
use crate::lifecycle::LifecycleState;
use crate::screen::ScreenState;
use crate::session::SessionState;

/// Wildcard schema subscription: matches every event.
pub const WILDCARD_SCHEMA: &str = "*";

/// The event as a machine sees it: the caller's event plus the id and
/// capture timestamp assigned at track time.
#[derive(Clone, Copy, Debug)]
pub struct CapturedEvent<'a> {
    pub id: &'a EventId,
    /// Capture wall-clock timestamp (ms since epoch).
    pub timestamp: i64,
    pub event: &'a Event,
}

impl<'a> CapturedEvent<'a> {
    pub fn new(id: &'a EventId, timestamp: i64, event: &'a Event) -> Self {
        Self {
            id,
            timestamp,
            event,
        }
    }

    pub fn schema_key(&self) -> &str {
        self.event.schema_key()
    }
}

/// Per-machine derived state, one variant per known machine plus a free-form
/// variant for user-supplied machines. Owned exclusively by the producing
/// machine; everything else only reads it through snapshots.
#[derive(Clone, Debug, PartialEq)]
pub enum State {
    Session(SessionState),
    Screen(ScreenState),
    Lifecycle(LifecycleState),
    DeepLink(DeepLinkState),
    Custom(Value),
}

/// Outcome of a transition.
#[derive(Clone, Debug, PartialEq)]
pub enum Transition {
    /// Keep the previous state.
    Unchanged,
    /// Replace the machine's state.
    Next(State),
}

/// A pluggable transformer from the event stream to derived state.
///
/// Machines are pure functions of `(event, current state)`: no I/O, no
/// blocking. The one sanctioned exception is the session machine, which is
/// specified as a specialised timeout-driven machine backed by the durable
/// session store. A machine that panics is isolated by the manager: the
/// pipeline and the other machines continue, and the panicking machine's
/// state keeps its last-known-good value.
pub trait StateMachine: Send + Sync + 'static {
    /// Schemas whose events drive `transition`. `"*"` subscribes to all.
    fn subscribed_schemas_for_transitions(&self) -> Vec<String>;
    /// Schemas whose events receive entities from this machine.
    fn subscribed_schemas_for_entities(&self) -> Vec<String>;
    /// Schemas whose events receive payload additions from this machine.
    fn subscribed_schemas_for_payload(&self) -> Vec<String>;

    fn transition(&self, event: &CapturedEvent<'_>, state: Option<&State>) -> Transition;

    fn entities(&self, event: &CapturedEvent<'_>, state: Option<&State>) -> Option<Vec<Entity>> {
        let _ = (event, state);
        None
    }

    fn payload_values(
        &self,
        event: &CapturedEvent<'_>,
        state: Option<&State>,
    ) -> Option<HashMap<String, String>> {
        let _ = (event, state);
        None
    }

    /// Concrete-type identity, used to decide whether re-registering under an
    /// existing identifier preserves or resets accumulated state.
    fn as_any(&self) -> &dyn Any;
}
