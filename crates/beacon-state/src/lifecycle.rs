use std::any::Any;

use serde_json::json;

use beacon_core::{protocol, Entity};

use crate::machine::{CapturedEvent, State, StateMachine, Transition, WILDCARD_SCHEMA};

/// Registry identifier of the lifecycle machine.
pub const LIFECYCLE_MACHINE_ID: &str = "lifecycle";

/// Whether the app is on screen, and the ordinal of the transition that put
/// it there.
#[derive(Clone, Debug, PartialEq)]
pub struct LifecycleState {
    pub is_visible: bool,
    pub index: i64,
}

impl LifecycleState {
    pub fn to_entity(&self) -> Entity {
        Entity::new(
            protocol::SCHEMA_LIFECYCLE,
            json!({ "isVisible": self.is_visible, "index": self.index }),
        )
    }
}

/// Folds foreground/background transition events into a visibility flag;
/// every event tracked while the state is known gets a lifecycle entity.
#[derive(Default)]
pub struct LifecycleMachine;

impl LifecycleMachine {
    pub fn new() -> Self {
        Self
    }
}

impl StateMachine for LifecycleMachine {
    fn subscribed_schemas_for_transitions(&self) -> Vec<String> {
        vec![
            protocol::SCHEMA_FOREGROUND.to_string(),
            protocol::SCHEMA_BACKGROUND.to_string(),
        ]
    }

    fn subscribed_schemas_for_entities(&self) -> Vec<String> {
        vec![WILDCARD_SCHEMA.to_string()]
    }

    fn subscribed_schemas_for_payload(&self) -> Vec<String> {
        Vec::new()
    }

    fn transition(&self, event: &CapturedEvent<'_>, _state: Option<&State>) -> Transition {
        let schema = event.schema_key();
        if schema == protocol::SCHEMA_FOREGROUND {
            let index = event
                .event
                .properties
                .get("foregroundIndex")
                .and_then(serde_json::Value::as_i64)
                .unwrap_or(0);
            Transition::Next(State::Lifecycle(LifecycleState {
                is_visible: true,
                index,
            }))
        } else if schema == protocol::SCHEMA_BACKGROUND {
            let index = event
                .event
                .properties
                .get("backgroundIndex")
                .and_then(serde_json::Value::as_i64)
                .unwrap_or(0);
            Transition::Next(State::Lifecycle(LifecycleState {
                is_visible: false,
                index,
            }))
        } else {
            Transition::Unchanged
        }
    }

    fn entities(&self, _event: &CapturedEvent<'_>, state: Option<&State>) -> Option<Vec<Entity>> {
        match state {
            Some(State::Lifecycle(lifecycle)) => Some(vec![lifecycle.to_entity()]),
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::{Event, EventId};

    fn captured<'a>(id: &'a EventId, event: &'a Event) -> CapturedEvent<'a> {
        CapturedEvent::new(id, 0, event)
    }

    #[test]
    fn foreground_sets_visible() {
        let machine = LifecycleMachine::new();
        let id = EventId::new();
        let event = Event::foreground(3);
        let Transition::Next(State::Lifecycle(state)) =
            machine.transition(&captured(&id, &event), None)
        else {
            panic!("expected lifecycle state");
        };
        assert!(state.is_visible);
        assert_eq!(state.index, 3);
    }

    #[test]
    fn background_clears_visible() {
        let machine = LifecycleMachine::new();
        let id = EventId::new();
        let event = Event::background(1);
        let Transition::Next(State::Lifecycle(state)) =
            machine.transition(&captured(&id, &event), None)
        else {
            panic!("expected lifecycle state");
        };
        assert!(!state.is_visible);
    }

    #[test]
    fn unrelated_event_leaves_state() {
        let machine = LifecycleMachine::new();
        let id = EventId::new();
        let event = Event::structured("c", "a", None, None, None);
        assert_eq!(
            machine.transition(&captured(&id, &event), None),
            Transition::Unchanged
        );
    }

    #[test]
    fn entity_carries_visibility() {
        let machine = LifecycleMachine::new();
        let id = EventId::new();
        let event = Event::structured("c", "a", None, None, None);
        let state = State::Lifecycle(LifecycleState {
            is_visible: true,
            index: 2,
        });
        let entities = machine.entities(&captured(&id, &event), Some(&state)).unwrap();
        assert_eq!(entities[0].schema, protocol::SCHEMA_LIFECYCLE);
        assert_eq!(entities[0].data["isVisible"], true);
        assert_eq!(entities[0].data["index"], 2);
    }

    #[test]
    fn no_entity_without_state() {
        let machine = LifecycleMachine::new();
        let id = EventId::new();
        let event = Event::structured("c", "a", None, None, None);
        assert!(machine.entities(&captured(&id, &event), None).is_none());
    }
}
