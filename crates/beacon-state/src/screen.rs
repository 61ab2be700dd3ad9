use std::any::Any;
use std::collections::HashMap;

use serde_json::json;

use beacon_core::{protocol, Entity};

use crate::machine::{CapturedEvent, State, StateMachine, Transition, WILDCARD_SCHEMA};

/// Registry identifier of the screen machine.
pub const SCREEN_MACHINE_ID: &str = "screen";

/// The screen currently on display, with a one-step history so screen-view
/// payloads can reference where the user came from.
#[derive(Clone, Debug, PartialEq)]
pub struct ScreenState {
    pub name: String,
    pub id: String,
    pub previous_name: Option<String>,
    pub previous_id: Option<String>,
}

impl ScreenState {
    pub fn to_entity(&self) -> Entity {
        Entity::new(
            protocol::SCHEMA_SCREEN,
            json!({ "name": self.name, "id": self.id }),
        )
    }
}

/// Folds screen-view events into the current-screen state. Every event gets
/// a screen entity; screen-view payloads gain previous-screen fields.
#[derive(Default)]
pub struct ScreenMachine;

impl ScreenMachine {
    pub fn new() -> Self {
        Self
    }
}

impl StateMachine for ScreenMachine {
    fn subscribed_schemas_for_transitions(&self) -> Vec<String> {
        vec![protocol::SCHEMA_SCREEN_VIEW.to_string()]
    }

    fn subscribed_schemas_for_entities(&self) -> Vec<String> {
        vec![WILDCARD_SCHEMA.to_string()]
    }

    fn subscribed_schemas_for_payload(&self) -> Vec<String> {
        vec![protocol::SCHEMA_SCREEN_VIEW.to_string()]
    }

    fn transition(&self, event: &CapturedEvent<'_>, state: Option<&State>) -> Transition {
        let name = event.event.property_str(protocol::SV_NAME).unwrap_or_default();
        let id = event.event.property_str(protocol::SV_ID).unwrap_or_default();
        let (previous_name, previous_id) = match state {
            Some(State::Screen(previous)) => {
                (Some(previous.name.clone()), Some(previous.id.clone()))
            }
            _ => (None, None),
        };
        Transition::Next(State::Screen(ScreenState {
            name: name.to_string(),
            id: id.to_string(),
            previous_name,
            previous_id,
        }))
    }

    fn entities(&self, _event: &CapturedEvent<'_>, state: Option<&State>) -> Option<Vec<Entity>> {
        match state {
            Some(State::Screen(screen)) => Some(vec![screen.to_entity()]),
            _ => None,
        }
    }

    fn payload_values(
        &self,
        _event: &CapturedEvent<'_>,
        state: Option<&State>,
    ) -> Option<HashMap<String, String>> {
        match state {
            Some(State::Screen(screen)) => {
                let mut values = HashMap::new();
                if let Some(previous_name) = &screen.previous_name {
                    values.insert(protocol::SV_PREVIOUS_NAME.to_string(), previous_name.clone());
                }
                if let Some(previous_id) = &screen.previous_id {
                    values.insert(protocol::SV_PREVIOUS_ID.to_string(), previous_id.clone());
                }
                if values.is_empty() {
                    None
                } else {
                    Some(values)
                }
            }
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
    fn first_screen_view_has_no_previous() {
        let machine = ScreenMachine::new();
        let id = EventId::new();
        let event = Event::screen_view("home", "s1");
        let next = machine.transition(&captured(&id, &event), None);

        let Transition::Next(State::Screen(screen)) = next else {
            panic!("expected screen state");
        };
        assert_eq!(screen.name, "home");
        assert!(screen.previous_name.is_none());
    }

    #[test]
    fn second_screen_view_carries_previous() {
        let machine = ScreenMachine::new();
        let id = EventId::new();
        let first = Event::screen_view("home", "s1");
        let Transition::Next(state) = machine.transition(&captured(&id, &first), None) else {
            panic!("expected transition");
        };

        let second = Event::screen_view("detail", "s2");
        let Transition::Next(State::Screen(screen)) =
            machine.transition(&captured(&id, &second), Some(&state))
        else {
            panic!("expected screen state");
        };
        assert_eq!(screen.name, "detail");
        assert_eq!(screen.previous_name.as_deref(), Some("home"));
        assert_eq!(screen.previous_id.as_deref(), Some("s1"));

        let values = machine
            .payload_values(&captured(&id, &second), Some(&State::Screen(screen)))
            .unwrap();
        assert_eq!(values.get(protocol::SV_PREVIOUS_NAME).map(String::as_str), Some("home"));
        assert_eq!(values.get(protocol::SV_PREVIOUS_ID).map(String::as_str), Some("s1"));
    }

    #[test]
    fn entity_reflects_current_screen() {
        let state = State::Screen(ScreenState {
            name: "home".into(),
            id: "s1".into(),
            previous_name: None,
            previous_id: None,
        });
        let machine = ScreenMachine::new();
        let id = EventId::new();
        let event = Event::structured("c", "a", None, None, None);
        let entities = machine.entities(&captured(&id, &event), Some(&state)).unwrap();
        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].schema, protocol::SCHEMA_SCREEN);
        assert_eq!(entities[0].data["name"], "home");
    }

    #[test]
    fn no_entity_before_first_screen_view() {
        let machine = ScreenMachine::new();
        let id = EventId::new();
        let event = Event::structured("c", "a", None, None, None);
        assert!(machine.entities(&captured(&id, &event), None).is_none());
    }
}
