use std::any::Any;
use std::collections::HashMap;

use serde_json::json;

use beacon_core::{protocol, Entity, EventId};

use crate::machine::{CapturedEvent, State, StateMachine, Transition};

/// Registry identifier of the deep-link machine.
pub const DEEP_LINK_MACHINE_ID: &str = "deep_link";

/// A received deep link waiting for the screen view that consumes it.
/// `consumed_by` records the screen view that claimed it; only that event
/// gets the entity and payload fields, so the link is attached exactly once.
#[derive(Clone, Debug, PartialEq)]
pub struct DeepLinkState {
    pub url: String,
    pub referrer: Option<String>,
    pub consumed_by: Option<EventId>,
}

impl DeepLinkState {
    pub fn to_entity(&self) -> Entity {
        let mut data = json!({ "url": self.url });
        if let Some(referrer) = &self.referrer {
            data["referrer"] = json!(referrer);
        }
        Entity::new(protocol::SCHEMA_DEEP_LINK, data)
    }
}

/// Arms on a deep-link-received event; the next screen view consumes the
/// link as an entity plus url/referrer payload fields.
#[derive(Default)]
pub struct DeepLinkMachine;

impl DeepLinkMachine {
    pub fn new() -> Self {
        Self
    }
}

impl StateMachine for DeepLinkMachine {
    fn subscribed_schemas_for_transitions(&self) -> Vec<String> {
        vec![
            protocol::SCHEMA_DEEP_LINK_RECEIVED.to_string(),
            protocol::SCHEMA_SCREEN_VIEW.to_string(),
        ]
    }

    fn subscribed_schemas_for_entities(&self) -> Vec<String> {
        vec![protocol::SCHEMA_SCREEN_VIEW.to_string()]
    }

    fn subscribed_schemas_for_payload(&self) -> Vec<String> {
        vec![protocol::SCHEMA_SCREEN_VIEW.to_string()]
    }

    fn transition(&self, event: &CapturedEvent<'_>, state: Option<&State>) -> Transition {
        let schema = event.schema_key();
        if schema == protocol::SCHEMA_DEEP_LINK_RECEIVED {
            let url = event
                .event
                .property_str(protocol::DEEP_LINK_URL)
                .unwrap_or_default()
                .to_string();
            let referrer = event
                .event
                .property_str(protocol::DEEP_LINK_REFERRER)
                .map(str::to_string);
            return Transition::Next(State::DeepLink(DeepLinkState {
                url,
                referrer,
                consumed_by: None,
            }));
        }

        // Screen view: claim a still-armed link for this event.
        match state {
            Some(State::DeepLink(link)) if link.consumed_by.is_none() => {
                Transition::Next(State::DeepLink(DeepLinkState {
                    consumed_by: Some(event.id.clone()),
                    ..link.clone()
                }))
            }
            _ => Transition::Unchanged,
        }
    }

    fn entities(&self, event: &CapturedEvent<'_>, state: Option<&State>) -> Option<Vec<Entity>> {
        match state {
            Some(State::DeepLink(link)) if link.consumed_by.as_ref() == Some(event.id) => {
                Some(vec![link.to_entity()])
            }
            _ => None,
        }
    }

    fn payload_values(
        &self,
        event: &CapturedEvent<'_>,
        state: Option<&State>,
    ) -> Option<HashMap<String, String>> {
        match state {
            Some(State::DeepLink(link)) if link.consumed_by.as_ref() == Some(event.id) => {
                let mut values = HashMap::new();
                values.insert(protocol::DEEP_LINK_URL.to_string(), link.url.clone());
                if let Some(referrer) = &link.referrer {
                    values.insert(protocol::DEEP_LINK_REFERRER.to_string(), referrer.clone());
                }
                Some(values)
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
    use beacon_core::Event;

    fn captured<'a>(id: &'a EventId, event: &'a Event) -> CapturedEvent<'a> {
        CapturedEvent::new(id, 0, event)
    }

    #[test]
    fn deep_link_arms_state() {
        let machine = DeepLinkMachine::new();
        let id = EventId::new();
        let event = Event::deep_link_received("https://example.com/p", Some("ref".into()));
        let Transition::Next(State::DeepLink(link)) =
            machine.transition(&captured(&id, &event), None)
        else {
            panic!("expected deep-link state");
        };
        assert_eq!(link.url, "https://example.com/p");
        assert!(link.consumed_by.is_none());
    }

    #[test]
    fn first_screen_view_consumes_link_once() {
        let machine = DeepLinkMachine::new();

        let received_id = EventId::new();
        let received = Event::deep_link_received("https://example.com/p", None);
        let Transition::Next(armed) = machine.transition(&captured(&received_id, &received), None)
        else {
            panic!("expected transition");
        };

        // First screen view claims the link
        let sv1_id = EventId::new();
        let sv1 = Event::screen_view("home", "s1");
        let Transition::Next(claimed) =
            machine.transition(&captured(&sv1_id, &sv1), Some(&armed))
        else {
            panic!("expected transition");
        };
        let entities = machine
            .entities(&captured(&sv1_id, &sv1), Some(&claimed))
            .unwrap();
        assert_eq!(entities[0].schema, protocol::SCHEMA_DEEP_LINK);
        let values = machine
            .payload_values(&captured(&sv1_id, &sv1), Some(&claimed))
            .unwrap();
        assert_eq!(
            values.get(protocol::DEEP_LINK_URL).map(String::as_str),
            Some("https://example.com/p")
        );

        // Second screen view gets nothing
        let sv2_id = EventId::new();
        let sv2 = Event::screen_view("detail", "s2");
        assert_eq!(
            machine.transition(&captured(&sv2_id, &sv2), Some(&claimed)),
            Transition::Unchanged
        );
        assert!(machine
            .entities(&captured(&sv2_id, &sv2), Some(&claimed))
            .is_none());
        assert!(machine
            .payload_values(&captured(&sv2_id, &sv2), Some(&claimed))
            .is_none());
    }

    #[test]
    fn screen_view_without_armed_link_is_unchanged() {
        let machine = DeepLinkMachine::new();
        let id = EventId::new();
        let event = Event::screen_view("home", "s1");
        assert_eq!(
            machine.transition(&captured(&id, &event), None),
            Transition::Unchanged
        );
    }

    #[test]
    fn new_deep_link_rearms_after_consumption() {
        let machine = DeepLinkMachine::new();

        let consumed = State::DeepLink(DeepLinkState {
            url: "https://example.com/old".into(),
            referrer: None,
            consumed_by: Some(EventId::new()),
        });

        let id = EventId::new();
        let event = Event::deep_link_received("https://example.com/new", None);
        let Transition::Next(State::DeepLink(link)) =
            machine.transition(&captured(&id, &event), Some(&consumed))
        else {
            panic!("expected deep-link state");
        };
        assert_eq!(link.url, "https://example.com/new");
        assert!(link.consumed_by.is_none());
    }

    #[test]
    fn entity_omits_missing_referrer() {
        let link = DeepLinkState {
            url: "https://example.com".into(),
            referrer: None,
            consumed_by: None,
        };
        assert!(link.to_entity().data.get("referrer").is_none());
    }
}
