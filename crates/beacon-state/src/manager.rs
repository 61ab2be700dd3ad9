use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::warn;

use beacon_core::{Entity, Payload};

use crate::machine::{CapturedEvent, State, StateMachine, Transition, WILDCARD_SCHEMA};

/// An immutable point-in-time copy of every machine's state, taken
/// synchronously at track time so concurrently tracked events each see a
/// consistent world.
#[derive(Clone, Debug, Default)]
pub struct StateSnapshot {
    states: HashMap<String, State>,
}

impl StateSnapshot {
    pub fn get(&self, machine_id: &str) -> Option<&State> {
        self.states.get(machine_id)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Registry of state machines and owner of their accumulated state.
///
/// Not internally synchronized: the tracker serializes all access inside its
/// track-time critical section, which is what gives snapshots their ordering
/// guarantee.
#[derive(Default)]
pub struct StateManager {
    machines: HashMap<String, Arc<dyn StateMachine>>,
    /// Registration order; aggregation results are concatenated in this order.
    order: Vec<String>,
    transition_subs: HashMap<String, Vec<String>>,
    entity_subs: HashMap<String, Vec<String>>,
    payload_subs: HashMap<String, Vec<String>>,
    states: HashMap<String, State>,
}

impl StateManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `machine` under `id`. Re-registering the same concrete type
    /// under an existing id is a no-op that preserves the accumulated state
    /// and the installed machine; a different type replaces the registration
    /// and resets its state.
    pub fn add_or_replace_state_machine(&mut self, machine: Arc<dyn StateMachine>, id: &str) {
        let same_type = self
            .machines
            .get(id)
            .is_some_and(|existing| existing.as_any().type_id() == machine.as_any().type_id());
        if same_type {
            return;
        }
        if self.machines.contains_key(id) {
            self.remove_state_machine(id);
        }

        for schema in machine.subscribed_schemas_for_transitions() {
            self.transition_subs.entry(schema).or_default().push(id.to_string());
        }
        for schema in machine.subscribed_schemas_for_entities() {
            self.entity_subs.entry(schema).or_default().push(id.to_string());
        }
        for schema in machine.subscribed_schemas_for_payload() {
            self.payload_subs.entry(schema).or_default().push(id.to_string());
        }
        self.machines.insert(id.to_string(), machine);
        self.order.push(id.to_string());
    }

    /// Deregister `id`, deleting its state and subscriptions. Returns whether
    /// anything was removed.
    pub fn remove_state_machine(&mut self, id: &str) -> bool {
        let removed = self.machines.remove(id).is_some();
        if removed {
            self.states.remove(id);
            self.order.retain(|existing| existing != id);
            for index in [
                &mut self.transition_subs,
                &mut self.entity_subs,
                &mut self.payload_subs,
            ] {
                for subscribers in index.values_mut() {
                    subscribers.retain(|existing| existing != id);
                }
                index.retain(|_, subscribers| !subscribers.is_empty());
            }
        }
        removed
    }

    pub fn is_registered(&self, id: &str) -> bool {
        self.machines.contains_key(id)
    }

    /// Run every subscribed machine's transition for `event` and return the
    /// full snapshot. Synchronous and ordered relative to the calling event;
    /// this is the correctness-critical step of the pipeline.
    pub fn state_for_event(&mut self, event: &CapturedEvent<'_>) -> StateSnapshot {
        for id in self.subscribers(&self.transition_subs, event.schema_key()) {
            let machine = Arc::clone(&self.machines[&id]);
            let previous = self.states.get(&id);
            match catch_unwind(AssertUnwindSafe(|| machine.transition(event, previous))) {
                Ok(Transition::Next(state)) => {
                    self.states.insert(id, state);
                }
                Ok(Transition::Unchanged) => {}
                Err(_) => {
                    // Keep the last-known-good state; the rest of the
                    // pipeline proceeds.
                    warn!(machine = %id, "state machine panicked during transition");
                }
            }
        }
        StateSnapshot {
            states: self.states.clone(),
        }
    }

    /// Entities contributed by every subscribed machine, in registration
    /// order, reading state from the event's snapshot.
    pub fn entities_for_event(
        &self,
        event: &CapturedEvent<'_>,
        snapshot: &StateSnapshot,
    ) -> Vec<Entity> {
        let mut entities = Vec::new();
        for id in self.subscribers(&self.entity_subs, event.schema_key()) {
            let machine = &self.machines[&id];
            let state = snapshot.get(&id);
            match catch_unwind(AssertUnwindSafe(|| machine.entities(event, state))) {
                Ok(Some(mut contributed)) => entities.append(&mut contributed),
                Ok(None) => {}
                Err(_) => warn!(machine = %id, "state machine panicked during entity generation"),
            }
        }
        entities
    }

    /// Merge every subscribed machine's payload additions into `payload`
    /// without overwriting existing keys. Collisions are a logged partial
    /// failure, never fatal; the dropped keys are returned.
    pub fn payload_additions_for_event(
        &self,
        event: &CapturedEvent<'_>,
        snapshot: &StateSnapshot,
        payload: &mut Payload,
    ) -> Vec<String> {
        let mut collisions = Vec::new();
        for id in self.subscribers(&self.payload_subs, event.schema_key()) {
            let machine = &self.machines[&id];
            let state = snapshot.get(&id);
            match catch_unwind(AssertUnwindSafe(|| machine.payload_values(event, state))) {
                Ok(Some(values)) => {
                    let dropped = payload.merge_missing(values);
                    if !dropped.is_empty() {
                        warn!(
                            machine = %id,
                            keys = ?dropped,
                            "payload additions collided with existing keys"
                        );
                        collisions.extend(dropped);
                    }
                }
                Ok(None) => {}
                Err(_) => warn!(machine = %id, "state machine panicked during payload augmentation"),
            }
        }
        collisions
    }

    /// Ids subscribed to `schema` (exactly or via the wildcard), in
    /// registration order.
    fn subscribers(&self, index: &HashMap<String, Vec<String>>, schema: &str) -> Vec<String> {
        let exact = index.get(schema);
        let wildcard = index.get(WILDCARD_SCHEMA);
        if exact.is_none() && wildcard.is_none() {
            return Vec::new();
        }
        self.order
            .iter()
            .filter(|id| {
                exact.is_some_and(|subs| subs.contains(*id))
                    || wildcard.is_some_and(|subs| subs.contains(*id))
            })
            .cloned()
            .collect()
    }
}
