//! The state-derivation engine: a registry of pluggable state machines that
//! fold the event stream into session, screen, lifecycle and deep-link state,
//! and decorate outgoing events with derived entities and payload fields.

mod deep_link;
mod lifecycle;
mod machine;
mod manager;
mod screen;
mod session;

pub use deep_link::{DeepLinkMachine, DeepLinkState, DEEP_LINK_MACHINE_ID};
pub use lifecycle::{LifecycleMachine, LifecycleState, LIFECYCLE_MACHINE_ID};
pub use machine::{CapturedEvent, State, StateMachine, Transition, WILDCARD_SCHEMA};
pub use manager::{StateManager, StateSnapshot};
pub use screen::{ScreenMachine, ScreenState, SCREEN_MACHINE_ID};
pub use session::{
    SessionConfig, SessionMachine, SessionPhase, SessionState, SessionTracker, SESSION_MACHINE_ID,
};
