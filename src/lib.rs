//! beacon: a client-side event-tracking SDK.
//!
//! Applications hand the [`Tracker`] discrete events; it enriches them with
//! derived context (session, screen, lifecycle, deep link) through a
//! registry of state machines, queues the finished payloads durably, and a
//! background emitter delivers them in batches with per-event retry
//! semantics. Tracking is fire-and-forget from any thread; delivery is
//! at-least-once.
//!
//! ```no_run
//! use beacon::{Event, Tracker, TrackerConfig};
//!
//! # async fn run() -> Result<(), beacon::StoreError> {
//! let config = TrackerConfig::new("shop", "shop-app")
//!     .with_collector("https://collector.example.com");
//! let tracker = Tracker::open(
//!     config,
//!     "/var/lib/shop/tracker.db".as_ref(),
//!     tokio::runtime::Handle::current(),
//! )?;
//!
//! tracker.track(Event::screen_view("home", "screen-1"));
//! tracker.track(Event::structured("checkout", "click", Some("buy".into()), None, None));
//! # Ok(())
//! # }
//! ```

mod config;
mod tracker;

pub use config::{Platform, TrackerConfig};
pub use tracker::{TrackedEvent, Tracker, TRACKER_VERSION};

pub use beacon_core::{protocol, Entity, Event, EventId, EventKind, Payload, SessionRecord};
pub use beacon_emitter::{
    BatchPolicy, EmitError, Emitter, EmitterConfig, HttpTransport, Method, MockTransport,
    Request, RequestCallback, RequestResult, Transport,
};
pub use beacon_state::{
    CapturedEvent, DeepLinkMachine, LifecycleMachine, ScreenMachine, SessionConfig,
    SessionMachine, SessionPhase, SessionTracker, State, StateMachine, StateManager,
    StateSnapshot, Transition,
};
pub use beacon_store::{
    Database, EventStore, MemoryEventStore, MemorySessionStore, SessionStore, SqliteEventStore,
    SqliteSessionStore, StoreError, StoredEvent,
};
pub use beacon_telemetry::{init_logging, LoggingConfig, MetricsSnapshot, PipelineMetrics};
