use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use beacon_core::{protocol, Entity, Event, EventId, EventKind, Payload};
use beacon_emitter::{Emitter, EmitError, HttpTransport, RequestCallback, Transport};
use beacon_state::{
    CapturedEvent, DeepLinkMachine, LifecycleMachine, ScreenMachine, SessionMachine,
    SessionTracker, StateMachine, StateManager, StateSnapshot, DEEP_LINK_MACHINE_ID,
    LIFECYCLE_MACHINE_ID, SCREEN_MACHINE_ID, SESSION_MACHINE_ID,
};
use beacon_store::{
    Database, EventStore, SessionStore, SqliteEventStore, SqliteSessionStore, StoreError,
};
use beacon_telemetry::PipelineMetrics;

use crate::config::TrackerConfig;

/// Version string stamped into every payload.
pub const TRACKER_VERSION: &str = concat!("beacon-rs-", env!("CARGO_PKG_VERSION"));

/// One event after track-time capture: the caller's event plus the generated
/// id, the capture timestamp, the state snapshot and the union of entities
/// from every contributing source. Immutable once handed to the emitter.
#[derive(Clone, Debug)]
pub struct TrackedEvent {
    pub id: EventId,
    /// Capture wall-clock timestamp (ms since epoch).
    pub timestamp: i64,
    pub event: Event,
    pub entities: Vec<Entity>,
    pub snapshot: StateSnapshot,
    /// Flat payload fields contributed by the state machines.
    additions: Payload,
}

/// The tracking pipeline for one namespace: composes state derivation with
/// durable delivery. `track` is fire-and-forget and callable from any
/// thread.
pub struct Tracker {
    config: Arc<TrackerConfig>,
    state: Mutex<StateManager>,
    session: Option<Arc<SessionTracker>>,
    emitter: Arc<Emitter>,
    metrics: Arc<PipelineMetrics>,
    handle: tokio::runtime::Handle,
    collecting: AtomicBool,
}

impl Tracker {
    /// Compose a tracker from explicit collaborators. The runtime handle is
    /// the tracker's scheduler: payload assembly and delivery run on it so
    /// callers never block on I/O.
    pub fn new(
        config: TrackerConfig,
        event_store: Arc<dyn EventStore>,
        session_store: Arc<dyn SessionStore>,
        transport: Arc<dyn Transport>,
        callback: Option<Arc<dyn RequestCallback>>,
        handle: tokio::runtime::Handle,
    ) -> Self {
        let metrics = Arc::new(PipelineMetrics::new());
        let emitter = Arc::new(Emitter::new(
            event_store,
            transport,
            config.emitter.clone(),
            Arc::clone(&metrics),
            callback,
            &handle,
        ));

        let mut manager = StateManager::new();
        let session = if config.session_context {
            let tracker = Arc::new(SessionTracker::new(
                config.namespace.clone(),
                config.session.clone(),
                session_store,
            ));
            manager.add_or_replace_state_machine(
                Arc::new(SessionMachine::new(Arc::clone(&tracker), config.anonymize_user)),
                SESSION_MACHINE_ID,
            );
            Some(tracker)
        } else {
            None
        };
        if config.screen_context {
            manager.add_or_replace_state_machine(Arc::new(ScreenMachine::new()), SCREEN_MACHINE_ID);
        }
        if config.lifecycle_context {
            manager
                .add_or_replace_state_machine(Arc::new(LifecycleMachine::new()), LIFECYCLE_MACHINE_ID);
        }
        if config.deep_link_context {
            manager
                .add_or_replace_state_machine(Arc::new(DeepLinkMachine::new()), DEEP_LINK_MACHINE_ID);
        }

        info!(namespace = %config.namespace, "tracker ready");

        Self {
            config: Arc::new(config),
            state: Mutex::new(manager),
            session,
            emitter,
            metrics,
            handle,
            collecting: AtomicBool::new(true),
        }
    }

    /// Convenience constructor: SQLite stores at `db_path` and an HTTP
    /// transport against `config.collector`.
    pub fn open(
        config: TrackerConfig,
        db_path: &Path,
        handle: tokio::runtime::Handle,
    ) -> Result<Self, StoreError> {
        let db = Database::open(db_path)?;
        let transport = Arc::new(HttpTransport::new(&config.collector, config.emitter.method));
        Ok(Self::new(
            config,
            Arc::new(SqliteEventStore::new(db.clone())),
            Arc::new(SqliteSessionStore::new(db)),
            transport,
            None,
            handle,
        ))
    }

    /// Track one event. Returns the generated event id, or None when
    /// collection is paused ("not tracked"). Never returns an error:
    /// failures downstream surface only through the request callback and
    /// logging.
    ///
    /// The state snapshot, derived entities and payload additions are
    /// computed synchronously on the calling thread inside one critical
    /// section. Deferring this would let two events tracked in quick
    /// succession on different threads observe each other's state out of
    /// submission order; the eager computation trades a little throughput
    /// for that ordering guarantee. Everything after the critical section is
    /// dispatched to the runtime.
    pub fn track(&self, event: Event) -> Option<EventId> {
        if !self.collecting.load(Ordering::Acquire) {
            debug!("collection paused; event not tracked");
            return None;
        }
        self.metrics.record_tracked();

        let id = EventId::new();
        let timestamp = Utc::now().timestamp_millis();

        let tracked = {
            let mut manager = self.state.lock();
            let captured = CapturedEvent::new(&id, timestamp, &event);
            let snapshot = manager.state_for_event(&captured);

            let mut entities = event.entities.clone();
            entities.extend(manager.entities_for_event(&captured, &snapshot));

            let mut additions = Payload::new();
            let collisions =
                manager.payload_additions_for_event(&captured, &snapshot, &mut additions);
            self.metrics.record_payload_collision(collisions.len() as u64);

            TrackedEvent {
                id: id.clone(),
                timestamp,
                event,
                entities,
                snapshot,
                additions,
            }
        };

        let config = Arc::clone(&self.config);
        let emitter = Arc::clone(&self.emitter);
        let metrics = Arc::clone(&self.metrics);
        self.handle.spawn(async move {
            let (payload, collided) = build_payload(&config, &tracked);
            if collided > 0 {
                metrics.record_payload_collision(collided as u64);
            }
            emitter.add(&payload);
        });

        Some(id)
    }

    /// Stop accepting events; `track` returns None until resumed. Already
    /// queued events keep delivering.
    pub fn pause_event_tracking(&self) {
        self.collecting.store(false, Ordering::Release);
    }

    pub fn resume_event_tracking(&self) {
        self.collecting.store(true, Ordering::Release);
    }

    /// Lifecycle notification: the app became visible or was backgrounded.
    /// Direct typed call; toggling alone never rolls the session.
    pub fn set_visibility(&self, visible: bool) {
        if let Some(session) = &self.session {
            session.set_background(!visible);
        }
    }

    /// Register a custom state machine under `id`. Same concrete type under
    /// an existing id preserves its state; a different type resets it.
    pub fn add_state_machine(&self, machine: Arc<dyn StateMachine>, id: &str) {
        self.state.lock().add_or_replace_state_machine(machine, id);
    }

    pub fn remove_state_machine(&self, id: &str) -> bool {
        self.state.lock().remove_state_machine(id)
    }

    /// The session tracker, when the session context is enabled.
    pub fn session(&self) -> Option<&Arc<SessionTracker>> {
        self.session.as_ref()
    }

    pub fn emitter(&self) -> &Arc<Emitter> {
        &self.emitter
    }

    pub fn metrics(&self) -> &Arc<PipelineMetrics> {
        &self.metrics
    }

    pub fn namespace(&self) -> &str {
        &self.config.namespace
    }

    /// Force a delivery pass regardless of batch thresholds.
    pub fn flush(&self) {
        self.emitter.flush();
    }

    /// Stop the delivery worker, waiting up to `timeout`.
    pub async fn shutdown(&self, timeout: std::time::Duration) -> Result<(), EmitError> {
        self.emitter.shutdown(timeout).await
    }
}

/// Assemble the wire payload for one tracked event. Returns the payload and
/// the number of machine additions dropped because their keys were taken.
fn build_payload(config: &TrackerConfig, tracked: &TrackedEvent) -> (Payload, usize) {
    let mut payload = Payload::new();

    match &tracked.event.kind {
        EventKind::SelfDescribing { schema } => {
            payload.add(protocol::EVENT, protocol::EVENT_SELF_DESCRIBING);
            let envelope = json!({
                "schema": protocol::SCHEMA_UNSTRUCT_EVENT,
                "data": {
                    "schema": schema,
                    "data": Value::Object(
                        tracked.event.properties.clone().into_iter().collect()
                    ),
                },
            });
            payload.add_json(
                &envelope,
                config.base64_encoding,
                protocol::SELF_DESCRIBING_ENCODED,
                protocol::SELF_DESCRIBING,
            );
        }
        EventKind::Primitive { code } => {
            payload.add(protocol::EVENT, code.clone());
            for (key, value) in &tracked.event.properties {
                payload.add(key.clone(), value_to_string(value));
            }
        }
    }

    payload.add(protocol::EVENT_ID, tracked.id.as_str());
    payload.add(protocol::DEVICE_TIMESTAMP, tracked.timestamp.to_string());
    if let Some(true_timestamp) = tracked.event.true_timestamp {
        payload.add(protocol::TRUE_TIMESTAMP, true_timestamp.to_string());
    }
    payload.add(protocol::TRACKER_VERSION, TRACKER_VERSION);
    payload.add(protocol::NAMESPACE, config.namespace.clone());
    payload.add(protocol::APP_ID, config.app_id.clone());
    payload.add(protocol::PLATFORM, config.platform.code());

    if !tracked.entities.is_empty() {
        let contexts = json!({
            "schema": protocol::SCHEMA_CONTEXTS,
            "data": tracked.entities.iter().map(Entity::to_json).collect::<Vec<_>>(),
        });
        payload.add_json(
            &contexts,
            config.base64_encoding,
            protocol::CONTEXT_ENCODED,
            protocol::CONTEXT,
        );
    }

    let additions: Vec<(String, String)> = tracked
        .additions
        .iter()
        .map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_string()))
        .collect();
    let collisions = payload.merge_missing(additions);
    if !collisions.is_empty() {
        warn!(keys = ?collisions, "machine payload additions collided with event fields");
    }

    (payload, collisions.len())
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
