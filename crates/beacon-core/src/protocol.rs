//! Wire protocol constants: the flat keys of an outgoing event payload and
//! the schema URIs of self-describing envelopes and built-in entities.

/// Generated event id.
pub const EVENT_ID: &str = "eid";
/// Device wall-clock timestamp at capture time (ms since epoch).
pub const DEVICE_TIMESTAMP: &str = "dtm";
/// Optional user-supplied ("true") timestamp override (ms since epoch).
pub const TRUE_TIMESTAMP: &str = "ttm";
/// Timestamp stamped when the request leaves the device (ms since epoch).
pub const SENT_TIMESTAMP: &str = "stm";
/// Tracker version string.
pub const TRACKER_VERSION: &str = "tv";
/// Tracker namespace.
pub const NAMESPACE: &str = "tna";
/// Application id.
pub const APP_ID: &str = "aid";
/// Platform code (e.g. "mob", "srv").
pub const PLATFORM: &str = "p";
/// Event-type code.
pub const EVENT: &str = "e";

/// Self-describing event data, plain JSON.
pub const SELF_DESCRIBING: &str = "ue_pr";
/// Self-describing event data, base64url-encoded JSON.
pub const SELF_DESCRIBING_ENCODED: &str = "ue_px";
/// Context entities, plain JSON.
pub const CONTEXT: &str = "co";
/// Context entities, base64url-encoded JSON.
pub const CONTEXT_ENCODED: &str = "cx";

// Event-type codes
pub const EVENT_SELF_DESCRIBING: &str = "ue";
pub const EVENT_STRUCTURED: &str = "se";
pub const EVENT_SCREEN_VIEW: &str = "sv";

// Structured event fields
pub const SE_CATEGORY: &str = "se_ca";
pub const SE_ACTION: &str = "se_ac";
pub const SE_LABEL: &str = "se_la";
pub const SE_PROPERTY: &str = "se_pr";
pub const SE_VALUE: &str = "se_va";

// Screen view fields
pub const SV_NAME: &str = "name";
pub const SV_ID: &str = "id";
pub const SV_PREVIOUS_NAME: &str = "previousName";
pub const SV_PREVIOUS_ID: &str = "previousId";

// Deep link fields carried on the consuming screen view
pub const DEEP_LINK_URL: &str = "url";
pub const DEEP_LINK_REFERRER: &str = "refr";

/// Envelope wrapping a batched POST body: an array of payload maps.
pub const SCHEMA_PAYLOAD_DATA: &str = "dev.beacon/payload_data/jsonschema/1-0-0";
/// Envelope wrapping self-describing event data.
pub const SCHEMA_UNSTRUCT_EVENT: &str = "dev.beacon/unstruct_event/jsonschema/1-0-0";
/// Envelope wrapping the context entity array.
pub const SCHEMA_CONTEXTS: &str = "dev.beacon/contexts/jsonschema/1-0-0";

/// Client session context entity.
pub const SCHEMA_CLIENT_SESSION: &str = "dev.beacon/client_session/jsonschema/1-0-0";
/// Current screen context entity.
pub const SCHEMA_SCREEN: &str = "dev.beacon/screen/jsonschema/1-0-0";
/// Application lifecycle context entity.
pub const SCHEMA_LIFECYCLE: &str = "dev.beacon/application_lifecycle/jsonschema/1-0-0";
/// Deep link context entity attached to the consuming screen view.
pub const SCHEMA_DEEP_LINK: &str = "dev.beacon/deep_link/jsonschema/1-0-0";

/// Screen view event.
pub const SCHEMA_SCREEN_VIEW: &str = "dev.beacon/screen_view/jsonschema/1-0-0";
/// App moved to the foreground.
pub const SCHEMA_FOREGROUND: &str = "dev.beacon/application_foreground/jsonschema/1-0-0";
/// App moved to the background.
pub const SCHEMA_BACKGROUND: &str = "dev.beacon/application_background/jsonschema/1-0-0";
/// Deep link received by the application.
pub const SCHEMA_DEEP_LINK_RECEIVED: &str = "dev.beacon/deep_link_received/jsonschema/1-0-0";

/// Sentinel user id returned by an anonymized session resolve.
pub const ANONYMOUS_USER_ID: &str = "00000000-0000-0000-0000-000000000000";
