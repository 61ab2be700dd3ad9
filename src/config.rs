use beacon_emitter::{EmitterConfig, Method};
use beacon_state::SessionConfig;

/// Platform code reported in every event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Platform {
    Mobile,
    Desktop,
    Web,
    ServerSideApp,
    Tv,
    Wearable,
    Embedded,
}

impl Platform {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Mobile => "mob",
            Self::Desktop => "pc",
            Self::Web => "web",
            Self::ServerSideApp => "srv",
            Self::Tv => "tv",
            Self::Wearable => "wear",
            Self::Embedded => "iot",
        }
    }
}

/// Everything a tracker needs to know about its pipeline. One config per
/// namespace; multiple trackers with distinct namespaces run independently
/// in the same process.
#[derive(Clone, Debug)]
pub struct TrackerConfig {
    /// Identifier scoping this tracker/session/emitter triple.
    pub namespace: String,
    pub app_id: String,
    pub platform: Platform,
    /// Collector base URL, consumed by [`crate::Tracker::open`].
    pub collector: String,
    pub emitter: EmitterConfig,
    pub session: SessionConfig,
    /// Base64url-encode entity and self-describing substructures.
    pub base64_encoding: bool,
    /// Attach the client-session entity to every event.
    pub session_context: bool,
    /// Track the current screen and decorate events with it.
    pub screen_context: bool,
    /// Track foreground/background visibility and decorate events with it.
    pub lifecycle_context: bool,
    /// Attach a received deep link to the next screen view.
    pub deep_link_context: bool,
    /// Resolve sessions with the user identity masked.
    pub anonymize_user: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            namespace: "default".to_string(),
            app_id: String::new(),
            platform: Platform::Mobile,
            collector: String::new(),
            emitter: EmitterConfig::default(),
            session: SessionConfig::default(),
            base64_encoding: true,
            session_context: true,
            screen_context: true,
            lifecycle_context: true,
            deep_link_context: true,
            anonymize_user: false,
        }
    }
}

impl TrackerConfig {
    pub fn new(namespace: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            app_id: app_id.into(),
            ..Default::default()
        }
    }

    pub fn with_collector(mut self, collector: impl Into<String>) -> Self {
        self.collector = collector.into();
        self
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.emitter.method = method;
        self
    }
}
