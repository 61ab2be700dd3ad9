use std::collections::HashMap;
use std::time::Duration;

/// HTTP method the transport delivers with. GET carries one event per
/// request as query parameters; POST batches events into a JSON body.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How many events are grouped into one outgoing POST request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BatchPolicy {
    Single,
    Small,
    Default,
    Large,
}

impl BatchPolicy {
    pub fn events_per_request(&self) -> usize {
        match self {
            Self::Single => 1,
            Self::Small => 10,
            Self::Default => 25,
            Self::Large => 50,
        }
    }
}

/// Delivery-loop tuning. Consumed by the emitter, owned by the caller.
#[derive(Clone, Debug)]
pub struct EmitterConfig {
    pub method: Method,
    pub batch_policy: BatchPolicy,
    /// Byte ceiling for a single GET request.
    pub byte_limit_get: usize,
    /// Byte ceiling for the summed payloads of one POST body.
    pub byte_limit_post: usize,
    /// Maximum events read from the store per poll.
    pub send_limit: u32,
    /// Delay between polls while draining or backing off after failures.
    pub poll_interval: Duration,
    /// Consecutive empty polls before the worker goes idle.
    pub empty_limit: u32,
    /// Master retry toggle. Off means every failure evicts.
    pub retry_failed_requests: bool,
    /// Per-status retry override; takes precedence over the default
    /// classification for its status code.
    pub custom_retry_rules: HashMap<u16, bool>,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            method: Method::Post,
            batch_policy: BatchPolicy::Default,
            byte_limit_get: 40_000,
            byte_limit_post: 40_000,
            send_limit: 150,
            poll_interval: Duration::from_secs(5),
            empty_limit: 5,
            retry_failed_requests: true,
            custom_retry_rules: HashMap::new(),
        }
    }
}

impl EmitterConfig {
    /// The byte ceiling applicable to the configured method.
    pub fn byte_limit(&self) -> usize {
        match self.method {
            Method::Get => self.byte_limit_get,
            Method::Post => self.byte_limit_post,
        }
    }
}
