use std::collections::HashMap;

use serde_json::{json, Value};

use beacon_core::{protocol, Payload};
use beacon_store::StoredEvent;

/// Statuses that mark a permanent rejection: never retried by default.
const NO_RETRY_STATUSES: [u16; 5] = [400, 401, 403, 410, 422];

/// One outgoing HTTP request covering one or more stored events.
#[derive(Clone, Debug)]
pub struct Request {
    pub payloads: Vec<Payload>,
    pub event_ids: Vec<i64>,
    /// The single covered event exceeds the byte ceiling; sent alone and
    /// never retried so it cannot block the queue.
    pub oversize: bool,
}

impl Request {
    pub fn single(event: StoredEvent, oversize: bool) -> Self {
        Self {
            payloads: vec![event.payload],
            event_ids: vec![event.id],
            oversize,
        }
    }

    pub fn batched(events: Vec<StoredEvent>) -> Self {
        let mut payloads = Vec::with_capacity(events.len());
        let mut event_ids = Vec::with_capacity(events.len());
        for event in events {
            event_ids.push(event.id);
            payloads.push(event.payload);
        }
        Self {
            payloads,
            event_ids,
            oversize: false,
        }
    }

    /// POST body: the payload array under the batch envelope, each payload
    /// stamped with the sent timestamp.
    pub fn post_body(&self, sent_timestamp_ms: i64) -> Value {
        let stamped: Vec<Value> = self
            .payloads
            .iter()
            .map(|payload| {
                let mut payload = payload.clone();
                payload.add(protocol::SENT_TIMESTAMP, sent_timestamp_ms.to_string());
                Value::Object(payload.into_map())
            })
            .collect();
        json!({
            "schema": protocol::SCHEMA_PAYLOAD_DATA,
            "data": stamped,
        })
    }
}

/// Per-request delivery outcome. `status_code` is None on a hard
/// transport-level failure (endpoint unreachable), as opposed to an HTTP
/// error status.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestResult {
    pub status_code: Option<u16>,
    pub oversize: bool,
    pub event_ids: Vec<i64>,
}

impl RequestResult {
    pub fn new(status_code: Option<u16>, request: &Request) -> Self {
        Self {
            status_code,
            oversize: request.oversize,
            event_ids: request.event_ids.clone(),
        }
    }

    pub fn is_successful(&self) -> bool {
        matches!(self.status_code, Some(code) if (200..300).contains(&code))
    }

    /// Whether the covered events should stay in the store for another
    /// attempt. Oversize results are never retried irrespective of status; a
    /// custom rule takes precedence over the default classification for its
    /// status code; transport-level failures are always retryable.
    pub fn should_retry(&self, custom_rules: &HashMap<u16, bool>, retry_enabled: bool) -> bool {
        if self.is_successful() || self.oversize || !retry_enabled {
            return false;
        }
        match self.status_code {
            Some(code) => custom_rules
                .get(&code)
                .copied()
                .unwrap_or(!NO_RETRY_STATUSES.contains(&code)),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(id: i64) -> StoredEvent {
        let mut payload = Payload::new();
        payload.add("e", "se");
        StoredEvent { id, payload }
    }

    fn result(status: Option<u16>) -> RequestResult {
        RequestResult {
            status_code: status,
            oversize: false,
            event_ids: vec![1],
        }
    }

    #[test]
    fn success_is_2xx() {
        assert!(result(Some(200)).is_successful());
        assert!(result(Some(204)).is_successful());
        assert!(!result(Some(301)).is_successful());
        assert!(!result(Some(500)).is_successful());
        assert!(!result(None).is_successful());
    }

    #[test]
    fn server_errors_retry_by_default() {
        let rules = HashMap::new();
        assert!(result(Some(500)).should_retry(&rules, true));
        assert!(result(Some(502)).should_retry(&rules, true));
        assert!(result(Some(429)).should_retry(&rules, true));
    }

    #[test]
    fn permanent_rejections_never_retry_by_default() {
        let rules = HashMap::new();
        for code in [400, 401, 403, 410, 422] {
            assert!(!result(Some(code)).should_retry(&rules, true), "status {code}");
        }
    }

    #[test]
    fn custom_rules_take_precedence() {
        let mut rules = HashMap::new();
        rules.insert(403u16, true);
        rules.insert(500u16, false);
        assert!(result(Some(403)).should_retry(&rules, true));
        assert!(!result(Some(500)).should_retry(&rules, true));
        // Unlisted statuses keep the default classification
        assert!(!result(Some(401)).should_retry(&rules, true));
        assert!(result(Some(503)).should_retry(&rules, true));
    }

    #[test]
    fn oversize_never_retries() {
        let mut rules = HashMap::new();
        rules.insert(500u16, true);
        let oversize = RequestResult {
            status_code: Some(500),
            oversize: true,
            event_ids: vec![1],
        };
        assert!(!oversize.should_retry(&rules, true));
    }

    #[test]
    fn retry_toggle_disables_everything() {
        let rules = HashMap::new();
        assert!(!result(Some(500)).should_retry(&rules, false));
        assert!(!result(None).should_retry(&rules, false));
    }

    #[test]
    fn transport_failure_is_retryable() {
        let rules = HashMap::new();
        assert!(result(None).should_retry(&rules, true));
    }

    #[test]
    fn successful_result_is_not_retried() {
        let rules = HashMap::new();
        assert!(!result(Some(200)).should_retry(&rules, true));
    }

    #[test]
    fn batched_request_covers_all_ids() {
        let request = Request::batched(vec![stored(1), stored(2), stored(3)]);
        assert_eq!(request.event_ids, [1, 2, 3]);
        assert_eq!(request.payloads.len(), 3);
        assert!(!request.oversize);
    }

    #[test]
    fn post_body_wraps_and_stamps() {
        let request = Request::batched(vec![stored(1), stored(2)]);
        let body = request.post_body(1_700_000);
        assert_eq!(body["schema"], protocol::SCHEMA_PAYLOAD_DATA);
        let data = body["data"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        for element in data {
            assert_eq!(element[protocol::SENT_TIMESTAMP], "1700000");
            assert_eq!(element["e"], "se");
        }
    }

    #[test]
    fn result_inherits_request_shape() {
        let request = Request::single(stored(7), true);
        let result = RequestResult::new(Some(200), &request);
        assert!(result.oversize);
        assert_eq!(result.event_ids, [7]);
    }
}
