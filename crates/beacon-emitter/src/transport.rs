use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use tracing::{debug, warn};

use beacon_core::protocol;

use crate::config::Method;
use crate::request::{Request, RequestResult};

/// Sends batched requests to the collection endpoint and reports one result
/// per request. A result with no status code marks a hard transport-level
/// failure (endpoint unreachable), distinct from an HTTP error status.
#[async_trait]
pub trait Transport: Send + Sync {
    fn method(&self) -> Method;
    fn endpoint(&self) -> &str;
    async fn send(&self, requests: Vec<Request>) -> Vec<RequestResult>;
}

/// reqwest-backed transport. GET renders the single covered payload as query
/// parameters; POST sends the batch envelope as JSON.
pub struct HttpTransport {
    client: reqwest::Client,
    method: Method,
    endpoint: String,
}

impl HttpTransport {
    /// `collector` is the base URL (e.g. `https://collector.example.com`).
    pub fn new(collector: &str, method: Method) -> Self {
        let base = collector.trim_end_matches('/');
        let endpoint = match method {
            Method::Get => format!("{base}/i"),
            Method::Post => format!("{base}/track"),
        };
        Self {
            client: reqwest::Client::new(),
            method,
            endpoint,
        }
    }

    async fn send_one(&self, request: &Request) -> Option<u16> {
        let sent = match self.method {
            Method::Get => {
                let mut payload = request.payloads[0].clone();
                payload.add(
                    protocol::SENT_TIMESTAMP,
                    Utc::now().timestamp_millis().to_string(),
                );
                let pairs: Vec<(String, String)> = payload
                    .iter()
                    .map(|(k, v)| (k.clone(), v.as_str().unwrap_or_default().to_string()))
                    .collect();
                self.client.get(&self.endpoint).query(&pairs).send().await
            }
            Method::Post => {
                let body = request.post_body(Utc::now().timestamp_millis());
                self.client.post(&self.endpoint).json(&body).send().await
            }
        };

        match sent {
            Ok(response) => Some(response.status().as_u16()),
            Err(e) => {
                warn!(endpoint = %self.endpoint, error = %e, "request failed at transport level");
                None
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    fn method(&self) -> Method {
        self.method
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, requests: Vec<Request>) -> Vec<RequestResult> {
        let mut results = Vec::with_capacity(requests.len());
        for request in &requests {
            let status = self.send_one(request).await;
            debug!(
                events = request.event_ids.len(),
                status = status.map(i64::from).unwrap_or(-1),
                "request delivered"
            );
            results.push(RequestResult::new(status, request));
        }
        results
    }
}

/// Scripted transport for deterministic tests: pops one outcome per request,
/// falling back to a sticky default, and records everything it was asked to
/// send.
pub struct MockTransport {
    method: Method,
    outcomes: Mutex<VecDeque<Option<u16>>>,
    default_outcome: Option<u16>,
    requests: Mutex<Vec<Request>>,
}

impl MockTransport {
    /// Every request succeeds with 200.
    pub fn successful(method: Method) -> Self {
        Self::with_default(method, Some(200))
    }

    /// Every request gets `default` once the queued outcomes run out.
    /// `None` models an unreachable endpoint.
    pub fn with_default(method: Method, default: Option<u16>) -> Self {
        Self {
            method,
            outcomes: Mutex::new(VecDeque::new()),
            default_outcome: default,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue an outcome consumed by the next request.
    pub fn queue_outcome(&self, outcome: Option<u16>) {
        self.outcomes.lock().push_back(outcome);
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn method(&self) -> Method {
        self.method
    }

    fn endpoint(&self) -> &str {
        "mock://collector"
    }

    async fn send(&self, requests: Vec<Request>) -> Vec<RequestResult> {
        let mut results = Vec::with_capacity(requests.len());
        for request in &requests {
            let outcome = self
                .outcomes
                .lock()
                .pop_front()
                .unwrap_or(self.default_outcome);
            results.push(RequestResult::new(outcome, request));
        }
        self.requests.lock().extend(requests);
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::Payload;
    use beacon_store::StoredEvent;

    fn request(id: i64) -> Request {
        let mut payload = Payload::new();
        payload.add("e", "se");
        Request::single(StoredEvent { id, payload }, false)
    }

    #[test]
    fn http_transport_builds_method_specific_endpoints() {
        let get = HttpTransport::new("https://collector.example.com/", Method::Get);
        assert_eq!(get.endpoint(), "https://collector.example.com/i");
        let post = HttpTransport::new("https://collector.example.com", Method::Post);
        assert_eq!(post.endpoint(), "https://collector.example.com/track");
        assert_eq!(post.method(), Method::Post);
    }

    #[tokio::test]
    async fn mock_uses_queued_outcomes_then_default() {
        let mock = MockTransport::successful(Method::Post);
        mock.queue_outcome(Some(500));
        mock.queue_outcome(None);

        let results = mock
            .send(vec![request(1), request(2), request(3)])
            .await;
        assert_eq!(results[0].status_code, Some(500));
        assert_eq!(results[1].status_code, None);
        assert_eq!(results[2].status_code, Some(200));
        assert_eq!(mock.request_count(), 3);
    }

    #[tokio::test]
    async fn mock_records_sent_requests() {
        let mock = MockTransport::successful(Method::Post);
        mock.send(vec![request(9)]).await;
        let sent = mock.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].event_ids, [9]);
    }
}
