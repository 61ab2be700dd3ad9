use beacon_store::StoredEvent;

use crate::config::{EmitterConfig, Method};
use crate::request::Request;

/// Partition a read of pending events into outgoing requests.
///
/// GET sends one event per request. POST groups events up to the batch
/// policy size while the summed payload bytes stay under the ceiling. Any
/// single event that alone exceeds the ceiling is sent standalone and
/// flagged oversize, so it cannot permanently block the queue.
pub fn partition(events: Vec<StoredEvent>, config: &EmitterConfig) -> Vec<Request> {
    let byte_limit = config.byte_limit();
    match config.method {
        Method::Get => events
            .into_iter()
            .map(|event| {
                let oversize = event.payload.byte_size() > byte_limit;
                Request::single(event, oversize)
            })
            .collect(),
        Method::Post => {
            let per_request = config.batch_policy.events_per_request();
            let mut requests = Vec::new();
            let mut group: Vec<StoredEvent> = Vec::new();
            let mut group_bytes = 0usize;

            for event in events {
                let size = event.payload.byte_size();
                if size > byte_limit {
                    requests.push(Request::single(event, true));
                    continue;
                }
                if !group.is_empty()
                    && (group.len() >= per_request || group_bytes + size > byte_limit)
                {
                    requests.push(Request::batched(std::mem::take(&mut group)));
                    group_bytes = 0;
                }
                group_bytes += size;
                group.push(event);
            }
            if !group.is_empty() {
                requests.push(Request::batched(group));
            }
            requests
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BatchPolicy;
    use beacon_core::Payload;

    fn stored(id: i64, filler: usize) -> StoredEvent {
        let mut payload = Payload::new();
        payload.add("e", "se");
        if filler > 0 {
            payload.add("filler", "x".repeat(filler));
        }
        StoredEvent { id, payload }
    }

    fn config(method: Method, policy: BatchPolicy, byte_limit: usize) -> EmitterConfig {
        EmitterConfig {
            method,
            batch_policy: policy,
            byte_limit_get: byte_limit,
            byte_limit_post: byte_limit,
            ..Default::default()
        }
    }

    #[test]
    fn get_sends_one_event_per_request() {
        let config = config(Method::Get, BatchPolicy::Default, 40_000);
        let requests = partition((0..4).map(|n| stored(n, 0)).collect(), &config);
        assert_eq!(requests.len(), 4);
        assert!(requests.iter().all(|r| r.event_ids.len() == 1));
        assert!(requests.iter().all(|r| !r.oversize));
    }

    #[test]
    fn post_single_policy_isolates_events() {
        let config = config(Method::Post, BatchPolicy::Single, 40_000);
        let requests = partition((0..3).map(|n| stored(n, 0)).collect(), &config);
        assert_eq!(requests.len(), 3);
        assert!(requests.iter().all(|r| r.event_ids.len() == 1));
    }

    #[test]
    fn post_groups_up_to_policy_size() {
        let config = config(Method::Post, BatchPolicy::Small, 40_000);
        let requests = partition((0..23).map(|n| stored(n, 0)).collect(), &config);
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].event_ids.len(), 10);
        assert_eq!(requests[1].event_ids.len(), 10);
        assert_eq!(requests[2].event_ids.len(), 3);
    }

    #[test]
    fn post_respects_byte_ceiling() {
        // Each event ~120 bytes; ceiling fits two but not three.
        let config = config(Method::Post, BatchPolicy::Default, 260);
        let requests = partition((0..4).map(|n| stored(n, 100)).collect(), &config);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].event_ids.len(), 2);
        assert_eq!(requests[1].event_ids.len(), 2);
        assert!(requests.iter().all(|r| !r.oversize));
    }

    #[test]
    fn oversize_event_sent_standalone() {
        let config = config(Method::Post, BatchPolicy::Default, 200);
        let events = vec![stored(1, 0), stored(2, 500), stored(3, 0)];
        let requests = partition(events, &config);

        let oversize: Vec<&Request> = requests.iter().filter(|r| r.oversize).collect();
        assert_eq!(oversize.len(), 1);
        assert_eq!(oversize[0].event_ids, [2]);

        // The small events still batch together
        let normal: Vec<&Request> = requests.iter().filter(|r| !r.oversize).collect();
        assert_eq!(normal.len(), 1);
        assert_eq!(normal[0].event_ids, [1, 3]);
    }

    #[test]
    fn oversize_on_get_flags_single_request() {
        let config = config(Method::Get, BatchPolicy::Default, 50);
        let requests = partition(vec![stored(1, 200)], &config);
        assert_eq!(requests.len(), 1);
        assert!(requests[0].oversize);
    }

    #[test]
    fn empty_read_produces_no_requests() {
        let config = config(Method::Post, BatchPolicy::Default, 40_000);
        assert!(partition(Vec::new(), &config).is_empty());
    }
}
