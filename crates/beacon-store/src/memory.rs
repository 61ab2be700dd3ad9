use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use beacon_core::{Payload, SessionRecord};

use crate::error::StoreError;
use crate::events::{EventStore, StoredEvent};
use crate::sessions::SessionStore;

/// In-memory event store: same contract as the SQLite store without
/// durability. Used by tests and by no-persistence configurations.
#[derive(Default)]
pub struct MemoryEventStore {
    inner: Mutex<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    rows: BTreeMap<i64, Payload>,
    next_id: i64,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for MemoryEventStore {
    fn add(&self, payload: &Payload) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        inner.rows.insert(id, payload.clone());
        Ok(id)
    }

    fn remove_event(&self, id: i64) -> Result<bool, StoreError> {
        Ok(self.inner.lock().rows.remove(&id).is_some())
    }

    fn remove_events(&self, ids: &[i64]) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock();
        Ok(ids.iter().filter(|id| inner.rows.remove(id).is_some()).count())
    }

    fn remove_all(&self) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock();
        let count = inner.rows.len();
        inner.rows.clear();
        Ok(count)
    }

    fn size(&self) -> Result<u64, StoreError> {
        Ok(self.inner.lock().rows.len() as u64)
    }

    fn emittable_events(&self, limit: u32) -> Result<Vec<StoredEvent>, StoreError> {
        let inner = self.inner.lock();
        Ok(inner
            .rows
            .iter()
            .take(limit as usize)
            .map(|(id, payload)| StoredEvent {
                id: *id,
                payload: payload.clone(),
            })
            .collect())
    }
}

/// In-memory session store.
#[derive(Default)]
pub struct MemorySessionStore {
    records: Mutex<HashMap<String, SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self, namespace: &str) -> Result<Option<SessionRecord>, StoreError> {
        Ok(self.records.lock().get(namespace).cloned())
    }

    fn save(&self, namespace: &str, record: &SessionRecord) -> Result<(), StoreError> {
        self.records.lock().insert(namespace.to_string(), record.clone());
        Ok(())
    }

    fn clear(&self, namespace: &str) -> Result<bool, StoreError> {
        Ok(self.records.lock().remove(namespace).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::EventId;

    fn payload(n: u32) -> Payload {
        let mut p = Payload::new();
        p.add("n", n.to_string());
        p
    }

    #[test]
    fn add_and_drain() {
        let store = MemoryEventStore::new();
        let ids: Vec<i64> = (0..3).map(|n| store.add(&payload(n)).unwrap()).collect();
        assert_eq!(store.size().unwrap(), 3);

        let events = store.emittable_events(2).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, ids[0]);

        store.remove_events(&ids).unwrap();
        assert_eq!(store.size().unwrap(), 0);
    }

    #[test]
    fn ids_not_reused_after_removal() {
        let store = MemoryEventStore::new();
        let a = store.add(&payload(1)).unwrap();
        store.remove_event(a).unwrap();
        let b = store.add(&payload(2)).unwrap();
        assert!(b > a);
    }

    #[test]
    fn remove_all_reports_count() {
        let store = MemoryEventStore::new();
        for n in 0..4 {
            store.add(&payload(n)).unwrap();
        }
        assert_eq!(store.remove_all().unwrap(), 4);
    }

    #[test]
    fn session_store_roundtrip() {
        let store = MemorySessionStore::new();
        let record = SessionRecord::first("u", EventId::new(), 1);
        store.save("ns", &record).unwrap();
        assert_eq!(store.load("ns").unwrap(), Some(record));
        assert!(store.clear("ns").unwrap());
        assert!(store.load("ns").unwrap().is_none());
    }
}
