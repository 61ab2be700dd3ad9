use chrono::Utc;
use tracing::{instrument, warn};

use beacon_core::Payload;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// A pending payload plus the store-assigned row id: the unit of durability
/// and of retry bookkeeping.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredEvent {
    pub id: i64,
    pub payload: Payload,
}

/// Durable queue of payloads awaiting delivery.
///
/// `add` is called from tracking threads while the emitter's delivery loop
/// reads and removes concurrently; implementations serialize all mutations
/// per store instance. A row leaves the store only on a terminal outcome
/// (success or non-retryable failure).
pub trait EventStore: Send + Sync {
    fn add(&self, payload: &Payload) -> Result<i64, StoreError>;
    fn remove_event(&self, id: i64) -> Result<bool, StoreError>;
    fn remove_events(&self, ids: &[i64]) -> Result<usize, StoreError>;
    fn remove_all(&self) -> Result<usize, StoreError>;
    fn size(&self) -> Result<u64, StoreError>;
    /// Oldest pending events first, up to `limit`.
    fn emittable_events(&self, limit: u32) -> Result<Vec<StoredEvent>, StoreError>;
}

/// SQLite-backed event store.
pub struct SqliteEventStore {
    db: Database,
}

impl SqliteEventStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl EventStore for SqliteEventStore {
    #[instrument(skip(self, payload))]
    fn add(&self, payload: &Payload) -> Result<i64, StoreError> {
        let serialized = serde_json::to_string(payload)?;
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO pending_events (payload, created_at) VALUES (?1, ?2)",
                rusqlite::params![serialized, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    fn remove_event(&self, id: i64) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute("DELETE FROM pending_events WHERE id = ?1", [id])?;
            Ok(changed > 0)
        })
    }

    fn remove_events(&self, ids: &[i64]) -> Result<usize, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.db.with_conn(|conn| {
            let placeholders = vec!["?"; ids.len()].join(",");
            let sql = format!("DELETE FROM pending_events WHERE id IN ({placeholders})");
            let params: Vec<&dyn rusqlite::types::ToSql> =
                ids.iter().map(|id| id as &dyn rusqlite::types::ToSql).collect();
            let changed = conn.execute(&sql, params.as_slice())?;
            Ok(changed)
        })
    }

    fn remove_all(&self) -> Result<usize, StoreError> {
        self.db
            .with_conn(|conn| Ok(conn.execute("DELETE FROM pending_events", [])?))
    }

    fn size(&self) -> Result<u64, StoreError> {
        self.db.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM pending_events", [], |row| row.get(0))?)
        })
    }

    #[instrument(skip(self))]
    fn emittable_events(&self, limit: u32) -> Result<Vec<StoredEvent>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, payload FROM pending_events ORDER BY id ASC LIMIT ?1",
            )?;
            let mut rows = stmt.query([limit])?;
            let mut results = Vec::new();
            let mut corrupt = Vec::new();
            while let Some(row) = rows.next()? {
                let id: i64 = row_helpers::get(row, 0, "pending_events", "id")?;
                let raw: String = row_helpers::get(row, 1, "pending_events", "payload")?;
                match row_helpers::parse_json::<Payload>(&raw, "pending_events", "payload") {
                    Ok(payload) => results.push(StoredEvent { id, payload }),
                    Err(e) => {
                        // A corrupt row would block the queue head forever;
                        // drop it and keep draining.
                        warn!(id, error = %e, "dropping undecodable pending event");
                        corrupt.push(id);
                    }
                }
            }
            drop(rows);
            drop(stmt);
            for id in corrupt {
                conn.execute("DELETE FROM pending_events WHERE id = ?1", [id])?;
            }
            Ok(results)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(n: u32) -> Payload {
        let mut p = Payload::new();
        p.add("e", "se");
        p.add("n", n.to_string());
        p
    }

    fn store() -> SqliteEventStore {
        SqliteEventStore::new(Database::in_memory().unwrap())
    }

    #[test]
    fn add_assigns_increasing_ids() {
        let store = store();
        let a = store.add(&payload(1)).unwrap();
        let b = store.add(&payload(2)).unwrap();
        assert!(b > a);
        assert_eq!(store.size().unwrap(), 2);
    }

    #[test]
    fn emittable_events_oldest_first() {
        let store = store();
        for n in 0..5 {
            store.add(&payload(n)).unwrap();
        }
        let events = store.emittable_events(3).unwrap();
        assert_eq!(events.len(), 3);
        assert!(events.windows(2).all(|w| w[0].id < w[1].id));
        assert_eq!(events[0].payload.get("n"), Some("0"));
    }

    #[test]
    fn remove_event() {
        let store = store();
        let id = store.add(&payload(1)).unwrap();
        assert!(store.remove_event(id).unwrap());
        assert!(!store.remove_event(id).unwrap());
        assert_eq!(store.size().unwrap(), 0);
    }

    #[test]
    fn remove_events_batch() {
        let store = store();
        let ids: Vec<i64> = (0..4).map(|n| store.add(&payload(n)).unwrap()).collect();
        let removed = store.remove_events(&ids[..2]).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.size().unwrap(), 2);

        let remaining = store.emittable_events(10).unwrap();
        assert_eq!(remaining[0].id, ids[2]);
    }

    #[test]
    fn remove_events_empty_slice() {
        let store = store();
        assert_eq!(store.remove_events(&[]).unwrap(), 0);
    }

    #[test]
    fn remove_all() {
        let store = store();
        for n in 0..3 {
            store.add(&payload(n)).unwrap();
        }
        assert_eq!(store.remove_all().unwrap(), 3);
        assert_eq!(store.size().unwrap(), 0);
    }

    #[test]
    fn corrupt_row_dropped_not_fatal() {
        let db = Database::in_memory().unwrap();
        let store = SqliteEventStore::new(db.clone());
        store.add(&payload(1)).unwrap();
        db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO pending_events (payload, created_at) VALUES ('not json', '2026-01-01')",
                [],
            )?;
            Ok(())
        })
        .unwrap();
        store.add(&payload(2)).unwrap();

        let events = store.emittable_events(10).unwrap();
        assert_eq!(events.len(), 2);
        // The corrupt row is gone from the queue entirely
        assert_eq!(store.size().unwrap(), 2);
    }

    #[test]
    fn concurrent_add_and_drain() {
        use std::sync::Arc;
        let store = Arc::new(store());

        let writers: Vec<_> = (0..4)
            .map(|t| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for n in 0..25 {
                        store.add(&payload(t * 100 + n)).unwrap();
                    }
                })
            })
            .collect();

        let drainer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                let mut drained = 0usize;
                while drained < 50 {
                    let batch = store.emittable_events(10).unwrap();
                    if batch.is_empty() {
                        std::thread::yield_now();
                        continue;
                    }
                    let ids: Vec<i64> = batch.iter().map(|e| e.id).collect();
                    drained += store.remove_events(&ids).unwrap();
                }
                drained
            })
        };

        for w in writers {
            w.join().unwrap();
        }
        let drained = drainer.join().unwrap();
        assert_eq!(drained + store.size().unwrap() as usize, 100);
    }
}
