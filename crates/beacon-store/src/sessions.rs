use chrono::Utc;
use tracing::instrument;

use beacon_core::SessionRecord;

use crate::database::Database;
use crate::error::StoreError;
use crate::row_helpers;

/// Durable per-namespace key-value store for the session record.
/// Independent namespaces never share a record.
pub trait SessionStore: Send + Sync {
    fn load(&self, namespace: &str) -> Result<Option<SessionRecord>, StoreError>;
    fn save(&self, namespace: &str, record: &SessionRecord) -> Result<(), StoreError>;
    fn clear(&self, namespace: &str) -> Result<bool, StoreError>;
}

/// SQLite-backed session store: one row per namespace, record as JSON.
pub struct SqliteSessionStore {
    db: Database,
}

impl SqliteSessionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

impl SessionStore for SqliteSessionStore {
    #[instrument(skip(self))]
    fn load(&self, namespace: &str) -> Result<Option<SessionRecord>, StoreError> {
        self.db.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT record FROM session_records WHERE namespace = ?1")?;
            let mut rows = stmt.query([namespace])?;
            match rows.next()? {
                Some(row) => {
                    let raw: String = row_helpers::get(row, 0, "session_records", "record")?;
                    Ok(Some(row_helpers::parse_json(&raw, "session_records", "record")?))
                }
                None => Ok(None),
            }
        })
    }

    #[instrument(skip(self, record), fields(session_index = record.session_index))]
    fn save(&self, namespace: &str, record: &SessionRecord) -> Result<(), StoreError> {
        let serialized = serde_json::to_string(record)?;
        let now = Utc::now().to_rfc3339();
        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO session_records (namespace, record, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(namespace) DO UPDATE SET record = ?2, updated_at = ?3",
                rusqlite::params![namespace, serialized, now],
            )?;
            Ok(())
        })
    }

    fn clear(&self, namespace: &str) -> Result<bool, StoreError> {
        self.db.with_conn(|conn| {
            let changed =
                conn.execute("DELETE FROM session_records WHERE namespace = ?1", [namespace])?;
            Ok(changed > 0)
        })
    }
}
