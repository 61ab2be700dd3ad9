use crate::error::StoreError;

/// Get a required column value from a row, returning CorruptRow on failure.
pub fn get<T: rusqlite::types::FromSql>(
    row: &rusqlite::Row<'_>,
    idx: usize,
    table: &'static str,
    column: &'static str,
) -> Result<T, StoreError> {
    row.get(idx).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: e.to_string(),
    })
}

/// Parse a JSON string column into a typed value, returning CorruptRow on
/// parse failure.
pub fn parse_json<T: serde::de::DeserializeOwned>(
    raw: &str,
    table: &'static str,
    column: &'static str,
) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|e| StoreError::CorruptRow {
        table,
        column,
        detail: format!("invalid JSON: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use beacon_core::Payload;

    #[test]
    fn parse_json_success() {
        let result: Result<Payload, _> = parse_json(r#"{"e": "se"}"#, "pending_events", "payload");
        assert_eq!(result.unwrap().get("e"), Some("se"));
    }

    #[test]
    fn parse_json_failure() {
        let result: Result<Payload, _> = parse_json("not valid json", "pending_events", "payload");
        assert!(matches!(
            result,
            Err(StoreError::CorruptRow { table: "pending_events", column: "payload", .. })
        ));
    }
}
