use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One outgoing wire event: an insertion-ordered string-keyed map.
///
/// GET delivery serializes it as query parameters, POST delivery as one
/// element of the batched body. Values are stored as JSON strings so the two
/// renderings agree.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload {
    map: Map<String, Value>,
}

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key/value pair. Empty values are skipped entirely.
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let value = value.into();
        if value.is_empty() {
            return;
        }
        self.map.insert(key.into(), Value::String(value));
    }

    /// Add every pair of a map, skipping empty values.
    pub fn add_map(&mut self, pairs: impl IntoIterator<Item = (String, String)>) {
        for (key, value) in pairs {
            self.add(key, value);
        }
    }

    /// Embed a JSON substructure: base64url-encoded under `key_encoded` when
    /// `encode` is set, plain serialized JSON under `key_plain` otherwise.
    pub fn add_json(&mut self, json: &Value, encode: bool, key_encoded: &str, key_plain: &str) {
        let serialized = json.to_string();
        if encode {
            self.add(key_encoded, URL_SAFE_NO_PAD.encode(serialized));
        } else {
            self.add(key_plain, serialized);
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).and_then(Value::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    /// Merge additions without overwriting existing keys. Returns the keys
    /// that collided and were therefore dropped.
    pub fn merge_missing(
        &mut self,
        additions: impl IntoIterator<Item = (String, String)>,
    ) -> Vec<String> {
        let mut collisions = Vec::new();
        for (key, value) in additions {
            if self.map.contains_key(&key) {
                collisions.push(key);
            } else {
                self.add(key, value);
            }
        }
        collisions
    }

    /// Size of the serialized JSON rendering, used against byte ceilings.
    pub fn byte_size(&self) -> usize {
        serde_json::to_string(&self.map).map(|s| s.len()).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.map.iter()
    }

    /// The underlying map, in insertion order.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.map
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.map
    }
}

impl FromIterator<(String, String)> for Payload {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut payload = Payload::new();
        payload.add_map(iter);
        payload
    }
}
