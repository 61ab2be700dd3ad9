use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::protocol;

/// A context entity: a self-describing payload fragment carrying an explicit
/// schema URI plus free-form data.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub schema: String,
    pub data: Value,
}

impl Entity {
    pub fn new(schema: impl Into<String>, data: Value) -> Self {
        Self {
            schema: schema.into(),
            data,
        }
    }

    /// Wire form: `{"schema": ..., "data": ...}`.
    pub fn to_json(&self) -> Value {
        json!({ "schema": self.schema, "data": self.data })
    }
}

/// How an event is identified on the wire.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// Self-describing: schema URI + JSON data under the unstruct envelope.
    SelfDescribing { schema: String },
    /// Primitive: fixed wire fields identified by a short event-type code.
    Primitive { code: String },
}

/// A single tracked occurrence: what happened, when, and in which context.
///
/// The property map is the event's own data. For self-describing events it
/// becomes the `data` member of the schema envelope; for primitives each
/// property is written as a flat wire field.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub properties: HashMap<String, Value>,
    /// User-supplied timestamp override (ms since epoch).
    pub true_timestamp: Option<i64>,
    /// Caller-attached context entities. Derived entities are added later by
    /// the state machines and never stored here.
    pub entities: Vec<Entity>,
}

impl Event {
    pub fn self_describing(schema: impl Into<String>, data: HashMap<String, Value>) -> Self {
        Self {
            kind: EventKind::SelfDescribing {
                schema: schema.into(),
            },
            properties: data,
            true_timestamp: None,
            entities: Vec::new(),
        }
    }

    pub fn primitive(code: impl Into<String>, properties: HashMap<String, Value>) -> Self {
        Self {
            kind: EventKind::Primitive { code: code.into() },
            properties,
            true_timestamp: None,
            entities: Vec::new(),
        }
    }

    /// Structured event: category/action with optional label, property, value.
    pub fn structured(
        category: impl Into<String>,
        action: impl Into<String>,
        label: Option<String>,
        property: Option<String>,
        value: Option<f64>,
    ) -> Self {
        let mut props = HashMap::new();
        props.insert(protocol::SE_CATEGORY.to_string(), Value::from(category.into()));
        props.insert(protocol::SE_ACTION.to_string(), Value::from(action.into()));
        if let Some(label) = label {
            props.insert(protocol::SE_LABEL.to_string(), Value::from(label));
        }
        if let Some(property) = property {
            props.insert(protocol::SE_PROPERTY.to_string(), Value::from(property));
        }
        if let Some(value) = value {
            props.insert(protocol::SE_VALUE.to_string(), Value::from(value.to_string()));
        }
        Self::primitive(protocol::EVENT_STRUCTURED, props)
    }

    /// Screen view event. `id` identifies the screen instance.
    pub fn screen_view(name: impl Into<String>, id: impl Into<String>) -> Self {
        let mut data = HashMap::new();
        data.insert(protocol::SV_NAME.to_string(), Value::from(name.into()));
        data.insert(protocol::SV_ID.to_string(), Value::from(id.into()));
        Self::self_describing(protocol::SCHEMA_SCREEN_VIEW, data)
    }

    /// App moved to the foreground for the `index`-th time.
    pub fn foreground(index: i64) -> Self {
        let mut data = HashMap::new();
        data.insert("foregroundIndex".to_string(), Value::from(index));
        Self::self_describing(protocol::SCHEMA_FOREGROUND, data)
    }

    /// App moved to the background for the `index`-th time.
    pub fn background(index: i64) -> Self {
        let mut data = HashMap::new();
        data.insert("backgroundIndex".to_string(), Value::from(index));
        Self::self_describing(protocol::SCHEMA_BACKGROUND, data)
    }

    /// Deep link received by the application.
    pub fn deep_link_received(url: impl Into<String>, referrer: Option<String>) -> Self {
        let mut data = HashMap::new();
        data.insert(protocol::DEEP_LINK_URL.to_string(), Value::from(url.into()));
        if let Some(referrer) = referrer {
            data.insert(protocol::DEEP_LINK_REFERRER.to_string(), Value::from(referrer));
        }
        Self::self_describing(protocol::SCHEMA_DEEP_LINK_RECEIVED, data)
    }

    pub fn with_true_timestamp(mut self, ms: i64) -> Self {
        self.true_timestamp = Some(ms);
        self
    }

    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }

    /// The key state machines subscribe against: the schema URI for
    /// self-describing events, the event-type code for primitives.
    pub fn schema_key(&self) -> &str {
        match &self.kind {
            EventKind::SelfDescribing { schema } => schema,
            EventKind::Primitive { code } => code,
        }
    }

    /// Property lookup as a string slice, when present and textual.
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }
}
