use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Raw JSON object as stored by the backend.
pub type Record = Map<String, Value>;

/// Backend-assigned identifier of a persisted record
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Milliseconds since the Unix epoch, the unit every timestamp field uses.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Opaque reference to an uploaded file (storage path or download URL).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileHandle(String);

impl FileHandle {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn reference(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

/// Current value of one form input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    File(FileHandle),
}

impl FieldValue {
    pub fn empty() -> Self {
        FieldValue::Text(String::new())
    }

    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn file(reference: impl Into<String>) -> Self {
        FieldValue::File(FileHandle::new(reference))
    }

    /// Whitespace-only text counts as empty, as does a blank file handle.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.trim().is_empty(),
            FieldValue::File(handle) => handle.is_empty(),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FieldValue::Text(s) => s,
            FieldValue::File(handle) => handle.reference(),
        }
    }

    pub fn to_json(&self) -> Value {
        Value::String(self.as_str().to_string())
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted content record.
///
/// `main_type`, `timestamp` and `last_updated` are stamped by the store;
/// everything else the category schema defines lives in `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: EntityId,
    #[serde(default)]
    pub main_type: String,
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<i64>,
    #[serde(flatten)]
    pub fields: Record,
}

impl Entity {
    /// Build an entity from a stored JSON value keyed by `id`.
    ///
    /// Non-object values (a bare string stored under a key, for example)
    /// are kept under a `value` field so nothing read is dropped.
    pub fn from_stored(id: impl Into<EntityId>, value: Value) -> Self {
        let mut fields = match value {
            Value::Object(map) => map,
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };

        fields.remove("id");
        let main_type = match fields.remove("mainType") {
            Some(Value::String(s)) => s,
            _ => String::new(),
        };
        let timestamp = fields
            .remove("timestamp")
            .and_then(|v| v.as_i64())
            .unwrap_or_default();
        let last_updated = fields.remove("lastUpdated").and_then(|v| v.as_i64());

        Self {
            id: id.into(),
            main_type,
            timestamp,
            last_updated,
            fields,
        }
    }

    /// String value of a category field; non-string values yield `None`.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }

    /// Value of the `type` attribute used for server-side filtering.
    pub fn entity_type(&self) -> Option<&str> {
        self.field_str("type")
    }

    pub fn title(&self) -> Option<&str> {
        self.field_str("title")
    }

    /// Shallow merge of `partial` over the current fields.
    pub fn merge_fields(&mut self, partial: &Record) {
        for (key, value) in partial {
            self.fields.insert(key.clone(), value.clone());
        }
    }

    /// The full JSON object as it is persisted (without `id`).
    pub fn to_record(&self) -> Record {
        let mut record = self.fields.clone();
        record.insert("mainType".to_string(), Value::String(self.main_type.clone()));
        record.insert("timestamp".to_string(), Value::from(self.timestamp));
        if let Some(last_updated) = self.last_updated {
            record.insert("lastUpdated".to_string(), Value::from(last_updated));
        }
        record
    }
}
