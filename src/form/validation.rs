use crate::core::{Entity, FieldValue, Record};
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// In-progress input values of one form, keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftRecord {
    values: BTreeMap<String, FieldValue>,
}

impl DraftRecord {
    /// Empty string for every field the schema declares
    pub fn empty_for(schema: &Schema) -> Self {
        let values = schema
            .field_names()
            .map(|name| (name.to_string(), FieldValue::empty()))
            .collect();
        Self { values }
    }

    /// Copy of an entity's values for every schema field.
    ///
    /// Fields the entity lacks start empty; numbers and booleans are
    /// rendered as text since every input edits a string.
    pub fn from_entity(schema: &Schema, entity: &Entity) -> Self {
        let values = schema
            .fields()
            .map(|field| {
                let text = match entity.fields.get(&field.name) {
                    Some(Value::String(s)) => s.clone(),
                    Some(Value::Null) | None => String::new(),
                    Some(other) => other.to_string(),
                };
                let value = if field.kind.is_file() {
                    FieldValue::file(text)
                } else {
                    FieldValue::Text(text)
                };
                (field.name.clone(), value)
            })
            .collect();
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.values.get(name)
    }

    pub(crate) fn set(&mut self, name: &str, value: FieldValue) {
        self.values.insert(name.to_string(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// JSON record handed to the store on submit
    pub fn to_record(&self) -> Record {
        self.values
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect()
    }
}

/// Field-scoped violations plus an optional top-level submission error
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    fields: BTreeMap<String, String>,
    submission: Option<String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn submission(&self) -> Option<&str> {
        self.submission.as_deref()
    }

    pub fn has_field_errors(&self) -> bool {
        !self.fields.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.submission.is_none()
    }

    pub(crate) fn set_field(&mut self, name: &str, message: impl Into<String>) {
        self.fields.insert(name.to_string(), message.into());
    }

    pub(crate) fn clear_field(&mut self, name: &str) {
        self.fields.remove(name);
    }

    pub(crate) fn clear_fields(&mut self) {
        self.fields.clear();
    }

    pub(crate) fn set_submission(&mut self, message: impl Into<String>) {
        self.submission = Some(message.into());
    }

    pub(crate) fn clear_submission(&mut self) {
        self.submission = None;
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, message) in &self.fields {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", name, message)?;
            first = false;
        }
        if let Some(submission) = &self.submission {
            if !first {
                write!(f, "; ")?;
            }
            write!(f, "{}", submission)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::builtin;
    use serde_json::json;

    #[test]
    fn test_from_entity_copies_schema_fields_only() {
        let schema = builtin::poem().unwrap();
        let entity = Entity::from_stored(
            "p1",
            json!({"title": "Hope", "poem": "a thing with feathers", "image": "img/h.png", "extra": 3}),
        );

        let draft = DraftRecord::from_entity(&schema, &entity);
        assert_eq!(draft.get("title"), Some(&FieldValue::text("Hope")));
        assert_eq!(draft.get("image"), Some(&FieldValue::file("img/h.png")));
        assert_eq!(draft.get("emotion"), Some(&FieldValue::empty()));
        assert!(draft.get("extra").is_none());
        assert_eq!(draft.len(), schema.field_names().count());
    }

    #[test]
    fn test_display_joins_messages() {
        let mut errors = ValidationErrors::new();
        errors.set_field("title", "Title is required");
        errors.set_submission("network down");
        assert_eq!(errors.to_string(), "title: Title is required; network down");
    }
}
