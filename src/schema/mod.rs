//! Field schemas
//!
//! A [`Schema`] is the declarative shape of one content category: an ordered
//! list of field groups, each holding typed [`FieldDescriptor`]s. Schemas are
//! validated once when they are built or loaded, so the form controller can
//! trust names are unique and choice fields have options.

pub mod builtin;

use crate::core::{FieldValue, PortalError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

pub use builtin::builtin_schema;

lazy_static! {
    static ref FIELD_NAME: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("valid field name pattern");
}

/// One selectable option of a choice field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub label: String,
    pub value: String,
}

impl ChoiceOption {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

/// Input kind with its per-kind payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FieldKind {
    Text,
    LongText,
    RichText,
    Choice {
        options: Vec<ChoiceOption>,
    },
    File {
        /// Accepted MIME patterns, e.g. `image/*`. Empty accepts anything.
        #[serde(default)]
        accept: Vec<String>,
    },
}

impl FieldKind {
    pub fn choice<I, L, V>(options: I) -> Self
    where
        I: IntoIterator<Item = (L, V)>,
        L: Into<String>,
        V: Into<String>,
    {
        FieldKind::Choice {
            options: options
                .into_iter()
                .map(|(label, value)| ChoiceOption::new(label, value))
                .collect(),
        }
    }

    pub fn image() -> Self {
        FieldKind::File {
            accept: vec!["image/*".to_string()],
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, FieldKind::File { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::Text => "text",
            FieldKind::LongText => "longText",
            FieldKind::RichText => "richText",
            FieldKind::Choice { .. } => "choice",
            FieldKind::File { .. } => "file",
        }
    }
}

/// Immutable description of one editable field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub label: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            kind,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn options(&self) -> &[ChoiceOption] {
        match &self.kind {
            FieldKind::Choice { options } => options,
            _ => &[],
        }
    }

    /// Kind-specific check of a non-empty value. Empty values are the
    /// caller's concern (required-ness is decided by the form).
    pub fn check_value(&self, value: &FieldValue) -> std::result::Result<(), String> {
        if value.is_empty() {
            return Ok(());
        }

        match (&self.kind, value) {
            (FieldKind::Choice { options }, _) => {
                if options.iter().any(|o| o.value == value.as_str()) {
                    Ok(())
                } else {
                    Err(format!("{} must be one of the listed options", self.label))
                }
            }
            (FieldKind::File { .. }, _) => Ok(()),
            (_, FieldValue::File(_)) => Err(format!("{} does not accept a file", self.label)),
            _ => Ok(()),
        }
    }
}

/// Visual grouping of fields; order inside a group is render order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldGroup {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub fields: Vec<FieldDescriptor>,
}

impl FieldGroup {
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self { title: None, fields }
    }

    pub fn titled(title: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            title: Some(title.into()),
            fields,
        }
    }
}

#[derive(Deserialize)]
struct SchemaDef {
    category: String,
    groups: Vec<FieldGroup>,
}

impl TryFrom<SchemaDef> for Schema {
    type Error = PortalError;

    fn try_from(def: SchemaDef) -> Result<Self> {
        Schema::new(def.category, def.groups)
    }
}

/// Validated, ordered field layout of one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SchemaDef")]
pub struct Schema {
    category: String,
    groups: Vec<FieldGroup>,
}

impl Schema {
    pub fn new(category: impl Into<String>, groups: Vec<FieldGroup>) -> Result<Self> {
        let schema = Self {
            category: category.into(),
            groups,
        };
        schema.validate()?;
        Ok(schema)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| PortalError::schema(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| PortalError::Internal(e.to_string()))
    }

    fn validate(&self) -> Result<()> {
        if self.category.trim().is_empty() {
            return Err(PortalError::schema("category name cannot be empty"));
        }

        let mut seen = HashSet::new();
        for field in self.fields() {
            if !FIELD_NAME.is_match(&field.name) {
                return Err(PortalError::schema(format!(
                    "invalid field name '{}' in {} schema",
                    field.name, self.category
                )));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(PortalError::schema(format!(
                    "duplicate field '{}' in {} schema",
                    field.name, self.category
                )));
            }
            if field.label.trim().is_empty() {
                return Err(PortalError::schema(format!("field '{}' has no label", field.name)));
            }
            if let FieldKind::Choice { options } = &field.kind {
                if options.is_empty() {
                    return Err(PortalError::schema(format!(
                        "choice field '{}' has no options",
                        field.name
                    )));
                }
                let mut values = HashSet::new();
                for option in options {
                    if !values.insert(option.value.as_str()) {
                        return Err(PortalError::schema(format!(
                            "choice field '{}' repeats option '{}'",
                            field.name, option.value
                        )));
                    }
                }
            }
        }

        if seen.is_empty() {
            return Err(PortalError::schema(format!("{} schema has no fields", self.category)));
        }

        Ok(())
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn groups(&self) -> &[FieldGroup] {
        &self.groups
    }

    /// All fields in render order, flattened across groups
    pub fn fields(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.groups.iter().flat_map(|g| g.fields.iter())
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields().map(|f| f.name.as_str())
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields().filter(|f| f.required).map(|f| f.name.as_str())
    }
}
