//! Schema-driven form controller
//!
//! Holds the draft values and validation state of one form. The controller
//! never talks to storage: on a valid submit it hands the draft to a
//! [`SubmitHandler`], which is usually a [`StoreSubmitHandler`] bound to the
//! category store.

mod handler;
mod validation;

pub use handler::StoreSubmitHandler;
pub use validation::{DraftRecord, ValidationErrors};

use crate::core::{Entity, EntityId, FieldValue, PortalError, Result};
use crate::schema::Schema;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Whether a submit creates a new record or edits an existing one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormMode {
    Add,
    Edit(EntityId),
}

impl FormMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormMode::Add => "add",
            FormMode::Edit(_) => "edit",
        }
    }
}

impl fmt::Display for FormMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Callback invoked with a validated draft
#[async_trait]
pub trait SubmitHandler: Send + Sync {
    async fn submit(&self, draft: &DraftRecord, mode: &FormMode) -> Result<()>;
}

pub struct FormController {
    schema: Arc<Schema>,
    handler: Arc<dyn SubmitHandler>,
    required: BTreeSet<String>,
    editing: Option<Entity>,
    draft: DraftRecord,
    errors: ValidationErrors,
}

impl FormController {
    /// New form in "add" mode; required fields come from the schema.
    pub fn new(schema: Arc<Schema>, handler: Arc<dyn SubmitHandler>) -> Self {
        let required = schema.required_fields().map(str::to_string).collect();
        let draft = DraftRecord::empty_for(&schema);
        Self {
            schema,
            handler,
            required,
            editing: None,
            draft,
            errors: ValidationErrors::new(),
        }
    }

    /// Form seeded from an existing entity ("edit" mode)
    pub fn editing(schema: Arc<Schema>, handler: Arc<dyn SubmitHandler>, entity: Entity) -> Self {
        let mut form = Self::new(schema, handler);
        form.load_entity(entity);
        form
    }

    /// Replace the required set. Every name must be a schema field.
    pub fn with_required<I, S>(mut self, names: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut required = BTreeSet::new();
        for name in names {
            let name = name.into();
            if self.schema.field(&name).is_none() {
                return Err(PortalError::schema(format!(
                    "required field '{}' is not part of the {} schema",
                    name,
                    self.schema.category()
                )));
            }
            required.insert(name);
        }
        self.required = required;
        Ok(self)
    }

    /// Switch to editing `entity`. The draft is replaced, never merged.
    pub fn load_entity(&mut self, entity: Entity) {
        debug!(id = %entity.id, category = self.schema.category(), "form editing entity");
        self.draft = DraftRecord::from_entity(&self.schema, &entity);
        self.errors = ValidationErrors::new();
        self.editing = Some(entity);
    }

    /// Discard the draft and return to an empty "add" form.
    pub fn cancel(&mut self) {
        self.reset();
    }

    fn reset(&mut self) {
        self.draft = DraftRecord::empty_for(&self.schema);
        self.errors = ValidationErrors::new();
        self.editing = None;
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn draft(&self) -> &DraftRecord {
        &self.draft
    }

    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    pub fn editing_entity(&self) -> Option<&Entity> {
        self.editing.as_ref()
    }

    pub fn mode(&self) -> FormMode {
        match &self.editing {
            Some(entity) => FormMode::Edit(entity.id.clone()),
            None => FormMode::Add,
        }
    }

    pub fn is_required(&self, name: &str) -> bool {
        self.required.contains(name)
    }

    pub fn dismiss_submission_error(&mut self) {
        self.errors.clear_submission();
    }

    /// Update one field and re-validate only that field.
    pub fn set_field(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<()> {
        if self.schema.field(name).is_none() {
            return Err(PortalError::schema(format!(
                "unknown field '{}' for {}",
                name,
                self.schema.category()
            )));
        }

        let value = value.into();
        match self.violation(name, &value) {
            Some(message) => self.errors.set_field(name, message),
            None => self.errors.clear_field(name),
        }
        self.draft.set(name, value);
        Ok(())
    }

    fn violation(&self, name: &str, value: &FieldValue) -> Option<String> {
        let field = self.schema.field(name)?;
        if value.is_empty() {
            return self
                .required
                .contains(name)
                .then(|| format!("{} is required", field.label));
        }
        field.check_value(value).err()
    }

    fn revalidate_all(&mut self) {
        self.errors.clear_fields();
        let violations: Vec<(String, String)> = self
            .schema
            .fields()
            .filter_map(|field| {
                let value = self.draft.get(&field.name).cloned().unwrap_or_default();
                self.violation(&field.name, &value)
                    .map(|message| (field.name.clone(), message))
            })
            .collect();
        for (name, message) in violations {
            self.errors.set_field(&name, message);
        }
    }

    /// Validate every field and, when clean, hand the draft to the handler.
    ///
    /// Returns the mode that was submitted. On handler failure the draft is
    /// kept so the user can retry, and the message is recorded as the
    /// submission error.
    pub async fn submit(&mut self) -> Result<FormMode> {
        self.revalidate_all();
        if self.errors.has_field_errors() {
            debug!(
                category = self.schema.category(),
                violations = self.errors.field_count(),
                "submit blocked by validation"
            );
            return Err(PortalError::Validation(self.errors.clone()));
        }

        let mode = self.mode();
        match self.handler.submit(&self.draft, &mode).await {
            Ok(()) => {
                debug!(category = self.schema.category(), mode = %mode, "form submitted");
                self.reset();
                Ok(mode)
            }
            Err(err) => {
                let message = err.message();
                warn!(category = self.schema.category(), mode = %mode, error = %message, "submit failed");
                self.errors.set_submission(message.clone());
                Err(PortalError::Submission(message))
            }
        }
    }
}
