// ============================================================================
// Quillboard Library
// ============================================================================

pub mod backend;
pub mod category;
pub mod config;
pub mod core;
pub mod dashboard;
pub mod form;
pub mod list;
pub mod schema;
pub mod session;
pub mod store;

// Re-export main types for convenience
pub use crate::core::{Entity, EntityId, FieldValue, FileHandle, PortalError, Record, Result};
pub use crate::config::{BackendKind, PortalConfig};
pub use crate::session::PortalSession;

pub use backend::{BackendError, EntityBackend, InMemoryBackend, RestBackend, StoredRecord};
pub use category::{CategoryBinding, CategoryFallback, CategoryRegistry};
pub use dashboard::{DashboardAggregator, DashboardSummary, Emotion};
pub use form::{DraftRecord, FormController, FormMode, StoreSubmitHandler, SubmitHandler, ValidationErrors};
pub use list::{DeleteConfirmation, ListController};
pub use schema::{ChoiceOption, FieldDescriptor, FieldGroup, FieldKind, Schema};
pub use store::{
    CategoryStore, OperationStatus, PageFetcher, PageRequest, PageSlice, PageState, StoreHandle,
};
