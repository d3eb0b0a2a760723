pub mod error;
pub mod types;

pub use error::{PortalError, Result};
pub use types::{Entity, EntityId, FieldValue, FileHandle, Record, now_millis};
