//! Entity backend
//!
//! The only seam between the portal core and the document database. The
//! store and dashboard call these operations and convert every
//! [`BackendError`] into a message string before it leaves them.

mod error;
mod memory;
mod rest;

pub use error::{BackendError, BackendResult};
pub use memory::InMemoryBackend;
pub use rest::RestBackend;

use crate::core::{EntityId, Record};
use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value;
use std::collections::HashMap;

/// One record as read from a namespace, in storage order
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    pub id: EntityId,
    pub value: Value,
}

impl StoredRecord {
    pub fn new(id: impl Into<EntityId>, value: Value) -> Self {
        Self { id: id.into(), value }
    }

    /// The record's `type` attribute, if it is a string
    pub fn type_value(&self) -> Option<&str> {
        self.value.get("type").and_then(Value::as_str)
    }
}

#[async_trait]
pub trait EntityBackend: Send + Sync {
    /// All records of a namespace, oldest first. With a filter, only
    /// records whose `type` equals it exactly. Missing namespaces read
    /// as empty.
    async fn read_collection(
        &self,
        namespace: &str,
        type_filter: Option<&str>,
    ) -> BackendResult<Vec<StoredRecord>>;

    /// The namespace's raw JSON tree, `None` when nothing is stored.
    async fn read_raw(&self, namespace: &str) -> BackendResult<Option<Value>>;

    async fn read_record(&self, namespace: &str, id: &EntityId) -> BackendResult<Option<Value>>;

    /// Persist a new record and return its generated identifier.
    async fn insert(&self, namespace: &str, record: Record) -> BackendResult<EntityId>;

    /// Shallow-merge `partial` into an existing record.
    async fn merge_update(&self, namespace: &str, id: &EntityId, partial: Record) -> BackendResult<()>;

    /// Remove a record; fails with `NotFound` when the id is absent.
    async fn delete(&self, namespace: &str, id: &EntityId) -> BackendResult<()>;

    /// Read several namespaces in parallel. Fails as a whole if any read fails.
    async fn read_multiple(&self, namespaces: &[&str]) -> BackendResult<HashMap<String, Option<Value>>> {
        let reads = namespaces.iter().map(|namespace| async move {
            let value = self.read_raw(namespace).await?;
            Ok::<_, BackendError>((namespace.to_string(), value))
        });
        Ok(try_join_all(reads).await?.into_iter().collect())
    }
}
