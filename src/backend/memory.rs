use super::{BackendError, BackendResult, EntityBackend, StoredRecord};
use crate::core::{EntityId, Record};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

type Namespace = Vec<(EntityId, Value)>;

/// Process-local document store.
///
/// Each namespace keeps insertion order, so reads come back oldest first
/// the way push-keyed hosted databases return them.
pub struct InMemoryBackend {
    namespaces: RwLock<HashMap<String, Namespace>>,
    unavailable: AtomicBool,
    calls: AtomicU64,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            namespaces: RwLock::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
            calls: AtomicU64::new(0),
        }
    }

    /// Builder-style seeding for tests and demo data
    pub fn with_record(mut self, namespace: &str, id: impl Into<EntityId>, value: Value) -> Self {
        self.namespaces
            .get_mut()
            .entry(namespace.to_string())
            .or_default()
            .push((id.into(), value));
        self
    }

    /// Store `value` under `id`, replacing any existing record.
    pub async fn put(&self, namespace: &str, id: impl Into<EntityId>, value: Value) {
        let id = id.into();
        let mut namespaces = self.namespaces.write().await;
        let entries = namespaces.entry(namespace.to_string()).or_default();
        match entries.iter_mut().find(|(existing, _)| *existing == id) {
            Some((_, slot)) => *slot = value,
            None => entries.push((id, value)),
        }
    }

    /// While set, every operation fails with `BackendError::Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of backend operations served (including failed ones)
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    pub async fn len(&self, namespace: &str) -> usize {
        self.namespaces
            .read()
            .await
            .get(namespace)
            .map(Vec::len)
            .unwrap_or(0)
    }

    fn enter(&self, op: &str, namespace: &str) -> BackendResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        debug!(op, namespace, "in-memory backend call");
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable(format!("{} on {} refused", op, namespace)));
        }
        Ok(())
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityBackend for InMemoryBackend {
    async fn read_collection(
        &self,
        namespace: &str,
        type_filter: Option<&str>,
    ) -> BackendResult<Vec<StoredRecord>> {
        self.enter("read_collection", namespace)?;
        let namespaces = self.namespaces.read().await;
        let Some(entries) = namespaces.get(namespace) else {
            return Ok(Vec::new());
        };

        Ok(entries
            .iter()
            .map(|(id, value)| StoredRecord::new(id.clone(), value.clone()))
            .filter(|record| match type_filter {
                Some(wanted) => record.type_value() == Some(wanted),
                None => true,
            })
            .collect())
    }

    async fn read_raw(&self, namespace: &str) -> BackendResult<Option<Value>> {
        self.enter("read_raw", namespace)?;
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .get(namespace)
            .filter(|entries| !entries.is_empty())
            .map(|entries| {
                let tree: Map<String, Value> = entries
                    .iter()
                    .map(|(id, value)| (id.to_string(), value.clone()))
                    .collect();
                Value::Object(tree)
            }))
    }

    async fn read_record(&self, namespace: &str, id: &EntityId) -> BackendResult<Option<Value>> {
        self.enter("read_record", namespace)?;
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .get(namespace)
            .and_then(|entries| entries.iter().find(|(existing, _)| existing == id))
            .map(|(_, value)| value.clone()))
    }

    async fn insert(&self, namespace: &str, record: Record) -> BackendResult<EntityId> {
        self.enter("insert", namespace)?;
        let id = EntityId::new(Uuid::new_v4().to_string());
        let mut namespaces = self.namespaces.write().await;
        namespaces
            .entry(namespace.to_string())
            .or_default()
            .push((id.clone(), Value::Object(record)));
        Ok(id)
    }

    async fn merge_update(&self, namespace: &str, id: &EntityId, partial: Record) -> BackendResult<()> {
        self.enter("merge_update", namespace)?;
        let mut namespaces = self.namespaces.write().await;
        let slot = namespaces
            .get_mut(namespace)
            .and_then(|entries| entries.iter_mut().find(|(existing, _)| existing == id))
            .map(|(_, value)| value)
            .ok_or_else(|| BackendError::not_found(namespace, id))?;

        match slot {
            Value::Object(existing) => {
                for (key, value) in partial {
                    existing.insert(key, value);
                }
            }
            other => *other = Value::Object(partial),
        }
        Ok(())
    }

    async fn delete(&self, namespace: &str, id: &EntityId) -> BackendResult<()> {
        self.enter("delete", namespace)?;
        let mut namespaces = self.namespaces.write().await;
        let entries = namespaces
            .get_mut(namespace)
            .ok_or_else(|| BackendError::not_found(namespace, id))?;
        let position = entries
            .iter()
            .position(|(existing, _)| existing == id)
            .ok_or_else(|| BackendError::not_found(namespace, id))?;
        entries.remove(position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_insert_then_read_keeps_insertion_order() {
        let backend = InMemoryBackend::new();
        let first = backend.insert("PoemData", record(json!({"title": "a"}))).await.unwrap();
        let second = backend.insert("PoemData", record(json!({"title": "b"}))).await.unwrap();

        let records = backend.read_collection("PoemData", None).await.unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[tokio::test]
    async fn test_type_filter_is_exact() {
        let backend = InMemoryBackend::new()
            .with_record("StoryNovelsData", "s1", json!({"type": "stories"}))
            .with_record("StoryNovelsData", "n1", json!({"type": "novel"}))
            .with_record("StoryNovelsData", "n2", json!({"type": "Novel"}));

        let novels = backend.read_collection("StoryNovelsData", Some("novel")).await.unwrap();
        assert_eq!(novels.len(), 1);
        assert_eq!(novels[0].id.as_str(), "n1");
        assert!(backend.read_collection("Missing", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_merge_update_leaves_absent_fields() {
        let backend = InMemoryBackend::new().with_record("PoemData", "p1", json!({"title": "a", "poem": "x"}));
        let id = EntityId::from("p1");

        backend
            .merge_update("PoemData", &id, record(json!({"title": "b"})))
            .await
            .unwrap();

        let value = backend.read_record("PoemData", &id).await.unwrap().unwrap();
        assert_eq!(value, json!({"title": "b", "poem": "x"}));
    }

    #[tokio::test]
    async fn test_missing_ids_report_not_found() {
        let backend = InMemoryBackend::new();
        let id = EntityId::from("ghost");
        assert!(backend.delete("PoemData", &id).await.unwrap_err().is_not_found());
        assert!(
            backend
                .merge_update("PoemData", &id, Record::new())
                .await
                .unwrap_err()
                .is_not_found()
        );
    }

    #[tokio::test]
    async fn test_read_multiple_and_outage() {
        let backend = InMemoryBackend::new().with_record("Users", "u1", json!({"name": "Ada"}));

        let raw = backend.read_multiple(&["Users", "PoemData"]).await.unwrap();
        assert_eq!(raw["Users"], Some(json!({"u1": {"name": "Ada"}})));
        assert_eq!(raw["PoemData"], None);

        backend.set_unavailable(true);
        assert!(matches!(
            backend.read_multiple(&["Users"]).await,
            Err(BackendError::Unavailable(_))
        ));
    }
}
