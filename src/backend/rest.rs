use super::{BackendError, BackendResult, EntityBackend, StoredRecord};
use crate::core::{EntityId, Record};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Client for a hosted JSON document database exposing the
/// `/{path}.json` REST dialect (GET / POST / PATCH / DELETE).
#[derive(Debug, Clone)]
pub struct RestBackend {
    client: Client,
    base_url: String,
    auth_token: Option<String>,
}

#[derive(Deserialize)]
struct PushResponse {
    name: String,
}

impl RestBackend {
    pub fn new(base_url: &str, auth_token: Option<String>, timeout: Duration) -> BackendResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_token,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, segments: &[&str]) -> String {
        format!("{}/{}.json", self.base_url, segments.join("/"))
    }

    fn query(&self, type_filter: Option<&str>) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(token) = &self.auth_token {
            params.push(("auth", token.clone()));
        }
        if let Some(wanted) = type_filter {
            // The REST dialect expects JSON-quoted keys and values.
            params.push(("orderBy", Value::from("type").to_string()));
            params.push(("equalTo", Value::from(wanted).to_string()));
        }
        params
    }

    async fn send(&self, request: RequestBuilder) -> BackendResult<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::Status {
            status: status.as_u16(),
            body,
        })
    }

    async fn get_json(&self, segments: &[&str], type_filter: Option<&str>) -> BackendResult<Value> {
        let url = self.url(segments);
        debug!(url = %url, filter = ?type_filter, "GET");
        let response = self
            .send(self.client.get(&url).query(&self.query(type_filter)))
            .await?;
        Ok(response.json::<Value>().await?)
    }

    async fn require_record(&self, namespace: &str, id: &EntityId) -> BackendResult<()> {
        match self.read_record(namespace, id).await? {
            Some(_) => Ok(()),
            None => Err(BackendError::not_found(namespace, id)),
        }
    }
}

/// Flatten a namespace tree into records, oldest first.
///
/// Push keys sort chronologically, so object key order is creation order.
/// Dense integer keys come back as a JSON array with `null` holes.
fn records_from_tree(tree: Value) -> Vec<StoredRecord> {
    match tree {
        Value::Object(map) => map
            .into_iter()
            .map(|(id, value)| StoredRecord::new(id, value))
            .collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter(|(_, value)| !value.is_null())
            .map(|(index, value)| StoredRecord::new(index.to_string(), value))
            .collect(),
        _ => Vec::new(),
    }
}

#[async_trait]
impl EntityBackend for RestBackend {
    async fn read_collection(
        &self,
        namespace: &str,
        type_filter: Option<&str>,
    ) -> BackendResult<Vec<StoredRecord>> {
        let tree = self.get_json(&[namespace], type_filter).await?;
        Ok(records_from_tree(tree))
    }

    async fn read_raw(&self, namespace: &str) -> BackendResult<Option<Value>> {
        let tree = self.get_json(&[namespace], None).await?;
        Ok((!tree.is_null()).then_some(tree))
    }

    async fn read_record(&self, namespace: &str, id: &EntityId) -> BackendResult<Option<Value>> {
        let value = self.get_json(&[namespace, id.as_str()], None).await?;
        Ok((!value.is_null()).then_some(value))
    }

    async fn insert(&self, namespace: &str, record: Record) -> BackendResult<EntityId> {
        let url = self.url(&[namespace]);
        debug!(url = %url, "POST");
        let response = self
            .send(self.client.post(&url).query(&self.query(None)).json(&record))
            .await?;
        let pushed: PushResponse = response.json().await?;
        Ok(EntityId::new(pushed.name))
    }

    async fn merge_update(&self, namespace: &str, id: &EntityId, partial: Record) -> BackendResult<()> {
        // PATCH on a missing path would create it; updates must target existing records.
        self.require_record(namespace, id).await?;
        let url = self.url(&[namespace, id.as_str()]);
        debug!(url = %url, "PATCH");
        self.send(self.client.patch(&url).query(&self.query(None)).json(&partial))
            .await?;
        Ok(())
    }

    async fn delete(&self, namespace: &str, id: &EntityId) -> BackendResult<()> {
        self.require_record(namespace, id).await?;
        let url = self.url(&[namespace, id.as_str()]);
        debug!(url = %url, "DELETE");
        self.send(self.client.delete(&url).query(&self.query(None)))
            .await?;
        Ok(())
    }
}
