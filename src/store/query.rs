use crate::backend::EntityBackend;
use crate::category::CategoryRegistry;
use crate::core::{Entity, PortalError, Result};
use crate::schema::builtin::SEARCH_FIELDS;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Parameters of one page fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRequest {
    pub category: String,
    pub page: u32,
    pub page_size: u32,
    pub filter_type: Option<String>,
    pub search_query: String,
}

impl PageRequest {
    pub fn new(category: impl Into<String>, page_size: u32) -> Self {
        Self {
            category: category.into(),
            page: 1,
            page_size,
            filter_type: None,
            search_query: String::new(),
        }
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn filter_type(mut self, filter_type: impl Into<String>) -> Self {
        self.filter_type = Some(filter_type.into());
        self
    }

    pub fn search(mut self, query: impl Into<String>) -> Self {
        self.search_query = query.into();
        self
    }

    fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize).saturating_mul(self.page_size as usize)
    }
}

/// One page of results plus the size of the whole filtered set
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSlice {
    pub items: Vec<Entity>,
    pub total_items: usize,
}

/// Source of pages for the list controller
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageSlice>;
}

/// Case-insensitive substring match of `query` against the searchable
/// fields (`title` and the category's body fields). An empty or
/// whitespace-only query matches everything.
pub fn matches_query(entity: &Entity, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }

    SEARCH_FIELDS
        .iter()
        .filter_map(|field| entity.field_str(field))
        .any(|text| text.to_lowercase().contains(&needle))
}

/// Most-recent-first, searched and sliced view of a full collection
pub fn paginate(mut entities: Vec<Entity>, request: &PageRequest) -> PageSlice {
    entities.reverse();
    entities.retain(|entity| matches_query(entity, &request.search_query));

    let total_items = entities.len();
    let items = entities
        .into_iter()
        .skip(request.offset())
        .take(request.page_size as usize)
        .collect();

    PageSlice { items, total_items }
}

/// Reads the whole category from the backend and pages it client-side
pub struct BackendFetcher {
    backend: Arc<dyn EntityBackend>,
    registry: Arc<CategoryRegistry>,
}

impl BackendFetcher {
    pub fn new(backend: Arc<dyn EntityBackend>, registry: Arc<CategoryRegistry>) -> Self {
        Self { backend, registry }
    }
}

#[async_trait]
impl PageFetcher for BackendFetcher {
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageSlice> {
        if request.page == 0 || request.page_size == 0 {
            return Err(PortalError::fetch("page and page size must be at least 1"));
        }

        let binding = self
            .registry
            .resolve(&request.category)
            .map_err(|e| PortalError::fetch(e.message()))?;
        let type_filter = binding.effective_filter(request.filter_type.as_deref());

        let records = self
            .backend
            .read_collection(&binding.namespace, type_filter)
            .await
            .map_err(|e| PortalError::fetch(e.to_string()))?;

        let entities: Vec<Entity> = records
            .into_iter()
            .map(|record| Entity::from_stored(record.id, record.value))
            .collect();

        let slice = paginate(entities, request);
        debug!(
            namespace = %binding.namespace,
            page = request.page,
            returned = slice.items.len(),
            total = slice.total_items,
            "fetched page"
        );
        Ok(slice)
    }
}
