//! Category store
//!
//! Client-side cache of the current page of one category plus the status of
//! every operation that touches it. All backend failures stop here and are
//! turned into message strings; a failed operation never leaves a partial
//! mutation behind.

mod query;
mod state;

pub use query::{BackendFetcher, PageFetcher, PageRequest, PageSlice, matches_query, paginate};
pub use state::{
    FetchOutcome, FetchTicket, OperationState, OperationStatus, OperationTracker, PageState, StoreOp,
};

use crate::backend::EntityBackend;
use crate::category::{CategoryBinding, CategoryRegistry};
use crate::core::{Entity, EntityId, PortalError, Record, Result, now_millis};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Shared, single-writer handle to a store
pub type StoreHandle = Arc<Mutex<CategoryStore>>;

pub struct CategoryStore {
    category: String,
    backend: Arc<dyn EntityBackend>,
    registry: Arc<CategoryRegistry>,
    fetcher: Arc<dyn PageFetcher>,
    state: PageState,
    ops: OperationTracker,
    latest_seq: u64,
}

impl CategoryStore {
    pub fn new(
        category: impl Into<String>,
        page_size: u32,
        backend: Arc<dyn EntityBackend>,
        registry: Arc<CategoryRegistry>,
    ) -> Self {
        let fetcher = Arc::new(BackendFetcher::new(backend.clone(), registry.clone()));
        Self {
            category: category.into(),
            backend,
            registry,
            fetcher,
            state: PageState::new(page_size.max(1)),
            ops: OperationTracker::default(),
            latest_seq: 0,
        }
    }

    /// Replace the page source (the backend is still used for writes).
    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn into_handle(self) -> StoreHandle {
        Arc::new(Mutex::new(self))
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn state(&self) -> &PageState {
        &self.state
    }

    pub fn ops(&self) -> &OperationTracker {
        &self.ops
    }

    pub fn fetcher(&self) -> Arc<dyn PageFetcher> {
        self.fetcher.clone()
    }

    fn binding(&self) -> Result<&CategoryBinding> {
        self.registry.resolve(&self.category)
    }

    // ------------------------------------------------------------------
    // Query parameters
    // ------------------------------------------------------------------

    /// New type filter: back to page 1 with an empty search.
    pub fn set_filter_type(&mut self, filter_type: Option<String>) {
        self.state.filter_type = filter_type.filter(|t| !t.trim().is_empty());
        self.state.search_query.clear();
        self.state.current_page = 1;
    }

    /// New search query: back to page 1.
    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.state.search_query = query.into();
        self.state.current_page = 1;
    }

    pub fn set_page(&mut self, page: u32) {
        self.state.current_page = page.max(1);
    }

    pub fn current_request(&self) -> PageRequest {
        PageRequest {
            category: self.category.clone(),
            page: self.state.current_page,
            page_size: self.state.page_size,
            filter_type: self.state.filter_type.clone(),
            search_query: self.state.search_query.clone(),
        }
    }

    // ------------------------------------------------------------------
    // Fetch
    // ------------------------------------------------------------------

    /// Mark a fetch of the current parameters as in flight.
    ///
    /// Every ticket supersedes all earlier ones; only the latest ticket's
    /// reply is ever applied.
    pub fn begin_fetch(&mut self) -> FetchTicket {
        self.latest_seq += 1;
        self.state.status = OperationStatus::Loading;
        self.ops.fetch.begin();
        FetchTicket {
            seq: self.latest_seq,
            request: self.current_request(),
        }
    }

    /// Apply a resolved fetch if its ticket is still the latest.
    ///
    /// A failure keeps the previous items visible. A superseded reply,
    /// successful or not, changes nothing.
    pub fn finish_fetch(&mut self, ticket: FetchTicket, result: Result<PageSlice>) -> Result<FetchOutcome> {
        if ticket.seq != self.latest_seq {
            debug!(
                category = %self.category,
                stale = ticket.seq,
                latest = self.latest_seq,
                "discarding superseded fetch reply"
            );
            return Ok(FetchOutcome::Superseded);
        }

        match result {
            Ok(slice) => {
                self.state.items = slice.items;
                self.state.total_items = slice.total_items;
                self.state.status = OperationStatus::Succeeded;
                self.state.error = None;
                self.ops.fetch.succeed();
                Ok(FetchOutcome::Applied)
            }
            Err(err) => {
                let message = err.message();
                warn!(category = %self.category, error = %message, "fetch failed");
                self.state.status = OperationStatus::Failed;
                self.state.error = Some(message.clone());
                self.ops.fetch.fail(message.clone());
                Err(PortalError::Fetch(message))
            }
        }
    }

    /// Fetch `request` and apply it. Sets the store's query parameters
    /// to those of the request first.
    pub async fn fetch(&mut self, request: PageRequest) -> Result<PageSlice> {
        if request.page_size != self.state.page_size && request.page_size > 0 {
            self.state.page_size = request.page_size;
        }
        self.state.filter_type = request.filter_type.clone();
        self.state.search_query = request.search_query.clone();
        self.state.current_page = request.page.max(1);

        let ticket = self.begin_fetch();
        let result = self.fetcher.fetch_page(&ticket.request).await;
        self.finish_fetch(ticket, result.clone())?;
        result
    }

    /// Re-fetch the current page with the current parameters.
    pub async fn refresh(&mut self) -> Result<PageSlice> {
        let request = self.current_request();
        self.fetch(request).await
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    fn record_failure(&mut self, op: StoreOp, message: String) -> PortalError {
        warn!(category = %self.category, op = %op, error = %message, "store operation failed");
        self.ops.get_mut(op).fail(message.clone());
        self.state.error = Some(message.clone());
        PortalError::Submission(message)
    }

    /// Persist a new record stamped with `mainType` and `timestamp`.
    ///
    /// On success the entity is put at the front of the held page.
    pub async fn create(&mut self, mut record: Record) -> Result<Entity> {
        self.ops.create.begin();
        let binding = match self.binding() {
            Ok(binding) => binding.clone(),
            Err(err) => return Err(self.record_failure(StoreOp::Create, err.message())),
        };

        record.insert("mainType".to_string(), Value::String(binding.tag.clone()));
        record.insert("timestamp".to_string(), Value::from(now_millis()));
        if let Some(fixed) = &binding.fixed_type {
            record
                .entry("type".to_string())
                .or_insert_with(|| Value::String(fixed.clone()));
        }

        match self.backend.insert(&binding.namespace, record.clone()).await {
            Ok(id) => {
                let entity = Entity::from_stored(id, Value::Object(record));
                info!(category = %self.category, id = %entity.id, "created entity");
                self.state.items.insert(0, entity.clone());
                self.state.items.truncate(self.state.page_size as usize);
                self.state.total_items += 1;
                self.ops.create.succeed();
                Ok(entity)
            }
            Err(err) => Err(self.record_failure(StoreOp::Create, err.to_string())),
        }
    }

    /// Merge `partial` into an existing record, stamping `lastUpdated`.
    ///
    /// Fields absent from `partial` are left as they are. The held copy is
    /// replaced in place when present; otherwise the page is untouched.
    pub async fn update(&mut self, id: &EntityId, mut partial: Record) -> Result<Entity> {
        self.ops.update.begin();
        let binding = match self.binding() {
            Ok(binding) => binding.clone(),
            Err(err) => return Err(self.record_failure(StoreOp::Update, err.message())),
        };

        partial.remove("id");
        partial.remove("timestamp");
        partial.insert("mainType".to_string(), Value::String(binding.tag.clone()));
        partial.insert("lastUpdated".to_string(), Value::from(now_millis()));

        if let Err(err) = self.backend.merge_update(&binding.namespace, id, partial).await {
            return Err(self.record_failure(StoreOp::Update, err.to_string()));
        }

        let merged = match self.backend.read_record(&binding.namespace, id).await {
            Ok(Some(value)) => Entity::from_stored(id.clone(), value),
            Ok(None) => {
                let message = format!("record '{}' disappeared after update", id);
                return Err(self.record_failure(StoreOp::Update, message));
            }
            Err(err) => return Err(self.record_failure(StoreOp::Update, err.to_string())),
        };

        if let Some(slot) = self.state.items.iter_mut().find(|e| e.id == *id) {
            *slot = merged.clone();
        }
        info!(category = %self.category, id = %id, "updated entity");
        self.ops.update.succeed();
        Ok(merged)
    }

    /// Remove a record and drop it from the held page.
    pub async fn delete(&mut self, id: &EntityId) -> Result<EntityId> {
        self.ops.delete.begin();
        let binding = match self.binding() {
            Ok(binding) => binding.clone(),
            Err(err) => return Err(self.record_failure(StoreOp::Delete, err.message())),
        };

        if let Err(err) = self.backend.delete(&binding.namespace, id).await {
            return Err(self.record_failure(StoreOp::Delete, err.to_string()));
        }

        self.state.items.retain(|e| e.id != *id);
        self.state.total_items = self.state.total_items.saturating_sub(1);
        info!(category = %self.category, id = %id, "deleted entity");
        self.ops.delete.succeed();
        Ok(id.clone())
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Clear the error banner and return failed operations to Idle.
    pub fn dismiss_error(&mut self) {
        self.state.error = None;
        if self.state.status == OperationStatus::Failed {
            self.state.status = OperationStatus::Idle;
        }
        self.ops.reset_failed();
    }

    /// Forget everything held (logout). In-flight fetches become stale.
    pub fn reset(&mut self) {
        self.state = PageState::new(self.state.page_size);
        self.ops = OperationTracker::default();
        self.latest_seq += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn poem_store(backend: Arc<InMemoryBackend>) -> CategoryStore {
        CategoryStore::new("Poem", 10, backend, Arc::new(CategoryRegistry::default()))
    }

    fn seeded(count: usize) -> Arc<InMemoryBackend> {
        let mut backend = InMemoryBackend::new();
        for i in 0..count {
            backend = backend.with_record(
                "PoemData",
                format!("p{i:02}"),
                json!({"title": format!("Poem {i}"), "mainType": "POEM", "type": "haiku"}),
            );
        }
        Arc::new(backend)
    }

    #[tokio::test]
    async fn test_fetch_populates_page_state() {
        let mut store = poem_store(seeded(25));
        let slice = store.fetch(PageRequest::new("Poem", 10).page(3)).await.unwrap();

        assert_eq!(slice.items.len(), 5);
        assert_eq!(store.state().items.len(), 5);
        assert_eq!(store.state().total_items, 25);
        assert_eq!(store.state().current_page, 3);
        assert_eq!(store.state().status, OperationStatus::Succeeded);
        assert_eq!(store.state().items[0].id.as_str(), "p04");
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_items() {
        let backend = seeded(3);
        let mut store = poem_store(backend.clone());
        store.refresh().await.unwrap();

        backend.set_unavailable(true);
        let err = store.refresh().await.unwrap_err();
        assert!(matches!(err, PortalError::Fetch(_)));
        assert_eq!(store.state().status, OperationStatus::Failed);
        assert!(store.state().error.is_some());
        assert_eq!(store.state().items.len(), 3);
        assert_eq!(store.state().total_items, 3);

        store.dismiss_error();
        assert_eq!(store.state().status, OperationStatus::Idle);
        assert_eq!(store.ops().fetch.status, OperationStatus::Idle);
    }

    #[tokio::test]
    async fn test_stale_ticket_is_discarded() {
        let mut store = poem_store(seeded(0));
        store.set_page(1);
        let first = store.begin_fetch();
        store.set_page(2);
        let second = store.begin_fetch();

        let newer = PageSlice {
            items: vec![Entity::from_stored("two", json!({}))],
            total_items: 11,
        };
        let older = PageSlice {
            items: vec![Entity::from_stored("one", json!({}))],
            total_items: 11,
        };

        assert_eq!(store.finish_fetch(second, Ok(newer)).unwrap(), FetchOutcome::Applied);
        assert_eq!(store.finish_fetch(first, Ok(older)).unwrap(), FetchOutcome::Superseded);
        assert_eq!(store.state().current_page, 2);
        assert_eq!(store.state().items[0].id.as_str(), "two");

        // A stale failure must not flip the status either.
        let stale = FetchTicket { seq: 1, request: store.current_request() };
        let outcome = store.finish_fetch(stale, Err(PortalError::fetch("late timeout"))).unwrap();
        assert_eq!(outcome, FetchOutcome::Superseded);
        assert_eq!(store.state().status, OperationStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_create_stamps_and_prepends() {
        let backend = seeded(10);
        let mut store = poem_store(backend.clone());
        store.refresh().await.unwrap();

        let created = store
            .create(record(json!({"title": "Fresh", "poem": "new words"})))
            .await
            .unwrap();

        assert_eq!(created.main_type, "POEM");
        assert!(created.timestamp > 0);
        assert_eq!(store.state().items[0].id, created.id);
        assert_eq!(store.state().items.len(), 10);
        assert_eq!(store.state().total_items, 11);
        assert_eq!(backend.len("PoemData").await, 11);
        assert_eq!(store.ops().create.status, OperationStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_create_then_fetch_puts_new_item_first() {
        let mut store = poem_store(seeded(12));
        let created = store.create(record(json!({"title": "Newest"}))).await.unwrap();

        store.refresh().await.unwrap();
        assert_eq!(store.state().items[0].id, created.id);
        assert_eq!(store.state().total_items, 13);
    }

    #[tokio::test]
    async fn test_create_sets_fixed_type_for_shared_namespace() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut store = CategoryStore::new("Novel", 10, backend.clone(), Arc::new(CategoryRegistry::default()));
        let created = store.create(record(json!({"title": "Long one"}))).await.unwrap();

        assert_eq!(created.entity_type(), Some("novel"));
        assert_eq!(created.main_type, "NOVEL");
        assert_eq!(backend.len("StoryNovelsData").await, 1);
    }

    #[tokio::test]
    async fn test_update_merges_and_replaces_in_place() {
        let backend = seeded(3);
        let mut store = poem_store(backend.clone());
        store.refresh().await.unwrap();
        let id = EntityId::from("p01");

        let merged = store.update(&id, record(json!({"title": "Renamed"}))).await.unwrap();
        assert_eq!(merged.title(), Some("Renamed"));
        assert_eq!(merged.entity_type(), Some("haiku"));
        assert!(merged.last_updated.is_some());

        let held = store.state().items.iter().find(|e| e.id == id).unwrap();
        assert_eq!(held.title(), Some("Renamed"));
        assert_eq!(store.state().total_items, 3);
    }

    #[tokio::test]
    async fn test_update_of_unheld_entity_leaves_page_alone() {
        let backend = seeded(15);
        let mut store = poem_store(backend);
        store.refresh().await.unwrap();
        let before = store.state().items.clone();

        // p00 is the oldest record, so it sits on page 2
        store
            .update(&EntityId::from("p00"), record(json!({"title": "Edited"})))
            .await
            .unwrap();
        assert_eq!(store.state().items, before);
    }

    #[tokio::test]
    async fn test_delete_removes_and_decrements() {
        let mut store = poem_store(seeded(4));
        store.refresh().await.unwrap();

        let deleted = store.delete(&EntityId::from("p02")).await.unwrap();
        assert_eq!(deleted.as_str(), "p02");
        assert_eq!(store.state().items.len(), 3);
        assert_eq!(store.state().total_items, 3);
        assert!(store.state().items.iter().all(|e| e.id.as_str() != "p02"));
    }

    #[tokio::test]
    async fn test_delete_missing_id_fails_without_mutation() {
        let mut store = poem_store(seeded(4));
        store.refresh().await.unwrap();
        let before = store.state().clone();

        let err = store.delete(&EntityId::from("ghost")).await.unwrap_err();
        assert!(matches!(err, PortalError::Submission(_)));
        assert_eq!(store.state().items, before.items);
        assert_eq!(store.state().total_items, before.total_items);
        assert_eq!(store.ops().delete.status, OperationStatus::Failed);
        assert!(store.state().error.as_deref().unwrap().contains("ghost"));
    }

    #[tokio::test]
    async fn test_strict_registry_rejects_writes_for_unknown_category() {
        let backend = Arc::new(InMemoryBackend::new());
        let mut store = CategoryStore::new("Limerick", 10, backend.clone(), Arc::new(CategoryRegistry::strict()));

        let err = store.create(record(json!({"title": "x"}))).await.unwrap_err();
        assert!(err.message().contains("Limerick"));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_reset_clears_held_page() {
        let mut store = poem_store(seeded(2));
        store.refresh().await.unwrap();
        let in_flight = store.begin_fetch();

        store.reset();
        assert!(store.state().items.is_empty());
        assert_eq!(store.state().status, OperationStatus::Idle);
        let late = PageSlice { items: vec![], total_items: 99 };
        assert_eq!(store.finish_fetch(in_flight, Ok(late)).unwrap(), FetchOutcome::Superseded);
        assert_eq!(store.state().total_items, 0);
    }

    #[tokio::test]
    async fn test_backend_outage_leaves_page_untouched_on_create_and_update() {
        let backend = seeded(3);
        let mut store = poem_store(backend.clone());
        store.refresh().await.unwrap();
        let before = store.state().clone();
        backend.set_unavailable(true);

        let err = store.create(record(json!({"title": "Lost"}))).await.unwrap_err();
        assert!(matches!(err, PortalError::Submission(_)));
        assert_eq!(store.ops().create.status, OperationStatus::Failed);

        let err = store
            .update(&EntityId::from("p02"), record(json!({"title": "Also lost"})))
            .await
            .unwrap_err();
        assert!(matches!(err, PortalError::Submission(_)));
        assert_eq!(store.ops().update.status, OperationStatus::Failed);

        assert_eq!(store.state().items, before.items);
        assert_eq!(store.state().total_items, before.total_items);
        assert_eq!(store.state().current_page, before.current_page);
        assert_eq!(store.state().status, OperationStatus::Succeeded);
        assert_eq!(store.ops().fetch.status, OperationStatus::Succeeded);
        assert_eq!(store.ops().delete.status, OperationStatus::Idle);
        assert!(store.state().error.is_some());

        backend.set_unavailable(false);
        assert_eq!(backend.len("PoemData").await, 3);
        let stored = backend.read_record("PoemData", &EntityId::from("p02")).await.unwrap().unwrap();
        assert_eq!(stored["title"], json!("Poem 2"));
    }
}
