//! List / search / paginate controller
//!
//! Drives a [`CategoryStore`](crate::store::CategoryStore) from user
//! actions. For page fetches the store lock is held only while parameters
//! change and while a reply is applied, not across the network call, so
//! overlapping fetches are possible and the store's fetch tickets make sure
//! the latest request wins. Writes (`edit`, `confirm_delete`) hold the lock
//! for the whole backend call.

use crate::core::{Entity, EntityId, Record, Result};
use crate::store::{CategoryStore, FetchOutcome, PageFetcher, PageState, StoreHandle};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Proof that the user confirmed a deletion. Only
/// [`ListController::request_delete`] creates one.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a deletion only happens once the confirmation is passed to confirm_delete"]
pub struct DeleteConfirmation {
    id: EntityId,
}

impl DeleteConfirmation {
    pub fn id(&self) -> &EntityId {
        &self.id
    }
}

pub struct ListController {
    store: StoreHandle,
    fetcher: Arc<dyn PageFetcher>,
}

impl ListController {
    pub fn new(store: StoreHandle, fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { store, fetcher }
    }

    /// Controller using the store's own page source
    pub async fn for_store(store: StoreHandle) -> Self {
        let fetcher = store.lock().await.fetcher();
        Self::new(store, fetcher)
    }

    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    /// Copy of the current page state for rendering
    pub async fn snapshot(&self) -> PageState {
        self.store.lock().await.state().clone()
    }

    /// Change parameters (unless `update` declines) and fetch.
    ///
    /// Returns `Ok(false)` when nothing was requested.
    async fn run<F>(&self, update: F) -> Result<bool>
    where
        F: FnOnce(&mut CategoryStore) -> bool,
    {
        let ticket = {
            let mut store = self.store.lock().await;
            if !update(&mut store) {
                return Ok(false);
            }
            store.begin_fetch()
        };

        let result = self.fetcher.fetch_page(&ticket.request).await;

        let mut store = self.store.lock().await;
        if store.finish_fetch(ticket, result)? == FetchOutcome::Superseded {
            debug!(category = store.category(), "reply superseded by a newer request");
        }
        Ok(true)
    }

    pub async fn refresh(&self) -> Result<()> {
        self.run(|_| true).await.map(|_| ())
    }

    /// Filter by exact type (or clear with `None`); resets page and search.
    pub async fn select_type(&self, filter_type: Option<&str>) -> Result<()> {
        let filter_type = filter_type.map(str::to_string);
        self.run(move |store| {
            store.set_filter_type(filter_type);
            true
        })
        .await
        .map(|_| ())
    }

    /// Case-insensitive substring search; resets to page 1.
    pub async fn search(&self, query: &str) -> Result<()> {
        let query = query.to_string();
        self.run(move |store| {
            store.set_search_query(query);
            true
        })
        .await
        .map(|_| ())
    }

    /// Move to page `page`. No-op (returns `false`) for page 0, or when
    /// moving forward from a page that came back short.
    pub async fn go_to_page(&self, page: u32) -> Result<bool> {
        self.run(move |store| {
            let state = store.state();
            if page < 1 {
                return false;
            }
            if page > state.current_page && !state.has_next_page() {
                return false;
            }
            store.set_page(page);
            true
        })
        .await
    }

    pub async fn next_page(&self) -> Result<bool> {
        let current = self.store.lock().await.state().current_page;
        self.go_to_page(current.saturating_add(1)).await
    }

    pub async fn previous_page(&self) -> Result<bool> {
        let current = self.store.lock().await.state().current_page;
        self.go_to_page(current.saturating_sub(1)).await
    }

    pub async fn total_pages(&self) -> u32 {
        self.store.lock().await.state().total_pages()
    }

    /// Save `changes` to an entity, then re-fetch the current page. A
    /// failed re-fetch is left in the page state and does not fail the edit.
    pub async fn edit(&self, id: &EntityId, changes: Record) -> Result<Entity> {
        let entity = self.store.lock().await.update(id, changes).await?;
        self.refetch_after_write("edit").await;
        Ok(entity)
    }

    /// First step of a delete: nothing is sent until the returned
    /// confirmation is handed to [`confirm_delete`](Self::confirm_delete).
    pub fn request_delete(&self, id: impl Into<EntityId>) -> DeleteConfirmation {
        DeleteConfirmation { id: id.into() }
    }

    /// Issue the delete, then re-fetch so totals reflect it. Once the
    /// delete went through the id is returned even if the re-fetch fails.
    pub async fn confirm_delete(&self, confirmation: DeleteConfirmation) -> Result<EntityId> {
        let deleted = self.store.lock().await.delete(&confirmation.id).await?;
        info!(id = %deleted, "delete confirmed");
        self.refetch_after_write("delete").await;
        Ok(deleted)
    }

    /// A write already went through; a failed refetch only shows up in
    /// the page state.
    async fn refetch_after_write(&self, op: &str) {
        if let Err(err) = self.refresh().await {
            warn!(op, error = %err, "refetch after write failed");
        }
    }
}
