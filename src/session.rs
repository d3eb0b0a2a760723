//! Portal session
//!
//! Explicit owner of everything one signed-in staff member works with: the
//! backend client, the category registry and one store per category.
//! Created at sign-in, dropped (or [`logout`](PortalSession::logout)) at
//! sign-out.

use crate::backend::{EntityBackend, InMemoryBackend, RestBackend};
use crate::category::CategoryRegistry;
use crate::config::{BackendKind, PortalConfig};
use crate::core::{Entity, PortalError, Result};
use crate::dashboard::DashboardAggregator;
use crate::form::{FormController, StoreSubmitHandler};
use crate::list::ListController;
use crate::schema::{Schema, builtin_schema};
use crate::store::{CategoryStore, StoreHandle};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub struct PortalSession {
    config: PortalConfig,
    backend: Arc<dyn EntityBackend>,
    registry: Arc<CategoryRegistry>,
    stores: HashMap<String, StoreHandle>,
}

impl PortalSession {
    /// Build the configured backend and start with no stores.
    pub fn start(config: PortalConfig) -> Result<Self> {
        config.validate()?;
        let backend: Arc<dyn EntityBackend> = match &config.backend {
            BackendKind::Memory { name } => {
                info!(backend = "memory", name = %name, "starting portal session");
                Arc::new(InMemoryBackend::new())
            }
            BackendKind::Rest { base_url } => {
                info!(backend = "rest", url = %config.to_url(), "starting portal session");
                let rest = RestBackend::new(base_url, config.auth_token.clone(), config.request_timeout)
                    .map_err(|e| PortalError::config(e.to_string()))?;
                Arc::new(rest)
            }
        };
        Ok(Self::with_backend(config, backend))
    }

    /// Session over an already-built backend
    pub fn with_backend(config: PortalConfig, backend: Arc<dyn EntityBackend>) -> Self {
        let registry = Arc::new(CategoryRegistry::new(config.category_fallback));
        Self {
            config,
            backend,
            registry,
            stores: HashMap::new(),
        }
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn backend(&self) -> Arc<dyn EntityBackend> {
        self.backend.clone()
    }

    pub fn registry(&self) -> &CategoryRegistry {
        &self.registry
    }

    /// Store for `category`, created on first use. Names are resolved
    /// through the registry, so aliases share one store.
    pub fn store(&mut self, category: &str) -> Result<StoreHandle> {
        let canonical = self.registry.resolve(category)?.category.clone();
        let page_size = self.config.page_size;
        let backend = self.backend.clone();
        let registry = self.registry.clone();

        Ok(self
            .stores
            .entry(canonical.clone())
            .or_insert_with(|| CategoryStore::new(canonical, page_size, backend, registry).into_handle())
            .clone())
    }

    pub async fn list_controller(&mut self, category: &str) -> Result<ListController> {
        let store = self.store(category)?;
        Ok(ListController::for_store(store).await)
    }

    pub fn schema(&self, category: &str) -> Result<Schema> {
        let canonical = &self.registry.resolve(category)?.category;
        builtin_schema(canonical)
    }

    /// Form bound to the category's store; `editing` switches it to edit mode.
    pub fn form(&mut self, category: &str, editing: Option<Entity>) -> Result<FormController> {
        let schema = Arc::new(self.schema(category)?);
        let handler = Arc::new(StoreSubmitHandler::new(self.store(category)?));
        Ok(match editing {
            Some(entity) => FormController::editing(schema, handler, entity),
            None => FormController::new(schema, handler),
        })
    }

    pub fn dashboard(&self) -> DashboardAggregator {
        DashboardAggregator::new(self.backend.clone())
    }

    pub fn open_stores(&self) -> usize {
        self.stores.len()
    }

    /// Drop every held store. Controllers still holding a handle see an
    /// emptied store.
    pub async fn logout(&mut self) {
        for store in self.stores.values() {
            store.lock().await.reset();
        }
        self.stores.clear();
        info!("portal session reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::CategoryFallback;
    use serde_json::json;

    fn session() -> PortalSession {
        PortalSession::start(PortalConfig::memory("test").page_size(5)).unwrap()
    }

    #[test]
    fn test_store_is_shared_per_category() {
        let mut session = session();
        let a = session.store("Poem").unwrap();
        let b = session.store("poem").unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let aliased = session.store("Limerick").unwrap();
        assert!(Arc::ptr_eq(&a, &aliased));

        session.store("Novel").unwrap();
        assert_eq!(session.open_stores(), 2);
    }

    #[test]
    fn test_strict_session_rejects_unknown_category() {
        let mut session = PortalSession::start(
            PortalConfig::memory("strict").category_fallback(CategoryFallback::Reject),
        )
        .unwrap();
        assert!(matches!(session.store("Limerick"), Err(PortalError::UnknownCategory(_))));
        assert!(session.form("Limerick", None).is_err());
    }

    #[test]
    fn test_start_rejects_invalid_config() {
        assert!(PortalSession::start(PortalConfig::memory("x").page_size(0)).is_err());
    }

    #[tokio::test]
    async fn test_form_list_and_logout_flow() {
        let mut session = session();
        let mut form = session.form("Narrative", None).unwrap();
        form.set_field("title", "The Crossing").unwrap();
        form.set_field("type", "historical").unwrap();
        form.set_field("narrative", "We left at dawn.").unwrap();
        form.submit().await.unwrap();

        let list = session.list_controller("Narrative").await.unwrap();
        list.refresh().await.unwrap();
        let state = list.snapshot().await;
        assert_eq!(state.total_items, 1);
        assert_eq!(state.page_size, 5);
        assert_eq!(state.items[0].main_type, "NARRATIVE");

        let editing = session.form("Narrative", Some(state.items[0].clone())).unwrap();
        assert_eq!(editing.draft().get("title").unwrap().as_str(), "The Crossing");

        session.logout().await;
        assert_eq!(session.open_stores(), 0);
        assert!(list.snapshot().await.items.is_empty());
    }

    #[tokio::test]
    async fn test_dashboard_uses_session_backend() {
        let backend = Arc::new(InMemoryBackend::new().with_record("Users", "u1", json!({"name": "Ada"})));
        let session = PortalSession::with_backend(PortalConfig::default(), backend);
        let summary = session.dashboard().load_summary().await.unwrap();
        assert_eq!(summary.user_count, 1);
    }
}
