use super::{DraftRecord, FormMode, SubmitHandler};
use crate::core::Result;
use crate::store::StoreHandle;
use async_trait::async_trait;

/// Submits drafts into a category store: "add" creates, "edit" updates.
/// The store stays locked for the whole backend write.
#[derive(Clone)]
pub struct StoreSubmitHandler {
    store: StoreHandle,
}

impl StoreSubmitHandler {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }
}

#[async_trait]
impl SubmitHandler for StoreSubmitHandler {
    async fn submit(&self, draft: &DraftRecord, mode: &FormMode) -> Result<()> {
        let mut store = self.store.lock().await;
        match mode {
            FormMode::Add => store.create(draft.to_record()).await.map(|_| ()),
            FormMode::Edit(id) => store.update(id, draft.to_record()).await.map(|_| ()),
        }
    }
}
