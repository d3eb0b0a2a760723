use async_trait::async_trait;
use quillboard::category::{POEM_NAMESPACE, STORY_NOVELS_NAMESPACE};
use quillboard::store::BackendFetcher;
use quillboard::{
    CategoryFallback, CategoryRegistry, CategoryStore, DraftRecord, Emotion, EntityBackend, EntityId,
    FormController, FormMode, InMemoryBackend, ListController, OperationStatus, PageFetcher, PageRequest,
    PageSlice, PortalConfig, PortalError, PortalSession, Result, SubmitHandler,
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn poems(count: usize) -> Arc<InMemoryBackend> {
    let mut backend = InMemoryBackend::new();
    for i in 0..count {
        backend = backend.with_record(
            POEM_NAMESPACE,
            format!("p{i:02}"),
            json!({"title": format!("Poem {i}"), "type": "haiku", "emotion": "joy", "poem": "lines"}),
        );
    }
    Arc::new(backend)
}

fn session_over(backend: Arc<InMemoryBackend>, page_size: u32) -> PortalSession {
    PortalSession::with_backend(PortalConfig::memory("flow").page_size(page_size), backend)
}

#[derive(Default)]
struct CountingHandler {
    calls: AtomicUsize,
}

#[async_trait]
impl SubmitHandler for CountingHandler {
    async fn submit(&self, _draft: &DraftRecord, _mode: &FormMode) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn submit_with_missing_required_fields_never_reaches_handler() {
    let session = session_over(poems(0), 10);
    let schema = Arc::new(session.schema("Poem").expect("poem schema"));
    let handler = Arc::new(CountingHandler::default());
    let mut form = FormController::new(schema, handler.clone());

    form.set_field("title", "Only a title").unwrap();
    let err = form.submit().await.unwrap_err();

    let PortalError::Validation(errors) = err else {
        panic!("expected validation error, got {err:?}");
    };
    // type, emotion and poem are still empty
    assert_eq!(errors.field_count(), 3);
    assert!(errors.field("title").is_none());
    assert_eq!(handler.calls.load(Ordering::SeqCst), 0);
    assert_eq!(form.draft().get("title").unwrap().as_str(), "Only a title");
}

#[tokio::test]
async fn edit_then_cancel_leaves_stored_entity_alone() {
    let backend = poems(3);
    let mut session = session_over(backend.clone(), 10);
    let list = session.list_controller("Poem").await.unwrap();
    list.refresh().await.unwrap();
    let entity = list.snapshot().await.items[0].clone();

    let mut form = session.form("Poem", Some(entity.clone())).unwrap();
    assert_eq!(form.mode(), FormMode::Edit(entity.id.clone()));
    form.set_field("title", "Scribbled over").unwrap();
    form.cancel();

    let stored = backend
        .read_record(POEM_NAMESPACE, &entity.id)
        .await
        .unwrap()
        .expect("record still stored");
    assert_eq!(stored["title"], json!("Poem 2"));
    assert_eq!(list.snapshot().await.items[0], entity);
}

#[tokio::test]
async fn every_page_has_the_expected_length() {
    let backend = poems(23);
    let fetcher = BackendFetcher::new(backend, Arc::new(CategoryRegistry::default()));

    for page in 1..=5u32 {
        let slice = fetcher
            .fetch_page(&PageRequest::new("Poem", 10).page(page))
            .await
            .unwrap();
        let expected = 10usize.min(23usize.saturating_sub((page as usize - 1) * 10));
        assert_eq!(slice.items.len(), expected, "page {page}");
        assert_eq!(slice.total_items, 23);
    }
}

#[tokio::test]
async fn search_matches_title_and_body_case_insensitively() {
    let backend = Arc::new(
        InMemoryBackend::new()
            .with_record(POEM_NAMESPACE, "a", json!({"title": "Lovely Day", "poem": "sun"}))
            .with_record(POEM_NAMESPACE, "b", json!({"title": "Rain", "poem": "I love rain"}))
            .with_record(POEM_NAMESPACE, "c", json!({"title": "Hope", "poem": "a feather"})),
    );
    let mut session = session_over(backend, 10);
    let list = session.list_controller("Poem").await.unwrap();

    list.search("LOVE").await.unwrap();
    let state = list.snapshot().await;
    let ids: Vec<&str> = state.items.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
    assert_eq!(state.total_items, 2);
}

/// Holds page 1 back long enough for page 2 to land first.
struct SlowFirstPage {
    inner: BackendFetcher,
}

#[async_trait]
impl PageFetcher for SlowFirstPage {
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageSlice> {
        if request.page == 1 {
            tokio::time::sleep(Duration::from_millis(80)).await;
        }
        self.inner.fetch_page(request).await
    }
}

#[tokio::test]
async fn late_reply_for_an_older_request_is_discarded() {
    let backend = poems(15);
    let registry = Arc::new(CategoryRegistry::default());
    let store = CategoryStore::new("Poem", 10, backend.clone(), registry.clone()).into_handle();
    let list = ListController::new(
        store,
        Arc::new(SlowFirstPage {
            inner: BackendFetcher::new(backend, registry),
        }),
    );
    list.refresh().await.unwrap();

    let (first, second) = tokio::join!(list.refresh(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        list.go_to_page(2).await
    });
    first.unwrap();
    assert!(second.unwrap());

    let state = list.snapshot().await;
    assert_eq!(state.current_page, 2);
    assert_eq!(state.items.len(), 5);
    assert_eq!(state.items[0].id.as_str(), "p04");
    assert_eq!(state.status, OperationStatus::Succeeded);
}

#[tokio::test]
async fn created_entity_leads_the_next_fetch() {
    let mut session = session_over(poems(12), 10);
    let mut form = session.form("Poem", None).unwrap();
    form.set_field("title", "Newest").unwrap();
    form.set_field("type", "sonnet").unwrap();
    form.set_field("emotion", "love").unwrap();
    form.set_field("poem", "fresh ink").unwrap();
    assert_eq!(form.submit().await.unwrap(), FormMode::Add);

    let list = session.list_controller("Poem").await.unwrap();
    let held = list.snapshot().await;
    assert_eq!(held.items[0].title(), Some("Newest"));

    list.refresh().await.unwrap();
    let state = list.snapshot().await;
    assert_eq!(state.total_items, 13);
    assert_eq!(state.items[0].title(), Some("Newest"));
    assert_eq!(state.items[0].main_type, "POEM");
    assert!(state.items[0].timestamp > 0);
}

#[tokio::test]
async fn deleting_an_unknown_id_changes_nothing() {
    let mut session = session_over(poems(4), 10);
    let list = session.list_controller("Poem").await.unwrap();
    list.refresh().await.unwrap();
    let before = list.snapshot().await;

    let err = list
        .confirm_delete(list.request_delete(EntityId::from("missing")))
        .await
        .unwrap_err();
    assert!(matches!(err, PortalError::Submission(_)));

    let after = list.snapshot().await;
    assert_eq!(after.items, before.items);
    assert_eq!(after.total_items, 4);
    assert!(after.error.is_some());
}

#[tokio::test]
async fn dashboard_always_reports_five_emotions() {
    let empty = session_over(Arc::new(InMemoryBackend::new()), 10);
    let summary = empty.dashboard().load_summary().await.unwrap();
    assert_eq!(summary.emotion_counts.len(), 5);
    assert_eq!(summary.emotion_counts.values().sum::<usize>(), 0);
    assert_eq!(summary.total_poems, 0);

    let backend = Arc::new(
        InMemoryBackend::new()
            .with_record(POEM_NAMESPACE, "a", json!({"emotion": "anger"}))
            .with_record(POEM_NAMESPACE, "b", json!({"emotion": "hope"}))
            .with_record(STORY_NOVELS_NAMESPACE, "s", json!({"type": "stories"})),
    );
    let summary = session_over(backend, 10).dashboard().load_summary().await.unwrap();
    for emotion in Emotion::ALL {
        assert!(summary.emotion_counts.contains_key(&emotion));
    }
    assert_eq!(summary.emotion_counts.values().sum::<usize>(), summary.total_poems);
    assert_eq!(summary.story_count, 1);
}

#[tokio::test]
async fn story_and_novel_share_a_namespace_but_not_a_page() {
    let mut session = session_over(Arc::new(InMemoryBackend::new()), 10);

    for (category, title) in [("Story", "Short one"), ("Novel", "Long one"), ("Story", "Another")] {
        let mut form = session.form(category, None).unwrap();
        let type_value = form.schema().field("type").unwrap().options()[0].value.clone();
        form.set_field("title", title).unwrap();
        form.set_field("type", type_value.as_str()).unwrap();
        form.set_field("content", "text").unwrap();
        form.submit().await.unwrap();
    }

    let stories = session.list_controller("Story").await.unwrap();
    stories.refresh().await.unwrap();
    let state = stories.snapshot().await;
    assert_eq!(state.total_items, 2);
    assert!(state.items.iter().all(|e| e.entity_type() == Some("stories")));

    let raw = session.backend().read_raw(STORY_NOVELS_NAMESPACE).await.unwrap();
    let tags: Vec<Value> = match raw {
        Some(Value::Object(map)) => map.values().map(|v| v["mainType"].clone()).collect(),
        other => panic!("unexpected tree {other:?}"),
    };
    assert_eq!(tags.len(), 3);
    assert!(tags.contains(&json!("NOVEL")));
}

#[tokio::test]
async fn strict_registry_refuses_unknown_categories() {
    let mut session = PortalSession::start(
        PortalConfig::memory("strict").category_fallback(CategoryFallback::Reject),
    )
    .unwrap();
    assert!(matches!(
        session.list_controller("Limerick").await,
        Err(PortalError::UnknownCategory(_))
    ));

    let mut lenient = PortalSession::start(PortalConfig::memory("lenient")).unwrap();
    let store = lenient.store("Limerick").unwrap();
    assert_eq!(store.lock().await.category(), "Poem");
}

#[tokio::test]
async fn failed_refresh_keeps_previous_page_visible() {
    let backend = poems(5);
    let mut session = session_over(backend.clone(), 10);
    let list = session.list_controller("Poem").await.unwrap();
    list.refresh().await.unwrap();

    backend.set_unavailable(true);
    let err = list.refresh().await.unwrap_err();
    assert!(matches!(err, PortalError::Fetch(_)));

    let state = list.snapshot().await;
    assert_eq!(state.status, OperationStatus::Failed);
    assert_eq!(state.items.len(), 5);
    assert!(state.error.is_some());

    backend.set_unavailable(false);
    list.refresh().await.unwrap();
    let state = list.snapshot().await;
    assert_eq!(state.status, OperationStatus::Succeeded);
    assert!(state.error.is_none());
}
