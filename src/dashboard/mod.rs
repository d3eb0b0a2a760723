//! Read-only dashboard
//!
//! Reads the user, poem, about and story/novel namespaces in one parallel
//! batch and reduces them into summary counts. A summary is always rebuilt
//! from scratch; a failed load keeps the previous summary on display.

mod emotion;

pub use emotion::Emotion;

use crate::backend::EntityBackend;
use crate::category::{
    ABOUT_NAMESPACE, NOVEL_TYPE, POEM_NAMESPACE, STORY_NOVELS_NAMESPACE, STORY_TYPE, USERS_NAMESPACE,
};
use crate::core::{EntityId, PortalError, Record, Result};
use crate::store::OperationState;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{info, warn};

/// Key of the nested book collection inside the about namespace
pub const MY_BOOKS_KEY: &str = "myBooks";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub id: EntityId,
    #[serde(flatten)]
    pub profile: Record,
}

/// Counts for the dashboard, rebuilt on every load.
///
/// `emotion_counts` summed with `unclassified_poems` always equals
/// `total_poems`; for poems that all carry one of the five emotions,
/// `unclassified_poems` is zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    pub users: Vec<UserProfile>,
    pub user_count: usize,
    pub total_poems: usize,
    /// Always holds every [`Emotion`], zero or not.
    pub emotion_counts: BTreeMap<Emotion, usize>,
    /// Poems whose emotion is missing or not one of the five.
    pub unclassified_poems: usize,
    pub book_count: usize,
    pub story_count: usize,
    pub novel_count: usize,
}

fn entries(value: Option<&Value>) -> Vec<(String, &Value)> {
    match value {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (i.to_string(), v))
            .collect(),
        _ => Vec::new(),
    }
}

fn collection_len(value: Option<&Value>) -> usize {
    entries(value).len()
}

fn reduce_users(raw: Option<&Value>) -> Vec<UserProfile> {
    entries(raw)
        .into_iter()
        .map(|(id, value)| {
            let profile = match value {
                Value::Object(map) => map.clone(),
                other => {
                    let mut map = Map::new();
                    map.insert("value".to_string(), other.clone());
                    map
                }
            };
            UserProfile {
                id: EntityId::new(id),
                profile,
            }
        })
        .collect()
}

fn reduce_poems(raw: Option<&Value>) -> (usize, BTreeMap<Emotion, usize>, usize) {
    let mut counts: BTreeMap<Emotion, usize> = Emotion::ALL.iter().map(|e| (*e, 0)).collect();
    let mut unclassified = 0;
    let poems = entries(raw);

    for (_, poem) in &poems {
        match poem
            .get("emotion")
            .and_then(Value::as_str)
            .and_then(|s| s.parse::<Emotion>().ok())
        {
            Some(emotion) => *counts.entry(emotion).or_default() += 1,
            None => unclassified += 1,
        }
    }

    (poems.len(), counts, unclassified)
}

/// Books live under `myBooks`, either at the top of the about namespace or
/// inside each about record.
fn reduce_books(raw: Option<&Value>) -> usize {
    let Some(about) = raw else {
        return 0;
    };
    if let Some(books) = about.get(MY_BOOKS_KEY) {
        return collection_len(Some(books));
    }
    entries(Some(about))
        .into_iter()
        .map(|(_, record)| collection_len(record.get(MY_BOOKS_KEY)))
        .sum()
}

fn reduce_story_novels(raw: Option<&Value>) -> (usize, usize) {
    entries(raw)
        .into_iter()
        .fold((0, 0), |(stories, novels), (_, record)| {
            match record.get("type").and_then(Value::as_str) {
                Some(STORY_TYPE) => (stories + 1, novels),
                Some(NOVEL_TYPE) => (stories, novels + 1),
                _ => (stories, novels),
            }
        })
}

/// Pure reduction of the raw namespace reads into a summary
pub fn summarize(raw: &HashMap<String, Option<Value>>) -> DashboardSummary {
    let get = |namespace: &str| raw.get(namespace).and_then(Option::as_ref);

    let users = reduce_users(get(USERS_NAMESPACE));
    let (total_poems, emotion_counts, unclassified_poems) = reduce_poems(get(POEM_NAMESPACE));
    let book_count = reduce_books(get(ABOUT_NAMESPACE));
    let (story_count, novel_count) = reduce_story_novels(get(STORY_NOVELS_NAMESPACE));

    DashboardSummary {
        user_count: users.len(),
        users,
        total_poems,
        emotion_counts,
        unclassified_poems,
        book_count,
        story_count,
        novel_count,
    }
}

pub struct DashboardAggregator {
    backend: Arc<dyn EntityBackend>,
    summary: Option<DashboardSummary>,
    state: OperationState,
}

impl DashboardAggregator {
    pub const NAMESPACES: [&'static str; 4] =
        [USERS_NAMESPACE, POEM_NAMESPACE, ABOUT_NAMESPACE, STORY_NOVELS_NAMESPACE];

    pub fn new(backend: Arc<dyn EntityBackend>) -> Self {
        Self {
            backend,
            summary: None,
            state: OperationState::default(),
        }
    }

    pub fn summary(&self) -> Option<&DashboardSummary> {
        self.summary.as_ref()
    }

    pub fn state(&self) -> &OperationState {
        &self.state
    }

    /// Fetch all four namespaces in parallel and rebuild the summary.
    pub async fn load_summary(&mut self) -> Result<DashboardSummary> {
        self.state.begin();
        match self.backend.read_multiple(&Self::NAMESPACES).await {
            Ok(raw) => {
                let summary = summarize(&raw);
                info!(
                    users = summary.user_count,
                    poems = summary.total_poems,
                    books = summary.book_count,
                    stories = summary.story_count,
                    novels = summary.novel_count,
                    "dashboard summary loaded"
                );
                self.summary = Some(summary.clone());
                self.state.succeed();
                Ok(summary)
            }
            Err(err) => {
                let message = err.to_string();
                warn!(error = %message, "dashboard load failed");
                self.state.fail(message.clone());
                Err(PortalError::Fetch(message))
            }
        }
    }
}
