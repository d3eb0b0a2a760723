// ============================================================================
// Category Registry
// ============================================================================
//
// Maps a content category (Poem, Narrative, ...) to the storage namespace
// its records live in and the tag stamped into `mainType`.
//
// ============================================================================

use crate::core::{PortalError, Result};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const USERS_NAMESPACE: &str = "Users";
pub const POEM_NAMESPACE: &str = "PoemData";
pub const NARRATIVE_NAMESPACE: &str = "NarrativeData";
pub const STORY_NOVELS_NAMESPACE: &str = "StoryNovelsData";
pub const ABOUT_NAMESPACE: &str = "AboutData";

pub const STORY_TYPE: &str = "stories";
pub const NOVEL_TYPE: &str = "novel";

pub const DEFAULT_CATEGORY: &str = "Poem";

/// Where one category is stored and how its records are tagged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryBinding {
    pub category: String,
    pub namespace: String,
    pub tag: String,
    /// Categories sharing a namespace are told apart by their `type` value.
    pub fixed_type: Option<String>,
}

impl CategoryBinding {
    fn new(category: &str, namespace: &str, tag: &str) -> Self {
        Self {
            category: category.to_string(),
            namespace: namespace.to_string(),
            tag: tag.to_string(),
            fixed_type: None,
        }
    }

    fn with_type(mut self, type_value: &str) -> Self {
        self.fixed_type = Some(type_value.to_string());
        self
    }

    /// Type filter to send to the backend: an explicit one wins over the fixed type.
    pub fn effective_filter<'a>(&'a self, requested: Option<&'a str>) -> Option<&'a str> {
        requested.or(self.fixed_type.as_deref())
    }
}

lazy_static! {
    static ref BUILTIN_BINDINGS: Vec<CategoryBinding> = vec![
        CategoryBinding::new("Poem", POEM_NAMESPACE, "POEM"),
        CategoryBinding::new("Narrative", NARRATIVE_NAMESPACE, "NARRATIVE"),
        CategoryBinding::new("Story", STORY_NOVELS_NAMESPACE, "STORY").with_type(STORY_TYPE),
        CategoryBinding::new("Novel", STORY_NOVELS_NAMESPACE, "NOVEL").with_type(NOVEL_TYPE),
        CategoryBinding::new("About", ABOUT_NAMESPACE, "ABOUT"),
    ];
}

/// What to do when a caller names a category the table does not know
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryFallback {
    /// Alias unknown categories to Poem (historical behaviour, logged).
    #[default]
    DefaultToPoem,
    /// Fail with `PortalError::UnknownCategory`.
    Reject,
}

/// Fixed category lookup table
#[derive(Debug, Clone)]
pub struct CategoryRegistry {
    bindings: Vec<CategoryBinding>,
    fallback: CategoryFallback,
}

impl CategoryRegistry {
    pub fn new(fallback: CategoryFallback) -> Self {
        Self {
            bindings: BUILTIN_BINDINGS.clone(),
            fallback,
        }
    }

    pub fn strict() -> Self {
        Self::new(CategoryFallback::Reject)
    }

    pub fn fallback(&self) -> CategoryFallback {
        self.fallback
    }

    /// Case-insensitive lookup without any fallback
    pub fn get(&self, category: &str) -> Option<&CategoryBinding> {
        let wanted = category.trim();
        self.bindings
            .iter()
            .find(|b| b.category.eq_ignore_ascii_case(wanted))
    }

    /// Resolve a category, applying the configured fallback policy
    pub fn resolve(&self, category: &str) -> Result<&CategoryBinding> {
        if let Some(binding) = self.get(category) {
            return Ok(binding);
        }

        match self.fallback {
            CategoryFallback::DefaultToPoem => {
                warn!(category, fallback = DEFAULT_CATEGORY, "unknown category, aliasing to default");
                self.get(DEFAULT_CATEGORY)
                    .ok_or_else(|| PortalError::UnknownCategory(category.to_string()))
            }
            CategoryFallback::Reject => Err(PortalError::UnknownCategory(category.to_string())),
        }
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.bindings.iter().map(|b| b.category.as_str())
    }
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        Self::new(CategoryFallback::default())
    }
}
