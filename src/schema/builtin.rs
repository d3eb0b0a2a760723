use super::{FieldDescriptor, FieldGroup, FieldKind, Schema};
use crate::category::{CategoryRegistry, NOVEL_TYPE, STORY_TYPE};
use crate::core::{PortalError, Result};
use crate::dashboard::Emotion;

/// Fields a list search matches against (case-insensitive substring).
pub const SEARCH_FIELDS: &[&str] = &["title", "poem", "narrative", "content", "summary", "description"];

fn title() -> FieldDescriptor {
    FieldDescriptor::new("title", "Title", FieldKind::Text).required()
}

fn image(label: &str) -> FieldDescriptor {
    FieldDescriptor::new("image", label, FieldKind::image())
}

pub fn poem() -> Result<Schema> {
    let emotions = Emotion::ALL.iter().map(|e| (e.label(), e.as_str()));

    Schema::new(
        "Poem",
        vec![
            FieldGroup::new(vec![
                title(),
                FieldDescriptor::new(
                    "type",
                    "Form",
                    FieldKind::choice([
                        ("Free verse", "free-verse"),
                        ("Sonnet", "sonnet"),
                        ("Haiku", "haiku"),
                        ("Ghazal", "ghazal"),
                    ]),
                )
                .required(),
                FieldDescriptor::new("emotion", "Emotion", FieldKind::choice(emotions)).required(),
            ]),
            FieldGroup::titled(
                "Content",
                vec![
                    FieldDescriptor::new("poem", "Poem", FieldKind::RichText).required(),
                    image("Illustration"),
                ],
            ),
        ],
    )
}

pub fn narrative() -> Result<Schema> {
    Schema::new(
        "Narrative",
        vec![
            FieldGroup::new(vec![
                title(),
                FieldDescriptor::new(
                    "type",
                    "Kind",
                    FieldKind::choice([
                        ("Personal", "personal"),
                        ("Historical", "historical"),
                        ("Fictional", "fictional"),
                    ]),
                )
                .required(),
            ]),
            FieldGroup::titled(
                "Content",
                vec![
                    FieldDescriptor::new("narrative", "Narrative", FieldKind::RichText).required(),
                    image("Cover image"),
                ],
            ),
        ],
    )
}

fn long_form(category: &str, type_value: &str, type_label: &str) -> Result<Schema> {
    Schema::new(
        category,
        vec![
            FieldGroup::new(vec![
                title(),
                FieldDescriptor::new("type", "Type", FieldKind::choice([(type_label, type_value)])).required(),
                FieldDescriptor::new("summary", "Summary", FieldKind::LongText),
            ]),
            FieldGroup::titled(
                "Content",
                vec![
                    FieldDescriptor::new("content", "Content", FieldKind::RichText).required(),
                    image("Cover"),
                ],
            ),
        ],
    )
}

pub fn story() -> Result<Schema> {
    long_form("Story", STORY_TYPE, "Story")
}

pub fn novel() -> Result<Schema> {
    long_form("Novel", NOVEL_TYPE, "Novel")
}

pub fn about() -> Result<Schema> {
    Schema::new(
        "About",
        vec![
            FieldGroup::new(vec![
                title(),
                FieldDescriptor::new("description", "Short bio", FieldKind::LongText).required(),
            ]),
            FieldGroup::titled(
                "Page",
                vec![
                    FieldDescriptor::new("content", "Content", FieldKind::RichText),
                    image("Portrait"),
                ],
            ),
        ],
    )
}

/// Built-in schema for a category name (case-insensitive, no fallback)
pub fn builtin_schema(category: &str) -> Result<Schema> {
    let binding = CategoryRegistry::strict().resolve(category)?.clone();
    match binding.category.as_str() {
        "Poem" => poem(),
        "Narrative" => narrative(),
        "Story" => story(),
        "Novel" => novel(),
        "About" => about(),
        other => Err(PortalError::UnknownCategory(other.to_string())),
    }
}
