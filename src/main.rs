use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use quillboard::category::{
    ABOUT_NAMESPACE, NARRATIVE_NAMESPACE, POEM_NAMESPACE, STORY_NOVELS_NAMESPACE, USERS_NAMESPACE,
};
use quillboard::{Entity, EntityId, FormController, InMemoryBackend, PortalConfig, PortalError, PortalSession};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "quillboard")]
#[command(about = "Manage portal content from the command line")]
struct Cli {
    /// memory://<name> or http(s)://host; defaults to QUILLBOARD_DATABASE_URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[arg(long, global = true)]
    page_size: Option<u32>,

    /// Seed an in-memory database with sample content
    #[arg(long, global = true)]
    demo: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show one page of a category
    List {
        #[arg(long, default_value = "Poem")]
        category: String,
        #[arg(long = "type")]
        type_filter: Option<String>,
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Add an entity through the category form
    Create {
        #[arg(long)]
        category: String,
        /// name=value, repeatable
        #[arg(short = 'f', long = "field")]
        fields: Vec<String>,
    },
    /// Edit an existing entity through the category form
    Update {
        #[arg(long)]
        category: String,
        #[arg(long)]
        id: String,
        #[arg(short = 'f', long = "field")]
        fields: Vec<String>,
    },
    Delete {
        #[arg(long)]
        category: String,
        #[arg(long)]
        id: String,
        /// Required; deletes are never issued without it
        #[arg(long)]
        yes: bool,
    },
    /// Print a category's form schema as JSON
    Schema {
        #[arg(long)]
        category: String,
    },
    Dashboard,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut config = match &cli.database_url {
        Some(url) => PortalConfig::from_url(url).context("invalid --database-url")?,
        None => PortalConfig::from_env().context("failed to load portal configuration")?,
    };
    if let Some(page_size) = cli.page_size {
        config = config.page_size(page_size);
    }

    let mut session = if cli.demo {
        config.validate().context("invalid configuration")?;
        info!("seeding demo content");
        PortalSession::with_backend(config, Arc::new(demo_backend()))
    } else {
        PortalSession::start(config).context("failed to start portal session")?
    };

    match cli.command {
        Command::List {
            category,
            type_filter,
            search,
            page,
        } => list(&mut session, &category, type_filter, search, page).await,
        Command::Create { category, fields } => create(&mut session, &category, &fields).await,
        Command::Update {
            category,
            id,
            fields,
        } => update(&mut session, &category, &id, &fields).await,
        Command::Delete { category, id, yes } => delete(&mut session, &category, &id, yes).await,
        Command::Schema { category } => {
            let schema = session.schema(&category)?;
            println!("{}", schema.to_json_pretty()?);
            Ok(())
        }
        Command::Dashboard => {
            let summary = session.dashboard().load_summary().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            Ok(())
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("quillboard=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn list(
    session: &mut PortalSession,
    category: &str,
    type_filter: Option<String>,
    search: Option<String>,
    page: u32,
) -> Result<()> {
    let list = session.list_controller(category).await?;

    match (&type_filter, &search) {
        (None, None) => list.refresh().await?,
        _ => {
            if type_filter.is_some() {
                list.select_type(type_filter.as_deref()).await?;
            }
            if let Some(query) = &search {
                list.search(query).await?;
            }
        }
    }
    if page > 1 && !list.go_to_page(page).await? {
        bail!("page {} is past the last page", page);
    }

    let state = list.snapshot().await;
    for entity in &state.items {
        println!(
            "{:<24} {:<10} {}",
            entity.id,
            entity.entity_type().unwrap_or("-"),
            entity.title().unwrap_or("(untitled)")
        );
    }
    println!(
        "page {}/{} ({} items)",
        state.current_page,
        state.total_pages().max(1),
        state.total_items
    );
    Ok(())
}

fn parse_field(raw: &str) -> Result<(&str, &str)> {
    raw.split_once('=')
        .map(|(name, value)| (name.trim(), value))
        .ok_or_else(|| anyhow!("expected name=value, got '{}'", raw))
}

async fn fill_and_submit(form: &mut FormController, fields: &[String]) -> Result<()> {
    for raw in fields {
        let (name, value) = parse_field(raw)?;
        form.set_field(name, value)?;
    }

    match form.submit().await {
        Ok(_) => Ok(()),
        Err(PortalError::Validation(errors)) => {
            for (field, message) in errors.fields() {
                eprintln!("  {}: {}", field, message);
            }
            bail!("form has {} invalid field(s)", errors.field_count())
        }
        Err(err) => Err(err.into()),
    }
}

async fn create(session: &mut PortalSession, category: &str, fields: &[String]) -> Result<()> {
    let mut form = session.form(category, None)?;
    fill_and_submit(&mut form, fields).await?;

    let store = session.store(category)?;
    let store = store.lock().await;
    if let Some(created) = store.state().items.first() {
        println!("created {}", created.id);
    }
    Ok(())
}

async fn load_entity(session: &PortalSession, category: &str, id: &EntityId) -> Result<Entity> {
    let namespace = session.registry().resolve(category)?.namespace.clone();
    let value = session
        .backend()
        .read_record(&namespace, id)
        .await
        .with_context(|| format!("failed to read {} {}", category, id))?
        .ok_or_else(|| anyhow!("no {} with id {}", category, id))?;
    Ok(Entity::from_stored(id.clone(), value))
}

async fn update(session: &mut PortalSession, category: &str, id: &str, fields: &[String]) -> Result<()> {
    let id = EntityId::from(id);
    let entity = load_entity(session, category, &id).await?;
    let mut form = session.form(category, Some(entity))?;
    fill_and_submit(&mut form, fields).await?;
    println!("updated {}", id);
    Ok(())
}

async fn delete(session: &mut PortalSession, category: &str, id: &str, yes: bool) -> Result<()> {
    if !yes {
        bail!("refusing to delete {} without --yes", id);
    }
    let list = session.list_controller(category).await?;
    let confirmation = list.request_delete(id);
    let deleted = list.confirm_delete(confirmation).await?;
    println!("deleted {}", deleted);
    Ok(())
}

fn demo_backend() -> InMemoryBackend {
    InMemoryBackend::new()
        .with_record(USERS_NAMESPACE, "u-ada", json!({"name": "Ada", "email": "ada@example.com"}))
        .with_record(USERS_NAMESPACE, "u-lin", json!({"name": "Lin", "email": "lin@example.com"}))
        .with_record(
            POEM_NAMESPACE,
            "p-1",
            json!({"mainType": "POEM", "timestamp": 1_700_000_000_000_i64, "title": "Harbour Lights",
                   "type": "free-verse", "emotion": "hope", "poem": "Boats come home."}),
        )
        .with_record(
            POEM_NAMESPACE,
            "p-2",
            json!({"mainType": "POEM", "timestamp": 1_700_000_100_000_i64, "title": "Fourteen Lines",
                   "type": "sonnet", "emotion": "love", "poem": "Shall I compare..."}),
        )
        .with_record(
            POEM_NAMESPACE,
            "p-3",
            json!({"mainType": "POEM", "timestamp": 1_700_000_200_000_i64, "title": "First Frost",
                   "type": "haiku", "emotion": "sadness", "poem": "Cold leaf, colder stone."}),
        )
        .with_record(
            NARRATIVE_NAMESPACE,
            "n-1",
            json!({"mainType": "NARRATIVE", "timestamp": 1_700_000_300_000_i64, "title": "The Crossing",
                   "type": "historical", "narrative": "We left at dawn."}),
        )
        .with_record(
            STORY_NOVELS_NAMESPACE,
            "s-1",
            json!({"mainType": "STORY", "timestamp": 1_700_000_400_000_i64, "title": "The Lamp",
                   "type": "stories", "summary": "A lamp that remembers."}),
        )
        .with_record(
            STORY_NOVELS_NAMESPACE,
            "nv-1",
            json!({"mainType": "NOVEL", "timestamp": 1_700_000_500_000_i64, "title": "Long Road",
                   "type": "novel", "summary": "Three generations, one road."}),
        )
        .with_record(
            ABOUT_NAMESPACE,
            "a-1",
            json!({"mainType": "ABOUT", "timestamp": 1_700_000_600_000_i64, "title": "About the author",
                   "description": "Writer and editor.", "myBooks": {"b1": {"title": "Harbour"}, "b2": {"title": "Frost"}}}),
        )
}
