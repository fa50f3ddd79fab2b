//! Command-line interface for courseassets.
//!
//! Provides commands for previewing extraction, replaying content events
//! into the link index, querying links and asset usage, and running the
//! guarded asset delete.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::fs;

use crate::adapters::{AssetCatalog, ContentEventBus, DirectorySchemaRegistry, MemoryAssetCatalog};
use crate::config::{self, StoreBackend};
use crate::core::{extract, CourseAssets};
use crate::domain::{Asset, AssetFilter, ContentEvent, LinkFilter, SchemaDescription};
use crate::error::ReconcileError;
use crate::store::{LinkStore, MemoryLinkStore, SqliteLinkStore};

/// courseassets - keeps course asset links in sync with content
#[derive(Parser, Debug)]
#[command(name = "courseassets")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the asset ids a document references
    Extract {
        /// Schema file (full JSON schema or bare property map)
        #[arg(short, long)]
        schema: PathBuf,

        /// Content document (JSON)
        #[arg(short, long)]
        doc: PathBuf,
    },

    /// Apply content events from a JSONL file to the link index
    Replay {
        /// Events file, one `{"action": ...}` object per line
        #[arg(short, long)]
        events: PathBuf,

        /// Asset catalog file (JSON array of asset documents)
        #[arg(short, long)]
        assets: PathBuf,

        /// Schema directory (defaults to the configured one)
        #[arg(long, env = "COURSEASSETS_SCHEMAS")]
        schemas: Option<PathBuf>,
    },

    /// List link records
    Links {
        #[arg(long)]
        course: Option<String>,

        #[arg(long)]
        content: Option<String>,

        #[arg(long)]
        asset: Option<String>,
    },

    /// Show which courses and content use an asset
    Usage {
        /// Asset id
        asset_id: String,
    },

    /// Delete an asset from a catalog file, refusing if it is still in use
    DeleteAsset {
        /// Asset id
        asset_id: String,

        /// Asset catalog file (JSON array of asset documents)
        #[arg(short, long)]
        assets: PathBuf,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Extract { schema, doc } => extract_command(&schema, &doc).await,
            Commands::Replay {
                events,
                assets,
                schemas,
            } => replay(&events, &assets, schemas).await,
            Commands::Links {
                course,
                content,
                asset,
            } => {
                let filter = LinkFilter {
                    id: None,
                    course_id: course,
                    content_id: content,
                    asset_id: asset,
                };
                list_links(&filter).await
            }
            Commands::Usage { asset_id } => show_usage(&asset_id).await,
            Commands::DeleteAsset { asset_id, assets } => delete_asset(&asset_id, &assets).await,
            Commands::Config => show_config(),
        }
    }
}

async fn read_json(path: &Path) -> Result<serde_json::Value> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

async fn load_catalog(path: &Path) -> Result<MemoryAssetCatalog> {
    let assets: Vec<Asset> = serde_json::from_value(read_json(path).await?)
        .with_context(|| format!("Expected a JSON array of assets in {}", path.display()))?;
    Ok(MemoryAssetCatalog::with_assets(assets))
}

async fn load_events(path: &Path) -> Result<Vec<ContentEvent>> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read events file: {}", path.display()))?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("Failed to parse event on line {}", n + 1))
        })
        .collect()
}

fn open_store() -> Result<Arc<dyn LinkStore>> {
    let config = config::config()?;

    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryLinkStore::new())),
        StoreBackend::Sqlite => {
            if let Some(parent) = config.database.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            let store = SqliteLinkStore::open(&config.database)
                .with_context(|| format!("Failed to open {}", config.database.display()))?;
            Ok(Arc::new(store))
        }
    }
}

async fn extract_command(schema_path: &Path, doc_path: &Path) -> Result<()> {
    let schema = SchemaDescription::from_json(&read_json(schema_path).await?);
    let doc = read_json(doc_path).await?;

    let ids = extract(&schema, &doc);
    if ids.is_empty() {
        println!("No asset references found.");
        return Ok(());
    }

    for id in ids {
        println!("{}", id);
    }
    Ok(())
}

async fn replay(events_path: &Path, assets_path: &Path, schemas: Option<PathBuf>) -> Result<()> {
    let schemas_dir = match schemas {
        Some(dir) => dir,
        None => config::config()?.schemas.clone(),
    };

    let events = load_events(events_path).await?;
    let catalog = load_catalog(assets_path).await?;
    let store = open_store()?;

    let index = CourseAssets::new(
        Arc::clone(&store),
        Arc::new(DirectorySchemaRegistry::new(&schemas_dir)),
        Arc::new(catalog),
    );

    let bus = ContentEventBus::new();
    let listener = index.attach(&bus);

    let total = events.len();
    for event in events {
        bus.emit(event);
    }
    bus.close();
    listener.await.context("Event listener task failed")?;

    let links = index.find(&LinkFilter::all()).await?;
    println!("Replayed {} event(s); index now holds {} link(s).", total, links.len());
    Ok(())
}

async fn list_links(filter: &LinkFilter) -> Result<()> {
    let store = open_store()?;
    let links = store.find(filter).await?;

    if links.is_empty() {
        println!("No links found.");
        return Ok(());
    }

    println!("{:<24} {:<24} {:<24} CREATED", "COURSE", "CONTENT", "ASSET");
    println!("{}", "-".repeat(96));
    for link in &links {
        println!(
            "{:<24} {:<24} {:<24} {}",
            link.course_id,
            link.content_id,
            link.asset_id,
            link.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    println!();
    println!("{} link(s)", links.len());
    Ok(())
}

async fn show_usage(asset_id: &str) -> Result<()> {
    let store = open_store()?;
    let usage = crate::core::asset_usage(store.as_ref(), asset_id).await?;

    if usage.is_unused() {
        println!("Asset {} is not used by any course.", asset_id);
        return Ok(());
    }

    println!("Asset {} is used by:", asset_id);
    println!("  Courses:  {}", usage.courses.join(", "));
    println!("  Contents: {}", usage.contents.join(", "));
    Ok(())
}

async fn delete_asset(asset_id: &str, assets_path: &Path) -> Result<()> {
    let catalog = Arc::new(load_catalog(assets_path).await?);
    let store = open_store()?;

    let schemas = Arc::new(DirectorySchemaRegistry::new(config::config()?.schemas.clone()));
    let index = CourseAssets::new(store, schemas, catalog.clone());
    index.install_guard();

    match index.delete_asset(asset_id).await {
        Ok(asset) => {
            let remaining = catalog.find(&AssetFilter::default()).await?;
            let json = serde_json::to_string_pretty(&remaining)?;
            fs::write(assets_path, json)
                .await
                .with_context(|| format!("Failed to write {}", assets_path.display()))?;
            println!("Deleted asset {}.", asset.id);
            Ok(())
        }
        Err(ReconcileError::ResourceInUse { id, courses, .. }) => {
            anyhow::bail!(
                "RESOURCE_IN_USE: asset {} is referenced by course(s): {}",
                id,
                courses.join(", ")
            )
        }
        Err(e) => Err(e.into()),
    }
}

fn show_config() -> Result<()> {
    let config = config::config()?;

    println!("courseassets configuration");
    println!("==========================");
    println!();
    match &config.config_file {
        Some(path) => println!("Config file: {}", path.display()),
        None => println!("Config file: (none, using defaults)"),
    }
    println!("Home:        {}", config.home.display());
    println!("Backend:     {}", config.backend);
    println!("Database:    {}", config.database.display());
    println!("Schemas:     {}", config.schemas.display());
    Ok(())
}
