//! Configuration for courseassets.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (COURSEASSETS_HOME, COURSEASSETS_DB, COURSEASSETS_SCHEMAS)
//! 2. Config file (.courseassets/config.yaml)
//! 3. Defaults (~/.courseassets)
//!
//! Config file discovery:
//! - Searches current directory and parents for .courseassets/config.yaml
//! - Paths in config file are relative to the project root (parent of .courseassets/)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

const CONFIG_DIR: &str = ".courseassets";
const CONFIG_FILE: &str = "config.yaml";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub store: Option<StoreConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory
    pub home: Option<String>,
    /// Link database file
    pub database: Option<String>,
    /// Directory of `<type>.schema.json` files
    pub schemas: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub backend: Option<StoreBackend>,
}

/// Which link store to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Sqlite,
    Memory,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Sqlite => write!(f, "sqlite"),
            StoreBackend::Memory => write!(f, "memory"),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// State directory
    pub home: PathBuf,
    /// Link database file
    pub database: PathBuf,
    /// Schema directory
    pub schemas: PathBuf,
    /// Link store backend
    pub backend: StoreBackend,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to a base directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

fn env_path(key: &str) -> Option<PathBuf> {
    std::env::var(key).ok().filter(|v| !v.is_empty()).map(PathBuf::from)
}

/// Merge a parsed config file with the environment
fn resolve(config_path: Option<&Path>, file: Option<ConfigFile>, default_home: PathBuf) -> ResolvedConfig {
    // Project root is the parent of .courseassets/
    let base_dir = config_path
        .and_then(Path::parent)
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));

    let paths = file.as_ref().map(|f| f.paths.clone()).unwrap_or_default();

    let home = env_path("COURSEASSETS_HOME")
        .or_else(|| paths.home.as_deref().map(|p| resolve_path(base_dir, p)))
        .unwrap_or(default_home);

    let database = env_path("COURSEASSETS_DB")
        .or_else(|| paths.database.as_deref().map(|p| resolve_path(base_dir, p)))
        .unwrap_or_else(|| home.join("links.db"));

    let schemas = env_path("COURSEASSETS_SCHEMAS")
        .or_else(|| paths.schemas.as_deref().map(|p| resolve_path(base_dir, p)))
        .unwrap_or_else(|| home.join("schemas"));

    let backend = file
        .and_then(|f| f.store)
        .and_then(|s| s.backend)
        .unwrap_or_default();

    ResolvedConfig {
        home,
        database,
        schemas,
        backend,
        config_file: config_path.map(Path::to_path_buf),
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(CONFIG_DIR);

    let config_file = find_config_file();
    let file = match &config_file {
        Some(path) => Some(load_config_file(path)?),
        None => None,
    };

    Ok(resolve(config_file.as_deref(), file, default_home))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
