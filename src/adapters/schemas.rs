//! Schema registries.
//!
//! `MemorySchemaRegistry` holds parsed schemas keyed by name.
//! `DirectorySchemaRegistry` loads `<dir>/<name>.schema.json` on demand.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::SchemaRegistry;
use crate::domain::SchemaDescription;
use crate::error::CollaboratorError;

/// File suffix for schema files
pub const SCHEMA_FILE_SUFFIX: &str = ".schema.json";

/// Schemas registered in memory
#[derive(Debug, Clone, Default)]
pub struct MemorySchemaRegistry {
    schemas: HashMap<String, SchemaDescription>,
}

impl MemorySchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a schema (builder style)
    pub fn with_schema(mut self, name: impl Into<String>, schema: SchemaDescription) -> Self {
        self.register(name, schema);
        self
    }

    pub fn register(&mut self, name: impl Into<String>, schema: SchemaDescription) {
        self.schemas.insert(name.into(), schema);
    }
}

#[async_trait]
impl SchemaRegistry for MemorySchemaRegistry {
    async fn schema_for(
        &self,
        name: &str,
        _course_id: &str,
    ) -> Result<SchemaDescription, CollaboratorError> {
        self.schemas
            .get(name)
            .cloned()
            .ok_or_else(|| CollaboratorError::NotFound {
                kind: "schema",
                name: name.to_string(),
            })
    }
}

/// Schemas read from JSON files in a directory
#[derive(Debug, Clone)]
pub struct DirectorySchemaRegistry {
    dir: PathBuf,
}

impl DirectorySchemaRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the schema file for a name, rejecting names that escape the directory
    fn schema_path(&self, name: &str) -> Option<PathBuf> {
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        valid.then(|| self.dir.join(format!("{}{}", name, SCHEMA_FILE_SUFFIX)))
    }
}

#[async_trait]
impl SchemaRegistry for DirectorySchemaRegistry {
    async fn schema_for(
        &self,
        name: &str,
        course_id: &str,
    ) -> Result<SchemaDescription, CollaboratorError> {
        let not_found = || CollaboratorError::NotFound {
            kind: "schema",
            name: name.to_string(),
        };

        let path = self.schema_path(name).ok_or_else(not_found)?;
        if !path.exists() {
            return Err(not_found());
        }

        let content = fs::read_to_string(&path).await.map_err(|e| {
            CollaboratorError::Unavailable(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let raw: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
            CollaboratorError::Unavailable(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        debug!(schema = name, %course_id, "Loaded schema from {}", path.display());
        Ok(SchemaDescription::from_json(&raw))
    }
}
