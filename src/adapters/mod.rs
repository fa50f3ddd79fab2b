//! Interfaces to the services this index depends on.
//!
//! The content service, schema registry and asset catalog live outside this
//! crate. Adapters describe what the reconciler needs from them, plus small
//! in-process implementations used by the CLI and the tests.

pub mod catalog;
pub mod events;
pub mod schemas;

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{Asset, AssetFilter, SchemaDescription};
use crate::error::{CollaboratorError, ReconcileError};

// Re-export the in-process implementations
pub use catalog::MemoryAssetCatalog;
pub use events::ContentEventBus;
pub use schemas::{DirectorySchemaRegistry, MemorySchemaRegistry};

/// Resolves the schema description for a content type
#[async_trait]
pub trait SchemaRegistry: Send + Sync {
    /// Look up a schema by name, in the context of a course
    async fn schema_for(
        &self,
        name: &str,
        course_id: &str,
    ) -> Result<SchemaDescription, CollaboratorError>;
}

/// Veto point run before an asset is removed from the catalog
#[async_trait]
pub trait PreDeleteHook: Send + Sync {
    /// Human-readable hook name
    fn name(&self) -> &str;

    /// Return an error to block the deletion
    async fn before_delete(&self, asset: &Asset) -> Result<(), ReconcileError>;
}

/// Catalog of stored assets
#[async_trait]
pub trait AssetCatalog: Send + Sync {
    /// Assets matching the filter
    async fn find(&self, filter: &AssetFilter) -> Result<Vec<Asset>, CollaboratorError>;

    /// Remove an asset after every registered pre-delete hook agrees
    async fn delete(&self, id: &str) -> Result<Asset, ReconcileError>;

    /// Register a hook to run before each deletion
    fn register_pre_delete(&self, hook: Arc<dyn PreDeleteHook>);
}
