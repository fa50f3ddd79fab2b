//! Persistence for course asset links.
//!
//! `LinkStore` is the collection-style seam the reconciler writes through.
//! Implementations must enforce uniqueness on `(course_id, content_id,
//! asset_id)` and make single-row operations atomic; the reconciler relies on
//! that instead of locking rows itself.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;

use crate::domain::{CourseAssetLink, LinkFilter, LinkPatch, NewLink};
use crate::error::StoreError;

pub use memory::MemoryLinkStore;
pub use sqlite::SqliteLinkStore;

/// Collection of course asset links
#[async_trait]
pub trait LinkStore: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// All links matching the filter
    async fn find(&self, filter: &LinkFilter) -> Result<Vec<CourseAssetLink>, StoreError>;

    /// Create a link; fails with `StoreError::Duplicate` if the triple exists
    async fn insert(&self, link: NewLink) -> Result<CourseAssetLink, StoreError>;

    /// Patch every matching link, returning how many changed.
    ///
    /// Fails with `StoreError::Duplicate`, changing nothing, if the patch
    /// would make two links share a triple.
    async fn update(&self, filter: &LinkFilter, patch: &LinkPatch) -> Result<usize, StoreError>;

    /// Delete the first matching link
    async fn delete(&self, filter: &LinkFilter) -> Result<bool, StoreError>;

    /// Delete every matching link, returning how many were removed
    async fn delete_many(&self, filter: &LinkFilter) -> Result<usize, StoreError>;
}
