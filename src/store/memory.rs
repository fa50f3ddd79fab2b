//! In-memory link store.
//!
//! Useful for tests and for running the reconciler without a database file.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use super::LinkStore;
use crate::domain::{CourseAssetLink, LinkFilter, LinkPatch, NewLink};
use crate::error::StoreError;

/// Link store backed by a vector behind an async lock
#[derive(Debug, Clone, Default)]
pub struct MemoryLinkStore {
    links: Arc<RwLock<Vec<CourseAssetLink>>>,
}

impl MemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored links
    pub async fn len(&self) -> usize {
        self.links.read().await.len()
    }
}

#[async_trait]
impl LinkStore for MemoryLinkStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn find(&self, filter: &LinkFilter) -> Result<Vec<CourseAssetLink>, StoreError> {
        let links = self.links.read().await;
        Ok(links.iter().filter(|l| l.matches(filter)).cloned().collect())
    }

    async fn insert(&self, link: NewLink) -> Result<CourseAssetLink, StoreError> {
        let mut links = self.links.write().await;

        let triple = link.filter();
        if links.iter().any(|l| l.matches(&triple)) {
            return Err(StoreError::Duplicate {
                course_id: link.course_id,
                content_id: link.content_id,
                asset_id: link.asset_id,
            });
        }

        let record = CourseAssetLink::from_new(link);
        debug!(id = %record.id, "Inserted link");
        links.push(record.clone());
        Ok(record)
    }

    async fn update(&self, filter: &LinkFilter, patch: &LinkPatch) -> Result<usize, StoreError> {
        let mut links = self.links.write().await;

        // Stage the patched rows first so a collision leaves the store untouched
        let mut staged = links.clone();
        let mut changed = 0;
        for link in staged.iter_mut().filter(|l| l.matches(filter)) {
            link.apply(patch);
            changed += 1;
        }

        for (i, a) in staged.iter().enumerate() {
            if let Some(b) = staged[i + 1..].iter().find(|b| a.same_triple(b)) {
                return Err(StoreError::Duplicate {
                    course_id: b.course_id.clone(),
                    content_id: b.content_id.clone(),
                    asset_id: b.asset_id.clone(),
                });
            }
        }

        *links = staged;
        Ok(changed)
    }

    async fn delete(&self, filter: &LinkFilter) -> Result<bool, StoreError> {
        let mut links = self.links.write().await;
        match links.iter().position(|l| l.matches(filter)) {
            Some(pos) => {
                links.remove(pos);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_many(&self, filter: &LinkFilter) -> Result<usize, StoreError> {
        let mut links = self.links.write().await;
        let before = links.len();
        links.retain(|l| !l.matches(filter));
        Ok(before - links.len())
    }
}
