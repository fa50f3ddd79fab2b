//! Cross-cutting link policies.
//!
//! - Course cascade: deleting a course drops every link recorded under it
//! - Asset guard: an asset with live links cannot be removed from the catalog

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, instrument, warn};

use crate::adapters::PreDeleteHook;
use crate::domain::{Asset, AssetUsage, LinkFilter};
use crate::error::{ReconcileError, StoreError};
use crate::store::LinkStore;

/// Remove every link of a course in a single store call
#[instrument(skip(store))]
pub async fn cascade_course(store: &dyn LinkStore, course_id: &str) -> Result<usize, StoreError> {
    let removed = store.delete_many(&LinkFilter::by_course(course_id)).await?;
    info!(removed, "Cascaded course delete to links");
    Ok(removed)
}

/// Which courses and content nodes reference an asset
pub async fn asset_usage(store: &dyn LinkStore, asset_id: &str) -> Result<AssetUsage, StoreError> {
    let links = store.find(&LinkFilter::by_asset(asset_id)).await?;

    let courses: BTreeSet<_> = links.iter().map(|l| l.course_id.clone()).collect();
    let contents: BTreeSet<_> = links.iter().map(|l| l.content_id.clone()).collect();

    Ok(AssetUsage {
        asset_id: asset_id.to_string(),
        courses: courses.into_iter().collect(),
        contents: contents.into_iter().collect(),
    })
}

/// Pre-delete hook that vetoes deleting assets still referenced by content
pub struct AssetGuard {
    store: Arc<dyn LinkStore>,
}

impl AssetGuard {
    pub fn new(store: Arc<dyn LinkStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl PreDeleteHook for AssetGuard {
    fn name(&self) -> &str {
        "course-asset-guard"
    }

    #[instrument(skip(self, asset), fields(asset_id = %asset.id))]
    async fn before_delete(&self, asset: &Asset) -> Result<(), ReconcileError> {
        let usage = asset_usage(self.store.as_ref(), &asset.id).await?;
        if usage.is_unused() {
            return Ok(());
        }

        warn!(courses = ?usage.courses, "Asset still referenced by course content");
        Err(ReconcileError::ResourceInUse {
            resource: "asset",
            id: usage.asset_id,
            courses: usage.courses,
            contents: usage.contents,
        })
    }
}
