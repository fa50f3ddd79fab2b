//! In-memory asset catalog with a pre-delete hook registry.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock as StdRwLock};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{AssetCatalog, PreDeleteHook};
use crate::domain::{Asset, AssetFilter};
use crate::error::{CollaboratorError, ReconcileError};

/// Asset catalog held in memory
#[derive(Default)]
pub struct MemoryAssetCatalog {
    assets: RwLock<BTreeMap<String, Asset>>,
    hooks: StdRwLock<Vec<Arc<dyn PreDeleteHook>>>,
}

impl MemoryAssetCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a catalog pre-populated with assets
    pub fn with_assets(assets: impl IntoIterator<Item = Asset>) -> Self {
        let assets = assets.into_iter().map(|a| (a.id.clone(), a)).collect();
        Self {
            assets: RwLock::new(assets),
            hooks: StdRwLock::new(Vec::new()),
        }
    }

    /// Add or replace an asset
    pub async fn add(&self, asset: Asset) {
        self.assets.write().await.insert(asset.id.clone(), asset);
    }

    /// Whether an asset with this id exists
    pub async fn contains(&self, id: &str) -> bool {
        self.assets.read().await.contains_key(id)
    }

    pub async fn len(&self) -> usize {
        self.assets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.assets.read().await.is_empty()
    }

    fn hooks(&self) -> Result<Vec<Arc<dyn PreDeleteHook>>, CollaboratorError> {
        self.hooks
            .read()
            .map(|hooks| hooks.clone())
            .map_err(|e| CollaboratorError::Unavailable(format!("hook registry poisoned: {}", e)))
    }
}

#[async_trait]
impl AssetCatalog for MemoryAssetCatalog {
    async fn find(&self, filter: &AssetFilter) -> Result<Vec<Asset>, CollaboratorError> {
        let assets = self.assets.read().await;

        let found = match &filter.id {
            Some(id) => assets.get(id).cloned().into_iter().collect(),
            None => assets.values().filter(|a| filter.matches(a)).cloned().collect(),
        };
        Ok(found)
    }

    async fn delete(&self, id: &str) -> Result<Asset, ReconcileError> {
        let hooks = self.hooks()?;

        // Held across the hooks so the asset cannot be resolved mid-check
        let mut assets = self.assets.write().await;
        let asset = assets
            .get(id)
            .cloned()
            .ok_or_else(|| ReconcileError::asset_not_found(id))?;

        for hook in &hooks {
            if let Err(e) = hook.before_delete(&asset).await {
                warn!(asset_id = %id, hook = hook.name(), code = e.code(), "Asset deletion vetoed");
                return Err(e);
            }
            debug!(asset_id = %id, hook = hook.name(), "Pre-delete hook passed");
        }

        assets.remove(id);
        info!(asset_id = %id, "Asset deleted");
        Ok(asset)
    }

    fn register_pre_delete(&self, hook: Arc<dyn PreDeleteHook>) {
        match self.hooks.write() {
            Ok(mut hooks) => {
                debug!(hook = hook.name(), "Registered pre-delete hook");
                hooks.push(hook);
            }
            Err(e) => warn!("Failed to register pre-delete hook: {}", e),
        }
    }
}
