//! The course asset index as a single service.
//!
//! Wires the reconciler, the ordered dispatcher and the asset guard to their
//! collaborators, and exposes the query side (`find`, `usage`) to the rest of
//! the application.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::info;

use super::dispatcher::EventDispatcher;
use super::policy::{self, AssetGuard};
use super::reconciler::{ReconcileReport, Reconciler};
use crate::adapters::{AssetCatalog, ContentEventBus, SchemaRegistry};
use crate::domain::{Asset, AssetUsage, ContentEvent, CourseAssetLink, LinkFilter};
use crate::error::{ReconcileError, StoreError};
use crate::store::LinkStore;

/// Course asset index service
pub struct CourseAssets {
    store: Arc<dyn LinkStore>,
    catalog: Arc<dyn AssetCatalog>,
    reconciler: Arc<Reconciler>,
    dispatcher: Arc<EventDispatcher>,
}

impl CourseAssets {
    pub fn new(
        store: Arc<dyn LinkStore>,
        schemas: Arc<dyn SchemaRegistry>,
        catalog: Arc<dyn AssetCatalog>,
    ) -> Self {
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&store),
            schemas,
            Arc::clone(&catalog),
        ));
        let dispatcher = Arc::new(EventDispatcher::new(Arc::clone(&reconciler)));

        Self {
            store,
            catalog,
            reconciler,
            dispatcher,
        }
    }

    /// Subscribe to a content event bus; the task ends when the bus closes
    /// and every queued event has been applied.
    pub fn attach(&self, bus: &ContentEventBus) -> JoinHandle<()> {
        let events = bus.subscribe();
        info!(store = self.store.name(), "Attached course asset index to content events");
        tokio::spawn(Arc::clone(&self.dispatcher).listen(events))
    }

    /// Register the in-use guard with the asset catalog
    pub fn install_guard(&self) {
        self.catalog
            .register_pre_delete(Arc::new(AssetGuard::new(Arc::clone(&self.store))));
    }

    /// Apply an event immediately, bypassing the ordered lanes
    pub async fn handle(&self, event: &ContentEvent) -> Result<ReconcileReport, ReconcileError> {
        self.reconciler.apply(event).await
    }

    /// Queue an event on its node's lane
    pub fn dispatch(&self, event: ContentEvent) {
        self.dispatcher.dispatch(event);
    }

    /// Wait until every queued event has been applied
    pub async fn settle(&self) {
        self.dispatcher.wait_idle().await;
    }

    /// Links matching a filter
    pub async fn find(&self, filter: &LinkFilter) -> Result<Vec<CourseAssetLink>, StoreError> {
        self.store.find(filter).await
    }

    /// Courses and content nodes referencing an asset
    pub async fn usage(&self, asset_id: &str) -> Result<AssetUsage, StoreError> {
        policy::asset_usage(self.store.as_ref(), asset_id).await
    }

    /// Delete an asset through the catalog, subject to its pre-delete hooks
    pub async fn delete_asset(&self, asset_id: &str) -> Result<Asset, ReconcileError> {
        self.catalog.delete(asset_id).await
    }

    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }
}
