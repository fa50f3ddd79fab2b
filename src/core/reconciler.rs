//! Link reconciliation for content lifecycle events.
//!
//! On each event the reconciler brings the links of one content node into
//! agreement with the node's current payload:
//!
//! | Event              | Effect                                                    |
//! |--------------------|-----------------------------------------------------------|
//! | insert             | link every referenced asset that is not linked yet        |
//! | update / replace   | drop the node's links, then insert from the new document  |
//! | delete (course)    | drop every link of the course                             |
//! | delete (other)     | drop the node's links                                     |
//!
//! Asset references are resolved and linked concurrently. Each reference
//! succeeds or fails on its own; failures are collected into the report and
//! never roll back sibling references.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use super::extractor;
use super::policy;
use crate::adapters::{AssetCatalog, SchemaRegistry};
use crate::domain::{AssetFilter, ContentEvent, ContentNode, LinkFilter, NewLink};
use crate::error::{CollaboratorError, ReconcileError, StoreError};
use crate::store::LinkStore;

/// Outcome of applying one content event
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    /// Event action that produced this report
    pub action: &'static str,

    pub course_id: String,

    pub content_id: String,

    /// Links removed before (re)linking, or by a delete
    pub removed: usize,

    /// Asset ids newly linked (sorted)
    pub linked: Vec<String>,

    /// Asset ids that were already linked (sorted)
    pub unchanged: Vec<String>,

    /// References that could not be linked
    pub failures: Vec<ReferenceFailure>,
}

impl ReconcileReport {
    fn for_node(action: &'static str, node: &ContentNode) -> Self {
        Self {
            action,
            course_id: node.course_id.clone(),
            content_id: node.id.clone(),
            ..Default::default()
        }
    }

    /// Whether every reference was applied
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// A single asset reference that failed to link
#[derive(Debug, Clone)]
pub struct ReferenceFailure {
    pub asset_id: String,
    pub error: ReconcileError,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkOutcome {
    Created,
    Existing,
}

/// Keeps course asset links in step with content events
pub struct Reconciler {
    store: Arc<dyn LinkStore>,
    schemas: Arc<dyn SchemaRegistry>,
    assets: Arc<dyn AssetCatalog>,
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn LinkStore>,
        schemas: Arc<dyn SchemaRegistry>,
        assets: Arc<dyn AssetCatalog>,
    ) -> Self {
        Self {
            store,
            schemas,
            assets,
        }
    }

    /// Apply one content event
    #[instrument(skip(self, event), fields(action = event.action()))]
    pub async fn apply(&self, event: &ContentEvent) -> Result<ReconcileReport, ReconcileError> {
        match event {
            ContentEvent::Insert { doc } => {
                let node = ContentNode::from_document(doc)?;
                self.insert_links(&node).await
            }
            ContentEvent::Update { old, new } | ContentEvent::Replace { old, new } => {
                // Validate both sides before touching anything
                let old = ContentNode::from_document(old)?;
                let new = ContentNode::from_document(new)?;
                if old.id != new.id {
                    return Err(ReconcileError::MalformedDocument(format!(
                        "{} changes content id from {} to {}",
                        event.action(),
                        old.id,
                        new.id
                    )));
                }
                // Lanes are keyed by the new document, so a move between
                // courses would escape ordering against the old key
                if old.course_id != new.course_id {
                    return Err(ReconcileError::MalformedDocument(format!(
                        "{} moves content {} from course {} to {}",
                        event.action(),
                        old.id,
                        old.course_id,
                        new.course_id
                    )));
                }

                let removed = self.remove_node_links(&old).await?;
                let mut report = self.insert_links(&new).await?;
                report.action = event.action();
                report.removed = removed;
                Ok(report)
            }
            ContentEvent::Delete { doc } => {
                let node = ContentNode::from_document(doc)?;
                let mut report = ReconcileReport::for_node("delete", &node);
                report.removed = if node.is_course() {
                    policy::cascade_course(self.store.as_ref(), &node.id).await?
                } else {
                    self.remove_node_links(&node).await?
                };
                Ok(report)
            }
        }
    }

    /// Asset ids referenced by a node's payload.
    ///
    /// A node without a type, or whose schema cannot be resolved, references
    /// nothing.
    pub async fn extract_assets(&self, node: &ContentNode) -> BTreeSet<String> {
        let Some(name) = node.schema_name() else {
            debug!(content_id = %node.id, "Content has no type, no assets to extract");
            return BTreeSet::new();
        };

        match self.schemas.schema_for(name, &node.course_id).await {
            Ok(schema) => extractor::extract(&schema, &node.payload),
            Err(e) => {
                debug!(schema = name, "Schema lookup failed, treating as no assets: {}", e);
                BTreeSet::new()
            }
        }
    }

    /// Link every asset the node references; existing links are kept
    #[instrument(skip(self, node), fields(course_id = %node.course_id, content_id = %node.id))]
    pub async fn insert_links(&self, node: &ContentNode) -> Result<ReconcileReport, ReconcileError> {
        let mut report = ReconcileReport::for_node("insert", node);

        let asset_ids = self.extract_assets(node).await;
        if asset_ids.is_empty() {
            return Ok(report);
        }

        let mut tasks = JoinSet::new();
        for asset_id in asset_ids {
            let store = Arc::clone(&self.store);
            let assets = Arc::clone(&self.assets);
            let link = NewLink::new(&node.course_id, &node.id, asset_id);

            tasks.spawn(async move {
                let outcome = link_reference(store.as_ref(), assets.as_ref(), &link).await;
                (link.asset_id, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((asset_id, Ok(LinkOutcome::Created))) => report.linked.push(asset_id),
                Ok((asset_id, Ok(LinkOutcome::Existing))) => report.unchanged.push(asset_id),
                Ok((asset_id, Err(error))) => {
                    warn!(%asset_id, code = error.code(), "Failed to link asset: {}", error);
                    report.failures.push(ReferenceFailure { asset_id, error });
                }
                Err(e) => {
                    warn!("Reference task aborted: {}", e);
                    report.failures.push(ReferenceFailure {
                        asset_id: String::new(),
                        error: CollaboratorError::Unavailable(format!("reference task aborted: {}", e)).into(),
                    });
                }
            }
        }

        report.linked.sort();
        report.unchanged.sort();
        report.failures.sort_by(|a, b| a.asset_id.cmp(&b.asset_id));

        info!(
            linked = report.linked.len(),
            unchanged = report.unchanged.len(),
            failed = report.failures.len(),
            "Linked content assets"
        );
        Ok(report)
    }

    /// Drop every link produced by this node
    pub async fn remove_node_links(&self, node: &ContentNode) -> Result<usize, StoreError> {
        let removed = self
            .store
            .delete_many(&LinkFilter::by_node(&node.course_id, &node.id))
            .await?;
        debug!(course_id = %node.course_id, content_id = %node.id, removed, "Removed content links");
        Ok(removed)
    }
}

/// Resolve one reference against the catalog and make sure its link exists
async fn link_reference(
    store: &dyn LinkStore,
    assets: &dyn AssetCatalog,
    link: &NewLink,
) -> Result<LinkOutcome, ReconcileError> {
    let found = assets.find(&AssetFilter::by_id(&link.asset_id)).await?;
    if found.is_empty() {
        return Err(ReconcileError::asset_not_found(&link.asset_id));
    }

    if !store.find(&link.filter()).await?.is_empty() {
        return Ok(LinkOutcome::Existing);
    }

    match store.insert(link.clone()).await {
        Ok(record) => {
            // The asset may have been deleted after it was resolved. The
            // guard only sees links that exist when it runs, so check again
            // and withdraw the link if the asset is gone.
            if assets.find(&AssetFilter::by_id(&link.asset_id)).await?.is_empty() {
                store.delete(&LinkFilter::default().id(&record.id)).await?;
                warn!(asset_id = %link.asset_id, "Asset deleted while linking, link withdrawn");
                return Err(ReconcileError::asset_not_found(&link.asset_id));
            }
            debug!(id = %record.id, asset_id = %record.asset_id, "Created link");
            Ok(LinkOutcome::Created)
        }
        // Lost a race with a concurrent insert of the same triple
        Err(StoreError::Duplicate { .. }) => Ok(LinkOutcome::Existing),
        Err(e) => Err(e.into()),
    }
}
