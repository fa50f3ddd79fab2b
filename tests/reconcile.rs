//! Reconciliation Integration Tests
//!
//! Tests for applying content lifecycle events to the link index: insert,
//! update, replace and delete, with per-reference failure isolation.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use courseassets::adapters::{MemoryAssetCatalog, MemorySchemaRegistry};
use courseassets::core::Reconciler;
use courseassets::domain::{
    Asset, ContentEvent, CourseAssetLink, FieldDescriptor, LinkFilter, LinkPatch, NewLink,
    SchemaDescription,
};
use courseassets::error::{ReconcileError, StoreError};
use courseassets::store::{LinkStore, MemoryLinkStore};
use serde_json::{json, Value};
use tokio_test::assert_ok;

fn schemas() -> MemorySchemaRegistry {
    MemorySchemaRegistry::new()
        .with_schema(
            "page",
            SchemaDescription::new()
                .with_field("title", FieldDescriptor::Scalar)
                .with_field("hero", FieldDescriptor::AssetRef)
                .with_field(
                    "blocks",
                    FieldDescriptor::ArrayOfObject(
                        SchemaDescription::new().with_field("img", FieldDescriptor::AssetRef),
                    ),
                ),
        )
        .with_schema(
            "graphic",
            SchemaDescription::new().with_field("src", FieldDescriptor::AssetRef),
        )
}

fn catalog(asset_ids: &[&str]) -> MemoryAssetCatalog {
    MemoryAssetCatalog::with_assets(asset_ids.iter().map(|id| Asset::new(*id)))
}

/// Test harness holding a reconciler over in-memory collaborators
struct Harness {
    store: Arc<MemoryLinkStore>,
    reconciler: Reconciler,
}

impl Harness {
    fn new(asset_ids: &[&str]) -> Self {
        let store = Arc::new(MemoryLinkStore::new());
        let reconciler = Reconciler::new(
            store.clone(),
            Arc::new(schemas()),
            Arc::new(catalog(asset_ids)),
        );

        Self { store, reconciler }
    }

    async fn node_assets(&self, course_id: &str, content_id: &str) -> BTreeSet<String> {
        self.store
            .find(&LinkFilter::by_node(course_id, content_id))
            .await
            .unwrap()
            .into_iter()
            .map(|link| link.asset_id)
            .collect()
    }

    async fn total(&self) -> usize {
        self.store.find(&LinkFilter::all()).await.unwrap().len()
    }
}

fn page(id: &str, hero: &str, blocks: &[&str]) -> Value {
    let blocks: Vec<Value> = blocks.iter().map(|img| json!({ "img": img })).collect();
    json!({ "_id": id, "_courseId": "c1", "_type": "page", "hero": hero, "blocks": blocks })
}

fn set(ids: &[&str]) -> BTreeSet<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

#[tokio::test]
async fn test_insert_page_with_blocks() {
    let h = Harness::new(&["A1", "A2"]);

    let doc = json!({
        "_id": "p1",
        "_courseId": "c1",
        "_type": "page",
        "hero": "A1",
        "blocks": [ { "img": "A2" }, { "img": "A1" } ]
    });
    let report = assert_ok!(h.reconciler.apply(&ContentEvent::Insert { doc }).await);

    assert!(report.is_clean());
    assert_eq!(report.linked, vec!["A1", "A2"]);
    assert_eq!(h.node_assets("c1", "p1").await, set(&["A1", "A2"]));
    assert_eq!(h.total().await, 2);
}

#[tokio::test]
async fn test_insert_is_idempotent() {
    let h = Harness::new(&["A1", "A2"]);
    let event = ContentEvent::Insert { doc: page("p1", "A1", &["A2"]) };

    h.reconciler.apply(&event).await.unwrap();
    let second = h.reconciler.apply(&event).await.unwrap();

    assert!(second.linked.is_empty());
    assert_eq!(second.unchanged, vec!["A1", "A2"]);
    assert_eq!(h.total().await, 2);
}

#[tokio::test]
async fn test_update_converges_to_new_references() {
    let h = Harness::new(&["A1", "A2", "A3"]);

    h.reconciler
        .apply(&ContentEvent::Insert { doc: page("p1", "A1", &["A2"]) })
        .await
        .unwrap();

    let report = h
        .reconciler
        .apply(&ContentEvent::Update {
            old: page("p1", "A1", &["A2"]),
            new: page("p1", "A3", &["A2"]),
        })
        .await
        .unwrap();

    assert_eq!(report.action, "update");
    assert_eq!(report.removed, 2);
    assert_eq!(h.node_assets("c1", "p1").await, set(&["A2", "A3"]));
}

#[tokio::test]
async fn test_update_removing_every_reference() {
    let h = Harness::new(&["A1"]);

    h.reconciler
        .apply(&ContentEvent::Insert { doc: page("p1", "A1", &[]) })
        .await
        .unwrap();
    h.reconciler
        .apply(&ContentEvent::Update {
            old: page("p1", "A1", &[]),
            new: json!({ "_id": "p1", "_courseId": "c1", "_type": "page", "title": "No media" }),
        })
        .await
        .unwrap();

    assert!(h.node_assets("c1", "p1").await.is_empty());
}

#[tokio::test]
async fn test_replace_behaves_like_update() {
    let h = Harness::new(&["A1", "A2"]);

    h.reconciler
        .apply(&ContentEvent::Insert { doc: page("p1", "A1", &[]) })
        .await
        .unwrap();
    let report = h
        .reconciler
        .apply(&ContentEvent::Replace {
            old: page("p1", "A1", &[]),
            new: page("p1", "A2", &[]),
        })
        .await
        .unwrap();

    assert_eq!(report.action, "replace");
    assert_eq!(h.node_assets("c1", "p1").await, set(&["A2"]));
}

#[tokio::test]
async fn test_update_leaves_other_nodes_alone() {
    let h = Harness::new(&["A1", "A2"]);

    h.reconciler
        .apply(&ContentEvent::Insert { doc: page("p1", "A1", &[]) })
        .await
        .unwrap();
    h.reconciler
        .apply(&ContentEvent::Insert { doc: page("p2", "A1", &[]) })
        .await
        .unwrap();
    h.reconciler
        .apply(&ContentEvent::Update {
            old: page("p1", "A1", &[]),
            new: page("p1", "A2", &[]),
        })
        .await
        .unwrap();

    assert_eq!(h.node_assets("c1", "p2").await, set(&["A1"]));
    assert_eq!(h.node_assets("c1", "p1").await, set(&["A2"]));
}

#[tokio::test]
async fn test_unknown_asset_fails_alone() {
    let h = Harness::new(&["A1", "A3"]);

    let report = h
        .reconciler
        .apply(&ContentEvent::Insert { doc: page("p1", "A1", &["MISSING", "A3"]) })
        .await
        .unwrap();

    assert!(!report.is_clean());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].asset_id, "MISSING");
    assert_eq!(report.failures[0].error.code(), "NOT_FOUND");
    assert_eq!(h.node_assets("c1", "p1").await, set(&["A1", "A3"]));
}

#[tokio::test]
async fn test_malformed_event_applies_nothing() {
    let h = Harness::new(&["A1"]);

    let result = h
        .reconciler
        .apply(&ContentEvent::Insert { doc: json!({ "_type": "page", "hero": "A1" }) })
        .await;
    assert!(matches!(result, Err(ReconcileError::MalformedDocument(_))));

    let result = h
        .reconciler
        .apply(&ContentEvent::Update {
            old: page("p1", "A1", &[]),
            new: json!("not a document"),
        })
        .await;
    assert!(matches!(result, Err(ReconcileError::MalformedDocument(_))));

    assert_eq!(h.total().await, 0);
}

#[tokio::test]
async fn test_update_changing_id_is_rejected() {
    let h = Harness::new(&["A1"]);

    h.reconciler
        .apply(&ContentEvent::Insert { doc: page("p1", "A1", &[]) })
        .await
        .unwrap();
    let result = h
        .reconciler
        .apply(&ContentEvent::Update {
            old: page("p1", "A1", &[]),
            new: page("p2", "A1", &[]),
        })
        .await;

    assert!(matches!(result, Err(ReconcileError::MalformedDocument(_))));
    assert_eq!(h.node_assets("c1", "p1").await, set(&["A1"]));
}

#[tokio::test]
async fn test_content_without_schema_links_nothing() {
    let h = Harness::new(&["A1"]);

    let report = h
        .reconciler
        .apply(&ContentEvent::Insert {
            doc: json!({ "_id": "x1", "_courseId": "c1", "_type": "article", "hero": "A1" }),
        })
        .await
        .unwrap();

    assert!(report.is_clean());
    assert!(report.linked.is_empty());
    assert_eq!(h.total().await, 0);
}

#[tokio::test]
async fn test_component_resolves_schema_by_component_name() {
    let h = Harness::new(&["G1"]);

    h.reconciler
        .apply(&ContentEvent::Insert {
            doc: json!({
                "_id": "cmp1",
                "_courseId": "c1",
                "_type": "component",
                "_component": "graphic",
                "src": "G1"
            }),
        })
        .await
        .unwrap();

    assert_eq!(h.node_assets("c1", "cmp1").await, set(&["G1"]));
}

#[tokio::test]
async fn test_delete_removes_node_links() {
    let h = Harness::new(&["A1", "A2"]);

    h.reconciler
        .apply(&ContentEvent::Insert { doc: page("p1", "A1", &[]) })
        .await
        .unwrap();
    h.reconciler
        .apply(&ContentEvent::Insert { doc: page("p2", "A2", &[]) })
        .await
        .unwrap();

    let report = h
        .reconciler
        .apply(&ContentEvent::Delete { doc: page("p1", "A1", &[]) })
        .await
        .unwrap();

    assert_eq!(report.removed, 1);
    assert!(h.node_assets("c1", "p1").await.is_empty());
    assert_eq!(h.node_assets("c1", "p2").await, set(&["A2"]));
}

#[tokio::test]
async fn test_update_moving_course_is_rejected() {
    let h = Harness::new(&["A1", "A2"]);

    h.reconciler
        .apply(&ContentEvent::Insert { doc: page("p1", "A1", &[]) })
        .await
        .unwrap();

    let mut moved = page("p1", "A2", &[]);
    moved["_courseId"] = json!("c2");
    let result = h
        .reconciler
        .apply(&ContentEvent::Update { old: page("p1", "A1", &[]), new: moved })
        .await;

    assert!(matches!(result, Err(ReconcileError::MalformedDocument(_))));
    assert_eq!(h.node_assets("c1", "p1").await, set(&["A1"]));
    assert!(h.store.find(&LinkFilter::by_course("c2")).await.unwrap().is_empty());
}

/// Link store that refuses to insert links for one asset
struct RejectingStore {
    inner: MemoryLinkStore,
    rejected_asset: &'static str,
}

#[async_trait]
impl LinkStore for RejectingStore {
    fn name(&self) -> &str {
        "rejecting"
    }

    async fn find(&self, filter: &LinkFilter) -> Result<Vec<CourseAssetLink>, StoreError> {
        self.inner.find(filter).await
    }

    async fn insert(&self, link: NewLink) -> Result<CourseAssetLink, StoreError> {
        if link.asset_id == self.rejected_asset {
            return Err(StoreError::Backend("disk full".to_string()));
        }
        self.inner.insert(link).await
    }

    async fn update(&self, filter: &LinkFilter, patch: &LinkPatch) -> Result<usize, StoreError> {
        self.inner.update(filter, patch).await
    }

    async fn delete(&self, filter: &LinkFilter) -> Result<bool, StoreError> {
        self.inner.delete(filter).await
    }

    async fn delete_many(&self, filter: &LinkFilter) -> Result<usize, StoreError> {
        self.inner.delete_many(filter).await
    }
}

#[tokio::test]
async fn test_store_failure_fails_only_its_reference() {
    let links = MemoryLinkStore::new();
    let store = Arc::new(RejectingStore {
        inner: links.clone(),
        rejected_asset: "A2",
    });
    let reconciler = Reconciler::new(
        store,
        Arc::new(schemas()),
        Arc::new(catalog(&["A1", "A2", "A3"])),
    );

    let report = reconciler
        .apply(&ContentEvent::Insert { doc: page("p1", "A1", &["A2", "A3"]) })
        .await
        .unwrap();

    assert_eq!(report.linked, vec!["A1", "A3"]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].asset_id, "A2");
    assert_eq!(report.failures[0].error.code(), "STORE_ERROR");

    let stored: BTreeSet<String> = links
        .find(&LinkFilter::by_node("c1", "p1"))
        .await
        .unwrap()
        .into_iter()
        .map(|link| link.asset_id)
        .collect();
    assert_eq!(stored, set(&["A1", "A3"]));
}
