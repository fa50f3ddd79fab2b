//! Cascade and Guard Integration Tests
//!
//! Tests for the course delete cascade and the asset in-use guard, driven
//! through the `CourseAssets` service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use courseassets::adapters::{MemoryAssetCatalog, MemorySchemaRegistry};
use courseassets::domain::{
    Asset, ContentEvent, CourseAssetLink, FieldDescriptor, LinkFilter, LinkPatch, NewLink,
    SchemaDescription,
};
use courseassets::error::{ReconcileError, StoreError};
use courseassets::store::{LinkStore, MemoryLinkStore};
use courseassets::CourseAssets;
use serde_json::{json, Value};

fn service(catalog: Arc<MemoryAssetCatalog>) -> CourseAssets {
    service_with_store(Arc::new(MemoryLinkStore::new()), catalog)
}

fn service_with_store(
    store: Arc<dyn LinkStore>,
    catalog: Arc<MemoryAssetCatalog>,
) -> CourseAssets {
    let schemas = MemorySchemaRegistry::new()
        .with_schema(
            "course",
            SchemaDescription::new().with_field("heroImage", FieldDescriptor::AssetRef),
        )
        .with_schema(
            "page",
            SchemaDescription::new().with_field("hero", FieldDescriptor::AssetRef),
        );

    CourseAssets::new(store, Arc::new(schemas), catalog)
}

fn page(course_id: &str, id: &str, hero: &str) -> Value {
    json!({ "_id": id, "_courseId": course_id, "_type": "page", "hero": hero })
}

fn course(id: &str) -> Value {
    json!({ "_id": id, "_type": "course", "heroImage": "cover" })
}

#[tokio::test]
async fn test_course_delete_cascades() {
    let catalog = Arc::new(MemoryAssetCatalog::with_assets(
        ["cover", "a1", "a2", "a3"].map(Asset::new),
    ));
    let index = service(catalog);

    index.handle(&ContentEvent::Insert { doc: course("c1") }).await.unwrap();
    for (i, asset) in ["a1", "a2", "a3", "a1"].iter().enumerate() {
        let doc = page("c1", &format!("p{}", i), asset);
        index.handle(&ContentEvent::Insert { doc }).await.unwrap();
    }
    index.handle(&ContentEvent::Insert { doc: page("c2", "q1", "a1") }).await.unwrap();

    assert_eq!(index.find(&LinkFilter::by_course("c1")).await.unwrap().len(), 5);

    let report = index.handle(&ContentEvent::Delete { doc: course("c1") }).await.unwrap();
    assert_eq!(report.removed, 5);

    assert!(index.find(&LinkFilter::by_course("c1")).await.unwrap().is_empty());
    assert_eq!(index.find(&LinkFilter::by_course("c2")).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_course_update_keeps_child_links() {
    let catalog = Arc::new(MemoryAssetCatalog::with_assets(["cover", "cover2", "a1"].map(Asset::new)));
    let index = service(catalog);

    index.handle(&ContentEvent::Insert { doc: course("c1") }).await.unwrap();
    index.handle(&ContentEvent::Insert { doc: page("c1", "p1", "a1") }).await.unwrap();

    let mut updated = course("c1");
    updated["heroImage"] = json!("cover2");
    index
        .handle(&ContentEvent::Update { old: course("c1"), new: updated })
        .await
        .unwrap();

    let course_links = index.find(&LinkFilter::by_node("c1", "c1")).await.unwrap();
    assert_eq!(course_links.len(), 1);
    assert_eq!(course_links[0].asset_id, "cover2");
    assert_eq!(index.find(&LinkFilter::by_node("c1", "p1")).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_guard_blocks_until_last_link_is_gone() {
    let catalog = Arc::new(MemoryAssetCatalog::with_assets(["a1"].map(Asset::new)));
    let index = service(catalog.clone());
    index.install_guard();

    index.handle(&ContentEvent::Insert { doc: page("c1", "p1", "a1") }).await.unwrap();
    index.handle(&ContentEvent::Insert { doc: page("c2", "p2", "a1") }).await.unwrap();

    let usage = index.usage("a1").await.unwrap();
    assert_eq!(usage.courses, vec!["c1", "c2"]);
    assert_eq!(usage.contents, vec!["p1", "p2"]);

    match index.delete_asset("a1").await {
        Err(ReconcileError::ResourceInUse { id, courses, .. }) => {
            assert_eq!(id, "a1");
            assert_eq!(courses, vec!["c1", "c2"]);
        }
        other => panic!("expected RESOURCE_IN_USE, got {:?}", other),
    }
    assert!(catalog.contains("a1").await);

    index.handle(&ContentEvent::Delete { doc: page("c1", "p1", "a1") }).await.unwrap();
    let err = index.delete_asset("a1").await.unwrap_err();
    assert_eq!(err.code(), "RESOURCE_IN_USE");
    assert!(err.to_string().contains("1 course"));

    index.handle(&ContentEvent::Delete { doc: page("c2", "p2", "a1") }).await.unwrap();
    let deleted = index.delete_asset("a1").await.unwrap();
    assert_eq!(deleted.id, "a1");
    assert!(!catalog.contains("a1").await);
}

#[tokio::test]
async fn test_guard_allows_unused_asset() {
    let catalog = Arc::new(MemoryAssetCatalog::with_assets(["a1", "a2"].map(Asset::new)));
    let index = service(catalog.clone());
    index.install_guard();

    index.handle(&ContentEvent::Insert { doc: page("c1", "p1", "a1") }).await.unwrap();

    assert!(index.usage("a2").await.unwrap().is_unused());
    index.delete_asset("a2").await.unwrap();
    assert_eq!(catalog.len().await, 1);
}

#[tokio::test]
async fn test_guard_released_by_course_cascade() {
    let catalog = Arc::new(MemoryAssetCatalog::with_assets(["cover", "a1"].map(Asset::new)));
    let index = service(catalog);
    index.install_guard();

    index.handle(&ContentEvent::Insert { doc: page("c1", "p1", "a1") }).await.unwrap();
    assert!(index.delete_asset("a1").await.is_err());

    index.handle(&ContentEvent::Delete { doc: course("c1") }).await.unwrap();
    assert!(index.delete_asset("a1").await.is_ok());
}

#[tokio::test]
async fn test_delete_unknown_asset() {
    let catalog = Arc::new(MemoryAssetCatalog::new());
    let index = service(catalog);
    index.install_guard();

    let err = index.delete_asset("ghost").await.unwrap_err();
    assert_eq!(err.code(), "NOT_FOUND");
}

/// Link store whose per-node lookups are slow, widening the window between
/// resolving an asset and inserting its link
struct SlowNodeLookups {
    inner: MemoryLinkStore,
    delay: Duration,
}

#[async_trait]
impl LinkStore for SlowNodeLookups {
    fn name(&self) -> &str {
        "slow"
    }

    async fn find(&self, filter: &LinkFilter) -> Result<Vec<CourseAssetLink>, StoreError> {
        if filter.content_id.is_some() {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.find(filter).await
    }

    async fn insert(&self, link: NewLink) -> Result<CourseAssetLink, StoreError> {
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
async fn test_asset_deleted_mid_insert_leaves_no_link() {
    let links = MemoryLinkStore::new();
    let store = Arc::new(SlowNodeLookups {
        inner: links.clone(),
        delay: Duration::from_millis(200),
    });
    let catalog = Arc::new(MemoryAssetCatalog::with_assets(["a1"].map(Asset::new)));
    let index = Arc::new(service_with_store(store, catalog.clone()));
    index.install_guard();

    let inserting = {
        let index = Arc::clone(&index);
        tokio::spawn(async move {
            index
                .handle(&ContentEvent::Insert { doc: page("c1", "p1", "a1") })
                .await
        })
    };

    // Asset is resolved, the link is not written yet
    tokio::time::sleep(Duration::from_millis(50)).await;
    let deleted = index.delete_asset("a1").await.unwrap();
    assert_eq!(deleted.id, "a1");

    let report = inserting.await.unwrap().unwrap();
    assert!(report.linked.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].asset_id, "a1");
    assert_eq!(report.failures[0].error.code(), "NOT_FOUND");

    assert!(!catalog.contains("a1").await);
    assert!(links.find(&LinkFilter::by_asset("a1")).await.unwrap().is_empty());
}
