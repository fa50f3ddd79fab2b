//! Assets as seen by the index: identity only.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A catalogued asset. Only `id` is consumed; other attributes ride along.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    #[serde(alias = "_id")]
    pub id: String,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Asset {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            extra: Map::new(),
        }
    }

    /// Attach an extra attribute
    pub fn with_attr(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Catalog query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetFilter {
    pub id: Option<String>,
}

impl AssetFilter {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self { id: Some(id.into()) }
    }

    pub fn matches(&self, asset: &Asset) -> bool {
        self.id.as_deref().map_or(true, |id| id == asset.id)
    }
}

/// Who uses an asset, as derived from the link index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetUsage {
    pub asset_id: String,

    /// Sorted, de-duplicated course ids
    pub courses: Vec<String>,

    /// Sorted, de-duplicated content ids
    pub contents: Vec<String>,
}

impl AssetUsage {
    pub fn is_unused(&self) -> bool {
        self.courses.is_empty() && self.contents.is_empty()
    }
}
