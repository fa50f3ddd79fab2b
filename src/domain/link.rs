//! Course asset links: the derived index rows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// "This content node, within this course, references this asset."
///
/// Unique on `(course_id, content_id, asset_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseAssetLink {
    /// Row identifier
    pub id: String,

    pub course_id: String,

    pub content_id: String,

    pub asset_id: String,

    /// When the link was recorded
    pub created_at: DateTime<Utc>,
}

impl CourseAssetLink {
    /// Materialise a new link with a fresh id
    pub fn from_new(link: NewLink) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            course_id: link.course_id,
            content_id: link.content_id,
            asset_id: link.asset_id,
            created_at: Utc::now(),
        }
    }

    /// Whether the link matches every constraint set on a filter
    pub fn matches(&self, filter: &LinkFilter) -> bool {
        fn field_ok(constraint: &Option<String>, value: &str) -> bool {
            constraint.as_deref().map_or(true, |c| c == value)
        }

        field_ok(&filter.id, &self.id)
            && field_ok(&filter.course_id, &self.course_id)
            && field_ok(&filter.content_id, &self.content_id)
            && field_ok(&filter.asset_id, &self.asset_id)
    }

    /// Whether two links share the unique triple
    pub fn same_triple(&self, other: &CourseAssetLink) -> bool {
        self.course_id == other.course_id
            && self.content_id == other.content_id
            && self.asset_id == other.asset_id
    }

    /// Apply a patch in place
    pub fn apply(&mut self, patch: &LinkPatch) {
        if let Some(course_id) = &patch.course_id {
            self.course_id = course_id.clone();
        }
        if let Some(content_id) = &patch.content_id {
            self.content_id = content_id.clone();
        }
        if let Some(asset_id) = &patch.asset_id {
            self.asset_id = asset_id.clone();
        }
    }
}

/// Insert payload for a link
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLink {
    pub course_id: String,
    pub content_id: String,
    pub asset_id: String,
}

impl NewLink {
    pub fn new(
        course_id: impl Into<String>,
        content_id: impl Into<String>,
        asset_id: impl Into<String>,
    ) -> Self {
        Self {
            course_id: course_id.into(),
            content_id: content_id.into(),
            asset_id: asset_id.into(),
        }
    }

    /// Filter selecting exactly this triple
    pub fn filter(&self) -> LinkFilter {
        LinkFilter::default()
            .course(&self.course_id)
            .content(&self.content_id)
            .asset(&self.asset_id)
    }
}

/// Conjunctive filter over link fields; unset fields match anything
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
}

impl LinkFilter {
    /// Filter matching every link
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_course(course_id: impl Into<String>) -> Self {
        Self::default().course(course_id)
    }

    pub fn by_asset(asset_id: impl Into<String>) -> Self {
        Self::default().asset(asset_id)
    }

    /// Links produced by one content node
    pub fn by_node(course_id: impl Into<String>, content_id: impl Into<String>) -> Self {
        Self::default().course(course_id).content(content_id)
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn course(mut self, course_id: impl Into<String>) -> Self {
        self.course_id = Some(course_id.into());
        self
    }

    pub fn content(mut self, content_id: impl Into<String>) -> Self {
        self.content_id = Some(content_id.into());
        self
    }

    pub fn asset(mut self, asset_id: impl Into<String>) -> Self {
        self.asset_id = Some(asset_id.into());
        self
    }

    /// Whether no constraint is set
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.course_id.is_none() && self.content_id.is_none() && self.asset_id.is_none()
    }
}

/// Partial update of a link's triple
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub course_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
}
