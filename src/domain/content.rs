//! Content nodes and the lifecycle events that carry them.
//!
//! Content documents arrive as raw JSON from the content service. Identity
//! lives in underscore-prefixed keys (`_id`, `_courseId`, `_type`,
//! `_component`); everything else is payload whose shape is described by the
//! node's schema.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ReconcileError;

/// Type discriminator of top-level course nodes
pub const COURSE_TYPE: &str = "course";

/// Type discriminator of component nodes (schema resolved by `_component`)
pub const COMPONENT_TYPE: &str = "component";

/// A validated content node
#[derive(Debug, Clone, PartialEq)]
pub struct ContentNode {
    /// Content identifier (`_id`)
    pub id: String,

    /// Owning course (`_courseId`; equals `id` for course nodes)
    pub course_id: String,

    /// Declared type (`_type`)
    pub kind: Option<String>,

    /// Component name (`_component`), only meaningful for components
    pub component: Option<String>,

    /// The full document
    pub payload: Value,
}

impl ContentNode {
    /// Validate a raw content document.
    ///
    /// Fails when `_id` is missing, or when `_courseId` is missing on a
    /// non-course node. No link mutation should be attempted on failure.
    pub fn from_document(doc: &Value) -> Result<Self, ReconcileError> {
        if !doc.is_object() {
            return Err(ReconcileError::MalformedDocument(
                "content document is not an object".to_string(),
            ));
        }

        let node = Self::lenient(doc);
        if node.id.is_empty() {
            return Err(ReconcileError::MalformedDocument("missing _id".to_string()));
        }
        if node.course_id.is_empty() {
            return Err(ReconcileError::MalformedDocument(format!(
                "missing _courseId on content {}",
                node.id
            )));
        }

        Ok(node)
    }

    /// Read whatever identity the document carries, never failing.
    ///
    /// Missing identifiers are left empty. Only suitable for read-only uses
    /// such as extraction previews.
    pub fn lenient(doc: &Value) -> Self {
        let field = |key: &str| doc.get(key).and_then(scalar_key);
        let text = |key: &str| doc.get(key).and_then(Value::as_str).map(str::to_string);

        let id = field("_id").unwrap_or_default();
        let kind = text("_type");
        let course_id = match field("_courseId") {
            Some(course_id) => course_id,
            None if kind.as_deref() == Some(COURSE_TYPE) => id.clone(),
            None => String::new(),
        };

        Self {
            id,
            course_id,
            kind,
            component: text("_component"),
            payload: doc.clone(),
        }
    }

    /// Whether this is a top-level course node
    pub fn is_course(&self) -> bool {
        self.kind.as_deref() == Some(COURSE_TYPE)
    }

    /// Name to resolve this node's schema by.
    ///
    /// Components are described per component plugin; everything else by type.
    /// `None` means the node has no type discriminator.
    pub fn schema_name(&self) -> Option<&str> {
        match self.kind.as_deref() {
            Some(COMPONENT_TYPE) => self.component.as_deref().or(self.kind.as_deref()),
            other => other,
        }
    }

    /// Ordering key for this node
    pub fn key(&self) -> NodeKey {
        NodeKey {
            course_id: self.course_id.clone(),
            content_id: self.id.clone(),
        }
    }
}

/// Identity of a content node within its course
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeKey {
    pub course_id: String,
    pub content_id: String,
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.course_id, self.content_id)
    }
}

/// Lifecycle notification emitted by the content service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ContentEvent {
    /// A document was created
    Insert { doc: Value },

    /// A document was patched
    Update { old: Value, new: Value },

    /// A document was replaced wholesale
    Replace { old: Value, new: Value },

    /// A document was removed
    Delete { doc: Value },
}

impl ContentEvent {
    /// Action name, as used in logs and reports
    pub fn action(&self) -> &'static str {
        match self {
            ContentEvent::Insert { .. } => "insert",
            ContentEvent::Update { .. } => "update",
            ContentEvent::Replace { .. } => "replace",
            ContentEvent::Delete { .. } => "delete",
        }
    }

    /// The document that identifies the node this event targets
    pub fn subject(&self) -> &Value {
        match self {
            ContentEvent::Insert { doc } | ContentEvent::Delete { doc } => doc,
            ContentEvent::Update { new, .. } | ContentEvent::Replace { new, .. } => new,
        }
    }

    /// Ordering key, or `None` when the subject lacks identifiers
    pub fn lane_key(&self) -> Option<NodeKey> {
        ContentNode::from_document(self.subject())
            .ok()
            .map(|node| node.key())
    }
}

/// Coerce a scalar JSON value into a stable string key.
///
/// Strings are taken as-is (empty strings are rejected), numbers and booleans
/// use their JSON text. Null, objects and arrays yield `None`.
pub fn scalar_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
