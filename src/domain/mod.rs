//! Domain types for the course asset index.
//!
//! This module contains the core data structures:
//! - Content: validated content nodes and lifecycle events
//! - Schema: field descriptors used to locate asset references
//! - Link: the derived course/content/asset join rows
//! - Asset: catalog identity and usage reports

pub mod asset;
pub mod content;
pub mod link;
pub mod schema;

// Re-export commonly used types
pub use asset::{Asset, AssetFilter, AssetUsage};
pub use content::{scalar_key, ContentEvent, ContentNode, NodeKey, COMPONENT_TYPE, COURSE_TYPE};
pub use link::{CourseAssetLink, LinkFilter, LinkPatch, NewLink};
pub use schema::{FieldDescriptor, SchemaDescription, ASSET_TYPE_TAG};
