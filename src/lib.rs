//! courseassets - Course asset reference index
//!
//! Tracks which stored assets (images, video, audio, documents) are
//! referenced from which content nodes, so "who uses this asset" can be
//! answered without scanning every course.
//!
//! # Architecture
//!
//! The index is derived state, kept current by content lifecycle events:
//! - A schema-driven extractor finds every asset reference in a document
//! - The reconciler converges a node's links onto its current references
//! - Deleting a course cascades to all of its links
//! - Deleting an asset is vetoed while any link still names it
//!
//! # Modules
//!
//! - `adapters`: Collaborator interfaces (schemas, asset catalog, event bus)
//! - `core`: Extraction, reconciliation, ordering, policies
//! - `domain`: Data structures (ContentNode, SchemaDescription, CourseAssetLink)
//! - `store`: Link persistence (memory, SQLite)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Preview which assets a document references
//! courseassets extract --schema page.schema.json --doc page.json
//!
//! # Apply recorded content events to the index
//! courseassets replay --events events.jsonl --assets assets.json
//!
//! # Who uses an asset?
//! courseassets usage <asset-id>
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod store;

// Re-export main types at crate root for convenience
pub use crate::core::{CourseAssets, ReconcileReport, Reconciler};
pub use domain::{Asset, ContentEvent, ContentNode, CourseAssetLink, LinkFilter, SchemaDescription};
pub use error::{CollaboratorError, ReconcileError, StoreError};
pub use store::{LinkStore, MemoryLinkStore, SqliteLinkStore};
