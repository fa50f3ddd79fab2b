//! Core reconciliation logic.
//!
//! This module contains:
//! - Extractor: schema-driven asset reference discovery
//! - Reconciler: applies content events to the link index
//! - Policy: course cascade and the asset in-use guard
//! - Dispatcher: per-node ordering of event application
//! - Engine: the service facade tying it together

pub mod dispatcher;
pub mod engine;
pub mod extractor;
pub mod policy;
pub mod reconciler;

// Re-export commonly used types
pub use dispatcher::EventDispatcher;
pub use engine::CourseAssets;
pub use extractor::{asset_key, extract};
pub use policy::{asset_usage, cascade_course, AssetGuard};
pub use reconciler::{ReconcileReport, Reconciler, ReferenceFailure};
