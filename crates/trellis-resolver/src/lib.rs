//! Dependency-graph resolution engine for the Trellis build tool
//!
//! This crate walks a project's package descriptors (dependencies, sibling
//! plugins, sibling configs), deduplicates the tree into a single resolved
//! set, and drives a pipeline of registered stages over the traversal.

pub mod conflict;
pub mod engine;
pub mod locate;
pub mod pipeline;
pub mod siblings;
pub mod stages;

// Re-export main types
pub use conflict::ConflictResult;
pub use engine::ResolutionEngine;
pub use locate::Located;
pub use pipeline::{PluginPipeline, Stage, StageResult};
pub use siblings::SiblingKind;
pub use stages::ResolvedStage;

/// Result type for resolver operations
pub use trellis_core::error::ResolverResult;
