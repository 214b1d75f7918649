//! The plugin pipeline: the registry of stages the engine drives.
//!
//! A stage implements whichever of the four hooks it needs; the defaults
//! are no-ops. The engine is the sole caller of `resolver` and `updater`,
//! and guarantees their call order; the driver runs `post_resolver` then
//! `writer` once each after traversal completes. Stages are registered
//! explicitly through the builder; registration order is call order.

use std::path::Path;

use trellis_core::manifest::PackageManifest;

/// Outcome of a stage hook. Any error aborts the run, surfaced unchanged.
pub type StageResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// A pipeline stage contributing zero or more of the four hook kinds.
///
/// Hook invocations for a given stage are sequential relative to that
/// stage's own prior invocations; a stage never sees concurrent calls.
pub trait Stage {
    /// Stage name used in logs and error reports
    fn name(&self) -> &'static str;

    /// Called once per newly resolved package, before its children are
    /// traversed.
    fn resolver(
        &mut self,
        _pack: &PackageManifest,
        _project_dir: &Path,
        _depth: usize,
        _ancestry: &[String],
    ) -> StageResult {
        Ok(())
    }

    /// Called on every re-visit of an already-resolved package, typically
    /// to reconcile the stage's contribution records against the new
    /// ancestry.
    fn updater(
        &mut self,
        _pack: &PackageManifest,
        _depth: usize,
        _ancestry: &[String],
    ) -> StageResult {
        Ok(())
    }

    /// Called once after the whole tree has been visited, before any
    /// writer runs.
    fn post_resolver(&mut self, _root: &PackageManifest, _output_dir: &Path) -> StageResult {
        Ok(())
    }

    /// Called once after all post-resolvers, to emit generated artifacts.
    fn writer(&mut self, _root: &PackageManifest, _output_dir: &Path) -> StageResult {
        Ok(())
    }
}

/// Ordered registry of pipeline stages
#[derive(Default)]
pub struct PluginPipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl std::fmt::Debug for PluginPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginPipeline")
            .field("stages", &self.stages.iter().map(|s| s.name()).collect::<Vec<_>>())
            .finish()
    }
}

impl PluginPipeline {
    /// Create an empty pipeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a stage; registration order is hook call order
    pub fn register(mut self, stage: Box<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    /// Number of registered stages
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the pipeline has no stages
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Iterate over stages mutably, in registration order
    pub fn stages_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Stage>> {
        self.stages.iter_mut()
    }
}
