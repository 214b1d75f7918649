//! The resolution engine.
//!
//! Walks the package tree from a starting directory: locate the manifest,
//! record it in the resolved set, run resolver hooks, then recurse into
//! declared dependencies, plugin siblings, and config siblings, in that
//! order, at depth + 1. A package name is fully resolved at most once per
//! run; every later reach runs updater hooks only.
//!
//! All mutable state (the resolved set, the root project info) is owned by
//! the engine instance and every resolution request is serialized through
//! `&mut self`, so the check-and-insert on the resolved set is atomic by
//! construction and needs no lock.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use semver::Version;
use tracing::{info, warn};
use trellis_core::error::{ResolverError, ResolverResult};
use trellis_core::manifest::PackageManifest;

use crate::conflict::{self, ConflictResult};
use crate::locate;
use crate::pipeline::PluginPipeline;
use crate::siblings::{self, SiblingKind};

/// One pending resolution request
enum Request {
    /// An explicit project directory: the resolution root or a discovered
    /// sibling candidate. Bypasses search-root construction.
    Dir(PathBuf),
    /// A dependency declared by `dependent_dir`'s package
    Dependency {
        name: String,
        dependent_dir: PathBuf,
    },
}

/// Orchestrates location, conflict checking, and sibling discovery over
/// the full graph, invoking pipeline hooks in the defined order.
///
/// Construct one engine per run; state never leaks across runs.
#[derive(Debug)]
pub struct ResolutionEngine {
    pipeline: PluginPipeline,
    resolved: BTreeMap<String, Version>,
    root_project_dir: Option<PathBuf>,
    root_manifest: Option<PackageManifest>,
}

impl ResolutionEngine {
    /// Create an engine driving the given pipeline
    pub fn new(pipeline: PluginPipeline) -> Self {
        Self {
            pipeline,
            resolved: BTreeMap::new(),
            root_project_dir: None,
            root_manifest: None,
        }
    }

    /// Resolve the full tree rooted at `start_path`.
    ///
    /// The starting directory must hold a package descriptor; it becomes
    /// the resolution root for search-root construction and sibling
    /// discovery.
    pub async fn resolve(&mut self, start_path: &Path) -> ResolverResult<()> {
        self.resolved.clear();
        self.root_project_dir = None;
        self.root_manifest = None;

        self.resolve_package(Request::Dir(start_path.to_path_buf()), 0, Vec::new())
            .await
    }

    /// The per-run memo of package name to resolved version
    pub fn resolved(&self) -> &BTreeMap<String, Version> {
        &self.resolved
    }

    /// Project directory of the resolution root, once resolved
    pub fn root_project_dir(&self) -> Option<&Path> {
        self.root_project_dir.as_deref()
    }

    /// Manifest of the resolution root, once resolved
    pub fn root_manifest(&self) -> Option<&PackageManifest> {
        self.root_manifest.as_ref()
    }

    /// Run every stage's post-resolver hook, in registration order.
    ///
    /// Call after [`resolve`](Self::resolve) completes and before
    /// [`run_writers`](Self::run_writers).
    pub fn run_post_resolvers(&mut self, output_dir: &Path) -> ResolverResult<()> {
        let Some(root) = self.root_manifest.clone() else {
            return Ok(());
        };

        for stage in self.pipeline.stages_mut() {
            let name = stage.name();
            stage
                .post_resolver(&root, output_dir)
                .map_err(|source| ResolverError::Stage {
                    stage: name.to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Run every stage's writer hook, in registration order, after all
    /// post-resolvers.
    pub fn run_writers(&mut self, output_dir: &Path) -> ResolverResult<()> {
        let Some(root) = self.root_manifest.clone() else {
            return Ok(());
        };

        for stage in self.pipeline.stages_mut() {
            let name = stage.name();
            stage
                .writer(&root, output_dir)
                .map_err(|source| ResolverError::Stage {
                    stage: name.to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    /// Recursive resolution step. Boxed because async recursion needs an
    /// indirection for the future type.
    fn resolve_package(
        &mut self,
        request: Request,
        depth: usize,
        ancestry: Vec<String>,
    ) -> Pin<Box<dyn Future<Output = ResolverResult<()>> + '_>> {
        Box::pin(async move {
            let (display_name, search_roots) = match &request {
                Request::Dir(dir) => (dir.to_string_lossy().into_owned(), vec![dir.clone()]),
                Request::Dependency {
                    name,
                    dependent_dir,
                } => {
                    let root_dir = self
                        .root_project_dir
                        .clone()
                        .unwrap_or_else(|| dependent_dir.clone());
                    (
                        name.clone(),
                        locate::dependency_search_roots(name, dependent_dir, &root_dir),
                    )
                },
            };

            let located = locate::locate(&display_name, &search_roots).await?;
            let manifest = located.manifest;
            let project_dir = located.project_dir;

            if self.root_project_dir.is_none() {
                self.root_project_dir = Some(project_dir.clone());
                self.root_manifest = Some(manifest.clone());
            }

            let mut ancestry = ancestry;
            ancestry.push(manifest.name.clone());

            // The memo is the deduplication point: an already-resolved
            // name gets updater hooks and nothing else.
            if self.resolved.contains_key(&manifest.name) {
                info!(
                    "Resolved {}@{} as already resolved. Updating...",
                    ancestry.join(" > "),
                    manifest.version
                );
                return self.run_updaters(&manifest, depth, &ancestry);
            }

            // Insert before anything that can suspend, so a re-reach
            // through any interleaved discovery sees the memo.
            self.resolved
                .insert(manifest.name.clone(), manifest.version.clone());

            info!(
                "Resolved {}@{} to {}",
                ancestry.join(" > "),
                manifest.version,
                project_dir.display()
            );
            self.run_resolvers(&manifest, &project_dir, depth, &ancestry)?;

            // Only packages that participate in the build traverse their
            // dependency edges; plain runtime libraries stop here.
            if manifest.build.is_some() {
                self.check_conflicts(&manifest)?;

                for dep in manifest.dependencies.keys() {
                    self.resolve_package(
                        Request::Dependency {
                            name: dep.clone(),
                            dependent_dir: project_dir.clone(),
                        },
                        depth + 1,
                        ancestry.clone(),
                    )
                    .await?;
                }
            }

            for kind in [SiblingKind::Plugin, SiblingKind::Config] {
                let root_dir = self
                    .root_project_dir
                    .clone()
                    .unwrap_or_else(|| project_dir.clone());
                let root_pack = self
                    .root_manifest
                    .clone()
                    .unwrap_or_else(|| manifest.clone());

                let candidates = siblings::find_siblings(
                    &manifest,
                    &project_dir,
                    &root_dir,
                    &root_pack,
                    depth,
                    kind,
                    &self.resolved,
                )
                .await;

                for dir in candidates {
                    self.resolve_package(Request::Dir(dir), depth + 1, ancestry.clone())
                        .await?;
                }
            }

            Ok(())
        })
    }

    /// Check every declared dependency that is already in the resolved
    /// set against its requested range.
    fn check_conflicts(&self, manifest: &PackageManifest) -> ResolverResult<()> {
        for (dep, range) in &manifest.dependencies {
            let Some(resolved) = self.resolved.get(dep) else {
                continue;
            };

            match conflict::check(range, resolved) {
                ConflictResult::Compatible => {},
                ConflictResult::CompatibleUnvalidatable => {
                    warn!(
                        "'{}' version '{}' was required by '{}' but is not a valid semver \
                         or semver range. '{}' was already resolved as version '{}' and \
                         will be kept.",
                        dep, range, manifest.name, dep, resolved
                    );
                },
                ConflictResult::Conflict => {
                    return Err(ResolverError::DependencyConflict {
                        dependent: manifest.name.clone(),
                        dependency: dep.clone(),
                        requested: range.clone(),
                        resolved: resolved.to_string(),
                    });
                },
            }
        }
        Ok(())
    }

    fn run_resolvers(
        &mut self,
        pack: &PackageManifest,
        project_dir: &Path,
        depth: usize,
        ancestry: &[String],
    ) -> ResolverResult<()> {
        for stage in self.pipeline.stages_mut() {
            let name = stage.name();
            stage
                .resolver(pack, project_dir, depth, ancestry)
                .map_err(|source| ResolverError::Stage {
                    stage: name.to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    fn run_updaters(
        &mut self,
        pack: &PackageManifest,
        depth: usize,
        ancestry: &[String],
    ) -> ResolverResult<()> {
        for stage in self.pipeline.stages_mut() {
            let name = stage.name();
            stage
                .updater(pack, depth, ancestry)
                .map_err(|source| ResolverError::Stage {
                    stage: name.to_string(),
                    source,
                })?;
        }
        Ok(())
    }
}
#[cfg(test)]
mod tests;
