//! Package location: turning a package name into a loaded descriptor and
//! a canonical project directory.
//!
//! A package is looked up across an ordered list of search roots. Within a
//! root, `package.json` is the primary descriptor; a legacy `bower.json`
//! alongside it contributes extra dependency edges, and a root holding
//! only `bower.json` still resolves. The project directory is found by
//! walking upward from the matching root until the path ends with the
//! trailing segments of the requested name, which keeps scoped names like
//! `@scope/pkg` intact.

use std::path::{Path, PathBuf};

use tracing::warn;
use trellis_core::error::{ResolverError, ResolverResult};
use trellis_core::manifest::PackageManifest;

/// Primary package descriptor file name
pub const PRIMARY_DESCRIPTOR: &str = "package.json";

/// Legacy dependency-manager descriptor file name
pub const LEGACY_DESCRIPTOR: &str = "bower.json";

/// A successfully located package
#[derive(Debug, Clone)]
pub struct Located {
    pub manifest: PackageManifest,
    pub project_dir: PathBuf,
}

/// Build the ordered search roots for a dependency.
///
/// Mirrors the store layout the engine supports: next to the dependent,
/// under the dependent's own dependency stores, under the resolution
/// root's stores, and finally a hoisted store two levels above the root
/// (monorepo layouts).
pub fn dependency_search_roots(
    name: &str,
    dependent_dir: &Path,
    root_dir: &Path,
) -> Vec<PathBuf> {
    let mut roots = Vec::new();

    if let Some(parent) = dependent_dir.parent() {
        roots.push(parent.join(name));
    }
    roots.push(dependent_dir.join("node_modules").join(name));
    roots.push(dependent_dir.join("bower_components").join(name));
    roots.push(root_dir.join("node_modules").join(name));
    roots.push(root_dir.join("bower_components").join(name));

    if let Some(hoisted) = root_dir.parent().and_then(Path::parent) {
        roots.push(hoisted.join("node_modules").join(name));
    }

    roots
}

/// Locate a package by trying each search root in order.
///
/// Unreadable or unparseable descriptors exclude a root with a warning
/// rather than failing the run; only exhausting every root is a
/// `PackageNotFound` error.
pub async fn locate(name: &str, search_roots: &[PathBuf]) -> ResolverResult<Located> {
    for root in search_roots {
        let Some(manifest) = load_descriptors(root).await else {
            continue;
        };

        let project_dir = project_dir_for(name, root)?;
        return Ok(Located {
            manifest,
            project_dir,
        });
    }

    Err(ResolverError::PackageNotFound {
        name: name.to_string(),
    })
}

/// Load and merge the descriptors present in one candidate root
async fn load_descriptors(root: &Path) -> Option<PackageManifest> {
    let primary_path = root.join(PRIMARY_DESCRIPTOR);
    let legacy_path = root.join(LEGACY_DESCRIPTOR);

    let primary = match tokio::fs::read_to_string(&primary_path).await {
        Ok(text) => match PackageManifest::from_json(&primary_path.to_string_lossy(), &text) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                warn!("Skipping unparseable descriptor: {e}");
                None
            },
        },
        Err(_) => None,
    };

    let legacy_text = tokio::fs::read_to_string(&legacy_path).await.ok();

    match (primary, legacy_text) {
        (Some(mut manifest), Some(text)) => {
            // merge any legacy dependencies so we look for those properly
            match PackageManifest::legacy_dependencies(&legacy_path.to_string_lossy(), &text) {
                Ok(deps) => manifest.merge_dependencies(&deps),
                Err(e) => warn!("Skipping unparseable legacy descriptor: {e}"),
            }
            Some(manifest)
        },
        (Some(manifest), None) => Some(manifest),
        (None, Some(text)) => {
            match PackageManifest::from_legacy_json(&legacy_path.to_string_lossy(), &text) {
                Ok(manifest) => Some(manifest),
                Err(e) => {
                    warn!("Skipping unparseable legacy descriptor: {e}");
                    None
                },
            }
        },
        (None, None) => None,
    }
}

/// Walk upward from the matching root until the directory path ends with
/// the trailing segments of `name`.
fn project_dir_for(name: &str, found_root: &Path) -> ResolverResult<PathBuf> {
    let mut dir = found_root.to_path_buf();

    while !ends_with_segments(&dir, name) {
        let Some(parent) = dir.parent() else {
            return Err(ResolverError::PathResolution {
                name: name.to_string(),
            });
        };
        dir = parent.to_path_buf();
    }

    Ok(dir)
}

/// Whether `dir`'s trailing components match the path segments of `name`
fn ends_with_segments(dir: &Path, name: &str) -> bool {
    let segments: Vec<&str> = name
        .split(['/', '\\'])
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();

    if segments.is_empty() {
        return true;
    }

    let components: Vec<_> = dir
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect();

    components.len() >= segments.len()
        && components[components.len() - segments.len()..] == segments[..]
}
