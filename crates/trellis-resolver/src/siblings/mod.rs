//! Sibling plugin/config discovery.
//!
//! Siblings are packages layered onto a "pluggable" host by filesystem
//! naming convention rather than by a declared dependency edge: a
//! directory named `<host>-plugin-*` or `<host>-config-*` sitting next to
//! the host, in its local dependency store, or in the resolution root's
//! store. Everything here is non-fatal; a candidate that fails a check is
//! excluded with a logged warning and the run continues.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use semver::{Version, VersionReq};
use tracing::{error, warn};
use trellis_core::manifest::PackageManifest;
use trellis_core::rank::{CONFIG_INFIX, PLUGIN_INFIX};

use crate::locate::PRIMARY_DESCRIPTOR;

/// The two sibling flavors, each with a fixed name infix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiblingKind {
    Plugin,
    Config,
}

impl SiblingKind {
    /// The name infix marking siblings of this kind
    pub fn infix(self) -> &'static str {
        match self {
            SiblingKind::Plugin => PLUGIN_INFIX,
            SiblingKind::Config => CONFIG_INFIX,
        }
    }
}

/// A sibling candidate that passed every filter
#[derive(Debug)]
struct Candidate {
    dir: PathBuf,
    priority: i64,
}

/// Find sibling packages of the given kind for `pack`.
///
/// Returns candidate project directories sorted ascending by the
/// sibling's declared priority (default 0), ties in listing order. The
/// host must be pluggable; a nested application never pulls siblings when
/// the resolution root is itself an application.
pub async fn find_siblings(
    pack: &PackageManifest,
    project_dir: &Path,
    root_dir: &Path,
    root_manifest: &PackageManifest,
    depth: usize,
    kind: SiblingKind,
    resolved: &BTreeMap<String, Version>,
) -> Vec<PathBuf> {
    if !pack.is_pluggable() {
        return Vec::new();
    }

    if root_manifest.is_app() && pack.is_app() && depth > 0 {
        return Vec::new();
    }

    let prefix = format!("{}{}", pack.name, kind.infix());
    let search_dirs: Vec<PathBuf> = [
        project_dir.parent().map(Path::to_path_buf),
        Some(project_dir.join("node_modules")),
        Some(root_dir.join("node_modules")),
    ]
    .into_iter()
    .flatten()
    .collect();

    let mut candidates = Vec::new();
    for dir in &search_dirs {
        scan_dir(pack, dir, &prefix, kind, resolved, &mut candidates).await;
    }

    candidates.sort_by_key(|c| c.priority);
    candidates.into_iter().map(|c| c.dir).collect()
}

/// Scan one candidate directory, appending survivors to `candidates`
async fn scan_dir(
    pack: &PackageManifest,
    dir: &Path,
    prefix: &str,
    kind: SiblingKind,
    resolved: &BTreeMap<String, Version>,
    candidates: &mut Vec<Candidate>,
) {
    // a missing store directory just means no siblings there
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return;
    };

    let mut names = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        if let Ok(name) = entry.file_name().into_string() {
            if name.starts_with(prefix) {
                names.push(name);
            }
        }
    }
    names.sort();

    for name in names {
        let entry_dir = dir.join(&name);
        if let Some(candidate) = check_candidate(pack, &entry_dir, kind, resolved).await {
            candidates.push(candidate);
        }
    }
}

/// Validate one name-matched entry against the host package
async fn check_candidate(
    pack: &PackageManifest,
    entry_dir: &Path,
    kind: SiblingKind,
    resolved: &BTreeMap<String, Version>,
) -> Option<Candidate> {
    let descriptor_path = entry_dir.join(PRIMARY_DESCRIPTOR);
    let text = match tokio::fs::read_to_string(&descriptor_path).await {
        Ok(text) => text,
        Err(_) => {
            error!("{} does not exist", descriptor_path.display());
            return None;
        },
    };

    let sibling = match PackageManifest::from_json(&descriptor_path.to_string_lossy(), &text) {
        Ok(manifest) => manifest,
        Err(e) => {
            error!("Excluding sibling candidate: {e}");
            return None;
        },
    };

    // already visited through another path, notably plugin-of-plugin builds
    if resolved.contains_key(&sibling.name) {
        return None;
    }

    let candidate = Candidate {
        dir: entry_dir.to_path_buf(),
        priority: sibling.priority(),
    };

    // config packs are trusted without dependency validation
    if kind == SiblingKind::Config || sibling.is_config() {
        return Some(candidate);
    }

    let Some(required) = sibling.dependencies.get(&pack.name) else {
        warn!(
            "The {} plugin {} should have a dependency definition for {}",
            pack.name, sibling.name, pack.name
        );
        return None;
    };

    if !is_semver_specifier(required) {
        // some other sort of dependency (e.g. git); take their word for it
        return Some(candidate);
    }

    match VersionReq::parse(required) {
        Ok(req) if req.matches(&pack.version) => Some(candidate),
        _ => {
            warn!(
                "{} requires {} version {} but the version is {}",
                sibling.name, pack.name, required, pack.version
            );
            None
        },
    }
}

/// Whether a dependency specifier looks like a semver range (as opposed
/// to a git/URL/path reference we should trust without validation)
fn is_semver_specifier(range: &str) -> bool {
    let rest = range
        .strip_prefix(['=', '~', '^'])
        .unwrap_or(range);

    rest.chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit() || c == '.')
}
