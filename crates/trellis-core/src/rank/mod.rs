//! Precedence groups and contribution-record reconciliation.
//!
//! A resolution run can reach the same package along several ancestry
//! paths (diamond dependencies), and the traversal order of those paths is
//! not fixed. Pipeline stages therefore keep one [`ContributionRecord`]
//! per package and funnel every re-visit through [`reconcile`], so the
//! record converges to the same group/depth no matter which path was
//! walked first. [`sort_key`] then gives a stable ascending order in which
//! contributions should be merged, later entries overriding earlier ones.
//!
//! No I/O happens here; every function is pure.

use serde::{Deserialize, Serialize};

use crate::manifest::PackageManifest;

/// Name infix marking a sibling plugin package
pub const PLUGIN_INFIX: &str = "-plugin-";

/// Name infix marking a sibling config package
pub const CONFIG_INFIX: &str = "-config-";

/// Coarse precedence class derived from ancestry.
///
/// Lower numeric value means resolved closer to the application itself.
/// The gaps between values are deliberate: group dominates depth in
/// [`sort_key`] by orders of magnitude.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Group {
    Base,
    Plugin,
    Config,
}

impl Group {
    /// Numeric value used in sort keys
    pub fn value(self) -> i64 {
        match self {
            Group::Base => 0,
            Group::Plugin => 1000,
            Group::Config => 10_000,
        }
    }
}

/// A pipeline stage's bookkeeping entry for one contributing package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionRecord {
    pub name: String,
    /// Explicit priority declared by the package, if any
    pub priority: Option<i64>,
    pub group: Group,
    pub depth: usize,
}

impl ContributionRecord {
    pub fn new(name: String, priority: Option<i64>, group: Group, depth: usize) -> Self {
        Self {
            name,
            priority,
            group,
            depth,
        }
    }
}

/// Compute the precedence group of a package from its ancestry stack.
///
/// The stack runs from the resolution root to the package itself. The root
/// entry is skipped; any remaining ancestor whose name starts with the
/// root package's name plus a dash and carries a config infix puts the
/// package in the Config group, a plugin infix puts it in Plugin,
/// otherwise Base. Config dominates Plugin when both appear in the same
/// ancestry.
///
/// Anchoring to the root's name keeps nested applications from dragging
/// each other's plugins into a privileged group.
pub fn group_of(root_name: &str, ancestry: &[String]) -> Group {
    let anchor = format!("{root_name}-");
    let descendants = ancestry.iter().skip(1);

    let mut group = Group::Base;
    for name in descendants {
        if !name.starts_with(&anchor) {
            continue;
        }

        if name.contains(CONFIG_INFIX) {
            return Group::Config;
        }

        if name.contains(PLUGIN_INFIX) {
            group = Group::Plugin;
        }
    }

    group
}

/// Stable sort key for a contribution record.
///
/// An explicit priority wins outright; otherwise `group - depth`, so that
/// Config sorts after Plugin sorts after Base regardless of depth, and
/// within one group a shallower discovery sorts later (and therefore wins)
/// over a deeper one.
pub fn sort_key(record: &ContributionRecord) -> i64 {
    record
        .priority
        .unwrap_or(record.group.value() - record.depth as i64)
}

/// Reconcile a record against a re-visit through a different ancestry.
///
/// A strictly more privileged group replaces both group and depth
/// outright. Within the same group the maximum observed depth is kept. A
/// less privileged re-visit leaves the record untouched.
pub fn reconcile(record: &mut ContributionRecord, new_group: Group, new_depth: usize) {
    if new_group < record.group {
        record.group = new_group;
        record.depth = new_depth;
    } else if new_group == record.group {
        record.depth = record.depth.max(new_depth);
    }
}

/// Sort contribution records ascending by [`sort_key`].
///
/// The sort is stable, so records with equal keys keep their insertion
/// order.
pub fn sort_records(records: &mut [ContributionRecord]) {
    records.sort_by_key(sort_key);
}

/// Load-order priority for a package's own artifacts.
///
/// An explicit `build.priority` wins; otherwise depth decides
/// (`-depth * 10`), bumped by one for config packs and for plugins of the
/// root so they load after the package they extend.
pub fn package_priority(pack: &PackageManifest, depth: usize, root: &PackageManifest) -> i64 {
    if let Some(priority) = pack.build.as_ref().and_then(|b| b.priority) {
        return priority;
    }

    let mut priority = -(depth as i64) * 10;
    if pack.is_config() || pack.is_plugin_of(root) {
        priority += 1;
    }

    priority
}
