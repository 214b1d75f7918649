//! Stage that records every resolved package and writes `resolved.json`.
//!
//! One contribution record is kept per package; re-visits are reconciled
//! through the rank library so the emitted order is independent of the
//! traversal order. The output lists packages ascending by sort key, so
//! later entries are the more overriding ones.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;
use trellis_core::manifest::PackageManifest;
use trellis_core::rank::{self, ContributionRecord, Group};

use crate::pipeline::{Stage, StageResult};

/// One emitted entry of `resolved.json`
#[derive(Debug, Serialize)]
struct ResolvedEntry<'a> {
    name: &'a str,
    path: String,
    group: Group,
    depth: usize,
}

struct Entry {
    record: ContributionRecord,
    project_dir: PathBuf,
}

/// Built-in stage writing the resolved-package index
#[derive(Default)]
pub struct ResolvedStage {
    root_name: Option<String>,
    entries: Vec<Entry>,
}

impl ResolvedStage {
    pub fn new() -> Self {
        Self::default()
    }

    fn find_mut(&mut self, name: &str) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.record.name == name)
    }
}

impl Stage for ResolvedStage {
    fn name(&self) -> &'static str {
        "resolved"
    }

    fn resolver(
        &mut self,
        pack: &PackageManifest,
        project_dir: &Path,
        depth: usize,
        ancestry: &[String],
    ) -> StageResult {
        let root_name = self
            .root_name
            .get_or_insert_with(|| pack.name.clone())
            .clone();

        let group = rank::group_of(&root_name, ancestry);
        let priority = pack.build.as_ref().and_then(|b| b.priority);

        self.entries.push(Entry {
            record: ContributionRecord::new(pack.name.clone(), priority, group, depth),
            project_dir: project_dir.to_path_buf(),
        });

        Ok(())
    }

    fn updater(&mut self, pack: &PackageManifest, depth: usize, ancestry: &[String]) -> StageResult {
        let Some(root_name) = self.root_name.clone() else {
            return Ok(());
        };

        let group = rank::group_of(&root_name, ancestry);
        if let Some(entry) = self.find_mut(&pack.name) {
            rank::reconcile(&mut entry.record, group, depth);
        }

        Ok(())
    }

    fn writer(&mut self, _root: &PackageManifest, output_dir: &Path) -> StageResult {
        self.entries
            .sort_by_key(|entry| rank::sort_key(&entry.record));

        let listing: Vec<ResolvedEntry<'_>> = self
            .entries
            .iter()
            .map(|entry| ResolvedEntry {
                name: &entry.record.name,
                path: entry.project_dir.display().to_string(),
                group: entry.record.group,
                depth: entry.record.depth,
            })
            .collect();

        let file = output_dir.join("resolved.json");
        info!("Writing {}", file.display());
        std::fs::write(&file, serde_json::to_string_pretty(&listing)?)?;

        Ok(())
    }
}
