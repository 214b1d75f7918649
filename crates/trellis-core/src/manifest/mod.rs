//! Package descriptor types and parsing.
//!
//! Models the fields the resolution engine reads from `package.json` (and
//! the legacy `bower.json` descriptor): name, version, dependency edges,
//! and the `build` configuration block. Everything else in a descriptor is
//! ignored by the engine; per-stage configuration rides along as opaque
//! JSON under [`BuildConfig::stage_config`].

use indexmap::IndexMap;
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::{ResolverError, ResolverResult};

/// Declared package type from `build.type`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageType {
    App,
    Plugin,
    Config,
    /// Plain library; also the fallback for unrecognized type strings
    #[default]
    #[serde(other)]
    Lib,
}

/// The `build` block of a package descriptor.
///
/// Only the fields the engine recognizes are typed; stage-specific
/// sub-configs are collected into `stage_config` untouched.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Whether sibling plugins/configs should be discovered for this package
    pub pluggable: bool,
    /// Explicit contribution priority, overrides group/depth ordering
    pub priority: Option<i64>,
    /// Declared package type
    #[serde(rename = "type")]
    pub package_type: PackageType,
    /// Opaque per-stage configuration blobs, keyed by stage name
    #[serde(flatten)]
    pub stage_config: IndexMap<String, serde_json::Value>,
}

/// A normalized package descriptor.
///
/// `dependencies` already has peer dependencies merged in; the engine
/// treats the manifest as read-only once loaded.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PackageManifest {
    pub name: String,
    pub version: Version,
    #[serde(default)]
    pub dependencies: IndexMap<String, String>,
    #[serde(default)]
    pub build: Option<BuildConfig>,
}

/// Raw `package.json` shape, before peer dependencies are folded in
#[derive(Debug, Deserialize)]
struct RawManifest {
    name: String,
    version: Version,
    #[serde(default)]
    dependencies: IndexMap<String, String>,
    #[serde(default, rename = "peerDependencies")]
    peer_dependencies: IndexMap<String, String>,
    #[serde(default)]
    build: Option<BuildConfig>,
}

/// Raw `bower.json` shape. Bower descriptors frequently omit the version.
#[derive(Debug, Deserialize)]
struct RawLegacyManifest {
    name: String,
    version: Option<Version>,
    #[serde(default)]
    dependencies: IndexMap<String, String>,
}

impl PackageManifest {
    /// Parse a `package.json` descriptor, folding peer dependencies into
    /// the dependency map (declared dependencies win on collision).
    pub fn from_json(path: &str, text: &str) -> ResolverResult<Self> {
        let raw: RawManifest = serde_json::from_str(text).map_err(|e| {
            ResolverError::ManifestParse {
                path: path.to_string(),
                message: e.to_string(),
            }
        })?;

        let mut manifest = Self {
            name: raw.name,
            version: raw.version,
            dependencies: raw.dependencies,
            build: raw.build,
        };
        manifest.merge_dependencies(&raw.peer_dependencies);

        Ok(manifest)
    }

    /// Parse a standalone `bower.json` descriptor. Missing versions
    /// default to 0.0.0 so the package can still participate in the graph.
    pub fn from_legacy_json(path: &str, text: &str) -> ResolverResult<Self> {
        let raw: RawLegacyManifest = serde_json::from_str(text).map_err(|e| {
            ResolverError::ManifestParse {
                path: path.to_string(),
                message: e.to_string(),
            }
        })?;

        Ok(Self {
            name: raw.name,
            version: raw.version.unwrap_or_else(|| Version::new(0, 0, 0)),
            dependencies: raw.dependencies,
            build: None,
        })
    }

    /// Extract just the dependency edges of a legacy descriptor, for
    /// merging into a primary descriptor found alongside it.
    pub fn legacy_dependencies(
        path: &str,
        text: &str,
    ) -> ResolverResult<IndexMap<String, String>> {
        let raw: RawLegacyManifest = serde_json::from_str(text).map_err(|e| {
            ResolverError::ManifestParse {
                path: path.to_string(),
                message: e.to_string(),
            }
        })?;

        Ok(raw.dependencies)
    }

    /// Merge additional dependency edges, never overwriting existing ones
    pub fn merge_dependencies(&mut self, other: &IndexMap<String, String>) {
        for (name, range) in other {
            if !self.dependencies.contains_key(name) {
                self.dependencies.insert(name.clone(), range.clone());
            }
        }
    }

    /// Declared package type (Lib when no build block is present)
    pub fn package_type(&self) -> PackageType {
        self.build
            .as_ref()
            .map(|b| b.package_type)
            .unwrap_or_default()
    }

    /// Whether the package is designated as an application
    pub fn is_app(&self) -> bool {
        self.package_type() == PackageType::App
    }

    /// Whether the package is designated as a plugin
    pub fn is_plugin(&self) -> bool {
        self.package_type() == PackageType::Plugin
    }

    /// Whether the package is designated as a config pack
    pub fn is_config(&self) -> bool {
        self.package_type() == PackageType::Config
    }

    /// Whether sibling discovery applies to this package
    pub fn is_pluggable(&self) -> bool {
        self.build.as_ref().is_some_and(|b| b.pluggable)
    }

    /// Explicit contribution priority, defaulting to 0
    pub fn priority(&self) -> i64 {
        self.build.as_ref().and_then(|b| b.priority).unwrap_or(0)
    }

    /// Whether this package is a plugin layered onto `base`: it must be
    /// plugin-typed and named with the base package's name as a prefix.
    pub fn is_plugin_of(&self, base: &PackageManifest) -> bool {
        self.is_plugin() && self.name.starts_with(&format!("{}-", base.name))
    }
}
