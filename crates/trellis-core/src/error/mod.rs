//! Error types and result aliases for Trellis operations.
//!
//! Every fatal condition a resolution run can hit is a variant here;
//! non-fatal conditions (unvalidatable version ranges, unreadable sibling
//! candidates) are logged warnings at the call site, not errors.

use thiserror::Error;

/// Unified error type for all Trellis operations
#[derive(Error, Debug)]
pub enum ResolverError {
    // Locator errors
    #[error("Could not resolve module '{name}'")]
    PackageNotFound { name: String },

    #[error("Could not resolve module path for '{name}'")]
    PathResolution { name: String },

    // Manifest errors
    #[error("Failed to parse {path}: {message}")]
    ManifestParse { path: String, message: String },

    // Resolution errors
    #[error(
        "The package '{dependent}' has a dependency on '{dependency}' version {requested} \
         which has already been resolved as version {resolved}"
    )]
    DependencyConflict {
        dependent: String,
        dependency: String,
        requested: String,
        resolved: String,
    },

    // Pipeline errors
    #[error("Stage '{stage}' failed")]
    Stage {
        stage: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result type alias for Trellis operations
pub type ResolverResult<T> = Result<T, ResolverError>;

impl ResolverError {
    /// Create a stage error wrapping a stage's own failure unchanged
    pub fn stage<E>(stage: &str, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Stage {
            stage: stage.to_string(),
            source: Box::new(source),
        }
    }

    /// Get a user-friendly suggestion for fixing this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            ResolverError::PackageNotFound { .. } => {
                Some("Check that the dependency is installed in node_modules")
            },
            ResolverError::DependencyConflict { .. } => {
                Some("Align the version ranges declared by the conflicting packages")
            },
            ResolverError::ManifestParse { .. } => {
                Some("Check the package descriptor for JSON syntax errors")
            },
            _ => None,
        }
    }
}
