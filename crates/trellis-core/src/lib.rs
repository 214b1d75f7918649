//! # trellis-core
//!
//! Core types and pure logic shared across all Trellis crates.
//!
//! This crate provides:
//! - PackageManifest and BuildConfig types modeling package descriptors
//! - The rank library (groups, sort keys, reconciliation) that pipeline
//!   stages use to order their contributions deterministically
//! - ResolverError enum for unified error handling
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `manifest`: package descriptor types and parsing
//! - `rank`: precedence groups and contribution-record reconciliation
//! - `error`: error types and result aliases

pub mod error;
pub mod manifest;
pub mod rank;

// Re-export commonly used types
pub use error::{ResolverError, ResolverResult};
pub use manifest::{BuildConfig, PackageManifest, PackageType};
pub use rank::{ContributionRecord, Group};
