//! Version-conflict checking for already-resolved dependencies.
//!
//! The resolved set is write-once per package name, so a later requester
//! can only be checked against the version already in the graph. A
//! malformed range never fails the build; the existing resolution is kept
//! and the caller logs a warning.

use semver::{Version, VersionReq};

/// Outcome of checking a requested range against an existing resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResult {
    /// The resolved version satisfies the requested range
    Compatible,
    /// The range is not parseable as semver; trust the existing resolution
    CompatibleUnvalidatable,
    /// The range is valid and the resolved version does not satisfy it
    Conflict,
}

/// Check a newly requested range against the version already resolved for
/// the same package name.
pub fn check(requested_range: &str, resolved: &Version) -> ConflictResult {
    match VersionReq::parse(requested_range) {
        Ok(req) if req.matches(resolved) => ConflictResult::Compatible,
        Ok(_) => ConflictResult::Conflict,
        Err(_) => ConflictResult::CompatibleUnvalidatable,
    }
}
