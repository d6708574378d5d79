//! Collaborator trait definitions for Maglev
//!
//! These traits define the external boundaries the pipeline talks to:
//! - `CiProvider`: lists green candidate builds for a branch
//! - `SourceControl`: compares two commits
//! - `DeployTarget`: reads the deployed baseline, lists and triggers builds
//! - `NotificationSink`: posts the run report
//!
//! All traits are async and backend-agnostic. HTTP implementations live in
//! `maglev-clients`; in-memory fakes are provided for testing via the
//! `fakes` module.

use async_trait::async_trait;

use crate::domain::{
    CandidateBuild, ComparisonResult, Delivery, DeployedBaseline, NotificationMessage, TargetBuild,
};
use crate::error::FetchResult;

// ---------------------------------------------------------------------------
// CiProvider
// ---------------------------------------------------------------------------

/// Source of candidate builds.
#[async_trait]
pub trait CiProvider: Send + Sync {
    /// List builds for `branch` that finished successfully, in provider order.
    async fn list_eligible_builds(&self, branch: &str) -> FetchResult<Vec<CandidateBuild>>;
}

// ---------------------------------------------------------------------------
// SourceControl
// ---------------------------------------------------------------------------

/// Commit comparison backend.
#[async_trait]
pub trait SourceControl: Send + Sync {
    /// Compare `base...head`. `ahead_by` counts commits in head missing from base.
    async fn compare(&self, base: &str, head: &str) -> FetchResult<ComparisonResult>;
}

// ---------------------------------------------------------------------------
// DeployTarget
// ---------------------------------------------------------------------------

/// Deployment platform hosting one or more named targets.
///
/// Guarantees:
/// - `list_recent_builds` returns at most `limit` records, newest first.
/// - `create_build` returns the record of the newly triggered build.
#[async_trait]
pub trait DeployTarget: Send + Sync {
    /// Reference to what is currently live on `target`.
    async fn current_baseline(&self, target: &str) -> FetchResult<DeployedBaseline>;

    /// Most recent build records on `target`.
    async fn list_recent_builds(&self, target: &str, limit: usize)
        -> FetchResult<Vec<TargetBuild>>;

    /// Trigger a new build of `commit_sha` on `target`.
    async fn create_build(&self, target: &str, commit_sha: &str) -> FetchResult<TargetBuild>;
}

// ---------------------------------------------------------------------------
// NotificationSink
// ---------------------------------------------------------------------------

/// Destination for the end-of-run report.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn post(&self, message: &NotificationMessage) -> FetchResult<Delivery>;
}
