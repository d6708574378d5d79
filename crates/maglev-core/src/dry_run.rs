//! Dry-run decorator for a [`DeployTarget`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use crate::collaborators::DeployTarget;
use crate::domain::{DeployedBaseline, TargetBuild, TargetBuildStatus};
use crate::error::FetchResult;

/// Delegates every read to the wrapped target but never triggers a build.
///
/// `create_build` answers with a synthetic `pending` record whose id starts
/// with `dry-run-`.
pub struct DryRunTarget {
    inner: Arc<dyn DeployTarget>,
}

impl DryRunTarget {
    pub fn new(inner: Arc<dyn DeployTarget>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl DeployTarget for DryRunTarget {
    async fn current_baseline(&self, target: &str) -> FetchResult<DeployedBaseline> {
        self.inner.current_baseline(target).await
    }

    async fn list_recent_builds(
        &self,
        target: &str,
        limit: usize,
    ) -> FetchResult<Vec<TargetBuild>> {
        self.inner.list_recent_builds(target, limit).await
    }

    async fn create_build(&self, target: &str, commit_sha: &str) -> FetchResult<TargetBuild> {
        let id = format!("dry-run-{}", Uuid::new_v4());
        info!(target = %target, commit = %commit_sha, build_id = %id, "dry run: build not triggered");
        Ok(TargetBuild {
            id,
            target: target.to_string(),
            status: TargetBuildStatus::Pending,
            commit: Some(commit_sha.to_string()),
            created_at: Some(Utc::now()),
        })
    }
}
