//! Pending-deploy guard.
//!
//! Before triggering a build the guard reads the target's most recent builds
//! and refuses if any of them is still `pending`.
//!
//! This is check-then-act with no lock on the target side: two runs that
//! pass the guard at the same moment can both trigger a build. The guard
//! narrows the window; it does not close it. Runs are expected to be
//! serialised by whatever schedules them.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::collaborators::DeployTarget;
use crate::domain::TargetBuild;
use crate::error::GuardError;
use crate::obs::emit_guard_blocked;
use crate::retry::with_timeout;

/// Evaluate a page of recent builds for `target`.
///
/// Fails with [`GuardError::PendingDeploy`] listing every pending build id.
pub fn check_builds(target: &str, builds: &[TargetBuild]) -> Result<(), GuardError> {
    let pending: Vec<String> = builds
        .iter()
        .filter(|b| b.status.is_pending())
        .map(|b| b.id.clone())
        .collect();

    if pending.is_empty() {
        Ok(())
    } else {
        Err(GuardError::PendingDeploy {
            target: target.to_string(),
            build_ids: pending,
        })
    }
}

/// Best-effort guard against concurrent in-flight deployments.
#[derive(Clone)]
pub struct DeployGuard {
    target: Arc<dyn DeployTarget>,
    page_size: usize,
    timeout_ms: u64,
}

impl DeployGuard {
    pub fn new(target: Arc<dyn DeployTarget>, page_size: usize, timeout_ms: u64) -> Self {
        Self {
            target,
            page_size,
            timeout_ms,
        }
    }

    /// Pass `target_name` through unchanged when no build is pending on it.
    ///
    /// Failing to read the builds also refuses the target.
    pub async fn assert_no_pending_deploy(&self, target_name: &str) -> Result<String, GuardError> {
        let builds = with_timeout(
            self.timeout_ms,
            "list recent builds",
            self.target.list_recent_builds(target_name, self.page_size),
        )
        .await
        .map_err(|source| GuardError::Fetch {
            target: target_name.to_string(),
            source,
        })?;

        match check_builds(target_name, &builds) {
            Ok(()) => {
                debug!(target = %target_name, checked = builds.len(), "no pending deploy");
                Ok(target_name.to_string())
            }
            Err(err) => {
                emit_guard_blocked(target_name, &err);
                Err(err)
            }
        }
    }

    /// Check every target concurrently; returns every refusal.
    pub async fn check_all(&self, targets: &[String]) -> Result<(), Vec<GuardError>> {
        let failures: Vec<GuardError> = join_all(
            targets
                .iter()
                .map(|t| self.assert_no_pending_deploy(t)),
        )
        .await
        .into_iter()
        .filter_map(Result::err)
        .collect();

        if failures.is_empty() {
            Ok(())
        } else {
            warn!(blocked = failures.len(), "deploy guard refused");
            Err(failures)
        }
    }
}
