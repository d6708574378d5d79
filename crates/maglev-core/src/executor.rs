//! Deploy executor: trigger the chosen bundle on every target.
//!
//! One branch per target runs the guard and then the trigger. Branches are
//! failure-isolated and joined, so the resulting [`Deployment`] always holds
//! one outcome per target in `bundle.targets` order.

use std::sync::Arc;

use futures::future::join_all;

use crate::collaborators::DeployTarget;
use crate::domain::{Bundle, Deployment, TargetBuild, TargetOutcome};
use crate::error::DeployError;
use crate::guard::DeployGuard;
use crate::obs::emit_target_deployed;
use crate::retry::with_timeout;

pub struct DeployExecutor {
    target: Arc<dyn DeployTarget>,
    guard: DeployGuard,
    timeout_ms: u64,
}

impl DeployExecutor {
    pub fn new(target: Arc<dyn DeployTarget>, guard: DeployGuard, timeout_ms: u64) -> Self {
        Self {
            target,
            guard,
            timeout_ms,
        }
    }

    /// Deploy `bundle` to all of its targets and wait for every branch.
    pub async fn execute(&self, bundle: Bundle) -> Deployment {
        let sha = bundle.commit_sha().to_string();
        let outcomes = join_all(bundle.targets.iter().map(|name| {
            let sha = sha.as_str();
            async move {
                let result = self.deploy_one(name, sha).await;
                emit_target_deployed(name, sha, &result);
                TargetOutcome {
                    target: name.clone(),
                    result,
                }
            }
        }))
        .await;

        Deployment { bundle, outcomes }
    }

    async fn deploy_one(&self, target: &str, commit_sha: &str) -> Result<TargetBuild, DeployError> {
        let target = self.guard.assert_no_pending_deploy(target).await?;
        with_timeout(
            self.timeout_ms,
            "create build",
            self.target.create_build(&target, commit_sha),
        )
        .await
        .map_err(|source| DeployError::Trigger { target, source })
    }
}
