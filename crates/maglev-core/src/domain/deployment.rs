use serde::Serialize;

use super::{Bundle, TargetBuild};
use crate::error::DeployError;

/// Outcome of deploying a bundle to one target.
#[derive(Debug, Clone)]
pub struct TargetOutcome {
    pub target: String,
    pub result: Result<TargetBuild, DeployError>,
}

impl TargetOutcome {
    pub fn succeeded(&self) -> bool {
        self.result.is_ok()
    }
}

/// Aggregate status across all targets of a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    Success,
    PartialFailure,
    Failure,
}

impl std::fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::PartialFailure => "partial failure",
            Self::Failure => "failure",
        };
        f.write_str(s)
    }
}

/// Result of executing a bundle: one outcome per target, in target order.
#[derive(Debug, Clone)]
pub struct Deployment {
    pub bundle: Bundle,
    pub outcomes: Vec<TargetOutcome>,
}

impl Deployment {
    pub fn succeeded_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.succeeded()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.len() - self.succeeded_count()
    }

    pub fn status(&self) -> DeploymentStatus {
        match (self.succeeded_count(), self.failed_count()) {
            (_, 0) => DeploymentStatus::Success,
            (0, _) => DeploymentStatus::Failure,
            _ => DeploymentStatus::PartialFailure,
        }
    }
}
