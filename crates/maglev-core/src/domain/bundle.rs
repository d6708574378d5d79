use serde::{Deserialize, Serialize};

use super::{CandidateBuild, ComparisonResult, DeployedBaseline};

/// A validated (candidate, baseline, comparison) triple plus its targets.
///
/// Only [`crate::bundle_builder::BundleBuilder`] constructs bundles, and only
/// when both sides carry a commit sha.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    pub candidate: CandidateBuild,
    pub baseline: DeployedBaseline,
    pub comparison: ComparisonResult,
    pub targets: Vec<String>,
}

impl Bundle {
    /// Deployable iff the candidate is strictly ahead of, and not behind, the baseline.
    pub fn is_deployable(&self) -> bool {
        self.comparison.is_only_ahead()
    }

    /// The candidate commit this bundle would deploy.
    pub fn commit_sha(&self) -> &str {
        &self.comparison.head
    }
}
