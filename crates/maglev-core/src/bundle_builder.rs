//! Bundle construction: pairs each candidate with the deployed baseline.
//!
//! Construction runs once per candidate and concurrently across candidates.
//! A failure for one candidate never cancels its siblings; every result,
//! success or failure, is returned in candidate order.

use futures::future::join_all;
use tracing::{debug, warn};

use crate::comparator::Comparator;
use crate::domain::{Bundle, CandidateBuild, DeployedBaseline};
use crate::error::BundleCreationFailure;

/// Builds bundles for a fixed list of deployment targets.
#[derive(Clone)]
pub struct BundleBuilder {
    comparator: Comparator,
    targets: Vec<String>,
}

impl BundleBuilder {
    pub fn new(comparator: Comparator, targets: Vec<String>) -> Self {
        Self {
            comparator,
            targets,
        }
    }

    /// Build a bundle for one candidate.
    ///
    /// Checks (in order):
    /// 1. The baseline has a commit reference.
    /// 2. The candidate has a commit sha.
    /// 3. The comparison `baseline...candidate` can be fetched.
    pub async fn build(
        &self,
        candidate: CandidateBuild,
        baseline: &DeployedBaseline,
    ) -> Result<Bundle, BundleCreationFailure> {
        let Some(base) = baseline.commit.clone() else {
            return Err(BundleCreationFailure::MissingBaselineCommit {
                candidate_id: candidate.id,
                target: baseline.target.clone(),
            });
        };

        let Some(head) = candidate.commit_sha.clone() else {
            return Err(BundleCreationFailure::MissingCandidateCommit {
                candidate_id: candidate.id,
                baseline_commit: base,
            });
        };

        let comparison = self
            .comparator
            .compare(&base, &head)
            .await
            .map_err(|source| BundleCreationFailure::Comparison {
                candidate_id: candidate.id.clone(),
                base: base.clone(),
                head: head.clone(),
                source,
            })?;

        Ok(Bundle {
            candidate,
            baseline: baseline.clone(),
            comparison,
            targets: self.targets.clone(),
        })
    }

    /// Build bundles for every candidate concurrently and wait for all of them.
    pub async fn build_all(
        &self,
        candidates: Vec<CandidateBuild>,
        baseline: &DeployedBaseline,
    ) -> Vec<Result<Bundle, BundleCreationFailure>> {
        let results = join_all(
            candidates
                .into_iter()
                .map(|candidate| self.build(candidate, baseline)),
        )
        .await;

        for result in &results {
            match result {
                Ok(bundle) => debug!(
                    candidate_id = %bundle.candidate.id,
                    deployable = bundle.is_deployable(),
                    "bundle created"
                ),
                Err(failure) => warn!(
                    candidate_id = %failure.candidate_id(),
                    error = %failure,
                    "bundle creation failed"
                ),
            }
        }

        results
    }
}
