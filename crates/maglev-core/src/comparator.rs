//! Commit comparison between a deployed baseline and a candidate.

use std::sync::Arc;

use tracing::debug;

use crate::collaborators::SourceControl;
use crate::domain::ComparisonResult;
use crate::error::FetchResult;
use crate::retry::with_timeout;

/// Fetches `base...head` comparisons with a per-call deadline.
///
/// Deployability is decided on the result via
/// [`ComparisonResult::is_only_ahead`].
#[derive(Clone)]
pub struct Comparator {
    scm: Arc<dyn SourceControl>,
    timeout_ms: u64,
}

impl Comparator {
    pub fn new(scm: Arc<dyn SourceControl>, timeout_ms: u64) -> Self {
        Self { scm, timeout_ms }
    }

    /// Compare the baseline commit against the candidate commit.
    pub async fn compare(&self, baseline_sha: &str, candidate_sha: &str) -> FetchResult<ComparisonResult> {
        let result = with_timeout(
            self.timeout_ms,
            "compare commits",
            self.scm.compare(baseline_sha, candidate_sha),
        )
        .await?;
        debug!(
            base = %baseline_sha,
            head = %candidate_sha,
            ahead_by = result.ahead_by,
            behind_by = result.behind_by,
            "comparison fetched"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchErrorKind;
    use crate::fakes::MemorySourceControl;
    use std::time::Duration;

    #[tokio::test]
    async fn test_compare_returns_scripted_counts() {
        let scm = Arc::new(MemorySourceControl::new().with_comparison("x", "a", 2, 0));
        let comparator = Comparator::new(scm, 1_000);

        let result = comparator.compare("x", "a").await.unwrap();
        assert!(result.is_only_ahead());
        assert_eq!(result.ahead_by, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_compare_times_out() {
        let scm = Arc::new(
            MemorySourceControl::new()
                .with_comparison("x", "a", 2, 0)
                .with_delay(Duration::from_secs(5)),
        );
        let comparator = Comparator::new(scm, 100);

        let err = comparator.compare("x", "a").await.unwrap_err();
        assert_eq!(err.kind, FetchErrorKind::Timeout);
    }
}
