//! Bundle selection: choose the single best deployable bundle.

use crate::domain::Bundle;
use crate::error::BundleCreationFailure;

/// Filter to deployable bundles and order them newest-queued first.
///
/// The sort is stable, so bundles whose candidates share an identical queued
/// timestamp keep candidate fetch order.
pub fn rank_deployable(bundles: impl IntoIterator<Item = Bundle>) -> Vec<Bundle> {
    let mut deployable: Vec<Bundle> = bundles.into_iter().filter(Bundle::is_deployable).collect();
    deployable.sort_by(|a, b| {
        b.candidate
            .queued_at_or_epoch()
            .cmp(&a.candidate.queued_at_or_epoch())
    });
    deployable
}

/// Pick the most recently queued deployable bundle.
///
/// Failed creations are discarded here; they are not fatal to the batch.
/// Returns `None` when nothing is deployable.
pub fn select_best(
    results: impl IntoIterator<Item = Result<Bundle, BundleCreationFailure>>,
) -> Option<Bundle> {
    rank_deployable(results.into_iter().filter_map(Result::ok))
        .into_iter()
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CandidateBuild, ComparisonResult, DeployedBaseline};
    use chrono::{DateTime, TimeZone, Utc};

    fn bundle(id: &str, queued_at: Option<DateTime<Utc>>, ahead_by: u32, behind_by: u32) -> Bundle {
        Bundle {
            candidate: CandidateBuild {
                id: id.to_string(),
                status: "success".to_string(),
                branch: Some("main".to_string()),
                commit_sha: Some(format!("sha-{}", id)),
                commit_message: None,
                queued_at,
                finished_at: None,
            },
            baseline: DeployedBaseline::from_build("web", "b-1", Some("x".to_string())),
            comparison: ComparisonResult {
                base: "x".to_string(),
                head: format!("sha-{}", id),
                ahead_by,
                behind_by,
                html_url: None,
                commits: Vec::new(),
            },
            targets: vec!["web".to_string()],
        }
    }

    fn day(month: u32) -> Option<DateTime<Utc>> {
        Some(Utc.with_ymd_and_hms(2021, month, 1, 0, 0, 0).unwrap())
    }

    fn failure(id: &str) -> BundleCreationFailure {
        BundleCreationFailure::MissingCandidateCommit {
            candidate_id: id.to_string(),
            baseline_commit: "x".to_string(),
        }
    }

    #[test]
    fn test_empty_selects_none() {
        let empty: Vec<Result<Bundle, BundleCreationFailure>> = Vec::new();
        assert!(select_best(empty).is_none());
    }

    #[test]
    fn test_only_non_deployable_selects_none() {
        let results = vec![
            Ok(bundle("a", day(1), 0, 0)),
            Ok(bundle("b", day(2), 2, 1)),
            Ok(bundle("c", day(3), 0, 4)),
            Err(failure("d")),
        ];
        assert!(select_best(results).is_none());
    }

    #[test]
    fn test_selects_most_recently_queued() {
        let results = vec![
            Ok(bundle("jan", day(1), 1, 0)),
            Ok(bundle("mar", day(3), 1, 0)),
            Ok(bundle("feb", day(2), 1, 0)),
        ];
        assert_eq!(select_best(results).unwrap().candidate.id, "mar");
    }

    #[test]
    fn test_newer_but_diverged_bundle_is_skipped() {
        let results = vec![
            Ok(bundle("old-safe", day(1), 2, 0)),
            Ok(bundle("new-diverged", day(3), 5, 1)),
        ];
        assert_eq!(select_best(results).unwrap().candidate.id, "old-safe");
    }

    #[test]
    fn test_failures_are_discarded() {
        let results = vec![Err(failure("x")), Ok(bundle("a", day(2), 1, 0)), Err(failure("y"))];
        assert_eq!(select_best(results).unwrap().candidate.id, "a");
    }

    #[test]
    fn test_selection_independent_of_input_order() {
        let make = || {
            vec![
                bundle("jan", day(1), 1, 0),
                bundle("mar", day(3), 1, 0),
                bundle("feb", day(2), 1, 0),
                bundle("apr-diverged", day(4), 1, 1),
            ]
        };
        let forward = make();
        let mut reversed = make();
        reversed.reverse();
        let mut rotated = make();
        rotated.rotate_left(2);

        for order in [forward, reversed, rotated] {
            let chosen = select_best(order.into_iter().map(Ok)).unwrap();
            assert_eq!(chosen.candidate.id, "mar");
        }
    }

    #[test]
    fn test_equal_timestamps_keep_fetch_order() {
        let results = vec![
            Ok(bundle("first", day(5), 1, 0)),
            Ok(bundle("second", day(5), 1, 0)),
        ];
        assert_eq!(select_best(results).unwrap().candidate.id, "first");
    }

    #[test]
    fn test_missing_queued_at_ranks_last() {
        let ranked = rank_deployable(vec![
            bundle("unknown", None, 1, 0),
            bundle("known", day(1), 1, 0),
        ]);
        let ids: Vec<_> = ranked.iter().map(|b| b.candidate.id.as_str()).collect();
        assert_eq!(ids, vec!["known", "unknown"]);
    }
}
