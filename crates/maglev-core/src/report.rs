//! Chat rendering of a run's terminal outcome.
//!
//! Every outcome renders to exactly one [`NotificationMessage`]. The blocks
//! use Slack mrkdwn: `*bold*`, `` `code` `` and `<url|label>` links.

use crate::domain::{Block, CommitSummary, Deployment, NotificationMessage, TargetOutcome};
use crate::error::{FetchError, GuardError};
use crate::pipeline::{FetchStage, PipelineOutcome};

/// Passenger list cap; the context line links to the full comparison.
pub const MAX_COMMIT_COUNT: usize = 15;

pub const DRY_RUN_BANNER: &str = "🚧 _*THIS IS JUST A TEST NOTHING IS ACTUALLY BEING DEPLOYED*_ 🚧";

/// Run-level facts the renderer needs besides the outcome.
#[derive(Debug, Clone, Copy)]
pub struct ReportContext<'a> {
    pub branch: &'a str,
    pub dry_run: bool,
}

/// Render `outcome` for the notification sink.
pub fn render(outcome: &PipelineOutcome, ctx: ReportContext<'_>) -> NotificationMessage {
    let mut blocks = Vec::new();
    if ctx.dry_run {
        blocks.push(Block::Section(DRY_RUN_BANNER.to_string()));
        blocks.push(Block::Divider);
    }

    let text = match outcome {
        PipelineOutcome::Deployed(deployment) => render_deployment(deployment, &mut blocks),
        PipelineOutcome::NothingToDeploy {
            candidates,
            failures,
        } => render_nothing_to_deploy(ctx.branch, *candidates, *failures, &mut blocks),
        PipelineOutcome::GuardBlocked { failures } => render_guard_blocked(failures, &mut blocks),
        PipelineOutcome::FetchFailed { stage, error } => {
            render_fetch_failed(*stage, error, &mut blocks)
        }
    };

    let text = if ctx.dry_run {
        format!("[dry run] {}", text)
    } else {
        text
    };
    NotificationMessage { text, blocks }
}

fn render_deployment(deployment: &Deployment, blocks: &mut Vec<Block>) -> String {
    let bundle = &deployment.bundle;
    let comparison = &bundle.comparison;
    let destinations = bundle.targets.join(", ");

    blocks.push(Block::Section(format!(
        "🚄 The Maglev Deploy Train is leaving the station.\n📍 The destination for this train is: *{}*.",
        destinations
    )));
    blocks.push(Block::Divider);

    blocks.push(Block::Section("*Passenger List:*".to_string()));
    blocks.extend(
        comparison
            .commits
            .iter()
            .take(MAX_COMMIT_COUNT)
            .map(|c| Block::Section(passenger_line(c))),
    );

    let total = comparison.commits.len().max(comparison.ahead_by as usize);
    let mut summary = format!("There are {} total commits.", total);
    if let Some(url) = &comparison.html_url {
        summary.push_str(&format!(" <{}|See the entire comparison here.>", url));
    }
    blocks.push(Block::Context(summary));
    blocks.push(Block::Divider);

    for outcome in &deployment.outcomes {
        blocks.push(Block::Section(target_line(outcome)));
    }
    let status = deployment.status();
    blocks.push(Block::Context(format!("Deploy status: *{}*", status)));

    format!(
        "Deploy of {} to {}: {}",
        bundle.candidate.short_sha(),
        destinations,
        status
    )
}

fn passenger_line(commit: &CommitSummary) -> String {
    let author = commit.author_login.as_deref().unwrap_or("unknown");
    match &commit.html_url {
        Some(url) => format!("📝 {} <{}|{}>", author, url, commit.headline()),
        None => format!("📝 {} {}", author, commit.headline()),
    }
}

fn target_line(outcome: &TargetOutcome) -> String {
    match &outcome.result {
        Ok(build) => format!("✅ *{}*: build `{}` started", outcome.target, build.id),
        Err(err) => format!("❌ *{}*: {}", outcome.target, err),
    }
}

fn render_nothing_to_deploy(
    branch: &str,
    candidates: usize,
    failures: usize,
    blocks: &mut Vec<Block>,
) -> String {
    blocks.push(Block::Section(format!(
        "🛤️ Nothing to deploy from `{}`: no candidate is strictly ahead of what is live.",
        branch
    )));
    blocks.push(Block::Context(format!(
        "{} candidate build(s) checked, {} could not be compared.",
        candidates, failures
    )));
    format!("Nothing to deploy from {}", branch)
}

fn render_guard_blocked(failures: &[GuardError], blocks: &mut Vec<Block>) -> String {
    blocks.push(Block::Section(
        "🚦 Deploy held: a target is busy or its build history could not be read.".to_string(),
    ));
    for failure in failures {
        let line = match failure {
            GuardError::PendingDeploy { target, build_ids } => format!(
                "• *{}*: pending build(s) `{}`",
                target,
                build_ids.join("`, `")
            ),
            GuardError::Fetch { target, source } => {
                format!("• *{}*: could not read recent builds ({})", target, source)
            }
        };
        blocks.push(Block::Section(line));
    }
    let targets: Vec<&str> = failures.iter().map(GuardError::target).collect();
    format!("Deploy held: {}", targets.join(", "))
}

fn render_fetch_failed(stage: FetchStage, error: &FetchError, blocks: &mut Vec<Block>) -> String {
    blocks.push(Block::Section(format!(
        "🛑 Deploy aborted: could not fetch the {}.",
        stage
    )));

    let mut detail = format!("`{}`: {}", error.kind, error.message);
    if let (Some(method), Some(url)) = (&error.method, &error.url) {
        detail.push_str(&format!("\nRequest: `{} {}`", method, url));
    } else if let Some(url) = &error.url {
        detail.push_str(&format!("\nRequest: `{}`", url));
    }
    if let Some(status) = error.status {
        detail.push_str(&format!("\nStatus: {}", status));
    }
    blocks.push(Block::Context(detail));

    format!("Deploy aborted: could not fetch the {}", stage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Bundle, CandidateBuild, ComparisonResult, DeployedBaseline, TargetBuild, TargetBuildStatus,
    };
    use crate::error::{DeployError, FetchErrorKind};

    fn commit(i: usize) -> CommitSummary {
        CommitSummary {
            sha: format!("c{}", i),
            author_login: Some("octocat".to_string()),
            message: format!("Change {}\n\nbody", i),
            html_url: Some(format!("https://github.com/acme/shop/commit/c{}", i)),
        }
    }

    fn deployment(commits: usize, outcomes: Vec<TargetOutcome>) -> Deployment {
        Deployment {
            bundle: Bundle {
                candidate: CandidateBuild {
                    id: "wf-1".to_string(),
                    status: "success".to_string(),
                    branch: Some("main".to_string()),
                    commit_sha: Some("abcdef1234".to_string()),
                    commit_message: None,
                    queued_at: None,
                    finished_at: None,
                },
                baseline: DeployedBaseline::from_build("web", "b-1", Some("x".to_string())),
                comparison: ComparisonResult {
                    base: "x".to_string(),
                    head: "abcdef1234".to_string(),
                    ahead_by: commits as u32,
                    behind_by: 0,
                    html_url: Some("https://github.com/acme/shop/compare/x...abcdef1234".to_string()),
                    commits: (0..commits).map(commit).collect(),
                },
                targets: outcomes.iter().map(|o| o.target.clone()).collect(),
            },
            outcomes,
        }
    }

    fn ok(target: &str) -> TargetOutcome {
        TargetOutcome {
            target: target.to_string(),
            result: Ok(TargetBuild {
                id: format!("{}-b", target),
                target: target.to_string(),
                status: TargetBuildStatus::Pending,
                commit: None,
                created_at: None,
            }),
        }
    }

    fn failed(target: &str) -> TargetOutcome {
        TargetOutcome {
            target: target.to_string(),
            result: Err(DeployError::Trigger {
                target: target.to_string(),
                source: FetchError::new(FetchErrorKind::HttpStatus, "422 invalid source"),
            }),
        }
    }

    const CTX: ReportContext<'static> = ReportContext {
        branch: "main",
        dry_run: false,
    };

    fn sections(msg: &NotificationMessage) -> Vec<&str> {
        msg.blocks
            .iter()
            .filter_map(|b| match b {
                Block::Section(s) | Block::Context(s) => Some(s.as_str()),
                Block::Divider => None,
            })
            .collect()
    }

    #[test]
    fn test_deployed_lists_passengers_and_targets() {
        let outcome = PipelineOutcome::Deployed(deployment(2, vec![ok("web"), ok("worker")]));
        let msg = render(&outcome, CTX);
        let text = sections(&msg);

        assert!(text[0].contains("*web, worker*"));
        assert_eq!(text[1], "*Passenger List:*");
        assert_eq!(
            text[2],
            "📝 octocat <https://github.com/acme/shop/commit/c0|Change 0>"
        );
        assert!(text[4].starts_with("There are 2 total commits."));
        assert!(text[5].starts_with("✅ *web*"));
        assert_eq!(*text.last().unwrap(), "Deploy status: *success*");
        assert_eq!(msg.text, "Deploy of abcdef1 to web, worker: success");
    }

    #[test]
    fn test_passenger_list_is_capped() {
        let outcome = PipelineOutcome::Deployed(deployment(40, vec![ok("web")]));
        let msg = render(&outcome, CTX);
        let passengers = sections(&msg)
            .into_iter()
            .filter(|s| s.starts_with("📝"))
            .count();
        assert_eq!(passengers, MAX_COMMIT_COUNT);
        assert!(sections(&msg).iter().any(|s| s.starts_with("There are 40 total commits.")));
    }

    #[test]
    fn test_partial_failure_marks_failed_target() {
        let outcome = PipelineOutcome::Deployed(deployment(1, vec![ok("web"), failed("worker")]));
        let msg = render(&outcome, CTX);
        let text = sections(&msg);
        assert!(text.iter().any(|s| s.starts_with("❌ *worker*") && s.contains("422")));
        assert_eq!(*text.last().unwrap(), "Deploy status: *partial failure*");
    }

    #[test]
    fn test_dry_run_banner_leads() {
        let outcome = PipelineOutcome::Deployed(deployment(1, vec![ok("web")]));
        let msg = render(
            &outcome,
            ReportContext {
                branch: "main",
                dry_run: true,
            },
        );
        assert_eq!(msg.blocks[0], Block::Section(DRY_RUN_BANNER.to_string()));
        assert_eq!(msg.blocks[1], Block::Divider);
        assert!(msg.text.starts_with("[dry run] "));
    }

    #[test]
    fn test_nothing_to_deploy_counts() {
        let outcome = PipelineOutcome::NothingToDeploy {
            candidates: 4,
            failures: 1,
        };
        let msg = render(&outcome, CTX);
        assert_eq!(
            sections(&msg)[1],
            "4 candidate build(s) checked, 1 could not be compared."
        );
    }

    #[test]
    fn test_guard_blocked_lists_targets() {
        let outcome = PipelineOutcome::GuardBlocked {
            failures: vec![GuardError::PendingDeploy {
                target: "web".to_string(),
                build_ids: vec!["b1".to_string(), "b2".to_string()],
            }],
        };
        let msg = render(&outcome, CTX);
        assert_eq!(sections(&msg)[1], "• *web*: pending build(s) `b1`, `b2`");
        assert_eq!(msg.text, "Deploy held: web");
    }

    #[test]
    fn test_fetch_failed_carries_provenance() {
        let outcome = PipelineOutcome::FetchFailed {
            stage: FetchStage::Baseline,
            error: FetchError::new(FetchErrorKind::HttpStatus, "service unavailable")
                .with_request("GET", "https://api.heroku.com/apps/web/releases")
                .with_status(503),
        };
        let msg = render(&outcome, CTX);
        let text = sections(&msg);
        assert!(text[0].contains("deployed baseline"));
        assert!(text[1].contains("`http_status`: service unavailable"));
        assert!(text[1].contains("GET https://api.heroku.com/apps/web/releases"));
        assert!(text[1].contains("Status: 503"));
    }
}
