//! Pipeline driver: one batch run from candidate discovery to report.
//!
//! ```text
//! FetchingCandidates ┐
//! FetchingBaseline   ┴→ BuildingBundles → Selecting ─┬→ NoneSelected ──────────┐
//!                                                    └→ Guarding → Executing ──┴→ Reporting → Done
//! ```
//!
//! A failed initial fetch or a refused guard jumps straight to `Reporting`.
//! `Reporting` runs exactly once per run, whatever the outcome.

use std::sync::Arc;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::bundle_builder::BundleBuilder;
use crate::collaborators::{CiProvider, DeployTarget, NotificationSink, SourceControl};
use crate::comparator::Comparator;
use crate::config::MaglevConfig;
use crate::domain::{
    CandidateBuild, Delivery, DeployedBaseline, Deployment, DeploymentStatus, NotificationMessage,
};
use crate::dry_run::DryRunTarget;
use crate::error::{BundleCreationFailure, FetchError, GuardError};
use crate::executor::DeployExecutor;
use crate::guard::DeployGuard;
use crate::obs::{self, RunSpan};
use crate::report::{self, ReportContext};
use crate::retry::{retry_fetch, with_timeout, RetryPolicy};
use crate::selector::select_best;

/// Driver state. Logged on entry to each stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    FetchingCandidates,
    FetchingBaseline,
    BuildingBundles,
    Selecting,
    NoneSelected,
    Guarding,
    Executing,
    Reporting,
    Done,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FetchingCandidates => "fetching_candidates",
            Self::FetchingBaseline => "fetching_baseline",
            Self::BuildingBundles => "building_bundles",
            Self::Selecting => "selecting",
            Self::NoneSelected => "none_selected",
            Self::Guarding => "guarding",
            Self::Executing => "executing",
            Self::Reporting => "reporting",
            Self::Done => "done",
        }
    }
}

/// Which of the two initial inputs could not be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStage {
    Candidates,
    Baseline,
}

impl std::fmt::Display for FetchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Candidates => f.write_str("candidate builds"),
            Self::Baseline => f.write_str("deployed baseline"),
        }
    }
}

/// Terminal outcome of a run, before reporting.
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    FetchFailed { stage: FetchStage, error: FetchError },
    NothingToDeploy { candidates: usize, failures: usize },
    GuardBlocked { failures: Vec<GuardError> },
    Deployed(Deployment),
}

impl PipelineOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::FetchFailed { .. } => "fetch_failed",
            Self::NothingToDeploy { .. } => "nothing_to_deploy",
            Self::GuardBlocked { .. } => "guard_blocked",
            Self::Deployed(d) => match d.status() {
                DeploymentStatus::Success => "deployed",
                DeploymentStatus::PartialFailure => "partial_failure",
                DeploymentStatus::Failure => "deploy_failed",
            },
        }
    }

    /// Process exit code for the outcome alone.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NothingToDeploy { .. } => 0,
            Self::FetchFailed { .. } => 1,
            Self::Deployed(d) if d.status() == DeploymentStatus::Success => 0,
            Self::Deployed(_) => 2,
            Self::GuardBlocked { .. } => 3,
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: String,
    pub outcome: PipelineOutcome,
    /// Per-candidate failures recorded while building bundles.
    pub bundle_failures: Vec<BundleCreationFailure>,
    pub duration_ms: u64,
    pub notification: Result<Delivery, FetchError>,
}

impl RunReport {
    /// Exit code, forced to 1 when an otherwise clean run failed to notify.
    pub fn exit_code(&self) -> i32 {
        match (self.outcome.exit_code(), &self.notification) {
            (0, Err(_)) => 1,
            (code, _) => code,
        }
    }
}

/// The slice of [`MaglevConfig`] the driver reads.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub branch: String,
    /// Deployment targets; the first is the leader the baseline is read from.
    pub targets: Vec<String>,
    pub retry: RetryPolicy,
    pub guard_page_size: usize,
    pub dry_run: bool,
}

impl PipelineSettings {
    pub fn from_config(config: &MaglevConfig) -> Self {
        Self {
            branch: config.branch.clone(),
            targets: config.targets().to_vec(),
            retry: config.retry.clone(),
            guard_page_size: config.heroku.guard_page_size,
            dry_run: config.dry_run,
        }
    }

    fn leader(&self) -> &str {
        self.targets.first().map(String::as_str).unwrap_or_default()
    }
}

/// Composes the pipeline stages over a fixed set of collaborators.
pub struct Pipeline {
    ci: Arc<dyn CiProvider>,
    target: Arc<dyn DeployTarget>,
    sink: Arc<dyn NotificationSink>,
    builder: BundleBuilder,
    guard: DeployGuard,
    executor: DeployExecutor,
    settings: PipelineSettings,
}

impl Pipeline {
    /// Wire the stages. In dry-run mode the deploy target is wrapped so no
    /// build is ever triggered.
    pub fn new(
        ci: Arc<dyn CiProvider>,
        scm: Arc<dyn SourceControl>,
        target: Arc<dyn DeployTarget>,
        sink: Arc<dyn NotificationSink>,
        settings: PipelineSettings,
    ) -> Self {
        let target: Arc<dyn DeployTarget> = if settings.dry_run {
            Arc::new(DryRunTarget::new(target))
        } else {
            target
        };
        let timeout_ms = settings.retry.timeout_ms;

        let builder = BundleBuilder::new(
            Comparator::new(scm, timeout_ms),
            settings.targets.clone(),
        );
        let guard = DeployGuard::new(target.clone(), settings.guard_page_size, timeout_ms);
        let executor = DeployExecutor::new(target.clone(), guard.clone(), timeout_ms);

        Self {
            ci,
            target,
            sink,
            builder,
            guard,
            executor,
            settings,
        }
    }

    /// Run once and report. Never fails: every outcome ends up in the report.
    pub async fn run(&self) -> RunReport {
        let run_id = Uuid::new_v4().to_string();
        let span = RunSpan::new(&run_id);
        span.scope(self.run_inner(run_id.clone())).await
    }

    async fn run_inner(&self, run_id: String) -> RunReport {
        let started = Instant::now();
        info!(
            branch = %self.settings.branch,
            targets = ?self.settings.targets,
            dry_run = self.settings.dry_run,
            "run started"
        );

        let mut bundle_failures = Vec::new();
        let outcome = self.drive(&mut bundle_failures).await;

        obs::emit_stage_entered(Stage::Reporting.as_str());
        let message = report::render(
            &outcome,
            ReportContext {
                branch: &self.settings.branch,
                dry_run: self.settings.dry_run,
            },
        );
        let notification = self.notify(&message).await;

        let duration_ms = started.elapsed().as_millis() as u64;
        let report = RunReport {
            run_id,
            outcome,
            bundle_failures,
            duration_ms,
            notification,
        };
        obs::emit_stage_entered(Stage::Done.as_str());
        obs::emit_run_finished(report.outcome.label(), duration_ms, report.exit_code());
        report
    }

    async fn drive(&self, bundle_failures: &mut Vec<BundleCreationFailure>) -> PipelineOutcome {
        let (candidates, baseline) = match self.fetch_inputs().await {
            Ok(inputs) => inputs,
            Err((stage, error)) => return PipelineOutcome::FetchFailed { stage, error },
        };

        obs::emit_stage_entered(Stage::BuildingBundles.as_str());
        let candidate_count = candidates.len();
        let results = self.builder.build_all(candidates, &baseline).await;

        let mut bundles = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(bundle) => bundles.push(bundle),
                Err(failure) => bundle_failures.push(failure),
            }
        }
        let deployable = bundles.iter().filter(|b| b.is_deployable()).count();
        obs::emit_bundles_built(bundles.len(), bundle_failures.len(), deployable);

        obs::emit_stage_entered(Stage::Selecting.as_str());
        let Some(bundle) = select_best(bundles.into_iter().map(Ok)) else {
            obs::emit_stage_entered(Stage::NoneSelected.as_str());
            return PipelineOutcome::NothingToDeploy {
                candidates: candidate_count,
                failures: bundle_failures.len(),
            };
        };
        obs::emit_bundle_selected(
            &bundle.candidate.id,
            bundle.commit_sha(),
            bundle.comparison.ahead_by,
        );

        obs::emit_stage_entered(Stage::Guarding.as_str());
        if let Err(failures) = self.guard.check_all(&bundle.targets).await {
            return PipelineOutcome::GuardBlocked { failures };
        }

        obs::emit_stage_entered(Stage::Executing.as_str());
        PipelineOutcome::Deployed(self.executor.execute(bundle).await)
    }

    /// Fetch candidates and the leader's baseline concurrently, each under
    /// the retry policy. Ineligible candidates are dropped here.
    async fn fetch_inputs(
        &self,
    ) -> Result<(Vec<CandidateBuild>, DeployedBaseline), (FetchStage, FetchError)> {
        let policy = &self.settings.retry;
        let branch = self.settings.branch.as_str();
        let leader = self.settings.leader();

        obs::emit_stage_entered(Stage::FetchingCandidates.as_str());
        obs::emit_stage_entered(Stage::FetchingBaseline.as_str());
        let (candidates, baseline) = tokio::join!(
            retry_fetch(policy, "list candidate builds", || {
                self.ci.list_eligible_builds(branch)
            }),
            retry_fetch(policy, "fetch deployed baseline", || {
                self.target.current_baseline(leader)
            }),
        );

        let fetched = candidates.map_err(|e| (FetchStage::Candidates, e))?;
        let baseline = baseline.map_err(|e| (FetchStage::Baseline, e))?;

        let total = fetched.len();
        let eligible: Vec<CandidateBuild> = fetched
            .into_iter()
            .filter(|c| {
                let ok = c.is_successful();
                if !ok {
                    debug!(candidate_id = %c.id, status = %c.status, "dropping ineligible candidate");
                }
                ok
            })
            .collect();
        obs::emit_candidates_fetched(branch, total, eligible.len());
        debug!(
            target = %baseline.target,
            commit = ?baseline.commit,
            reference = %baseline.reference_id(),
            "baseline fetched"
        );

        Ok((eligible, baseline))
    }

    async fn notify(&self, message: &NotificationMessage) -> Result<Delivery, FetchError> {
        let result = with_timeout(
            self.settings.retry.timeout_ms,
            "post notification",
            self.sink.post(message),
        )
        .await;
        match &result {
            Ok(delivery) => obs::emit_notification_posted(&delivery.channel, &delivery.message_id),
            Err(err) => obs::emit_notification_failed(err),
        }
        result
    }
}
