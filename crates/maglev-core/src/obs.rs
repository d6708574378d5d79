//! Structured lifecycle events for a maglev run.
//!
//! Every event carries an `event` field so log pipelines can filter on it
//! without parsing messages. Set `MAGLEV_LOG_FORMAT=json` (or pass `--json`)
//! for newline-delimited JSON.

use std::future::Future;

use tracing::instrument::Instrumented;
use tracing::{info, warn, Instrument, Span};

use crate::domain::TargetBuild;
use crate::error::{DeployError, GuardError};

/// Run-scoped span (`maglev.run`) tagged with the run id.
///
/// The span is attached to futures rather than entered, so it stays correct
/// across `.await` points.
#[derive(Debug, Clone)]
pub struct RunSpan {
    span: Span,
}

impl RunSpan {
    pub fn new(run_id: &str) -> Self {
        Self {
            span: tracing::info_span!("maglev.run", run_id = %run_id),
        }
    }

    /// Run `fut` inside the span.
    pub fn scope<F: Future>(&self, fut: F) -> Instrumented<F> {
        fut.instrument(self.span.clone())
    }
}

pub fn emit_stage_entered(stage: &str) {
    info!(event = "stage.entered", stage = %stage);
}

pub fn emit_candidates_fetched(branch: &str, fetched: usize, eligible: usize) {
    info!(
        event = "candidates.fetched",
        branch = %branch,
        fetched = fetched,
        eligible = eligible,
    );
}

/// Emit event: bundle fan-out settled.
pub fn emit_bundles_built(built: usize, failed: usize, deployable: usize) {
    info!(
        event = "bundles.built",
        built = built,
        failed = failed,
        deployable = deployable,
    );
}

pub fn emit_bundle_selected(candidate_id: &str, commit: &str, ahead_by: u32) {
    info!(
        event = "bundle.selected",
        candidate_id = %candidate_id,
        commit = %commit,
        ahead_by = ahead_by,
    );
}

/// Emit event: the guard refused a target (warning level).
pub fn emit_guard_blocked(target: &str, error: &GuardError) {
    warn!(event = "guard.blocked", target = %target, error = %error);
}

/// Emit event: one executor branch settled.
pub fn emit_target_deployed(target: &str, commit: &str, result: &Result<TargetBuild, DeployError>) {
    match result {
        Ok(build) => info!(
            event = "target.deployed",
            target = %target,
            commit = %commit,
            build_id = %build.id,
            success = true,
        ),
        Err(err) => warn!(
            event = "target.deployed",
            target = %target,
            commit = %commit,
            error = %err,
            success = false,
        ),
    }
}

pub fn emit_notification_posted(channel: &str, message_id: &str) {
    info!(event = "notification.posted", channel = %channel, message_id = %message_id);
}

pub fn emit_notification_failed(error: &dyn std::fmt::Display) {
    warn!(event = "notification.failed", error = %error);
}

/// Emit event: run reached a terminal outcome.
pub fn emit_run_finished(outcome: &str, duration_ms: u64, exit_code: i32) {
    info!(
        event = "run.finished",
        outcome = %outcome,
        duration_ms = duration_ms,
        exit_code = exit_code,
    );
}
