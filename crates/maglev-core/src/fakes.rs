//! In-memory fakes for collaborator traits (testing only)
//!
//! Provides `MemoryCiProvider`, `MemorySourceControl`, `MemoryDeployTarget`
//! and `MemoryNotificationSink` that satisfy the trait contracts without any
//! network access. Each fake records the calls it receives so tests can
//! assert on fan-out behaviour.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::collaborators::*;
use crate::domain::{
    CandidateBuild, ComparisonResult, Delivery, DeployedBaseline, NotificationMessage,
    TargetBuild, TargetBuildStatus,
};
use crate::error::{FetchError, FetchResult};

// ---------------------------------------------------------------------------
// MemoryCiProvider
// ---------------------------------------------------------------------------

/// CI provider that returns a scripted build list (or error) for every branch.
#[derive(Debug)]
pub struct MemoryCiProvider {
    builds: Mutex<FetchResult<Vec<CandidateBuild>>>,
    failures_before_success: Mutex<u32>,
    calls: Mutex<Vec<String>>,
}

impl MemoryCiProvider {
    pub fn new(builds: Vec<CandidateBuild>) -> Self {
        Self {
            builds: Mutex::new(Ok(builds)),
            failures_before_success: Mutex::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: FetchError) -> Self {
        Self {
            builds: Mutex::new(Err(error)),
            failures_before_success: Mutex::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail the first `n` calls with a transport error before answering.
    pub fn flaky(self, n: u32) -> Self {
        *self.failures_before_success.lock().unwrap() = n;
        self
    }

    /// Branches requested so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CiProvider for MemoryCiProvider {
    async fn list_eligible_builds(&self, branch: &str) -> FetchResult<Vec<CandidateBuild>> {
        self.calls.lock().unwrap().push(branch.to_string());
        {
            let mut remaining = self.failures_before_success.lock().unwrap();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(FetchError::new(
                    crate::error::FetchErrorKind::Transport,
                    "connection reset",
                ));
            }
        }
        self.builds.lock().unwrap().clone()
    }
}

// ---------------------------------------------------------------------------
// MemorySourceControl
// ---------------------------------------------------------------------------

/// Source control backed by a `HashMap<(base, head), result>`.
///
/// Unscripted pairs answer with a `NotFound` fetch error.
#[derive(Debug, Default)]
pub struct MemorySourceControl {
    comparisons: Mutex<HashMap<(String, String), FetchResult<ComparisonResult>>>,
    delay: Mutex<Option<Duration>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl MemorySourceControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script `compare(base, head)` to report the given counts.
    pub fn with_comparison(self, base: &str, head: &str, ahead_by: u32, behind_by: u32) -> Self {
        let result = ComparisonResult {
            base: base.to_string(),
            head: head.to_string(),
            ahead_by,
            behind_by,
            html_url: Some(format!("https://github.com/acme/shop/compare/{}...{}", base, head)),
            commits: Vec::new(),
        };
        self.with_result(base, head, Ok(result))
    }

    pub fn with_result(self, base: &str, head: &str, result: FetchResult<ComparisonResult>) -> Self {
        self.comparisons
            .lock()
            .unwrap()
            .insert((base.to_string(), head.to_string()), result);
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(self, delay: Duration) -> Self {
        *self.delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceControl for MemorySourceControl {
    async fn compare(&self, base: &str, head: &str) -> FetchResult<ComparisonResult> {
        self.calls
            .lock()
            .unwrap()
            .push((base.to_string(), head.to_string()));
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let comparisons = self.comparisons.lock().unwrap();
        comparisons
            .get(&(base.to_string(), head.to_string()))
            .cloned()
            .unwrap_or_else(|| {
                Err(FetchError::not_found(format!(
                    "no comparison scripted for {}...{}",
                    base, head
                )))
            })
    }
}

// ---------------------------------------------------------------------------
// MemoryDeployTarget
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct TargetState {
    baseline: Option<FetchResult<DeployedBaseline>>,
    builds: Vec<TargetBuild>,
    list_error: Option<FetchError>,
    create_error: Option<FetchError>,
}

/// Deployment platform backed by a `HashMap<target, TargetState>`.
///
/// Builds are stored newest first. `create_build` prepends a `pending` build
/// unless a create error was scripted for the target.
#[derive(Debug, Default)]
pub struct MemoryDeployTarget {
    targets: Mutex<HashMap<String, TargetState>>,
    created: Mutex<Vec<(String, String)>>,
    baseline_calls: Mutex<u32>,
}

impl MemoryDeployTarget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_baseline(self, baseline: DeployedBaseline) -> Self {
        self.state(&baseline.target.clone(), |s| s.baseline = Some(Ok(baseline)));
        self
    }

    pub fn with_baseline_error(self, target: &str, error: FetchError) -> Self {
        self.state(target, |s| s.baseline = Some(Err(error)));
        self
    }

    /// Seed recent builds for `target` with the given statuses, newest first.
    pub fn with_builds(self, target: &str, statuses: &[TargetBuildStatus]) -> Self {
        let builds = statuses
            .iter()
            .enumerate()
            .map(|(i, status)| TargetBuild {
                id: format!("{}-build-{}", target, i),
                target: target.to_string(),
                status: status.clone(),
                commit: None,
                created_at: None,
            })
            .collect();
        self.state(target, |s| s.builds = builds);
        self
    }

    pub fn with_list_error(self, target: &str, error: FetchError) -> Self {
        self.state(target, |s| s.list_error = Some(error));
        self
    }

    pub fn with_create_error(self, target: &str, error: FetchError) -> Self {
        self.state(target, |s| s.create_error = Some(error));
        self
    }

    /// `(target, commit_sha)` pairs passed to `create_build`, in call order.
    pub fn created(&self) -> Vec<(String, String)> {
        self.created.lock().unwrap().clone()
    }

    pub fn baseline_calls(&self) -> u32 {
        *self.baseline_calls.lock().unwrap()
    }

    fn state(&self, target: &str, f: impl FnOnce(&mut TargetState)) {
        let mut targets = self.targets.lock().unwrap();
        f(targets.entry(target.to_string()).or_default());
    }
}

#[async_trait]
impl DeployTarget for MemoryDeployTarget {
    async fn current_baseline(&self, target: &str) -> FetchResult<DeployedBaseline> {
        *self.baseline_calls.lock().unwrap() += 1;
        let targets = self.targets.lock().unwrap();
        targets
            .get(target)
            .and_then(|s| s.baseline.clone())
            .unwrap_or_else(|| Err(FetchError::not_found(format!("no release for {}", target))))
    }

    async fn list_recent_builds(
        &self,
        target: &str,
        limit: usize,
    ) -> FetchResult<Vec<TargetBuild>> {
        let targets = self.targets.lock().unwrap();
        match targets.get(target) {
            Some(state) => match &state.list_error {
                Some(err) => Err(err.clone()),
                None => Ok(state.builds.iter().take(limit).cloned().collect()),
            },
            None => Ok(Vec::new()),
        }
    }

    async fn create_build(&self, target: &str, commit_sha: &str) -> FetchResult<TargetBuild> {
        self.created
            .lock()
            .unwrap()
            .push((target.to_string(), commit_sha.to_string()));
        let mut targets = self.targets.lock().unwrap();
        let state = targets.entry(target.to_string()).or_default();
        if let Some(err) = &state.create_error {
            return Err(err.clone());
        }
        let build = TargetBuild {
            id: format!("{}-build-new-{}", target, state.builds.len()),
            target: target.to_string(),
            status: TargetBuildStatus::Pending,
            commit: Some(commit_sha.to_string()),
            created_at: Some(Utc::now()),
        };
        state.builds.insert(0, build.clone());
        Ok(build)
    }
}

// ---------------------------------------------------------------------------
// MemoryNotificationSink
// ---------------------------------------------------------------------------

/// Notification sink that keeps every posted message.
#[derive(Debug, Default)]
pub struct MemoryNotificationSink {
    messages: Mutex<Vec<NotificationMessage>>,
    error: Mutex<Option<FetchError>>,
}

impl MemoryNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(error: FetchError) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            error: Mutex::new(Some(error)),
        }
    }

    pub fn messages(&self) -> Vec<NotificationMessage> {
        self.messages.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for MemoryNotificationSink {
    async fn post(&self, message: &NotificationMessage) -> FetchResult<Delivery> {
        let mut messages = self.messages.lock().unwrap();
        messages.push(message.clone());
        if let Some(err) = self.error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(Delivery {
            channel: "#memory".to_string(),
            message_id: messages.len().to_string(),
        })
    }
}
