//! Error taxonomy for the deploy bundle pipeline.
//!
//! Each fallible stage has its own sum type so that consumers handle every
//! case explicitly:
//! - [`FetchError`]: a collaborator call failed (transport or API level)
//! - [`BundleCreationFailure`]: a (candidate, baseline) pair produced no bundle
//! - [`GuardError`]: the pending-deploy guard refused a target
//! - [`DeployError`]: triggering a deployment on one target failed
//! - [`ConfigError`]: startup configuration is missing or malformed

use serde::{Deserialize, Serialize};

/// Category of a collaborator failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    /// Connection, TLS, or other transport failure.
    Transport,
    /// The call did not finish within its deadline.
    Timeout,
    /// The upstream answered 429 or 5xx.
    HttpStatus,
    /// The response body could not be decoded.
    Decode,
    /// The upstream answered but the requested record does not exist.
    NotFound,
    /// The upstream rejected the request (other 4xx) or reported an
    /// application-level error in a success response.
    Api,
}

impl FetchErrorKind {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Transport | Self::Timeout | Self::HttpStatus)
    }
}

impl std::fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Transport => "transport",
            Self::Timeout => "timeout",
            Self::HttpStatus => "http_status",
            Self::Decode => "decode",
            Self::NotFound => "not_found",
            Self::Api => "api",
        };
        f.write_str(s)
    }
}

/// A collaborator call that failed, with request provenance when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind} error: {message}{}", provenance_suffix(.method, .url, .status))]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
    pub method: Option<String>,
    pub url: Option<String>,
    pub status: Option<u16>,
}

fn provenance_suffix(method: &Option<String>, url: &Option<String>, status: &Option<u16>) -> String {
    let mut parts = Vec::new();
    match (method, url) {
        (Some(m), Some(u)) => parts.push(format!("{} {}", m, u)),
        (None, Some(u)) => parts.push(u.to_string()),
        _ => {}
    }
    if let Some(status) = status {
        parts.push(format!("status {}", status));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            method: None,
            url: None,
            status: None,
        }
    }

    pub fn timeout(operation: &str, limit_ms: u64) -> Self {
        Self::new(
            FetchErrorKind::Timeout,
            format!("{} timed out after {}ms", operation, limit_ms),
        )
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::NotFound, message)
    }

    /// Attach the request method and URL.
    pub fn with_request(mut self, method: impl Into<String>, url: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self.url = Some(url.into());
        self
    }

    /// Attach the upstream HTTP status.
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Result type for collaborator calls.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Why a (candidate, baseline) pair could not become a bundle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BundleCreationFailure {
    #[error("baseline on {target} has no commit reference (candidate {candidate_id})")]
    MissingBaselineCommit { candidate_id: String, target: String },

    #[error("candidate {candidate_id} has no commit sha (baseline {baseline_commit})")]
    MissingCandidateCommit {
        candidate_id: String,
        baseline_commit: String,
    },

    #[error("comparison {base}...{head} for candidate {candidate_id} failed: {source}")]
    Comparison {
        candidate_id: String,
        base: String,
        head: String,
        #[source]
        source: FetchError,
    },
}

impl BundleCreationFailure {
    pub fn candidate_id(&self) -> &str {
        match self {
            Self::MissingBaselineCommit { candidate_id, .. }
            | Self::MissingCandidateCommit { candidate_id, .. }
            | Self::Comparison { candidate_id, .. } => candidate_id,
        }
    }
}

/// The pending-deploy guard refused a target.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GuardError {
    #[error("deployment already in progress on {target} (pending builds: {})", .build_ids.join(", "))]
    PendingDeploy {
        target: String,
        build_ids: Vec<String>,
    },

    #[error("could not read recent builds on {target}: {source}")]
    Fetch {
        target: String,
        #[source]
        source: FetchError,
    },
}

impl GuardError {
    pub fn target(&self) -> &str {
        match self {
            Self::PendingDeploy { target, .. } | Self::Fetch { target, .. } => target,
        }
    }
}

/// Deployment to a single target failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeployError {
    #[error(transparent)]
    Guard(#[from] GuardError),

    #[error("triggering build on {target} failed: {source}")]
    Trigger {
        target: String,
        #[source]
        source: FetchError,
    },
}

/// Startup configuration errors. Always fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set in ENV")]
    Missing(String),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error("run is disabled: {0} is not true")]
    RunDisabled(String),
}
