use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Workflow status a candidate must carry to be promoted.
pub const SUCCESS_STATUS: &str = "success";

/// One unit of CI output eligible for deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateBuild {
    /// Provider-side identifier (workflow id for CircleCI).
    pub id: String,
    pub status: String,
    pub branch: Option<String>,
    pub commit_sha: Option<String>,
    /// First line of the commit message, when the provider reports it.
    pub commit_message: Option<String>,
    pub queued_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl CandidateBuild {
    /// Whether the build finished green.
    pub fn is_successful(&self) -> bool {
        self.status == SUCCESS_STATUS
    }

    /// Queued timestamp used for ranking. Missing timestamps sort as the epoch.
    pub fn queued_at_or_epoch(&self) -> DateTime<Utc> {
        self.queued_at.unwrap_or_default()
    }

    /// Abbreviated commit sha for logs and messages.
    pub fn short_sha(&self) -> &str {
        match &self.commit_sha {
            Some(sha) => sha.get(..7).unwrap_or(sha),
            None => "-------",
        }
    }
}
