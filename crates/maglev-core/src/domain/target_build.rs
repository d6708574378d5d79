use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a build on a deployment target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TargetBuildStatus {
    Pending,
    Succeeded,
    Failed,
    /// Any status string the target reports that we do not model.
    Other(String),
}

impl From<String> for TargetBuildStatus {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<TargetBuildStatus> for String {
    fn from(status: TargetBuildStatus) -> Self {
        status.as_str().to_string()
    }
}

impl TargetBuildStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "pending" => Self::Pending,
            "succeeded" => Self::Succeeded,
            "failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Other(s) => s,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// A build record on a deployment target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetBuild {
    pub id: String,
    pub target: String,
    pub status: TargetBuildStatus,
    /// Source version the build was created from.
    pub commit: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}
