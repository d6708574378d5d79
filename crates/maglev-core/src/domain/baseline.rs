use serde::{Deserialize, Serialize};

/// Where a baseline commit was read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BaselineSource {
    /// The target exposes the commit directly on its most recent build.
    Build { build_id: String },
    /// Two-hop reference: current release, then its slug.
    ReleaseSlug { release_id: String, slug_id: String },
}

/// Snapshot of what is currently live on a deployment target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedBaseline {
    pub target: String,
    /// `None` when the target could not attribute the live code to a commit.
    pub commit: Option<String>,
    pub source: BaselineSource,
}

impl DeployedBaseline {
    pub fn from_build(target: &str, build_id: &str, commit: Option<String>) -> Self {
        Self {
            target: target.to_string(),
            commit,
            source: BaselineSource::Build {
                build_id: build_id.to_string(),
            },
        }
    }

    pub fn from_release_slug(
        target: &str,
        release_id: &str,
        slug_id: &str,
        commit: Option<String>,
    ) -> Self {
        Self {
            target: target.to_string(),
            commit,
            source: BaselineSource::ReleaseSlug {
                release_id: release_id.to_string(),
                slug_id: slug_id.to_string(),
            },
        }
    }

    /// Identifier of the record the commit came from.
    pub fn reference_id(&self) -> &str {
        match &self.source {
            BaselineSource::Build { build_id } => build_id,
            BaselineSource::ReleaseSlug { slug_id, .. } => slug_id,
        }
    }
}
