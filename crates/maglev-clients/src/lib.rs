//! HTTP collaborators for maglev.
//!
//! Each client implements one `maglev_core` collaborator trait:
//! - [`CircleCiClient`]: `CiProvider`
//! - [`GitHubClient`]: `SourceControl`
//! - [`HerokuClient`]: `DeployTarget`
//! - [`SlackClient`]: `NotificationSink`

pub mod circleci;
pub mod github;
pub mod heroku;
pub mod http;
pub mod slack;

pub use circleci::CircleCiClient;
pub use github::GitHubClient;
pub use heroku::{HerokuClient, SourceArchive};
pub use http::{build_http_client, build_redirect_client};
pub use slack::SlackClient;

use std::sync::Arc;

use maglev_core::{
    CiProvider, DeployTarget, FetchResult, MaglevConfig, NotificationSink, SourceControl,
};

/// The four collaborators a pipeline run needs.
pub struct Collaborators {
    pub ci: Arc<dyn CiProvider>,
    pub scm: Arc<dyn SourceControl>,
    pub target: Arc<dyn DeployTarget>,
    pub sink: Arc<dyn NotificationSink>,
}

impl Collaborators {
    /// Build HTTP clients for every collaborator from one shared connection pool.
    pub fn from_config(config: &MaglevConfig) -> FetchResult<Self> {
        let http = build_http_client(config.retry.timeout_ms)?;
        let github = Arc::new(GitHubClient::new(
            http.clone(),
            build_redirect_client(config.retry.timeout_ms)?,
            &config.github,
        ));

        Ok(Self {
            ci: Arc::new(CircleCiClient::new(http.clone(), &config.circleci)),
            scm: github.clone(),
            target: Arc::new(HerokuClient::new(http.clone(), &config.heroku, github)),
            sink: Arc::new(SlackClient::new(http, &config.slack)),
        })
    }
}
