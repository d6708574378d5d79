//! Heroku Platform API deploy target.
//!
//! Builds are triggered from a source archive URL of the candidate commit,
//! resolved through a [`SourceArchive`] right before each trigger.
//! The live commit is read either through the release/slug hop or from the
//! latest build, depending on [`BaselineStrategy`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use maglev_core::config::HerokuSettings;
use maglev_core::{
    BaselineStrategy, DeployTarget, DeployedBaseline, FetchError, FetchResult, Secret,
    TargetBuild, TargetBuildStatus,
};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::http::send_json;

/// Where a deploy target downloads the source of a commit from.
///
/// Heroku fetches `source_blob.url` without credentials, so the URL must be
/// self-authorising.
#[async_trait]
pub trait SourceArchive: Send + Sync {
    async fn archive_url(&self, commit_sha: &str) -> FetchResult<String>;
}

pub const HEROKU_API: &str = "https://api.heroku.com";

const ACCEPT: &str = "application/vnd.heroku+json; version=3";
const LATEST_RELEASE_RANGE: &str = "version; order=desc, max=1";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SourceBlob {
    url: Option<String>,
    /// The commit sha the build was created from.
    version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Build {
    id: String,
    status: String,
    created_at: Option<DateTime<Utc>>,
    source_blob: Option<SourceBlob>,
}

#[derive(Debug, Deserialize)]
struct IdRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Release {
    id: String,
    slug: Option<IdRef>,
}

#[derive(Debug, Deserialize)]
struct Slug {
    id: String,
    commit: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateBuild {
    source_blob: SourceBlob,
}

impl Build {
    fn commit(&self) -> Option<String> {
        self.source_blob.as_ref().and_then(|b| b.version.clone())
    }

    fn into_target_build(self, target: &str) -> TargetBuild {
        let commit = self.commit();
        TargetBuild {
            id: self.id,
            target: target.to_string(),
            status: TargetBuildStatus::parse(&self.status),
            commit,
            created_at: self.created_at,
        }
    }
}

pub struct HerokuClient {
    http: Client,
    base_url: String,
    token: Secret,
    baseline: BaselineStrategy,
    archive: Arc<dyn SourceArchive>,
}

impl HerokuClient {
    pub fn new(
        http: Client,
        settings: &HerokuSettings,
        archive: Arc<dyn SourceArchive>,
    ) -> Self {
        Self {
            http,
            base_url: HEROKU_API.to_string(),
            token: settings.token.clone(),
            baseline: settings.baseline,
            archive,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(self.token.expose())
            .header("Accept", ACCEPT)
    }

    fn builds_request(&self, app: &str, limit: usize) -> RequestBuilder {
        self.request(reqwest::Method::GET, &format!("/apps/{}/builds", app))
            .header("Range", format!("created_at; order=desc, max={}", limit))
    }

    fn latest_release_request(&self, app: &str) -> RequestBuilder {
        self.request(reqwest::Method::GET, &format!("/apps/{}/releases", app))
            .header("Range", LATEST_RELEASE_RANGE)
    }

    fn slug_request(&self, app: &str, slug_id: &str) -> RequestBuilder {
        self.request(
            reqwest::Method::GET,
            &format!("/apps/{}/slugs/{}", app, slug_id),
        )
    }

    fn create_build_request(
        &self,
        app: &str,
        commit_sha: &str,
        source_url: &str,
    ) -> RequestBuilder {
        self.request(reqwest::Method::POST, &format!("/apps/{}/builds", app))
            .json(&CreateBuild {
                source_blob: SourceBlob {
                    url: Some(source_url.to_string()),
                    version: Some(commit_sha.to_string()),
                },
            })
    }

    async fn builds(&self, app: &str, limit: usize) -> FetchResult<Vec<Build>> {
        send_json(&self.http, self.builds_request(app, limit)).await
    }

    async fn baseline_from_release(&self, app: &str) -> FetchResult<DeployedBaseline> {
        let releases: Vec<Release> = send_json(&self.http, self.latest_release_request(app)).await?;
        let release = releases
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::not_found(format!("no release found on {}", app)))?;
        let slug_ref = release.slug.ok_or_else(|| {
            FetchError::not_found(format!("release {} on {} has no slug", release.id, app))
        })?;
        let slug: Slug = send_json(&self.http, self.slug_request(app, &slug_ref.id)).await?;
        debug!(app = %app, release = %release.id, slug = %slug.id, "baseline read from release");
        Ok(DeployedBaseline::from_release_slug(
            app,
            &release.id,
            &slug.id,
            slug.commit,
        ))
    }

    async fn baseline_from_build(&self, app: &str) -> FetchResult<DeployedBaseline> {
        let build = self
            .builds(app, 1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::not_found(format!("no build found on {}", app)))?;
        Ok(DeployedBaseline::from_build(app, &build.id, build.commit()))
    }
}

#[async_trait]
impl DeployTarget for HerokuClient {
    async fn current_baseline(&self, target: &str) -> FetchResult<DeployedBaseline> {
        match self.baseline {
            BaselineStrategy::Release => self.baseline_from_release(target).await,
            BaselineStrategy::LatestBuild => self.baseline_from_build(target).await,
        }
    }

    async fn list_recent_builds(
        &self,
        target: &str,
        limit: usize,
    ) -> FetchResult<Vec<TargetBuild>> {
        let builds = self.builds(target, limit).await?;
        Ok(builds
            .into_iter()
            .take(limit)
            .map(|b| b.into_target_build(target))
            .collect())
    }

    async fn create_build(&self, target: &str, commit_sha: &str) -> FetchResult<TargetBuild> {
        let source_url = self.archive.archive_url(commit_sha).await?;
        let build: Build = send_json(
            &self.http,
            self.create_build_request(target, commit_sha, &source_url),
        )
        .await?;
        Ok(build.into_target_build(target))
    }
}
