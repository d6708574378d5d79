//! GitHub commit comparison and source archives.

use async_trait::async_trait;
use maglev_core::config::GitHubSettings;
use maglev_core::{CommitSummary, ComparisonResult, FetchResult, Secret, SourceControl};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;

use crate::heroku::SourceArchive;
use crate::http::{send_for_redirect, send_json};

pub const GITHUB_API: &str = "https://api.github.com";

const ACCEPT: &str = "application/vnd.github.v3+json";

#[derive(Debug, Deserialize)]
struct Comparison {
    html_url: Option<String>,
    ahead_by: u32,
    behind_by: u32,
    #[serde(default)]
    commits: Vec<CommitRef>,
}

#[derive(Debug, Deserialize)]
struct CommitRef {
    sha: String,
    html_url: Option<String>,
    commit: CommitBody,
    /// Null when the commit email is not linked to a GitHub account.
    author: Option<Author>,
}

#[derive(Debug, Deserialize)]
struct CommitBody {
    message: String,
}

#[derive(Debug, Deserialize)]
struct Author {
    login: String,
}

impl Comparison {
    fn into_result(self, base: &str, head: &str) -> ComparisonResult {
        ComparisonResult {
            base: base.to_string(),
            head: head.to_string(),
            ahead_by: self.ahead_by,
            behind_by: self.behind_by,
            html_url: self.html_url,
            commits: self
                .commits
                .into_iter()
                .map(|c| CommitSummary {
                    sha: c.sha,
                    author_login: c.author.map(|a| a.login),
                    message: c.commit.message,
                    html_url: c.html_url,
                })
                .collect(),
        }
    }
}

pub struct GitHubClient {
    http: Client,
    /// Must not follow redirects; see [`GitHubClient::archive_url`].
    archive_http: Client,
    base_url: String,
    token: Secret,
    owner: String,
    repo: String,
}

impl GitHubClient {
    pub fn new(http: Client, archive_http: Client, settings: &GitHubSettings) -> Self {
        Self {
            http,
            archive_http,
            base_url: GITHUB_API.to_string(),
            token: settings.token.clone(),
            owner: settings.owner.clone(),
            repo: settings.repo.clone(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn compare_request(&self, base: &str, head: &str) -> RequestBuilder {
        self.http
            .get(format!(
                "{}/repos/{}/{}/compare/{}...{}",
                self.base_url, self.owner, self.repo, base, head
            ))
            .header("Authorization", format!("token {}", self.token.expose()))
            .header("Accept", ACCEPT)
    }

    fn tarball_request(&self, commit_sha: &str) -> RequestBuilder {
        self.archive_http
            .get(format!(
                "{}/repos/{}/{}/tarball/{}",
                self.base_url, self.owner, self.repo, commit_sha
            ))
            .header("Authorization", format!("token {}", self.token.expose()))
            .header("Accept", ACCEPT)
    }
}

#[async_trait]
impl SourceArchive for GitHubClient {
    /// The tarball endpoint answers with a redirect to a codeload URL that
    /// carries a short-lived token, so the deploy target can download the
    /// source of a private repository without GitHub credentials.
    async fn archive_url(&self, commit_sha: &str) -> FetchResult<String> {
        send_for_redirect(&self.archive_http, self.tarball_request(commit_sha)).await
    }
}

#[async_trait]
impl SourceControl for GitHubClient {
    async fn compare(&self, base: &str, head: &str) -> FetchResult<ComparisonResult> {
        let comparison: Comparison =
            send_json(&self.http, self.compare_request(base, head)).await?;
        Ok(comparison.into_result(base, head))
    }
}
