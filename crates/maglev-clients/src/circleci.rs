//! CircleCI v2 candidate source.
//!
//! A candidate is the first workflow of a `created` pipeline on the branch.
//! Pipelines are listed once; their workflows are fetched concurrently.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use maglev_core::config::CircleCiSettings;
use maglev_core::{CandidateBuild, CiProvider, FetchResult, Secret};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use tracing::debug;

use crate::http::send_json;

pub const CIRCLECI_API: &str = "https://circleci.com/api/v2";

const CREATED_STATE: &str = "created";

#[derive(Debug, Deserialize)]
struct Page<T> {
    items: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
struct Pipeline {
    id: String,
    state: String,
    #[serde(default)]
    vcs: Option<Vcs>,
}

#[derive(Debug, Clone, Deserialize)]
struct Vcs {
    branch: Option<String>,
    revision: Option<String>,
    #[serde(default)]
    commit: Option<VcsCommit>,
}

#[derive(Debug, Clone, Deserialize)]
struct VcsCommit {
    subject: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Workflow {
    id: String,
    status: String,
    created_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
}

/// Map a pipeline and its first workflow onto a candidate.
fn to_candidate(pipeline: &Pipeline, workflow: Workflow) -> CandidateBuild {
    let vcs = pipeline.vcs.as_ref();
    CandidateBuild {
        id: workflow.id,
        status: workflow.status,
        branch: vcs.and_then(|v| v.branch.clone()),
        commit_sha: vcs.and_then(|v| v.revision.clone()),
        commit_message: vcs
            .and_then(|v| v.commit.as_ref())
            .and_then(|c| c.subject.clone()),
        queued_at: workflow.created_at,
        finished_at: workflow.stopped_at,
    }
}

pub struct CircleCiClient {
    http: Client,
    base_url: String,
    token: Secret,
    project_slug: String,
}

impl CircleCiClient {
    pub fn new(http: Client, settings: &CircleCiSettings) -> Self {
        Self {
            http,
            base_url: CIRCLECI_API.to_string(),
            token: settings.token.clone(),
            project_slug: settings.project_slug.clone(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.http
            .get(format!("{}{}", self.base_url, path))
            .basic_auth(self.token.expose(), Some(""))
    }

    fn pipelines_request(&self, branch: &str) -> RequestBuilder {
        self.get(&format!("/project/{}/pipeline", self.project_slug))
            .query(&[("branch", branch)])
    }

    fn workflows_request(&self, pipeline_id: &str) -> RequestBuilder {
        self.get(&format!("/pipeline/{}/workflow", pipeline_id))
    }

    async fn first_workflow(&self, pipeline: &Pipeline) -> FetchResult<Option<Workflow>> {
        let page: Page<Workflow> =
            send_json(&self.http, self.workflows_request(&pipeline.id)).await?;
        Ok(page.items.into_iter().next())
    }
}

#[async_trait]
impl CiProvider for CircleCiClient {
    async fn list_eligible_builds(&self, branch: &str) -> FetchResult<Vec<CandidateBuild>> {
        let page: Page<Pipeline> = send_json(&self.http, self.pipelines_request(branch)).await?;
        let created: Vec<Pipeline> = page
            .items
            .into_iter()
            .filter(|p| p.state == CREATED_STATE)
            .collect();

        let workflows = join_all(created.iter().map(|p| self.first_workflow(p))).await;

        let mut candidates = Vec::with_capacity(created.len());
        for (pipeline, workflow) in created.iter().zip(workflows) {
            match workflow? {
                Some(workflow) => {
                    let candidate = to_candidate(pipeline, workflow);
                    if candidate.is_successful() {
                        candidates.push(candidate);
                    }
                }
                None => debug!(pipeline_id = %pipeline.id, "pipeline has no workflow, skipping"),
            }
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::decode;

    fn client() -> CircleCiClient {
        CircleCiClient::new(
            Client::new(),
            &CircleCiSettings {
                token: Secret::new("cci-token"),
                project_slug: "gh/acme/shop".to_string(),
            },
        )
    }

    #[test]
    fn test_pipelines_request() {
        let request = client().pipelines_request("main").build().unwrap();
        assert_eq!(
            request.url().as_str(),
            "https://circleci.com/api/v2/project/gh/acme/shop/pipeline?branch=main"
        );
        let auth = request.headers()["authorization"].to_str().unwrap();
        assert!(auth.starts_with("Basic "));
    }

    #[test]
    fn test_workflows_request_honours_base_url() {
        let request = client()
            .with_base_url("http://localhost:9000")
            .workflows_request("p-1")
            .build()
            .unwrap();
        assert_eq!(request.url().as_str(), "http://localhost:9000/pipeline/p-1/workflow");
    }

    #[test]
    fn test_maps_pipeline_and_workflow() {
        let pipelines: Page<Pipeline> = decode(
            r#"{
                "items": [{
                    "id": "p-1",
                    "state": "created",
                    "created_at": "2024-05-02T09:59:00Z",
                    "vcs": {
                        "branch": "main",
                        "revision": "0a1b2c3d4e5f",
                        "commit": { "subject": "Fix checkout", "body": "" }
                    }
                }],
                "next_page_token": null
            }"#,
        )
        .unwrap();
        let workflows: Page<Workflow> = decode(
            r#"{
                "items": [{
                    "id": "wf-1",
                    "name": "build-and-test",
                    "status": "success",
                    "created_at": "2024-05-02T10:00:00Z",
                    "stopped_at": "2024-05-02T10:12:00Z"
                }],
                "next_page_token": null
            }"#,
        )
        .unwrap();

        let workflow = workflows.items.into_iter().next().unwrap();
        let candidate = to_candidate(&pipelines.items[0], workflow);
        assert_eq!(candidate.id, "wf-1");
        assert!(candidate.is_successful());
        assert_eq!(candidate.branch.as_deref(), Some("main"));
        assert_eq!(candidate.commit_sha.as_deref(), Some("0a1b2c3d4e5f"));
        assert_eq!(candidate.commit_message.as_deref(), Some("Fix checkout"));
        assert_eq!(
            candidate.queued_at.unwrap().to_rfc3339(),
            "2024-05-02T10:00:00+00:00"
        );
    }

    #[test]
    fn test_pipeline_without_vcs_has_no_commit() {
        let pipeline: Pipeline = decode(r#"{"id":"p-2","state":"errored"}"#).unwrap();
        let workflow: Workflow =
            decode(r#"{"id":"wf-2","status":"failed","created_at":null,"stopped_at":null}"#)
                .unwrap();
        let candidate = to_candidate(&pipeline, workflow);
        assert!(candidate.commit_sha.is_none());
        assert!(!candidate.is_successful());
    }
}
