//! Thin GitLab REST client.
//!
//! Covers only the endpoints the CI pipeline needs: merge request
//! description fetch/update, pipeline and job lookup, artifact download.
//! GitLab semantics stay on the server side; HTTP failures surface as
//! [`Error::Http`] and are fatal to the current analysis call.

use crate::config::GitLabConfig;
use crate::error::Error;
use crate::Result;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

const REQUEST_TIMEOUT_SECS: u64 = 30;
const TOKEN_HEADER: &str = "PRIVATE-TOKEN";

/// One diff version of a merge request.
#[derive(Debug, Clone, Deserialize)]
pub struct DiffVersion {
    pub id: u64,
    pub base_commit_sha: String,
    pub head_commit_sha: String,
}

/// A job within a pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct Job {
    pub id: u64,
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
struct Pipeline {
    id: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct MergeRequest {
    description: Option<String>,
}

/// GitLab API client scoped to one project and merge request.
pub struct GitLabApi {
    config: GitLabConfig,
    client: reqwest::Client,
}

impl GitLabApi {
    /// Create a new client from resolved configuration.
    pub fn new(config: GitLabConfig) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(concat!("matterci/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .expect("Failed to create HTTP client");

        GitLabApi { config, client }
    }

    fn project_url(&self, tail: &str) -> String {
        format!(
            "{}/projects/{}/{}",
            self.config.api_url, self.config.project_id, tail
        )
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .header(TOKEN_HEADER, &self.config.token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Http(format!(
                "GET {url} returned {}",
                response.status()
            )));
        }
        Ok(response)
    }

    /// Fetch the diff versions of the merge request, newest first.
    pub async fn fetch_merge_request_diff_versions(&self) -> Result<Vec<DiffVersion>> {
        let url = self.project_url(&format!("merge_requests/{}/versions", self.config.mr_iid));
        Ok(self.get(&url).await?.json().await?)
    }

    /// Find the most recent pipeline for `sha` on `branch_name`.
    pub async fn fetch_pipeline_for_commit(&self, sha: &str, branch_name: &str) -> Result<u64> {
        let url = format!(
            "{}?sha={sha}&ref={branch_name}",
            self.project_url("pipelines")
        );
        let pipelines: Vec<Pipeline> = self.get(&url).await?.json().await?;
        pipelines
            .first()
            .map(|p| p.id)
            .ok_or_else(|| Error::PipelineNotFound(format!("no pipeline for {sha} on {branch_name}")))
    }

    /// List the jobs of a pipeline.
    pub async fn fetch_pipeline_jobs(&self, pipeline_id: u64) -> Result<Vec<Job>> {
        let url = self.project_url(&format!("pipelines/{pipeline_id}/jobs"));
        Ok(self.get(&url).await?.json().await?)
    }

    /// Download a single file from a job's artifact archive to `dest`.
    pub async fn download_artifact(
        &self,
        job_id: u64,
        artifact_path: &str,
        dest: &Path,
    ) -> Result<()> {
        let url = self.project_url(&format!("jobs/{job_id}/artifacts/{artifact_path}"));
        let response = self
            .get(&url)
            .await
            .map_err(|e| Error::ArtifactDownload(e.to_string()))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::ArtifactDownload(e.to_string()))?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, &bytes).await?;
        debug!(job_id, artifact_path, dest = %dest.display(), "artifact downloaded");
        Ok(())
    }

    /// Fetch the merge request description.
    ///
    /// The description is owned by GitLab; callers re-fetch before every
    /// write rather than holding authoritative state.
    pub async fn fetch_merge_request_description(&self) -> Result<String> {
        let url = self.project_url(&format!("merge_requests/{}", self.config.mr_iid));
        let mr: MergeRequest = self.get(&url).await?.json().await?;
        Ok(mr.description.unwrap_or_default())
    }

    /// Overwrite the merge request description.
    pub async fn update_merge_request_description(&self, description: &str) -> Result<()> {
        let url = self.project_url(&format!("merge_requests/{}", self.config.mr_iid));
        let response = self
            .client
            .put(&url)
            .header(TOKEN_HEADER, &self.config.token)
            .json(&serde_json::json!({ "description": description }))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Error::Http(format!(
                "PUT {url} returned {}",
                response.status()
            )));
        }
        info!("merge request description updated");
        Ok(())
    }
}
