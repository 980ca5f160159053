//! Memory-regression orchestration against a merge request.
//!
//! Two independent analyses share the same collaborators: a static
//! build-size diff against a baseline pipeline artifact, and a dynamic
//! heap trace pulled from a device log. Both end in a single
//! fetch-modify-write of the merge request description.

use crate::error::Error;
use crate::formatter;
use crate::gitlab::GitLabApi;
use crate::memory::{heap, static_size};
use crate::Result;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Branch whose pipelines provide baseline artifacts.
const BASELINE_BRANCH: &str = "main";

/// Memory analysis driver for one chip/example pair.
///
/// A multi-target CI run constructs one analyzer per pair; a failure in
/// one pair never aborts the others (the caller's loop is the isolation
/// boundary).
pub struct MemoryAnalyzer<'a> {
    api: &'a GitLabApi,
    chip: String,
    example: String,
    project_root: PathBuf,
}

impl<'a> MemoryAnalyzer<'a> {
    pub fn new(api: &'a GitLabApi, chip: &str, example: &str) -> Self {
        MemoryAnalyzer {
            api,
            chip: chip.to_string(),
            example: example.to_string(),
            project_root: PathBuf::from("."),
        }
    }

    /// Resolve build paths against a different project root.
    pub fn with_project_root(mut self, root: &Path) -> Self {
        self.project_root = root.to_path_buf();
        self
    }

    /// Relative path of the map file inside the build tree, which is
    /// also its path inside the baseline job's artifact archive.
    fn map_file_rel_path(&self) -> String {
        format!(
            "examples/{}/build_{}_default/{}.map",
            self.example, self.chip, self.example
        )
    }

    /// Locate the current build's map file.
    pub fn resolve_current_map_file(&self) -> Result<PathBuf> {
        let pattern = format!(
            "{}/{}",
            self.project_root.display(),
            self.map_file_rel_path()
        );
        let mut matches =
            glob::glob(&pattern).map_err(|e| Error::MapFileNotFound(format!("{pattern}: {e}")))?;
        matches
            .find_map(|m| m.ok())
            .ok_or(Error::MapFileNotFound(pattern))
    }

    /// Fetch the baseline map file built at the MR's diff base commit.
    ///
    /// Resolution chain: diff base SHA -> pipeline on the baseline
    /// branch -> named job -> artifact download to `dest`.
    pub async fn resolve_baseline_map_file(&self, job_name: &str, dest: &Path) -> Result<()> {
        let versions = self.api.fetch_merge_request_diff_versions().await?;
        let base_sha = versions
            .first()
            .map(|v| v.base_commit_sha.clone())
            .ok_or_else(|| {
                Error::PipelineNotFound("merge request has no diff versions".to_string())
            })?;

        let pipeline_id = self
            .api
            .fetch_pipeline_for_commit(&base_sha, BASELINE_BRANCH)
            .await?;
        let jobs = self.api.fetch_pipeline_jobs(pipeline_id).await?;
        let job = jobs
            .iter()
            .find(|j| j.name == job_name)
            .ok_or_else(|| Error::JobNotFound(format!("{job_name} in pipeline {pipeline_id}")))?;

        self.api
            .download_artifact(job.id, &self.map_file_rel_path(), dest)
            .await
    }

    /// Static size regression: diff the current build against the
    /// baseline and splice the result into the MR description.
    ///
    /// Never raises. Failures are logged and reported as `false` so the
    /// caller continues with its remaining analyses.
    pub async fn process_static_memory(&self, ref_map_file: &Path, job_name: &str) -> bool {
        match self.static_memory_inner(ref_map_file, job_name).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    chip = %self.chip,
                    example = %self.example,
                    error = %e,
                    "static memory analysis failed"
                );
                false
            }
        }
    }

    async fn static_memory_inner(&self, ref_map_file: &Path, job_name: &str) -> Result<()> {
        let current_map = self.resolve_current_map_file()?;
        self.resolve_baseline_map_file(job_name, ref_map_file)
            .await?;
        let diff = static_size::run_idf_size_diff(ref_map_file, &current_map).await?;
        let body = format!("```\n{}\n```", diff.trim_end());

        // One fetch-modify-write per invocation keeps the race window
        // against concurrent CI jobs writing the same description small.
        let description = self.api.fetch_merge_request_description().await?;
        let description = formatter::update_memory_results_title(&description);
        let description = formatter::update_static_memory_results_section(
            &description,
            &self.chip,
            &self.example,
            &body,
        );
        self.api
            .update_merge_request_description(&description)
            .await?;

        info!(chip = %self.chip, example = %self.example, "static memory results published");
        Ok(())
    }

    /// Dynamic heap analysis over a device log.
    ///
    /// A log without a heap dump is "nothing to report": the description
    /// is left untouched and the analysis still counts as successful.
    pub async fn process_dynamic_memory(&self, log_file: &Path) -> bool {
        match self.dynamic_memory_inner(log_file).await {
            Ok(()) => true,
            Err(e) => {
                error!(
                    chip = %self.chip,
                    example = %self.example,
                    error = %e,
                    "dynamic memory analysis failed"
                );
                false
            }
        }
    }

    async fn dynamic_memory_inner(&self, log_file: &Path) -> Result<()> {
        let lines = heap::extract_heap_dump(log_file)?;
        if lines.is_empty() {
            info!(log_file = %log_file.display(), "no heap dump in log, nothing to report");
            return Ok(());
        }

        let records = heap::parse_heap_dump(&lines);
        let body = heap::render_heap_report(&records);

        let description = self.api.fetch_merge_request_description().await?;
        let description = formatter::update_memory_results_title(&description);
        let description = formatter::update_heap_memory_results_section(
            &description,
            &self.chip,
            &self.example,
            &body,
        );
        self.api
            .update_merge_request_description(&description)
            .await?;

        info!(chip = %self.chip, example = %self.example, "heap results published");
        Ok(())
    }
}
