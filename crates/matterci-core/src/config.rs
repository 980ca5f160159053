//! Process-wide configuration.
//!
//! All environment access happens here, once, at startup. Components
//! receive the resulting [`CiConfig`] by reference and never re-read the
//! environment mid-pipeline.

use crate::error::Error;
use crate::Result;
use std::collections::HashMap;

/// Wi-Fi SSID handed to certification test scripts.
pub const ENV_WIFI_SSID: &str = "CI_GITLAB_PYTEST_SSID";

/// Wi-Fi passphrase handed to certification test scripts.
pub const ENV_WIFI_PASSPHRASE: &str = "CI_GITLAB_PYTEST_PASSPHRASE";

/// Chunk id selecting which half of the test list this job runs.
pub const ENV_TEST_CHUNK: &str = "TEST_CHUNK";

/// GitLab API coordinates, from the standard GitLab CI environment.
#[derive(Debug, Clone)]
pub struct GitLabConfig {
    /// Base v4 API URL, e.g. `https://gitlab.example.com/api/v4`.
    pub api_url: String,
    /// Numeric project id.
    pub project_id: String,
    /// Merge request iid within the project.
    pub mr_iid: String,
    /// API token with write access to the merge request.
    pub token: String,
}

impl GitLabConfig {
    /// Read GitLab coordinates from the CI environment.
    pub fn from_env() -> Result<Self> {
        Ok(GitLabConfig {
            api_url: require_env("CI_API_V4_URL")?,
            project_id: require_env("CI_PROJECT_ID")?,
            mr_iid: require_env("CI_MERGE_REQUEST_IID")?,
            token: require_env("GITLAB_TOKEN")?,
        })
    }
}

/// Configuration for one certification CI invocation.
#[derive(Debug, Clone)]
pub struct CiConfig {
    /// SSID the DUT joins during tests.
    pub wifi_ssid: String,
    /// Passphrase for the test network.
    pub wifi_passphrase: String,
    /// Chunk id for this job, `"1"` when unset.
    pub test_chunk: String,
    /// Merge request coordinates for result publishing.
    pub gitlab: GitLabConfig,
}

impl CiConfig {
    /// Build the configuration from the CI environment.
    ///
    /// Wi-Fi credentials are mandatory; a missing variable is a fatal
    /// configuration error, not a retryable condition.
    pub fn from_env() -> Result<Self> {
        Ok(CiConfig {
            wifi_ssid: require_env(ENV_WIFI_SSID)?,
            wifi_passphrase: require_env(ENV_WIFI_PASSPHRASE)?,
            test_chunk: std::env::var(ENV_TEST_CHUNK).unwrap_or_else(|_| "1".to_string()),
            gitlab: GitLabConfig::from_env()?,
        })
    }

    /// Placeholder bindings available to manifest template expansion.
    pub fn template_vars(&self) -> HashMap<String, String> {
        HashMap::from([
            ("WIFI_SSID".to_string(), self.wifi_ssid.clone()),
            ("WIFI_PASSPHRASE".to_string(), self.wifi_passphrase.clone()),
        ])
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| Error::MissingEnv(name.to_string()))
}
