//! matterci-core - Certification CI orchestration for Matter firmware
//!
//! Provides the pieces of the certification CI pipeline:
//! - Loads a declarative certification test plan (JSON manifest)
//! - Runs device-under-test certification tests with retry and recovery
//! - Splits the test list across parallel CI chunk jobs
//! - Parses build-size and heap-dump artifacts
//! - Publishes Markdown results into a merge request description with
//!   idempotent update-in-place semantics

pub mod config;
pub mod dut;
pub mod error;
pub mod fakes;
pub mod formatter;
pub mod gitlab;
pub mod manifest;
pub mod memory;
pub mod runner;
pub mod telemetry;

// Re-export key types
pub use config::{CiConfig, GitLabConfig};
pub use dut::{Dut, SerialDut};
pub use error::Error;
pub use formatter::{render_results_table, update_cert_test_results_section};
pub use gitlab::GitLabApi;
pub use manifest::{load_test_commands, CertificationManifest, TestCase};
pub use memory::MemoryAnalyzer;
pub use runner::{run_all, select_chunk, split_chunks, RunnerConfig, TestOutcome, TestResult};
pub use telemetry::init_tracing;

/// Result type for matterci operations
pub type Result<T> = std::result::Result<T, Error>;
