//! Static (build-size) analysis over linker map files.

use crate::error::Error;
use crate::Result;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// External size-diff tool from the IDF toolchain.
const IDF_SIZE_TOOL: &str = "idf_size.py";

const SIZE_DIFF_TIMEOUT_SECS: u64 = 120;

/// Run the size-diff tool over a reference and a current map file.
///
/// Returns the tool's raw textual diff. The diff format is the tool's
/// own contract; it is embedded in the report verbatim, not reparsed.
pub async fn run_idf_size_diff(ref_map_file: &Path, current_map_file: &Path) -> Result<String> {
    let child = Command::new(IDF_SIZE_TOOL)
        .arg(format!("--diff={}", ref_map_file.display()))
        .arg(current_map_file)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::ToolFailed(format!("{IDF_SIZE_TOOL}: {e}")))?;

    let output = tokio::time::timeout(
        Duration::from_secs(SIZE_DIFF_TIMEOUT_SECS),
        child.wait_with_output(),
    )
    .await
    .map_err(|_| Error::CommandTimeout {
        command: IDF_SIZE_TOOL.to_string(),
        timeout_secs: SIZE_DIFF_TIMEOUT_SECS,
    })?
    .map_err(Error::Io)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::ToolFailed(format!(
            "{IDF_SIZE_TOOL} exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    debug!(
        ref_map = %ref_map_file.display(),
        current_map = %current_map_file.display(),
        "size diff computed"
    );
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
