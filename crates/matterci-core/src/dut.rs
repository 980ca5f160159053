//! Device-under-test command channel.

use crate::error::Error;
use crate::Result;
use async_trait::async_trait;
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Command issued to return the device to a known-clean state.
pub const FACTORY_RESET_COMMAND: &str = "matter esp factoryreset";

/// One-way, line-oriented command channel to the device under test.
///
/// The runner never reads back over this channel; test verdicts come
/// from the output of the separately-invoked test script.
#[async_trait]
pub trait Dut: Send {
    /// Send one command line to the device.
    async fn write(&mut self, command: &str) -> Result<()>;
}

/// DUT reachable through a serial device node (e.g. `/dev/ttyUSB0`).
#[derive(Debug)]
pub struct SerialDut {
    port: File,
    path: String,
}

impl SerialDut {
    /// Open the serial device for writing.
    pub async fn open(path: &Path) -> Result<Self> {
        let port = OpenOptions::new()
            .write(true)
            .open(path)
            .await
            .map_err(|e| Error::Dut(format!("failed to open {}: {e}", path.display())))?;
        Ok(SerialDut {
            port,
            path: path.display().to_string(),
        })
    }
}

#[async_trait]
impl Dut for SerialDut {
    async fn write(&mut self, command: &str) -> Result<()> {
        let line = format!("{command}\n");
        self.port
            .write_all(line.as_bytes())
            .await
            .map_err(|e| Error::Dut(format!("write to {} failed: {e}", self.path)))?;
        self.port
            .flush()
            .await
            .map_err(|e| Error::Dut(format!("flush of {} failed: {e}", self.path)))?;
        debug!(command, "sent DUT command");
        Ok(())
    }
}

/// Issue the device factory-reset command.
///
/// Single point of change for the reset string.
pub async fn factory_reset(dut: &mut dyn Dut) -> Result<()> {
    dut.write(FACTORY_RESET_COMMAND).await
}
