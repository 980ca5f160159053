//! In-memory test doubles.
//!
//! Mirror the production seams so tests exercise real control flow
//! without hardware attached.

use crate::dut::Dut;
use crate::Result;
use async_trait::async_trait;

/// DUT double that records every command written to it.
#[derive(Debug, Default)]
pub struct RecordingDut {
    /// Commands in the order they were sent.
    pub commands: Vec<String>,
}

impl RecordingDut {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Dut for RecordingDut {
    async fn write(&mut self, command: &str) -> Result<()> {
        self.commands.push(command.to_string());
        Ok(())
    }
}
