//! Heap trace extraction from device logs.
//!
//! The firmware prints a heap trace dump between fixed marker lines when
//! tracing is enabled. Logs without a dump are common (tracing off,
//! test exited early) and mean "nothing to report", not an error.

use crate::Result;
use std::path::Path;

/// Line marking the start of a heap trace dump in the device log.
pub const HEAP_DUMP_START: &str = "====== Heap Trace:";

/// Line marking the end of a heap trace dump.
pub const HEAP_DUMP_END: &str = "====== Heap Trace Summary ======";

/// One allocation record from a heap trace dump.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapDumpRecord {
    pub size_bytes: u64,
    pub address: String,
    pub callers: Vec<String>,
}

/// Return the log lines between the heap dump markers.
///
/// An empty vec (never an error) when the log holds no dump. A dump
/// whose end marker is missing is read through to end of file.
pub fn extract_heap_dump(log_file: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(log_file)?;
    let mut lines = content.lines();

    // `any` leaves the iterator positioned just past the start marker.
    if !lines.any(|l| l.contains(HEAP_DUMP_START)) {
        return Ok(Vec::new());
    }

    let mut dump = Vec::new();
    for line in lines {
        if line.contains(HEAP_DUMP_END) {
            break;
        }
        dump.push(line.to_string());
    }
    Ok(dump)
}

/// Parse extracted dump lines into structured allocation records.
///
/// Malformed lines are skipped; a partially readable dump still yields
/// every record that parses.
pub fn parse_heap_dump(lines: &[String]) -> Vec<HeapDumpRecord> {
    lines.iter().filter_map(|l| parse_record(l)).collect()
}

/// Parse one line of the form
/// `32 bytes (@ 0x3ffb4308, 12034 us) caller 0x400d2bb4:0x400d77a4`.
fn parse_record(line: &str) -> Option<HeapDumpRecord> {
    let (size_str, rest) = line.trim().split_once(" bytes (@ ")?;
    let size_bytes = size_str.trim().parse().ok()?;
    let (address, rest) = rest.split_once(',')?;
    let callers = rest
        .split_once("caller ")
        .map(|(_, c)| c.trim().split(':').map(str::to_string).collect())
        .unwrap_or_default();

    Some(HeapDumpRecord {
        size_bytes,
        address: address.trim().to_string(),
        callers,
    })
}

/// Render parsed records as a Markdown table with an aggregate footer.
pub fn render_heap_report(records: &[HeapDumpRecord]) -> String {
    let total: u64 = records.iter().map(|r| r.size_bytes).sum();
    let mut md = String::from("| Size (bytes) | Address | Callers |\n| --- | --- | --- |\n");
    for record in records {
        md.push_str(&format!(
            "| {} | {} | {} |\n",
            record.size_bytes,
            record.address,
            record.callers.join(" ")
        ));
    }
    md.push_str(&format!(
        "\nTotal traced: {total} bytes across {} allocations\n",
        records.len()
    ));
    md
}
