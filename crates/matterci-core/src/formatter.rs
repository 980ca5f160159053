//! Idempotent Markdown splicing for merge request descriptions.
//!
//! The pipeline re-runs many times for the same merge request, so every
//! update must replace or insert a uniquely-keyed section rather than
//! append blindly. Sections are identified by their heading line, never
//! by line offsets, so human edits elsewhere in the description do not
//! corrupt the splice.
//!
//! All transformation happens in memory; every function returns a
//! complete document string.

use crate::runner::{TestOutcome, TestResult};
use chrono::Utc;

/// Top-level heading under which all memory sections live.
pub const MEMORY_RESULTS_TITLE: &str = "## Memory numbers";

fn static_section_header(chip: &str, example: &str) -> String {
    format!("### Static memory ({chip}, {example})")
}

fn heap_section_header(chip: &str, example: &str) -> String {
    format!("### Heap usage ({chip}, {example})")
}

fn cert_section_header(chunk_id: Option<&str>) -> String {
    match chunk_id {
        Some(id) => format!("### Certification test results (chunk {id})"),
        None => "### Certification test results".to_string(),
    }
}

/// Replace the body of the section under `header`, or append a new
/// section when the header is absent.
///
/// A section's body extends from its heading line to the next heading
/// line (any level) or end of document.
fn upsert_section(document: &str, header: &str, body: &str) -> String {
    let lines: Vec<&str> = document.lines().collect();

    let section = match lines.iter().position(|l| l.trim_end() == header) {
        Some(start) => start,
        None => {
            let mut doc = document.trim_end().to_string();
            if !doc.is_empty() {
                doc.push_str("\n\n");
            }
            doc.push_str(header);
            doc.push_str("\n\n");
            doc.push_str(body.trim_end());
            doc.push('\n');
            return doc;
        }
    };

    let mut end = section + 1;
    while end < lines.len() && !lines[end].starts_with('#') {
        end += 1;
    }

    let mut out: Vec<String> = lines[..=section].iter().map(|s| s.to_string()).collect();
    out.push(String::new());
    out.extend(body.trim_end().lines().map(|s| s.to_string()));
    out.push(String::new());
    out.extend(lines[end..].iter().map(|s| s.to_string()));

    let mut doc = out.join("\n");
    while doc.ends_with('\n') {
        doc.pop();
    }
    doc.push('\n');
    doc
}

/// Ensure the memory results heading exists exactly once.
///
/// No-op when the heading is already present.
pub fn update_memory_results_title(description: &str) -> String {
    if description
        .lines()
        .any(|l| l.trim_end() == MEMORY_RESULTS_TITLE)
    {
        return description.to_string();
    }
    let mut doc = description.trim_end().to_string();
    if !doc.is_empty() {
        doc.push_str("\n\n");
    }
    doc.push_str(MEMORY_RESULTS_TITLE);
    doc.push('\n');
    doc
}

/// Replace or insert the static memory section for `(chip, example)`.
pub fn update_static_memory_results_section(
    description: &str,
    chip: &str,
    example: &str,
    body: &str,
) -> String {
    upsert_section(description, &static_section_header(chip, example), body)
}

/// Replace or insert the heap usage section for `(chip, example)`.
pub fn update_heap_memory_results_section(
    description: &str,
    chip: &str,
    example: &str,
    body: &str,
) -> String {
    upsert_section(description, &heap_section_header(chip, example), body)
}

/// Replace or insert the certification results section.
///
/// Keyed by an optional chunk id so two parallel chunk jobs each own a
/// disjoint section of the same description.
pub fn update_cert_test_results_section(
    description: &str,
    chunk_id: Option<&str>,
    body: &str,
) -> String {
    upsert_section(description, &cert_section_header(chunk_id), body)
}

/// Render the certification results as a Markdown table.
pub fn render_results_table(results: &[TestResult]) -> String {
    let mut md = String::from("| Test case | Result |\n| --- | --- |\n");
    for result in results {
        let verdict = match result.outcome {
            TestOutcome::Pass => "PASS",
            TestOutcome::Fail => "FAIL",
        };
        md.push_str(&format!("| {} | {} |\n", result.test_case_name, verdict));
    }
    md.push_str(&format!(
        "\n_Last updated: {}_\n",
        Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    md
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_title_added_once() {
        let doc = update_memory_results_title("MR description body");
        assert!(doc.contains(MEMORY_RESULTS_TITLE));

        let doc2 = update_memory_results_title(&doc);
        assert_eq!(doc2.matches(MEMORY_RESULTS_TITLE).count(), 1);
        assert_eq!(doc, doc2, "second call is a no-op");
    }

    #[test]
    fn test_title_on_empty_description() {
        let doc = update_memory_results_title("");
        assert_eq!(doc, format!("{MEMORY_RESULTS_TITLE}\n"));
    }

    #[test]
    fn test_static_section_appended_when_absent() {
        let doc = update_static_memory_results_section("intro", "esp32c3", "light", "delta: +12");
        assert!(doc.contains("### Static memory (esp32c3, light)"));
        assert!(doc.contains("delta: +12"));
        assert!(doc.starts_with("intro"));
    }

    #[test]
    fn test_static_section_replaced_not_duplicated() {
        let doc = update_static_memory_results_section("intro", "esp32c3", "light", "old body");
        let doc = update_static_memory_results_section(&doc, "esp32c3", "light", "new body");

        assert_eq!(
            doc.matches("### Static memory (esp32c3, light)").count(),
            1,
            "section header must appear exactly once"
        );
        assert!(doc.contains("new body"));
        assert!(!doc.contains("old body"));
    }

    #[test]
    fn test_sections_keyed_per_chip_example() {
        let doc = update_static_memory_results_section("", "esp32c3", "light", "c3 numbers");
        let doc = update_static_memory_results_section(&doc, "esp32h2", "light", "h2 numbers");

        assert!(doc.contains("c3 numbers"));
        assert!(doc.contains("h2 numbers"));

        // Updating one key leaves the other untouched.
        let doc = update_static_memory_results_section(&doc, "esp32c3", "light", "c3 updated");
        assert!(doc.contains("c3 updated"));
        assert!(!doc.contains("c3 numbers"));
        assert!(doc.contains("h2 numbers"));
    }

    #[test]
    fn test_replace_preserves_following_sections() {
        let doc = "intro\n\n### Static memory (esp32c3, light)\n\nold\n\n### Heap usage (esp32c3, light)\n\nheap body\n";
        let doc = update_static_memory_results_section(doc, "esp32c3", "light", "fresh");
        assert!(doc.contains("fresh"));
        assert!(!doc.contains("old"));
        assert!(doc.contains("### Heap usage (esp32c3, light)"));
        assert!(doc.contains("heap body"));
    }

    #[test]
    fn test_upsert_is_stable_under_repetition() {
        let doc1 = update_heap_memory_results_section("intro", "esp32", "lock", "body");
        let doc2 = update_heap_memory_results_section(&doc1, "esp32", "lock", "body");
        assert_eq!(doc1, doc2);
    }

    #[test]
    fn test_cert_sections_disjoint_per_chunk() {
        let doc = update_cert_test_results_section("", Some("1"), "chunk one table");
        let doc = update_cert_test_results_section(&doc, Some("2"), "chunk two table");

        assert!(doc.contains("### Certification test results (chunk 1)"));
        assert!(doc.contains("### Certification test results (chunk 2)"));

        let doc = update_cert_test_results_section(&doc, Some("1"), "chunk one rerun");
        assert!(doc.contains("chunk one rerun"));
        assert!(!doc.contains("chunk one table"));
        assert!(doc.contains("chunk two table"));
    }

    #[test]
    fn test_cert_section_without_chunk_id() {
        let doc = update_cert_test_results_section("", None, "table");
        assert!(doc.contains("### Certification test results\n"));
    }

    #[test]
    fn test_render_results_table() {
        let results = vec![
            TestResult {
                test_case_name: "pairing".to_string(),
                outcome: TestOutcome::Pass,
            },
            TestResult {
                test_case_name: "ota".to_string(),
                outcome: TestOutcome::Fail,
            },
        ];
        let md = render_results_table(&results);
        assert!(md.contains("| pairing | PASS |"));
        assert!(md.contains("| ota | FAIL |"));
        assert!(md.contains("_Last updated:"));
    }
}
