//! Build-size and heap-usage regression analysis.

pub mod driver;
pub mod heap;
pub mod static_size;

pub use driver::MemoryAnalyzer;
pub use heap::{extract_heap_dump, parse_heap_dump, render_heap_report, HeapDumpRecord};
pub use static_size::run_idf_size_diff;
