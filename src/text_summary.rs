//! Text summary builder for CLI output.

use crate::model::{ScanOutcome, Stats};

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

/// Build a text summary from the final session figures.
///
/// `scan` carries the category histogram that `Stats` does not; it is absent
/// when no scan completed this session.
pub(crate) fn build_text_summary(
    stats: Option<&Stats>,
    scan: Option<&ScanOutcome>,
) -> TextSummary {
    let mut lines = Vec::new();

    match stats {
        Some(s) => {
            lines.push(format!("Total files:        {}", s.total_files));
            lines.push(format!("Space (MB):         {:.2}", s.space_saved_mb));
            lines.push(format!("Duplicates removed: {}", s.duplicates_removed));
        }
        None => lines.push("No completed operation this session.".into()),
    }

    if let Some(scan) = scan {
        if !scan.categories.is_empty() {
            lines.push("Categories:".into());
            for (category, count) in &scan.categories {
                lines.push(format!("  {category}: {count}"));
            }
        }
    }

    TextSummary { lines }
}
