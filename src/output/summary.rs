use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};

use crate::analyze::Analysis;

/// Per-repository fetch outcome shown in the final summary table.
pub struct RepoFetchSummary {
    pub repository: String,
    pub valid: bool,
    pub pages: usize,
    pub records: usize,
    pub retries: u32,
    pub slept_seconds: f64,
}

/// Print the per-repository fetch summary table to stdout.
pub fn print_summary(summaries: &[RepoFetchSummary]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            "Repository",
            "Outcome",
            "Pages",
            "Records",
            "Retries",
            "Slept (s)",
        ]);

    for summary in summaries {
        let outcome = if summary.valid {
            Cell::new("downloaded").fg(Color::Green)
        } else {
            Cell::new("failed").fg(Color::Red)
        };
        table.add_row(vec![
            Cell::new(&summary.repository),
            outcome,
            Cell::new(summary.pages),
            Cell::new(summary.records),
            Cell::new(summary.retries),
            Cell::new(format!("{:.1}", summary.slept_seconds)),
        ]);
    }

    println!("{table}");
}

/// Print one analyzer's result table and diagnostics.
pub fn print_analysis(name: &str, analysis: &Analysis) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(analysis.header.clone());
    for row in &analysis.table {
        table.add_row(row.clone());
    }

    let marker = if analysis.significant { " (!)" } else { "" };
    println!("{name}{marker}");
    println!("{table}");
    for line in &analysis.diagnostics {
        println!("  {line}");
    }
}
