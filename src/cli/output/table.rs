//! Table output for sync reports using comfy-table.

use std::env;

use comfy_table::{presets, Attribute, Cell, Color, ContentArrangement, Table};

use crate::domain::models::SyncReport;

/// Table formatter for CLI output
pub struct TableFormatter {
    /// Whether to use colors in output
    use_colors: bool,
    /// Maximum width for tables (None = auto)
    max_width: Option<u16>,
}

impl TableFormatter {
    pub fn new() -> Self {
        Self {
            use_colors: supports_color(),
            max_width: None,
        }
    }

    pub fn with_config(use_colors: bool, max_width: Option<u16>) -> Self {
        Self {
            use_colors,
            max_width,
        }
    }

    /// One row per action with its success and failure counts.
    pub fn format_report(&self, report: &SyncReport) -> String {
        let mut table = self.create_base_table();
        table.set_header(vec![
            Cell::new("Action").add_attribute(Attribute::Bold),
            Cell::new("Done").add_attribute(Attribute::Bold),
            Cell::new("Failed").add_attribute(Attribute::Bold),
        ]);

        let rows = [
            ("Created on board", report.created, Some(report.create_failed)),
            ("Updated on board", report.updated_record, None),
            ("Updated externally", report.updated_external, Some(report.update_failed)),
            ("Archived", report.archived, Some(report.archive_failed)),
            ("In sync", report.in_sync, None),
            ("Skipped (closed)", report.skipped_closed, None),
            ("Skipped (assignee)", report.skipped_assignee, None),
            ("Enumerated", report.record_count + report.external_count, Some(report.unreadable)),
            ("Backfilled", report.backfilled, Some(report.unresolved)),
        ];
        for (action, done, failed) in rows {
            table.add_row(vec![
                Cell::new(action),
                Cell::new(done),
                self.failure_cell(failed),
            ]);
        }
        table.to_string()
    }

    fn failure_cell(&self, failed: Option<usize>) -> Cell {
        match failed {
            None => Cell::new("-"),
            Some(0) => Cell::new(0),
            Some(count) if self.use_colors => Cell::new(count).fg(Color::Red),
            Some(count) => Cell::new(count),
        }
    }

    fn create_base_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(presets::UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        if let Some(width) = self.max_width {
            table.set_width(width);
        }
        table
    }
}

impl Default for TableFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// Check if color output is supported
fn supports_color() -> bool {
    if env::var("NO_COLOR").is_ok() {
        return false;
    }
    !matches!(env::var("TERM").as_deref(), Ok("dumb"))
}
