//! Batch of descriptive SQL queries printed as tables.

use std::io::Write;

use rusqlite::types::Value;
use tabled::builder::Builder;
use tabled::settings::Style;
use tracing::{debug, warn};

use super::database::{FeederDb, QueryTable};
use crate::error::Result;

/// Outcome counts of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
}

/// Splits a script on `;`, dropping fragments that hold only whitespace or `--` comments.
///
/// A comment-only fragment is skipped rather than sent to SQLite, so a trailing
/// note after the last `;` never shows up as a failed statement.
pub fn split_statements(text: &str) -> Vec<&str> {
    text.split(';')
        .map(str::trim)
        .filter(|stmt| {
            stmt.lines()
                .map(str::trim)
                .any(|line| !line.is_empty() && !line.starts_with("--"))
        })
        .collect()
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_owned(),
        Value::Integer(i) => i.to_string(),
        Value::Real(x) => x.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

/// Renders a result set as a markdown table.
pub fn render_table(result: &QueryTable) -> String {
    let mut builder = Builder::default();
    builder.push_record(result.columns.iter().cloned());
    for row in &result.rows {
        builder.push_record(row.iter().map(cell));
    }
    let mut table = builder.build();
    table.with(Style::markdown());
    table.to_string()
}

/// Runs every statement of `text` and writes its rows to `out`.
///
/// A failing statement is reported as `Error: <message>` and the batch moves
/// on; only a failed write to `out` aborts.
pub fn run_batch<W: Write>(db: &FeederDb, text: &str, out: &mut W) -> Result<BatchSummary> {
    let mut summary = BatchSummary::default();
    for stmt in split_statements(text) {
        match db.query(stmt) {
            Ok(result) => {
                debug!(rows = result.rows.len(), "query ok");
                writeln!(out, "{}\n", render_table(&result))?;
                summary.succeeded += 1;
            }
            Err(e) => {
                warn!(error = %e, "query failed");
                writeln!(out, "Error: {e}\n")?;
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}
