// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Report materialization for `dump()` and `summary()`.
//!
//! One `Report` is an ordered header plus rows of generic values; it
//! renders as plain records, CSV (same column order), or a JSON array of
//! objects keyed by header names.

use netdb_core::Value;

/// Default printable row cap for reports.
pub const MAX_REPORT_LINES: usize = 100;

/// Output flavor for [`Report::format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Records,
    Csv,
    Json,
}

/// A materialized tabular report.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    header: Vec<String>,
    rows: Vec<Vec<Value>>,
    /// Printable row cap; rows beyond it render as a trailing ellipsis.
    max_lines: usize,
}

impl Report {
    pub fn new(header: Vec<String>, max_lines: usize) -> Self {
        Self { header, rows: Vec::new(), max_lines }
    }

    pub(crate) fn push(&mut self, row: Vec<Value>) {
        debug_assert_eq!(row.len(), self.header.len());
        self.rows.push(row);
    }

    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn format(&self, format: ReportFormat) -> String {
        match format {
            ReportFormat::Records => self.to_string(),
            ReportFormat::Csv => self.to_csv(),
            ReportFormat::Json => self.to_json().to_string(),
        }
    }

    /// CSV with the same column order as the plain form.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.header.join(","));
        out.push('\n');
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(csv_cell).collect();
            out.push_str(&cells.join(","));
            out.push('\n');
        }
        out
    }

    /// JSON array of objects, one property per header column.
    pub fn to_json(&self) -> Value {
        let records: Vec<Value> = self
            .rows
            .iter()
            .map(|row| {
                let map: serde_json::Map<String, Value> =
                    self.header.iter().cloned().zip(row.iter().cloned()).collect();
                Value::Object(map)
            })
            .collect();
        Value::Array(records)
    }
}

impl std::fmt::Display for Report {
    /// Plain records: a header line, one line per row, truncated to the
    /// line cap with a final ellipsis marker.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", self.header.join(" "))?;
        for row in self.rows.iter().take(self.max_lines) {
            let cells: Vec<String> = row.iter().map(plain_cell).collect();
            writeln!(f, "{}", cells.join(" "))?;
        }
        if self.rows.len() > self.max_lines {
            writeln!(f, "...")?;
        }
        Ok(())
    }
}

fn plain_cell(value: &Value) -> String {
    match value {
        Value::Null => "-".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn csv_cell(value: &Value) -> String {
    let text = match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if text.contains(',') || text.contains('"') || text.contains('\n') {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text
    }
}

#[cfg(test)]
#[path = "report_tests.rs"]
mod tests;
