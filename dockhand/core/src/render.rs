use std::{fmt, str::FromStr};

use serde::Serialize;

use crate::health::HealthReport;

/// Output encoding for reports. The encoding never changes computed status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown output format '{0}' (expected table or json)")]
pub struct UnknownFormat(String);

impl FromStr for OutputFormat {
    type Err = UnknownFormat;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "table" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            other => Err(UnknownFormat(other.to_owned())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Table => "table",
            Self::Json => "json",
        })
    }
}

/// Render rows under headers with columns padded to the widest cell.
#[must_use]
pub fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|header| header.chars().count()).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(idx) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let separator = widths
        .iter()
        .map(|width| "-".repeat(width + 2))
        .collect::<Vec<_>>()
        .join("+");
    let separator = format!("+{separator}+");

    let mut out = String::new();
    out.push_str(&separator);
    out.push('\n');
    out.push_str(&format_row(headers.iter().copied(), &widths));
    out.push('\n');
    out.push_str(&separator);
    out.push('\n');
    for row in rows {
        out.push_str(&format_row(row.iter().map(String::as_str), &widths));
        out.push('\n');
    }
    out.push_str(&separator);
    out
}

fn format_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let cells = cells
        .zip(widths)
        .map(|(cell, width)| {
            let padding = width.saturating_sub(cell.chars().count());
            format!(" {cell}{} ", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("|");
    format!("|{cells}|")
}

/// Pretty JSON for any serializable report.
pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// `Service | Status | Message` table for a health report.
#[must_use]
pub fn health_table(report: &HealthReport) -> String {
    let rows: Vec<Vec<String>> = report
        .results()
        .iter()
        .map(|result| {
            let status = if result.is_healthy() {
                "Healthy"
            } else {
                "Unhealthy"
            };
            vec![
                result.service().to_owned(),
                status.to_owned(),
                result.message().to_owned(),
            ]
        })
        .collect();

    table(&["Service", "Status", "Message"], &rows)
}

/// Render a health report in the requested format.
pub fn health(report: &HealthReport, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Table => Ok(health_table(report)),
        OutputFormat::Json => json(report),
    }
}
