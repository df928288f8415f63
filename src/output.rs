//! Rendering of followed sites and follow reports.
//!
//! Every format writes to any `io::Write`, so the same code serves stdout
//! and `--output` files. Table and list output are for people: timestamps
//! are shortened. CSV and JSON keep the raw API values.

use crate::cli::OutputFormat;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use graphkit::{Detail, FollowOutcome, FollowedSite};
use serde::Serialize;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// A record that can be rendered in every [`OutputFormat`].
pub trait Row: Serialize {
    /// Column names, in order.
    const COLUMNS: &'static [&'static str];

    /// Human-readable cell values, aligned with [`Row::COLUMNS`].
    fn cells(&self) -> Vec<String>;
}

/// `{name, url, id}` row of the list path.
#[derive(Debug, Serialize)]
pub struct SiteRow {
    pub name: String,
    pub url: String,
    pub id: String,
}

/// Extended row of the list path, with per-site details.
#[derive(Debug, Serialize)]
pub struct SiteDetailRow {
    pub name: String,
    pub url: String,
    pub id: String,
    pub description: Detail,
    pub last_modified: Detail,
    pub created_at: Detail,
}

/// One (user, site) outcome of the follow path.
#[derive(Debug, Serialize)]
pub struct OutcomeRow {
    pub user: String,
    pub site: String,
    pub succeeded: bool,
    pub verified: bool,
    pub attempts: u32,
    pub error: String,
}

impl From<&FollowedSite> for SiteRow {
    fn from(site: &FollowedSite) -> Self {
        Self {
            name: site.label().to_string(),
            url: site.web_url.clone(),
            id: site.id.clone(),
        }
    }
}

impl From<&FollowedSite> for SiteDetailRow {
    fn from(site: &FollowedSite) -> Self {
        Self {
            name: site.label().to_string(),
            url: site.web_url.clone(),
            id: site.id.clone(),
            description: site.description.clone(),
            last_modified: site.last_modified.clone(),
            created_at: site.created_at.clone(),
        }
    }
}

impl From<&FollowOutcome> for OutcomeRow {
    fn from(outcome: &FollowOutcome) -> Self {
        Self {
            user: outcome.user.clone(),
            site: outcome.site.clone(),
            succeeded: outcome.succeeded,
            verified: outcome.verified,
            attempts: outcome.attempts,
            error: outcome.last_error.clone().unwrap_or_default(),
        }
    }
}

impl Row for SiteRow {
    const COLUMNS: &'static [&'static str] = &["name", "url", "id"];

    fn cells(&self) -> Vec<String> {
        vec![self.name.clone(), self.url.clone(), self.id.clone()]
    }
}

impl Row for SiteDetailRow {
    const COLUMNS: &'static [&'static str] = &[
        "name",
        "url",
        "id",
        "description",
        "last_modified",
        "created_at",
    ];

    fn cells(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.url.clone(),
            self.id.clone(),
            self.description.to_string(),
            display_timestamp(&self.last_modified),
            display_timestamp(&self.created_at),
        ]
    }
}

impl Row for OutcomeRow {
    const COLUMNS: &'static [&'static str] =
        &["user", "site", "succeeded", "verified", "attempts", "error"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.user.clone(),
            self.site.clone(),
            yes_no(self.succeeded).to_string(),
            yes_no(self.verified).to_string(),
            self.attempts.to_string(),
            self.error.clone(),
        ]
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// `2024-03-01T09:30:00Z` -> `2024-03-01 09:30 UTC`. Anything unparseable is
/// shown as-is.
fn display_timestamp(detail: &Detail) -> String {
    match detail {
        Detail::Value(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|ts| ts.with_timezone(&Utc).format("%Y-%m-%d %H:%M UTC").to_string())
            .unwrap_or_else(|_| raw.clone()),
        other => other.to_string(),
    }
}

/// Whether the report goes to stdout in a machine-readable format.
///
/// Human text (headers, notices, the summary) must stay off stdout then.
pub fn is_machine_stdout(path: Option<&Path>, format: OutputFormat) -> bool {
    path.is_none() && matches!(format, OutputFormat::Csv | OutputFormat::Json)
}

/// Open the destination: the given file, or stdout.
pub fn open(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Could not create output file: {}", path.display()))?;
            log::debug!("Writing output to {}", path.display());
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(io::stdout().lock())),
    }
}

/// Render followed sites.
pub fn write_sites<W: Write>(
    out: &mut W,
    sites: &[FollowedSite],
    details: bool,
    format: OutputFormat,
) -> Result<()> {
    if details {
        let rows: Vec<SiteDetailRow> = sites.iter().map(SiteDetailRow::from).collect();
        write_rows(out, &rows, format)
    } else {
        let rows: Vec<SiteRow> = sites.iter().map(SiteRow::from).collect();
        write_rows(out, &rows, format)
    }
}

/// Render per-pair follow outcomes.
pub fn write_outcomes<W: Write>(
    out: &mut W,
    outcomes: &[FollowOutcome],
    format: OutputFormat,
) -> Result<()> {
    let rows: Vec<OutcomeRow> = outcomes.iter().map(OutcomeRow::from).collect();
    write_rows(out, &rows, format)
}

/// Render rows in the requested format. An empty set still gets a header
/// in table and CSV output.
pub fn write_rows<W: Write, R: Row>(out: &mut W, rows: &[R], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => write_table(out, rows)?,
        OutputFormat::List => write_list(out, rows)?,
        OutputFormat::Csv => write_csv(out, rows)?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, rows).context("Failed to serialize JSON")?;
            writeln!(out)?;
        }
    }
    out.flush()?;
    Ok(())
}

fn write_table<W: Write, R: Row>(out: &mut W, rows: &[R]) -> io::Result<()> {
    let cells: Vec<Vec<String>> = rows.iter().map(Row::cells).collect();
    let widths: Vec<usize> = R::COLUMNS
        .iter()
        .enumerate()
        .map(|(i, name)| {
            cells
                .iter()
                .filter_map(|row| row.get(i))
                .map(|cell| cell.chars().count())
                .chain(std::iter::once(name.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let header: Vec<String> = R::COLUMNS.iter().map(|c| c.to_uppercase()).collect();
    write_table_line(out, &header, &widths)?;
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    write_table_line(out, &rule, &widths)?;
    for row in &cells {
        write_table_line(out, row, &widths)?;
    }
    Ok(())
}

fn write_table_line<W: Write>(out: &mut W, cells: &[String], widths: &[usize]) -> io::Result<()> {
    let line = cells
        .iter()
        .zip(widths.iter().copied())
        .map(|(cell, width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    writeln!(out, "{}", line.trim_end())
}

fn write_list<W: Write, R: Row>(out: &mut W, rows: &[R]) -> io::Result<()> {
    let key_width = R::COLUMNS.iter().map(|c| c.len()).max().unwrap_or(0);
    for (index, row) in rows.iter().enumerate() {
        if index > 0 {
            writeln!(out)?;
        }
        for (key, value) in R::COLUMNS.iter().zip(row.cells()) {
            writeln!(out, "{key:<key_width$}  {value}")?;
        }
    }
    Ok(())
}

fn write_csv<W: Write, R: Row>(out: &mut W, rows: &[R]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(out);
    writer.write_record(R::COLUMNS)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}
