//! Scan reports.
//!
//! A [`ScanReport`] bundles one target's outcome with provenance (report id,
//! timestamp, SHA-256 of the bytes read) for export. The confidence filter is
//! applied by the writers, never by the scan: the report always holds every
//! detection.
//!
//! # Export formats
//!
//! - JSON: the report with `detections` reduced to the visible subset.
//! - CSV: one header row plus one row per visible detection.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregator::AlgorithmVerdict;
use crate::detection::Detection;
use crate::error::ScanError;
use crate::scan::{ReadGap, ScanOutcome};

/// Report schema version.
pub const REPORT_VERSION: u32 = 1;

/// Column order of CSV exports.
pub const CSV_COLUMNS: [&str; 15] = [
    "offset",
    "size",
    "pattern_type",
    "confidence",
    "algorithm",
    "label",
    "entropy",
    "chi_square",
    "chi_is_random",
    "chi_band",
    "zero_confidence",
    "one_confidence",
    "repeat_confidence",
    "random_confidence",
    "source",
];

/// How the target was read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanMode {
    Raw,
    Slack,
    SkipAllocated,
}

impl std::fmt::Display for ScanMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ScanMode::Raw => "raw",
            ScanMode::Slack => "slack",
            ScanMode::SkipAllocated => "skip_allocated",
        })
    }
}

/// Report for one scanned target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub version: u32,
    pub id: String,
    pub tool: String,
    pub scanned_at: String,
    pub target: String,
    pub mode: ScanMode,
    pub chunk_size: usize,
    pub bytes_scanned: u64,
    pub sha256: String,
    pub partial: bool,
    pub cancelled: bool,
    pub gaps: Vec<ReadGap>,
    pub elapsed_secs: f64,
    pub regions_analyzed: u64,
    /// Detections classified as something other than `unknown`.
    pub detections_found: u64,
    pub verdict: AlgorithmVerdict,
    pub detections: Vec<Detection>,
}

impl ScanReport {
    /// Build a report from a finished scan. Takes ownership of the detections.
    pub fn new(
        target: impl Into<String>,
        mode: ScanMode,
        chunk_size: usize,
        outcome: ScanOutcome,
    ) -> Self {
        let scanned_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let detections_found = outcome
            .detections
            .iter()
            .filter(|d| d.is_classified())
            .count() as u64;
        Self {
            version: REPORT_VERSION,
            id: Uuid::new_v4().to_string(),
            tool: format!("wipetrace {}", crate::VERSION),
            scanned_at: format_iso8601(scanned_at),
            target: target.into(),
            mode,
            chunk_size,
            bytes_scanned: outcome.bytes_scanned,
            sha256: outcome.sha256,
            partial: !outcome.gaps.is_empty(),
            cancelled: outcome.cancelled,
            gaps: outcome.gaps,
            elapsed_secs: outcome.elapsed_secs,
            regions_analyzed: outcome.chunks_scanned,
            detections_found,
            verdict: outcome.verdict,
            detections: outcome.detections,
        }
    }

    /// Classified detections at or above `min_confidence`, in offset order.
    pub fn visible(&self, min_confidence: f64) -> impl Iterator<Item = &Detection> {
        self.detections
            .iter()
            .filter(move |d| d.is_classified() && d.confidence >= min_confidence)
    }

    /// Copy of the report holding only the visible detections.
    pub fn filtered(&self, min_confidence: f64) -> ScanReport {
        let mut report = self.clone();
        report.detections = self.visible(min_confidence).cloned().collect();
        report
    }

    /// Write the filtered report as pretty JSON.
    pub fn write_json(&self, path: &Path, min_confidence: f64) -> Result<(), ScanError> {
        let json = serde_json::to_string_pretty(&self.filtered(min_confidence))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Write visible detections as CSV.
    pub fn write_csv(&self, path: &Path, min_confidence: f64) -> Result<(), ScanError> {
        let mut writer = BufWriter::new(File::create(path)?);
        write_csv_header(&mut writer)?;
        for d in self.visible(min_confidence) {
            write_csv_row(&mut writer, d)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Reports of a directory batch scan, one per target.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchReport {
    pub version: u32,
    pub targets: Vec<ScanReport>,
}

impl BatchReport {
    pub fn new(targets: Vec<ScanReport>) -> Self {
        Self {
            version: REPORT_VERSION,
            targets,
        }
    }

    pub fn write_json(&self, path: &Path, min_confidence: f64) -> Result<(), ScanError> {
        let filtered = BatchReport {
            version: self.version,
            targets: self
                .targets
                .iter()
                .map(|r| r.filtered(min_confidence))
                .collect(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&filtered)?)?;
        Ok(())
    }

    /// All targets in one CSV; the `source` column carries the target.
    pub fn write_csv(&self, path: &Path, min_confidence: f64) -> Result<(), ScanError> {
        let mut writer = BufWriter::new(File::create(path)?);
        write_csv_header(&mut writer)?;
        for report in &self.targets {
            for d in report.visible(min_confidence) {
                if d.source.is_some() {
                    write_csv_row(&mut writer, d)?;
                } else {
                    let mut row = d.clone();
                    row.source = Some(report.target.clone());
                    write_csv_row(&mut writer, &row)?;
                }
            }
        }
        writer.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// CSV
// ---------------------------------------------------------------------------

fn write_csv_header(w: &mut impl Write) -> std::io::Result<()> {
    writeln!(w, "{}", CSV_COLUMNS.join(","))
}

fn write_csv_row(w: &mut impl Write, d: &Detection) -> std::io::Result<()> {
    writeln!(
        w,
        "{},{},{},{:.2},{},{},{:.4},{:.2},{},{},{:.2},{:.2},{:.2},{:.2},{}",
        d.offset,
        d.size,
        d.pattern_type,
        d.confidence,
        d.algorithm,
        csv_field(&d.label),
        d.entropy,
        d.chi_square,
        d.chi_is_random,
        d.chi_band,
        d.zero_confidence,
        d.one_confidence,
        d.repeat_confidence,
        d.random_confidence,
        csv_field(d.source.as_deref().unwrap_or("")),
    )
}

/// Quote a field when it contains a delimiter, quote or newline.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// ---------------------------------------------------------------------------
// Timestamps
// ---------------------------------------------------------------------------

/// Default export file name, e.g. `wipe_report_20260215T013000Z.json`.
pub fn default_report_name(ext: &str) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("wipe_report_{}.{ext}", format_iso8601_compact(now))
}

/// `2026-02-15T01:30:00Z`
pub fn format_iso8601(since_epoch: Duration) -> String {
    let (year, month, day, hour, min, sec) = secs_to_utc(since_epoch.as_secs());
    format!("{year:04}-{month:02}-{day:02}T{hour:02}:{min:02}:{sec:02}Z")
}

/// `20260215T013000Z`
fn format_iso8601_compact(since_epoch: Duration) -> String {
    let (year, month, day, hour, min, sec) = secs_to_utc(since_epoch.as_secs());
    format!("{year:04}{month:02}{day:02}T{hour:02}{min:02}{sec:02}Z")
}

/// Seconds since the Unix epoch to UTC `(year, month, day, hour, minute, second)`.
///
/// Days are mapped onto 400-year eras with years starting in March, so the
/// leap day falls at the end of the year. Leap seconds are ignored.
fn secs_to_utc(secs: u64) -> (u64, u64, u64, u64, u64, u64) {
    let (days, rem) = (secs / 86_400, secs % 86_400);
    let z = days + 719_468;
    let era = z / 146_097;
    let doe = z % 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = era * 400 + yoe + u64::from(month <= 2);
    (year, month, day, rem / 3600, rem / 60 % 60, rem % 60)
}
