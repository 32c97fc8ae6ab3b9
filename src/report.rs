use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{HumanBytes, HumanCount};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::engine::RunReport;
use crate::store::StoreStats;

/// Points in the pipeline where store statistics are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Checkpoint {
    /// All files grouped by prefix digest.
    Initial,
    /// Prefix groups with a single member removed.
    PrefixPruned,
    /// Confirmed duplicate sets.
    Confirmed,
}

impl Checkpoint {
    pub fn label(self) -> &'static str {
        match self {
            Self::Initial => "scanned",
            Self::PrefixPruned => "candidates",
            Self::Confirmed => "duplicates",
        }
    }
}

pub trait ReportSink {
    fn checkpoint(&mut self, checkpoint: Checkpoint, stats: &StoreStats);
}

/// Prints each checkpoint summary on stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleSink {
    summary_only: bool,
}

impl ConsoleSink {
    /// With `summary_only`, only the confirmed checkpoint is printed.
    pub fn new(summary_only: bool) -> Self {
        Self { summary_only }
    }
}

impl ReportSink for ConsoleSink {
    fn checkpoint(&mut self, checkpoint: Checkpoint, stats: &StoreStats) {
        if self.summary_only && checkpoint != Checkpoint::Confirmed {
            return;
        }
        println!("{:>10}: {}", checkpoint.label(), stats.summary());
    }
}

/// Keeps every checkpoint in memory.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    pub checkpoints: Vec<(Checkpoint, StoreStats)>,
}

impl ReportSink for RecordingSink {
    fn checkpoint(&mut self, checkpoint: Checkpoint, stats: &StoreStats) {
        self.checkpoints.push((checkpoint, *stats));
    }
}

/// Writes the duplicate listing and the unreadable files to `out`.
///
/// With `summary_only` the listing is left out, but unreadable files are
/// still written: they are the only sign that the summary is incomplete.
pub fn write_report<W: Write>(
    out: &mut W,
    report: &RunReport,
    summary_only: bool,
) -> io::Result<()> {
    if !summary_only {
        write_groups(out, report)?;
    }
    if !report.failures.is_empty() {
        writeln!(
            out,
            "{}",
            format!("{} files could not be read:", report.failures.len()).red()
        )?;
        for failure in &report.failures {
            writeln!(out, "  {}: {}", failure.path.display(), failure.error)?;
        }
    }
    Ok(())
}

fn write_groups<W: Write>(out: &mut W, report: &RunReport) -> io::Result<()> {
    if report.groups.is_empty() {
        return writeln!(out, "{}", "No duplicate files found!".green());
    }
    writeln!(
        out,
        "Found {} duplicate files wasting {} of space",
        HumanCount(report.groups.iter().map(|g| g.paths.len() as u64 - 1).sum()),
        HumanBytes(report.confirmed.duplicated_bytes)
    )?;
    for group in &report.groups {
        writeln!(
            out,
            "{}",
            format!(
                "Duplicate group ({}, {} files):",
                HumanBytes(group.size),
                group.paths.len()
            )
            .yellow()
        )?;
        for path in &group.paths {
            writeln!(out, "  {}", path.display())?;
        }
    }
    Ok(())
}

pub fn print_report(report: &RunReport, summary_only: bool) -> io::Result<()> {
    write_report(&mut io::stdout().lock(), report, summary_only)
}

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    #[serde(flatten)]
    report: &'a RunReport,
}

pub fn write_json(report: &RunReport, path: &Path) -> Result<()> {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    let json = JsonReport {
        generated_at: now.format(&Rfc3339)?,
        report,
    };
    let file = File::create(path)
        .with_context(|| format!("Failed to create report: '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &json)?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hasher::HashFailure;
    use crate::resolver::DuplicateGroup;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn stats(files: usize, groups: usize, bytes: u64) -> StoreStats {
        StoreStats {
            files,
            groups,
            duplicated_bytes: bytes,
        }
    }

    #[test]
    fn test_recording_sink_keeps_order() {
        let mut sink = RecordingSink::default();
        sink.checkpoint(Checkpoint::Initial, &stats(3, 2, 5));
        sink.checkpoint(Checkpoint::PrefixPruned, &stats(2, 1, 5));

        let order: Vec<_> = sink.checkpoints.iter().map(|(c, _)| *c).collect();
        assert_eq!(order, vec![Checkpoint::Initial, Checkpoint::PrefixPruned]);
        assert_eq!(sink.checkpoints[1].1.files, 2);
    }

    fn report_with_failure() -> RunReport {
        RunReport {
            initial: stats(3, 2, 5),
            prefix_pruned: stats(3, 1, 10),
            confirmed: stats(2, 1, 5),
            empty_files: 0,
            groups: vec![DuplicateGroup {
                size: 5,
                digest: 42,
                paths: vec![PathBuf::from("/a"), PathBuf::from("/b")],
            }],
            failures: vec![HashFailure {
                path: PathBuf::from("/gone"),
                error: "No such file or directory".into(),
            }],
        }
    }

    #[test]
    fn test_summary_only_still_lists_unreadable_files() {
        let mut out = Vec::new();
        write_report(&mut out, &report_with_failure(), true).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("1 files could not be read"));
        assert!(text.contains("/gone: No such file or directory"));
        assert!(!text.contains("Duplicate group"));
    }

    #[test]
    fn test_full_report_lists_groups_and_failures() {
        let mut out = Vec::new();
        write_report(&mut out, &report_with_failure(), false).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("Duplicate group"));
        assert!(text.contains("  /a\n"));
        assert!(text.contains("/gone"));
    }

    #[test]
    fn test_write_json() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("report.json");
        let report = RunReport {
            initial: stats(3, 2, 5),
            prefix_pruned: stats(2, 1, 5),
            confirmed: stats(2, 1, 5),
            empty_files: 0,
            groups: vec![DuplicateGroup {
                size: 5,
                digest: 42,
                paths: vec![PathBuf::from("/a"), PathBuf::from("/b")],
            }],
            failures: Vec::new(),
        };

        write_json(&report, &out).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert!(value["generated_at"].is_string());
        assert_eq!(value["confirmed"]["files"], 2);
        assert_eq!(value["groups"][0]["paths"][1], "/b");
    }
}
