//! Per-file reports and the batch verdict.
//!
//! A file *fails* when it still has a critical finding, or when it could not
//! be verified at all (unreadable, not an AArch64 ELF). The process exit
//! status is 0 only when no file fails.

use std::io::{self, Write};

use serde::{Deserialize, Serialize};

use crate::model::{Finding, ScanResult, SegmentScan};

/// Outcome of auditing one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Scanned {
        result: ScanResult,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sha256: Option<String>,
    },
    Unverified {
        file_path: String,
        error: String,
    },
}

impl FileOutcome {
    pub fn file_path(&self) -> &str {
        match self {
            FileOutcome::Scanned { result, .. } => &result.file_path,
            FileOutcome::Unverified { file_path, .. } => file_path,
        }
    }

    pub fn scan_result(&self) -> Option<&ScanResult> {
        match self {
            FileOutcome::Scanned { result, .. } => Some(result),
            FileOutcome::Unverified { .. } => None,
        }
    }

    /// True when the file has remaining critical branches or could not be checked.
    pub fn is_failing(&self) -> bool {
        match self {
            FileOutcome::Scanned { result, .. } => result.has_critical(),
            FileOutcome::Unverified { .. } => true,
        }
    }
}

/// Aggregated verdict over a batch of files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub failing_files: usize,
    pub total_files: usize,
}

impl BatchSummary {
    pub fn from_outcomes(outcomes: &[FileOutcome]) -> Self {
        Self {
            failing_files: outcomes.iter().filter(|o| o.is_failing()).count(),
            total_files: outcomes.len(),
        }
    }

    pub fn passed(&self) -> bool {
        self.failing_files == 0
    }

    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            0
        } else {
            1
        }
    }

    pub fn summary_line(&self) -> String {
        format!(
            "{} / {} files have indirect branches remaining",
            self.failing_files, self.total_files
        )
    }
}

/// One report line for a finding.
pub fn finding_line(finding: &Finding) -> String {
    let raw: Vec<String> = finding.raw_bytes.iter().map(|b| format!("{b:02x}")).collect();
    let disasm = format!("{:#x}: {}  {}", finding.address, raw.join(" "), finding.disassembly_text);
    let marker = if finding.is_critical { "" } else { "  (allowed)" };
    format!("{disasm:48} |  location: {}{marker}", finding.location())
}

fn write_segment<W: Write>(out: &mut W, segment: &SegmentScan) -> io::Result<()> {
    writeln!(
        out,
        "Executable segment: {:#x}..{:#x} ({})",
        segment.base_address,
        segment.base_address.saturating_add(segment.length),
        segment.flags.as_rwx()
    )?;
    for section in &segment.sections {
        writeln!(out, "  - contains section {section}")?;
    }
    writeln!(out, "  - length: {} bytes", segment.length)?;
    writeln!(out, "Found {} indirect branches:", segment.findings.len())?;
    for finding in &segment.findings {
        writeln!(out, "{}", finding_line(finding))?;
    }
    Ok(())
}

/// Human-readable report for a single file, followed by a blank line.
pub fn write_file_report<W: Write>(out: &mut W, outcome: &FileOutcome) -> io::Result<()> {
    writeln!(out, "{}", outcome.file_path())?;
    match outcome {
        FileOutcome::Scanned { result, .. } => {
            if result.segments.is_empty() {
                writeln!(out, "No executable segments")?;
            }
            for segment in &result.segments {
                write_segment(out, segment)?;
            }
        }
        FileOutcome::Unverified { error, .. } => {
            writeln!(out, "  error: {error}")?;
            writeln!(out, "  (file could not be verified; counted as failing)")?;
        }
    }
    writeln!(out)
}

/// All file reports followed by the summary line; returns the summary.
pub fn write_batch_report<W: Write>(out: &mut W, outcomes: &[FileOutcome]) -> io::Result<BatchSummary> {
    for outcome in outcomes {
        write_file_report(out, outcome)?;
    }
    let summary = BatchSummary::from_outcomes(outcomes);
    writeln!(out, "{}", summary.summary_line())?;
    Ok(summary)
}
