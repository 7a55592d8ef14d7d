use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use branch_audit_core::config::AuditConfig;
use branch_audit_core::report::{self, BatchSummary, FileOutcome};
use branch_audit_core::services::{run_batch, AuditOptions};
use chrono::Utc;
use serde::Serialize;
use tracing::debug;

/// Sample scanned when the CLI is run without any file arguments.
pub const DEFAULT_SAMPLE_PATH: &str = "../temp/sample1-aarch64";

const USAGE: &str = "USAGE: branch-audit <files>...";

/// Everything the scan command needs, independent of clap.
#[derive(Debug, Clone, Default)]
pub struct ScanArgs {
    pub files: Vec<PathBuf>,
    pub policy: Option<PathBuf>,
    pub pointer_auth: bool,
    pub disassembler: Option<String>,
    pub json: bool,
    pub parallel: bool,
}

impl ScanArgs {
    fn options(&self) -> AuditOptions {
        AuditOptions { disassembler: self.disassembler.clone(), parallel: self.parallel }
    }
}

/// Machine-readable report emitted with `--json`.
#[derive(Debug, Serialize)]
pub struct JsonReport<'a> {
    pub generated_at: String,
    pub tool_version: &'static str,
    pub files: &'a [FileOutcome],
    pub summary: BatchSummary,
}

/// Load the policy file if one was given, then apply CLI overrides.
pub fn load_config(policy: Option<&Path>, pointer_auth: bool) -> Result<AuditConfig> {
    let mut config = match policy {
        Some(path) => AuditConfig::load(path)
            .with_context(|| format!("Failed to load policy from {}", path.display()))?,
        None => AuditConfig::default(),
    };
    if pointer_auth {
        config.pointer_auth = true;
    }
    debug!(
        policy = ?policy,
        pointer_auth = config.pointer_auth,
        exemptions = config.exemptions.len(),
        "policy loaded"
    );
    Ok(config)
}

fn write_json_report<W: Write>(out: &mut W, outcomes: &[FileOutcome]) -> Result<BatchSummary> {
    let summary = BatchSummary::from_outcomes(outcomes);
    let json = JsonReport {
        generated_at: Utc::now().to_rfc3339(),
        tool_version: branch_audit_core::version(),
        files: outcomes,
        summary,
    };
    let serialized =
        serde_json::to_string_pretty(&json).context("Failed to serialize report to JSON")?;
    writeln!(out, "{serialized}").context("Failed to write report")?;
    Ok(summary)
}

/// Audit every file in `args` and print the report.
///
/// Returns the process exit code: 0 when no file has critical branches left
/// (and every file could be verified), 1 otherwise.
pub fn scan_command(args: &ScanArgs) -> Result<i32> {
    let config = load_config(args.policy.as_deref(), args.pointer_auth)?;
    let outcomes =
        run_batch(&config, &args.options(), &args.files).context("Failed to start audit")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let summary = if args.json {
        write_json_report(&mut out, &outcomes)?
    } else {
        report::write_batch_report(&mut out, &outcomes).context("Failed to write report")?
    };
    out.flush().context("Failed to flush report")?;

    Ok(summary.exit_code())
}

/// Diagnostic mode: scan the bundled sample path and print usage.
///
/// Always exits 0, whatever the sample's verdict. With `--json` the report
/// goes to stdout as JSON and the usage line to stderr.
pub fn demo_command(args: &ScanArgs) -> Result<i32> {
    let config = load_config(args.policy.as_deref(), args.pointer_auth)?;
    let outcomes = run_batch(&config, &args.options(), &[PathBuf::from(DEFAULT_SAMPLE_PATH)])
        .context("Failed to start audit")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if args.json {
        write_json_report(&mut out, &outcomes)?;
        eprintln!("{USAGE}");
    } else {
        for outcome in &outcomes {
            report::write_file_report(&mut out, outcome).context("Failed to write report")?;
        }
        writeln!(out, "{USAGE}").context("Failed to write usage")?;
    }
    out.flush().context("Failed to flush report")?;

    Ok(0)
}
