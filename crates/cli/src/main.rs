use std::path::PathBuf;
use std::process;

use anyhow::Result;
use branch_audit::commands::{demo_command, scan_command, ScanArgs};
use branch_audit::logging::init_logging;
use clap::{ArgAction, Parser};

/// Audit AArch64 ELF binaries for indirect branches (`br`, `blr`) that a
/// control-flow mitigation should have removed.
///
/// Each finding is attributed to the nearest symbol at or below it. Branches
/// in exempted start-up code (by default `libc_start_init` and
/// `libc_exit_fini`, first 0x100 bytes) are reported but do not fail the run.
/// The exit status is 0 only if every file is free of critical branches.
#[derive(Parser, Debug)]
#[command(
    name = "branch-audit",
    version,
    about = "Audit AArch64 binaries for remaining indirect branches",
    long_about = None
)]
struct Cli {
    /// ELF files to audit. Without any, a demo sample is scanned and usage is printed.
    files: Vec<PathBuf>,

    /// Policy file (.json, .yaml or .yml) with extra patterns and exemptions.
    #[arg(long)]
    policy: Option<PathBuf>,

    /// Also flag pointer-authenticated branches (braa, blraa, ...).
    #[arg(long, default_value_t = false)]
    pointer_auth: bool,

    /// Disassembler used to render findings (capstone, hex).
    #[arg(long)]
    disassembler: Option<String>,

    /// Emit JSON instead of human-readable text.
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Audit files concurrently; the report keeps input order.
    #[arg(long, default_value_t = false)]
    parallel: bool,

    /// Increase log verbosity on stderr (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let demo = cli.files.is_empty();
    let args = ScanArgs {
        files: cli.files,
        policy: cli.policy,
        pointer_auth: cli.pointer_auth,
        disassembler: cli.disassembler,
        json: cli.json,
        parallel: cli.parallel,
    };

    let code = if demo { demo_command(&args)? } else { scan_command(&args)? };
    process::exit(code);
}
