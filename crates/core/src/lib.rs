//! branch-audit-core
//!
//! Core library for auditing AArch64 ELF binaries for indirect branches
//! (`br`, `blr`, and optionally their pointer-authenticated forms) that a
//! control-flow mitigation should have removed.
//!
//! Pipeline: [`backends::elf`] builds a [`model::BinaryImage`], the
//! [`analysis::Scanner`] matches every instruction word and attributes hits to
//! symbols, the [`analysis::Classifier`] exempts known start-up code, and
//! [`report`] turns the results into text and an exit status.
//!
//! All substantive logic lives here so it is testable and reusable from
//! frontends other than the CLI.

pub mod analysis;
pub mod backends;
pub mod config;
pub mod model;
pub mod report;
pub mod services;

/// Returns the library version as encoded at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
