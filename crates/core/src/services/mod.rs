pub mod audit;

pub use audit::{run_batch, sha256_hex, AuditError, AuditOptions, Auditor};
