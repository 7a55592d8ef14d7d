use std::path::{Path, PathBuf};

use rayon::prelude::*;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, info_span, warn};

use crate::analysis::{Classifier, PatternSet, Scanner};
use crate::backends::elf::ParseError;
use crate::backends::{
    default_disassembler_name, default_disassembler_registry, Disassembler, DisassemblerRegistry,
    DisassemblyError, HexDisassembler,
};
use crate::config::AuditConfig;
use crate::model::{BinaryImage, ScanResult};
use crate::report::FileOutcome;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("Failed to read {path}: {source}")]
    Unreadable { path: PathBuf, source: std::io::Error },
    #[error("Failed to parse {path}: {source}")]
    Parse { path: String, source: ParseError },
    #[error(transparent)]
    Disassembler(#[from] DisassemblyError),
}

/// Options for a batch run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuditOptions {
    /// Disassembler name; `None` uses the policy default, then the build default.
    pub disassembler: Option<String>,
    /// Audit files on a rayon pool. Output order still follows the input.
    pub parallel: bool,
}

/// Runs the read → parse → scan → classify pipeline for each file.
///
/// Holds only immutable state, so one auditor can serve concurrent scans;
/// each scan builds its own disassembler.
pub struct Auditor {
    patterns: PatternSet,
    classifier: Classifier,
    registry: DisassemblerRegistry,
    disassembler: String,
}

impl Auditor {
    /// Build an auditor, checking up front that the disassembler exists.
    pub fn new(config: &AuditConfig, options: &AuditOptions) -> Result<Self, AuditError> {
        let registry = default_disassembler_registry();
        let disassembler = options
            .disassembler
            .clone()
            .or_else(|| config.default_disassembler.clone())
            .unwrap_or_else(|| default_disassembler_name().to_string());
        if !registry.contains(&disassembler) {
            return Err(DisassemblyError::UnknownBackend {
                name: disassembler,
                available: registry.names().join(", "),
            }
            .into());
        }
        Ok(Self {
            patterns: config.pattern_set(),
            classifier: config.classifier(),
            registry,
            disassembler,
        })
    }

    pub fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn disassembler_name(&self) -> &str {
        &self.disassembler
    }

    fn make_disassembler(&self) -> Box<dyn Disassembler> {
        self.registry.create(&self.disassembler).unwrap_or_else(|e| {
            warn!(error = %e, "disassembler unavailable, using hex rendering");
            Box::new(HexDisassembler)
        })
    }

    /// Scan and classify an already-built image.
    pub fn audit_image(&self, file_path: &str, image: &BinaryImage) -> ScanResult {
        let disassembler = self.make_disassembler();
        let scanner = Scanner::new(&self.patterns, disassembler.as_ref());
        let mut result = ScanResult::new(file_path, scanner.scan_segments(image));
        let critical = self.classifier.classify_all(&mut result);
        debug!(findings = result.findings().count(), critical, "classified findings");
        result
    }

    /// Parse ELF bytes and audit them.
    pub fn audit_bytes(&self, file_path: &str, bytes: &[u8]) -> Result<ScanResult, AuditError> {
        let image = BinaryImage::parse(bytes)
            .map_err(|source| AuditError::Parse { path: file_path.to_string(), source })?;
        Ok(self.audit_image(file_path, &image))
    }

    /// Audit one file on disk. Never fails: problems become
    /// [`FileOutcome::Unverified`].
    pub fn audit_path(&self, path: &Path) -> FileOutcome {
        let file_path = path.display().to_string();
        let span = info_span!("audit", path = %file_path);
        let _guard = span.enter();

        let bytes = match std::fs::read(path) {
            Ok(bytes) => bytes,
            Err(source) => {
                let error = AuditError::Unreadable { path: path.to_path_buf(), source };
                warn!(%error, "skipping file");
                return FileOutcome::Unverified { file_path, error: error.to_string() };
            }
        };

        match self.audit_bytes(&file_path, &bytes) {
            Ok(result) => {
                info!(critical = result.critical_count(), "scanned");
                FileOutcome::Scanned { result, sha256: Some(sha256_hex(&bytes)) }
            }
            Err(error) => {
                warn!(%error, "skipping file");
                FileOutcome::Unverified { file_path, error: error.to_string() }
            }
        }
    }

    /// Audit every path, returning outcomes in input order.
    pub fn audit_batch(&self, paths: &[PathBuf], parallel: bool) -> Vec<FileOutcome> {
        if parallel {
            paths.par_iter().map(|p| self.audit_path(p)).collect()
        } else {
            paths.iter().map(|p| self.audit_path(p)).collect()
        }
    }
}

/// SHA-256 of `bytes` as a lowercase hex string.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    format!("{:x}", digest)
}

/// Build an auditor from `config` and audit `paths` with it.
pub fn run_batch(
    config: &AuditConfig,
    options: &AuditOptions,
    paths: &[PathBuf],
) -> Result<Vec<FileOutcome>, AuditError> {
    let auditor = Auditor::new(config, options)?;
    info!(
        files = paths.len(),
        patterns = auditor.patterns().len(),
        disassembler = auditor.disassembler_name(),
        parallel = options.parallel,
        "starting audit"
    );
    Ok(auditor.audit_batch(paths, options.parallel))
}
