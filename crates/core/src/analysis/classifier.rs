//! Allow-list policy deciding which findings are security relevant.

use serde::{Deserialize, Serialize};

use crate::analysis::matcher::deserialize_number;
use crate::model::{Finding, ScanResult};

/// Exempts branches within the first `max_offset` bytes of `symbol`.
///
/// Intended for process start-up code that runs before any attacker input
/// or sensitive data is reachable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exemption {
    pub symbol: String,
    #[serde(deserialize_with = "deserialize_number")]
    pub max_offset: u64,
}

impl Exemption {
    pub fn new(symbol: impl Into<String>, max_offset: u64) -> Self {
        Self { symbol: symbol.into(), max_offset }
    }

    pub fn covers(&self, finding: &Finding) -> bool {
        finding.symbol_name == self.symbol && finding.symbol_offset <= self.max_offset
    }
}

/// The start-up routines musl runs before `main`.
pub fn default_exemptions() -> Vec<Exemption> {
    vec![Exemption::new("libc_start_init", 0x100), Exemption::new("libc_exit_fini", 0x100)]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    exemptions: Vec<Exemption>,
}

impl Classifier {
    pub fn new(exemptions: Vec<Exemption>) -> Self {
        Self { exemptions }
    }

    pub fn exemptions(&self) -> &[Exemption] {
        &self.exemptions
    }

    /// True when `finding` is not covered by any exemption.
    ///
    /// Unresolved findings are always critical: without a symbol there is
    /// no way to show they sit in exempted code.
    pub fn is_critical(&self, finding: &Finding) -> bool {
        if finding.is_unresolved() {
            return true;
        }
        !self.exemptions.iter().any(|e| e.covers(finding))
    }

    /// Sets `finding.is_critical` and returns the new value.
    pub fn classify(&self, finding: &mut Finding) -> bool {
        finding.is_critical = self.is_critical(finding);
        finding.is_critical
    }

    /// Classify every finding of a scan; returns the number of critical ones.
    pub fn classify_all(&self, result: &mut ScanResult) -> usize {
        result.findings_mut().map(|f| self.classify(f)).filter(|critical| *critical).count()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(default_exemptions())
    }
}
