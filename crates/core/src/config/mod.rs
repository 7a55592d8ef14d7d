//! Audit policy: which opcode classes count as indirect branches and which
//! start-up routines are exempt.
//!
//! Policies are plain data, loaded from `.json`, `.yaml` or `.yml` files.
//! Every field is optional; a missing field keeps its default.
//!
//! ```yaml
//! pointer_auth: true
//! patterns:
//!   - { name: custom, mask: "0xfffffc1f", pattern: "0xd65f0000" }
//! exemptions:
//!   - { symbol: libc_start_init, max_offset: "0x100" }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analysis::{default_exemptions, Classifier, Exemption, OpcodePattern, PatternSet};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read policy file {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("Failed to parse policy JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Failed to parse policy YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Unsupported policy format for {0} (expected .json, .yaml or .yml)")]
    UnsupportedFormat(PathBuf),
}

fn default_config_version() -> String {
    "0.1.0".to_string()
}

/// Serializable audit policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Schema/config version. This is about the policy format, not the tool.
    #[serde(default = "default_config_version")]
    pub config_version: String,
    /// Also flag the pointer-authenticated branch forms (`bra*`, `blra*`).
    #[serde(default)]
    pub pointer_auth: bool,
    /// Extra opcode classes, checked after the built-in `br`/`blr`.
    #[serde(default)]
    pub patterns: Vec<OpcodePattern>,
    #[serde(default = "default_exemptions")]
    pub exemptions: Vec<Exemption>,
    /// Disassembler to use when the caller does not pick one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_disassembler: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            config_version: default_config_version(),
            pointer_auth: false,
            patterns: Vec::new(),
            exemptions: default_exemptions(),
            default_disassembler: None,
        }
    }
}

impl AuditConfig {
    pub fn from_json_str(body: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(body)?)
    }

    pub fn from_yaml_str(body: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(body)?)
    }

    /// Load a policy file, picking the format from its extension.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let ext = path.extension().and_then(|e| e.to_str()).map(|e| e.to_ascii_lowercase());
        let body = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        match ext.as_deref() {
            Some("json") => Self::from_json_str(&body),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&body),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Built-in patterns, then PAC variants if enabled, then custom ones.
    pub fn pattern_set(&self) -> PatternSet {
        let mut set = PatternSet::indirect_branches();
        if self.pointer_auth {
            set.extend(PatternSet::pointer_auth().patterns().iter().cloned());
        }
        set.extend(self.patterns.iter().cloned());
        set
    }

    pub fn classifier(&self) -> Classifier {
        Classifier::new(self.exemptions.clone())
    }
}
