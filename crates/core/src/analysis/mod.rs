//! Indirect-branch detection: matching, symbol attribution, and classification.
//!
//! - [`matcher`]: `(mask, pattern)` opcode classes and pattern sets.
//! - [`resolver`]: nearest-symbol-below lookup.
//! - [`scanner`]: walks executable segments and emits findings.
//! - [`classifier`]: allow-list policy for start-up code.

pub mod classifier;
pub mod matcher;
pub mod resolver;
pub mod scanner;

pub use classifier::{default_exemptions, Classifier, Exemption};
pub use matcher::{matches, OpcodePattern, PatternError, PatternSet};
pub use resolver::{ResolveError, SymbolResolver};
pub use scanner::Scanner;
