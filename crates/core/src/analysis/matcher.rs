//! Instruction matching against `(mask, pattern)` opcode classes.

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// `br Xn`: branch to register.
pub const BR: (u32, u32) = (0xFFFF_FC1F, 0xD61F_0000);
/// `blr Xn`: branch with link to register.
pub const BLR: (u32, u32) = (0xFFFF_FC1F, 0xD63F_0000);
/// `braa`/`brab Xn, Xm`: authenticated branch to register, either key.
pub const BRA: (u32, u32) = (0xFFFF_F800, 0xD71F_0800);
/// `braaz`/`brabz Xn`: authenticated branch with zero modifier.
pub const BRAZ: (u32, u32) = (0xFFFF_F81F, 0xD61F_081F);
/// `blraa`/`blrab Xn, Xm`: authenticated branch with link.
pub const BLRA: (u32, u32) = (0xFFFF_F800, 0xD73F_0800);
/// `blraaz`/`blrabz Xn`: authenticated branch with link, zero modifier.
pub const BLRAZ: (u32, u32) = (0xFFFF_F81F, 0xD63F_081F);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("pattern {name}: bits {pattern:#010x} fall outside mask {mask:#010x}")]
    OutsideMask { name: String, mask: u32, pattern: u32 },
    #[error("pattern name must not be empty")]
    EmptyName,
}

/// One opcode class: a word matches iff `word & mask == pattern`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpcodePattern {
    name: String,
    mask: u32,
    pattern: u32,
}

impl OpcodePattern {
    /// Build a pattern, rejecting pattern bits that lie outside the mask
    /// (such a pattern could never match anything).
    pub fn new(name: impl Into<String>, mask: u32, pattern: u32) -> Result<Self, PatternError> {
        let name = name.into();
        if name.is_empty() {
            return Err(PatternError::EmptyName);
        }
        if pattern & mask != pattern {
            return Err(PatternError::OutsideMask { name, mask, pattern });
        }
        Ok(Self { name, mask, pattern })
    }

    fn builtin(name: &str, (mask, pattern): (u32, u32)) -> Self {
        debug_assert_eq!(pattern & mask, pattern);
        Self { name: name.to_string(), mask, pattern }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn pattern(&self) -> u32 {
        self.pattern
    }

    pub fn matches(&self, word: u32) -> bool {
        matches(word, self)
    }
}

/// The matcher contract: `(word & mask) == pattern`.
#[inline]
pub fn matches(word: u32, pattern: &OpcodePattern) -> bool {
    (word & pattern.mask) == pattern.pattern
}

/// A 32-bit instruction word in any form [`deserialize_number`] accepts.
fn deserialize_word<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = deserialize_number(deserializer)?;
    u32::try_from(value)
        .map_err(|_| serde::de::Error::custom(format!("word {value:#x} does not fit in 32 bits")))
}

/// A 64-bit number written either as an integer or as a `"0x…"`/decimal
/// string, `_` separators allowed.
pub(crate) fn deserialize_number<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Int(u64),
        Text(String),
    }

    match Number::deserialize(deserializer)? {
        Number::Int(n) => Ok(n),
        Number::Text(text) => {
            let cleaned = text.trim().replace('_', "");
            let parsed = match cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
                Some(hex) => u64::from_str_radix(hex, 16),
                None => cleaned.parse::<u64>(),
            };
            parsed.map_err(|e| serde::de::Error::custom(format!("invalid number {text:?}: {e}")))
        }
    }
}

impl<'de> Deserialize<'de> for OpcodePattern {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            name: String,
            #[serde(deserialize_with = "deserialize_word")]
            mask: u32,
            #[serde(deserialize_with = "deserialize_word")]
            pattern: u32,
        }

        let raw = Raw::deserialize(deserializer)?;
        OpcodePattern::new(raw.name, raw.mask, raw.pattern).map_err(serde::de::Error::custom)
    }
}

/// An ordered set of opcode classes tested against every instruction word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSet {
    patterns: Vec<OpcodePattern>,
}

impl PatternSet {
    pub fn new(patterns: Vec<OpcodePattern>) -> Self {
        Self { patterns }
    }

    /// `br` and `blr`, the two unconditional register branches.
    pub fn indirect_branches() -> Self {
        Self::new(vec![OpcodePattern::builtin("br", BR), OpcodePattern::builtin("blr", BLR)])
    }

    /// The pointer-authenticated variants (`bra*`, `blra*`).
    pub fn pointer_auth() -> Self {
        Self::new(vec![
            OpcodePattern::builtin("braa/brab", BRA),
            OpcodePattern::builtin("braaz/brabz", BRAZ),
            OpcodePattern::builtin("blraa/blrab", BLRA),
            OpcodePattern::builtin("blraaz/blrabz", BLRAZ),
        ])
    }

    pub fn extend(&mut self, patterns: impl IntoIterator<Item = OpcodePattern>) {
        self.patterns.extend(patterns);
    }

    pub fn patterns(&self) -> &[OpcodePattern] {
        &self.patterns
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Every class `word` satisfies, in configuration order.
    ///
    /// Classes are not assumed to be mutually exclusive.
    pub fn matching(&self, word: u32) -> impl Iterator<Item = &OpcodePattern> + '_ {
        self.patterns.iter().filter(move |p| p.matches(word))
    }

    pub fn is_match(&self, word: u32) -> bool {
        self.patterns.iter().any(|p| p.matches(word))
    }
}

impl Default for PatternSet {
    fn default() -> Self {
        Self::indirect_branches()
    }
}
