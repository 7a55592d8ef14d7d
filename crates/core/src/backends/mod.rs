//! Adapters for the external capabilities the scanner relies on.
//!
//! - [`elf`]: turns ELF bytes into a [`BinaryImage`](crate::model::BinaryImage) (goblin).
//! - [`capstone`]: renders instruction text (Capstone), behind the
//!   `capstone-backend` feature.
//! - [`HexDisassembler`]: dependency-free fallback used when no real
//!   disassembler is available.
//!
//! Disassemblers are created per scan through a [`DisassemblerRegistry`] of
//! factories, so each file (or worker) owns its own handle.

#[cfg(feature = "capstone-backend")]
pub mod capstone;
pub mod elf;

use std::collections::BTreeMap;

use thiserror::Error;

#[cfg(feature = "capstone-backend")]
pub use self::capstone::CapstoneDisassembler;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DisassemblyError {
    #[error("disassembler init failed: {0}")]
    Init(String),
    #[error("cannot decode {bytes:02x?} at {address:#x}: {message}")]
    Decode { address: u64, bytes: Vec<u8>, message: String },
    #[error("unknown disassembler {name:?} (available: {available})")]
    UnknownBackend { name: String, available: String },
}

/// Renders one instruction as text.
pub trait Disassembler {
    fn disassemble(&self, bytes: &[u8], address: u64) -> Result<String, DisassemblyError>;
    fn name(&self) -> &'static str;
}

/// Text used when an instruction cannot be disassembled.
pub fn fallback_text(bytes: &[u8]) -> String {
    match <[u8; 4]>::try_from(bytes) {
        Ok(word) => format!(".inst {:#010x}", u32::from_le_bytes(word)),
        Err(_) => {
            let hex: Vec<String> = bytes.iter().map(|b| format!("{b:02x}")).collect();
            format!(".byte {}", hex.join(" "))
        }
    }
}

/// Always succeeds with the raw word in hex.
#[derive(Debug, Clone, Copy, Default)]
pub struct HexDisassembler;

impl Disassembler for HexDisassembler {
    fn disassemble(&self, bytes: &[u8], _address: u64) -> Result<String, DisassemblyError> {
        Ok(fallback_text(bytes))
    }

    fn name(&self) -> &'static str {
        "hex"
    }
}

/// Builds a fresh disassembler instance.
pub type DisassemblerFactory = fn() -> Result<Box<dyn Disassembler>, DisassemblyError>;

/// Registry of disassembler factories; callers select by name.
#[derive(Default, Clone)]
pub struct DisassemblerRegistry {
    factories: BTreeMap<&'static str, DisassemblerFactory>,
}

impl DisassemblerRegistry {
    pub fn new() -> Self {
        Self { factories: BTreeMap::new() }
    }

    pub fn register(&mut self, name: &'static str, factory: DisassemblerFactory) -> &mut Self {
        self.factories.insert(name, factory);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Instantiate the disassembler registered under `name`.
    pub fn create(&self, name: &str) -> Result<Box<dyn Disassembler>, DisassemblyError> {
        let factory = self.factories.get(name).ok_or_else(|| DisassemblyError::UnknownBackend {
            name: name.to_string(),
            available: self.names().join(", "),
        })?;
        factory()
    }

    /// Sorted list of registered names for error messages/help.
    pub fn names(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }
}

/// Name of the disassembler used when none is requested.
pub fn default_disassembler_name() -> &'static str {
    if cfg!(feature = "capstone-backend") {
        "capstone"
    } else {
        "hex"
    }
}

/// Registry populated with every disassembler compiled into this build.
pub fn default_disassembler_registry() -> DisassemblerRegistry {
    let mut registry = DisassemblerRegistry::new();
    registry.register("hex", hex_factory);
    #[cfg(feature = "capstone-backend")]
    {
        registry.register("capstone", capstone_factory);
    }
    registry
}

fn hex_factory() -> Result<Box<dyn Disassembler>, DisassemblyError> {
    Ok(Box::new(HexDisassembler))
}

#[cfg(feature = "capstone-backend")]
fn capstone_factory() -> Result<Box<dyn Disassembler>, DisassemblyError> {
    Ok(Box::new(CapstoneDisassembler::arm64()?))
}
