//! Core data model for binaries, symbols, and indirect-branch findings.
//!
//! These types are deliberately plain: the object model adapters fill them in,
//! the scanner turns them into [`Finding`]s, and the reporter serializes them.

use serde::{Deserialize, Serialize};

/// Fixed instruction width of the target architecture, in bytes.
pub const INSTRUCTION_WIDTH: usize = 4;

/// Symbol name used when an address cannot be attributed to any symbol.
pub const UNKNOWN_SYMBOL: &str = "<unknown>";

/// Permission flags carried by a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SegmentFlags {
    pub read: bool,
    pub write: bool,
    pub execute: bool,
}

impl SegmentFlags {
    /// Read + execute, the usual permission set of a text segment.
    pub const RX: SegmentFlags = SegmentFlags { read: true, write: false, execute: true };

    /// Render as the familiar `rwx` triplet, with `-` for missing permissions.
    pub fn as_rwx(&self) -> String {
        let mut s = String::with_capacity(3);
        s.push(if self.read { 'r' } else { '-' });
        s.push(if self.write { 'w' } else { '-' });
        s.push(if self.execute { 'x' } else { '-' });
        s
    }
}

/// One loadable region of the binary's address space.
///
/// `bytes[i]` lives at virtual address `base_address + i`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub base_address: u64,
    pub bytes: Vec<u8>,
    pub flags: SegmentFlags,
    /// Size once loaded (`p_memsz`); at least `bytes.len()`.
    pub memory_size: u64,
}

impl Segment {
    pub fn new(base_address: u64, bytes: impl Into<Vec<u8>>, flags: SegmentFlags) -> Self {
        let bytes = bytes.into();
        let memory_size = bytes.len() as u64;
        Self { base_address, bytes, flags, memory_size }
    }

    /// Override the in-memory size, e.g. for zero-filled tails. Never
    /// shrinks below the file-backed length.
    pub fn with_memory_size(mut self, size: u64) -> Self {
        self.memory_size = size.max(self.bytes.len() as u64);
        self
    }

    /// Convenience constructor for an executable (r-x) segment.
    pub fn executable(base_address: u64, bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(base_address, bytes, SegmentFlags::RX)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// First address past the end of the segment.
    pub fn end_address(&self) -> u64 {
        self.base_address.saturating_add(self.bytes.len() as u64)
    }

    pub fn contains(&self, address: u64) -> bool {
        address >= self.base_address && address < self.end_address()
    }

    /// Like [`contains`](Self::contains) but over the whole in-memory extent.
    pub fn maps(&self, address: u64) -> bool {
        address >= self.base_address
            && address < self.base_address.saturating_add(self.memory_size)
    }
}

/// Named section header, used only to annotate segments in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub start_address: u64,
    pub size: u64,
}

impl Section {
    pub fn new(name: impl Into<String>, start_address: u64, size: u64) -> Self {
        Self { name: name.into(), start_address, size }
    }
}

/// A named entity (usually a function) with a starting virtual address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub address: u64,
}

impl Symbol {
    pub fn new(name: impl Into<String>, address: u64) -> Self {
        Self { name: name.into(), address }
    }
}

/// A single matched indirect-branch instruction with its resolved location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub address: u64,
    pub raw_bytes: [u8; 4],
    pub disassembly_text: String,
    pub symbol_name: String,
    pub symbol_offset: u64,
    pub is_critical: bool,
    /// Names of every opcode pattern the instruction word satisfied.
    pub classes: Vec<String>,
}

impl Finding {
    /// The little-endian instruction word behind `raw_bytes`.
    pub fn word(&self) -> u32 {
        u32::from_le_bytes(self.raw_bytes)
    }

    /// True when the address could not be attributed to a symbol.
    pub fn is_unresolved(&self) -> bool {
        self.symbol_name == UNKNOWN_SYMBOL
    }

    /// `symbol +0xoffset`, the location format used throughout reports.
    pub fn location(&self) -> String {
        format!("{} +{:#x}", self.symbol_name, self.symbol_offset)
    }
}

/// Findings of one executable segment, plus the overlay used when reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentScan {
    pub base_address: u64,
    pub length: u64,
    pub flags: SegmentFlags,
    /// Names of the sections whose start address falls inside this segment.
    pub sections: Vec<String>,
    pub findings: Vec<Finding>,
}

/// Everything found in a single input file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub file_path: String,
    pub segments: Vec<SegmentScan>,
}

impl ScanResult {
    pub fn new(file_path: impl Into<String>, segments: Vec<SegmentScan>) -> Self {
        Self { file_path: file_path.into(), segments }
    }

    /// All findings in discovery order (segment order, then ascending address).
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.segments.iter().flat_map(|s| s.findings.iter())
    }

    pub fn findings_mut(&mut self) -> impl Iterator<Item = &mut Finding> {
        self.segments.iter_mut().flat_map(|s| s.findings.iter_mut())
    }

    pub fn critical_count(&self) -> usize {
        self.findings().filter(|f| f.is_critical).count()
    }

    /// True when at least one critical finding remains.
    pub fn has_critical(&self) -> bool {
        self.findings().any(|f| f.is_critical)
    }
}

/// Read-only view of one compiled binary: segments, sections, and symbols.
///
/// Built by a format adapter (see [`crate::backends::elf`]) or directly, for
/// synthetic images.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BinaryImage {
    segments: Vec<Segment>,
    sections: Vec<Section>,
    symbols: Vec<Symbol>,
}

impl BinaryImage {
    pub fn new(segments: Vec<Segment>, sections: Vec<Section>, symbols: Vec<Symbol>) -> Self {
        Self { segments, sections, symbols }
    }

    /// Parse an AArch64 ELF64 little-endian object.
    pub fn parse(bytes: &[u8]) -> Result<Self, crate::backends::elf::ParseError> {
        crate::backends::elf::parse(bytes)
    }

    /// All segments, in program header order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segments whose permissions include execute.
    pub fn executable_segments(&self) -> impl Iterator<Item = &Segment> {
        self.segments.iter().filter(|s| s.flags.execute)
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Names of sections starting inside `segment`'s in-memory extent.
    pub fn sections_in(&self, segment: &Segment) -> Vec<String> {
        self.sections
            .iter()
            .filter(|s| !s.name.is_empty() && segment.maps(s.start_address))
            .map(|s| s.name.clone())
            .collect()
    }
}
