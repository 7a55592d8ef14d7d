//! Walks executable segments word by word and records every indirect branch.

use tracing::{debug, warn};

use crate::analysis::matcher::PatternSet;
use crate::analysis::resolver::SymbolResolver;
use crate::backends::{fallback_text, Disassembler};
use crate::model::{
    BinaryImage, Finding, Segment, SegmentScan, INSTRUCTION_WIDTH, UNKNOWN_SYMBOL,
};

/// Segment scanner bound to a pattern set and a disassembler.
///
/// Findings come out in discovery order: segment order, then ascending
/// address within a segment. Every finding starts out critical; the
/// classifier decides otherwise.
pub struct Scanner<'a> {
    patterns: &'a PatternSet,
    disassembler: &'a dyn Disassembler,
}

impl<'a> Scanner<'a> {
    pub fn new(patterns: &'a PatternSet, disassembler: &'a dyn Disassembler) -> Self {
        Self { patterns, disassembler }
    }

    /// Scan every executable segment of `image`, keeping the per-segment grouping.
    pub fn scan_segments(&self, image: &BinaryImage) -> Vec<SegmentScan> {
        let resolver = SymbolResolver::new(image.symbols());
        image
            .executable_segments()
            .map(|segment| SegmentScan {
                base_address: segment.base_address,
                length: segment.len() as u64,
                flags: segment.flags,
                sections: image.sections_in(segment),
                findings: self.scan_segment(segment, &resolver),
            })
            .collect()
    }

    /// Flat list of findings across all executable segments.
    pub fn scan(&self, image: &BinaryImage) -> Vec<Finding> {
        self.scan_segments(image).into_iter().flat_map(|s| s.findings).collect()
    }

    fn scan_segment(&self, segment: &Segment, resolver: &SymbolResolver) -> Vec<Finding> {
        let tail = segment.len() % INSTRUCTION_WIDTH;
        if tail != 0 {
            debug!(
                base = %format!("{:#x}", segment.base_address),
                tail,
                "ignoring trailing partial instruction"
            );
        }

        let mut findings = Vec::new();
        for (index, chunk) in segment.bytes.chunks_exact(INSTRUCTION_WIDTH).enumerate() {
            let raw_bytes = [chunk[0], chunk[1], chunk[2], chunk[3]];
            let word = u32::from_le_bytes(raw_bytes);
            let classes: Vec<String> =
                self.patterns.matching(word).map(|p| p.name().to_string()).collect();
            if classes.is_empty() {
                continue;
            }

            let offset = (index * INSTRUCTION_WIDTH) as u64;
            let Some(address) = segment.base_address.checked_add(offset) else {
                warn!(
                    base = %format!("{:#x}", segment.base_address),
                    "segment wraps the address space, stopping scan"
                );
                break;
            };
            let disassembly_text = match self.disassembler.disassemble(&raw_bytes, address) {
                Ok(text) => text,
                Err(e) => {
                    warn!(error = %e, "falling back to raw encoding");
                    fallback_text(&raw_bytes)
                }
            };
            let (symbol_name, symbol_offset) = resolver.resolve_or_unknown(address);
            if symbol_name == UNKNOWN_SYMBOL {
                debug!(address = %format!("{address:#x}"), "no symbol covers indirect branch");
            }

            findings.push(Finding {
                address,
                raw_bytes,
                disassembly_text,
                symbol_name,
                symbol_offset,
                is_critical: true,
                classes,
            });
        }
        findings
    }
}
