//! Nearest-symbol-below lookup for attributing addresses to functions.

use thiserror::Error;

use crate::model::{Symbol, UNKNOWN_SYMBOL};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no symbol at or below {address:#x}")]
    UnresolvedAddress { address: u64 },
}

/// Address-sorted view of a symbol table.
///
/// Built once per scan; every lookup is a binary search for the greatest
/// symbol address `<=` the query. When several symbols share that address the
/// one that came first in the original table wins.
#[derive(Debug, Clone)]
pub struct SymbolResolver {
    sorted: Vec<Symbol>,
}

impl SymbolResolver {
    pub fn new(symbols: &[Symbol]) -> Self {
        let mut sorted = symbols.to_vec();
        // stable: equal addresses keep table order
        sorted.sort_by_key(|s| s.address);
        Self { sorted }
    }

    pub fn len(&self) -> usize {
        self.sorted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted.is_empty()
    }

    /// Symbols in lookup order.
    pub fn symbols(&self) -> &[Symbol] {
        &self.sorted
    }

    /// Returns the containing symbol's name and the offset of `address` in it.
    pub fn resolve(&self, address: u64) -> Result<(&str, u64), ResolveError> {
        let above = self.sorted.partition_point(|s| s.address <= address);
        if above == 0 {
            return Err(ResolveError::UnresolvedAddress { address });
        }
        let nearest = self.sorted[above - 1].address;
        let first = self.sorted[..above].partition_point(|s| s.address < nearest);
        let symbol = &self.sorted[first];
        Ok((symbol.name.as_str(), address - symbol.address))
    }

    /// Like [`resolve`](Self::resolve) but never fails: unresolved addresses
    /// map to [`UNKNOWN_SYMBOL`] with the raw address as offset.
    pub fn resolve_or_unknown(&self, address: u64) -> (String, u64) {
        match self.resolve(address) {
            Ok((name, offset)) => (name.to_string(), offset),
            Err(ResolveError::UnresolvedAddress { .. }) => (UNKNOWN_SYMBOL.to_string(), address),
        }
    }
}
