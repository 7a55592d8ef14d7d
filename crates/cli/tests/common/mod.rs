//! Relocatable AArch64 objects for driving the binary.

use object::write::{Object, Symbol, SymbolSection};
use object::{
    Architecture, BinaryFormat, Endianness, SectionKind, SymbolFlags, SymbolKind, SymbolScope,
};

pub const NOP: u32 = 0xD503_201F;
pub const RET: u32 = 0xD65F_03C0;
pub const BLR_X0: u32 = 0xD63F_0000;
pub const BR_X16: u32 = 0xD61F_0200;
pub const BRAAZ_X1: u32 = 0xD61F_083F;

/// One `.text` section holding `code`, with `(name, offset)` function symbols.
pub fn relocatable_elf(code: &[u32], symbols: &[(&str, u64)]) -> Vec<u8> {
    let mut obj = Object::new(BinaryFormat::Elf, Architecture::Aarch64, Endianness::Little);
    let text = obj.add_section(Vec::new(), b".text".to_vec(), SectionKind::Text);
    let bytes: Vec<u8> = code.iter().flat_map(|w| w.to_le_bytes()).collect();
    obj.section_mut(text).set_data(bytes, 4);
    for (name, value) in symbols {
        obj.add_symbol(Symbol {
            name: name.as_bytes().to_vec(),
            value: *value,
            size: 0,
            kind: SymbolKind::Text,
            scope: SymbolScope::Linkage,
            weak: false,
            section: SymbolSection::Section(text),
            flags: SymbolFlags::None,
        });
    }
    obj.write().expect("write aarch64 object")
}
