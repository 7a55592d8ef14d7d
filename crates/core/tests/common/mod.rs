//! AArch64 ELF fixtures shared by the integration tests.
#![allow(dead_code)]

use object::write::{Object, Symbol, SymbolSection};
use object::{
    Architecture, BinaryFormat, Endianness, SectionKind, SymbolFlags, SymbolKind, SymbolScope,
};

pub const NOP: u32 = 0xD503_201F;
pub const RET: u32 = 0xD65F_03C0;
pub const BL_0: u32 = 0x9400_0000;
pub const BLR_X0: u32 = 0xD63F_0000;
pub const BR_X16: u32 = 0xD61F_0200;
pub const BRAAZ_X1: u32 = 0xD61F_083F;

pub fn words(ws: &[u32]) -> Vec<u8> {
    ws.iter().flat_map(|w| w.to_le_bytes()).collect()
}

fn text_symbol(name: &str, value: u64, section: object::write::SectionId) -> Symbol {
    Symbol {
        name: name.as_bytes().to_vec(),
        value,
        size: 0,
        kind: SymbolKind::Text,
        scope: SymbolScope::Linkage,
        weak: false,
        section: SymbolSection::Section(section),
        flags: SymbolFlags::None,
    }
}

/// Relocatable object with one `.text` section and `(name, offset)` symbols in it.
pub fn relocatable_elf(code: &[u32], symbols: &[(&str, u64)]) -> Vec<u8> {
    relocatable_elf_sections(&[(".text", code, symbols)])
}

/// Relocatable object with several executable sections.
pub fn relocatable_elf_sections(sections: &[(&str, &[u32], &[(&str, u64)])]) -> Vec<u8> {
    let mut obj = Object::new(BinaryFormat::Elf, Architecture::Aarch64, Endianness::Little);
    for (name, code, symbols) in sections {
        let id = obj.add_section(Vec::new(), name.as_bytes().to_vec(), SectionKind::Text);
        obj.section_mut(id).set_data(words(code), 4);
        for (sym, value) in symbols.iter() {
            obj.add_symbol(text_symbol(sym, *value, id));
        }
    }
    obj.write().expect("write aarch64 object")
}

/// Same shape as [`relocatable_elf`] but for x86-64, which the auditor rejects.
pub fn x86_64_elf() -> Vec<u8> {
    let mut obj = Object::new(BinaryFormat::Elf, Architecture::X86_64, Endianness::Little);
    let id = obj.add_section(Vec::new(), b".text".to_vec(), SectionKind::Text);
    obj.section_mut(id).set_data(vec![0xC3u8], 1);
    obj.write().expect("write x86_64 object")
}

/// Minimal linked executable: an r-x `PT_LOAD` holding `code` at `text_vaddr`
/// and an rw- `PT_LOAD` holding `data` at `data_vaddr`. No section headers and
/// therefore no symbols.
pub fn executable_elf(text_vaddr: u64, code: &[u32], data_vaddr: u64, data: &[u32]) -> Vec<u8> {
    const EHDR: u64 = 64;
    const PHDR: u64 = 56;
    let code = words(code);
    let data = words(data);
    let code_offset = EHDR + 2 * PHDR;
    let data_offset = code_offset + code.len() as u64;

    let mut out = Vec::new();
    out.extend_from_slice(&[0x7f, b'E', b'L', b'F', 2, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    out.extend_from_slice(&2u16.to_le_bytes()); // ET_EXEC
    out.extend_from_slice(&183u16.to_le_bytes()); // EM_AARCH64
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&text_vaddr.to_le_bytes());
    out.extend_from_slice(&EHDR.to_le_bytes());
    out.extend_from_slice(&0u64.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(EHDR as u16).to_le_bytes());
    out.extend_from_slice(&(PHDR as u16).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&64u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    assert_eq!(out.len() as u64, EHDR);

    for (flags, offset, vaddr, len) in [
        (5u32, code_offset, text_vaddr, code.len() as u64),
        (6u32, data_offset, data_vaddr, data.len() as u64),
    ] {
        out.extend_from_slice(&1u32.to_le_bytes()); // PT_LOAD
        out.extend_from_slice(&flags.to_le_bytes());
        out.extend_from_slice(&offset.to_le_bytes());
        out.extend_from_slice(&vaddr.to_le_bytes());
        out.extend_from_slice(&vaddr.to_le_bytes());
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&4u64.to_le_bytes());
    }
    assert_eq!(out.len() as u64, code_offset);

    out.extend_from_slice(&code);
    out.extend_from_slice(&data);
    out
}

/// One entry for [`linked_elf`]'s `.symtab` or dynamic symbol table.
#[derive(Debug, Clone, Copy)]
pub struct ElfSym<'a> {
    pub name: &'a str,
    pub value: u64,
    pub st_type: u8,
    pub shndx: u16,
}

impl<'a> ElfSym<'a> {
    /// `STT_FUNC` defined in `.text`.
    pub fn func(name: &'a str, value: u64) -> Self {
        Self { name, value, st_type: 2, shndx: 1 }
    }

    /// `STT_NOTYPE` defined in `.text`, the shape of `$x`/`$d` mapping symbols.
    pub fn notype(name: &'a str, value: u64) -> Self {
        Self { name, value, st_type: 0, shndx: 1 }
    }

    /// `STT_FILE`, absolute.
    pub fn file(name: &'a str) -> Self {
        Self { name, value: 0, st_type: 4, shndx: 0xfff1 }
    }

    /// `STT_SECTION` for `.text`.
    pub fn section(value: u64) -> Self {
        Self { name: "", value, st_type: 3, shndx: 1 }
    }

    /// Undefined import.
    pub fn undefined(name: &'a str) -> Self {
        Self { name, value: 0, st_type: 2, shndx: 0 }
    }
}

/// Virtual base of [`linked_elf`]'s read-only metadata segment.
const META_BASE: u64 = 0x7000_0000;

fn align8(out: &mut Vec<u8>) {
    while out.len() % 8 != 0 {
        out.push(0);
    }
}

/// Symbol table bytes (leading null entry included) and its string table.
fn symbol_table(symbols: &[ElfSym]) -> (Vec<u8>, Vec<u8>) {
    let mut strtab = vec![0u8];
    let mut table = vec![0u8; 24];
    for sym in symbols {
        let name = if sym.name.is_empty() {
            0u32
        } else {
            let at = strtab.len() as u32;
            strtab.extend_from_slice(sym.name.as_bytes());
            strtab.push(0);
            at
        };
        table.extend_from_slice(&name.to_le_bytes());
        table.push((1 << 4) | sym.st_type); // STB_GLOBAL
        table.push(0);
        table.extend_from_slice(&sym.shndx.to_le_bytes());
        table.extend_from_slice(&sym.value.to_le_bytes());
        table.extend_from_slice(&0u64.to_le_bytes());
    }
    (table, strtab)
}

#[allow(clippy::too_many_arguments)]
fn section_header(
    out: &mut Vec<u8>,
    name: u32,
    sh_type: u32,
    flags: u64,
    addr: u64,
    offset: u64,
    size: u64,
    link: u32,
    entsize: u64,
) {
    out.extend_from_slice(&name.to_le_bytes());
    out.extend_from_slice(&sh_type.to_le_bytes());
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&addr.to_le_bytes());
    out.extend_from_slice(&offset.to_le_bytes());
    out.extend_from_slice(&size.to_le_bytes());
    out.extend_from_slice(&link.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&8u64.to_le_bytes());
    out.extend_from_slice(&entsize.to_le_bytes());
}

fn program_header(
    out: &mut Vec<u8>,
    p_type: u32,
    flags: u32,
    offset: u64,
    vaddr: u64,
    filesz: u64,
    memsz: u64,
) {
    out.extend_from_slice(&p_type.to_le_bytes());
    out.extend_from_slice(&flags.to_le_bytes());
    out.extend_from_slice(&offset.to_le_bytes());
    out.extend_from_slice(&vaddr.to_le_bytes());
    out.extend_from_slice(&vaddr.to_le_bytes());
    out.extend_from_slice(&filesz.to_le_bytes());
    out.extend_from_slice(&memsz.to_le_bytes());
    out.extend_from_slice(&8u64.to_le_bytes());
}

/// Linked `ET_DYN` image with symbols.
///
/// Layout: an r-x `PT_LOAD` with `code` at `text_vaddr` (its `p_memsz` is 16
/// bytes larger than the file-backed part), an r-- `PT_LOAD` at [`META_BASE`]
/// holding the dynamic symbol table, and a `PT_DYNAMIC` pointing at it.
/// Section headers describe `.text`, `.symtab`, `.strtab` and `.shstrtab`.
pub fn linked_elf(text_vaddr: u64, code: &[u32], symtab: &[ElfSym], dynsym: &[ElfSym]) -> Vec<u8> {
    const EHDR: usize = 64;
    const PHDR: usize = 56;
    const PHNUM: usize = 3;
    const SHNUM: u16 = 5;
    let code = words(code);

    // metadata, laid out after the code
    let code_offset = EHDR + PHNUM * PHDR;
    let mut body = code.clone();
    let at = |body: &mut Vec<u8>| {
        align8(body);
        (code_offset + body.len()) as u64
    };

    let (dyn_table, dyn_strtab) = symbol_table(dynsym);
    let meta_offset = at(&mut body);
    let dynsym_offset = meta_offset;
    body.extend_from_slice(&dyn_table);
    let dynstr_offset = at(&mut body);
    body.extend_from_slice(&dyn_strtab);
    let hash_offset = at(&mut body);
    let nchain = (dynsym.len() + 1) as u32;
    for word in [1u32, nchain, 0].into_iter().chain(std::iter::repeat(0).take(nchain as usize)) {
        body.extend_from_slice(&word.to_le_bytes());
    }
    let dynamic_offset = at(&mut body);
    let vaddr = |offset: u64| META_BASE + offset;
    for (tag, value) in [
        (4u64, vaddr(hash_offset)),    // DT_HASH
        (5, vaddr(dynstr_offset)),     // DT_STRTAB
        (6, vaddr(dynsym_offset)),     // DT_SYMTAB
        (10, dyn_strtab.len() as u64), // DT_STRSZ
        (11, 24),                      // DT_SYMENT
        (0, 0),                        // DT_NULL
    ] {
        body.extend_from_slice(&tag.to_le_bytes());
        body.extend_from_slice(&value.to_le_bytes());
    }
    let dynamic_size = 6 * 16u64;
    let meta_size = (code_offset + body.len()) as u64 - meta_offset;

    let (sym_table, strtab) = symbol_table(symtab);
    let symtab_offset = at(&mut body);
    body.extend_from_slice(&sym_table);
    let strtab_offset = at(&mut body);
    body.extend_from_slice(&strtab);
    let shstrtab = b"\0.text\0.symtab\0.strtab\0.shstrtab\0";
    let shstrtab_offset = at(&mut body);
    body.extend_from_slice(shstrtab);
    let shoff = at(&mut body);

    let mut out = Vec::new();
    out.extend_from_slice(&[0x7f, b'E', b'L', b'F', 2, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    out.extend_from_slice(&3u16.to_le_bytes()); // ET_DYN
    out.extend_from_slice(&183u16.to_le_bytes()); // EM_AARCH64
    out.extend_from_slice(&1u32.to_le_bytes());
    out.extend_from_slice(&text_vaddr.to_le_bytes());
    out.extend_from_slice(&(EHDR as u64).to_le_bytes());
    out.extend_from_slice(&shoff.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(EHDR as u16).to_le_bytes());
    out.extend_from_slice(&(PHDR as u16).to_le_bytes());
    out.extend_from_slice(&(PHNUM as u16).to_le_bytes());
    out.extend_from_slice(&64u16.to_le_bytes());
    out.extend_from_slice(&SHNUM.to_le_bytes());
    out.extend_from_slice(&4u16.to_le_bytes()); // e_shstrndx
    assert_eq!(out.len(), EHDR);

    let code_len = code.len() as u64;
    program_header(&mut out, 1, 5, code_offset as u64, text_vaddr, code_len, code_len + 16);
    program_header(&mut out, 1, 4, meta_offset, vaddr(meta_offset), meta_size, meta_size);
    program_header(&mut out, 2, 6, dynamic_offset, vaddr(dynamic_offset), dynamic_size, dynamic_size);
    assert_eq!(out.len(), code_offset);

    out.extend_from_slice(&body);
    assert_eq!(out.len() as u64, shoff);

    section_header(&mut out, 0, 0, 0, 0, 0, 0, 0, 0);
    section_header(&mut out, 1, 1, 0x6, text_vaddr, code_offset as u64, code_len, 0, 0);
    section_header(&mut out, 7, 2, 0, 0, symtab_offset, sym_table.len() as u64, 3, 24);
    section_header(&mut out, 15, 3, 0, 0, strtab_offset, strtab.len() as u64, 0, 0);
    section_header(&mut out, 23, 3, 0, 0, shstrtab_offset, shstrtab.len() as u64, 0, 0);
    out
}
