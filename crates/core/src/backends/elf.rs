//! ELF adapter: builds a [`BinaryImage`] from AArch64 ELF64 little-endian bytes.
//!
//! Linked images (`ET_EXEC`/`ET_DYN`) expose their executable `PT_LOAD`
//! segments. Relocatable objects have no program headers, so their executable
//! sections are laid out one after another at synthetic addresses and treated
//! as segments; symbols are rebased to match.

use std::collections::HashMap;

use goblin::elf::{header, program_header, section_header, sym, Elf};
use thiserror::Error;
use tracing::debug;

use crate::model::{BinaryImage, Section, Segment, SegmentFlags, Symbol};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("not a valid ELF object: {0}")]
    Malformed(String),
    #[error("expected a 64-bit ELF object")]
    UnsupportedClass,
    #[error("expected a little-endian ELF object")]
    UnsupportedEndianness,
    #[error("expected an AArch64 object, found e_machine {machine:#x}")]
    UnsupportedMachine { machine: u16 },
    #[error("{what} data [{offset:#x}, +{size:#x}) lies outside the {file_len}-byte file")]
    OutOfBounds { what: String, offset: u64, size: u64, file_len: usize },
    #[error("{what} at {address:#x} (+{size:#x}) runs past the end of the address space")]
    AddressOverflow { what: String, address: u64, size: u64 },
}

/// Parse `bytes` into a [`BinaryImage`].
pub fn parse(bytes: &[u8]) -> Result<BinaryImage, ParseError> {
    let elf = Elf::parse(bytes).map_err(|e| ParseError::Malformed(e.to_string()))?;

    if !elf.is_64 {
        return Err(ParseError::UnsupportedClass);
    }
    if !elf.little_endian {
        return Err(ParseError::UnsupportedEndianness);
    }
    if elf.header.e_machine != header::EM_AARCH64 {
        return Err(ParseError::UnsupportedMachine { machine: elf.header.e_machine });
    }

    let image = if elf.header.e_type == header::ET_REL && elf.program_headers.is_empty() {
        relocatable_image(&elf, bytes)?
    } else {
        linked_image(&elf, bytes)?
    };

    debug!(
        segments = image.segments().len(),
        sections = image.sections().len(),
        symbols = image.symbols().len(),
        "parsed ELF image"
    );
    Ok(image)
}

fn file_slice<'a>(bytes: &'a [u8], what: &str, offset: u64, size: u64) -> Result<&'a [u8], ParseError> {
    let out_of_bounds =
        || ParseError::OutOfBounds { what: what.to_string(), offset, size, file_len: bytes.len() };
    let start = usize::try_from(offset).map_err(|_| out_of_bounds())?;
    let len = usize::try_from(size).map_err(|_| out_of_bounds())?;
    let end = start.checked_add(len).ok_or_else(out_of_bounds)?;
    bytes.get(start..end).ok_or_else(out_of_bounds)
}

fn segment_flags(p_flags: u32) -> SegmentFlags {
    SegmentFlags {
        read: p_flags & program_header::PF_R != 0,
        write: p_flags & program_header::PF_W != 0,
        execute: p_flags & program_header::PF_X != 0,
    }
}

fn section_name<'a>(elf: &'a Elf, sh_name: usize) -> &'a str {
    elf.shdr_strtab.get_at(sh_name).unwrap_or("")
}

fn linked_image(elf: &Elf, bytes: &[u8]) -> Result<BinaryImage, ParseError> {
    let mut segments = Vec::new();
    for (index, ph) in elf.program_headers.iter().enumerate() {
        if ph.p_type != program_header::PT_LOAD {
            continue;
        }
        let what = format!("segment {index}");
        let size = ph.p_memsz.max(ph.p_filesz);
        if ph.p_vaddr.checked_add(size).is_none() {
            return Err(ParseError::AddressOverflow { what, address: ph.p_vaddr, size });
        }
        let flags = segment_flags(ph.p_flags);
        // only executable segments are ever scanned; skip copying the rest
        let data = if flags.execute {
            file_slice(bytes, &what, ph.p_offset, ph.p_filesz)?.to_vec()
        } else {
            Vec::new()
        };
        segments.push(Segment::new(ph.p_vaddr, data, flags).with_memory_size(size));
    }

    let sections = elf
        .section_headers
        .iter()
        .filter(|sh| sh.sh_addr != 0 && sh.sh_flags & u64::from(section_header::SHF_ALLOC) != 0)
        .map(|sh| Section::new(section_name(elf, sh.sh_name), sh.sh_addr, sh.sh_size))
        .filter(|s| !s.name.is_empty())
        .collect();

    let symbols = collect_symbols(elf, |_shndx, value| Some(value));
    Ok(BinaryImage::new(segments, sections, symbols))
}

fn align_up(value: u64, align: u64) -> u64 {
    let align = align.max(1);
    value.div_ceil(align).saturating_mul(align)
}

fn relocatable_image(elf: &Elf, bytes: &[u8]) -> Result<BinaryImage, ParseError> {
    let mut segments = Vec::new();
    let mut sections = Vec::new();
    let mut bases: HashMap<usize, u64> = HashMap::new();
    let mut cursor = 0u64;

    let exec_alloc = u64::from(section_header::SHF_ALLOC | section_header::SHF_EXECINSTR);
    for (index, sh) in elf.section_headers.iter().enumerate() {
        if sh.sh_flags & exec_alloc != exec_alloc || sh.sh_type == section_header::SHT_NOBITS {
            continue;
        }
        let name = section_name(elf, sh.sh_name);
        let data = file_slice(bytes, &format!("section {name}"), sh.sh_offset, sh.sh_size)?;
        let base = align_up(cursor, sh.sh_addralign.max(4));
        cursor = base.saturating_add(sh.sh_size);

        bases.insert(index, base);
        segments.push(Segment::executable(base, data));
        sections.push(Section::new(name, base, sh.sh_size));
    }

    let symbols = collect_symbols(elf, |shndx, value| {
        bases.get(&shndx).and_then(|base| base.checked_add(value))
    });
    Ok(BinaryImage::new(segments, sections, symbols))
}

/// AArch64 mapping symbols (`$x`, `$d`, `$x.42`, ...) mark code/data runs,
/// not functions.
fn is_mapping_symbol(name: &str) -> bool {
    let Some(rest) = name.strip_prefix('$') else { return false };
    let kind = rest.split('.').next().unwrap_or("");
    matches!(kind, "x" | "d" | "a" | "t")
}

/// Named, defined symbols from `.symtab` then `.dynsym`, in table order.
///
/// `place` maps `(st_shndx, st_value)` to a virtual address, or `None` to drop
/// the symbol.
fn collect_symbols(elf: &Elf, place: impl Fn(usize, u64) -> Option<u64>) -> Vec<Symbol> {
    let tables = [(&elf.syms, &elf.strtab), (&elf.dynsyms, &elf.dynstrtab)];
    let mut symbols = Vec::new();
    for (table, strtab) in tables {
        for s in table.iter() {
            if s.st_shndx == section_header::SHN_UNDEF as usize {
                continue;
            }
            if matches!(s.st_type(), sym::STT_FILE | sym::STT_SECTION) {
                continue;
            }
            let name = strtab.get_at(s.st_name).unwrap_or("");
            if name.is_empty() || is_mapping_symbol(name) {
                continue;
            }
            if let Some(address) = place(s.st_shndx, s.st_value) {
                symbols.push(Symbol::new(name, address));
            }
        }
    }
    symbols
}
