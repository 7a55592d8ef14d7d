use capstone::{arch, prelude::*, Capstone};

use crate::backends::{Disassembler, DisassemblyError};

/// Capstone-backed AArch64 disassembler.
pub struct CapstoneDisassembler {
    cs: Capstone,
}

impl CapstoneDisassembler {
    pub fn arm64() -> Result<Self, DisassemblyError> {
        let cs = Capstone::new()
            .arm64()
            .mode(arch::arm64::ArchMode::Arm)
            .detail(false)
            .build()
            .map_err(|e| DisassemblyError::Init(format!("capstone init failed: {e}")))?;
        tracing::trace!(version = %capstone_version(), "capstone arm64 handle ready");
        Ok(Self { cs })
    }
}

fn capstone_version() -> String {
    let (major, minor) = Capstone::lib_version();
    format!("{major}.{minor}")
}

impl Disassembler for CapstoneDisassembler {
    fn disassemble(&self, bytes: &[u8], address: u64) -> Result<String, DisassemblyError> {
        let decode_error = |message: String| DisassemblyError::Decode {
            address,
            bytes: bytes.to_vec(),
            message,
        };
        let insns = self.cs.disasm_count(bytes, address, 1).map_err(|e| decode_error(e.to_string()))?;
        let insn = insns.iter().next().ok_or_else(|| decode_error("no instruction decoded".into()))?;
        let mnemonic = insn.mnemonic().unwrap_or("");
        if mnemonic.is_empty() {
            return Err(decode_error("empty mnemonic".into()));
        }
        Ok(match insn.op_str() {
            Some(ops) if !ops.is_empty() => format!("{mnemonic} {ops}"),
            _ => mnemonic.to_string(),
        })
    }

    fn name(&self) -> &'static str {
        "capstone"
    }
}
