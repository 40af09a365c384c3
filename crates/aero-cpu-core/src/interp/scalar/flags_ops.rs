//! Flags-register instructions: `PUSHF`/`POPF`, `LAHF`/`SAHF`, and the
//! single-bit flag-setters (spec.md §4.4, §6 "PUSHF image").

use crate::mem::CpuBus;
use crate::operand;
use crate::state::{CpuState, Flags};
use crate::Exception;
use aero_x86::{DecodedInsn, Register, Width};

/// The mask PUSHF applies before publishing: drops VM (bit 17) and RF
/// (bit 16), per spec.md §6 "PUSHF image: `flags & 0xFCFFFF`".
const PUSHF_MASK: u64 = 0xFCFFFF;

/// `PUSHFQ`/`PUSHFD`/`PUSHFW`: push `ExportFlags(flags) & 0xFCFFFF`.
pub fn exec_pushf(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
) -> Result<(), Exception> {
    let width = insn.rde.operand_width(Width::W64);
    let image = (state.flags.export() as u64) & PUSHF_MASK;
    let sp = operand::read_register_width(state, Register::RSP, width).wrapping_sub(width.bytes() as u64);
    operand::write_register_width(state, Register::RSP, sp, width);
    operand::write_memory(bus, &insn.rde, sp, image, width)
}

/// `POPFQ`/`POPFD`/`POPFW`: without OSZ, a fresh 32-bit flags import;
/// with OSZ, only the low 16 bits are replaced and the upper bits of the
/// in-memory flags word are preserved (spec.md §4.4 "OpPopf").
pub fn exec_popf(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
) -> Result<(), Exception> {
    let width = insn.rde.operand_width(Width::W64);
    let sp = operand::read_register_width(state, Register::RSP, width);
    let popped = operand::read_memory(bus, &insn.rde, sp, width)?;
    operand::write_register_width(state, Register::RSP, sp.wrapping_add(width.bytes() as u64), width);
    if insn.rde.osz() {
        let preserved_high = state.flags.export() as u64 & !0xFFFF;
        state.flags = Flags::import(((preserved_high) | (popped & 0xFFFF)) as u32);
    } else {
        state.flags = Flags::import(popped as u32);
    }
    Ok(())
}

/// `LAHF`: AH ← low byte of the flags word.
pub fn exec_lahf(state: &mut CpuState) {
    let value = (state.flags.export() & 0xFF) as u8;
    operand::write_register_byte(state, value, Register::RAX, true);
}

/// `SAHF`: flags' low byte ← AH (SF/ZF/AF/PF/CF only; reserved bits are
/// dropped by `Flags::import`'s truncation).
pub fn exec_sahf(state: &mut CpuState) {
    let ah = operand::read_register_byte(state, Register::RAX, true);
    let rest = state.flags.export() & !0xFF;
    state.flags = Flags::import(rest | ah as u32);
}

pub fn exec_cmc(state: &mut CpuState) {
    state.flags.toggle(Flags::CF);
}

pub fn exec_clc(state: &mut CpuState) {
    state.flags.remove(Flags::CF);
}

pub fn exec_stc(state: &mut CpuState) {
    state.flags.insert(Flags::CF);
}

pub fn exec_cli(state: &mut CpuState) {
    state.flags.remove(Flags::IF);
}

pub fn exec_sti(state: &mut CpuState) {
    state.flags.insert(Flags::IF);
}

pub fn exec_cld(state: &mut CpuState) {
    state.flags.remove(Flags::DF);
}

pub fn exec_std(state: &mut CpuState) {
    state.flags.insert(Flags::DF);
}
