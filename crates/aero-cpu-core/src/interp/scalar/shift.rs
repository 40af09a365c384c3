//! Bit-shift/rotate family (spec.md §4.4 template 2: `Bsubi`/`Bsuwi`) and
//! the SHLD/SHRD double-shift kernel.

use crate::alu::{bsu_op, double_shift, BsuOp};
use crate::mem::CpuBus;
use crate::operand;
use crate::state::CpuState;
use crate::Exception;
use aero_x86::{DecodedInsn, Register, Width};

/// `Bsubi`: 8-bit shift/rotate group (opcodes `0xC0`, `0xD0`-`0xD2`), count
/// already resolved by the caller to either 1, CL, or an imm8 (spec.md
/// §4.4: "count source is either literal 1, the CL byte, or an immediate").
pub fn exec_bsub(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    count: u8,
) -> Result<(), Exception> {
    let op = BsuOp::from_modrm_reg(insn.rde.modrm_reg());
    let dst = operand::modrm_byte_operand(&insn.rde, ea);
    let d = dst.read(state, bus)? as u64;
    let result = bsu_op(op, d, count, Width::W8, &mut state.flags) as u8;
    dst.write(state, bus, result)
}

/// `Bsuwi`: 16/32/64-bit shift/rotate group (opcodes `0xC1`, `0xD1`-`0xD3`).
pub fn exec_bsuw(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    count: u8,
) -> Result<(), Exception> {
    let op = BsuOp::from_modrm_reg(insn.rde.modrm_reg());
    let width = insn.rde.operand_width(Width::default_long_legacy());
    let dst = operand::modrm_operand(&insn.rde, ea);
    let d = dst.read(state, bus, &insn.rde, width)?;
    let result = bsu_op(op, d, count, width, &mut state.flags);
    dst.write(state, bus, &insn.rde, result, width)
}

/// SHLD/SHRD (opcodes `0x0FA4`/`0x0FA5`/`0x0FAC`/`0x0FAD`): `opcode & 8`
/// selects SHLD vs SHRD (spec.md §6 `BsuDoubleShift`).
pub fn exec_double_shift(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    count: u8,
) -> Result<(), Exception> {
    let left = insn.opcode & 0x8 == 0;
    let width = insn.rde.operand_width(Width::default_long_legacy());
    let dst = operand::modrm_operand(&insn.rde, ea);
    let src_reg = Register::from_index(insn.rde.reg_rexr());
    let src = operand::read_register(state, &insn.rde, src_reg, width);
    let d = dst.read(state, bus, &insn.rde, width)?;
    let result = double_shift(d, src, count, width, left, &mut state.flags);
    dst.write(state, bus, &insn.rde, result, width)
}
