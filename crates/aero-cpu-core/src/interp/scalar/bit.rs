//! `BT`/`BTS`/`BTR`/`BTC` (spec.md §4.4 "OpBit").

use crate::mem::CpuBus;
use crate::operand;
use crate::state::{CpuState, Flags};
use crate::Exception;
use aero_x86::{DecodedInsn, Register, Width};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitOp {
    /// `BT`: read-only, CF side-effect only.
    Test,
    Set,
    Reset,
    Complement,
}

impl BitOp {
    /// ModR/M.reg for the `0x0FBA` group-8 immediate form.
    pub fn from_group8_reg(reg: u8) -> Option<Self> {
        match reg & 0b111 {
            4 => Some(BitOp::Test),
            5 => Some(BitOp::Set),
            6 => Some(BitOp::Reset),
            7 => Some(BitOp::Complement),
            _ => None,
        }
    }
}

/// Register-source form (`0x0FA3`/`AB`/`B3`/`BB`): the bit index is the
/// signed content of the ModR/M reg-field register. For the memory form the
/// index can run outside `[0, width)`, and the handler must address the
/// containing word: `disp = (index & -width) >> 3`, `bit = index &
/// (width-1)` (spec.md §4.4). `LOCK` is rejected by assertion — this
/// interpreter doesn't model the atomic RMW path (spec.md §9 open
/// question).
pub fn exec_bit_reg_form(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    op: BitOp,
) -> Result<(), Exception> {
    assert!(!insn.rde.lock(), "LOCK BT/BTS/BTR/BTC is not implemented");
    let width = insn.rde.operand_width(Width::default_long_legacy());
    let index_reg = Register::from_index(insn.rde.reg_rexr());
    let index = operand::read_register_signed(state, &insn.rde, index_reg, width);
    apply_bit(state, bus, insn, ea, op, width, index)
}

/// Immediate form (opcode `0xBA`): the bit is an 8-bit immediate modulo
/// width, and `disp` is always 0 — no addressing adjustment, even for the
/// memory form (spec.md §4.4).
pub fn exec_bit_imm_form(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    op: BitOp,
) -> Result<(), Exception> {
    assert!(!insn.rde.lock(), "LOCK BT/BTS/BTR/BTC is not implemented");
    let width = insn.rde.operand_width(Width::default_long_legacy());
    let index = (insn.uimm0 as i64) % width.bits() as i64;
    apply_bit(state, bus, insn, ea, op, width, index)
}

fn apply_bit(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    op: BitOp,
    width: Width,
    index: i64,
) -> Result<(), Exception> {
    let bits = width.bits() as i64;
    let bit = index.rem_euclid(bits) as u32;
    let operand = match operand::modrm_operand(&insn.rde, ea) {
        reg @ operand::ModrmOperand::Register(_) => reg,
        operand::ModrmOperand::Memory(_) => {
            let disp = (index & -bits) >> 3;
            operand::ModrmOperand::Memory(ea.wrapping_add(disp as u64))
        }
    };
    let value = operand.read(state, bus, &insn.rde, width)?;
    let mask = 1u64 << bit;
    state.flags.set(Flags::CF, value & mask != 0);
    let new_value = match op {
        BitOp::Test => return Ok(()),
        BitOp::Set => value | mask,
        BitOp::Reset => value & !mask,
        BitOp::Complement => value ^ mask,
    };
    operand.write(state, bus, &insn.rde, new_value, width)
}
