//! Conditional family (spec.md §4.4 template 3): Jcc, CMOVcc, SETcc, and the
//! LOOP/LOOPE/LOOPNE branch predicate they share with `crate::flags`.

use crate::flags;
use crate::mem::CpuBus;
use crate::operand;
use crate::state::{CpuState, Flags};
use crate::Exception;
use aero_x86::{DecodedInsn, Register, Width};

/// The 16 architectural condition codes, keyed by the low nibble of the
/// `Jcc`/`CMOVcc`/`SETcc` opcode (spec.md §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Overflow,
    NotOverflow,
    Below,
    AboveOrEqual,
    Equal,
    NotEqual,
    BelowOrEqual,
    Above,
    Sign,
    NotSign,
    Parity,
    NotParity,
    Less,
    GreaterOrEqual,
    LessOrEqual,
    Greater,
}

impl Condition {
    pub fn from_cc(cc: u8) -> Self {
        match cc & 0xF {
            0x0 => Condition::Overflow,
            0x1 => Condition::NotOverflow,
            0x2 => Condition::Below,
            0x3 => Condition::AboveOrEqual,
            0x4 => Condition::Equal,
            0x5 => Condition::NotEqual,
            0x6 => Condition::BelowOrEqual,
            0x7 => Condition::Above,
            0x8 => Condition::Sign,
            0x9 => Condition::NotSign,
            0xA => Condition::Parity,
            0xB => Condition::NotParity,
            0xC => Condition::Less,
            0xD => Condition::GreaterOrEqual,
            0xE => Condition::LessOrEqual,
            _ => Condition::Greater,
        }
    }

    pub fn holds(self, f: Flags) -> bool {
        match self {
            Condition::Overflow => f.contains(Flags::OF),
            Condition::NotOverflow => !f.contains(Flags::OF),
            Condition::Below => f.contains(Flags::CF),
            Condition::AboveOrEqual => !f.contains(Flags::CF),
            Condition::Equal => f.contains(Flags::ZF),
            Condition::NotEqual => !f.contains(Flags::ZF),
            Condition::BelowOrEqual => flags::is_below_or_equal(f),
            Condition::Above => flags::is_above(f),
            Condition::Sign => f.contains(Flags::SF),
            Condition::NotSign => !f.contains(Flags::SF),
            Condition::Parity => flags::is_parity(f),
            Condition::NotParity => !flags::is_parity(f),
            Condition::Less => flags::is_less(f),
            Condition::GreaterOrEqual => flags::is_greater_or_equal(f),
            Condition::LessOrEqual => flags::is_less_or_equal(f),
            Condition::Greater => flags::is_greater(f),
        }
    }
}

/// `Jcc` (short form `0x70`-`0x7F`, near form `0x0F80`-`0x0F8F`): branch by
/// adding `disp` to IP iff the condition holds. Both forms reach here with
/// `disp` already sign-extended by the decoder to the target offset.
pub fn exec_jcc(state: &mut CpuState, insn: &DecodedInsn, cc: u8) {
    if Condition::from_cc(cc).holds(state.flags) {
        let ip = state.rip().wrapping_add(insn.disp as u64);
        state.set_rip(ip);
    }
}

/// `SETcc` (`0x0F90`-`0x0F9F`): write 1 or 0 to the r/m8 destination.
pub fn exec_setcc(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    cc: u8,
) -> Result<(), Exception> {
    let value = Condition::from_cc(cc).holds(state.flags) as u8;
    operand::modrm_byte_operand(&insn.rde, ea).write(state, bus, value)
}

/// `CMOVcc` (`0x0F40`-`0x0F4F`): width-correct MOV iff the condition holds.
pub fn exec_cmovcc(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    cc: u8,
) -> Result<(), Exception> {
    if !Condition::from_cc(cc).holds(state.flags) {
        return Ok(());
    }
    let width = insn.rde.operand_width(Width::default_long_legacy());
    let dst_reg = Register::from_index(insn.rde.reg_rexr());
    let value = operand::modrm_operand(&insn.rde, ea).read(state, bus, &insn.rde, width)?;
    operand::write_register(state, &insn.rde, dst_reg, value, width);
    Ok(())
}

/// LOOP/LOOPE/LOOPNE (`0xE0`-`0xE2`): decrement CX/ECX/RCX by
/// **address-size**, not operand-size, and branch iff the post-decrement
/// counter is nonzero and `extra` (the E/NE predicate, `None` for plain
/// LOOP) holds.
pub fn exec_loop(state: &mut CpuState, insn: &DecodedInsn, extra: Option<bool>) {
    let addr_width = operand::address_width(state.mode, &insn.rde);
    let counter = operand::read_register_width(state, Register::RCX, addr_width).wrapping_sub(1);
    operand::write_register_width(state, Register::RCX, counter, addr_width);
    let nonzero = counter != 0;
    let predicate_ok = match extra {
        Some(want_zf) => state.flags.contains(Flags::ZF) == want_zf,
        None => true,
    };
    if nonzero && predicate_ok {
        let ip = state.rip().wrapping_add(insn.disp as u64);
        state.set_rip(ip);
    }
}

/// `JCXZ`/`JECXZ`/`JRCXZ` (`0xE3`): branch iff the address-size counter is
/// zero, without decrementing it.
pub fn exec_jcxz(state: &mut CpuState, insn: &DecodedInsn) {
    let addr_width = operand::address_width(state.mode, &insn.rde);
    let counter = operand::read_register_width(state, Register::RCX, addr_width);
    if counter == 0 {
        let ip = state.rip().wrapping_add(insn.disp as u64);
        state.set_rip(ip);
    }
}
