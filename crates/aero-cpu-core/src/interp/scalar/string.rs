//! String instructions: `MOVS`/`STOS`/`LODS`/`CMPS`/`SCAS`, with their
//! `REP`/`REPE`/`REPNE` iteration (spec.md §4.4 template 4, "memory-only
//! side-effect ... MOVS/CMPS/SCAS"). Direction is `DF`; the iteration
//! counter is address-size width, matching `LOOP`'s counter width policy
//! (spec.md §4.4 `OpLoop*`) since both are driven by `(E/R)CX` under
//! address size, not operand size.

use crate::alu::{alu_op, AluOp};
use crate::mem::CpuBus;
use crate::operand;
use crate::state::{CpuState, Flags};
use crate::Exception;
use aero_x86::{DecodedInsn, Register, Width, REP_NONE, REP_REP, REP_REPNE};

fn addr_width(state: &CpuState, insn: &DecodedInsn) -> Width {
    operand::address_width(state.mode, &insn.rde)
}

fn step(width: Width, forward: bool) -> u64 {
    let n = width.bytes() as u64;
    if forward {
        n
    } else {
        (0u64).wrapping_sub(n)
    }
}

fn advance(state: &mut CpuState, reg: Register, aw: Width, delta: u64) {
    let v = operand::read_register_width(state, reg, aw).wrapping_add(delta);
    operand::write_register_width(state, reg, v, aw);
}

/// `MOVSB`/`MOVSW`/`MOVSD`/`MOVSQ` (`0xA4`/`0xA5`): `ES:[(E)DI] <-
/// DS:[(E)SI]`, both pointers advanced by the operand width in `DF`'s
/// direction.
pub fn exec_movs(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ds_base: u64,
    es_base: u64,
    byte_form: bool,
) -> Result<(), Exception> {
    let width = if byte_form {
        Width::W8
    } else {
        insn.rde.operand_width(Width::default_long_legacy())
    };
    let aw = addr_width(state, insn);
    let forward = !state.flags.contains(Flags::DF);
    let delta = step(width, forward);
    let mut count = if insn.rep == REP_NONE {
        1
    } else {
        operand::read_register_width(state, Register::RCX, aw)
    };
    while count > 0 {
        let si = ds_base.wrapping_add(operand::read_register_width(state, Register::RSI, aw));
        let di = es_base.wrapping_add(operand::read_register_width(state, Register::RDI, aw));
        let value = operand::read_memory_width(bus, si, width)?;
        operand::write_memory_width(bus, di, value, width)?;
        advance(state, Register::RSI, aw, delta);
        advance(state, Register::RDI, aw, delta);
        count -= 1;
        if insn.rep != REP_NONE {
            operand::write_register_width(state, Register::RCX, count, aw);
        }
    }
    Ok(())
}

/// `STOSB`/`STOSW`/`STOSD`/`STOSQ` (`0xAA`/`0xAB`): `ES:[(E)DI] <- AL/AX/
/// EAX/RAX`.
pub fn exec_stos(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    es_base: u64,
    byte_form: bool,
) -> Result<(), Exception> {
    let width = if byte_form {
        Width::W8
    } else {
        insn.rde.operand_width(Width::default_long_legacy())
    };
    let aw = addr_width(state, insn);
    let forward = !state.flags.contains(Flags::DF);
    let delta = step(width, forward);
    let value = operand::read_register_width(state, Register::RAX, width);
    let mut count = if insn.rep == REP_NONE {
        1
    } else {
        operand::read_register_width(state, Register::RCX, aw)
    };
    while count > 0 {
        let di = es_base.wrapping_add(operand::read_register_width(state, Register::RDI, aw));
        operand::write_memory_width(bus, di, value, width)?;
        advance(state, Register::RDI, aw, delta);
        count -= 1;
        if insn.rep != REP_NONE {
            operand::write_register_width(state, Register::RCX, count, aw);
        }
    }
    Ok(())
}

/// `LODSB`/`LODSW`/`LODSD`/`LODSQ` (`0xAC`/`0xAD`): `AL/AX/EAX/RAX <-
/// DS:[(E)SI]`. A bare `REP LODS` is architecturally pointless (no flag or
/// loop-exit condition depends on the loaded value) but is still executed
/// count-many times for fidelity with real hardware's documented — if
/// wasteful — behavior.
pub fn exec_lods(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ds_base: u64,
    byte_form: bool,
) -> Result<(), Exception> {
    let width = if byte_form {
        Width::W8
    } else {
        insn.rde.operand_width(Width::default_long_legacy())
    };
    let aw = addr_width(state, insn);
    let forward = !state.flags.contains(Flags::DF);
    let delta = step(width, forward);
    let mut count = if insn.rep == REP_NONE {
        1
    } else {
        operand::read_register_width(state, Register::RCX, aw)
    };
    while count > 0 {
        let si = ds_base.wrapping_add(operand::read_register_width(state, Register::RSI, aw));
        let value = operand::read_memory_width(bus, si, width)?;
        operand::write_register_width(state, Register::RAX, value, width);
        advance(state, Register::RSI, aw, delta);
        count -= 1;
        if insn.rep != REP_NONE {
            operand::write_register_width(state, Register::RCX, count, aw);
        }
    }
    Ok(())
}

/// `CMPSB`/`CMPSW`/`CMPSD`/`CMPSQ` (`0xA6`/`0xA7`): compares `DS:[(E)SI]`
/// to `ES:[(E)DI]`; `REPE`/`REPNE` additionally exit early on a ZF
/// mismatch.
pub fn exec_cmps(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ds_base: u64,
    es_base: u64,
    byte_form: bool,
) -> Result<(), Exception> {
    let width = if byte_form {
        Width::W8
    } else {
        insn.rde.operand_width(Width::default_long_legacy())
    };
    let aw = addr_width(state, insn);
    let forward = !state.flags.contains(Flags::DF);
    let delta = step(width, forward);
    let mut count = if insn.rep == REP_NONE {
        1
    } else {
        operand::read_register_width(state, Register::RCX, aw)
    };
    while count > 0 {
        let si = ds_base.wrapping_add(operand::read_register_width(state, Register::RSI, aw));
        let di = es_base.wrapping_add(operand::read_register_width(state, Register::RDI, aw));
        let lhs = operand::read_memory_width(bus, si, width)?;
        let rhs = operand::read_memory_width(bus, di, width)?;
        alu_op(AluOp::Cmp, lhs, rhs, width, &mut state.flags);
        advance(state, Register::RSI, aw, delta);
        advance(state, Register::RDI, aw, delta);
        count -= 1;
        if insn.rep != REP_NONE {
            operand::write_register_width(state, Register::RCX, count, aw);
        }
        if should_stop_rep(insn.rep, state.flags) {
            break;
        }
    }
    Ok(())
}

/// `SCASB`/`SCASW`/`SCASD`/`SCASQ` (`0xAE`/`0xAF`): compares
/// `AL/AX/EAX/RAX` to `ES:[(E)DI]`.
pub fn exec_scas(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    es_base: u64,
    byte_form: bool,
) -> Result<(), Exception> {
    let width = if byte_form {
        Width::W8
    } else {
        insn.rde.operand_width(Width::default_long_legacy())
    };
    let aw = addr_width(state, insn);
    let forward = !state.flags.contains(Flags::DF);
    let delta = step(width, forward);
    let lhs = operand::read_register_width(state, Register::RAX, width);
    let mut count = if insn.rep == REP_NONE {
        1
    } else {
        operand::read_register_width(state, Register::RCX, aw)
    };
    while count > 0 {
        let di = es_base.wrapping_add(operand::read_register_width(state, Register::RDI, aw));
        let rhs = operand::read_memory_width(bus, di, width)?;
        alu_op(AluOp::Cmp, lhs, rhs, width, &mut state.flags);
        advance(state, Register::RDI, aw, delta);
        count -= 1;
        if insn.rep != REP_NONE {
            operand::write_register_width(state, Register::RCX, count, aw);
        }
        if should_stop_rep(insn.rep, state.flags) {
            break;
        }
    }
    Ok(())
}

/// `REPE`/`REPZ` (`rep == REP_REP`) stops once `ZF` clears; `REPNE`/`REPNZ`
/// (`rep == REP_REPNE`) stops once `ZF` sets. Plain `REP` (only valid on
/// `MOVS`/`STOS`/`LODS`, never reaches here) has no such exit.
fn should_stop_rep(rep: u8, flags: Flags) -> bool {
    match rep {
        REP_REP => !flags.contains(Flags::ZF),
        REP_REPNE => flags.contains(Flags::ZF),
        _ => false,
    }
}
