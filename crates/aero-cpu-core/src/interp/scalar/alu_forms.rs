//! ALU byte/word regular forms (spec.md §4.4 template 1: `Alub*`/`Aluw*`).
//!
//! The one-byte map's eight ALU groups (ADD/OR/ADC/SBB/AND/SUB/XOR/CMP) share
//! one encoding pattern: `op.opcode & 0o70` (octal) selects the operation,
//! `op.opcode & 0o07` selects the form (Eb,Gb / Ev,Gv / Gb,Eb / Gv,Ev /
//! AL,Ib / eAX,Iz). Grounded on blink's `OpAluwFlip`/`OpAluRaxIvds`, which
//! derive the same two fields from the same bit split rather than listing
//! each of the 48 opcodes by hand.

use crate::alu::{alu_op, AluOp};
use crate::mem::CpuBus;
use crate::operand;
use crate::state::CpuState;
use crate::Exception;
use aero_x86::{DecodedInsn, Register, Width};

fn op_for(opcode: u16) -> AluOp {
    match (opcode >> 3) & 0b111 {
        0 => AluOp::Add,
        1 => AluOp::Or,
        2 => AluOp::Adc,
        3 => AluOp::Sbb,
        4 => AluOp::And,
        5 => AluOp::Sub,
        6 => AluOp::Xor,
        _ => AluOp::Cmp,
    }
}

/// Form 0: `Eb, Gb` — r/m8 is the destination, reg8 is the source.
pub fn exec_eb_gb(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
) -> Result<(), Exception> {
    let op = op_for(insn.opcode);
    let dst = operand::modrm_byte_operand(&insn.rde, ea);
    let (src_reg, src_high) = operand::modrm_byte_reg(&insn.rde);
    let src = operand::read_register_byte(state, src_reg, src_high) as u64;
    let d = dst.read(state, bus)? as u64;
    let result = alu_op(op, d, src, Width::W8, &mut state.flags) as u8;
    if op != AluOp::Cmp {
        dst.write(state, bus, result)?;
    }
    Ok(())
}

/// Form 1: `Ev, Gv` — r/m(16/32/64) is the destination, the ModR/M reg is
/// the source.
pub fn exec_ev_gv(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
) -> Result<(), Exception> {
    let op = op_for(insn.opcode);
    let width = insn.rde.operand_width(Width::default_long_legacy());
    let dst = operand::modrm_operand(&insn.rde, ea);
    let src_reg = Register::from_index(insn.rde.reg_rexr());
    let src = operand::read_register(state, &insn.rde, src_reg, width);
    let d = dst.read(state, bus, &insn.rde, width)?;
    let result = alu_op(op, d, src, width, &mut state.flags);
    if op != AluOp::Cmp {
        dst.write(state, bus, &insn.rde, result, width)?;
    }
    Ok(())
}

/// Form 2: `Gb, Eb` — the "flip" byte form, ModR/M reg is the destination.
pub fn exec_gb_eb(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
) -> Result<(), Exception> {
    let op = op_for(insn.opcode);
    let (dst_reg, dst_high) = operand::modrm_byte_reg(&insn.rde);
    let src = operand::modrm_byte_operand(&insn.rde, ea).read(state, bus)? as u64;
    let d = operand::read_register_byte(state, dst_reg, dst_high) as u64;
    let result = alu_op(op, d, src, Width::W8, &mut state.flags) as u8;
    if op != AluOp::Cmp {
        operand::write_register_byte(state, result, dst_reg, dst_high);
    }
    Ok(())
}

/// Form 3: `Gv, Ev` — the "flip" word form.
pub fn exec_gv_ev(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
) -> Result<(), Exception> {
    let op = op_for(insn.opcode);
    let width = insn.rde.operand_width(Width::default_long_legacy());
    let dst_reg = Register::from_index(insn.rde.reg_rexr());
    let src_operand = operand::modrm_operand(&insn.rde, ea);
    let src = src_operand.read(state, bus, &insn.rde, width)?;
    let d = operand::read_register(state, &insn.rde, dst_reg, width);
    let result = alu_op(op, d, src, width, &mut state.flags);
    if op != AluOp::Cmp {
        operand::write_register(state, &insn.rde, dst_reg, result, width);
    }
    Ok(())
}

/// Form 4: `AL, Ib`.
pub fn exec_al_ib(state: &mut CpuState, insn: &DecodedInsn) -> Result<(), Exception> {
    let op = op_for(insn.opcode);
    let d = operand::read_register_byte(state, Register::RAX, false) as u64;
    let result = alu_op(op, d, insn.uimm0, Width::W8, &mut state.flags) as u8;
    if op != AluOp::Cmp {
        operand::write_register_byte(state, result, Register::RAX, false);
    }
    Ok(())
}

/// Form 5: `eAX, Iz`.
pub fn exec_rax_iz(state: &mut CpuState, insn: &DecodedInsn) -> Result<(), Exception> {
    let op = op_for(insn.opcode);
    let width = insn.rde.operand_width(Width::default_long_legacy());
    let d = operand::read_register(state, &insn.rde, Register::RAX, width);
    let result = alu_op(op, d, insn.uimm0, width, &mut state.flags);
    if op != AluOp::Cmp {
        operand::write_register(state, &insn.rde, Register::RAX, result, width);
    }
    Ok(())
}

/// Group 1 (opcodes `0x80`-`0x83`): ALU op selected by ModR/M.reg, immediate
/// source, Eb/Ev destination.
pub fn exec_group1_imm(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    byte_form: bool,
) -> Result<(), Exception> {
    let op = match insn.rde.modrm_reg() & 0b111 {
        0 => AluOp::Add,
        1 => AluOp::Or,
        2 => AluOp::Adc,
        3 => AluOp::Sbb,
        4 => AluOp::And,
        5 => AluOp::Sub,
        6 => AluOp::Xor,
        _ => AluOp::Cmp,
    };
    if byte_form {
        let dst = operand::modrm_byte_operand(&insn.rde, ea);
        let d = dst.read(state, bus)? as u64;
        let result = alu_op(op, d, insn.uimm0, Width::W8, &mut state.flags) as u8;
        if op != AluOp::Cmp {
            dst.write(state, bus, result)?;
        }
    } else {
        let width = insn.rde.operand_width(Width::default_long_legacy());
        let dst = operand::modrm_operand(&insn.rde, ea);
        let d = dst.read(state, bus, &insn.rde, width)?;
        let result = alu_op(op, d, insn.uimm0, width, &mut state.flags);
        if op != AluOp::Cmp {
            dst.write(state, bus, &insn.rde, result, width)?;
        }
    }
    Ok(())
}

/// `TEST Eb, Gb` / `TEST Ev, Gv` (opcodes `0x84`/`0x85`): same read-only
/// shape as the `Ro` ALU forms, always `And`.
pub fn exec_test_rm_reg(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    byte_form: bool,
) -> Result<(), Exception> {
    if byte_form {
        let lhs = operand::modrm_byte_operand(&insn.rde, ea).read(state, bus)? as u64;
        let (reg, high) = operand::modrm_byte_reg(&insn.rde);
        let rhs = operand::read_register_byte(state, reg, high) as u64;
        alu_op(AluOp::And, lhs, rhs, Width::W8, &mut state.flags);
    } else {
        let width = insn.rde.operand_width(Width::default_long_legacy());
        let lhs = operand::modrm_operand(&insn.rde, ea).read(state, bus, &insn.rde, width)?;
        let reg = Register::from_index(insn.rde.reg_rexr());
        let rhs = operand::read_register(state, &insn.rde, reg, width);
        alu_op(AluOp::And, lhs, rhs, width, &mut state.flags);
    }
    Ok(())
}

/// `TEST AL, Ib` / `TEST eAX, Iz` (opcodes `0xA8`/`0xA9`).
pub fn exec_test_acc_imm(state: &mut CpuState, insn: &DecodedInsn, byte_form: bool) {
    if byte_form {
        let d = operand::read_register_byte(state, Register::RAX, false) as u64;
        alu_op(AluOp::And, d, insn.uimm0, Width::W8, &mut state.flags);
    } else {
        let width = insn.rde.operand_width(Width::default_long_legacy());
        let d = operand::read_register(state, &insn.rde, Register::RAX, width);
        alu_op(AluOp::And, d, insn.uimm0, width, &mut state.flags);
    }
}

