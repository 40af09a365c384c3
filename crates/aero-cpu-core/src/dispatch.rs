//! C6: the dispatch table (spec.md §4.6, §9 REDESIGN FLAGS — the literal
//! dense function-pointer array is replaced here with a `match` over
//! [`DecodedInsn::dispatch_key`]'s two halves, the sanctioned "pattern
//! matched dispatch" redesign). [`execute_instruction`] is the crate's
//! public entry point (SPEC_FULL.md §3).

use crate::alu::{alu_op, AluOp};
use crate::interp::control;
use crate::interp::scalar::{alu_forms, bit, cond, flags_ops, misc, mov, shift, string};
use crate::interp::scalar::bit::BitOp;
use crate::interp::scalar::cond::Condition;
use crate::interp::vector;
use crate::mem::CpuBus;
use crate::operand;
use crate::segment;
use crate::state::CpuState;
use crate::system::System;
use crate::Exception;
use aero_x86::{DecodedInsn, OpcodeMap, Register, Segment, Width};

/// Resolve the ModR/M memory operand's address. Per spec.md §1/SPEC_FULL.md
/// §3, effective-address computation (base + index*scale + displacement) is
/// the out-of-scope decoder's job: `insn.disp` already carries the final
/// resolved address for any ModR/M-memory form, so this is just a named
/// accessor for that field rather than a computation.
fn ea(insn: &DecodedInsn) -> u64 {
    insn.disp as u64
}

/// Runs one already-decoded instruction against `state`/`system`/`bus`.
///
/// Advances `state`'s instruction pointer past the instruction *before*
/// dispatching (branch handlers then overwrite it), dispatches by
/// `(insn.map, insn.opcode)`, and — regardless of outcome — flushes any
/// pending [`crate::state::OpCache`] stash a handler left behind
/// (spec.md §8 invariant 8; only `MASKMOVDQU`/`MASKMOVQ` ever populate it).
/// An error short-circuits before the stash flush runs, matching
/// spec.md §7's "no partial writeback beyond whatever already landed"
/// rule — a faulting masked store simply leaves its stash for the *next*
/// successful `MASKMOVDQU`/`MASKMOVQ` to overwrite.
pub fn execute_instruction(
    state: &mut CpuState,
    system: &mut System,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
) -> Result<(), Exception> {
    state.set_rip(state.rip().wrapping_add(insn.length as u64));
    let result = dispatch(state, system, bus, insn);
    if let Some((addr, buf, len)) = state.op_cache.take() {
        if result.is_ok() {
            bus.write_bytes(addr, &buf[..len])?;
        }
    }
    result
}

fn dispatch(
    state: &mut CpuState,
    system: &mut System,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
) -> Result<(), Exception> {
    match insn.map {
        OpcodeMap::Legacy => dispatch_legacy(state, system, bus, insn),
        OpcodeMap::Ext0f => dispatch_0f(state, system, bus, insn),
        OpcodeMap::Ext0f38 => dispatch_0f38(state, bus, insn),
    }
}

/// The sparse three-byte-map overflow table (spec.md §4.6
/// `ExecuteSparseInstruction`), grounded on blink's own sparse switch: the
/// same handful of `PABS*`/`MOVNTDQA`/`PMULLD`/`PALIGNR`/`PCLMULQDQ` entries,
/// keyed by the same dispatch offsets blink uses (`0x21c`..`0x344`) minus the
/// `0x200` this crate's `Ext0f38` map value already contributes. `66`
/// (`insn.rde.osz()`) selects the XMM form over the MMX one for the two
/// opcodes that have both.
fn dispatch_0f38(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
) -> Result<(), Exception> {
    let use_mmx = !insn.rde.osz();
    match insn.opcode {
        0x1C => vector::exec_pabs(state, bus, insn, ea(insn), use_mmx, 8),
        0x1D => vector::exec_pabs(state, bus, insn, ea(insn), use_mmx, 16),
        0x1E => vector::exec_pabs(state, bus, insn, ea(insn), use_mmx, 32),
        0x2A => vector::exec_movntdqa(state, bus, insn, ea(insn)),
        0x40 => {
            let src = vector::read_vec_src(state, bus, insn, ea(insn), false)?;
            vector::exec_pmulld(state, insn, src);
            Ok(())
        }
        0x10F => {
            let src = vector::read_vec_src(state, bus, insn, ea(insn), use_mmx)?;
            vector::exec_palignr(state, insn, src, use_mmx, insn.uimm0 as u8);
            Ok(())
        }
        0x144 => {
            let src = vector::read_vec_src(state, bus, insn, ea(insn), false)?;
            vector::exec_pclmulqdq(state, insn, src, insn.uimm0 as u8);
            Ok(())
        }
        _ => Err(Exception::UndefinedOpcode),
    }
}

fn shift_count(state: &CpuState, insn: &DecodedInsn, opcode: u16) -> u8 {
    match opcode {
        0xC0 | 0xC1 => insn.uimm0 as u8,
        0xD0 | 0xD1 => 1,
        _ => operand::read_register_byte(state, Register::RCX, false),
    }
}

fn dispatch_legacy(
    state: &mut CpuState,
    system: &mut System,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
) -> Result<(), Exception> {
    let op = insn.opcode;
    match op {
        0x00..=0x05 | 0x08..=0x0D | 0x10..=0x15 | 0x18..=0x1D | 0x20..=0x25 | 0x28..=0x2D
        | 0x30..=0x35 | 0x38..=0x3D => match op & 0x7 {
            0 => alu_forms::exec_eb_gb(state, bus, insn, ea(insn)),
            1 => alu_forms::exec_ev_gv(state, bus, insn, ea(insn)),
            2 => alu_forms::exec_gb_eb(state, bus, insn, ea(insn)),
            3 => alu_forms::exec_gv_ev(state, bus, insn, ea(insn)),
            4 => alu_forms::exec_al_ib(state, insn),
            _ => alu_forms::exec_rax_iz(state, insn),
        },
        0x06 => mov::exec_push_seg(state, bus, insn, Segment::Es),
        0x07 => mov::exec_pop_seg(state, bus, insn, Segment::Es),
        0x0E => mov::exec_push_seg(state, bus, insn, Segment::Cs),
        0x16 => mov::exec_push_seg(state, bus, insn, Segment::Ss),
        0x17 => mov::exec_pop_seg(state, bus, insn, Segment::Ss),
        0x1E => mov::exec_push_seg(state, bus, insn, Segment::Ds),
        0x1F => mov::exec_pop_seg(state, bus, insn, Segment::Ds),
        0x40..=0x4F => {
            let reg = Register::from_index((op & 0x7) as u8);
            let is_inc = op < 0x48;
            let width = insn.rde.operand_width(Width::default_long_legacy());
            let saved_cf = state.flags.contains(crate::state::Flags::CF);
            let op_kind = if is_inc { AluOp::Add } else { AluOp::Sub };
            let d = operand::read_register_width(state, reg, width);
            let result = alu_op(op_kind, d, 1, width, &mut state.flags);
            operand::write_register_width(state, reg, result, width);
            state.flags.set(crate::state::Flags::CF, saved_cf);
            Ok(())
        }
        0x50..=0x57 => mov::exec_push_zv(state, bus, insn),
        0x58..=0x5F => mov::exec_pop_zv(state, bus, insn),
        0x63 => mov::exec_movsxd(state, bus, insn, ea(insn)),
        0x68 | 0x6A => mov::exec_push_imm(state, bus, insn),
        0xC4 => mov::exec_les_lds(state, bus, insn, ea(insn), Segment::Es),
        0xC5 => mov::exec_les_lds(state, bus, insn, ea(insn), Segment::Ds),
        0x70..=0x7F => {
            cond::exec_jcc(state, insn, op as u8);
            Ok(())
        }
        0x80 | 0x82 => alu_forms::exec_group1_imm(state, bus, insn, ea(insn), true),
        0x81 | 0x83 => alu_forms::exec_group1_imm(state, bus, insn, ea(insn), false),
        0x84 => alu_forms::exec_test_rm_reg(state, bus, insn, ea(insn), true),
        0x85 => alu_forms::exec_test_rm_reg(state, bus, insn, ea(insn), false),
        0x86 => mov::exec_xchg_ev_gv(state, bus, insn, ea(insn), true),
        0x87 => mov::exec_xchg_ev_gv(state, bus, insn, ea(insn), false),
        0x88 => mov::exec_mov_eb_gb(state, bus, insn, ea(insn)),
        0x89 => mov::exec_mov_ev_gv(state, bus, insn, ea(insn)),
        0x8A => mov::exec_mov_gb_eb(state, bus, insn, ea(insn)),
        0x8B => mov::exec_mov_gv_ev(state, bus, insn, ea(insn)),
        0x8C => mov::exec_mov_ev_sw(state, bus, insn, ea(insn)),
        0x8D => {
            mov::exec_lea(state, insn, ea(insn));
            Ok(())
        }
        0x8E => mov::exec_mov_sw_ev(state, system, bus, insn, ea(insn)),
        0x8F => mov::exec_pop_ev(state, bus, insn, ea(insn)),
        0x90 => {
            if insn.rde.rex_b() {
                mov::exec_xchg_rax_zv(state, insn);
            }
            Ok(())
        }
        0x91..=0x97 => {
            mov::exec_xchg_rax_zv(state, insn);
            Ok(())
        }
        0x98 => {
            exec_sax(state, insn);
            Ok(())
        }
        0x99 => {
            exec_convert(state, insn);
            Ok(())
        }
        0x9C => flags_ops::exec_pushf(state, bus, insn),
        0x9D => flags_ops::exec_popf(state, bus, insn),
        0x9E => {
            flags_ops::exec_sahf(state);
            Ok(())
        }
        0x9F => {
            flags_ops::exec_lahf(state);
            Ok(())
        }
        0xA4 => string::exec_movs(state, bus, insn, seg_base(state, Segment::Ds), seg_base(state, Segment::Es), true),
        0xA5 => string::exec_movs(state, bus, insn, seg_base(state, Segment::Ds), seg_base(state, Segment::Es), false),
        0xA6 => string::exec_cmps(state, bus, insn, seg_base(state, Segment::Ds), seg_base(state, Segment::Es), true),
        0xA7 => string::exec_cmps(state, bus, insn, seg_base(state, Segment::Ds), seg_base(state, Segment::Es), false),
        0xA8 => {
            alu_forms::exec_test_acc_imm(state, insn, true);
            Ok(())
        }
        0xA9 => {
            alu_forms::exec_test_acc_imm(state, insn, false);
            Ok(())
        }
        0xAA => string::exec_stos(state, bus, insn, seg_base(state, Segment::Es), true),
        0xAB => string::exec_stos(state, bus, insn, seg_base(state, Segment::Es), false),
        0xAC => string::exec_lods(state, bus, insn, seg_base(state, Segment::Ds), true),
        0xAD => string::exec_lods(state, bus, insn, seg_base(state, Segment::Ds), false),
        0xAE => string::exec_scas(state, bus, insn, seg_base(state, Segment::Es), true),
        0xAF => string::exec_scas(state, bus, insn, seg_base(state, Segment::Es), false),
        0xB0..=0xB7 => {
            mov::exec_mov_zb_ib(state, insn);
            Ok(())
        }
        0xB8..=0xBF => {
            mov::exec_mov_zv_iv(state, insn);
            Ok(())
        }
        0xC0 => shift::exec_bsub(state, bus, insn, ea(insn), shift_count(state, insn, op)),
        0xC1 => shift::exec_bsuw(state, bus, insn, ea(insn), shift_count(state, insn, op)),
        0xC6 => mov::exec_mov_eb_ib(state, bus, insn, ea(insn)),
        0xC7 => mov::exec_mov_ev_iz(state, bus, insn, ea(insn)),
        0xCC => Err(misc::exec_interrupt(3)),
        0xCD => Err(misc::exec_interrupt(insn.uimm0 as u8)),
        0xD0 => shift::exec_bsub(state, bus, insn, ea(insn), shift_count(state, insn, op)),
        0xD1 => shift::exec_bsuw(state, bus, insn, ea(insn), shift_count(state, insn, op)),
        0xD2 => shift::exec_bsub(state, bus, insn, ea(insn), shift_count(state, insn, op)),
        0xD3 => shift::exec_bsuw(state, bus, insn, ea(insn), shift_count(state, insn, op)),
        0xD6 => {
            misc::exec_salc(state);
            Ok(())
        }
        0xD7 => mov::exec_xlat(state, bus, insn, seg_base(state, Segment::Ds)),
        0xE0 => {
            cond::exec_loop(state, insn, Some(true));
            Ok(())
        }
        0xE1 => {
            cond::exec_loop(state, insn, Some(false));
            Ok(())
        }
        0xE2 => {
            cond::exec_loop(state, insn, None);
            Ok(())
        }
        0xE3 => {
            cond::exec_jcxz(state, insn);
            Ok(())
        }
        0xE4 => {
            misc::exec_in(state, system, insn, insn.uimm0 as u16, true);
            Ok(())
        }
        0xE5 => {
            misc::exec_in(state, system, insn, insn.uimm0 as u16, false);
            Ok(())
        }
        0xE6 => {
            misc::exec_out(state, system, insn, insn.uimm0 as u16, true);
            Ok(())
        }
        0xE7 => {
            misc::exec_out(state, system, insn, insn.uimm0 as u16, false);
            Ok(())
        }
        0xEA => exec_far_jmp(state, system, bus, insn),
        0xEC => {
            let port = operand::read_register_width(state, Register::RDX, Width::W16) as u16;
            misc::exec_in(state, system, insn, port, true);
            Ok(())
        }
        0xED => {
            let port = operand::read_register_width(state, Register::RDX, Width::W16) as u16;
            misc::exec_in(state, system, insn, port, false);
            Ok(())
        }
        0xEE => {
            let port = operand::read_register_width(state, Register::RDX, Width::W16) as u16;
            misc::exec_out(state, system, insn, port, true);
            Ok(())
        }
        0xEF => {
            let port = operand::read_register_width(state, Register::RDX, Width::W16) as u16;
            misc::exec_out(state, system, insn, port, false);
            Ok(())
        }
        0xF1 => Err(misc::exec_interrupt(1)),
        0xF4 => Err(Exception::MachineHalt(0)),
        0xF5 => {
            flags_ops::exec_cmc(state);
            Ok(())
        }
        0xF6 => dispatch_group3(state, bus, insn, ea(insn), true),
        0xF7 => dispatch_group3(state, bus, insn, ea(insn), false),
        0xF8 => {
            flags_ops::exec_clc(state);
            Ok(())
        }
        0xF9 => {
            flags_ops::exec_stc(state);
            Ok(())
        }
        0xFA => {
            flags_ops::exec_cli(state);
            Ok(())
        }
        0xFB => {
            flags_ops::exec_sti(state);
            Ok(())
        }
        0xFC => {
            flags_ops::exec_cld(state);
            Ok(())
        }
        0xFD => {
            flags_ops::exec_std(state);
            Ok(())
        }
        0xFE => match insn.rde.modrm_reg() {
            0 => misc::exec_inc_dec(state, bus, insn, ea(insn), true, true),
            1 => misc::exec_inc_dec(state, bus, insn, ea(insn), false, true),
            _ => Err(Exception::UndefinedOpcode),
        },
        0xFF => match insn.rde.modrm_reg() {
            0 => misc::exec_inc_dec(state, bus, insn, ea(insn), true, false),
            1 => misc::exec_inc_dec(state, bus, insn, ea(insn), false, false),
            6 => mov::exec_push_ev(state, bus, insn, ea(insn)),
            _ => Err(Exception::UndefinedOpcode),
        },
        _ => Err(Exception::UndefinedOpcode),
    }
}

fn dispatch_group3(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    byte_form: bool,
) -> Result<(), Exception> {
    let width = if byte_form { Width::W8 } else { insn.rde.operand_width(Width::default_long_legacy()) };
    match insn.rde.modrm_reg() {
        0 | 1 => {
            // TEST Eb/Ev, Ib/Iz.
            if byte_form {
                let d = operand::modrm_byte_operand(&insn.rde, ea).read(state, bus)? as u64;
                alu_op(AluOp::And, d, insn.uimm0, Width::W8, &mut state.flags);
            } else {
                let d = operand::modrm_operand(&insn.rde, ea).read(state, bus, &insn.rde, width)?;
                alu_op(AluOp::And, d, insn.uimm0, width, &mut state.flags);
            }
            Ok(())
        }
        2 => {
            // NOT: bitwise complement, no flags touched.
            if byte_form {
                let dst = operand::modrm_byte_operand(&insn.rde, ea);
                let d = dst.read(state, bus)?;
                dst.write(state, bus, !d)
            } else {
                let dst = operand::modrm_operand(&insn.rde, ea);
                let d = dst.read(state, bus, &insn.rde, width)?;
                dst.write(state, bus, &insn.rde, !d, width)
            }
        }
        3 => {
            // NEG: 0 - d, full flag set (matches sub_with_flags's CF rule:
            // set unless the operand was already zero).
            if byte_form {
                let dst = operand::modrm_byte_operand(&insn.rde, ea);
                let d = dst.read(state, bus)? as u64;
                let result = alu_op(AluOp::Sub, 0, d, Width::W8, &mut state.flags) as u8;
                dst.write(state, bus, result)
            } else {
                let dst = operand::modrm_operand(&insn.rde, ea);
                let d = dst.read(state, bus, &insn.rde, width)?;
                let result = alu_op(AluOp::Sub, 0, d, width, &mut state.flags);
                dst.write(state, bus, &insn.rde, result, width)
            }
        }
        // MUL/IMUL/DIV/IDIV (reg 4-7): the wide-multiply/divide kernels are
        // part of the ALU/FPU arithmetic family this core treats as an
        // unspecified stand-in (spec.md §1) — not implemented; see
        // DESIGN.md.
        _ => Err(Exception::UndefinedOpcode),
    }
}

fn seg_base(state: &CpuState, seg: Segment) -> u64 {
    state.segments.get(seg).base
}

/// `CBW`/`CWDE`/`CDQE` (`0x98`): sign-extend the accumulator into the next
/// wider width, keyed by operand size alone (no ModR/M).
fn exec_sax(state: &mut CpuState, insn: &DecodedInsn) {
    let width = insn.rde.operand_width(Width::default_long_legacy());
    match width {
        Width::W16 => {
            let al = operand::read_register_byte(state, Register::RAX, false) as i8 as i16 as u16;
            operand::write_register_width(state, Register::RAX, al as u64, Width::W16);
        }
        Width::W32 => {
            let ax = operand::read_register_width(state, Register::RAX, Width::W16) as u16 as i16 as i32 as u32;
            operand::write_register_width(state, Register::RAX, ax as u64, Width::W32);
        }
        Width::W64 => {
            let eax = operand::read_register_width(state, Register::RAX, Width::W32) as u32 as i32 as i64;
            operand::write_register_width(state, Register::RAX, eax as u64, Width::W64);
        }
        Width::W8 => unreachable!("CBW/CWDE/CDQE have no 8-bit form"),
    }
}

/// `CWD`/`CDQ`/`CQO` (`0x99`): `(E/R)DX` becomes the sign-extension of
/// `(E/R)AX`, at the instruction's operand width.
fn exec_convert(state: &mut CpuState, insn: &DecodedInsn) {
    let width = insn.rde.operand_width(Width::default_long_legacy());
    let a = operand::read_register_signed(state, &insn.rde, Register::RAX, width);
    let result = if a < 0 { u64::MAX } else { 0 };
    operand::write_register_width(state, Register::RDX, result, width);
}

fn exec_far_jmp(
    state: &mut CpuState,
    system: &mut System,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
) -> Result<(), Exception> {
    let (new_base, new_mode) = segment::far_jump_target(system, bus, insn.uimm0)?;
    state.segments.get_mut(Segment::Cs).base = new_base;
    segment::change_machine_mode(state, new_mode, || {});
    state.set_rip(insn.disp as u64);
    system.fire_long_branch(state);
    Ok(())
}

fn dispatch_0f(
    state: &mut CpuState,
    system: &mut System,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
) -> Result<(), Exception> {
    let op = insn.opcode;
    match op {
        0x03 => {
            let width = insn.rde.operand_width(Width::default_long_legacy());
            let selector = operand::modrm_operand(&insn.rde, ea(insn)).read(state, bus, &insn.rde, width)?;
            let limit = segment::load_segment_limit(system, bus, selector);
            misc::exec_lsl(state, insn, limit);
            Ok(())
        }
        0x10 => vector::exec_movups_family(state, bus, insn, ea(insn), true),
        0x11 => vector::exec_movups_family(state, bus, insn, ea(insn), false),
        0x12 => {
            if insn.has_repne() {
                vector::exec_movddup(state, bus, insn, ea(insn))
            } else if insn.has_rep() {
                vector::exec_movsldup_shdup(state, bus, insn, ea(insn), false)
            } else if insn.rde.is_modrm_register() {
                vector::exec_movhllh(state, insn, true);
                Ok(())
            } else {
                vector::exec_movlhps_mem(state, bus, insn, ea(insn), false, true)
            }
        }
        0x13 => vector::exec_movlhps_mem(state, bus, insn, ea(insn), false, false),
        0x16 => {
            if insn.has_rep() {
                vector::exec_movsldup_shdup(state, bus, insn, ea(insn), true)
            } else if insn.rde.is_modrm_register() {
                vector::exec_movhllh(state, insn, false);
                Ok(())
            } else {
                vector::exec_movlhps_mem(state, bus, insn, ea(insn), true, true)
            }
        }
        0x17 => vector::exec_movlhps_mem(state, bus, insn, ea(insn), true, false),
        0x1F => {
            misc::exec_nop_ev(state, system, insn);
            Ok(())
        }
        0x20 => misc::exec_mov_r_cr(state, system, insn),
        0x22 => misc::exec_mov_cr_r(state, system, bus, insn),
        0x28 => vector::exec_movaps_family(state, bus, insn, ea(insn), true),
        0x29 => vector::exec_movaps_family(state, bus, insn, ea(insn), false),
        0x30 => {
            misc::exec_wrmsr();
            Ok(())
        }
        0x32 => {
            misc::exec_rdmsr(state);
            Ok(())
        }
        0x40..=0x4F => cond::exec_cmovcc(state, bus, insn, ea(insn), op as u8),
        0x6E => vector::exec_movd_movq_gpr(state, bus, insn, ea(insn), !insn.rde.osz(), true),
        0x6F => vector::exec_movdqa_family(state, bus, insn, ea(insn), true),
        0x77 => {
            misc::exec_emms(state);
            Ok(())
        }
        0x7E => {
            if insn.has_rep() {
                vector::exec_movq_xmm(state, bus, insn, ea(insn), true)
            } else {
                vector::exec_movd_movq_gpr(state, bus, insn, ea(insn), !insn.rde.osz(), false)
            }
        }
        0x7F => vector::exec_movdqa_family(state, bus, insn, ea(insn), false),
        0x80..=0x8F => {
            cond::exec_jcc(state, insn, op as u8);
            Ok(())
        }
        0x90..=0x9F => cond::exec_setcc(state, bus, insn, ea(insn), op as u8),
        0xA3 => bit::exec_bit_reg_form(state, bus, insn, ea(insn), BitOp::Test),
        0xA4 => shift::exec_double_shift(state, bus, insn, ea(insn), insn.uimm0 as u8),
        0xA5 => {
            let count = operand::read_register_byte(state, Register::RCX, false);
            shift::exec_double_shift(state, bus, insn, ea(insn), count)
        }
        0xAB => bit::exec_bit_reg_form(state, bus, insn, ea(insn), BitOp::Set),
        0xAC => shift::exec_double_shift(state, bus, insn, ea(insn), insn.uimm0 as u8),
        0xAD => {
            let count = operand::read_register_byte(state, Register::RCX, false);
            shift::exec_double_shift(state, bus, insn, ea(insn), count)
        }
        0xAE => dispatch_group15(state, bus, insn),
        0xB3 => bit::exec_bit_reg_form(state, bus, insn, ea(insn), BitOp::Reset),
        0xB6 => mov::exec_movzx(state, bus, insn, ea(insn), true),
        0xB7 => mov::exec_movzx(state, bus, insn, ea(insn), false),
        0xB8 => {
            if insn.has_rep() {
                misc::exec_popcnt(state, bus, insn, ea(insn))
            } else {
                Err(Exception::UndefinedOpcode)
            }
        }
        0xBA => match BitOp::from_group8_reg(insn.rde.modrm_reg()) {
            Some(bitop) => bit::exec_bit_imm_form(state, bus, insn, ea(insn), bitop),
            None => Err(Exception::UndefinedOpcode),
        },
        0xBB => bit::exec_bit_reg_form(state, bus, insn, ea(insn), BitOp::Complement),
        0xBC => misc::exec_bsf(state, bus, insn, ea(insn)),
        0xBD => misc::exec_bsr(state, bus, insn, ea(insn)),
        0xBE => mov::exec_movsx(state, bus, insn, ea(insn), true),
        0xBF => mov::exec_movsx(state, bus, insn, ea(insn), false),
        0xC7 => dispatch_group9(state, insn),
        0xC8..=0xCF => {
            misc::exec_bswap(state, insn);
            Ok(())
        }
        0xD6 => {
            if insn.has_rep() {
                vector::exec_movq2dq(state, insn);
                Ok(())
            } else if insn.has_repne() {
                vector::exec_movdq2q(state, insn);
                Ok(())
            } else {
                vector::exec_movq_xmm(state, bus, insn, ea(insn), false)
            }
        }
        0xD7 => {
            vector::exec_pmovmskb(state, insn, !insn.rde.osz());
            Ok(())
        }
        0xF7 => {
            let di = seg_base(state, Segment::Ds).wrapping_add(operand::read_register_width(
                state,
                Register::RDI,
                operand::address_width(state.mode, &insn.rde),
            ));
            vector::exec_maskmov(state, bus, insn, di, !insn.rde.osz())
        }
        _ => Err(Exception::UndefinedOpcode),
    }
}

fn dispatch_group15(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
) -> Result<(), Exception> {
    if insn.rde.is_modrm_register() {
        match insn.rde.modrm_reg() {
            0 => {
                let base = seg_base(state, Segment::Fs);
                misc::exec_rd_seg_base(state, insn, base);
                Ok(())
            }
            1 => {
                let base = seg_base(state, Segment::Gs);
                misc::exec_rd_seg_base(state, insn, base);
                Ok(())
            }
            2 => {
                let base = misc::exec_wr_seg_base(state, insn);
                state.segments.get_mut(Segment::Fs).base = base;
                Ok(())
            }
            3 => {
                let base = misc::exec_wr_seg_base(state, insn);
                state.segments.get_mut(Segment::Gs).base = base;
                Ok(())
            }
            _ => control::dispatch_group15(state, bus, insn, ea(insn)),
        }
    } else {
        control::dispatch_group15(state, bus, insn, ea(insn))
    }
}

fn dispatch_group9(state: &mut CpuState, insn: &DecodedInsn) -> Result<(), Exception> {
    match insn.rde.modrm_reg() {
        6 => misc::exec_rdrand_like(state, insn, placeholder_entropy(state)),
        7 if insn.has_rep() => {
            misc::exec_rdpid(state, insn, 0);
            Ok(())
        }
        7 => misc::exec_rdrand_like(state, insn, placeholder_entropy(state)),
        _ => Err(Exception::UndefinedOpcode),
    }
}

/// `RDRAND`/`RDSEED` need *some* value from an entropy source this crate
/// doesn't own (spec.md §6 names no randomness collaborator); callers that
/// care about real entropy quality should intercept `0x0FC7 /6` and `/7`
/// before reaching this dispatcher. A deterministic stand-in (derived from
/// CPU state rather than a constant) keeps this at least non-trivial for
/// tests that exercise the dispatch path without caring about randomness.
fn placeholder_entropy(state: &CpuState) -> u64 {
    state.rip() ^ operand::read_register_width(state, Register::RAX, Width::W64)
}
