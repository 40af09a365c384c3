//! The MOV family, sign/zero extension, LEA, XCHG, and PUSH/POP of GPRs,
//! immediates, and segments (spec.md §4.4 templates 1 and 4; grounded on
//! blink's `OpMovEbGb`/`OpMovGbEb`/`OpMovZbIb`/`OpMovZvqpIvqp`/
//! `OpMovzbGvqpEb`/`OpMovsxdGdqpEd`/`OpLeaGvqpM`/`OpXchgZvqp`/`OpPushSeg`/
//! `OpPopSeg`/`OpLes`/`OpLds`).

use crate::mem::CpuBus;
use crate::operand;
use crate::segment;
use crate::state::CpuState;
use crate::system::System;
use crate::Exception;
use aero_x86::{DecodedInsn, Register, Segment, Width};

/// `MOV Eb, Gb` (`0x88`).
pub fn exec_mov_eb_gb(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
) -> Result<(), Exception> {
    let (reg, high) = operand::modrm_byte_reg(&insn.rde);
    let value = operand::read_register_byte(state, reg, high);
    operand::modrm_byte_operand(&insn.rde, ea).write(state, bus, value)
}

/// `MOV Gb, Eb` (`0x8A`).
pub fn exec_mov_gb_eb(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
) -> Result<(), Exception> {
    let value = operand::modrm_byte_operand(&insn.rde, ea).read(state, bus)?;
    let (reg, high) = operand::modrm_byte_reg(&insn.rde);
    operand::write_register_byte(state, value, reg, high);
    Ok(())
}

/// `MOV Ev, Gv` (`0x89`).
pub fn exec_mov_ev_gv(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
) -> Result<(), Exception> {
    let width = insn.rde.operand_width(Width::default_long_legacy());
    let src_reg = Register::from_index(insn.rde.reg_rexr());
    let value = operand::read_register(state, &insn.rde, src_reg, width);
    operand::modrm_operand(&insn.rde, ea).write(state, bus, &insn.rde, value, width)
}

/// `MOV Gv, Ev` (`0x8B`).
pub fn exec_mov_gv_ev(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
) -> Result<(), Exception> {
    let width = insn.rde.operand_width(Width::default_long_legacy());
    let value = operand::modrm_operand(&insn.rde, ea).read(state, bus, &insn.rde, width)?;
    let dst_reg = Register::from_index(insn.rde.reg_rexr());
    operand::write_register(state, &insn.rde, dst_reg, value, width);
    Ok(())
}

/// `MOV Eb, Ib` (`0xC6 /0`).
pub fn exec_mov_eb_ib(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
) -> Result<(), Exception> {
    operand::modrm_byte_operand(&insn.rde, ea).write(state, bus, insn.uimm0 as u8)
}

/// `MOV Ev, Iz` (`0xC7 /0`).
pub fn exec_mov_ev_iz(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
) -> Result<(), Exception> {
    let width = insn.rde.operand_width(Width::default_long_legacy());
    operand::modrm_operand(&insn.rde, ea).write(state, bus, &insn.rde, insn.uimm0, width)
}

/// `MOV Zb, Ib` (`0xB0`-`0xB7`): immediate into an 8-bit register named
/// directly by `REX.B | (opcode & 7)`, not via ModR/M.
pub fn exec_mov_zb_ib(state: &mut CpuState, insn: &DecodedInsn) {
    let raw = (insn.opcode & 0b111) as u8;
    let reg = operand::byte_reg_cell(raw, insn.rde.rex_b());
    let high = operand::byte_reg_is_high_alias(&insn.rde, raw);
    operand::write_register_byte(state, insn.uimm0 as u8, reg, high);
}

/// `MOV Zv, Iv` (`0xB8`-`0xBF`): like `exec_mov_zb_ib` but full width, and
/// the only MOV form that can carry a 64-bit immediate (REX.W).
pub fn exec_mov_zv_iv(state: &mut CpuState, insn: &DecodedInsn) {
    let raw = (insn.opcode & 0b111) as u8;
    let reg = Register::from_index(raw | ((insn.rde.rex_b() as u8) << 3));
    let width = insn.rde.operand_width(Width::default_long_legacy());
    operand::write_register_width(state, reg, insn.uimm0, width);
}

/// `MOVZX Gv, Eb` / `MOVZX Gv, Ew` (`0x0FB6`/`0x0FB7`).
pub fn exec_movzx(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    src_byte: bool,
) -> Result<(), Exception> {
    let dst_width = insn.rde.operand_width(Width::default_long_legacy());
    let dst_reg = Register::from_index(insn.rde.reg_rexr());
    let value = if src_byte {
        operand::modrm_byte_operand(&insn.rde, ea).read(state, bus)? as u64
    } else {
        operand::modrm_operand(&insn.rde, ea).read(state, bus, &insn.rde, Width::W16)?
    };
    operand::write_register(state, &insn.rde, dst_reg, value, dst_width);
    Ok(())
}

/// `MOVSX Gv, Eb` / `MOVSX Gv, Ew` (`0x0FBE`/`0x0FBF`).
pub fn exec_movsx(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    src_byte: bool,
) -> Result<(), Exception> {
    let dst_width = insn.rde.operand_width(Width::default_long_legacy());
    let dst_reg = Register::from_index(insn.rde.reg_rexr());
    let value = if src_byte {
        let raw = operand::modrm_byte_operand(&insn.rde, ea).read(state, bus)?;
        raw as i8 as i64 as u64
    } else {
        let raw = operand::modrm_operand(&insn.rde, ea).read(state, bus, &insn.rde, Width::W16)?;
        raw as u16 as i16 as i64 as u64
    };
    operand::write_register(state, &insn.rde, dst_reg, value, dst_width);
    Ok(())
}

/// `MOVSXD Gdqp, Ed` (`0x63`): sign-extends a 32-bit source into the
/// destination width, always through a 32-bit read regardless of REX.W
/// (the source is never 16- or 64-bit, per spec.md's "sign/zero extension"
/// bullet and blink's `OpMovsxdGdqpEd`).
pub fn exec_movsxd(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
) -> Result<(), Exception> {
    let dst_reg = Register::from_index(insn.rde.reg_rexr());
    let src = operand::modrm_operand(&insn.rde, ea).read(state, bus, &insn.rde, Width::W32)?;
    let value = src as u32 as i32 as i64 as u64;
    let dst_width = insn.rde.operand_width(Width::default_long_legacy());
    operand::write_register(state, &insn.rde, dst_reg, value, dst_width);
    Ok(())
}

/// `LEA Gvqp, M` (`0x8D`): writes the effective address itself, not the
/// memory it names, so `ea` is used even when the form has no real memory
/// access behind it.
pub fn exec_lea(state: &mut CpuState, insn: &DecodedInsn, ea: u64) {
    let dst_reg = Register::from_index(insn.rde.reg_rexr());
    let width = insn.rde.operand_width(Width::default_long_legacy());
    operand::write_register(state, &insn.rde, dst_reg, ea, width);
}

/// `XCHG Ev, Gv` (`0x86`/`0x87` and the byte form): swaps register/memory
/// and ModR/M-reg operands. `LOCK` makes this atomic in hardware; this
/// interpreter executes it as a plain read-modify-write pair (no other
/// vCPU can observe the intermediate state within a single
/// `execute_instruction` call regardless).
pub fn exec_xchg_ev_gv(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    byte_form: bool,
) -> Result<(), Exception> {
    if byte_form {
        let rm = operand::modrm_byte_operand(&insn.rde, ea);
        let (reg, high) = operand::modrm_byte_reg(&insn.rde);
        let a = rm.read(state, bus)?;
        let b = operand::read_register_byte(state, reg, high);
        rm.write(state, bus, b)?;
        operand::write_register_byte(state, a, reg, high);
    } else {
        let width = insn.rde.operand_width(Width::default_long_legacy());
        let rm = operand::modrm_operand(&insn.rde, ea);
        let reg = Register::from_index(insn.rde.reg_rexr());
        let a = rm.read(state, bus, &insn.rde, width)?;
        let b = operand::read_register(state, &insn.rde, reg, width);
        rm.write(state, bus, &insn.rde, b, width)?;
        operand::write_register(state, &insn.rde, reg, a, width);
    }
    Ok(())
}

/// `XCHG rAX, Zv` (`0x90`-`0x97`, also reached from `0x0F1F`'s `OpNop` when
/// `REX.B` is set per spec.md §4.4 `OpNop`): swaps RAX with
/// `REX.B | (opcode & 7)`.
pub fn exec_xchg_rax_zv(state: &mut CpuState, insn: &DecodedInsn) {
    let width = insn.rde.operand_width(Width::default_long_legacy());
    let raw = (insn.opcode & 0b111) as u8;
    let other = Register::from_index(raw | ((insn.rde.rex_b() as u8) << 3));
    let a = operand::read_register(state, &insn.rde, Register::RAX, width);
    let b = operand::read_register(state, &insn.rde, other, width);
    operand::write_register(state, &insn.rde, Register::RAX, b, width);
    operand::write_register(state, &insn.rde, other, a, width);
}

/// `PUSH Zv` (`0x50`-`0x57`): defaults to 64-bit operand size in long mode
/// even without REX.W (stack pushes are never 32-bit there).
pub fn exec_push_zv(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
) -> Result<(), Exception> {
    let raw = (insn.opcode & 0b111) as u8;
    let reg = Register::from_index(raw | ((insn.rde.rex_b() as u8) << 3));
    let width = insn.rde.operand_width(Width::W64);
    let value = operand::read_register_width(state, reg, width);
    push(state, bus, value, width)
}

/// `POP Zv` (`0x58`-`0x5F`).
pub fn exec_pop_zv(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
) -> Result<(), Exception> {
    let raw = (insn.opcode & 0b111) as u8;
    let reg = Register::from_index(raw | ((insn.rde.rex_b() as u8) << 3));
    let width = insn.rde.operand_width(Width::W64);
    let value = pop(state, bus, width)?;
    operand::write_register_width(state, reg, value, width);
    Ok(())
}

/// `PUSH Iz`/`PUSH Ib` (`0x68`/`0x6A`).
pub fn exec_push_imm(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
) -> Result<(), Exception> {
    let width = insn.rde.operand_width(Width::W64);
    push(state, bus, insn.uimm0, width)
}

/// `PUSH Ev`/`POP Ev` (group-5 `/6`, group-1A `/0`): the ModR/M-addressed
/// counterparts of `PUSH Zv`/`POP Zv`.
pub fn exec_push_ev(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
) -> Result<(), Exception> {
    let width = insn.rde.operand_width(Width::W64);
    let value = operand::modrm_operand(&insn.rde, ea).read(state, bus, &insn.rde, width)?;
    push(state, bus, value, width)
}

pub fn exec_pop_ev(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
) -> Result<(), Exception> {
    let width = insn.rde.operand_width(Width::W64);
    let value = pop(state, bus, width)?;
    operand::modrm_operand(&insn.rde, ea).write(state, bus, &insn.rde, value, width)
}

/// `PUSH <seg>` (opcodes whose `opcode & 0o70 >> 3` names ES/CS/SS/DS):
/// pushes the segment base shifted back down to a selector-shaped value
/// (spec.md's segment cells hold bases, not selectors — blink's
/// `OpPushSeg` divides the stored base by 16 to recover it).
pub fn exec_push_seg(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    seg: Segment,
) -> Result<(), Exception> {
    let width = insn.rde.operand_width(Width::W64);
    let base = state.segments.get(seg).base;
    push(state, bus, base >> 4, width)
}

/// `POP <seg>`: the inverse, storing the popped selector shifted left 4 as
/// the new base.
pub fn exec_pop_seg(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    seg: Segment,
) -> Result<(), Exception> {
    let width = insn.rde.operand_width(Width::W64);
    let selector = pop(state, bus, width)?;
    state.segments.get_mut(seg).base = (selector & 0xFFFF) << 4;
    Ok(())
}

/// `MOV Evqp, Sw` (`0x8C`): segment base shifted back down to
/// selector shape, written through the ModR/M destination.
pub fn exec_mov_ev_sw(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
) -> Result<(), Exception> {
    let seg = Segment::from_index(insn.rde.modrm_reg());
    let width = insn.rde.operand_width(Width::default_long_legacy());
    let value = state.segments.get(seg).base >> 4;
    operand::modrm_operand(&insn.rde, ea).write(state, bus, &insn.rde, value, width)
}

/// `MOV Sw, Evqp` (`0x8E`): spec.md §4.3 `OpMovSwEvqp`.
pub fn exec_mov_sw_ev(
    state: &mut CpuState,
    system: &System,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
) -> Result<(), Exception> {
    let seg = Segment::from_index(insn.rde.modrm_reg());
    let width = insn.rde.operand_width(Width::default_long_legacy());
    let selector = operand::modrm_operand(&insn.rde, ea).read(state, bus, &insn.rde, width)?;
    let base = segment::mov_sw_from_selector(system, bus, selector)?;
    state.segments.get_mut(seg).base = base;
    Ok(())
}

/// `LES Gvqp, Mp` / `LDS Gvqp, Mp` (group's far-pointer load): reads a
/// 32-bit far pointer, low 16 bits shift-by-4 into the named segment's
/// base, high 16 bits load the GPR (spec.md's SPEC_FULL.md §2 note: this
/// legacy encoding always shifts by 4, independent of `mode`).
pub fn exec_les_lds(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    seg: Segment,
) -> Result<(), Exception> {
    let far_ptr = bus.read_u32(ea)? as u64;
    state.segments.get_mut(seg).base = (far_ptr & 0xFFFF) << 4;
    let dst_reg = Register::from_index(insn.rde.reg_rexr());
    let width = insn.rde.operand_width(Width::default_long_legacy());
    operand::write_register(state, &insn.rde, dst_reg, far_ptr >> 16, width);
    Ok(())
}

/// `XLAT` (`0xD7`): `AL <- DS:[(E)BX + AL]`, address masked to the current
/// address size (spec.md §4.4).
pub fn exec_xlat(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ds_base: u64,
) -> Result<(), Exception> {
    let addr_width = operand::address_width(state.mode, &insn.rde);
    let bx = operand::read_register_width(state, Register::RBX, addr_width);
    let al = operand::read_register_byte(state, Register::RAX, false) as u64;
    let addr = ds_base.wrapping_add(bx.wrapping_add(al));
    let value = bus.read_u8(addr)?;
    operand::write_register_byte(state, value, Register::RAX, false);
    Ok(())
}

fn push(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    value: u64,
    width: Width,
) -> Result<(), Exception> {
    let sp = operand::read_register_width(state, Register::RSP, width)
        .wrapping_sub(width.bytes() as u64);
    operand::write_register_width(state, Register::RSP, sp, width);
    match width {
        Width::W64 => bus.write_u64(sp, value),
        Width::W32 => bus.write_u32(sp, value as u32),
        Width::W16 => bus.write_u16(sp, value as u16),
        Width::W8 => unreachable!("push/pop are never byte-width"),
    }
}

fn pop(state: &mut CpuState, bus: &mut dyn CpuBus, width: Width) -> Result<u64, Exception> {
    let sp = operand::read_register_width(state, Register::RSP, width);
    let value = match width {
        Width::W64 => bus.read_u64(sp)?,
        Width::W32 => bus.read_u32(sp)? as u64,
        Width::W16 => bus.read_u16(sp)? as u64,
        Width::W8 => unreachable!("push/pop are never byte-width"),
    };
    operand::write_register_width(state, Register::RSP, sp.wrapping_add(width.bytes() as u64), width);
    Ok(value)
}
