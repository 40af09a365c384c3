//! The grab-bag of single-purpose scalar routines spec.md §4.4 calls out
//! by name: `BSWAP`, `BSF`/`BSR`/`POPCNT` (and their `REP`-gated `TZCNT`/
//! `LZCNT` aliases), `INC`/`DEC`, interrupts, `SALC`, `IN`/`OUT`, the
//! `CR0`-`CR4` moves, the `RDMSR`/`WRMSR` stubs, and the `NOP`/`0F 1F`
//! debug-hook family.

use crate::alu::{alu_op, AluOp};
use crate::mem::CpuBus;
use crate::operand;
use crate::state::{CpuState, Flags};
use crate::system::System;
use crate::Exception;
use aero_x86::{DecodedInsn, Register, Width};

/// `BSWAP` (`0x0FC8`-`0x0FCF`): byte-reverses the selected width. The
/// 16-bit form is architecturally undefined; this core pins the legacy
/// "both shifts left 8" behavior (spec.md §4.4, §9 open question): the low
/// byte becomes zero, the original low byte moves to bits 8-15, and the
/// original high byte is simply discarded rather than ending up anywhere.
pub fn exec_bswap(state: &mut CpuState, insn: &DecodedInsn) {
    let raw = (insn.opcode & 0b111) as u8;
    let reg = Register::from_index(raw | ((insn.rde.rex_b() as u8) << 3));
    let x = operand::read_register_width(state, reg, Width::W64);
    let width = insn.rde.operand_width(Width::default_long_legacy());
    let result = match width {
        Width::W64 => x.swap_bytes(),
        Width::W32 => (x as u32).swap_bytes() as u64,
        Width::W16 => ((x & 0xFF) << 8) | ((x & 0xFF00) << 8),
        Width::W8 => unreachable!("BSWAP has no 8-bit form"),
    };
    operand::write_register_width(state, reg, result, width);
}

/// `BSF Gv, Ev` (`0x0FBC`) / `TZCNT` when `REP` is present: lowest set bit
/// index, or with `REP`, trailing-zero count that returns the operand
/// width on a zero input (spec.md §4.4 `BSR/BSF`).
pub fn exec_bsf(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
) -> Result<(), Exception> {
    bitscan(state, bus, insn, ea, Scan::Forward)
}

/// `BSR Gv, Ev` (`0x0FBD`) / `LZCNT` when `REP` is present: highest set bit
/// index, or with `REP`, leading-zero count.
pub fn exec_bsr(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
) -> Result<(), Exception> {
    bitscan(state, bus, insn, ea, Scan::Reverse)
}

/// `POPCNT Gv, Ev` (`0x0FB8` with `REP`; without `REP`, the opcode is
/// decoded as `0x0FB8`'s legacy Jcc-adjacent slot and is `#UD` here since
/// this core only reaches `POPCNT` from the `REP`-gated dispatch key).
pub fn exec_popcnt(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
) -> Result<(), Exception> {
    let width = insn.rde.operand_width(Width::default_long_legacy());
    let x = operand::modrm_operand(&insn.rde, ea).read(state, bus, &insn.rde, width)?;
    let result = x.count_ones() as u64;
    state.flags.set(Flags::ZF, x == 0);
    state.flags.set(Flags::CF, false);
    state.flags.set(Flags::SF, false);
    state.flags.set(Flags::OF, false);
    state.flags.set(Flags::PF, false);
    let dst = Register::from_index(insn.rde.reg_rexr());
    operand::write_register(state, &insn.rde, dst, result, width);
    Ok(())
}

enum Scan {
    Forward,
    Reverse,
}

fn bitscan(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    direction: Scan,
) -> Result<(), Exception> {
    let width = insn.rde.operand_width(Width::default_long_legacy());
    let x = operand::modrm_operand(&insn.rde, ea).read(state, bus, &insn.rde, width)?;
    let bits = width.bits();
    let result = if insn.has_rep() {
        if x == 0 {
            state.flags.set(Flags::CF, true);
            state.flags.set(Flags::ZF, false);
            bits as u64
        } else {
            state.flags.set(Flags::CF, false);
            let count = match direction {
                Scan::Forward => x.trailing_zeros(),
                Scan::Reverse => x.leading_zeros() - (64 - bits),
            };
            state.flags.set(Flags::ZF, count == 0);
            count as u64
        }
    } else {
        state.flags.set(Flags::ZF, x == 0);
        if x == 0 {
            // Architecturally undefined; blink writes 0 for determinism
            // and this core matches it (spec.md §4.4, SPEC_FULL.md §2).
            0
        } else {
            match direction {
                Scan::Forward => x.trailing_zeros() as u64,
                Scan::Reverse => (bits - 1 - (x.leading_zeros() - (64 - bits))) as u64,
            }
        }
    };
    if x != 0 || insn.has_rep() {
        let dst = Register::from_index(insn.rde.reg_rexr());
        operand::write_register(state, &insn.rde, dst, result, width);
    }
    Ok(())
}

/// `INC Zv`/`DEC Zv` (`0x40`-`0x4F` in legacy/real mode; the one-operand
/// group-5/group-3 forms in long mode): unlike the ALU-immediate forms,
/// `INC`/`DEC` never touch `CF` (so a `REP STOSB; INC ecx`-style carry
/// chain survives across them).
pub fn exec_inc_dec(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    is_inc: bool,
    byte_form: bool,
) -> Result<(), Exception> {
    let saved_cf = state.flags.contains(Flags::CF);
    let op = if is_inc { AluOp::Add } else { AluOp::Sub };
    if byte_form {
        let dst = operand::modrm_byte_operand(&insn.rde, ea);
        let d = dst.read(state, bus)? as u64;
        let result = alu_op(op, d, 1, Width::W8, &mut state.flags) as u8;
        dst.write(state, bus, result)?;
    } else {
        let width = insn.rde.operand_width(Width::default_long_legacy());
        let dst = operand::modrm_operand(&insn.rde, ea);
        let d = dst.read(state, bus, &insn.rde, width)?;
        let result = alu_op(op, d, 1, width, &mut state.flags);
        dst.write(state, bus, &insn.rde, result, width)?;
    }
    state.flags.set(Flags::CF, saved_cf);
    Ok(())
}

/// `SALC` (`0xD6`, undocumented): `AL <- 0xFF` if `CF` else `0x00`
/// (spec.md §4.4 `OpSalc`).
pub fn exec_salc(state: &mut CpuState) {
    let value = if state.flags.contains(Flags::CF) { 0xFF } else { 0x00 };
    operand::write_register_byte(state, value, Register::RAX, false);
}

/// `INT3`/`INT1`/`INT imm8` (and `HLT`, dispatched the same way): none of
/// these vector through an IDT in this design (spec.md §4.4, §9 open
/// question) — they terminate the current `execute_instruction` call with
/// [`Exception::MachineHalt`], carrying the vector the host's own
/// interrupt-delivery policy (if any) would need.
pub fn exec_interrupt(vector: u8) -> Exception {
    Exception::MachineHalt(vector)
}

/// `IN AL/eAX, Ib/DX` (`0xE4`/`0xE5`/`0xEC`/`0xED`).
pub fn exec_in(state: &mut CpuState, system: &mut System, insn: &DecodedInsn, port: u16, byte_form: bool) {
    if byte_form {
        let value = system.io_read(port, Width::W8) as u8;
        operand::write_register_byte(state, value, Register::RAX, false);
    } else {
        let width = insn.rde.operand_width(Width::default_long_legacy()).min(Width::W32);
        let value = system.io_read(port, width);
        operand::write_register_width(state, Register::RAX, value, width);
    }
}

/// `OUT Ib/DX, AL/eAX` (`0xE6`/`0xE7`/`0xEE`/`0xEF`).
pub fn exec_out(state: &CpuState, system: &mut System, insn: &DecodedInsn, port: u16, byte_form: bool) {
    if byte_form {
        let value = operand::read_register_byte(state, Register::RAX, false);
        system.io_write(port, Width::W8, value as u64);
    } else {
        let width = insn.rde.operand_width(Width::default_long_legacy()).min(Width::W32);
        let value = operand::read_register_width(state, Register::RAX, width);
        system.io_write(port, width, value);
    }
}

/// `MOV Rqp, Cq` (`0x0F20`): read `CR0`/`CR2`/`CR3`/`CR4` by `ModR/M.reg`;
/// any other register index is `#UD` (spec.md §4.4 `OpMovRqCq`).
pub fn exec_mov_r_cr(state: &mut CpuState, system: &System, insn: &DecodedInsn) -> Result<(), Exception> {
    let value = match insn.rde.modrm_reg() {
        0 => system.cr0,
        2 => system.cr2,
        3 => system.cr3,
        4 => system.cr4,
        _ => return Err(Exception::UndefinedOpcode),
    };
    let dst = Register::from_index(insn.rde.rm_rexb());
    operand::write_register_width(state, dst, value, Width::W64);
    Ok(())
}

/// `MOV Cq, Rqp` (`0x0F22`): `CR3` writes are bounds-checked against real
/// memory size (`cr3 + 512*8 <= real memory size`, per blink's
/// `OpMovCqRq`), raising `#GP` out of range; the other CRs are unchecked.
pub fn exec_mov_cr_r(
    state: &CpuState,
    system: &mut System,
    bus: &dyn CpuBus,
    insn: &DecodedInsn,
) -> Result<(), Exception> {
    let src = Register::from_index(insn.rde.rm_rexb());
    let value = operand::read_register_width(state, src, Width::W64);
    match insn.rde.modrm_reg() {
        0 => system.cr0 = value,
        2 => system.cr2 = value,
        3 => {
            if value.checked_add(512 * 8).map_or(false, |end| end as usize <= bus.size()) {
                system.cr3 = value;
            } else {
                return Err(Exception::gp0());
            }
        }
        4 => system.cr4 = value,
        _ => return Err(Exception::UndefinedOpcode),
    }
    Ok(())
}

/// `RDMSR`/`WRMSR`: stubs per spec.md §4.4/§9 — `WRMSR` is a no-op,
/// `RDMSR` always returns zero in `EDX:EAX`.
pub fn exec_rdmsr(state: &mut CpuState) {
    operand::write_register_width(state, Register::RAX, 0, Width::W32);
    operand::write_register_width(state, Register::RDX, 0, Width::W32);
}

pub fn exec_wrmsr() {}

/// `0F 1F /r` (`OpNopEv`): a multi-byte `NOP` that doubles as this
/// interpreter's tooling back-channel (spec.md §4.4 `OpNopEv`,
/// SPEC_FULL.md §2's exact sub-dispatch key). `mod=01,reg=000,rm=101`
/// (octal `0o105`) sets the `bofram` debugger-assist window;
/// `reg=000,rm=111` across `mod` 00/01/10 (octal `0o007`/`0o107`/`0o207`)
/// invokes `system.on_bin_base`.
pub fn exec_nop_ev(state: &mut CpuState, system: &mut System, insn: &DecodedInsn) {
    let key = (insn.rde.modrm_mod() as u16) << 6
        | (insn.rde.modrm_reg() as u16) << 3
        | insn.rde.modrm_rm() as u16;
    match key {
        0o105 => {
            if insn.disp != 0 {
                state.bofram = [state.rip(), state.rip().wrapping_add((insn.disp & 0xFF) as u64)];
            } else {
                state.bofram = [0, 0];
            }
        }
        0o007 | 0o107 | 0o207 => system.fire_bin_base(state),
        _ => {}
    }
}

/// `EMMS` (`0x0F77`): resets the x87 tag word to all-empty (spec.md §4.7,
/// SPEC_FULL.md §2: a single `0xFF` byte, not eight two-bit tags).
pub fn exec_emms(state: &mut CpuState) {
    state.x87.tw = 0xFF;
}

/// `RDRAND`/`RDSEED`/`RDPID` gating (`0x0FC7` group-9, ModR/M.reg 6/7):
/// register-only, `#UD` on the memory form (spec.md §4.6 "sub-opcode
/// multiplexers"). The entropy source itself is out of this crate's scope
/// (it has no randomness collaborator named in spec.md §6); callers supply
/// the raw value.
pub fn exec_rdrand_like(state: &mut CpuState, insn: &DecodedInsn, value: u64) -> Result<(), Exception> {
    if !insn.rde.is_modrm_register() {
        return Err(Exception::UndefinedOpcode);
    }
    let width = insn.rde.operand_width(Width::default_long_legacy());
    let dst = Register::from_index(insn.rde.rm_rexb());
    operand::write_register(state, &insn.rde, dst, value, width);
    state.flags.set(Flags::CF, true);
    state.flags.remove(Flags::OF | Flags::SF | Flags::ZF | Flags::AF | Flags::PF);
    Ok(())
}

/// `RDPID` specifically (`REP` variant of the group-9 `/7` memory-form
/// `#UD` slot): unlike `RDRAND`/`RDSEED`, never fails and sets no flags.
pub fn exec_rdpid(state: &mut CpuState, insn: &DecodedInsn, value: u64) {
    let dst = Register::from_index(insn.rde.rm_rexb());
    operand::write_register(state, &insn.rde, dst, value, Width::default_long_legacy());
}

/// `RDFSBASE`/`RDGSBASE` (`0x0FAE /0` and `/1`, register form): move the
/// named segment's base into a GPR at operand width.
pub fn exec_rd_seg_base(state: &mut CpuState, insn: &DecodedInsn, base: u64) {
    let dst = Register::from_index(insn.rde.rm_rexb());
    operand::write_register(state, &insn.rde, dst, base, insn.rde.operand_width(Width::default_long_legacy()));
}

/// `WRFSBASE`/`WRGSBASE` (`0x0FAE /2` and `/3`, register form): the
/// inverse.
pub fn exec_wr_seg_base(state: &CpuState, insn: &DecodedInsn) -> u64 {
    let src = Register::from_index(insn.rde.rm_rexb());
    operand::read_register(state, &insn.rde, src, Width::default_long_legacy())
}

/// `LSL Gvqp, Ew` (`0x0F03`): resolves a selector's segment limit, clearing
/// `ZF` on a missing descriptor instead of faulting (spec.md §4.3 `OpLsl`).
pub fn exec_lsl(state: &mut CpuState, insn: &DecodedInsn, limit: Option<u64>) {
    match limit {
        Some(l) => {
            let dst = Register::from_index(insn.rde.reg_rexr());
            operand::write_register(state, &insn.rde, dst, l, insn.rde.operand_width(Width::default_long_legacy()));
            state.flags.insert(Flags::ZF);
        }
        None => state.flags.remove(Flags::ZF),
    }
}
