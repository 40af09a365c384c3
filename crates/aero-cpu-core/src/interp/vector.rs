//! C5: the SSE/MMX data-movement family (spec.md §4.5), grounded on blink's
//! `ssemov.c`. Every handler here moves bits around — none does arithmetic —
//! which is why this module, unlike the scalar ALU/BSU forms, needs no
//! kernel table: the "operation" *is* which bytes go where.
//!
//! The legacy `66`/`F2`/`F3` mandatory prefixes that disambiguate the
//! packed/scalar/double variants of these opcodes are the same bits
//! `aero_x86::Rde::osz()` and `DecodedInsn::rep` already carry for the
//! integer instruction set (spec.md §9's "packed decode field" reuses them
//! rather than inventing a parallel prefix field) — handlers switch on
//! `insn.rep`/`insn.rde.osz()` exactly the way the scalar forms switch on
//! them for operand size.

use crate::mem::CpuBus;
use crate::state::CpuState;
use crate::Exception;
use aero_x86::{DecodedInsn, Register, Width, REP_REPNE, REP_REP};

fn xmm_index(insn: &DecodedInsn, reg_field: bool) -> usize {
    (if reg_field {
        insn.rde.reg_rexr()
    } else {
        insn.rde.rm_rexb()
    }) as usize
}

/// MMX register selection ignores `REX.R`/`REX.B` on real hardware — there
/// are only 8 MMX registers, aliased onto the x87 stack, so the index is
/// always masked down to 3 bits regardless of any REX extension bit a
/// stray prefix byte might set.
fn mmx_index(insn: &DecodedInsn, reg_field: bool) -> usize {
    xmm_index(insn, reg_field) & 0b111
}

/// `MOVUPS`/`MOVUPD`/`MOVSS`/`MOVSD` (`0x0F10`/`0x0F11`): unaligned full or
/// scalar (low 32/64 bits only) load/store, selected by `insn.rep` (`F3` =
/// scalar single, `F2` = scalar double, none = packed; `insn.rde.osz()`
/// further selects the packed-double `66` form over packed-single).
pub fn exec_movups_family(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    is_load: bool,
) -> Result<(), Exception> {
    let scalar_bytes = match insn.rep {
        REP_REP => Some(4),
        REP_REPNE => Some(8),
        _ => None,
    };
    if insn.rde.is_modrm_register() {
        let rm = xmm_index(insn, false);
        let reg = xmm_index(insn, true);
        let (src, dst) = if is_load { (rm, reg) } else { (reg, rm) };
        match scalar_bytes {
            Some(4) => {
                let v = state.sse.xmm[src] as u32 as u128;
                state.sse.xmm[dst] = (state.sse.xmm[dst] & !0xFFFF_FFFFu128) | v;
            }
            Some(8) => {
                let v = state.sse.xmm[src] as u64 as u128;
                state.sse.xmm[dst] = (state.sse.xmm[dst] & !(u64::MAX as u128)) | v;
            }
            _ => state.sse.xmm[dst] = state.sse.xmm[src],
        }
        Ok(())
    } else if is_load {
        let reg = xmm_index(insn, true);
        let value = match scalar_bytes {
            Some(4) => bus.read_u32(ea)? as u128,
            Some(8) => bus.read_u64(ea)? as u128,
            _ => bus.read_u128(ea)?,
        };
        // MOVSS/MOVSD loaded from memory zero the upper lanes of the
        // destination (spec.md §4.5); only the register-to-register form
        // above preserves them.
        state.sse.xmm[reg] = value;
        Ok(())
    } else {
        let reg = xmm_index(insn, true);
        match scalar_bytes {
            Some(4) => bus.write_u32(ea, state.sse.xmm[reg] as u32),
            Some(8) => bus.write_u64(ea, state.sse.xmm[reg] as u64),
            _ => bus.write_u128(ea, state.sse.xmm[reg]),
        }
    }
}

/// `MOVAPS`/`MOVAPD` (`0x0F28`/`0x0F29`): like `MOVUPS`, but the memory form
/// requires 16-byte alignment (spec.md's E2 scenario "MOVDQA misaligned
/// traps" applies identically here) — `#GP` on a misaligned memory operand,
/// per SSE's documented behavior (blink raises the same fault class this
/// core models as [`Exception::SegmentationFault`]).
pub fn exec_movaps_family(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    is_load: bool,
) -> Result<(), Exception> {
    if !insn.rde.is_modrm_register() && ea & 0xF != 0 {
        return Err(Exception::segfault(ea));
    }
    exec_movdqa(state, bus, insn, ea, is_load)
}

/// `MOVQ Pq, Qq` (`0x0F6F`/`0x0F7F`, no prefix): the MMX-only 64-bit form of
/// the same opcode bytes that `MOVDQA`/`MOVDQU` use under `66`/`F3` (spec.md
/// §4.5's dispatch table, row `0F 6F`/`7F`, `rep=0 OSZ=0` column).
pub fn exec_movq_mmx(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    is_load: bool,
) -> Result<(), Exception> {
    if insn.rde.is_modrm_register() {
        let rm = mmx_index(insn, false);
        let reg = mmx_index(insn, true);
        if is_load {
            state.mmx[reg] = state.mmx[rm];
        } else {
            state.mmx[rm] = state.mmx[reg];
        }
        Ok(())
    } else if is_load {
        let reg = mmx_index(insn, true);
        state.mmx[reg] = bus.read_u64(ea)?;
        Ok(())
    } else {
        let reg = mmx_index(insn, true);
        bus.write_u64(ea, state.mmx[reg])
    }
}

/// `MOVDQA`/`MOVDQU`/`MOVQ` (`0x0F6F`/`0x0F7F`) top-level multiplexer
/// (spec.md §4.5's dispatch table row): `66` selects `MOVDQA` (alignment-
/// checked — `#GP`-class fault on a misaligned memory operand, spec.md's S3
/// scenario), `F3` selects `MOVDQU` (no alignment check), and no prefix at
/// all is the MMX `MOVQ` form.
pub fn exec_movdqa_family(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    is_load: bool,
) -> Result<(), Exception> {
    if insn.rde.osz() {
        if !insn.rde.is_modrm_register() && ea & 0xF != 0 {
            return Err(Exception::segfault(ea));
        }
        exec_movdqa(state, bus, insn, ea, is_load)
    } else if insn.has_rep() {
        exec_movdqa(state, bus, insn, ea, is_load)
    } else {
        exec_movq_mmx(state, bus, insn, ea, is_load)
    }
}

/// `MOVDQA`/`MOVDQU` (`0x0F6F`/`0x0F7F`): full 128-bit register/memory move,
/// with no alignment check of its own — see [`exec_movdqa_family`] for the
/// prefix-keyed dispatch that adds the `MOVDQA` alignment check.
pub fn exec_movdqa(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    is_load: bool,
) -> Result<(), Exception> {
    if insn.rde.is_modrm_register() {
        let rm = xmm_index(insn, false);
        let reg = xmm_index(insn, true);
        if is_load {
            state.sse.xmm[reg] = state.sse.xmm[rm];
        } else {
            state.sse.xmm[rm] = state.sse.xmm[reg];
        }
        Ok(())
    } else if is_load {
        let reg = xmm_index(insn, true);
        state.sse.xmm[reg] = bus.read_u128(ea)?;
        Ok(())
    } else {
        let reg = xmm_index(insn, true);
        bus.write_u128(ea, state.sse.xmm[reg])
    }
}

/// `MOVD`/`MOVQ Vdq/Pq, Ed/Eq` family (`0x0F6E`/`0x0F7E` and the MMX
/// counterparts `0x0F6E`/`0x0F7E` without `66`): moves a 32- or 64-bit GPR
/// or memory value into the low lane of an XMM/MMX register, zero-extending
/// the rest (spec.md §4.5's zero-extension rule for narrower-than-128-bit
/// vector loads); `to_vector` picks the direction.
pub fn exec_movd_movq_gpr(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    use_mmx: bool,
    to_vector: bool,
) -> Result<(), Exception> {
    let width = insn.rde.operand_width(Width::W32);
    let vec_index = if use_mmx { mmx_index(insn, true) } else { xmm_index(insn, true) };
    if to_vector {
        let value = if insn.rde.is_modrm_register() {
            let reg = Register::from_index(insn.rde.rm_rexb());
            crate::operand::read_register(state, &insn.rde, reg, width)
        } else {
            crate::operand::read_memory(bus, &insn.rde, ea, width)?
        };
        if use_mmx {
            state.mmx[vec_index] = value;
        } else {
            state.sse.xmm[vec_index] = value as u128;
        }
    } else {
        let value = if use_mmx {
            state.mmx[vec_index]
        } else {
            state.sse.xmm[vec_index] as u64
        };
        if insn.rde.is_modrm_register() {
            let reg = Register::from_index(insn.rde.rm_rexb());
            crate::operand::write_register(state, &insn.rde, reg, value, width);
        } else {
            crate::operand::write_memory(bus, &insn.rde, ea, value, width)?;
        }
    }
    Ok(())
}

/// `MOVQ Vq, Wq` / `MOVQ Wq, Vq` (`0x0FD6`/`F3 0x0F7E`): the XMM-to-XMM or
/// XMM-to-memory 64-bit quadword move (as opposed to the GPR-facing form
/// above); the register destination case zero-extends to 128 bits.
pub fn exec_movq_xmm(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    is_load: bool,
) -> Result<(), Exception> {
    let reg = xmm_index(insn, true);
    if is_load {
        let value = if insn.rde.is_modrm_register() {
            state.sse.xmm[xmm_index(insn, false)] as u64
        } else {
            bus.read_u64(ea)?
        };
        state.sse.xmm[reg] = value as u128;
        Ok(())
    } else if insn.rde.is_modrm_register() {
        let rm = xmm_index(insn, false);
        state.sse.xmm[rm] = state.sse.xmm[reg] as u64 as u128;
        Ok(())
    } else {
        bus.write_u64(ea, state.sse.xmm[reg] as u64)
    }
}

/// `MOVHLPS`/`MOVLHPS` (`0x0F12`/`0x0F16`, register-only forms): swap which
/// half of the source supplies the destination's low 64 bits.
pub fn exec_movhllh(state: &mut CpuState, insn: &DecodedInsn, high_to_low: bool) {
    let rm = xmm_index(insn, false);
    let reg = xmm_index(insn, true);
    let src = state.sse.xmm[rm];
    let moved = if high_to_low { src >> 64 } else { src & 0xFFFF_FFFF_FFFF_FFFF };
    if high_to_low {
        state.sse.xmm[reg] = (state.sse.xmm[reg] & !(u64::MAX as u128)) | moved;
    } else {
        state.sse.xmm[reg] = (state.sse.xmm[reg] & !((u64::MAX as u128) << 64)) | (moved << 64);
    }
}

/// `MOVLPS`/`MOVLPD`/`MOVHPS`/`MOVHPD` (`0x0F12`/`0x13`/`0x16`/`0x17`,
/// memory forms): move the low or high 64-bit lane between memory and an
/// XMM register, leaving the other lane untouched on load.
pub fn exec_movlhps_mem(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    high_lane: bool,
    is_load: bool,
) -> Result<(), Exception> {
    let reg = xmm_index(insn, true);
    let shift = if high_lane { 64 } else { 0 };
    if is_load {
        let value = bus.read_u64(ea)? as u128;
        let mask = (u64::MAX as u128) << shift;
        state.sse.xmm[reg] = (state.sse.xmm[reg] & !mask) | (value << shift);
        Ok(())
    } else {
        bus.write_u64(ea, (state.sse.xmm[reg] >> shift) as u64)
    }
}

/// `MOVDDUP` (`F2 0x0F12`): broadcasts the low 64 bits of the source across
/// both lanes.
pub fn exec_movddup(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
) -> Result<(), Exception> {
    let low = if insn.rde.is_modrm_register() {
        state.sse.xmm[xmm_index(insn, false)] as u64
    } else {
        bus.read_u64(ea)?
    };
    let reg = xmm_index(insn, true);
    state.sse.xmm[reg] = (low as u128) | ((low as u128) << 64);
    Ok(())
}

/// `MOVSLDUP`/`MOVSHDUP` (`F3 0x0F12`/`F3 0x0F16`): broadcast each 32-bit
/// lane's low (`SLDUP`) or high (`SHDUP`) dword across its adjacent pair.
pub fn exec_movsldup_shdup(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    high: bool,
) -> Result<(), Exception> {
    let src = if insn.rde.is_modrm_register() {
        state.sse.xmm[xmm_index(insn, false)]
    } else {
        bus.read_u128(ea)?
    };
    let lane = |i: u32| -> u128 { (src >> (i * 32)) as u32 as u128 };
    let picked = if high { [lane(1), lane(1), lane(3), lane(3)] } else { [lane(0), lane(0), lane(2), lane(2)] };
    let result = picked[0] | (picked[1] << 32) | (picked[2] << 64) | (picked[3] << 96);
    state.sse.xmm[xmm_index(insn, true)] = result;
    Ok(())
}

/// `MASKMOVDQU`/`MASKMOVQ` (`0x0FF7`, XMM and MMX forms): a per-byte masked
/// store to `DS:[(E)DI]` — only bytes whose mask byte has bit 7 set are
/// written. Routed through [`crate::state::OpCache`] so the dispatcher can
/// commit the partial write after the handler returns (spec.md §3 "Stash",
/// §8 invariant 8): the handler snapshots the *existing* memory, overwrites
/// only the selected bytes in the stash, and the caller writes the stash
/// back verbatim, leaving unselected bytes exactly as they were.
pub fn exec_maskmov(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    di_addr: u64,
    use_mmx: bool,
) -> Result<(), Exception> {
    let len = if use_mmx { 8 } else { 16 };
    let (data, mask) = if use_mmx {
        let reg = mmx_index(insn, true);
        let rm = mmx_index(insn, false);
        (state.mmx[reg].to_le_bytes().to_vec(), state.mmx[rm].to_le_bytes().to_vec())
    } else {
        let reg = xmm_index(insn, true);
        let rm = xmm_index(insn, false);
        (
            state.sse.xmm[reg].to_le_bytes().to_vec(),
            state.sse.xmm[rm].to_le_bytes().to_vec(),
        )
    };
    let mut existing = [0u8; 16];
    bus.read_bytes(di_addr, &mut existing[..len])?;
    state.op_cache.begin(di_addr, &existing[..len]);
    for i in 0..len {
        if mask[i] & 0x80 != 0 {
            state.op_cache.set_byte(i, data[i]);
        }
    }
    Ok(())
}

/// `PMOVMSKB Gd, Pq/Vdq` (`0x0FD7`): the sign bit of each byte lane packed
/// into the low bits of a GPR.
pub fn exec_pmovmskb(state: &mut CpuState, insn: &DecodedInsn, use_mmx: bool) {
    let bytes: Vec<u8> = if use_mmx {
        state.mmx[mmx_index(insn, false)].to_le_bytes().to_vec()
    } else {
        state.sse.xmm[xmm_index(insn, false)].to_le_bytes().to_vec()
    };
    let mut mask = 0u64;
    for (i, b) in bytes.iter().enumerate() {
        if b & 0x80 != 0 {
            mask |= 1 << i;
        }
    }
    let dst_reg = Register::from_index(insn.rde.reg_rexr());
    crate::operand::write_register_width(state, dst_reg, mask, Width::W32);
}

/// `MOVQ2DQ Vdq, Nq` (`F3 0x0FD6`): copies an MMX register into the low 64
/// bits of an XMM register, zeroing the high 64.
pub fn exec_movq2dq(state: &mut CpuState, insn: &DecodedInsn) {
    let mmx_idx = insn.rde.rm_rexb() as usize & 0b111;
    let xmm_idx = xmm_index(insn, true);
    state.sse.xmm[xmm_idx] = state.mmx[mmx_idx] as u128;
}

/// `MOVDQ2Q Pq, Uq` (`F2 0x0FD6`): the inverse — low 64 bits of an XMM
/// register into an MMX register.
pub fn exec_movdq2q(state: &mut CpuState, insn: &DecodedInsn) {
    let xmm_idx = xmm_index(insn, false);
    let mmx_idx = insn.rde.reg_rexr() as usize & 0b111;
    state.mmx[mmx_idx] = state.sse.xmm[xmm_idx] as u64;
}

/// `PABSB`/`PABSW`/`PABSD` (`0F38 1C`/`1D`/`1E`, MMX or — under `66` —
/// XMM): per-lane absolute value, `lane_bits` selecting the lane width.
/// Unlike the scalar ALU forms, packed integer ops never touch `EFLAGS`, so
/// there is no kernel table to call into here (spec.md §1's ALU/SSE
/// arithmetic-kernel carve-out is about flag math, not lane arithmetic that
/// has none).
pub fn exec_pabs(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    use_mmx: bool,
    lane_bits: u32,
) -> Result<(), Exception> {
    let src = read_vec_src(state, bus, insn, ea, use_mmx)?;
    let result = pabs_lanes(src, lane_bits);
    if use_mmx {
        state.mmx[mmx_index(insn, true)] = result as u64;
    } else {
        state.sse.xmm[xmm_index(insn, true)] = result;
    }
    Ok(())
}

fn pabs_lanes(src: u128, lane_bits: u32) -> u128 {
    let lanes = 128 / lane_bits;
    let mut result: u128 = 0;
    for i in 0..lanes {
        let shift = i * lane_bits;
        let mask = (1u128 << lane_bits) - 1;
        let lane = (src >> shift) & mask;
        let abs = match lane_bits {
            8 => (lane as i8).unsigned_abs() as u128,
            16 => (lane as i16).unsigned_abs() as u128,
            32 => (lane as i32).unsigned_abs() as u128,
            _ => unreachable!("PABS only has byte/word/dword forms"),
        };
        result |= abs << shift;
    }
    result
}

/// `MOVNTDQA` (`66 0F38 2A`): a non-temporal aligned load. This core has no
/// cache model (spec.md's non-goals rule out microarchitectural timing), so
/// it behaves exactly like [`exec_movdqa`]'s load form modulo the alignment
/// check `MOVNTDQA` shares with `MOVDQA`.
pub fn exec_movntdqa(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
) -> Result<(), Exception> {
    if ea & 0xF != 0 {
        return Err(Exception::segfault(ea));
    }
    state.sse.xmm[xmm_index(insn, true)] = bus.read_u128(ea)?;
    Ok(())
}

/// Resolves the ModR/M source operand shared by [`exec_pmulld`],
/// [`exec_palignr`], and [`exec_pclmulqdq`]: an MMX/XMM register, or a
/// 64-/128-bit memory load, depending on `use_mmx`.
pub fn read_vec_src(
    state: &CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
    use_mmx: bool,
) -> Result<u128, Exception> {
    if use_mmx {
        if insn.rde.is_modrm_register() {
            Ok(state.mmx[mmx_index(insn, false)] as u128)
        } else {
            Ok(bus.read_u64(ea)? as u128)
        }
    } else if insn.rde.is_modrm_register() {
        Ok(state.sse.xmm[xmm_index(insn, false)])
    } else {
        bus.read_u128(ea)
    }
}

/// `PMULLD` (`66 0F38 40`): packed signed 32-bit multiply, low half of each
/// product kept. XMM-only (SSE4.1 added no MMX counterpart).
pub fn exec_pmulld(state: &mut CpuState, insn: &DecodedInsn, src: u128) {
    let dst = state.sse.xmm[xmm_index(insn, true)];
    let mut result: u128 = 0;
    for i in 0..4u32 {
        let shift = i * 32;
        let a = (dst >> shift) as u32;
        let b = (src >> shift) as u32;
        let product = a.wrapping_mul(b);
        result |= (product as u128) << shift;
    }
    state.sse.xmm[xmm_index(insn, true)] = result;
}

/// `PALIGNR` (`0F3A 0F`, MMX or — under `66` — XMM): concatenates
/// `dst:src` (src in the low bits), shifts right by `imm8` bytes, and keeps
/// the low half — i.e. a byte-granular funnel shift across the register
/// pair.
pub fn exec_palignr(state: &mut CpuState, insn: &DecodedInsn, src: u128, use_mmx: bool, imm8: u8) {
    if use_mmx {
        let dst = state.mmx[mmx_index(insn, true)] as u128;
        let concat = (dst << 64) | (src as u64 as u128);
        let shifted = if imm8 >= 16 {
            0
        } else {
            concat >> (imm8 as u32 * 8)
        };
        state.mmx[mmx_index(insn, true)] = shifted as u64;
    } else {
        let dst = state.sse.xmm[xmm_index(insn, true)];
        // 256-bit concat of dst:src, done in two u128 halves since Rust has
        // no native u256.
        let shifted = if imm8 >= 32 {
            0u128
        } else if imm8 >= 16 {
            dst.checked_shr((imm8 as u32 - 16) * 8).unwrap_or(0)
        } else if imm8 == 0 {
            src
        } else {
            let low = src >> (imm8 as u32 * 8);
            let high = dst << (128 - imm8 as u32 * 8);
            low | high
        };
        state.sse.xmm[xmm_index(insn, true)] = shifted;
    }
}

/// `PCLMULQDQ` (`66 0F3A 44`): carry-less (XOR, not add) multiply of two
/// 64-bit lanes picked out of `dst`/`src` by `imm8` bits 0 and 4.
pub fn exec_pclmulqdq(state: &mut CpuState, insn: &DecodedInsn, src: u128, imm8: u8) {
    let dst = state.sse.xmm[xmm_index(insn, true)];
    let a = if imm8 & 0x01 != 0 { (dst >> 64) as u64 } else { dst as u64 };
    let b = if imm8 & 0x10 != 0 { (src >> 64) as u64 } else { src as u64 };
    state.sse.xmm[xmm_index(insn, true)] = carryless_multiply(a, b);
}

fn carryless_multiply(a: u64, b: u64) -> u128 {
    let mut result: u128 = 0;
    for i in 0..64 {
        if b & (1 << i) != 0 {
            result ^= (a as u128) << i;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::FlatTestBus;
    use crate::state::CpuMode;
    use aero_x86::{OpcodeMap, Rde, REP_NONE};

    fn insn(rde: Rde) -> DecodedInsn {
        DecodedInsn {
            map: OpcodeMap::Ext0f,
            opcode: 0,
            rde,
            disp: 0,
            uimm0: 0,
            rep: REP_NONE,
            length: 3,
        }
    }

    #[test]
    fn movdqa_register_form_copies_whole_lane() {
        let mut state = CpuState::new(CpuMode::Long64);
        let mut bus = FlatTestBus::new(0x1000);
        state.sse.xmm[1] = 0x1122_3344_5566_7788_99AA_BBCC_DDEE_FF00;
        let i = insn(Rde::zero().with_modrm(0b11, 0, 1));
        exec_movdqa(&mut state, &mut bus, &i, 0, true).unwrap();
        assert_eq!(state.sse.xmm[0], state.sse.xmm[1]);
    }

    #[test]
    fn maskmov_only_touches_masked_bytes() {
        let mut state = CpuState::new(CpuMode::Long64);
        let mut bus = FlatTestBus::new(0x1000);
        bus.write_bytes(0x100, &[0xAA; 16]).unwrap();
        state.sse.xmm[0] = 0x1111_1111_1111_1111_1111_1111_1111_1111;
        state.sse.xmm[1] = 0xFF00_0000_0000_0000_0000_0000_0000_00FF;
        let i = insn(Rde::zero().with_modrm(0b11, 0, 1));
        exec_maskmov(&mut state, &mut bus, &i, 0x100, false).unwrap();
        let (addr, buf, len) = state.op_cache.take().unwrap();
        assert_eq!(addr, 0x100);
        assert_eq!(len, 16);
        assert_eq!(buf[0], 0x11);
        assert_eq!(buf[15], 0x11);
        assert_eq!(buf[1], 0xAA);
    }
}
