//! C1: width-polymorphic operand accessors (spec.md §4.1).
//!
//! Every accessor here takes the instruction's [`Rde`] and derives a
//! [`Width`] from it (REX.W, then OSZ, then `default_width`), then performs
//! exactly the zero-extension / preservation policy spec.md §4.1 and §8
//! invariants 1-2 describe. Handlers never branch on width themselves.

use crate::mem::CpuBus;
use crate::state::{CpuMode, CpuState};
use crate::Exception;
use aero_x86::{Rde, Register, Width};

/// Effective address width (spec.md §4.1/§4.4's "LOOP... address-size, not
/// operand-size" and blink's `Eamode`/`MaskAddress`): unlike operand width,
/// this depends on the current machine mode, since the `ASZ` override
/// shrinks the mode's own default (64→32 in long mode, 32→16 in legacy
/// protected mode) rather than landing on one fixed width regardless of
/// mode. Real mode's default is 16-bit; its override widens to 32.
pub fn address_width(mode: CpuMode, rde: &Rde) -> Width {
    match mode {
        CpuMode::Long64 => if rde.asz() { Width::W32 } else { Width::W64 },
        CpuMode::Legacy32 => if rde.asz() { Width::W16 } else { Width::W32 },
        CpuMode::Real => if rde.asz() { Width::W32 } else { Width::W16 },
    }
}

/// Read a general register at the width selected by `rde` (defaulting to
/// `default_width` when neither REX.W nor OSZ apply), zero-extended to 64
/// bits.
pub fn read_register(state: &CpuState, rde: &Rde, reg: Register, default_width: Width) -> u64 {
    read_register_width(state, reg, rde.operand_width(default_width))
}

/// Like [`read_register`], but takes an already-resolved [`Width`] directly
/// rather than deriving one from `rde` — for callers keyed off
/// address-size rather than operand-size (e.g. `LOOP`'s CX/ECX/RCX
/// counter).
pub fn read_register_width(state: &CpuState, reg: Register, width: Width) -> u64 {
    mask_to_width(state.gpr_cell(reg), width)
}

/// Same as [`read_register`], sign-extended to 64 bits instead.
pub fn read_register_signed(
    state: &CpuState,
    rde: &Rde,
    reg: Register,
    default_width: Width,
) -> i64 {
    sign_extend(mask_to_width(state.gpr_cell(reg), rde.operand_width(default_width)),
        rde.operand_width(default_width))
}

/// Write a general register at the selected width. 32-bit writes clear the
/// upper 32 bits of the cell (spec.md §3, §8 invariant 1); 16- and 8-bit
/// writes preserve every bit above the written width (§8 invariant 2).
pub fn write_register(state: &mut CpuState, rde: &Rde, reg: Register, x: u64, default_width: Width) {
    write_register_width(state, reg, x, rde.operand_width(default_width))
}

/// Like [`write_register`], but takes an already-resolved [`Width`] (see
/// [`read_register_width`]).
pub fn write_register_width(state: &mut CpuState, reg: Register, x: u64, width: Width) {
    let cell = state.gpr_cell_mut(reg);
    match width {
        Width::W64 => *cell = x,
        Width::W32 => *cell = x & 0xFFFF_FFFF,
        Width::W16 => *cell = (*cell & !0xFFFFu64) | (x & 0xFFFF),
        Width::W8 => *cell = (*cell & !0xFFu64) | (x & 0xFF),
    }
}

/// Write the low 8 bits of a register, honoring the AH/CH/DH/BH vs
/// SPL/BPL/SIL/DIL split that depends on whether a REX prefix was present
/// at all (spec.md glossary "ModR/M"; see `aero_x86::Rde::has_rex_prefix`).
/// `reg` must already be the resolved low-nibble register (REX.B/R folded
/// in by the caller); `high_byte` selects the AH-style alias for indices
/// 4-7 when no REX prefix was present.
pub fn write_register_byte(state: &mut CpuState, value: u8, reg: Register, high_byte: bool) {
    let cell = state.gpr_cell_mut(reg);
    if high_byte {
        *cell = (*cell & !0xFF00u64) | ((value as u64) << 8);
    } else {
        *cell = (*cell & !0xFFu64) | value as u64;
    }
}

pub fn read_register_byte(state: &CpuState, reg: Register, high_byte: bool) -> u8 {
    let cell = state.gpr_cell(reg);
    if high_byte {
        (cell >> 8) as u8
    } else {
        cell as u8
    }
}

/// Does this 8-bit ModR/M index (0-7, pre-REX) name the AH-style high-byte
/// alias? True for indices 4-7 only when no REX prefix is present.
pub fn byte_reg_is_high_alias(rde: &Rde, raw_index: u8) -> bool {
    !rde.has_rex_prefix() && (4..8).contains(&raw_index)
}

/// The low-nibble GPR that an 8-bit ModR/M index maps onto, once the
/// AH-style high-byte case (which still addresses the *low* cell, e.g. AH
/// lives in the RAX cell) is accounted for.
pub fn byte_reg_cell(raw_index: u8, rex_bit: bool) -> Register {
    if rex_bit {
        Register::from_index(raw_index | 0b1000)
    } else {
        Register::from_index(raw_index & 0b0111)
    }
}

fn mask_to_width(x: u64, width: Width) -> u64 {
    match width {
        Width::W64 => x,
        Width::W32 => x & 0xFFFF_FFFF,
        Width::W16 => x & 0xFFFF,
        Width::W8 => x & 0xFF,
    }
}

fn sign_extend(x: u64, width: Width) -> i64 {
    match width {
        Width::W64 => x as i64,
        Width::W32 => x as u32 as i32 as i64,
        Width::W16 => x as u16 as i16 as i64,
        Width::W8 => x as u8 as i8 as i64,
    }
}

/// Read memory at the selected width (spec.md §4.1). Naturally aligned 32-
/// and 64-bit reads go through [`CpuBus`]'s atomic path; everything else is
/// a plain byte-wise read. Identical width policy to `read_register`.
pub fn read_memory(
    bus: &mut dyn CpuBus,
    rde: &Rde,
    addr: u64,
    default_width: Width,
) -> Result<u64, Exception> {
    Ok(match rde.operand_width(default_width) {
        Width::W64 => bus.read_u64(addr)?,
        Width::W32 => bus.read_u32(addr)? as u64,
        Width::W16 => bus.read_u16(addr)? as u64,
        Width::W8 => bus.read_u8(addr)? as u64,
    })
}

/// Sign-extending variant of [`read_memory`]: the atomic load happens
/// first, then a final cast to the signed width folds in the sign
/// extension (spec.md §4.1 "Sign-extending memory reads...").
pub fn read_memory_signed(
    bus: &mut dyn CpuBus,
    rde: &Rde,
    addr: u64,
    default_width: Width,
) -> Result<i64, Exception> {
    let width = rde.operand_width(default_width);
    Ok(match width {
        Width::W64 => bus.read_u64(addr)? as i64,
        Width::W32 => bus.read_u32(addr)? as i32 as i64,
        Width::W16 => bus.read_u16(addr)? as i16 as i64,
        Width::W8 => bus.read_u8(addr)? as i8 as i64,
    })
}

pub fn write_memory(
    bus: &mut dyn CpuBus,
    rde: &Rde,
    addr: u64,
    x: u64,
    default_width: Width,
) -> Result<(), Exception> {
    match rde.operand_width(default_width) {
        Width::W64 => bus.write_u64(addr, x)?,
        Width::W32 => bus.write_u32(addr, x as u32)?,
        Width::W16 => bus.write_u16(addr, x as u16)?,
        Width::W8 => bus.write_u8(addr, x as u8)?,
    }
    Ok(())
}

/// Like [`read_memory`], but takes an already-resolved [`Width`] directly —
/// for callers (string instructions, `PUSH`/`POP`) keyed off an explicit
/// width rather than one derived from `rde` per instruction.
pub fn read_memory_width(bus: &mut dyn CpuBus, addr: u64, width: Width) -> Result<u64, Exception> {
    Ok(match width {
        Width::W64 => bus.read_u64(addr)?,
        Width::W32 => bus.read_u32(addr)? as u64,
        Width::W16 => bus.read_u16(addr)? as u64,
        Width::W8 => bus.read_u8(addr)? as u64,
    })
}

/// Like [`write_memory`], with an already-resolved [`Width`] (see
/// [`read_memory_width`]).
pub fn write_memory_width(
    bus: &mut dyn CpuBus,
    addr: u64,
    x: u64,
    width: Width,
) -> Result<(), Exception> {
    match width {
        Width::W64 => bus.write_u64(addr, x)?,
        Width::W32 => bus.write_u32(addr, x as u32)?,
        Width::W16 => bus.write_u16(addr, x as u16)?,
        Width::W8 => bus.write_u8(addr, x as u8)?,
    }
    Ok(())
}

/// The ModR/M operand, register or memory, picked by `rde.modrm_mod()`.
/// Either a register cell or a resolved guest address; callers that
/// already resolved the address (to avoid recomputing it) can call
/// `read_memory`/`write_memory` directly instead.
#[derive(Debug, Clone, Copy)]
pub enum ModrmOperand {
    Register(Register),
    Memory(u64),
}

impl ModrmOperand {
    pub fn read(
        &self,
        state: &CpuState,
        bus: &mut dyn CpuBus,
        rde: &Rde,
        default_width: Width,
    ) -> Result<u64, Exception> {
        match *self {
            ModrmOperand::Register(reg) => Ok(read_register(state, rde, reg, default_width)),
            ModrmOperand::Memory(addr) => read_memory(bus, rde, addr, default_width),
        }
    }

    /// `WriteRegisterOrMemory` (spec.md §4.1): dispatches to register or
    /// memory write based on which variant this operand resolved to.
    pub fn write(
        self,
        state: &mut CpuState,
        bus: &mut dyn CpuBus,
        rde: &Rde,
        x: u64,
        default_width: Width,
    ) -> Result<(), Exception> {
        match self {
            ModrmOperand::Register(reg) => {
                write_register(state, rde, reg, x, default_width);
                Ok(())
            }
            ModrmOperand::Memory(addr) => write_memory(bus, rde, addr, x, default_width),
        }
    }
}

/// Resolve the ModR/M r/m operand: a register when `mod == 0b11`, otherwise
/// a memory operand at `effective_addr` (computed by the caller's
/// ModR/M-effective-address helper — out of scope for this crate per
/// spec.md §1, supplied by the caller in `effective_addr`).
pub fn modrm_operand(rde: &Rde, effective_addr: u64) -> ModrmOperand {
    if rde.is_modrm_register() {
        ModrmOperand::Register(Register::from_index(rde.rm_rexb()))
    } else {
        ModrmOperand::Memory(effective_addr)
    }
}

/// The byte-width counterpart of [`ModrmOperand`]: register form carries the
/// AH-style high-byte alias flag alongside the resolved cell, since 8-bit
/// ALU forms need it and the 16/32/64-bit accessors above never do.
#[derive(Debug, Clone, Copy)]
pub enum ByteOperand {
    Register(Register, bool),
    Memory(u64),
}

impl ByteOperand {
    pub fn read(&self, state: &CpuState, bus: &mut dyn CpuBus) -> Result<u8, Exception> {
        match *self {
            ByteOperand::Register(reg, high) => Ok(read_register_byte(state, reg, high)),
            ByteOperand::Memory(addr) => bus.read_u8(addr),
        }
    }

    pub fn write(self, state: &mut CpuState, bus: &mut dyn CpuBus, value: u8) -> Result<(), Exception> {
        match self {
            ByteOperand::Register(reg, high) => {
                write_register_byte(state, value, reg, high);
                Ok(())
            }
            ByteOperand::Memory(addr) => bus.write_u8(addr, value),
        }
    }
}

/// Resolve the ModR/M r/m operand at byte width.
pub fn modrm_byte_operand(rde: &Rde, effective_addr: u64) -> ByteOperand {
    if rde.is_modrm_register() {
        let raw = rde.modrm_rm();
        ByteOperand::Register(
            byte_reg_cell(raw, rde.rex_b()),
            byte_reg_is_high_alias(rde, raw),
        )
    } else {
        ByteOperand::Memory(effective_addr)
    }
}

/// Resolve the ModR/M `reg` field at byte width (always a register).
pub fn modrm_byte_reg(rde: &Rde) -> (Register, bool) {
    let raw = rde.modrm_reg();
    (
        byte_reg_cell(raw, rde.rex_r()),
        byte_reg_is_high_alias(rde, raw),
    )
}
