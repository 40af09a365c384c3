//! C7: ancillary control opcodes outside the scalar/vector families proper
//! — `FXSAVE`/`FXRSTOR`, `LDMXCSR`/`STMXCSR`, and the `0x0FAE` group-15
//! multiplexer that shares one ModR/M.reg dispatch across all four plus the
//! fence/prefetch no-ops (spec.md §4.7, SPEC_FULL.md §2 FXSAVE layout).

use crate::mem::CpuBus;
use crate::state::CpuState;
use crate::Exception;
use aero_x86::DecodedInsn;

/// `FXSAVE` image layout (spec.md §4.7/§6): 416 bytes, of which this core
/// populates the control words, the 128-byte ST(i)/MM area, and the
/// 256-byte XMM area; the remaining header/reserved bytes are zeroed,
/// matching blink's `OpFxsave` for the fields this core actually models.
/// Deliberately not hardware's real 512-byte FXSAVE area size — spec.md §6
/// pins this core's own 416-byte layout.
const FXSAVE_IMAGE_LEN: usize = 416;

/// `FXSAVE` (`0x0FAE /0`): serializes `cw`/`sw`/`tw`/`st`/`xmm0-15` into a
/// 416-byte guest memory image.
pub fn exec_fxsave(state: &CpuState, bus: &mut dyn CpuBus, ea: u64) -> Result<(), Exception> {
    let mut image = [0u8; FXSAVE_IMAGE_LEN];
    image[0..2].copy_from_slice(&state.x87.cw.to_le_bytes());
    image[2..4].copy_from_slice(&state.x87.sw.to_le_bytes());
    // A single FTW byte per blink's simplified model (SPEC_FULL.md §2), not
    // the architectural abridged-tag-word encoding.
    image[4] = state.x87.tw;
    image[6..8].copy_from_slice(&(state.x87.op).to_le_bytes());
    image[8..12].copy_from_slice(&state.x87.ip.to_le_bytes());
    image[24..28].copy_from_slice(&state.mxcsr.to_le_bytes());
    for (i, reg) in state.x87.st.iter().enumerate() {
        let off = 32 + i * 16;
        image[off..off + 16].copy_from_slice(reg);
    }
    for (i, &xmm) in state.sse.xmm.iter().enumerate() {
        let off = 160 + i * 16;
        image[off..off + 16].copy_from_slice(&xmm.to_le_bytes());
    }
    bus.write_bytes(ea, &image)
}

/// `FXRSTOR` (`0x0FAE /1`): the inverse of [`exec_fxsave`].
pub fn exec_fxrstor(state: &mut CpuState, bus: &mut dyn CpuBus, ea: u64) -> Result<(), Exception> {
    let mut image = [0u8; FXSAVE_IMAGE_LEN];
    bus.read_bytes(ea, &mut image)?;
    state.x87.cw = u16::from_le_bytes(image[0..2].try_into().unwrap());
    state.x87.sw = u16::from_le_bytes(image[2..4].try_into().unwrap());
    state.x87.tw = image[4];
    state.x87.op = u16::from_le_bytes(image[6..8].try_into().unwrap());
    state.x87.ip = u32::from_le_bytes(image[8..12].try_into().unwrap());
    state.mxcsr = u32::from_le_bytes(image[24..28].try_into().unwrap());
    for (i, reg) in state.x87.st.iter_mut().enumerate() {
        let off = 32 + i * 16;
        reg.copy_from_slice(&image[off..off + 16]);
    }
    for (i, xmm) in state.sse.xmm.iter_mut().enumerate() {
        let off = 160 + i * 16;
        *xmm = u128::from_le_bytes(image[off..off + 16].try_into().unwrap());
    }
    Ok(())
}

/// `LDMXCSR` (`0x0FAE /2`).
pub fn exec_ldmxcsr(state: &mut CpuState, bus: &mut dyn CpuBus, ea: u64) -> Result<(), Exception> {
    state.mxcsr = bus.read_u32(ea)?;
    Ok(())
}

/// `STMXCSR` (`0x0FAE /3`).
pub fn exec_stmxcsr(state: &CpuState, bus: &mut dyn CpuBus, ea: u64) -> Result<(), Exception> {
    bus.write_u32(ea, state.mxcsr)
}

/// The `0x0FAE` group-15 multiplexer (spec.md §4.6's sub-opcode
/// multiplexers; SPEC_FULL.md §2's RDFSBASE et al.): memory-form ModR/M.reg
/// picks `FXSAVE`/`FXRSTOR`/`LDMXCSR`/`STMXCSR`/`XSAVE`-family (the latter
/// out of scope, treated as `#UD`) or one of the fence instructions;
/// register-form picks `RDFSBASE`/`RDGSBASE`/`WRFSBASE`/`WRGSBASE`
/// (`reg` 0-3) via [`super::scalar::misc`], `LFENCE`/`MFENCE`/`SFENCE`
/// (`reg` 5-7) as no-ops.
pub fn dispatch_group15(
    state: &mut CpuState,
    bus: &mut dyn CpuBus,
    insn: &DecodedInsn,
    ea: u64,
) -> Result<(), Exception> {
    let reg = insn.rde.modrm_reg();
    if insn.rde.is_modrm_register() {
        match reg {
            5 | 6 | 7 => Ok(()), // LFENCE/MFENCE/SFENCE: no store-buffer model.
            _ => Err(Exception::UndefinedOpcode),
        }
    } else {
        match reg {
            0 => exec_fxsave(state, bus, ea),
            1 => exec_fxrstor(state, bus, ea),
            2 => exec_ldmxcsr(state, bus, ea),
            3 => exec_stmxcsr(state, bus, ea),
            7 => Ok(()), // CLFLUSH/CLFLUSHOPT: no cache model.
            _ => Err(Exception::UndefinedOpcode),
        }
    }
}

/// Mirrors the byte layout [`exec_fxsave`]/[`exec_fxrstor`] read and write by
/// hand, used only to pin that layout against spec.md §6 via `memoffset`
/// rather than trusting the hand-computed offsets above to stay in sync.
#[repr(C)]
struct FxsaveLayout {
    cw: u16,
    sw: u16,
    tw: u8,
    _reserved1: u8,
    op: u16,
    ip: u32,
    _reserved2: [u8; 12],
    mxcsr: u32,
    _reserved3: [u8; 4],
    st: [[u8; 16]; 8],
    xmm: [u128; 16],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::FlatTestBus;
    use crate::state::CpuMode;
    use memoffset::offset_of;

    #[test]
    fn fxsave_layout_matches_spec_offsets() {
        assert_eq!(offset_of!(FxsaveLayout, cw), 0);
        assert_eq!(offset_of!(FxsaveLayout, sw), 2);
        assert_eq!(offset_of!(FxsaveLayout, tw), 4);
        assert_eq!(offset_of!(FxsaveLayout, op), 6);
        assert_eq!(offset_of!(FxsaveLayout, ip), 8);
        assert_eq!(offset_of!(FxsaveLayout, mxcsr), 24);
        assert_eq!(offset_of!(FxsaveLayout, st), 32);
        assert_eq!(offset_of!(FxsaveLayout, xmm), 160);
        assert_eq!(std::mem::size_of::<FxsaveLayout>(), FXSAVE_IMAGE_LEN);
    }

    #[test]
    fn fxsave_fxrstor_round_trips_st_and_xmm() {
        let mut state = CpuState::new(CpuMode::Long64);
        state.x87.st[0] = [0xAB; 16];
        state.sse.xmm[3] = 0x1234_5678_9ABC_DEF0_0123_4567_89AB_CDEF;
        state.mxcsr = 0x1F80;
        let mut bus = FlatTestBus::new(0x1000);
        exec_fxsave(&state, &mut bus, 0x100).unwrap();

        let mut restored = CpuState::new(CpuMode::Long64);
        exec_fxrstor(&mut restored, &mut bus, 0x100).unwrap();
        assert_eq!(restored.x87.st[0], [0xAB; 16]);
        assert_eq!(restored.sse.xmm[3], state.sse.xmm[3]);
        assert_eq!(restored.mxcsr, 0x1F80);
    }
}
