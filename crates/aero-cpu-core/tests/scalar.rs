//! End-to-end scenarios over scalar opcodes (spec.md §8): each test builds a
//! [`CpuState`] + an in-memory [`FlatTestBus`], hand-constructs a
//! [`DecodedInsn`], and drives it through [`execute_instruction`] exactly the
//! way an embedder would.

use aero_cpu_core::dispatch::execute_instruction;
use aero_cpu_core::mem::FlatTestBus;
use aero_cpu_core::state::{CpuMode, CpuState, Flags};
use aero_cpu_core::system::System;
use aero_cpu_core::Exception;
use aero_x86::{DecodedInsn, OpcodeMap, Rde, Register, REP_NONE, REP_REP};

fn insn(map: OpcodeMap, opcode: u16, rde: Rde, uimm0: u64, rep: u8) -> DecodedInsn {
    DecodedInsn {
        map,
        opcode,
        rde,
        disp: 0,
        uimm0,
        rep,
        length: 2,
    }
}

/// S1 — ADD RAX, RBX with RAX at all-ones wraps to zero and sets CF/ZF/PF,
/// clears OF/SF.
#[test]
fn s1_add_with_carry() {
    let mut state = CpuState::new(CpuMode::Long64);
    let mut system = System::new();
    let mut bus = FlatTestBus::new(0x1000);
    state.write_reg(Register::RAX, u64::MAX);
    state.write_reg(Register::RBX, 1);

    // ADD Ev, Gv (0x01), rm=RAX (dst), reg=RBX (src), REX.W for 64-bit.
    let rde = Rde::zero().with_rex_w(true).with_modrm(0b11, Register::RBX.index() as u8, Register::RAX.index() as u8);
    let i = insn(OpcodeMap::Legacy, 0x01, rde, 0, REP_NONE);
    execute_instruction(&mut state, &mut system, &mut bus, &i).unwrap();

    assert_eq!(state.read_reg(Register::RAX), 0);
    assert!(state.flags.contains(Flags::CF));
    assert!(state.flags.contains(Flags::ZF));
    assert!(!state.flags.contains(Flags::OF));
    assert!(!state.flags.contains(Flags::SF));
    assert!(state.flags.contains(Flags::PF));
}

/// S2 — a 32-bit MOV immediate zero-extends into the full 64-bit cell.
#[test]
fn s2_mov_zv_iv_zero_extends() {
    let mut state = CpuState::new(CpuMode::Long64);
    let mut system = System::new();
    let mut bus = FlatTestBus::new(0x1000);
    state.write_reg(Register::RAX, 0xDEAD_BEEF_CAFE_BABE);

    // MOV EAX, 0x11223344 (0xB8, no REX.W/OSZ -> 32-bit).
    let rde = Rde::zero();
    let i = insn(OpcodeMap::Legacy, 0xB8, rde, 0x1122_3344, REP_NONE);
    execute_instruction(&mut state, &mut system, &mut bus, &i).unwrap();

    assert_eq!(state.read_reg(Register::RAX), 0x0000_0000_1122_3344);
}

/// S5 — POPCNT RAX, RAX.
#[test]
fn s5_popcnt() {
    let mut state = CpuState::new(CpuMode::Long64);
    let mut system = System::new();
    let mut bus = FlatTestBus::new(0x1000);
    state.write_reg(Register::RAX, 0x0F0F_0F0F_0F0F_0F0F);

    let rde = Rde::zero().with_rex_w(true).with_modrm(0b11, Register::RAX.index() as u8, Register::RAX.index() as u8);
    let i = insn(OpcodeMap::Ext0f, 0xB8, rde, 0, REP_REP);
    execute_instruction(&mut state, &mut system, &mut bus, &i).unwrap();

    assert_eq!(state.read_reg(Register::RAX), 32);
    assert!(!state.flags.contains(Flags::ZF));
    assert!(!state.flags.contains(Flags::CF));
    assert!(!state.flags.contains(Flags::OF));
    assert!(!state.flags.contains(Flags::SF));
    assert!(!state.flags.contains(Flags::PF));
}

/// S6 — PUSHFQ publishes `flags & 0xFCFFFF`: CF/ZF survive, the reserved
/// always-one bit is forged in, and nothing above bit 21 leaks through.
#[test]
fn s6_pushf_mask() {
    let mut state = CpuState::new(CpuMode::Long64);
    let mut system = System::new();
    let mut bus = FlatTestBus::new(0x1000);
    state.write_reg(Register::RSP, 0x800);
    state.flags = Flags::CF | Flags::ZF;

    let rde = Rde::zero();
    let i = insn(OpcodeMap::Legacy, 0x9C, rde, 0, REP_NONE);
    execute_instruction(&mut state, &mut system, &mut bus, &i).unwrap();

    assert_eq!(state.read_reg(Register::RSP), 0x800 - 8);
    let pushed = bus.read_u64(0x800 - 8).unwrap();
    assert_eq!(pushed, (state.flags.export() as u64) & 0xFCFFFF);
    assert_ne!(pushed & Flags::CF.bits() as u64, 0);
    assert_ne!(pushed & Flags::ZF.bits() as u64, 0);
    assert_eq!(pushed & 0x0003_0000, 0, "VM/RF must never appear in the pushed image");
}

/// Invariant 11 — BSF/BSR with `REP` (TZCNT/LZCNT) on a zero input sets
/// CF=1, ZF=0, and writes the operand width.
#[test]
fn invariant_bsf_rep_zero_input_is_tzcnt_width() {
    let mut state = CpuState::new(CpuMode::Long64);
    let mut system = System::new();
    let mut bus = FlatTestBus::new(0x1000);
    state.write_reg(Register::RCX, 0);

    let rde = Rde::zero().with_rex_w(true).with_modrm(0b11, Register::RAX.index() as u8, Register::RCX.index() as u8);
    let i = insn(OpcodeMap::Ext0f, 0xBC, rde, 0, REP_REP);
    execute_instruction(&mut state, &mut system, &mut bus, &i).unwrap();

    assert_eq!(state.read_reg(Register::RAX), 64);
    assert!(state.flags.contains(Flags::CF));
    assert!(!state.flags.contains(Flags::ZF));
}

/// Invariant 9 — an unreached dispatch slot raises `#UD` without mutating
/// any visible state.
#[test]
fn invariant_unreached_opcode_is_ud_with_no_side_effects() {
    let mut state = CpuState::new(CpuMode::Long64);
    let mut system = System::new();
    let mut bus = FlatTestBus::new(0x1000);
    state.write_reg(Register::RAX, 0x1234);

    // 0x0F 0x0B (UD2 in real hardware) isn't in this dispatch table at all.
    let i = insn(OpcodeMap::Ext0f, 0x0B, Rde::zero(), 0, REP_NONE);
    let result = execute_instruction(&mut state, &mut system, &mut bus, &i);

    assert!(matches!(result, Err(Exception::UndefinedOpcode)));
    assert_eq!(state.read_reg(Register::RAX), 0x1234);
}

/// Invariant 9, continued — the `Ext0f38` sparse table raises `#UD` on an
/// opcode outside the handful it recognizes.
#[test]
fn invariant_ext0f38_unknown_opcode_is_ud() {
    let mut state = CpuState::new(CpuMode::Long64);
    let mut system = System::new();
    let mut bus = FlatTestBus::new(0x1000);

    let i = insn(OpcodeMap::Ext0f38, 0xFF, Rde::zero(), 0, REP_NONE);
    let result = execute_instruction(&mut state, &mut system, &mut bus, &i);

    assert!(matches!(result, Err(Exception::UndefinedOpcode)));
}

/// Invariant 8 and 10 — `MASKMOVDQU` through the full dispatcher: only the
/// masked bytes land in guest memory, and the pending stash is empty again
/// once `execute_instruction` returns (spec.md §8 invariants 8 and 10).
#[test]
fn maskmovdqu_through_dispatch_leaves_no_pending_stash() {
    use aero_cpu_core::state::OpCache;

    let mut state = CpuState::new(CpuMode::Long64);
    let mut system = System::new();
    let mut bus = FlatTestBus::new(0x1000);
    bus.write_bytes(0x100, &[0xAA; 16]).unwrap();
    state.write_reg(Register::RDI, 0x100);
    state.sse.xmm[0] = 0x1111_1111_1111_1111_1111_1111_1111_1111;
    // Mask byte 0 selects (sign bit set), every other lane does not.
    state.sse.xmm[1] = 0x0000_0000_0000_0000_0000_0000_0000_0080;

    let rde = Rde::zero().with_modrm(0b11, Register::RAX.index() as u8, Register::RCX.index() as u8);
    let i = insn(OpcodeMap::Ext0f, 0xF7, rde, 0, REP_NONE);
    execute_instruction(&mut state, &mut system, &mut bus, &i).unwrap();

    let mut observed = [0u8; 16];
    bus.read_bytes(0x100, &mut observed).unwrap();
    assert_eq!(observed[0], 0x11, "masked byte must be written");
    assert_eq!(&observed[1..], &[0xAA; 15], "unmasked bytes must survive untouched");

    let empty = OpCache::default();
    assert!(empty.is_empty(), "a fresh OpCache carries no pending stash");
    assert_eq!(empty.stash_addr(), 0);
    assert!(state.op_cache.is_empty(), "the dispatcher must flush and clear the stash");
}
