//! C3: segmentation & descriptor logic (spec.md §4.3).

use crate::mem::CpuBus;
use crate::state::{CpuMode, CpuState, CR0_PE};
use crate::system::System;
use crate::Exception;

pub fn is_protected_mode(system: &System) -> bool {
    system.cr0 & CR0_PE != 0
}

/// `GetDescriptor`: mask the selector down to a descriptor-table index,
/// bounds-check it against `[8, gdt_limit]` (selector 0, the null
/// descriptor, is always out of range), and read the 8-byte descriptor out
/// of guest memory. Returns `None` on a missing/out-of-range descriptor;
/// callers turn that into `#GP` (spec.md §4.3, SPEC_FULL.md §2).
pub fn get_descriptor(system: &System, bus: &mut dyn CpuBus, selector: u64) -> Option<u64> {
    debug_assert!(
        (system.gdt_base as u128 + system.gdt_limit as u128) <= bus.size() as u128,
        "GDT range must fit inside guest memory"
    );
    let selector = selector & !7u64;
    if selector >= 8 && selector + 8 <= system.gdt_limit {
        bus.read_u64(system.gdt_base + selector).ok()
    } else {
        None
    }
}

/// Classical scattered-bitfield composition (spec.md §4.3).
pub fn descriptor_base(d: u64) -> u64 {
    ((d & 0xFF00_0000_0000_0000) >> 32) | ((d & 0x0000_00FF_FFFF_0000) >> 16)
}

pub fn descriptor_limit(d: u64) -> u64 {
    ((d & 0x000F_0000_0000_0000) >> 32) | (d & 0xFFFF)
}

/// Mode bits at position 53-54. The table deliberately maps both low-bit-set
/// values to `Long64` (spec.md §4.3 note).
pub fn descriptor_mode(d: u64) -> CpuMode {
    const TABLE: [CpuMode; 4] = [
        CpuMode::Real,
        CpuMode::Long64,
        CpuMode::Legacy32,
        CpuMode::Long64,
    ];
    TABLE[((d >> 53) & 0b11) as usize]
}

/// Invalidates any decoded-instruction cache and switches `state.mode` when
/// a far control transfer targets a descriptor of a different mode
/// (spec.md §3, §9 "Mode-change invalidation"). `reset_instruction_cache` is
/// the caller's hook into its own decode cache — this crate doesn't own one
/// (the decoder is out of scope, per spec.md §1), so it's passed in rather
/// than called directly.
pub fn change_machine_mode(
    state: &mut CpuState,
    new_mode: CpuMode,
    reset_instruction_cache: impl FnOnce(),
) {
    if new_mode == state.mode {
        return;
    }
    reset_instruction_cache();
    state.mode = new_mode;
}

/// `OpMovSwEvqp`: load a segment base from a 16-bit selector. Real mode
/// shifts the selector left by 4; protected mode resolves it through the
/// GDT, raising `#GP` on a miss.
pub fn mov_sw_from_selector(
    system: &System,
    bus: &mut dyn CpuBus,
    selector: u64,
) -> Result<u64, Exception> {
    if !is_protected_mode(system) {
        Ok((selector & 0xFFFF) << 4)
    } else {
        get_descriptor(system, bus, selector)
            .map(descriptor_base)
            .ok_or(Exception::gp0())
    }
}

/// `OpLsl`: resolve a selector's segment limit without faulting; on a miss
/// the caller clears ZF instead of raising, per spec.md.
pub fn load_segment_limit(system: &System, bus: &mut dyn CpuBus, selector: u64) -> Option<u64> {
    get_descriptor(system, bus, selector).map(descriptor_limit)
}

/// `OpJmpf`: resolve a far-jump target's new CS base and machine mode.
/// Returns `(new_cs_base, new_mode)`; the caller (the dispatch-level
/// handler) is responsible for updating `state.ip`, calling
/// [`change_machine_mode`], and firing `system.on_long_branch`.
pub fn far_jump_target(
    system: &System,
    bus: &mut dyn CpuBus,
    selector: u64,
) -> Result<(u64, CpuMode), Exception> {
    if !is_protected_mode(system) {
        Ok(((selector & 0xFFFF) << 4, CpuMode::Real))
    } else {
        let descriptor = get_descriptor(system, bus, selector).ok_or(Exception::gp0())?;
        Ok((descriptor_base(descriptor), descriptor_mode(descriptor)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pack_descriptor(base: u64, limit: u64, mode_bits: u64) -> u64 {
        let base = base & 0xFF_FFFF_FFFF; // 40 bits: spec only round-trips 48-bit base via two scattered fields
        let limit = limit & 0xF_FFFF; // 20 bits
        let mut d = 0u64;
        d |= (base & 0xFF_FFFF) << 16; // low 24 bits of base -> bits 16..40
        d |= ((base >> 24) & 0xFF) << 56; // high 8 bits of base -> bits 56..64
        d |= limit & 0xFFFF; // low 16 bits of limit -> bits 0..16
        d |= ((limit >> 16) & 0xF) << 48; // high 4 bits of limit -> bits 48..52
        d |= (mode_bits & 0b11) << 53;
        d
    }

    proptest! {
        #[test]
        fn descriptor_base_and_limit_round_trip(base in 0u64..(1u64 << 32), limit in 0u64..(1u64 << 20)) {
            let d = pack_descriptor(base, limit, 0);
            prop_assert_eq!(descriptor_base(d), base);
            prop_assert_eq!(descriptor_limit(d), limit);
        }
    }

    #[test]
    fn mode_bits_map_both_low_bit_set_values_to_long64() {
        assert_eq!(descriptor_mode(pack_descriptor(0, 0, 0b00)), CpuMode::Real);
        assert_eq!(descriptor_mode(pack_descriptor(0, 0, 0b01)), CpuMode::Long64);
        assert_eq!(descriptor_mode(pack_descriptor(0, 0, 0b10)), CpuMode::Legacy32);
        assert_eq!(descriptor_mode(pack_descriptor(0, 0, 0b11)), CpuMode::Long64);
    }

    #[test]
    fn null_selector_is_never_a_valid_descriptor() {
        let system = System {
            gdt_base: 0x1000,
            gdt_limit: 0x800,
            ..System::default()
        };
        let mut bus = crate::mem::FlatBus::new(0x10000);
        bus.write_u64(0x1000, 0xDEAD_BEEF_0000_0000).unwrap();
        assert!(get_descriptor(&system, &mut bus, 0).is_none());
        assert!(get_descriptor(&system, &mut bus, 8).is_some());
    }
}
