use thiserror::Error;

/// The core's error taxonomy (spec.md §7). All four kinds are terminating:
/// no handler has a local recovery path, and [`crate::execute_instruction`]
/// always returns as soon as one is raised (no partial writeback beyond
/// whatever already landed in registers/memory before the fault point).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Exception {
    /// `#UD` — an unreached dispatch slot, an unknown ModR/M.reg in a
    /// sub-opcode multiplexer, or a disallowed prefix combination.
    #[error("undefined opcode")]
    UndefinedOpcode,
    /// `#GP` — bad GDT selector, out-of-range CR3 write, far jump to a
    /// missing descriptor.
    #[error("general protection fault")]
    ProtectionFault,
    /// Unaligned access where alignment is architecturally required
    /// (`MOVDQA`), or an access past the end of guest memory.
    #[error("segmentation fault at {addr:#x}")]
    SegmentationFault { addr: u64 },
    /// `INT3`, `INT1`, `INT imm8`, `HLT` — halts the machine with the given
    /// vector; the host decides whether this is diagnostic or fatal.
    #[error("machine halted (vector {0:#x})")]
    MachineHalt(u8),
}

impl Exception {
    /// Shorthand used throughout handlers and tests for `#GP(0)`, the only
    /// error code this core ever raises for a protection fault.
    pub const fn gp0() -> Self {
        Exception::ProtectionFault
    }

    pub const fn segfault(addr: u64) -> Self {
        Exception::SegmentationFault { addr }
    }
}
