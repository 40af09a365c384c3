use aero_x86::Register;
use bitflags::bitflags;

bitflags! {
    /// The flags word (spec.md §3), using the real EFLAGS bit positions so
    /// `PUSHF`/`POPF`/`LAHF`/`SAHF` round-trip against the architectural
    /// image byte-for-byte (spec.md §8 invariant 7, §6 "PUSHF image").
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Flags: u32 {
        const CF = 1 << 0;
        /// Always reads as 1 on real hardware; forged in by [`Flags::export`],
        /// never stored.
        const RESERVED1 = 1 << 1;
        const PF = 1 << 2;
        const AF = 1 << 4;
        const ZF = 1 << 6;
        const SF = 1 << 7;
        const TF = 1 << 8;
        const IF = 1 << 9;
        const DF = 1 << 10;
        const OF = 1 << 11;
    }
}

/// Bits that come back from hardware forged to fixed values and are never
/// genuinely stored/imported: bit 1 (always 1), bits 3 and 5 (always 0).
/// See spec.md §3's invariant on reserved flag bits.
const FLAGS_FORGED_ONE: u32 = 1 << 1;
const FLAGS_STORABLE_MASK: u32 = Flags::all().bits();

impl Flags {
    /// `ExportFlags`: the value a `PUSHF`/`LAHF` publishes to the guest —
    /// stored bits plus the always-1 reserved bit.
    pub fn export(self) -> u32 {
        self.bits() | FLAGS_FORGED_ONE
    }

    /// `ImportFlags`: keep only the bits this core actually tracks;
    /// reserved/unknown bits in `raw` are silently dropped rather than
    /// stored (spec.md §3: reserved bits are "never forged into ones").
    pub fn import(raw: u32) -> Self {
        Flags::from_bits_truncate(raw & FLAGS_STORABLE_MASK)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuMode {
    Real,
    Legacy32,
    Long64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SegmentCell {
    /// A resolved base address, not a raw selector (spec.md §3).
    pub base: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Segments {
    pub es: SegmentCell,
    pub cs: SegmentCell,
    pub ss: SegmentCell,
    pub ds: SegmentCell,
    pub fs: SegmentCell,
    pub gs: SegmentCell,
}

impl Segments {
    pub fn get(&self, seg: aero_x86::Segment) -> SegmentCell {
        match seg {
            aero_x86::Segment::Es => self.es,
            aero_x86::Segment::Cs => self.cs,
            aero_x86::Segment::Ss => self.ss,
            aero_x86::Segment::Ds => self.ds,
            aero_x86::Segment::Fs => self.fs,
            aero_x86::Segment::Gs => self.gs,
        }
    }

    pub fn get_mut(&mut self, seg: aero_x86::Segment) -> &mut SegmentCell {
        match seg {
            aero_x86::Segment::Es => &mut self.es,
            aero_x86::Segment::Cs => &mut self.cs,
            aero_x86::Segment::Ss => &mut self.ss,
            aero_x86::Segment::Ds => &mut self.ds,
            aero_x86::Segment::Fs => &mut self.fs,
            aero_x86::Segment::Gs => &mut self.gs,
        }
    }
}

/// x87 FPU state block (spec.md §3, §6 FXSAVE layout). `st` is kept as raw
/// 16-byte slots (8 used, 8 padding) rather than a floating-point type so
/// FXSAVE/FXRSTOR can treat it as a flat byte copy — see SPEC_FULL.md §2 on
/// the ST(i) area.
#[derive(Debug, Clone, Copy)]
pub struct X87State {
    pub cw: u16,
    pub sw: u16,
    /// A single tag byte, not eight two-bit per-register tags: this core
    /// only needs to model `EMMS` resetting "everything empty"
    /// (spec.md §4.7), not individual tag transitions.
    pub tw: u8,
    pub op: u16,
    pub ip: u32,
    pub st: [[u8; 16]; 8],
}

impl Default for X87State {
    fn default() -> Self {
        Self {
            cw: 0x037F,
            sw: 0,
            tw: 0xFF,
            op: 0,
            ip: 0,
            st: [[0; 16]; 8],
        }
    }
}

/// The pending single-write stash (spec.md §3 "Stash", §9 "Pending-stash
/// write-back"). Non-empty only while a handler (currently just
/// `MASKMOVDQU`/`MASKMOVQ`) is building up a partially-masked store; the
/// dispatcher commits it to the bus after the handler returns and clears it
/// (spec.md §8 invariant 8).
#[derive(Debug, Clone, Copy, Default)]
pub struct OpCache {
    addr: u64,
    len: u8,
    buf: [u8; 16],
}

impl OpCache {
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn stash_addr(&self) -> u64 {
        self.addr
    }

    pub fn begin(&mut self, addr: u64, snapshot: &[u8]) {
        debug_assert!(snapshot.len() <= self.buf.len());
        self.addr = addr;
        self.len = snapshot.len() as u8;
        self.buf[..snapshot.len()].copy_from_slice(snapshot);
    }

    pub fn set_byte(&mut self, index: usize, value: u8) {
        debug_assert!(index < self.len as usize);
        self.buf[index] = value;
    }

    pub fn take(&mut self) -> Option<(u64, [u8; 16], usize)> {
        if self.len == 0 {
            return None;
        }
        let out = (self.addr, self.buf, self.len as usize);
        self.len = 0;
        self.addr = 0;
        Some(out)
    }
}

/// The CR0 protection-enable bit (spec.md §4.3 `IsProtectedMode`).
pub const CR0_PE: u64 = 1 << 0;
/// `CR4.OSFXSR` — OS support for FXSAVE/FXRSTOR; gates SSE availability in
/// the fuller machine this core is a slice of. Exposed for tests that want
/// to flip it explicitly.
pub const CR4_OSFXSR: u64 = 1 << 9;

/// The full guest CPU register state (spec.md §3 "Machine state"), minus
/// the control-register/GDT/hook fields that live on [`crate::System`] and
/// the memory that lives behind a [`crate::CpuBus`].
#[derive(Debug, Clone)]
pub struct CpuState {
    gpr: [u64; Register::COUNT],
    pub flags: Flags,
    ip: u64,
    pub segments: Segments,
    pub mmx: [u64; 8],
    pub sse: SseState,
    pub x87: X87State,
    pub mxcsr: u32,
    pub mode: CpuMode,
    /// `[start, end)` IP window set by the `0F 1F /5` debug-hook NOP
    /// encoding (spec.md §4.4 `OpNopEv`). Zero/zero when unset.
    pub bofram: [u64; 2],
    pub op_cache: OpCache,
}

#[derive(Debug, Clone, Copy)]
pub struct SseState {
    pub xmm: [u128; 16],
}

impl Default for SseState {
    fn default() -> Self {
        Self { xmm: [0; 16] }
    }
}

impl CpuState {
    pub fn new(mode: CpuMode) -> Self {
        Self {
            gpr: [0; Register::COUNT],
            flags: Flags::empty(),
            ip: 0,
            segments: Segments::default(),
            mmx: [0; 8],
            sse: SseState::default(),
            x87: X87State::default(),
            mxcsr: 0x1F80,
            mode,
            bofram: [0, 0],
            op_cache: OpCache::default(),
        }
    }

    pub fn rip(&self) -> u64 {
        self.ip
    }

    pub fn set_rip(&mut self, ip: u64) {
        self.ip = ip;
    }

    /// Raw full-width register accessors. Width-polymorphic access for
    /// handlers goes through `crate::operand`, which derives the width from
    /// the instruction's [`aero_x86::Rde`] rather than assuming 64 bits.
    pub fn read_reg(&self, reg: Register) -> u64 {
        self.gpr[reg.index()]
    }

    pub fn write_reg(&mut self, reg: Register, value: u64) {
        self.gpr[reg.index()] = value;
    }

    pub fn gpr_cell(&self, reg: Register) -> u64 {
        self.gpr[reg.index()]
    }

    pub fn gpr_cell_mut(&mut self, reg: Register) -> &mut u64 {
        &mut self.gpr[reg.index()]
    }
}
