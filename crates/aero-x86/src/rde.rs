use bitflags::bitflags;

bitflags! {
    /// The single-bit fields packed into the decoded instruction's `rde`
    /// word (spec.md §3, §9 "Packed decode field"). Kept private to the
    /// crate; `Rde`'s public methods are the only way handlers observe
    /// these bits, per the REDESIGN FLAGS guidance to keep the bit layout
    /// opaque to callers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct RdeFlags: u16 {
        const REX_W = 1 << 0;
        const REX_R = 1 << 1;
        const REX_X = 1 << 2;
        const REX_B = 1 << 3;
        const OSZ   = 1 << 4;
        const ASZ   = 1 << 5;
        const LOCK  = 1 << 6;
        const HAS_MODRM = 1 << 7;
        const HAS_SIB   = 1 << 8;
        /// A REX prefix byte was present, even if every REX bit is 0. This
        /// changes 8-bit register decoding: without it, ModR/M indices 4-7
        /// name AH/CH/DH/BH; with it, they name SPL/BPL/SIL/DIL.
        const HAS_REX   = 1 << 9;
    }
}

/// Opaque packed decode field: REX bits, the operand-size and address-size
/// override prefixes, and the ModR/M sub-fields, as produced by the
/// (out-of-scope) decoder and consumed by the operand accessors and opcode
/// handlers. See spec.md §9 ("Packed decode field"): callers never match on
/// the bit layout directly, only through the named accessors below.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rde {
    flags: RdeFlags,
    modrm_mod: u8,
    modrm_reg: u8,
    modrm_rm: u8,
}

impl Rde {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        rex_w: bool,
        rex_r: bool,
        rex_x: bool,
        rex_b: bool,
        osz: bool,
        asz: bool,
        lock: bool,
        modrm_mod: u8,
        modrm_reg: u8,
        modrm_rm: u8,
    ) -> Self {
        let mut flags = RdeFlags::empty();
        flags.set(RdeFlags::REX_W, rex_w);
        flags.set(RdeFlags::REX_R, rex_r);
        flags.set(RdeFlags::REX_X, rex_x);
        flags.set(RdeFlags::REX_B, rex_b);
        flags.set(RdeFlags::OSZ, osz);
        flags.set(RdeFlags::ASZ, asz);
        flags.set(RdeFlags::LOCK, lock);
        flags.set(RdeFlags::HAS_MODRM, true);
        Self {
            flags,
            modrm_mod: modrm_mod & 0b11,
            modrm_reg: modrm_reg & 0b111,
            modrm_rm: modrm_rm & 0b111,
        }
    }

    /// A `Rde` with every bit cleared and a register-form (mod=3) ModR/M,
    /// handy as a base for tests that only care about one or two fields.
    pub const fn zero() -> Self {
        Self {
            flags: RdeFlags::empty(),
            modrm_mod: 0b11,
            modrm_reg: 0,
            modrm_rm: 0,
        }
    }

    pub fn with_rex_w(mut self, on: bool) -> Self {
        self.flags.set(RdeFlags::REX_W, on);
        self.flags.set(RdeFlags::HAS_REX, on || self.has_rex_prefix());
        self
    }
    pub fn with_rex_r(mut self, on: bool) -> Self {
        self.flags.set(RdeFlags::REX_R, on);
        self.flags.set(RdeFlags::HAS_REX, on || self.has_rex_prefix());
        self
    }
    pub fn with_rex_x(mut self, on: bool) -> Self {
        self.flags.set(RdeFlags::REX_X, on);
        self.flags.set(RdeFlags::HAS_REX, on || self.has_rex_prefix());
        self
    }
    pub fn with_rex_b(mut self, on: bool) -> Self {
        self.flags.set(RdeFlags::REX_B, on);
        self.flags.set(RdeFlags::HAS_REX, on || self.has_rex_prefix());
        self
    }
    pub fn with_osz(mut self, on: bool) -> Self {
        self.flags.set(RdeFlags::OSZ, on);
        self
    }
    pub fn with_asz(mut self, on: bool) -> Self {
        self.flags.set(RdeFlags::ASZ, on);
        self
    }
    pub fn with_lock(mut self, on: bool) -> Self {
        self.flags.set(RdeFlags::LOCK, on);
        self
    }
    pub fn with_rex_prefix(mut self, on: bool) -> Self {
        self.flags.set(RdeFlags::HAS_REX, on);
        self
    }
    pub fn with_modrm(mut self, modrm_mod: u8, modrm_reg: u8, modrm_rm: u8) -> Self {
        self.modrm_mod = modrm_mod & 0b11;
        self.modrm_reg = modrm_reg & 0b111;
        self.modrm_rm = modrm_rm & 0b111;
        self
    }

    pub fn rex_w(&self) -> bool {
        self.flags.contains(RdeFlags::REX_W)
    }
    pub fn rex_r(&self) -> bool {
        self.flags.contains(RdeFlags::REX_R)
    }
    pub fn rex_x(&self) -> bool {
        self.flags.contains(RdeFlags::REX_X)
    }
    pub fn rex_b(&self) -> bool {
        self.flags.contains(RdeFlags::REX_B)
    }
    pub fn osz(&self) -> bool {
        self.flags.contains(RdeFlags::OSZ)
    }
    pub fn asz(&self) -> bool {
        self.flags.contains(RdeFlags::ASZ)
    }
    pub fn lock(&self) -> bool {
        self.flags.contains(RdeFlags::LOCK)
    }
    pub fn has_rex_prefix(&self) -> bool {
        self.flags.contains(RdeFlags::HAS_REX)
    }

    pub fn modrm_mod(&self) -> u8 {
        self.modrm_mod
    }
    pub fn modrm_reg(&self) -> u8 {
        self.modrm_reg
    }
    pub fn modrm_rm(&self) -> u8 {
        self.modrm_rm
    }

    /// `mod == 0b11`: both ModR/M operands name registers, no memory access.
    pub fn is_modrm_register(&self) -> bool {
        self.modrm_mod == 0b11
    }

    /// Register index for the ModR/M `reg` field, folding in `REX.R`.
    pub fn reg_rexr(&self) -> u8 {
        self.modrm_reg | ((self.rex_r() as u8) << 3)
    }

    /// Register index for the ModR/M `rm` field (register form), folding in
    /// `REX.B`.
    pub fn rm_rexb(&self) -> u8 {
        self.modrm_rm | ((self.rex_b() as u8) << 3)
    }

    /// Width in bits selected by REX.W / OSZ, per spec.md §4.1's priority
    /// order: REX.W wins, then OSZ, else the default (32-bit in long/legacy
    /// mode). Callers in real-address-size contexts pass `default_width`
    /// explicitly (see [`Width::operand`]).
    pub fn operand_width(&self, default_width: Width) -> Width {
        if self.rex_w() {
            Width::W64
        } else if self.osz() {
            Width::W16
        } else {
            default_width
        }
    }
}

/// A tagged operand width, replacing the run-time branching of spec.md
/// §4.1/§9 with an explicit descriptor that accessors match on once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Width {
    W8 = 8,
    W16 = 16,
    W32 = 32,
    W64 = 64,
}

impl Width {
    pub const fn bits(self) -> u32 {
        self as u32
    }

    pub const fn bytes(self) -> usize {
        (self as usize) / 8
    }

    /// The default non-REX.W, non-OSZ operand width: 32 bits everywhere
    /// except 16-bit real mode, where callers pass [`Width::W16`] directly.
    pub const fn default_long_legacy() -> Self {
        Width::W32
    }
}
