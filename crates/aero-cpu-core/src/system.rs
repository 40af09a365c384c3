use crate::io::IoBus;
use crate::state::CpuState;
use aero_x86::Width;

/// Control-register, GDT, and tooling-hook state shared by all vCPUs over
/// the same guest (spec.md §3 "Pointer to a system block"). The flat guest
/// memory itself is *not* stored here — it lives behind whatever
/// [`crate::CpuBus`] the embedder passes to [`crate::execute_instruction`]
/// — but `cr3`'s range check and the GDT bounds check both need to know its
/// size, so those checks take the bus as a parameter (see `crate::segment`
/// and `crate::interp::scalar::control`).
#[derive(Default)]
pub struct System {
    pub cr0: u64,
    pub cr2: u64,
    pub cr3: u64,
    pub cr4: u64,
    pub gdt_base: u64,
    pub gdt_limit: u64,
    /// Invoked after any far control transfer, mode change or not
    /// (spec.md §4.3 `OpJmpf`, §6 "Hooks called").
    pub on_long_branch: Option<Box<dyn FnMut(&mut CpuState)>>,
    /// Invoked by the `0F 1F /0` debug-hook NOP encodings (spec.md §4.4
    /// `OpNopEv`).
    pub on_bin_base: Option<Box<dyn FnMut(&mut CpuState)>>,
    /// `IN`/`OUT`'s port-space collaborator (spec.md §4.4 "I/O ports");
    /// `None` behaves like [`crate::io::NullIoBus`] — nothing is attached,
    /// reads float high and writes vanish.
    pub io: Option<Box<dyn IoBus>>,
}

impl System {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire_long_branch(&mut self, state: &mut CpuState) {
        if let Some(hook) = self.on_long_branch.as_mut() {
            hook(state);
        }
    }

    pub fn fire_bin_base(&mut self, state: &mut CpuState) {
        if let Some(hook) = self.on_bin_base.as_mut() {
            hook(state);
        }
    }

    pub fn io_read(&mut self, port: u16, width: Width) -> u64 {
        match self.io.as_mut() {
            Some(io) => io.read(port, width),
            None => {
                let mut fallback = crate::io::NullIoBus;
                fallback.read(port, width)
            }
        }
    }

    pub fn io_write(&mut self, port: u16, width: Width, value: u64) {
        if let Some(io) = self.io.as_mut() {
            io.write(port, width, value);
        }
    }
}

impl std::fmt::Debug for System {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("System")
            .field("cr0", &self.cr0)
            .field("cr2", &self.cr2)
            .field("cr3", &self.cr3)
            .field("cr4", &self.cr4)
            .field("gdt_base", &self.gdt_base)
            .field("gdt_limit", &self.gdt_limit)
            .field("on_long_branch", &self.on_long_branch.is_some())
            .field("on_bin_base", &self.on_bin_base.is_some())
            .field("io", &self.io.is_some())
            .finish()
    }
}
