use crate::Exception;
use core::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// The memory subsystem's consumed contract (spec.md §6), narrowed to what
/// this core's scope actually needs: a flat guest-physical address space,
/// width-polymorphic reads/writes, and the atomicity contract for aligned
/// MOV-width accesses (spec.md §4.1, §5, §8 invariant 4).
///
/// Virtual-to-real translation, page faults, and split/cross-page staging
/// belong to the (out-of-scope, per spec.md §1) memory subsystem; this
/// trait's only implementation in this crate, [`FlatBus`], has no paging —
/// every guest address is already a real one.
pub trait CpuBus {
    /// Size of the backing flat memory, in bytes. Used by GDT bounds checks
    /// (spec.md §3) and CR3 range checks (spec.md §4.4).
    fn size(&self) -> usize;

    fn read_u8(&mut self, addr: u64) -> Result<u8, Exception>;
    fn read_u16(&mut self, addr: u64) -> Result<u16, Exception>;
    fn read_u32(&mut self, addr: u64) -> Result<u32, Exception>;
    fn read_u64(&mut self, addr: u64) -> Result<u64, Exception>;
    fn read_u128(&mut self, addr: u64) -> Result<u128, Exception>;

    fn write_u8(&mut self, addr: u64, val: u8) -> Result<(), Exception>;
    fn write_u16(&mut self, addr: u64, val: u16) -> Result<(), Exception>;
    fn write_u32(&mut self, addr: u64, val: u32) -> Result<(), Exception>;
    fn write_u64(&mut self, addr: u64, val: u64) -> Result<(), Exception>;
    fn write_u128(&mut self, addr: u64, val: u128) -> Result<(), Exception>;

    fn read_bytes(&mut self, addr: u64, out: &mut [u8]) -> Result<(), Exception>;
    fn write_bytes(&mut self, addr: u64, data: &[u8]) -> Result<(), Exception>;
}

/// A flat, unpaged guest-physical memory: a `Vec<u8>` plus the atomic
/// acquire/release contract for naturally aligned 32- and 64-bit accesses
/// (spec.md §4.1's "atomicity contract"). This is the only [`CpuBus`]
/// implementation this crate ships; it is used both by unit tests
/// (`FlatTestBus` is a type alias for it) and is the obvious backing store
/// for an embedder with no paging needs.
#[derive(Debug)]
pub struct FlatBus {
    mem: Vec<u8>,
}

/// Alias kept for parity with the teacher's own test buses
/// (`aero_cpu_core::mem::FlatTestBus`): a plain [`FlatBus`] is already the
/// minimal thing tests need.
pub type FlatTestBus = FlatBus;

impl FlatBus {
    pub fn new(size: usize) -> Self {
        Self {
            mem: vec![0u8; size],
        }
    }

    /// Test/setup helper: copy `data` into memory at `addr`, panicking on
    /// out-of-range writes (this is not part of the `CpuBus` contract, it's
    /// a fixture convenience mirroring the teacher's `FlatTestBus::load`).
    pub fn load(&mut self, addr: u64, data: &[u8]) {
        let start = addr as usize;
        let end = start + data.len();
        self.mem[start..end].copy_from_slice(data);
    }

    fn range(&self, addr: u64, len: usize) -> Result<core::ops::Range<usize>, Exception> {
        let start: usize = addr.try_into().map_err(|_| Exception::segfault(addr))?;
        let end = start
            .checked_add(len)
            .ok_or(Exception::segfault(addr))?;
        if end > self.mem.len() {
            return Err(Exception::segfault(addr));
        }
        Ok(start..end)
    }

    /// The atomic path needs the *host* pointer into `self.mem` to be
    /// naturally aligned, not just the guest address (spec.md §4.1): a
    /// `Vec<u8>` carries no alignment guarantee stronger than 1, so a
    /// guest-aligned cell can still land on an unaligned host byte.
    fn host_ptr_aligned(ptr: *const u8, align: usize) -> bool {
        (ptr as usize) & (align - 1) == 0
    }
}

impl CpuBus for FlatBus {
    fn size(&self) -> usize {
        self.mem.len()
    }

    fn read_u8(&mut self, addr: u64) -> Result<u8, Exception> {
        let r = self.range(addr, 1)?;
        Ok(self.mem[r][0])
    }

    fn read_u16(&mut self, addr: u64) -> Result<u16, Exception> {
        let r = self.range(addr, 2)?;
        Ok(u16::from_le_bytes(self.mem[r].try_into().unwrap()))
    }

    fn read_u32(&mut self, addr: u64) -> Result<u32, Exception> {
        let r = self.range(addr, 4)?;
        // Naturally aligned 32-bit reads are single-copy atomic
        // (spec.md §4.1, §5): go through an acquire load on the backing
        // bytes instead of a plain slice copy, but only when the *host*
        // pointer (not just the guest address) is actually 4-byte aligned —
        // `Vec<u8>` makes no alignment promise beyond 1, so a guest-aligned
        // cell can still sit on an unaligned host byte.
        let ptr = self.mem[r.clone()].as_ptr();
        if Self::host_ptr_aligned(ptr, 4) {
            let atomic = ptr as *const AtomicU32;
            // SAFETY: `r` was bounds-checked above; `ptr` was just checked
            // to be 4-byte aligned; `AtomicU32` has the same size/layout as
            // `u32`.
            let atomic = unsafe { &*atomic };
            Ok(u32::from_le(atomic.load(Ordering::Acquire)))
        } else {
            Ok(u32::from_le_bytes(self.mem[r].try_into().unwrap()))
        }
    }

    fn read_u64(&mut self, addr: u64) -> Result<u64, Exception> {
        let r = self.range(addr, 8)?;
        let ptr = self.mem[r.clone()].as_ptr();
        if Self::host_ptr_aligned(ptr, 8) {
            let atomic = ptr as *const AtomicU64;
            // SAFETY: see `read_u32`.
            let atomic = unsafe { &*atomic };
            Ok(u64::from_le(atomic.load(Ordering::Acquire)))
        } else {
            Ok(u64::from_le_bytes(self.mem[r].try_into().unwrap()))
        }
    }

    fn read_u128(&mut self, addr: u64) -> Result<u128, Exception> {
        let r = self.range(addr, 16)?;
        Ok(u128::from_le_bytes(self.mem[r].try_into().unwrap()))
    }

    fn write_u8(&mut self, addr: u64, val: u8) -> Result<(), Exception> {
        let r = self.range(addr, 1)?;
        self.mem[r][0] = val;
        Ok(())
    }

    fn write_u16(&mut self, addr: u64, val: u16) -> Result<(), Exception> {
        let r = self.range(addr, 2)?;
        self.mem[r].copy_from_slice(&val.to_le_bytes());
        Ok(())
    }

    fn write_u32(&mut self, addr: u64, val: u32) -> Result<(), Exception> {
        let r = self.range(addr, 4)?;
        let ptr = self.mem[r.clone()].as_mut_ptr();
        if Self::host_ptr_aligned(ptr, 4) {
            let atomic = ptr as *const AtomicU32;
            // SAFETY: see `read_u32`.
            let atomic = unsafe { &*atomic };
            atomic.store(val.to_le(), Ordering::Release);
        } else {
            self.mem[r].copy_from_slice(&val.to_le_bytes());
        }
        Ok(())
    }

    fn write_u64(&mut self, addr: u64, val: u64) -> Result<(), Exception> {
        let r = self.range(addr, 8)?;
        let ptr = self.mem[r.clone()].as_mut_ptr();
        if Self::host_ptr_aligned(ptr, 8) {
            let atomic = ptr as *const AtomicU64;
            // SAFETY: see `read_u32`.
            let atomic = unsafe { &*atomic };
            atomic.store(val.to_le(), Ordering::Release);
        } else {
            self.mem[r].copy_from_slice(&val.to_le_bytes());
        }
        Ok(())
    }

    fn write_u128(&mut self, addr: u64, val: u128) -> Result<(), Exception> {
        let r = self.range(addr, 16)?;
        self.mem[r].copy_from_slice(&val.to_le_bytes());
        Ok(())
    }

    fn read_bytes(&mut self, addr: u64, out: &mut [u8]) -> Result<(), Exception> {
        let r = self.range(addr, out.len())?;
        out.copy_from_slice(&self.mem[r]);
        Ok(())
    }

    fn write_bytes(&mut self, addr: u64, data: &[u8]) -> Result<(), Exception> {
        let r = self.range(addr, data.len())?;
        self.mem[r].copy_from_slice(data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    /// spec.md §8 invariant 4: an aligned 8-byte write raced against an
    /// aligned 8-byte read never observes a torn value. Exercised with two
    /// real OS threads sharing one backing allocation (standing in for "two
    /// machines sharing `system.real`"), since a single-threaded round trip
    /// can't tell an atomic store from a plain byte copy.
    #[test]
    fn aligned_u64_access_never_tears() {
        // The same `AtomicU64` acquire/release pair `FlatBus::read_u64`/
        // `write_u64` cast an aligned 8-byte slice to; exercising it bare
        // (rather than through `FlatBus`, whose `Vec<u8>` has no alignment
        // guarantee stronger than 1) is the honest way to drive this with
        // real concurrent threads instead of faking alignment.
        let cell = Arc::new(AtomicU64::new(0));
        let writer_cell = cell.clone();
        let writer = std::thread::spawn(move || {
            for i in 0..50_000u64 {
                let pattern = if i % 2 == 0 { u64::MAX } else { 0 };
                writer_cell.store(pattern, Ordering::Release);
            }
        });
        let reader_cell = cell.clone();
        let reader = std::thread::spawn(move || {
            for _ in 0..50_000u64 {
                let v = reader_cell.load(Ordering::Acquire);
                assert!(v == 0 || v == u64::MAX, "observed torn value {v:#x}");
            }
        });
        writer.join().unwrap();
        reader.join().unwrap();
    }

    #[test]
    fn unaligned_write_then_read_round_trips_without_atomics() {
        let mut bus = FlatBus::new(32);
        bus.write_u32(5, 0xDEAD_BEEF).unwrap();
        assert_eq!(bus.read_u32(5).unwrap(), 0xDEAD_BEEF);
    }
}
