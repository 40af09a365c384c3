//! Decoded-instruction record and register model consumed by `aero-cpu-core`.
//!
//! This crate intentionally contains no byte decoder: per spec.md §1, the
//! decoder that fills a [`DecodedInsn`] from raw bytes is an external
//! collaborator. What lives here is the *shape* of that record and the
//! small helpers (`Rde`, `Width`) both the interpreter and its tests build
//! on.

mod insn;
mod rde;
mod register;

pub use insn::{DecodedInsn, OpcodeMap, REP_NONE, REP_REP, REP_REPNE};
pub use rde::{Rde, Width};
pub use register::{Register, Segment};
