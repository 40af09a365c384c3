//! The interpreter's opcode-semantics modules (spec.md §4): scalar (C4),
//! vector (C5), and ancillary control (C7). `crate::dispatch` is the layer
//! above these that routes a [`aero_x86::DecodedInsn`] to the right
//! function in one of them.

pub mod control;
pub mod scalar;
pub mod vector;
