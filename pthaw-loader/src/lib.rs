//! Thaw loader core
//!
//! Everything the `ploader` executable does between process start and the
//! handoff to the supervisor: the lockstep opcode protocol, fixed-address
//! memory restoration and failure reporting. No allocator and no std; the
//! only way out to the kernel is `pthaw-syscall`.
//!
//! The engine is generic over [`Channel`] and [`AddressSpace`] so the same
//! code runs against descriptors 3/4 and real mappings in the loader, and
//! against in-memory mocks in tests.

#![cfg_attr(not(test), no_std)]

pub mod channel;
pub mod diag;
pub mod error;
pub mod memory;
pub mod protocol;
pub mod wire;

#[cfg(test)]
mod testing;

pub use channel::{Channel, FdChannel};
pub use error::{Fault, Transfer};
pub use memory::{load_region, AddressSpace, KernelAddressSpace, STREAM_BUFFER_LEN};
pub use protocol::{transition, Action, Engine, Outcome, State, Transition};
pub use wire::{Ack, MemLoadRequest, OpCode, Protection, INBOUND_FD, OUTBOUND_FD, RECORD_LEN};

/// Exit status after an Abort.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit status after any fault.
pub const EXIT_FAILURE: i32 = 1;
