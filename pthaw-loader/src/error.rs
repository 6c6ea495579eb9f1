//! Loader faults
//!
//! Every fault is fatal: the loader reports it on stderr and exits with
//! status 1. There is no recovery path.

use core::fmt;

use pthaw_syscall::Errno;
use thiserror::Error;

use crate::wire::Protection;
use crate::EXIT_FAILURE;

/// Which transfer on the control channel a fault happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    Opcode,
    Record,
    Payload,
    Ack,
}

impl fmt::Display for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Transfer::Opcode => "command code",
            Transfer::Record => "arguments for memory load",
            Transfer::Payload => "memory contents",
            Transfer::Ack => "response code",
        })
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    #[error("unknown opcode {0}, execution aborted")]
    UnknownOpcode(u8),

    #[error("could not transfer {stage}: {errno}")]
    Io { stage: Transfer, errno: Errno },

    #[error("short transfer of {stage}: wanted {wanted} bytes, got {got}")]
    ShortTransfer {
        stage: Transfer,
        wanted: usize,
        got: usize,
    },

    #[error("region at {address:#x} ({length} bytes) is not addressable")]
    Unaddressable { address: u64, length: u64 },

    #[error("failed to create mapping at {address:#x} ({length} bytes): {errno}")]
    Map {
        address: u64,
        length: u64,
        errno: Errno,
    },

    #[error("mapping requested at {address:#x} landed at {landed:#x}")]
    Relocated { address: u64, landed: usize },

    #[error("could not set protection {protection} on mapping at {address:#x}: {errno}")]
    Protect {
        address: u64,
        protection: Protection,
        errno: Errno,
    },
}

impl Fault {
    pub const fn exit_code(&self) -> i32 {
        EXIT_FAILURE
    }
}
