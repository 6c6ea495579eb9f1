//! Control channel: inbound opcodes and payloads, outbound acknowledgements

use pthaw_syscall::{syscalls, Errno};

use crate::error::{Fault, Transfer};
use crate::wire::{Ack, INBOUND_FD, OUTBOUND_FD};

/// One read or one write per call, with the kernel's byte count passed through.
pub trait Channel {
    /// Read once from the inbound side. Returns 0 at end of stream.
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Errno>;

    /// Write once to the outbound side.
    fn send(&mut self, buf: &[u8]) -> Result<usize, Errno>;
}

/// The pair of descriptors inherited from the supervisor
///
/// Never closed: both stay open until the process exits or is taken over.
#[derive(Debug, Clone, Copy)]
pub struct FdChannel {
    inbound: i32,
    outbound: i32,
}

impl FdChannel {
    pub const fn new(inbound: i32, outbound: i32) -> Self {
        FdChannel { inbound, outbound }
    }

    /// Descriptors 3 and 4, as installed by the supervisor before exec
    pub const fn supervisor() -> Self {
        Self::new(INBOUND_FD, OUTBOUND_FD)
    }
}

impl Channel for FdChannel {
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Errno> {
        unsafe { syscalls::read(self.inbound, buf.as_mut_ptr(), buf.len()) }
    }

    fn send(&mut self, buf: &[u8]) -> Result<usize, Errno> {
        unsafe { syscalls::write(self.outbound, buf.as_ptr(), buf.len()) }
    }
}

/// Fill `buf` with a single read. Anything less than `buf.len()` is a fault,
/// whether the stream ended or the kernel simply returned early.
pub fn recv_exact<C: Channel + ?Sized>(
    channel: &mut C,
    buf: &mut [u8],
    stage: Transfer,
) -> Result<(), Fault> {
    match channel.recv(buf) {
        Ok(n) if n == buf.len() => Ok(()),
        Ok(got) => Err(Fault::ShortTransfer {
            stage,
            wanted: buf.len(),
            got,
        }),
        Err(errno) => Err(Fault::Io { stage, errno }),
    }
}

pub fn send_ack<C: Channel + ?Sized>(channel: &mut C, ack: Ack) -> Result<(), Fault> {
    match channel.send(&[ack.as_byte()]) {
        Ok(1) => Ok(()),
        Ok(got) => Err(Fault::ShortTransfer {
            stage: Transfer::Ack,
            wanted: 1,
            got,
        }),
        Err(errno) => Err(Fault::Io {
            stage: Transfer::Ack,
            errno,
        }),
    }
}
