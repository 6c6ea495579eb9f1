//! Memory loader: one MemLoad request, end to end
//!
//! Every region is created read+write at exactly the requested address,
//! filled from the control channel, then switched to its final protection.

use pthaw_syscall::{syscalls, Errno, MAP_ANONYMOUS, MAP_FIXED, MAP_PRIVATE, PROT_READ, PROT_WRITE};

use crate::channel::{recv_exact, Channel};
use crate::error::{Fault, Transfer};
use crate::wire::{MemLoadRequest, Protection, RECORD_LEN};

/// Capacity of the staging buffer payload bytes pass through
pub const STREAM_BUFFER_LEN: usize = 512;

/// The address-space operations a restore needs
pub trait AddressSpace {
    /// Create a private anonymous read+write mapping at `address`.
    ///
    /// Returns where the mapping actually landed; the caller rejects
    /// anything other than `address`.
    fn map_fixed(&mut self, address: usize, length: usize) -> Result<usize, Errno>;

    /// Copy `bytes` to `address`.
    ///
    /// # Safety
    ///
    /// `[address, address + bytes.len())` must lie inside a writable mapping
    /// previously created by [`AddressSpace::map_fixed`] on this address space.
    unsafe fn fill(&mut self, address: usize, bytes: &[u8]);

    /// Set the protection of `[address, address + length)` to exactly `protection`.
    fn protect(&mut self, address: usize, length: usize, protection: Protection)
        -> Result<(), Errno>;
}

/// The calling process's own address space
#[derive(Debug)]
pub struct KernelAddressSpace {
    _private: (),
}

impl KernelAddressSpace {
    /// # Safety
    ///
    /// Fixed mappings silently replace whatever was mapped before, including
    /// this program's code, stack and data. The caller must be a process whose
    /// address space is given over to whoever chooses the addresses.
    pub unsafe fn new() -> Self {
        KernelAddressSpace { _private: () }
    }
}

impl AddressSpace for KernelAddressSpace {
    fn map_fixed(&mut self, address: usize, length: usize) -> Result<usize, Errno> {
        unsafe {
            syscalls::mmap(
                address,
                length,
                PROT_READ | PROT_WRITE,
                MAP_PRIVATE | MAP_ANONYMOUS | MAP_FIXED,
                -1,
                0,
            )
        }
    }

    unsafe fn fill(&mut self, address: usize, bytes: &[u8]) {
        core::ptr::copy_nonoverlapping(bytes.as_ptr(), address as *mut u8, bytes.len());
    }

    fn protect(
        &mut self,
        address: usize,
        length: usize,
        protection: Protection,
    ) -> Result<(), Errno> {
        let prot = protection.to_prot().ok_or(Errno(Errno::EINVAL))?;
        unsafe { syscalls::mprotect(address, length, prot) }
    }
}

/// Execute one MemLoad request whose opcode has already been read.
///
/// Reads the 24-byte record, maps the region, streams `length` payload bytes
/// into it and applies the final protection. Protection is left alone only
/// when the request asks for exactly read+write.
pub fn load_region<C, M>(channel: &mut C, memory: &mut M) -> Result<MemLoadRequest, Fault>
where
    C: Channel + ?Sized,
    M: AddressSpace + ?Sized,
{
    let mut record = [0u8; RECORD_LEN];
    recv_exact(channel, &mut record, Transfer::Record)?;
    let request = MemLoadRequest::from_bytes(&record);

    let (address, length) = request.span().ok_or(Fault::Unaddressable {
        address: request.address,
        length: request.length,
    })?;

    let landed = memory
        .map_fixed(address, length)
        .map_err(|errno| Fault::Map {
            address: request.address,
            length: request.length,
            errno,
        })?;
    if landed != address {
        return Err(Fault::Relocated {
            address: request.address,
            landed,
        });
    }

    stream_contents(channel, memory, address, length)?;

    if request.protection != Protection::READ_WRITE {
        memory
            .protect(address, length, request.protection)
            .map_err(|errno| Fault::Protect {
                address: request.address,
                protection: request.protection,
                errno,
            })?;
    }

    Ok(request)
}

fn stream_contents<C, M>(
    channel: &mut C,
    memory: &mut M,
    address: usize,
    length: usize,
) -> Result<(), Fault>
where
    C: Channel + ?Sized,
    M: AddressSpace + ?Sized,
{
    let mut buf = [0u8; STREAM_BUFFER_LEN];
    let mut offset = 0;

    while offset < length {
        let chunk = &mut buf[..(length - offset).min(STREAM_BUFFER_LEN)];
        recv_exact(channel, chunk, Transfer::Payload)?;
        // SAFETY: [address, address + length) was just mapped read+write
        unsafe { memory.fill(address + offset, chunk) };
        offset += chunk.len();
    }

    Ok(())
}
