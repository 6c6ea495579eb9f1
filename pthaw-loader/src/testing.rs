//! In-memory stand-ins for the control channel and the address space

use pthaw_syscall::Errno;

use crate::channel::Channel;
use crate::memory::AddressSpace;
use crate::wire::{MemLoadRequest, OpCode, Protection};

const EPIPE: i32 = 32;

/// Inbound bytes fixed up front; outbound acks recorded
pub struct ScriptedChannel {
    input: Vec<u8>,
    pos: usize,
    max_read: usize,
    reads: usize,
    acks: Vec<u8>,
    outbound_broken: bool,
}

impl ScriptedChannel {
    pub fn new(input: &[u8]) -> Self {
        ScriptedChannel {
            input: input.to_vec(),
            pos: 0,
            max_read: usize::MAX,
            reads: 0,
            acks: Vec::new(),
            outbound_broken: false,
        }
    }

    /// Deliver at most `n` bytes per read, like a pipe the writer feeds slowly.
    pub fn max_read(mut self, n: usize) -> Self {
        self.max_read = n;
        self
    }

    pub fn broken_outbound(mut self) -> Self {
        self.outbound_broken = true;
        self
    }

    pub fn acks(&self) -> &[u8] {
        &self.acks
    }

    pub fn consumed(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.input.len() - self.pos
    }

    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl Channel for ScriptedChannel {
    fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Errno> {
        self.reads += 1;
        let n = buf.len().min(self.remaining()).min(self.max_read);
        buf[..n].copy_from_slice(&self.input[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn send(&mut self, buf: &[u8]) -> Result<usize, Errno> {
        if self.outbound_broken {
            return Err(Errno(EPIPE));
        }
        self.acks.extend_from_slice(buf);
        Ok(buf.len())
    }
}

#[derive(Debug)]
pub struct MockRegion {
    pub address: usize,
    pub bytes: Vec<u8>,
    pub protection: Protection,
    pub protect_calls: usize,
}

/// Address space that keeps every mapping as a byte vector
#[derive(Debug, Default)]
pub struct MockMemory {
    pub regions: Vec<MockRegion>,
    /// Report mappings as landing here instead of at the requested address
    pub relocate_to: Option<usize>,
    pub reject_map: bool,
}

impl MockMemory {
    pub fn region(&self, address: usize) -> Option<&MockRegion> {
        self.regions.iter().find(|r| r.address == address)
    }

    fn containing(&mut self, address: usize, len: usize) -> &mut MockRegion {
        self.regions
            .iter_mut()
            .find(|r| r.address <= address && address + len <= r.address + r.bytes.len())
            .expect("access outside any mapping")
    }
}

impl AddressSpace for MockMemory {
    fn map_fixed(&mut self, address: usize, length: usize) -> Result<usize, Errno> {
        if length == 0 {
            return Err(Errno(Errno::EINVAL));
        }
        if self.reject_map {
            return Err(Errno(Errno::ENOMEM));
        }
        self.regions.push(MockRegion {
            address,
            bytes: vec![0; length],
            protection: Protection::READ_WRITE,
            protect_calls: 0,
        });
        Ok(self.relocate_to.unwrap_or(address))
    }

    unsafe fn fill(&mut self, address: usize, bytes: &[u8]) {
        let region = self.containing(address, bytes.len());
        assert!(region.protection.contains(Protection::WRITE));
        let offset = address - region.address;
        region.bytes[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    fn protect(
        &mut self,
        address: usize,
        length: usize,
        protection: Protection,
    ) -> Result<(), Errno> {
        let known = (Protection::READ_WRITE | Protection::EXEC).bits();
        if protection.bits() & !known != 0 {
            return Err(Errno(Errno::EINVAL));
        }
        let region = self.containing(address, length);
        region.protection = protection;
        region.protect_calls += 1;
        Ok(())
    }
}

/// A complete MemLoad on the wire: opcode, record, payload
pub fn memload_stream(address: u64, protection: Protection, contents: &[u8]) -> Vec<u8> {
    let request = MemLoadRequest {
        address,
        length: contents.len() as u64,
        protection,
    };
    let mut stream = vec![OpCode::MemLoad.as_byte()];
    stream.extend_from_slice(&request.to_bytes());
    stream.extend_from_slice(contents);
    stream
}
