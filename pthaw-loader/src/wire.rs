//! Wire format shared by the loader and its supervisor

use core::fmt;
use core::ops::BitOr;

/// Descriptor the supervisor writes opcodes and payloads into.
pub const INBOUND_FD: i32 = 3;
/// Descriptor the loader writes acknowledgements to.
pub const OUTBOUND_FD: i32 = 4;

/// Size of a MemLoad record: address, length, protection as native u64s.
pub const RECORD_LEN: usize = 24;

/// Request sent by the supervisor, one byte on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Start = 65,
    MemLoad = 66,
    Exec = 67,
    Abort = 68,
}

impl OpCode {
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            65 => Some(OpCode::Start),
            66 => Some(OpCode::MemLoad),
            67 => Some(OpCode::Exec),
            68 => Some(OpCode::Abort),
            _ => None,
        }
    }

    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}({})", self, self.as_byte())
    }
}

/// Acknowledgement sent back by the loader, one byte on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Ack {
    Started = 97,
    MemLoaded = 98,
    Executing = 99,
    Aborting = 100,
    Fail = 101,
}

impl Ack {
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            97 => Some(Ack::Started),
            98 => Some(Ack::MemLoaded),
            99 => Some(Ack::Executing),
            100 => Some(Ack::Aborting),
            101 => Some(Ack::Fail),
            _ => None,
        }
    }

    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Ack {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?}({})", self, self.as_byte())
    }
}

/// Memory protection bits, as passed to mmap/mprotect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Protection(u64);

impl Protection {
    pub const NONE: Protection = Protection(0);
    pub const READ: Protection = Protection(pthaw_syscall::PROT_READ as u64);
    pub const WRITE: Protection = Protection(pthaw_syscall::PROT_WRITE as u64);
    pub const EXEC: Protection = Protection(pthaw_syscall::PROT_EXEC as u64);
    pub const READ_WRITE: Protection = Protection(Self::READ.0 | Self::WRITE.0);

    pub const fn from_bits(bits: u64) -> Self {
        Protection(bits)
    }

    pub const fn bits(self) -> u64 {
        self.0
    }

    pub const fn contains(self, other: Protection) -> bool {
        self.0 & other.0 == other.0
    }

    /// Bits in the form mprotect takes them, if they fit
    pub fn to_prot(self) -> Option<i32> {
        i32::try_from(self.0).ok()
    }
}

impl BitOr for Protection {
    type Output = Protection;

    fn bitor(self, rhs: Protection) -> Protection {
        Protection(self.0 | rhs.0)
    }
}

/// Renders like the permission column of /proc/<pid>/maps
impl fmt::Display for Protection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let flag = |p: Protection, c: char| if self.contains(p) { c } else { '-' };
        write!(
            f,
            "{}{}{}",
            flag(Protection::READ, 'r'),
            flag(Protection::WRITE, 'w'),
            flag(Protection::EXEC, 'x')
        )?;
        let unknown = self.0 & !(Protection::READ_WRITE | Protection::EXEC).0;
        if unknown != 0 {
            write!(f, "+{:#x}", unknown)?;
        }
        Ok(())
    }
}

/// Header of a MemLoad request; `length` payload bytes follow it on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemLoadRequest {
    pub address: u64,
    pub length: u64,
    pub protection: Protection,
}

impl MemLoadRequest {
    pub fn from_bytes(record: &[u8; RECORD_LEN]) -> Self {
        let word = |i: usize| {
            let mut w = [0u8; 8];
            w.copy_from_slice(&record[i * 8..(i + 1) * 8]);
            u64::from_ne_bytes(w)
        };
        MemLoadRequest {
            address: word(0),
            length: word(1),
            protection: Protection(word(2)),
        }
    }

    pub fn to_bytes(&self) -> [u8; RECORD_LEN] {
        let mut record = [0u8; RECORD_LEN];
        record[0..8].copy_from_slice(&self.address.to_ne_bytes());
        record[8..16].copy_from_slice(&self.length.to_ne_bytes());
        record[16..24].copy_from_slice(&self.protection.0.to_ne_bytes());
        record
    }

    /// Address and length as native sizes, if the whole range is addressable
    pub fn span(&self) -> Option<(usize, usize)> {
        let address = usize::try_from(self.address).ok()?;
        let length = usize::try_from(self.length).ok()?;
        address.checked_add(length)?;
        Some((address, length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_values() {
        assert_eq!(OpCode::from_byte(65), Some(OpCode::Start));
        assert_eq!(OpCode::from_byte(66), Some(OpCode::MemLoad));
        assert_eq!(OpCode::from_byte(67), Some(OpCode::Exec));
        assert_eq!(OpCode::from_byte(68), Some(OpCode::Abort));
        assert_eq!(OpCode::from_byte(0), None);
        assert_eq!(OpCode::from_byte(97), None);
    }

    #[test]
    fn test_ack_values() {
        assert_eq!(Ack::Started.as_byte(), 97);
        assert_eq!(Ack::MemLoaded.as_byte(), 98);
        assert_eq!(Ack::Executing.as_byte(), 99);
        assert_eq!(Ack::Aborting.as_byte(), 100);
        assert_eq!(Ack::Fail.as_byte(), 101);
        assert_eq!(Ack::from_byte(65), None);
    }

    #[test]
    fn test_record_layout() {
        let request = MemLoadRequest {
            address: 0x500000,
            length: 4,
            protection: Protection::READ_WRITE,
        };
        let record = request.to_bytes();
        assert_eq!(&record[0..8], &0x500000u64.to_ne_bytes());
        assert_eq!(&record[8..16], &4u64.to_ne_bytes());
        assert_eq!(&record[16..24], &3u64.to_ne_bytes());
        assert_eq!(MemLoadRequest::from_bytes(&record), request);
    }

    #[test]
    fn test_span_rejects_wrapping_ranges() {
        let request = MemLoadRequest {
            address: u64::MAX - 10,
            length: 100,
            protection: Protection::READ,
        };
        assert_eq!(request.span(), None);
    }

    #[test]
    fn test_protection_display() {
        assert_eq!(Protection::READ_WRITE.to_string(), "rw-");
        assert_eq!((Protection::READ | Protection::EXEC).to_string(), "r-x");
        assert_eq!(Protection::NONE.to_string(), "---");
        assert_eq!(Protection::from_bits(0x9).to_string(), "r--+0x8");
    }
}
