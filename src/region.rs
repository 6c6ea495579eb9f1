//! Memory regions to replay into the loader

use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use pthaw_loader::{MemLoadRequest, Protection};

use crate::error::{Result, ThawError};

/// Start of the legacy vsyscall page. The kernel provides it in every
/// process and refuses to let it be mapped over, so it is never replayed.
pub const VSYSCALL_ADDR: u64 = 0xffff_ffff_ff60_0000;

/// One captured region: where it lived, how it was protected, what it held
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub address: u64,
    pub protection: Protection,
    pub contents: Vec<u8>,
}

impl Region {
    pub fn new(address: u64, protection: Protection, contents: Vec<u8>) -> Self {
        Region {
            address,
            protection,
            contents,
        }
    }

    pub fn request(&self) -> MemLoadRequest {
        MemLoadRequest {
            address: self.address,
            length: self.contents.len() as u64,
            protection: self.protection,
        }
    }

    pub fn is_vsyscall(&self) -> bool {
        self.address == VSYSCALL_ADDR
    }
}

/// Parse a permission column as found in /proc/<pid>/maps: `rwx` with `-`
/// for absent bits, optionally followed by `p` or `s`, which is ignored.
pub fn parse_perms(perms: &str) -> Result<Protection> {
    let invalid = |reason: String| ThawError::InvalidRegion {
        spec: perms.to_string(),
        reason,
    };

    let bytes = perms.as_bytes();
    if bytes.len() != 3 && bytes.len() != 4 {
        return Err(invalid(format!(
            "permissions must have 3 or 4 entries, found {}",
            bytes.len()
        )));
    }

    let mut protection = Protection::NONE;
    for (i, (set, bit)) in [
        (b'r', Protection::READ),
        (b'w', Protection::WRITE),
        (b'x', Protection::EXEC),
    ]
    .into_iter()
    .enumerate()
    {
        match bytes[i] {
            b'-' => {}
            c if c == set => protection = protection | bit,
            c => {
                return Err(invalid(format!(
                    "invalid value {:?} at position {}",
                    c as char, i
                )))
            }
        }
    }

    if let Some(&c) = bytes.get(3) {
        if c != b'p' && c != b's' {
            return Err(invalid(format!(
                "invalid private/shared flag {:?}",
                c as char
            )));
        }
    }

    Ok(protection)
}

fn parse_address(addr: &str) -> std::result::Result<u64, std::num::ParseIntError> {
    match addr.strip_prefix("0x").or_else(|| addr.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => addr.parse(),
    }
}

/// `ADDR:PERMS:FILE` as given on the command line, e.g. `0x500000:rw-p:heap.bin`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionSpec {
    pub address: u64,
    pub protection: Protection,
    pub path: PathBuf,
}

impl RegionSpec {
    /// Read the region's contents from its file.
    pub fn load(&self) -> Result<Region> {
        let contents = fs::read(&self.path).map_err(|e| ThawError::InvalidRegion {
            spec: self.path.display().to_string(),
            reason: format!("could not read contents: {}", e),
        })?;
        Ok(Region::new(self.address, self.protection, contents))
    }
}

impl FromStr for RegionSpec {
    type Err = ThawError;

    fn from_str(spec: &str) -> Result<Self> {
        let invalid = |reason: String| ThawError::InvalidRegion {
            spec: spec.to_string(),
            reason,
        };

        let mut parts = spec.splitn(3, ':');
        let (Some(addr), Some(perms), Some(path)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(invalid("expected ADDR:PERMS:FILE".to_string()));
        };
        if path.is_empty() {
            return Err(invalid("missing file".to_string()));
        }

        let address = parse_address(addr).map_err(|e| invalid(format!("bad address: {}", e)))?;
        let protection = parse_perms(perms)?;

        Ok(RegionSpec {
            address,
            protection,
            path: PathBuf::from(path),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_perms() {
        assert_eq!(parse_perms("rw-").unwrap(), Protection::READ_WRITE);
        assert_eq!(parse_perms("r-xp").unwrap(), Protection::READ | Protection::EXEC);
        assert_eq!(parse_perms("---s").unwrap(), Protection::NONE);
        assert_eq!(
            parse_perms("rwxp").unwrap(),
            Protection::READ_WRITE | Protection::EXEC
        );
    }

    #[test]
    fn test_parse_perms_rejects_garbage() {
        assert!(parse_perms("rw").is_err());
        assert!(parse_perms("wr-").is_err());
        assert!(parse_perms("rw-q").is_err());
        assert!(parse_perms("rw-pp").is_err());
    }

    #[test]
    fn test_region_spec() {
        let spec: RegionSpec = "0x500000:rw-p:/tmp/heap.bin".parse().unwrap();
        assert_eq!(spec.address, 0x500000);
        assert_eq!(spec.protection, Protection::READ_WRITE);
        assert_eq!(spec.path, PathBuf::from("/tmp/heap.bin"));

        let spec: RegionSpec = "4096:r--:dir/with:colon".parse().unwrap();
        assert_eq!(spec.address, 4096);
        assert_eq!(spec.protection, Protection::READ);
        assert_eq!(spec.path, PathBuf::from("dir/with:colon"));
    }

    #[test]
    fn test_region_spec_errors() {
        assert!("0x500000:rw-".parse::<RegionSpec>().is_err());
        assert!("0x500000:rw-:".parse::<RegionSpec>().is_err());
        assert!("0xzz:rw-:f".parse::<RegionSpec>().is_err());
        assert!("0x500000:rwz:f".parse::<RegionSpec>().is_err());
    }

    #[test]
    fn test_region_request() {
        let region = Region::new(0x500000, Protection::READ, vec![1, 2, 3]);
        let request = region.request();
        assert_eq!(request.address, 0x500000);
        assert_eq!(request.length, 3);
        assert_eq!(request.protection, Protection::READ);
        assert!(!region.is_vsyscall());
        assert!(Region::new(VSYSCALL_ADDR, Protection::READ | Protection::EXEC, vec![0; 4096])
            .is_vsyscall());
    }

    #[test]
    fn test_load_missing_file() {
        let spec: RegionSpec = "0x500000:rw-:/nonexistent/pthaw/region".parse().unwrap();
        assert!(matches!(
            spec.load(),
            Err(ThawError::InvalidRegion { .. })
        ));
    }
}
