//! Higher-level syscall wrappers
//!
//! One wrapper per kernel call. Each returns the kernel's result decoded
//! through [`Errno::from_syscall_ret`] and nothing more: no retries, no
//! short-transfer handling, no checking that a fixed mapping landed where it
//! was asked to. Callers own all of that.

use crate::constants::*;
use crate::errno::Errno;
use crate::raw;

/// Open file
#[inline(always)]
pub unsafe fn open(path: *const u8, flags: i32, mode: u32) -> Result<i32, Errno> {
    let ret = raw::syscall3(SYS_OPEN, path as u64, flags as u64, mode as u64);
    Errno::from_syscall_ret(ret).map(|fd| fd as i32)
}

/// Close file descriptor
#[inline(always)]
pub unsafe fn close(fd: i32) -> Result<(), Errno> {
    let ret = raw::syscall1(SYS_CLOSE, fd as u64);
    Errno::from_syscall_ret(ret).map(|_| ())
}

/// Read from file descriptor
///
/// Returns the number of bytes actually read, which may be fewer than `count`.
#[inline(always)]
pub unsafe fn read(fd: i32, buf: *mut u8, count: usize) -> Result<usize, Errno> {
    let ret = raw::syscall3(SYS_READ, fd as u64, buf as u64, count as u64);
    Errno::from_syscall_ret(ret)
}

/// Write to file descriptor
///
/// Returns the number of bytes actually written, which may be fewer than `count`.
#[inline(always)]
pub unsafe fn write(fd: i32, buf: *const u8, count: usize) -> Result<usize, Errno> {
    let ret = raw::syscall3(SYS_WRITE, fd as u64, buf as u64, count as u64);
    Errno::from_syscall_ret(ret)
}

/// Map memory (anonymous or file-backed)
///
/// With `MAP_FIXED` the kernel either places the mapping at `addr` or fails,
/// but the returned address is still handed back unchecked.
#[inline(always)]
pub unsafe fn mmap(
    addr: usize,
    length: usize,
    prot: i32,
    flags: i32,
    fd: i32,
    offset: i64,
) -> Result<usize, Errno> {
    let ret = raw::syscall6(
        SYS_MMAP,
        addr as u64,
        length as u64,
        prot as u64,
        flags as u64,
        fd as u64,
        offset as u64,
    );
    Errno::from_syscall_ret(ret)
}

/// Unmap memory
#[inline(always)]
pub unsafe fn munmap(addr: usize, length: usize) -> Result<(), Errno> {
    let ret = raw::syscall2(SYS_MUNMAP, addr as u64, length as u64);
    Errno::from_syscall_ret(ret).map(|_| ())
}

/// Change protection of a mapped range
#[inline(always)]
pub unsafe fn mprotect(addr: usize, length: usize, prot: i32) -> Result<(), Errno> {
    let ret = raw::syscall3(SYS_MPROTECT, addr as u64, length as u64, prot as u64);
    Errno::from_syscall_ret(ret).map(|_| ())
}

/// Terminate the whole process (NEVER RETURNS)
#[inline(always)]
pub fn exit(status: i32) -> ! {
    unsafe {
        raw::syscall1(SYS_EXIT_GROUP, status as u64);
        core::hint::unreachable_unchecked()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: usize = 4096;

    #[test]
    fn test_read_bad_fd() {
        let mut buf = [0u8; 4];
        let ret = unsafe { read(-1, buf.as_mut_ptr(), buf.len()) };
        assert_eq!(ret, Err(Errno(Errno::EBADF)));
    }

    #[test]
    fn test_open_read_close() {
        let fd = unsafe { open(b"/dev/zero\0".as_ptr(), O_RDONLY | O_CLOEXEC, 0) }
            .expect("open /dev/zero");

        let mut buf = [0xffu8; 16];
        let n = unsafe { read(fd, buf.as_mut_ptr(), buf.len()) }.expect("read /dev/zero");
        assert_eq!(n, 16);
        assert!(buf.iter().all(|&b| b == 0));

        unsafe { close(fd) }.expect("close");
        assert_eq!(unsafe { close(fd) }, Err(Errno(Errno::EBADF)));
    }

    #[test]
    fn test_write_dev_null() {
        let fd = unsafe { open(b"/dev/null\0".as_ptr(), O_WRONLY | O_CLOEXEC, 0) }
            .expect("open /dev/null");
        let msg = b"discarded";
        let n = unsafe { write(fd, msg.as_ptr(), msg.len()) }.expect("write");
        assert_eq!(n, msg.len());
        unsafe { close(fd) }.expect("close");
    }

    #[test]
    fn test_mmap_fixed_mprotect_munmap() {
        unsafe {
            // Let the kernel pick a free range, then remap it at that exact address
            let hint = mmap(0, 2 * PAGE, PROT_NONE, MAP_PRIVATE | MAP_ANONYMOUS, -1, 0)
                .expect("reserve range");

            let addr = mmap(
                hint,
                PAGE,
                PROT_READ | PROT_WRITE,
                MAP_PRIVATE | MAP_ANONYMOUS | MAP_FIXED,
                -1,
                0,
            )
            .expect("fixed mapping");
            assert_eq!(addr, hint);

            *(addr as *mut u8) = 0xAB;
            assert_eq!(*(addr as *const u8), 0xAB);

            mprotect(addr, PAGE, PROT_READ).expect("mprotect");
            assert_eq!(*(addr as *const u8), 0xAB);

            munmap(hint, 2 * PAGE).expect("munmap");
        }
    }

    #[test]
    fn test_mmap_unaligned_fixed_fails() {
        let ret = unsafe {
            mmap(
                0x500001,
                PAGE,
                PROT_READ | PROT_WRITE,
                MAP_PRIVATE | MAP_ANONYMOUS | MAP_FIXED,
                -1,
                0,
            )
        };
        assert_eq!(ret, Err(Errno(Errno::EINVAL)));
    }
}
