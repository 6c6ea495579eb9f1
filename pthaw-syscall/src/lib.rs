//! Raw syscall wrappers for pthaw
//!
//! This crate provides no_std syscall wrappers using inline assembly.
//! It is the only code in the loader that talks to the kernel directly.

#![cfg_attr(not(test), no_std)]

#[cfg(not(all(target_os = "linux", target_arch = "x86_64")))]
compile_error!("pthaw-syscall only supports x86_64 Linux");

pub mod constants;
pub mod errno;
pub mod raw;
pub mod syscalls;

pub use constants::*;
pub use errno::Errno;
pub use syscalls::*;
