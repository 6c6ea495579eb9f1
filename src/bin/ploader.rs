//! Thaw loader
//!
//! Started by the supervisor with the control channel on descriptors 3 and 4.
//! Restores memory regions as instructed, then either exits or parks itself
//! for the supervisor to inject registers and resume the restored program.
//!
//! Linked static and without the C start files (see `build.rs`), so the only
//! mappings besides the kernel's are this image and the restored regions.

#![no_std]
#![no_main]

use core::arch::global_asm;

use pthaw_loader::{diag, Engine, FdChannel, KernelAddressSpace, Outcome};
use pthaw_syscall::exit;

// The kernel enters with rsp 16-byte aligned; `call` leaves it the way an
// `extern "C"` function expects.
global_asm!(
    ".globl _start",
    ".type _start, @function",
    "_start:",
    "xor ebp, ebp",
    "and rsp, -16",
    "call {entry}",
    "ud2",
    entry = sym loader_main,
);

/// Entry point called from `_start`. It must never return.
#[inline(never)]
extern "C" fn loader_main() -> ! {
    // SAFETY: this process exists only to have its address space overwritten
    // with the regions the supervisor sends.
    let memory = unsafe { KernelAddressSpace::new() };
    let mut engine = Engine::new(FdChannel::supervisor(), memory);

    match engine.run() {
        Outcome::Exit { code, fault } => {
            if let Some(fault) = fault {
                diag::report(format_args!("ploader: error: {}", fault));
            }
            exit(code)
        }
        Outcome::AwaitExternalResume => await_external_resume(),
    }
}

/// Spin until the supervisor attaches and moves the instruction pointer.
///
/// No syscalls here: a tracer stopping us inside one could have the kernel
/// rewrite the injected registers for a syscall restart.
fn await_external_resume() -> ! {
    loop {
        core::hint::spin_loop();
    }
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    diag::report(format_args!("ploader: panic: {}", info));
    exit(pthaw_loader::EXIT_FAILURE)
}
