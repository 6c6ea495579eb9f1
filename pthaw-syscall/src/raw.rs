//! Raw syscall interface using inline assembly
//!
//! Provides the syscall1, syscall2, syscall3 and syscall6 entry points the
//! wrappers need. All follow the x86_64 Linux kernel calling convention:
//! number in rax, arguments in rdi, rsi, rdx, r10, r8, r9, result in rax.

use core::arch::asm;

/// Syscall with 1 argument
#[inline(always)]
pub unsafe fn syscall1(nr: u64, arg1: u64) -> i64 {
    let ret: i64;
    asm!(
        "syscall",
        in("rax") nr,
        in("rdi") arg1,
        lateout("rax") ret,
        out("rcx") _,  // clobbered by syscall
        out("r11") _,  // clobbered by syscall
        options(nostack, preserves_flags)
    );
    ret
}

/// Syscall with 2 arguments
#[inline(always)]
pub unsafe fn syscall2(nr: u64, arg1: u64, arg2: u64) -> i64 {
    let ret: i64;
    asm!(
        "syscall",
        in("rax") nr,
        in("rdi") arg1,
        in("rsi") arg2,
        lateout("rax") ret,
        out("rcx") _,
        out("r11") _,
        options(nostack, preserves_flags)
    );
    ret
}

/// Syscall with 3 arguments
#[inline(always)]
pub unsafe fn syscall3(nr: u64, arg1: u64, arg2: u64, arg3: u64) -> i64 {
    let ret: i64;
    asm!(
        "syscall",
        in("rax") nr,
        in("rdi") arg1,
        in("rsi") arg2,
        in("rdx") arg3,
        lateout("rax") ret,
        out("rcx") _,
        out("r11") _,
        options(nostack, preserves_flags)
    );
    ret
}

/// Syscall with 6 arguments
#[inline(always)]
pub unsafe fn syscall6(
    nr: u64,
    arg1: u64,
    arg2: u64,
    arg3: u64,
    arg4: u64,
    arg5: u64,
    arg6: u64,
) -> i64 {
    let ret: i64;
    asm!(
        "syscall",
        in("rax") nr,
        in("rdi") arg1,
        in("rsi") arg2,
        in("rdx") arg3,
        in("r10") arg4,  // r10, not rcx: syscall overwrites rcx
        in("r8") arg5,
        in("r9") arg6,
        lateout("rax") ret,
        out("rcx") _,
        out("r11") _,
        options(nostack, preserves_flags)
    );
    ret
}
