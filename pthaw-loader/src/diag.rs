//! Diagnostic output
//!
//! Best effort and write-only: a message is formatted into a fixed stack
//! buffer, truncated if it does not fit, and written to stderr in a single
//! call whose result is ignored.

use core::fmt::{self, Write};

use pthaw_syscall::{syscalls, STDERR_FILENO};

pub const LINE_CAPACITY: usize = 256;

struct Line {
    buf: [u8; LINE_CAPACITY],
    len: usize,
}

impl Line {
    const fn new() -> Self {
        Line {
            buf: [0; LINE_CAPACITY],
            len: 0,
        }
    }

    fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }
}

impl Write for Line {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        // Keep the last byte for the newline
        let room = LINE_CAPACITY - 1 - self.len;
        let n = s.len().min(room);
        self.buf[self.len..self.len + n].copy_from_slice(&s.as_bytes()[..n]);
        self.len += n;
        Ok(())
    }
}

fn format_line(args: fmt::Arguments) -> Line {
    let mut line = Line::new();
    let _ = line.write_fmt(args);
    line.buf[line.len] = b'\n';
    line.len += 1;
    line
}

/// Write one line to stderr.
pub fn report(args: fmt::Arguments) {
    let line = format_line(args);
    let bytes = line.as_bytes();
    let _ = unsafe { syscalls::write(STDERR_FILENO, bytes.as_ptr(), bytes.len()) };
}
