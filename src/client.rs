//! Supervisor-side driver for the loader's control channel

use std::fs::File;
use std::io::{self, Read, Write};
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::Duration;

use pthaw_loader::{Ack, OpCode, INBOUND_FD, OUTBOUND_FD, STREAM_BUFFER_LEN};

use crate::error::{Result, ThawError};
use crate::region::Region;

/// Lowest descriptor used when parking the pipe ends before installing them
const PARKING_FD: RawFd = 10;

fn pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds = [0 as RawFd; 2];
    if unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC) } < 0 {
        return Err(io::Error::last_os_error());
    }
    // SAFETY: pipe2 just returned these and nothing else owns them
    Ok(unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) })
}

/// Put `inbound` and `outbound` at the loader's fixed descriptor numbers.
///
/// Runs in the child between fork and exec, so only async-signal-safe calls.
/// Both ends are first duplicated above the target range so installing one
/// cannot clobber the other.
fn install_channel(inbound: RawFd, outbound: RawFd) -> io::Result<()> {
    let parked_in = unsafe { libc::fcntl(inbound, libc::F_DUPFD_CLOEXEC, PARKING_FD) };
    if parked_in < 0 {
        return Err(io::Error::last_os_error());
    }
    let parked_out = unsafe { libc::fcntl(outbound, libc::F_DUPFD_CLOEXEC, PARKING_FD) };
    if parked_out < 0 {
        return Err(io::Error::last_os_error());
    }

    // dup2 clears close-on-exec on the new descriptors
    if unsafe { libc::dup2(parked_in, INBOUND_FD) } < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::dup2(parked_out, OUTBOUND_FD) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// A running loader and our ends of its control channel
///
/// Every request is one opcode followed by exactly one ack; nothing is sent
/// before the previous ack has been read.
pub struct LoaderClient {
    child: Child,
    to_loader: Option<File>,
    from_loader: File,
}

impl LoaderClient {
    /// Start the loader at `path` with its control channel on descriptors 3 and 4.
    pub fn spawn(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let (loader_in, to_loader) = pipe()?;
        let (from_loader, loader_out) = pipe()?;

        let (child_in, child_out) = (loader_in.as_raw_fd(), loader_out.as_raw_fd());
        let mut cmd = Command::new(path);
        cmd.stdin(Stdio::null());
        unsafe {
            cmd.pre_exec(move || install_channel(child_in, child_out));
        }

        let child = cmd.spawn().map_err(|source| ThawError::Spawn {
            path: path.display().to_string(),
            source,
        })?;
        log::debug!("Started loader {} with PID {}", path.display(), child.id());

        // The loader has its own copies; keeping ours would hide its exit
        // from reads and writes on the other ends.
        drop(loader_in);
        drop(loader_out);

        Ok(LoaderClient {
            child,
            to_loader: Some(File::from(to_loader)),
            from_loader: File::from(from_loader),
        })
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    /// Write raw bytes to the loader's inbound channel.
    pub fn send(&mut self, bytes: &[u8]) -> Result<()> {
        let input = self.to_loader.as_mut().ok_or_else(|| {
            io::Error::new(io::ErrorKind::BrokenPipe, "loader input already closed")
        })?;
        input.write_all(bytes)?;
        Ok(())
    }

    /// Read one ack byte. `None` once the loader has closed its side.
    pub fn recv_ack(&mut self) -> Result<Option<u8>> {
        let mut byte = [0u8; 1];
        loop {
            match self.from_loader.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(byte[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Whether an ack (or end of stream) becomes readable within `timeout`.
    pub fn ack_pending(&self, timeout: Duration) -> Result<bool> {
        let mut pfd = libc::pollfd {
            fd: self.from_loader.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let millis = libc::c_int::try_from(timeout.as_millis()).unwrap_or(libc::c_int::MAX);
        let ready = unsafe { libc::poll(&mut pfd, 1, millis) };
        if ready < 0 {
            return Err(io::Error::last_os_error().into());
        }
        Ok(ready > 0)
    }

    fn expect(&mut self, expected: Ack) -> Result<()> {
        match self.recv_ack()? {
            Some(received) if received == expected.as_byte() => Ok(()),
            Some(received) => Err(ThawError::UnexpectedAck { expected, received }),
            None => Err(ThawError::ChannelClosed { expected }),
        }
    }

    fn request(&mut self, op: OpCode, expected: Ack) -> Result<()> {
        self.send(&[op.as_byte()])?;
        self.expect(expected)
    }

    /// Sanity check that the loader is up and speaking the protocol.
    pub fn start(&mut self) -> Result<()> {
        self.request(OpCode::Start, Ack::Started)
    }

    /// Restore one region.
    ///
    /// The loader fails on any read that returns less than it asked for, so
    /// the payload goes out in writes sized exactly like its reads. Each is
    /// at most PIPE_BUF bytes and so reaches the loader whole.
    pub fn mem_load(&mut self, region: &Region) -> Result<()> {
        let request = region.request();
        log::debug!(
            "Loading {} bytes at 0x{:x} ({})",
            request.length,
            request.address,
            request.protection
        );

        self.send(&[OpCode::MemLoad.as_byte()])?;
        self.send(&request.to_bytes())?;
        for chunk in region.contents.chunks(STREAM_BUFFER_LEN) {
            self.send(chunk)?;
        }
        self.expect(Ack::MemLoaded)
    }

    /// Hand the loader over. Returns its PID for the tracer that injects
    /// registers and resumes it.
    pub fn exec(&mut self) -> Result<u32> {
        self.request(OpCode::Exec, Ack::Executing)?;
        Ok(self.pid())
    }

    /// Stop the loader cleanly and reap it.
    pub fn abort(&mut self) -> Result<ExitStatus> {
        self.request(OpCode::Abort, Ack::Aborting)?;
        self.wait()
    }

    /// Close our end of the inbound channel; the loader sees end of stream.
    pub fn close_input(&mut self) {
        self.to_loader = None;
    }

    pub fn wait(&mut self) -> Result<ExitStatus> {
        self.close_input();
        Ok(self.child.wait()?)
    }

    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        Ok(self.child.try_wait()?)
    }

    pub fn kill(&mut self) -> Result<ExitStatus> {
        self.child.kill()?;
        self.wait()
    }
}

impl Drop for LoaderClient {
    fn drop(&mut self) {
        // Don't leave a parked loader spinning behind us
        if let Ok(None) = self.child.try_wait() {
            log::debug!("Killing loader PID {}", self.child.id());
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}
