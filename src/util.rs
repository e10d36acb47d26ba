//! Small POSIX helpers shared by the spawner, pipe endpoints, and the loop.

use std::{
    mem::ManuallyDrop,
    os::unix::io::{AsRawFd, RawFd},
};

/// An owned file descriptor. Closed on drop.
pub struct Fd(RawFd);

impl AsRawFd for Fd {
    fn as_raw_fd(&self) -> RawFd {
        self.0
    }
}

impl Fd {
    pub fn new(inner: RawFd) -> Self {
        Fd(inner)
    }

    pub fn as_raw(&self) -> RawFd {
        self.0
    }

    /// Consumes the wrapper without closing the descriptor.
    pub fn into_raw(self) -> RawFd {
        let this = ManuallyDrop::new(self);
        this.0
    }

    pub fn read(&self, buf: &mut [u8]) -> nix::Result<usize> {
        nix::unistd::read(self.0, buf)
    }

    pub fn write_all(&self, mut buf: &[u8]) -> nix::Result<()> {
        while !buf.is_empty() {
            match nix::unistd::write(self.0, buf) {
                Ok(0) => break,
                Ok(n) => buf = &buf[n..],
                Err(nix::Error::EINTR) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub fn set_nonblocking(&self) -> nix::Result<()> {
        use nix::fcntl::{fcntl, FcntlArg, OFlag};
        let flags = fcntl(self.0, FcntlArg::F_GETFL)?;
        let mut flags = OFlag::from_bits_truncate(flags);
        flags.insert(OFlag::O_NONBLOCK);
        fcntl(self.0, FcntlArg::F_SETFL(flags))?;
        Ok(())
    }
}

impl Drop for Fd {
    fn drop(&mut self) {
        let _ = nix::unistd::close(self.0);
    }
}

/// Prints a syscall failure diagnostic and aborts the process.
///
/// Used only for failures that happen before the supervisor has anything
/// worth tearing down gracefully (fork, initial pipe creation).
pub fn err_exit(syscall_name: &str) -> ! {
    let e = errno::errno();
    eprintln!("{}() failed with error {}: {}", syscall_name, e.0, e);
    std::process::exit(1);
}

/// Local wall-clock "now", truncated to whole seconds; the unit every
/// timestamp in this crate is expressed in (see ledger/sample formats).
pub fn now() -> std::time::SystemTime {
    std::time::SystemTime::now()
}
