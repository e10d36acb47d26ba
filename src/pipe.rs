//! Pipe endpoint: one child stream, with its byte counter and sampling
//! bookkeeping.

use crate::buffer::{Buffer, DrainAction};
use crate::sample::SampleEvent;
use crate::util::Fd;
use nix::sys::select::FdSet;
use std::time::SystemTime;
use tracing::warn;

/// `"out"` or `"err"`; also the `stream` column in `stdindex.csv`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamLabel {
    Out,
    Err,
}

impl StreamLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamLabel::Out => "out",
            StreamLabel::Err => "err",
        }
    }
}

/// One pipe: a readable source (the child's end) and a writable sink (the
/// `.log` file it is mirrored to).
pub struct PipeEndpoint {
    source: Fd,
    sink: Fd,
    bytes_copied: u64,
    sample: SampleEvent,
    label: StreamLabel,
}

impl PipeEndpoint {
    pub fn new(source: Fd, sink: Fd, label: StreamLabel, created_at: SystemTime) -> nix::Result<Self> {
        source.set_nonblocking()?;
        Ok(PipeEndpoint {
            source,
            sink,
            bytes_copied: 0,
            sample: SampleEvent::new(created_at),
            label,
        })
    }

    pub fn label(&self) -> StreamLabel {
        self.label
    }

    pub fn bytes_copied(&self) -> u64 {
        self.bytes_copied
    }

    pub fn source_fd(&self) -> std::os::unix::io::RawFd {
        use std::os::unix::io::AsRawFd;
        self.source.as_raw_fd()
    }

    pub fn sample_mut(&mut self) -> &mut SampleEvent {
        &mut self.sample
    }

    /// Opportunistically takes a sample without requiring fresh bytes;
    /// called once per loop iteration before the readiness set is built.
    pub fn maybe_sample(&mut self, now: SystemTime) {
        self.sample.maybe_sample(self.bytes_copied, now);
    }

    /// Reads whatever is available, mirrors it to the sink, and feeds it to
    /// `buffer`/`action`. Returns the number of bytes copied (0 if nothing was
    /// ready or the fd would have blocked).
    pub fn drain_if_ready(
        &mut self,
        ready: &FdSet,
        buffer: &mut Buffer,
        action: DrainAction<'_>,
        run_id: &str,
    ) -> usize {
        if !ready.contains(self.source_fd()) {
            return 0;
        }
        let free = buffer.free();
        if free == 0 {
            return 0;
        }
        let n = {
            let tail = buffer.tail_mut();
            match self.source.read(&mut tail[..free]) {
                Ok(n) => n,
                Err(nix::Error::EAGAIN) => return 0,
                Err(nix::Error::EINTR) => return 0,
                Err(e) => {
                    warn!(run = run_id, stream = self.label.as_str(), error = %e, "read failed");
                    return 0;
                }
            }
        };
        if n == 0 {
            return 0;
        }
        let now = std::time::SystemTime::now();
        self.sample.maybe_sample(self.bytes_copied, now);
        if let Err(e) = self.sink.write_all(buffer.tail(n)) {
            warn!(run = run_id, stream = self.label.as_str(), error = %e, "write to sink failed");
        }
        self.bytes_copied += n as u64;
        buffer.commit(n, action);
        n
    }
}
