//! Run record: all state for a single child.

use crate::paths::{run_path, Artifact};
use crate::pipe::{PipeEndpoint, StreamLabel};
use crate::run_id::RunId;
use crate::run_kind::RunKind;
use crate::util::Fd;
use nix::sys::stat::Mode;
use nix::unistd::Pid;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::warn;

/// File permission bits for newly created `.log` files: user read/write,
/// group/other read (`0o644`).
const LOG_FILE_MODE: Mode = Mode::from_bits_truncate(0o644);

pub struct Run {
    pub id: RunId,
    pub kind: RunKind,
    pub pid: Pid,
    pub out: PipeEndpoint,
    pub err: PipeEndpoint,
    index_file: File,
    pub control_stdin_fd: Option<Fd>,
    pub started_at: SystemTime,
    pub ended_at: Option<SystemTime>,
    pub exit_status: Option<i32>,
    pub command_line: String,
}

pub struct RunOutcome {
    pub id: RunId,
    pub pid: Pid,
    pub kind: RunKind,
    pub exit_status: i32,
    pub started_at: SystemTime,
    pub ended_at: SystemTime,
    pub final_directory: PathBuf,
    pub command_line: String,
}

impl Run {
    /// Resolves the `RunKind::Default` sentinel against this run's own kind.
    pub fn effective_kind(&self, kind: RunKind) -> RunKind {
        match kind {
            RunKind::Default => self.kind,
            other => other,
        }
    }

    pub fn path(&self, status_root: &Path, kind: RunKind, artifact: Artifact) -> PathBuf {
        run_path(status_root, self.effective_kind(kind), &self.id, artifact)
    }

    /// Opens the run's directory and the two sink files plus the index file,
    /// writing the index header.
    #[allow(clippy::too_many_arguments)]
    pub fn open(
        status_root: &Path,
        id: RunId,
        kind: RunKind,
        pid: Pid,
        out_src: Fd,
        err_src: Fd,
        control_stdin_fd: Option<Fd>,
        started_at: SystemTime,
        command_line: String,
    ) -> std::io::Result<Run> {
        let dir = run_path(status_root, kind, &id, Artifact::Directory);
        std::fs::create_dir_all(&dir)?;

        let out_sink = open_log_file(&run_path(status_root, kind, &id, Artifact::Stdout))?;
        let err_sink = open_log_file(&run_path(status_root, kind, &id, Artifact::Stderr))?;

        let mut index_file = File::create(run_path(status_root, kind, &id, Artifact::StdIndex))?;
        index_file.write_all(b"stream,time,size\n")?;

        let out = PipeEndpoint::new(out_src, Fd::new(out_sink), StreamLabel::Out, started_at)
            .map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;
        let err = PipeEndpoint::new(err_src, Fd::new(err_sink), StreamLabel::Err, started_at)
            .map_err(|e| std::io::Error::from_raw_os_error(e as i32))?;

        Ok(Run {
            id,
            kind,
            pid,
            out,
            err,
            index_file,
            control_stdin_fd,
            started_at,
            ended_at: None,
            exit_status: None,
            command_line,
        })
    }

    /// Appends a sample row for `endpoint` if one is pending, then marks it
    /// recorded.
    fn flush_sample(&mut self, which: StreamLabel) {
        let endpoint = match which {
            StreamLabel::Out => &mut self.out,
            StreamLabel::Err => &mut self.err,
        };
        if !endpoint.sample_mut().is_pending() {
            return;
        }
        let row = format!(
            "{},{},{}\n",
            which.as_str(),
            crate::timestamp::format_ledger(endpoint.sample_mut().sampled_at()),
            endpoint.sample_mut().size_at_sample(),
        );
        if let Err(e) = self.index_file.write_all(row.as_bytes()) {
            warn!(run = %self.id, error = %e, "failed to write stdindex row");
        }
        match which {
            StreamLabel::Out => self.out.sample_mut().mark_recorded(),
            StreamLabel::Err => self.err.sample_mut().mark_recorded(),
        }
    }

    /// Flushes any pending sample rows for both streams. Called at the start
    /// of every loop iteration, before the readiness set is built.
    pub fn flush_pending_samples(&mut self) {
        self.flush_sample(StreamLabel::Out);
        self.flush_sample(StreamLabel::Err);
    }

    /// Finalises the run: forces a last sample, flushes it, closes every fd
    /// the run owns, renames the directory (jobs only), and returns the
    /// summary the ledger writer needs for the `finished` row.
    ///
    /// Invariant: called exactly once, strictly after the child has been
    /// reaped.
    pub fn finalise(mut self, status_root: &Path, exit_status: i32, ended_at: SystemTime) -> RunOutcome {
        // Set together, exactly once.
        self.exit_status = Some(exit_status);
        self.ended_at = Some(ended_at);

        self.out.sample_mut().force(self.out.bytes_copied(), ended_at);
        self.err.sample_mut().force(self.err.bytes_copied(), ended_at);
        self.flush_pending_samples();

        // `Running -> Done` happens here and only here; the control run's
        // kind never changes.
        if self.kind != RunKind::Control {
            self.kind = RunKind::Done;
        }

        let final_directory = if self.kind == RunKind::Control {
            self.path(status_root, RunKind::Control, Artifact::Directory)
        } else {
            let from = self.path(status_root, RunKind::Running, Artifact::Directory);
            let to = run_path(status_root, RunKind::Done, &self.id, Artifact::Directory);
            match to.parent().map(std::fs::create_dir_all) {
                Some(Ok(())) | None => {}
                Some(Err(e)) => warn!(run = %self.id, error = %e, "failed to create DONE directory"),
            }
            match std::fs::rename(&from, &to) {
                Ok(()) => to,
                Err(e) => {
                    warn!(run = %self.id, error = %e, from = %from.display(), to = %to.display(), "rename to DONE failed");
                    from
                }
            }
        };

        RunOutcome {
            id: self.id.clone(),
            pid: self.pid,
            kind: self.kind,
            exit_status: self.exit_status.expect("set above"),
            started_at: self.started_at,
            ended_at: self.ended_at.expect("set above"),
            final_directory,
            command_line: self.command_line.clone(),
        }
        // `self` (and with it both PipeEndpoints, the index file, and
        // control_stdin_fd) is dropped here, closing every owned fd.
    }
}

fn open_log_file(path: &Path) -> std::io::Result<std::os::unix::io::RawFd> {
    use std::os::unix::io::IntoRawFd;
    let file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .mode_or(LOG_FILE_MODE)
        .open(path)?;
    Ok(file.into_raw_fd())
}

trait OpenOptionsModeExt {
    fn mode_or(self, mode: Mode) -> Self;
}

impl OpenOptionsModeExt for std::fs::OpenOptions {
    fn mode_or(mut self, mode: Mode) -> Self {
        use std::os::unix::fs::OpenOptionsExt;
        self.mode(mode.bits() as u32);
        self
    }
}
