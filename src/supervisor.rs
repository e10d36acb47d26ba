//! Supervisor loop: the single active agent in this process.
//!
//! Bundles every piece of mutable state the loop touches into one owned
//! value instead of file-scope statics; there is exactly one `Supervisor`
//! per process and it is never shared across threads, so this costs
//! nothing and makes every dependency explicit.

use crate::buffer::{Buffer, DrainAction};
use crate::error::Error;
use crate::ledger::Ledger;
use crate::paths::Artifact;
use crate::protocol::{self, Command};
use crate::run_kind::RunKind;
use crate::run_table::RunTable;
use crate::spawn;
use nix::sys::select::{select, FdSet};
use nix::sys::time::{TimeVal, TimeValLike};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::{error, info, warn};

/// Readiness timeout: long enough that the loop is not busy-spinning, short
/// enough that sample rows and `running.csv` stay fresh even when no child is
/// producing output.
const SELECT_TIMEOUT_SECS: i64 = 10;

/// Control buffer capacity. Sized generously for a protocol line; a
/// well-behaved control child's `exec:`/`print:` lines are nowhere near
/// this long.
const CONTROL_BUFFER_CAPACITY: usize = 8192;

/// Scratch buffer capacity for job stdout/stderr and the control child's
/// stderr. Larger than the control buffer since this data is mirrored
/// straight to disk rather than parsed line by line.
const SCRATCH_BUFFER_CAPACITY: usize = 32768;

pub struct Supervisor {
    status_root: PathBuf,
    table: RunTable,
    control_buffer: Buffer,
    scratch_buffer: Buffer,
    ledger: Ledger,
}

impl Supervisor {
    /// Spawns the control command and runs the loop to completion (the run
    /// table draining to empty). Returns once every child, control and job
    /// alike, has been reaped and finalised.
    pub fn run(status_root: PathBuf, control_argv: Vec<String>) -> Result<(), Error> {
        let control_run = spawn::spawn(&status_root, &control_argv, RunKind::Control)?;
        let control_dir = control_run.path(&status_root, RunKind::Control, Artifact::Directory);
        let ledger = Ledger::create(&control_dir)?;

        let mut supervisor = Supervisor {
            status_root,
            table: RunTable::new(),
            control_buffer: Buffer::with_capacity(CONTROL_BUFFER_CAPACITY, "control"),
            scratch_buffer: Buffer::with_capacity(SCRATCH_BUFFER_CAPACITY, "scratch"),
            ledger,
        };

        supervisor.register_invoked(control_run, &control_dir)?;
        info!(status_root = %supervisor.status_root.display(), "supervisor started");
        supervisor.drain_to_empty()
    }

    fn register_invoked(&mut self, run: crate::run::Run, directory: &std::path::Path) -> Result<(), Error> {
        self.ledger.record_invoked(&run, directory)?;
        let inserted = self.table.insert(run);
        debug_assert!(inserted.is_some(), "caller must check capacity before spawning");
        self.ledger.rewrite_running(&self.status_root, &self.table)?;
        Ok(())
    }

    /// Spawns a new job run, provided the table has room. Table saturation
    /// is logged and otherwise ignored, with no *invoked* row and no ledger
    /// mutation.
    fn spawn_job(&mut self, mut argv: Vec<String>) {
        if self.table.len() >= crate::run_table::MAX_RUN {
            warn!(max = crate::run_table::MAX_RUN, "run table full; ignoring exec request");
            return;
        }
        if let Err(e) = spawn::resolve_executable(&mut argv) {
            error!(error = %e, cmd = argv.join(" ").as_str(), "failed to resolve exec command path");
            return;
        }
        match spawn::spawn(&self.status_root, &argv, RunKind::Running) {
            Ok(run) => {
                let dir = run.path(&self.status_root, RunKind::Running, Artifact::Directory);
                if let Err(e) = self.register_invoked(run, &dir) {
                    error!(error = %e, "failed to record invoked job");
                }
            }
            Err(e) => error!(error = %e, cmd = argv.join(" ").as_str(), "failed to spawn job"),
        }
    }

    fn drain_to_empty(&mut self) -> Result<(), Error> {
        loop {
            let now = SystemTime::now();
            for run in self.table.iter_mut() {
                run.out.maybe_sample(now);
                run.err.maybe_sample(now);
                run.flush_pending_samples();
            }

            let mut readfds = FdSet::new();
            let mut max_fd = -1;
            for run in self.table.iter() {
                for fd in [run.out.source_fd(), run.err.source_fd()] {
                    readfds.insert(fd);
                    max_fd = max_fd.max(fd);
                }
            }

            if self.table.is_empty() {
                return Ok(());
            }

            let mut timeout = TimeVal::seconds(SELECT_TIMEOUT_SECS);
            let ready = loop {
                let mut candidate = readfds.clone();
                match select(max_fd + 1, Some(&mut candidate), None, None, Some(&mut timeout)) {
                    Ok(_) => break Some(candidate),
                    Err(nix::Error::EINTR) => continue,
                    Err(cause) => {
                        error!(error = %cause, "select() failed");
                        break None;
                    }
                }
            };

            if let Some(ready) = ready {
                self.drain_ready(&ready);
            }

            if self.reap_terminated()? {
                self.ledger.rewrite_running(&self.status_root, &self.table)?;
            }
        }
    }

    fn drain_ready(&mut self, ready: &FdSet) {
        let mut pending_execs: Vec<Vec<String>> = Vec::new();
        let mut pending_prints: Vec<String> = Vec::new();

        for run in self.table.iter_mut() {
            let run_id = run.id.clone();
            if run.kind == RunKind::Control {
                run.out.drain_if_ready(
                    ready,
                    &mut self.control_buffer,
                    DrainAction::LineDispatch(&mut |line| match protocol::parse_line(line) {
                        Some(Command::Exec(argv)) => pending_execs.push(argv),
                        Some(Command::Print(text)) => pending_prints.push(text),
                        None => {}
                    }),
                    run_id.as_str(),
                );
            } else {
                run.out.drain_if_ready(
                    ready,
                    &mut self.scratch_buffer,
                    DrainAction::Truncate,
                    run_id.as_str(),
                );
            }
            run.err.drain_if_ready(
                ready,
                &mut self.scratch_buffer,
                DrainAction::Truncate,
                run_id.as_str(),
            );
        }

        for text in pending_prints {
            println!("{}", text);
        }
        for argv in pending_execs {
            self.spawn_job(argv);
        }
    }

    /// Reaps every terminated child currently available (non-blocking,
    /// repeated until `waitpid` reports nothing left), finalising each one.
    /// Returns whether anything was reaped, so the caller knows whether
    /// `running.csv` needs rewriting.
    fn reap_terminated(&mut self) -> Result<bool, Error> {
        let mut reaped: Vec<(Pid, i32, SystemTime)> = Vec::new();
        loop {
            match waitpid(None, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) => break,
                Ok(WaitStatus::Exited(pid, code)) => reaped.push((pid, code, SystemTime::now())),
                Ok(WaitStatus::Signaled(pid, signal, _)) => {
                    reaped.push((pid, 128 + signal as i32, SystemTime::now()))
                }
                Ok(_) => continue,
                Err(nix::Error::ECHILD) => break,
                Err(nix::Error::EINTR) => continue,
                Err(cause) => {
                    error!(error = %cause, "waitpid() failed");
                    break;
                }
            }
        }

        if reaped.is_empty() {
            return Ok(false);
        }

        let pids: Vec<Pid> = reaped.iter().map(|(pid, _, _)| *pid).collect();
        let finished = self.table.remove_by_pids(&pids);
        for run in finished {
            let (_, exit_status, ended_at) = reaped
                .iter()
                .find(|(pid, _, _)| *pid == run.pid)
                .copied()
                .unwrap_or((run.pid, 0, SystemTime::now()));
            let outcome = run.finalise(&self.status_root, exit_status, ended_at);
            if let Err(e) = self.ledger.record_finished(&outcome) {
                error!(run = %outcome.id, error = %e, "failed to record finished row");
            }
        }
        Ok(true)
    }
}
