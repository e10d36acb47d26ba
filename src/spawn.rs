//! Spawner: fork+exec with pipe plumbing.

use crate::error::Error;
use crate::paths::{run_path, Artifact};
use crate::run::Run;
use crate::run_id::RunId;
use crate::run_kind::RunKind;
use crate::util::{err_exit, Fd};
use nix::unistd::{self, ForkResult, Pid};
use std::ffi::CString;
use std::path::Path;
use std::time::SystemTime;

/// Creates a pipe, returning `(read_end, write_end)`. Fatal on failure; a
/// supervisor that cannot create pipes cannot do anything useful.
fn make_pipe() -> Result<(Fd, Fd), Error> {
    let (r, w) = unistd::pipe().map_err(|cause| Error::Pipe { cause })?;
    Ok((Fd::new(r), Fd::new(w)))
}

/// Resolves `argv[0]` to an absolute path, rewriting it in place.
///
/// The control child `chdir`s into its run directory before `execve`, so a
/// relative command like `./run.sh` would no longer exist at that path once
/// the working directory has moved. Resolving it up front, while the
/// current directory is still the one the caller invoked the supervisor
/// from, keeps relative control commands working.
pub fn resolve_executable(argv: &mut [String]) -> Result<(), Error> {
    let first = argv.first().ok_or_else(|| Error::Io {
        cause: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
    })?;
    let resolved = std::fs::canonicalize(first).map_err(|cause| Error::Io { cause })?;
    argv[0] = resolved.to_string_lossy().into_owned();
    Ok(())
}

/// Turns a whitespace-joined command line into the `argv` the child process
/// needs to `execve`: `argv[0]` is the executable path.
fn build_cstrings(argv: &[String]) -> Vec<CString> {
    argv.iter()
        .map(|s| CString::new(s.as_str()).expect("argv entries must not contain NUL bytes"))
        .collect()
}

/// Forks and execs `argv`, wiring up pipes for stdout/stderr (and, for the
/// control run, stdin). Returns the parent-side `Run` once the child has
/// started; the exec itself may still fail asynchronously, and that failure
/// is only observable later via a non-zero reap status.
///
/// `argv[0]` must already be an absolute path. The child `chdir`s into its
/// own run directory before calling `execve`, so a relative executable path
/// would no longer resolve once the working directory has moved; callers
/// are responsible for resolving it first (see `resolve_executable`).
pub fn spawn(status_root: &Path, argv: &[String], kind: RunKind) -> Result<Run, Error> {
    let (out_r, out_w) = make_pipe()?;
    let (err_r, err_w) = make_pipe()?;
    let control_pipe = if kind == RunKind::Control {
        Some(make_pipe()?)
    } else {
        None
    };

    let started_at = SystemTime::now();
    let command_line = argv
        .iter()
        .map(|s| format!("{} ", s))
        .collect::<String>();

    // SAFETY: the supervisor is single-threaded, so no other thread can hold
    // a libc allocator lock across this fork(); the child is free to
    // allocate (CString::new, create_dir_all) before execve without risking
    // the classic fork-in-a-multithreaded-process deadlock.
    match unsafe { unistd::fork() } {
        Err(cause) => Err(Error::Fork { cause }),
        Ok(ForkResult::Child) => {
            child_exec(status_root, argv, kind, started_at, out_r, out_w, err_r, err_w, control_pipe)
        }
        Ok(ForkResult::Parent { child }) => {
            parent_attach(status_root, argv, kind, started_at, command_line, child, out_r, out_w, err_r, err_w, control_pipe)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn child_exec(
    status_root: &Path,
    argv: &[String],
    kind: RunKind,
    started_at: SystemTime,
    out_r: Fd,
    out_w: Fd,
    err_r: Fd,
    err_w: Fd,
    control_pipe: Option<(Fd, Fd)>,
) -> ! {
    drop(out_r);
    if unistd::dup2(out_w.as_raw(), libc::STDOUT_FILENO).is_err() {
        err_exit("dup2(stdout)");
    }
    drop(out_w);

    drop(err_r);
    if unistd::dup2(err_w.as_raw(), libc::STDERR_FILENO).is_err() {
        err_exit("dup2(stderr)");
    }
    drop(err_w);

    if let Some((in_r, in_w)) = control_pipe {
        if unistd::dup2(in_r.as_raw(), libc::STDIN_FILENO).is_err() {
            err_exit("dup2(stdin)");
        }
        drop(in_r);
        drop(in_w);
    }

    // The child derives its own id from its own pid, consistent with how the
    // parent will derive the same id after fork() returns.
    let pid = unistd::getpid();
    let id = RunId::new(started_at, pid);
    let dir = run_path(status_root, kind, &id, Artifact::Directory);
    if std::fs::create_dir_all(&dir).is_err() {
        err_exit("mkdir");
    }
    if unistd::chdir(&dir).is_err() {
        err_exit("chdir");
    }

    let cpath = CString::new(argv[0].as_str()).expect("executable path must not contain NUL");
    let cargv = build_cstrings(argv);
    let empty_env: [CString; 0] = [];
    let err = unistd::execve(&cpath, &cargv, &empty_env).unwrap_err();
    eprintln!(
        "failed to execute errno:{}({}) cmd:{}",
        err, err as i32, argv.join(" ")
    );
    std::process::exit(255);
}

#[allow(clippy::too_many_arguments)]
fn parent_attach(
    status_root: &Path,
    argv: &[String],
    kind: RunKind,
    started_at: SystemTime,
    command_line: String,
    child: Pid,
    out_r: Fd,
    out_w: Fd,
    err_r: Fd,
    err_w: Fd,
    control_pipe: Option<(Fd, Fd)>,
) -> Result<Run, Error> {
    drop(out_w);
    drop(err_w);
    let control_stdin_fd = match control_pipe {
        Some((in_r, in_w)) => {
            drop(in_r);
            Some(in_w)
        }
        None => None,
    };

    let id = RunId::new(started_at, child);
    let run = Run::open(
        status_root,
        id,
        kind,
        child,
        out_r,
        err_r,
        control_stdin_fd,
        started_at,
        command_line,
    )?;
    let _ = argv;
    Ok(run)
}
