//! End-to-end tests driving the built `supervisor` binary against real
//! control scripts.

use std::fs;
use std::process::Command;
use std::time::Duration;

fn supervisor_cmd() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_supervisor"));
    cmd.env("RUST_LOG", "info");
    cmd
}

/// Runs the supervisor with `control_script` (a `/bin/sh -c` one-liner) as the
/// control command, inside a fresh status directory, and waits for it to
/// finish. Fails the test if the supervisor does not exit within `timeout`.
fn run_supervisor(status_root: &std::path::Path, control_script: &str) -> std::process::Output {
    let mut child = supervisor_cmd()
        .arg(status_root)
        .arg("/bin/sh")
        .arg("-c")
        .arg(control_script)
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .expect("failed to launch supervisor binary");

    let start = std::time::Instant::now();
    loop {
        if let Some(_status) = child.try_wait().expect("try_wait failed") {
            break;
        }
        if start.elapsed() > Duration::from_secs(15) {
            let _ = child.kill();
            panic!("supervisor did not terminate within timeout");
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    child.wait_with_output().expect("failed to collect output")
}

fn read(path: &std::path::Path) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| panic!("failed to read {}: {}", path.display(), e))
}

fn control_dirs(status_root: &std::path::Path) -> Vec<std::path::PathBuf> {
    let control_root = status_root.join("CONTROL");
    fs::read_dir(&control_root)
        .unwrap_or_else(|e| panic!("failed to list {}: {}", control_root.display(), e))
        .map(|e| e.unwrap().path())
        .collect()
}

fn job_dirs(status_root: &std::path::Path, kind: &str) -> Vec<std::path::PathBuf> {
    let root = status_root.join(kind);
    if !root.exists() {
        return Vec::new();
    }
    fs::read_dir(&root)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect()
}

#[test]
fn happy_path_exec_echo() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let output = run_supervisor(tmp.path(), "printf 'exec:/bin/echo hello\\n'");
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let dones = job_dirs(tmp.path(), "DONE");
    assert_eq!(dones.len(), 1, "expected exactly one completed job");
    let stdout_log = read(&dones[0].join("stdout.log"));
    assert_eq!(stdout_log, "hello\n");

    let controls = control_dirs(tmp.path());
    assert_eq!(controls.len(), 1);
    let invoked = read(&controls[0].join("invoked.csv"));
    assert_eq!(invoked.lines().count(), 3, "header + control row + job row");

    let finished = read(&controls[0].join("finished.csv"));
    assert_eq!(finished.lines().count(), 3, "header + control row + job row");

    let running = read(&controls[0].join("running.csv"));
    assert_eq!(running.lines().count(), 1, "running.csv should end header-only");
}

#[test]
fn print_passthrough() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let output = run_supervisor(tmp.path(), "printf 'print:hi there\\n'");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "hi there\n");

    // No job should have been spawned for a bare print.
    assert!(job_dirs(tmp.path(), "DONE").is_empty());

    let controls = control_dirs(tmp.path());
    let finished = read(&controls[0].join("finished.csv"));
    assert_eq!(finished.lines().count(), 2, "header + control row only");
}

#[test]
fn unknown_verb_is_ignored_and_exec_still_runs() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let output = run_supervisor(tmp.path(), "printf 'wat:whatever\\nexec:/bin/true\\n'");
    assert!(output.status.success());
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("unknown control verb"),
        "stderr should mention the unknown verb: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let dones = job_dirs(tmp.path(), "DONE");
    assert_eq!(dones.len(), 1);

    let controls = control_dirs(tmp.path());
    let finished = read(&controls[0].join("finished.csv"));
    assert_eq!(finished.lines().count(), 3, "header + control row + job row");
}

#[test]
fn exec_failure_still_produces_ledger_rows_and_renames_to_done() {
    let tmp = tempfile::tempdir().expect("tempdir");
    let output = run_supervisor(tmp.path(), "printf 'exec:/nonexistent/binary\\n'");
    assert!(output.status.success());

    let dones = job_dirs(tmp.path(), "DONE");
    assert_eq!(dones.len(), 1, "the job's directory should have been renamed to DONE");
    assert!(job_dirs(tmp.path(), "RUNNING").is_empty());

    let controls = control_dirs(tmp.path());
    let finished = read(&controls[0].join("finished.csv"));
    let job_row = finished
        .lines()
        .nth(1)
        .expect("at least one data row before the control row or after it");
    // Either the first or second data row is the job; find the one with a
    // non-zero returnCode (exec(2) failure exits 255 in the child).
    let has_nonzero_return_code = finished.lines().skip(1).any(|line| {
        let cols: Vec<&str> = line.split(',').collect();
        cols.get(3).map_or(false, |rc| *rc != "0")
    });
    assert!(has_nonzero_return_code, "finished.csv: {}", finished);
    let _ = job_row;
}

#[test]
fn usage_is_printed_with_too_few_arguments() {
    let output = supervisor_cmd().output().expect("failed to launch supervisor binary");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("usage:"));
}
