//! Ledger writer: the three CSV files, fixed schemas on disk.

use crate::run::{Run, RunOutcome};
use crate::run_table::RunTable;
use crate::timestamp::{duration_secs, format_ledger};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

pub struct Ledger {
    invoked: File,
    finished: File,
    running_path: std::path::PathBuf,
}

impl Ledger {
    /// Opens `invoked.csv`/`finished.csv` in append mode and writes their
    /// headers. Called once, at control-spawn time.
    pub fn create(control_dir: &Path) -> io::Result<Ledger> {
        std::fs::create_dir_all(control_dir)?;
        let invoked_path = control_dir.join("invoked.csv");
        let finished_path = control_dir.join("finished.csv");
        let running_path = control_dir.join("running.csv");

        let mut invoked = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&invoked_path)?;
        invoked.write_all(b"id,pid,runType,startTime,statusDirectory,cmd\n")?;

        let mut finished = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&finished_path)?;
        finished.write_all(
            b"id,pid,runType,returnCode,startTime,endTime,duration,statusDirectory,cmd\n",
        )?;

        Ok(Ledger {
            invoked,
            finished,
            running_path,
        })
    }

    /// Appends one row to `invoked.csv` for a freshly spawned run.
    pub fn record_invoked(&mut self, run: &Run, directory: &Path) -> io::Result<()> {
        let row = format!(
            "{},{},{},{},{},{}\n",
            run.id,
            run.pid,
            run.kind.name(),
            format_ledger(run.started_at),
            directory.display(),
            run.command_line,
        );
        self.invoked.write_all(row.as_bytes())
    }

    /// Appends one row to `finished.csv` for a reaped-and-finalised run.
    pub fn record_finished(&mut self, outcome: &RunOutcome) -> io::Result<()> {
        let row = format!(
            "{},{},{},{},{},{},{},{},{}\n",
            outcome.id,
            outcome.pid,
            outcome.kind.name(),
            outcome.exit_status,
            format_ledger(outcome.started_at),
            format_ledger(outcome.ended_at),
            duration_secs(outcome.started_at, outcome.ended_at),
            outcome.final_directory.display(),
            outcome.command_line,
        );
        self.finished.write_all(row.as_bytes())
    }

    /// Rewrites `running.csv` in its entirety: open-truncate, header, one row
    /// per live run, close. Called after every spawn and after every reap
    /// batch so the file is always a consistent snapshot, never something a
    /// reader could catch mid-patch.
    pub fn rewrite_running(&self, status_root: &Path, table: &RunTable) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&self.running_path)?;
        file.write_all(b"id,pid,runType,startTime,duration,statusDirectory,cmd\n")?;
        let now = std::time::SystemTime::now();
        for run in table.iter() {
            let row = format!(
                "{},{},{},{},{},{},{}\n",
                run.id,
                run.pid,
                run.kind.name(),
                format_ledger(run.started_at),
                duration_secs(run.started_at, now),
                run.path(status_root, crate::run_kind::RunKind::Default, crate::paths::Artifact::Directory)
                    .display(),
                run.command_line,
            );
            file.write_all(row.as_bytes())?;
        }
        Ok(())
    }
}
