//! `RunId`: stable identifier derived from spawn time and child pid.

use crate::timestamp::format_run_id_prefix;
use nix::unistd::Pid;
use std::{fmt, time::SystemTime};

/// `dYYYYMMDDtHHMMSSp<pid>`. Unique under the assumption that no two runs
/// share both start-second and pid, which holds as long as the kernel does
/// not recycle a pid within the same wall-clock second; a standard
/// assumption for this kind of identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunId(String);

impl RunId {
    /// Derives an id from the run's own child pid, never the parent's.
    /// `new` cannot be called without already holding the child's pid, so
    /// there is no window where the parent and child would compute
    /// different ids for the same run.
    pub fn new(started_at: SystemTime, pid: Pid) -> Self {
        RunId(format!("{}p{}", format_run_id_prefix(started_at), pid))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RunId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
