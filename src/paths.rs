//! Path/naming: deterministic filesystem path generation keyed on
//! `(kind, id, artifact)`.
//!
//! Every function here returns a freshly owned `PathBuf` rather than
//! rendering into shared scratch space, so there is no mutable state to
//! reason about and no reentrancy caveat to document.

use crate::run_id::RunId;
use crate::run_kind::RunKind;
use std::path::{Path, PathBuf};

/// Which on-disk artifact within a run's (or the control run's) directory a
/// path should name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Directory,
    Stdout,
    Stderr,
    StdIndex,
    Running,
    Invoked,
    Finished,
}

impl Artifact {
    fn suffix(self) -> &'static str {
        match self {
            Artifact::Directory => "",
            Artifact::Stdout => "/stdout.log",
            Artifact::Stderr => "/stderr.log",
            Artifact::StdIndex => "/stdindex.csv",
            Artifact::Running => "/running.csv",
            Artifact::Invoked => "/invoked.csv",
            Artifact::Finished => "/finished.csv",
        }
    }
}

/// `<status_root>/<runTypeName(kind)>/<id><artifact suffix>`.
///
/// `kind` must already be resolved (never `RunKind::Default`); see
/// `Run::effective_kind` for the caller-side resolution of that sentinel.
pub fn run_path(status_root: &Path, kind: RunKind, id: &RunId, artifact: Artifact) -> PathBuf {
    let mut path = status_root.join(kind.name()).join(id.as_str());
    let suffix = artifact.suffix();
    if suffix.is_empty() {
        return path;
    }
    // suffix is always "/name.ext"; fold it onto the directory path as a
    // single component rather than two `push` calls.
    let mut s = path.into_os_string();
    s.push(suffix);
    path = PathBuf::from(s);
    path
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::unistd::Pid;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn directory_has_no_suffix() {
        let id = RunId::new(UNIX_EPOCH + Duration::from_secs(1_700_000_000), Pid::from_raw(42));
        let p = run_path(Path::new("/tmp/status"), RunKind::Running, &id, Artifact::Directory);
        assert_eq!(p, PathBuf::from(format!("/tmp/status/RUNNING/{}", id.as_str())));
    }

    #[test]
    fn artifact_suffixes_match_schema() {
        let id = RunId::new(UNIX_EPOCH, Pid::from_raw(7));
        let root = Path::new("/s");
        assert!(run_path(root, RunKind::Control, &id, Artifact::Stdout)
            .ends_with("stdout.log"));
        assert!(run_path(root, RunKind::Control, &id, Artifact::Stderr)
            .ends_with("stderr.log"));
        assert!(run_path(root, RunKind::Control, &id, Artifact::StdIndex)
            .ends_with("stdindex.csv"));
        assert!(run_path(root, RunKind::Control, &id, Artifact::Invoked)
            .ends_with("invoked.csv"));
        assert!(run_path(root, RunKind::Control, &id, Artifact::Finished)
            .ends_with("finished.csv"));
        assert!(run_path(root, RunKind::Control, &id, Artifact::Running)
            .ends_with("running.csv"));
    }
}
