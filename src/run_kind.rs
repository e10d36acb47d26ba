//! `RunKind`: the closed enumeration a run's filesystem location and ledger
//! rows are keyed on.

/// The lifecycle bucket a run currently belongs to.
///
/// `Default` is a path-resolution sentinel only; it never appears as the
/// `kind` of a live `Run`. It means "resolve the path using this run's own
/// current kind" and exists so that callers which already hold a `RunKind`
/// they computed themselves (e.g. always `Done`, regardless of what the run
/// currently says) don't need a second code path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Control,
    Running,
    Done,
    Default,
}

impl RunKind {
    /// The directory name and `runType` ledger column value for this kind.
    ///
    /// # Panics
    /// Panics if called on `RunKind::Default`; callers must resolve the
    /// sentinel against a concrete run's kind first (see `Run::effective_kind`).
    pub fn name(self) -> &'static str {
        match self {
            RunKind::Control => "CONTROL",
            RunKind::Running => "RUNNING",
            RunKind::Done => "DONE",
            RunKind::Default => panic!("RunKind::Default has no name; resolve it first"),
        }
    }
}
