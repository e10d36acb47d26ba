//! Local wall-clock formatting.
//!
//! Two formats are in play: `YYYY-MM-DD HH:MM.SS` for ledger/index
//! timestamps (note the period between minutes and seconds; this is
//! deliberate, not a typo) and `YYYYMMDDtHHMMSS` for run identifiers.

use chrono::{DateTime, Local};
use std::time::SystemTime;

/// Formats a timestamp the way `invoked.csv`/`running.csv`/`finished.csv`/
/// `stdindex.csv` expect it: `YYYY-MM-DD HH:MM.SS`, local time.
pub fn format_ledger(t: SystemTime) -> String {
    let local: DateTime<Local> = t.into();
    local.format("%Y-%m-%d %H:%M.%S").to_string()
}

/// Formats the date/time component of a `RunId`: `dYYYYMMDDtHHMMSS`.
pub fn format_run_id_prefix(t: SystemTime) -> String {
    let local: DateTime<Local> = t.into();
    local.format("d%Y%m%dt%H%M%S").to_string()
}

/// Whole-second duration between two timestamps, floored at zero (a reap can
/// in principle observe `end < start` by a few ticks under clock skew; we
/// never want a negative `duration` column).
pub fn duration_secs(start: SystemTime, end: SystemTime) -> i64 {
    end.duration_since(start)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
