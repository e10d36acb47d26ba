//! Sampling-event recorder: a sparse per-stream throughput trace.

use std::time::{Duration, SystemTime};

/// Minimum wall-clock gap between two samples of the same endpoint.
pub const SAMPLE_WINDOW: Duration = Duration::from_secs(9);

/// The most recent pending sample for one stream: how many bytes had been
/// copied as of `sampled_at`, and whether it has been written to the index
/// yet.
#[derive(Debug, Clone, Copy)]
pub struct SampleEvent {
    recorded: bool,
    size_at_sample: u64,
    sampled_at: SystemTime,
}

impl SampleEvent {
    pub fn new(at: SystemTime) -> Self {
        SampleEvent {
            recorded: true,
            size_at_sample: 0,
            sampled_at: at,
        }
    }

    fn set(&mut self, size: u64, at: SystemTime) {
        self.recorded = false;
        self.size_at_sample = size;
        self.sampled_at = at;
    }

    /// Takes a new sample if `bytes_copied` has grown past the previous
    /// sample's size *and* the sampling window has elapsed. No-op otherwise.
    pub fn maybe_sample(&mut self, bytes_copied: u64, now: SystemTime) {
        let elapsed = now
            .duration_since(self.sampled_at)
            .unwrap_or(Duration::ZERO);
        if bytes_copied > self.size_at_sample && elapsed >= SAMPLE_WINDOW {
            self.set(bytes_copied, now);
        }
    }

    /// Forces a sample regardless of the window, used once at finalisation
    /// so the final size is always captured in the index.
    pub fn force(&mut self, bytes_copied: u64, now: SystemTime) {
        self.set(bytes_copied, now);
    }

    pub fn is_pending(&self) -> bool {
        !self.recorded
    }

    pub fn mark_recorded(&mut self) {
        self.recorded = true;
    }

    pub fn size_at_sample(&self) -> u64 {
        self.size_at_sample
    }

    pub fn sampled_at(&self) -> SystemTime {
        self.sampled_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_sample_before_window_elapses() {
        let t0 = SystemTime::UNIX_EPOCH;
        let mut ev = SampleEvent::new(t0);
        ev.mark_recorded();
        ev.maybe_sample(100, t0 + Duration::from_secs(5));
        assert!(!ev.is_pending());
    }

    #[test]
    fn samples_after_window_if_bytes_grew() {
        let t0 = SystemTime::UNIX_EPOCH;
        let mut ev = SampleEvent::new(t0);
        ev.mark_recorded();
        ev.maybe_sample(100, t0 + Duration::from_secs(9));
        assert!(ev.is_pending());
        assert_eq!(ev.size_at_sample(), 100);
    }

    #[test]
    fn no_sample_if_bytes_unchanged() {
        let t0 = SystemTime::UNIX_EPOCH;
        let mut ev = SampleEvent::new(t0);
        ev.force(50, t0);
        ev.mark_recorded();
        ev.maybe_sample(50, t0 + Duration::from_secs(20));
        assert!(!ev.is_pending());
    }
}
