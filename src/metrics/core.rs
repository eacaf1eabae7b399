//! Timing helpers for stage durations

use std::time::Instant;

/// A timing guard that records its stage's duration when dropped
///
/// The duration goes to the `etl_stage_duration_seconds` histogram, labelled with the stage name.
pub struct TimingGuard {
    start: Instant,
    stage: &'static str,
}

impl TimingGuard {
    pub fn new(stage: &'static str) -> Self {
        Self {
            start: Instant::now(),
            stage,
        }
    }

    pub fn stage(&self) -> &'static str {
        self.stage
    }

    /// Seconds elapsed since the guard was created
    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Finish timing now instead of at end of scope
    pub fn finish(self) {}
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        ::metrics::histogram!(super::STAGE_DURATION_SECONDS, "stage" => self.stage)
            .record(self.elapsed_secs());
    }
}

/// Start timing a pipeline stage
///
/// ```ignore
/// let _timing = time_stage("transform");
/// // ... do work ...
/// ```
pub fn time_stage(stage: &'static str) -> TimingGuard {
    TimingGuard::new(stage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_timing_guard_measures_elapsed() {
        let guard = time_stage("test_stage");
        thread::sleep(Duration::from_millis(10));
        assert!(guard.elapsed_secs() >= 0.01);
        assert_eq!(guard.stage(), "test_stage");
        guard.finish();
    }
}
