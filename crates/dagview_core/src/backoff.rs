use std::time::Duration;

/// Intervals used when no schedule is configured.
pub const DEFAULT_POLL_INTERVALS_MS: [u64; 4] = [100, 250, 500, 1000];

/// Ordered wait durations between successive polling attempts.
///
/// Once the configured intervals are used up the last one repeats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffSchedule {
    intervals: Vec<Duration>,
}

impl BackoffSchedule {
    /// Zero intervals are dropped; an empty schedule falls back to the default.
    pub fn new(intervals: impl IntoIterator<Item = Duration>) -> Self {
        let intervals: Vec<Duration> = intervals
            .into_iter()
            .filter(|interval| !interval.is_zero())
            .collect();
        if intervals.is_empty() {
            Self::default()
        } else {
            Self { intervals }
        }
    }

    pub fn from_millis(intervals: &[u64]) -> Self {
        Self::new(intervals.iter().copied().map(Duration::from_millis))
    }

    /// 500ms, 1s, 2s: list content changes after pagination or sorting.
    pub fn content_change() -> Self {
        Self::from_millis(&[500, 1_000, 2_000])
    }

    /// 2s, 3s, 5s, 10s, 15s: remote job status checks.
    pub fn job_status() -> Self {
        Self::from_millis(&[2_000, 3_000, 5_000, 10_000, 15_000])
    }

    /// Delay to wait after the `attempt`-th probe (zero based).
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let last = self.intervals.len() - 1;
        self.intervals[attempt.min(last)]
    }

    pub fn intervals(&self) -> &[Duration] {
        &self.intervals
    }

    /// Endless sequence of delays, repeating the last interval.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..).map(move |attempt| self.delay_for(attempt))
    }
}

impl Default for BackoffSchedule {
    fn default() -> Self {
        Self {
            intervals: DEFAULT_POLL_INTERVALS_MS
                .iter()
                .copied()
                .map(Duration::from_millis)
                .collect(),
        }
    }
}
