use std::future::Future;
use std::time::Duration;

use dagview_core::BackoffSchedule;
use tokio::time::{sleep_until, timeout_at, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PollOutcome<T> {
    Satisfied(T),
    TimedOut { last: Option<T>, attempts: usize },
}

/// Probes until `is_done` accepts a value or `timeout` elapses, sleeping
/// along `schedule` between probes. A probe still running at the deadline
/// is abandoned.
pub(crate) async fn poll_until<T, P, Fut, D>(
    schedule: &BackoffSchedule,
    timeout: Duration,
    mut probe: P,
    mut is_done: D,
) -> PollOutcome<T>
where
    P: FnMut() -> Fut,
    Fut: Future<Output = T>,
    D: FnMut(&T) -> bool,
{
    let deadline = Instant::now() + timeout;
    let mut last = None;
    let mut attempts = 0;

    loop {
        match timeout_at(deadline, probe()).await {
            Ok(value) => {
                attempts += 1;
                if is_done(&value) {
                    return PollOutcome::Satisfied(value);
                }
                last = Some(value);
            }
            Err(_) => return PollOutcome::TimedOut { last, attempts },
        }

        let now = Instant::now();
        if now >= deadline {
            return PollOutcome::TimedOut { last, attempts };
        }
        let delay = schedule.delay_for(attempts - 1);
        sleep_until((now + delay).min(deadline)).await;
    }
}
