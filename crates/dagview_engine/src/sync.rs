use std::time::Duration;

use dagview_core::ViewState;
use dagview_logging::{dagview_debug, dagview_trace};
use tokio::time::{sleep, Instant};

use crate::detector::ViewStateDetector;
use crate::surface::SurfaceError;
use crate::types::{SettlePhase, VerifyError};

#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Budget for any container or the empty indicator to appear.
    pub container_timeout: Duration,
    /// Budget for skeleton placeholders to clear.
    pub skeleton_timeout: Duration,
    /// Budget for the first item of the active view.
    pub items_timeout: Duration,
    /// Extra detections allowed while two settled states are visible at once.
    pub race_retries: usize,
    pub race_retry_interval: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            container_timeout: Duration::from_secs(20),
            skeleton_timeout: Duration::from_secs(15),
            items_timeout: Duration::from_secs(15),
            race_retries: 3,
            race_retry_interval: Duration::from_millis(250),
        }
    }
}

impl SyncSettings {
    /// Sum of the phase budgets; the default bound for [`ListSynchronizer::await_settled`].
    pub fn total_timeout(&self) -> Duration {
        self.container_timeout + self.skeleton_timeout + self.items_timeout
    }
}

/// Waits until the list reaches a settled state.
#[derive(Clone)]
pub struct ListSynchronizer {
    detector: ViewStateDetector,
    settings: SyncSettings,
}

impl ListSynchronizer {
    pub fn new(detector: ViewStateDetector, settings: SyncSettings) -> Self {
        Self { detector, settings }
    }

    pub fn detector(&self) -> &ViewStateDetector {
        &self.detector
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub async fn await_settled(&self) -> Result<ViewState, VerifyError> {
        self.await_settled_within(self.settings.total_timeout()).await
    }

    /// Two-phase settle: a container first, then the skeleton overlay and the
    /// first item. Every phase is clamped to the overall `timeout`.
    pub async fn await_settled_within(&self, timeout: Duration) -> Result<ViewState, VerifyError> {
        let started = Instant::now();
        let deadline = started + timeout;
        let selectors = self.detector.selectors();
        let surface = self.detector.surface();

        let container = selectors
            .card_list
            .clone()
            .or(selectors.table_list.clone())
            .or(selectors.empty_indicator.clone())
            .or(selectors.any_table.clone());
        let budget = phase_budget(deadline, self.settings.container_timeout);
        surface
            .wait_for_visible(&container, budget)
            .await
            .map_err(|err| settle_error(err, SettlePhase::Container, started))?;

        // No items will ever render for an empty result.
        if self.detector.visible_or_false(&selectors.empty_indicator).await {
            dagview_debug!("list settled empty after {:?}", started.elapsed());
            return Ok(ViewState::Empty);
        }

        let budget = phase_budget(deadline, self.settings.skeleton_timeout);
        surface
            .wait_for_count(&selectors.skeleton, 0, budget)
            .await
            .map_err(|err| settle_error(err, SettlePhase::Skeleton, started))?;

        if self.detector.visible_or_false(&selectors.empty_indicator).await {
            dagview_debug!("list settled empty after {:?}", started.elapsed());
            return Ok(ViewState::Empty);
        }

        let first_item = if self.detector.visible_or_false(&selectors.card_list).await {
            selectors
                .card_item
                .clone()
                .first()
                .or(selectors.empty_indicator.clone())
        } else {
            selectors
                .table_row
                .clone()
                .first()
                .or(selectors.any_table_row.clone().first())
                .or(selectors.empty_indicator.clone())
        };
        let budget = phase_budget(deadline, self.settings.items_timeout);
        surface
            .wait_for_visible(&first_item, budget)
            .await
            .map_err(|err| settle_error(err, SettlePhase::Items, started))?;

        let state = self.resolve(started, deadline).await?;
        dagview_debug!("list settled as {} after {:?}", state, started.elapsed());
        Ok(state)
    }

    /// Waits for skeleton placeholders to disappear.
    pub async fn await_skeleton_cleared(&self, timeout: Duration) -> Result<(), VerifyError> {
        let started = Instant::now();
        self.detector
            .surface()
            .wait_for_count(&self.detector.selectors().skeleton, 0, timeout)
            .await
            .map_err(|err| settle_error(err, SettlePhase::Skeleton, started))
    }

    async fn resolve(&self, started: Instant, deadline: Instant) -> Result<ViewState, VerifyError> {
        let mut races = 0;
        loop {
            let detection = self
                .detector
                .detect()
                .await
                .map_err(|err| settle_error(err, SettlePhase::Resolve, started))?;
            let retry = if !detection.state.is_settled() {
                true
            } else if detection.ambiguous && races < self.settings.race_retries {
                races += 1;
                true
            } else {
                false
            };
            if !retry {
                return Ok(detection.state);
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(VerifyError::SettleTimeout {
                    phase: SettlePhase::Resolve,
                    waited: started.elapsed(),
                });
            }
            dagview_trace!("re-detecting after transient {}", detection.state);
            sleep(self.settings.race_retry_interval.min(deadline - now)).await;
        }
    }
}

fn phase_budget(deadline: Instant, cap: Duration) -> Duration {
    deadline.saturating_duration_since(Instant::now()).min(cap)
}

fn settle_error(err: SurfaceError, phase: SettlePhase, started: Instant) -> VerifyError {
    if err.is_timeout() {
        VerifyError::SettleTimeout {
            phase,
            waited: started.elapsed(),
        }
    } else {
        VerifyError::Surface(err)
    }
}
