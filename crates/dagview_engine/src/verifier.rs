use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dagview_core::{advance, BackoffSchedule, TriggerEvent, TriggerPhase, ViewState};
use dagview_logging::{dagview_debug, dagview_info, dagview_warn};
use serde::Deserialize;
use tokio::time::Instant;

use crate::network::{Ack, NetworkObserver, ObservedResponse, PendingResponse, ResponseMatcher};
use crate::poll::{poll_until, PollOutcome};
use crate::sync::ListSynchronizer;
use crate::types::{ChangeCondition, Verified, VerifyError};

#[derive(Debug, Clone)]
pub struct VerifySettings {
    /// Delays between content checks after a list-changing action.
    pub change_schedule: BackoffSchedule,
    /// Overall bound for observing a content change.
    pub change_timeout: Duration,
}

impl Default for VerifySettings {
    fn default() -> Self {
        Self {
            change_schedule: BackoffSchedule::content_change(),
            change_timeout: Duration::from_secs(20),
        }
    }
}

#[derive(Deserialize)]
struct TriggerResponse {
    dag_run_id: Option<String>,
}

/// Wraps state-changing actions with proof that they took effect.
///
/// Actions are passed as unstarted futures: nothing is dispatched until the
/// verifier awaits them, which is always after any response subscription
/// has been armed.
pub struct ActionVerifier {
    network: Arc<dyn NetworkObserver>,
    sync: ListSynchronizer,
    settings: VerifySettings,
    missing_ack_ids: AtomicU64,
}

impl ActionVerifier {
    pub fn new(
        network: Arc<dyn NetworkObserver>,
        sync: ListSynchronizer,
        settings: VerifySettings,
    ) -> Self {
        Self {
            network,
            sync,
            settings,
            missing_ack_ids: AtomicU64::new(0),
        }
    }

    pub fn synchronizer(&self) -> &ListSynchronizer {
        &self.sync
    }

    pub fn settings(&self) -> &VerifySettings {
        &self.settings
    }

    /// Trigger submissions whose acknowledgment carried no usable run id.
    pub fn missing_ack_ids(&self) -> u64 {
        self.missing_ack_ids.load(Ordering::Relaxed)
    }

    /// Arms a response subscription, performs `action` and waits for the
    /// correlated response. A missing response is not an error.
    pub async fn acknowledge<F>(
        &self,
        matcher: ResponseMatcher,
        ack_timeout: Duration,
        action: F,
    ) -> Result<Ack, VerifyError>
    where
        F: Future<Output = Result<(), VerifyError>>,
    {
        let pending = PendingResponse::arm(self.network.as_ref(), matcher, ack_timeout);
        action.await?;
        Ok(pending.wait().await)
    }

    /// Network-correlated verification: acknowledge, then settle the list.
    pub async fn correlated<F>(
        &self,
        matcher: ResponseMatcher,
        ack_timeout: Duration,
        action: F,
    ) -> Result<Verified, VerifyError>
    where
        F: Future<Output = Result<(), VerifyError>>,
    {
        let ack = self.acknowledge(matcher, ack_timeout, action).await?;
        if ack == Ack::TimedOut {
            dagview_debug!("no correlated response, relying on settle");
        }
        let state = self.sync.await_settled().await?;
        Ok(Verified { ack, state })
    }

    /// Poll-until-differs verification: snapshot the items, perform
    /// `action`, then poll until `condition` holds.
    pub async fn until_changed<F>(
        &self,
        label: &str,
        condition: ChangeCondition,
        action: F,
    ) -> Result<ViewState, VerifyError>
    where
        F: Future<Output = Result<(), VerifyError>>,
    {
        let before = self.snapshot().await?;
        action.await?;
        self.await_change(label, &before, condition).await?;
        self.sync.await_settled().await
    }

    /// Both strategies combined: the response is awaited first, then the
    /// content change is still required.
    pub async fn correlated_change<F>(
        &self,
        label: &str,
        matcher: ResponseMatcher,
        ack_timeout: Duration,
        condition: ChangeCondition,
        action: F,
    ) -> Result<Verified, VerifyError>
    where
        F: Future<Output = Result<(), VerifyError>>,
    {
        let before = self.snapshot().await?;
        let ack = self.acknowledge(matcher, ack_timeout, action).await?;
        self.await_change(label, &before, condition).await?;
        let state = self.sync.await_settled().await?;
        Ok(Verified { ack, state })
    }

    /// Submits a job-triggering action and reads the run id from its
    /// acknowledgment.
    ///
    /// Ends in `Acknowledged` or `AckTimedOut`. An unreadable or id-less
    /// response is reported as `AckTimedOut` without error.
    pub async fn submit_job<F>(
        &self,
        matcher: ResponseMatcher,
        ack_timeout: Duration,
        action: F,
    ) -> Result<TriggerPhase, VerifyError>
    where
        F: Future<Output = Result<(), VerifyError>>,
    {
        let mut phase = advance(TriggerPhase::Idle, TriggerEvent::Submit);
        let pending = PendingResponse::arm(self.network.as_ref(), matcher, ack_timeout);
        action.await?;
        phase = advance(phase, TriggerEvent::Dispatched);

        let event = match pending.wait().await {
            Ack::Received(response) => TriggerEvent::AckReceived {
                run_id: run_id_from(&response),
            },
            Ack::TimedOut => TriggerEvent::AckTimeout,
        };
        let acknowledged = matches!(event, TriggerEvent::AckReceived { .. });
        phase = advance(phase, event);

        if phase == TriggerPhase::AckTimedOut {
            if acknowledged {
                self.missing_ack_ids.fetch_add(1, Ordering::Relaxed);
                dagview_warn!("trigger acknowledged without a usable run id; skipping status checks");
            } else {
                dagview_warn!("no trigger acknowledgment within {:?}", ack_timeout);
            }
        } else {
            dagview_info!("trigger acknowledged: run {}", phase.run_id().unwrap_or_default());
        }
        Ok(phase)
    }

    async fn snapshot(&self) -> Result<Vec<String>, VerifyError> {
        self.sync.await_settled().await?;
        Ok(self.sync.detector().current_items().await?)
    }

    async fn await_change(
        &self,
        label: &str,
        before: &[String],
        condition: ChangeCondition,
    ) -> Result<(), VerifyError> {
        let started = Instant::now();
        let outcome = poll_until(
            &self.settings.change_schedule,
            self.settings.change_timeout,
            || self.has_changed(before, condition),
            |changed| *changed,
        )
        .await;

        match outcome {
            PollOutcome::Satisfied(_) => {
                dagview_debug!("{}: content changed after {:?}", label, started.elapsed());
                Ok(())
            }
            PollOutcome::TimedOut { attempts, .. } => Err(VerifyError::VerificationTimeout {
                action: label.to_string(),
                waited: started.elapsed(),
                attempts,
            }),
        }
    }

    async fn has_changed(&self, before: &[String], condition: ChangeCondition) -> bool {
        let detector = self.sync.detector();
        if condition == ChangeCondition::ItemsDifferOrEmpty
            && detector.visible_or_false(&detector.selectors().empty_indicator).await
        {
            return true;
        }
        match self.snapshot().await {
            Ok(items) => items != before,
            Err(err) => {
                dagview_debug!("content check failed: {}", err);
                false
            }
        }
    }
}

fn run_id_from(response: &ObservedResponse) -> Option<String> {
    match response.json::<TriggerResponse>() {
        Ok(body) => body.dag_run_id.filter(|id| !id.is_empty()),
        Err(err) => {
            dagview_debug!("unreadable trigger response from {}: {}", response.url, err);
            None
        }
    }
}
