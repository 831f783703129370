use std::sync::Arc;
use std::time::Duration;

use dagview_core::{BackoffSchedule, JobStatus, RemoteJob};
use dagview_logging::{dagview_debug, dagview_info, dagview_warn};
use tokio::time::Instant;

use crate::poll::{poll_until, PollOutcome};
use crate::status::JobStatusSource;
use crate::types::VerifyError;

#[derive(Debug, Clone)]
pub struct PollSettings {
    pub schedule: BackoffSchedule,
    pub timeout: Duration,
    pub terminal_states: Vec<JobStatus>,
    /// Terminal states that mean the job finished badly.
    pub failure_states: Vec<JobStatus>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            schedule: BackoffSchedule::job_status(),
            timeout: Duration::from_secs(5 * 60),
            terminal_states: JobStatus::default_terminal(),
            failure_states: JobStatus::default_failures(),
        }
    }
}

/// Polls a remote job until it reports a terminal status.
pub struct RemoteStatusPoller {
    source: Arc<dyn JobStatusSource>,
    settings: PollSettings,
}

impl RemoteStatusPoller {
    pub fn new(source: Arc<dyn JobStatusSource>, settings: PollSettings) -> Self {
        Self { source, settings }
    }

    pub fn settings(&self) -> &PollSettings {
        &self.settings
    }

    /// One status query; failures read as [`JobStatus::Unknown`].
    pub async fn query(&self, job: &RemoteJob) -> JobStatus {
        match self.source.fetch_status(job).await {
            Ok(status) => status,
            Err(err) => {
                dagview_debug!("status query for {} failed: {}", job, err);
                JobStatus::Unknown
            }
        }
    }

    /// Keeps querying until a status in `terminal_states` is seen. `Unknown`
    /// readings never end polling early; only the `timeout` does.
    pub async fn poll_until_terminal(
        &self,
        job: &RemoteJob,
        terminal_states: &[JobStatus],
        timeout: Duration,
    ) -> Result<JobStatus, VerifyError> {
        let started = Instant::now();
        dagview_info!("waiting up to {:?} for job {} to finish", timeout, job);

        let outcome = poll_until(
            &self.settings.schedule,
            timeout,
            || self.query(job),
            |status| {
                dagview_debug!("job {} status {}", job, status);
                terminal_states.contains(status)
            },
        )
        .await;

        match outcome {
            PollOutcome::Satisfied(status) => {
                dagview_info!("job {} reached {} after {:?}", job, status, started.elapsed());
                Ok(status)
            }
            PollOutcome::TimedOut { last, attempts } => {
                dagview_warn!("job {} still unfinished after {} checks", job, attempts);
                Err(VerifyError::RemoteJobTimeout {
                    job: job.clone(),
                    waited: started.elapsed(),
                    last_status: last.unwrap_or(JobStatus::Unknown),
                })
            }
        }
    }

    /// Polls with the configured terminal states and timeout.
    pub async fn wait_for_terminal(&self, job: &RemoteJob) -> Result<JobStatus, VerifyError> {
        self.poll_until_terminal(job, &self.settings.terminal_states, self.settings.timeout)
            .await
    }

    /// Like [`Self::wait_for_terminal`], but a failure state is an error.
    pub async fn verify_succeeded(&self, job: &RemoteJob) -> Result<JobStatus, VerifyError> {
        let status = self.wait_for_terminal(job).await?;
        if self.settings.failure_states.contains(&status) {
            return Err(VerifyError::RemoteJobFailed {
                job: job.clone(),
                status,
            });
        }
        Ok(status)
    }
}
