use std::fmt;
use std::time::Duration;

use dagview_core::{JobStatus, RemoteJob, ViewState};

use crate::network::Ack;
use crate::surface::SurfaceError;

/// Step of the settle sequence that ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlePhase {
    /// Waiting for any of the list containers or the empty indicator.
    Container,
    /// Waiting for skeleton placeholders to disappear.
    Skeleton,
    /// Waiting for the first item of the active view.
    Items,
    /// Re-resolving the final state.
    Resolve,
}

impl fmt::Display for SettlePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Container => "container",
            Self::Skeleton => "skeleton",
            Self::Items => "items",
            Self::Resolve => "resolve",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum VerifyError {
    #[error("list did not settle ({phase} phase) within {waited:?}")]
    SettleTimeout { phase: SettlePhase, waited: Duration },
    #[error("{action}: no content change observed within {waited:?} after {attempts} checks")]
    VerificationTimeout {
        action: String,
        waited: Duration,
        attempts: usize,
    },
    #[error("job {job} did not finish within {waited:?} (last status {last_status})")]
    RemoteJobTimeout {
        job: RemoteJob,
        waited: Duration,
        last_status: JobStatus,
    },
    #[error("job {job} finished with status {status}")]
    RemoteJobFailed { job: RemoteJob, status: JobStatus },
    #[error("timed out after {waited:?} waiting for {condition}")]
    ElementTimeout { condition: String, waited: Duration },
    #[error("surface error: {0}")]
    Surface(SurfaceError),
}

impl From<SurfaceError> for VerifyError {
    fn from(err: SurfaceError) -> Self {
        match err {
            SurfaceError::Timeout { condition, waited } => Self::ElementTimeout { condition, waited },
            other => Self::Surface(other),
        }
    }
}

/// A verified network-correlated action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    pub ack: Ack,
    pub state: ViewState,
}

/// What counts as proof that a list-changing action took effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeCondition {
    /// The visible items differ from the snapshot.
    ItemsDiffer,
    /// The items differ, or the empty indicator is shown.
    ItemsDifferOrEmpty,
}
