use std::fmt;

/// Lifecycle of a triggered remote job, from the click to a terminal status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TriggerPhase {
    #[default]
    Idle,
    /// The response subscription is armed and the trigger is being dispatched.
    Submitting,
    AwaitingAck,
    Acknowledged { run_id: String },
    /// No usable acknowledgment; the job's existence is unknown.
    AckTimedOut,
    Polling { run_id: String },
    Succeeded { run_id: String },
    Failed { run_id: String },
    PollTimedOut { run_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriggerEvent {
    Submit,
    Dispatched,
    /// A correlated response arrived; `run_id` is `None` when it carried no
    /// usable identifier.
    AckReceived { run_id: Option<String> },
    AckTimeout,
    PollStarted,
    PollSucceeded,
    PollFailed,
    PollTimeout,
}

/// Pure transition function. Events that do not apply to the current phase
/// leave it unchanged.
pub fn advance(phase: TriggerPhase, event: TriggerEvent) -> TriggerPhase {
    match (phase, event) {
        (TriggerPhase::Idle, TriggerEvent::Submit) => TriggerPhase::Submitting,
        (TriggerPhase::Submitting, TriggerEvent::Dispatched) => TriggerPhase::AwaitingAck,
        (TriggerPhase::AwaitingAck, TriggerEvent::AckReceived { run_id }) => match run_id {
            Some(run_id) if !run_id.is_empty() => TriggerPhase::Acknowledged { run_id },
            _ => TriggerPhase::AckTimedOut,
        },
        (TriggerPhase::AwaitingAck, TriggerEvent::AckTimeout) => TriggerPhase::AckTimedOut,
        (TriggerPhase::Acknowledged { run_id }, TriggerEvent::PollStarted) => {
            TriggerPhase::Polling { run_id }
        }
        (TriggerPhase::Polling { run_id }, TriggerEvent::PollSucceeded) => {
            TriggerPhase::Succeeded { run_id }
        }
        (TriggerPhase::Polling { run_id }, TriggerEvent::PollFailed) => {
            TriggerPhase::Failed { run_id }
        }
        (TriggerPhase::Polling { run_id }, TriggerEvent::PollTimeout) => {
            TriggerPhase::PollTimedOut { run_id }
        }
        (phase, _) => phase,
    }
}

impl TriggerPhase {
    /// Phases after which nothing further happens.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::AckTimedOut
                | Self::Succeeded { .. }
                | Self::Failed { .. }
                | Self::PollTimedOut { .. }
        )
    }

    pub fn run_id(&self) -> Option<&str> {
        match self {
            Self::Acknowledged { run_id }
            | Self::Polling { run_id }
            | Self::Succeeded { run_id }
            | Self::Failed { run_id }
            | Self::PollTimedOut { run_id } => Some(run_id),
            Self::Idle | Self::Submitting | Self::AwaitingAck | Self::AckTimedOut => None,
        }
    }
}

impl fmt::Display for TriggerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Submitting => "submitting",
            Self::AwaitingAck => "awaiting-ack",
            Self::Acknowledged { .. } => "acknowledged",
            Self::AckTimedOut => "ack-timed-out",
            Self::Polling { .. } => "polling",
            Self::Succeeded { .. } => "succeeded",
            Self::Failed { .. } => "failed",
            Self::PollTimedOut { .. } => "poll-timed-out",
        };
        f.write_str(name)
    }
}
