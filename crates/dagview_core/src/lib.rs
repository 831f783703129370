//! Dagview core: pure data model, derived run flags and action state machines.
mod backoff;
mod filter;
mod job;
mod run;
mod trigger;
mod version_flags;
mod view_state;

pub use backoff::{BackoffSchedule, DEFAULT_POLL_INTERVALS_MS};
pub use filter::StatusFilter;
pub use job::{JobStatus, RemoteJob};
pub use run::{Flagged, GridRun, VersionFlags, Versioned};
pub use trigger::{advance, TriggerEvent, TriggerPhase};
pub use version_flags::{compute, VersionFlagMemo, VersionIndicatorMode};
pub use view_state::ViewState;
