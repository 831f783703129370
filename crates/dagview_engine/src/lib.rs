//! Dagview engine: list synchronization, action verification and remote job polling.
mod config;
mod detector;
mod network;
mod page;
mod poll;
mod poller;
mod selector;
mod status;
mod surface;
mod sync;
mod types;
mod verifier;

pub use config::{ConfigError, EngineConfig};
pub use detector::{Detection, ViewSelectors, ViewStateDetector};
pub use network::{Ack, NetworkObserver, ObservedResponse, PendingResponse, ResponseBus, ResponseMatcher};
pub use page::{DagListPage, PageContext, PageSelectors, PageSettings, TaskFilter};
pub use poller::{PollSettings, RemoteStatusPoller};
pub use selector::{Selector, TextPattern};
pub use status::{HttpStatusSource, JobStatusSource, StatusQueryError, StatusSourceSettings};
pub use surface::{Navigator, Surface, SurfaceError};
pub use sync::{ListSynchronizer, SyncSettings};
pub use types::{ChangeCondition, SettlePhase, Verified, VerifyError};
pub use verifier::{ActionVerifier, VerifySettings};
