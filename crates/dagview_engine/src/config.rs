use std::fs;
use std::path::Path;
use std::time::Duration;

use dagview_core::{BackoffSchedule, JobStatus};
use serde::Deserialize;

use crate::page::PageSettings;
use crate::poller::PollSettings;
use crate::status::StatusSourceSettings;
use crate::sync::SyncSettings;
use crate::verifier::VerifySettings;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{0} needs at least one non-zero interval")]
    EmptySchedule(&'static str),
}

/// All engine settings. Every field has a documented default.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub sync: SyncSettings,
    pub verify: VerifySettings,
    pub poll: PollSettings,
    pub page: PageSettings,
    pub status_source: StatusSourceSettings,
}

impl EngineConfig {
    /// Defaults with the overrides from a JSON document applied.
    ///
    /// Durations are given in milliseconds; omitted keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let overrides: Overrides = serde_json::from_str(json)?;
        let mut config = Self::default();
        overrides.apply(&mut config)?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct Overrides {
    sync: SyncOverrides,
    verify: VerifyOverrides,
    poll: PollOverrides,
    page: PageOverrides,
    status_source: StatusSourceOverrides,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct SyncOverrides {
    container_timeout_ms: Option<u64>,
    skeleton_timeout_ms: Option<u64>,
    items_timeout_ms: Option<u64>,
    race_retries: Option<usize>,
    race_retry_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct VerifyOverrides {
    change_intervals_ms: Option<Vec<u64>>,
    change_timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PollOverrides {
    intervals_ms: Option<Vec<u64>>,
    timeout_ms: Option<u64>,
    terminal_states: Option<Vec<String>>,
    failure_states: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PageOverrides {
    list_path: Option<String>,
    navigate_ack_timeout_ms: Option<u64>,
    tasks_ack_timeout_ms: Option<u64>,
    search_ack_timeout_ms: Option<u64>,
    clear_search_ack_timeout_ms: Option<u64>,
    trigger_ack_timeout_ms: Option<u64>,
    control_timeout_ms: Option<u64>,
    dialog_timeout_ms: Option<u64>,
    short_timeout_ms: Option<u64>,
    view_timeout_ms: Option<u64>,
    url_timeout_ms: Option<u64>,
    skeleton_timeout_ms: Option<u64>,
    option_retries: Option<usize>,
    option_retry_interval_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct StatusSourceOverrides {
    base_url: Option<String>,
    connect_timeout_ms: Option<u64>,
    request_timeout_ms: Option<u64>,
    max_bytes: Option<u64>,
}

fn set_ms(target: &mut Duration, millis: Option<u64>) {
    if let Some(millis) = millis {
        *target = Duration::from_millis(millis);
    }
}

fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

fn schedule(key: &'static str, millis: Vec<u64>) -> Result<BackoffSchedule, ConfigError> {
    if millis.iter().all(|ms| *ms == 0) {
        return Err(ConfigError::EmptySchedule(key));
    }
    Ok(BackoffSchedule::from_millis(&millis))
}

fn statuses(states: Vec<String>) -> Vec<JobStatus> {
    states.iter().map(|s| JobStatus::from_state(s)).collect()
}

impl Overrides {
    fn apply(self, config: &mut EngineConfig) -> Result<(), ConfigError> {
        let sync = &mut config.sync;
        set_ms(&mut sync.container_timeout, self.sync.container_timeout_ms);
        set_ms(&mut sync.skeleton_timeout, self.sync.skeleton_timeout_ms);
        set_ms(&mut sync.items_timeout, self.sync.items_timeout_ms);
        set(&mut sync.race_retries, self.sync.race_retries);
        set_ms(&mut sync.race_retry_interval, self.sync.race_retry_interval_ms);

        let verify = &mut config.verify;
        if let Some(intervals) = self.verify.change_intervals_ms {
            verify.change_schedule = schedule("verify.change_intervals_ms", intervals)?;
        }
        set_ms(&mut verify.change_timeout, self.verify.change_timeout_ms);

        let poll = &mut config.poll;
        if let Some(intervals) = self.poll.intervals_ms {
            poll.schedule = schedule("poll.intervals_ms", intervals)?;
        }
        set_ms(&mut poll.timeout, self.poll.timeout_ms);
        set(&mut poll.terminal_states, self.poll.terminal_states.map(statuses));
        set(&mut poll.failure_states, self.poll.failure_states.map(statuses));

        let page = &mut config.page;
        let p = self.page;
        set(&mut page.list_path, p.list_path);
        set_ms(&mut page.navigate_ack_timeout, p.navigate_ack_timeout_ms);
        set_ms(&mut page.tasks_ack_timeout, p.tasks_ack_timeout_ms);
        set_ms(&mut page.search_ack_timeout, p.search_ack_timeout_ms);
        set_ms(&mut page.clear_search_ack_timeout, p.clear_search_ack_timeout_ms);
        set_ms(&mut page.trigger_ack_timeout, p.trigger_ack_timeout_ms);
        set_ms(&mut page.control_timeout, p.control_timeout_ms);
        set_ms(&mut page.dialog_timeout, p.dialog_timeout_ms);
        set_ms(&mut page.short_timeout, p.short_timeout_ms);
        set_ms(&mut page.view_timeout, p.view_timeout_ms);
        set_ms(&mut page.url_timeout, p.url_timeout_ms);
        set_ms(&mut page.skeleton_timeout, p.skeleton_timeout_ms);
        set(&mut page.option_retries, p.option_retries);
        set_ms(&mut page.option_retry_interval, p.option_retry_interval_ms);

        let source = &mut config.status_source;
        set(&mut source.base_url, self.status_source.base_url);
        set_ms(&mut source.connect_timeout, self.status_source.connect_timeout_ms);
        set_ms(&mut source.request_timeout, self.status_source.request_timeout_ms);
        set(&mut source.max_bytes, self.status_source.max_bytes);
        Ok(())
    }
}
