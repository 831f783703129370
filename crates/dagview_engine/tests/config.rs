use std::io::Write;
use std::time::Duration;

use dagview_core::{BackoffSchedule, JobStatus};
use dagview_engine::{ConfigError, EngineConfig};
use pretty_assertions::assert_eq;

#[test]
fn defaults_match_documented_values() {
    let config = EngineConfig::default();

    assert_eq!(config.sync.container_timeout, Duration::from_secs(20));
    assert_eq!(config.sync.skeleton_timeout, Duration::from_secs(15));
    assert_eq!(config.verify.change_schedule, BackoffSchedule::content_change());
    assert_eq!(config.verify.change_timeout, Duration::from_secs(20));
    assert_eq!(config.poll.schedule, BackoffSchedule::job_status());
    assert_eq!(config.poll.timeout, Duration::from_secs(300));
    assert_eq!(config.poll.terminal_states, vec![JobStatus::Success, JobStatus::Failed]);
    assert_eq!(config.page.navigate_ack_timeout, Duration::from_secs(30));
    assert_eq!(config.page.trigger_ack_timeout, Duration::from_secs(15));
    assert_eq!(config.page.list_path, "/dags");
}

#[test]
fn overrides_apply_over_defaults() {
    let config = EngineConfig::from_json_str(
        r#"{
            "sync": { "container_timeout_ms": 500 },
            "verify": { "change_intervals_ms": [100, 0, 300] },
            "poll": {
                "intervals_ms": [10, 20],
                "terminal_states": ["success", "failed", "upstream_failed"]
            },
            "page": { "list_path": "/home", "option_retries": 5 },
            "status_source": { "base_url": "http://airflow:8080" }
        }"#,
    )
    .unwrap();

    assert_eq!(config.sync.container_timeout, Duration::from_millis(500));
    assert_eq!(config.sync.items_timeout, Duration::from_secs(15));
    assert_eq!(
        config.verify.change_schedule.intervals(),
        [Duration::from_millis(100), Duration::from_millis(300)]
    );
    assert_eq!(
        config.poll.schedule.intervals(),
        [Duration::from_millis(10), Duration::from_millis(20)]
    );
    assert_eq!(
        config.poll.terminal_states,
        vec![
            JobStatus::Success,
            JobStatus::Failed,
            JobStatus::Other("upstream_failed".to_string())
        ]
    );
    assert_eq!(config.poll.failure_states, vec![JobStatus::Failed]);
    assert_eq!(config.page.list_path, "/home");
    assert_eq!(config.page.option_retries, 5);
    assert_eq!(config.status_source.base_url, "http://airflow:8080");
}

#[test]
fn unknown_keys_are_rejected() {
    let err = EngineConfig::from_json_str(r#"{ "sync": { "container_timeout": 5 } }"#).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn schedules_without_intervals_are_rejected() {
    for json in [
        r#"{ "verify": { "change_intervals_ms": [] } }"#,
        r#"{ "poll": { "intervals_ms": [0, 0] } }"#,
    ] {
        let err = EngineConfig::from_json_str(json).unwrap_err();
        assert!(matches!(err, ConfigError::EmptySchedule(_)), "{json}");
    }

    let err = EngineConfig::from_json_str(r#"{ "poll": { "intervals_ms": [] } }"#).unwrap_err();
    assert_eq!(
        err.to_string(),
        "poll.intervals_ms needs at least one non-zero interval"
    );
}

#[test]
fn loads_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, r#"{{ "poll": {{ "timeout_ms": 60000 }} }}"#).unwrap();

    let config = EngineConfig::from_path(file.path()).unwrap();
    assert_eq!(config.poll.timeout, Duration::from_secs(60));
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let err = EngineConfig::from_path(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}
