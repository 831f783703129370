use std::fmt;

/// A remote DAG run whose status can be queried by id.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteJob {
    pub dag_id: String,
    pub run_id: String,
}

impl RemoteJob {
    pub fn new(dag_id: impl Into<String>, run_id: impl Into<String>) -> Self {
        Self {
            dag_id: dag_id.into(),
            run_id: run_id.into(),
        }
    }

    /// Path of the status endpoint, relative to the API host.
    pub fn status_path(&self) -> String {
        format!("/api/v2/dags/{}/dagRuns/{}", self.dag_id, self.run_id)
    }
}

impl fmt::Display for RemoteJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.dag_id, self.run_id)
    }
}

/// Status reported for a remote job.
///
/// `Unknown` is the sentinel for a failed or unreadable status query.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobStatus {
    Queued,
    Running,
    Success,
    Failed,
    Other(String),
    Unknown,
}

impl JobStatus {
    pub fn from_state(state: &str) -> Self {
        match state {
            "queued" => Self::Queued,
            "running" => Self::Running,
            "success" => Self::Success,
            "failed" => Self::Failed,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Other(state) => state,
            Self::Unknown => "unknown",
        }
    }

    /// `{success, failed}`
    pub fn default_terminal() -> Vec<Self> {
        vec![Self::Success, Self::Failed]
    }

    /// `{failed}`
    pub fn default_failures() -> Vec<Self> {
        vec![Self::Failed]
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
