/// Last-run state filter buttons on the DAG list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusFilter {
    Success,
    Failed,
    Running,
    Queued,
    NeedsReview,
}

impl StatusFilter {
    /// Value written to the `last_dag_run_state` query parameter.
    pub fn query_value(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Running => "running",
            Self::Queued => "queued",
            Self::NeedsReview => "needs_review",
        }
    }

    /// Accessible name of the filter button.
    pub fn button_label(self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Failed => "Failed",
            Self::Running => "Running",
            Self::Queued => "Queued",
            Self::NeedsReview => "Needs Review",
        }
    }

    pub fn url_fragment(self) -> String {
        format!("last_dag_run_state={}", self.query_value())
    }
}
