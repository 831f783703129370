use std::sync::Arc;
use std::time::Duration;

use dagview_core::{advance, JobStatus, RemoteJob, StatusFilter, TriggerEvent, TriggerPhase, ViewState};
use dagview_logging::{dagview_debug, dagview_info};
use reqwest::Method;
use tokio::time::sleep;

use crate::config::EngineConfig;
use crate::detector::{ViewSelectors, ViewStateDetector};
use crate::network::{NetworkObserver, ResponseMatcher};
use crate::poller::RemoteStatusPoller;
use crate::selector::{Selector, TextPattern};
use crate::status::JobStatusSource;
use crate::surface::{Navigator, Surface};
use crate::sync::ListSynchronizer;
use crate::types::{ChangeCondition, Verified, VerifyError};
use crate::verifier::ActionVerifier;

#[derive(Debug, Clone)]
pub struct PageSettings {
    pub list_path: String,
    pub navigate_ack_timeout: Duration,
    pub tasks_ack_timeout: Duration,
    pub search_ack_timeout: Duration,
    pub clear_search_ack_timeout: Duration,
    pub trigger_ack_timeout: Duration,
    /// Buttons, headings and task rows becoming visible.
    pub control_timeout: Duration,
    /// The trigger confirmation dialog appearing.
    pub dialog_timeout: Duration,
    /// Quick interactions: filter buttons, dropdown options, enabling.
    pub short_timeout: Duration,
    /// A view container appearing after a view switch.
    pub view_timeout: Duration,
    pub url_timeout: Duration,
    pub skeleton_timeout: Duration,
    /// Extra attempts when a dropdown option cannot be clicked.
    pub option_retries: usize,
    pub option_retry_interval: Duration,
}

impl Default for PageSettings {
    fn default() -> Self {
        Self {
            list_path: "/dags".to_string(),
            navigate_ack_timeout: Duration::from_secs(30),
            tasks_ack_timeout: Duration::from_secs(20),
            search_ack_timeout: Duration::from_secs(10),
            clear_search_ack_timeout: Duration::from_secs(5),
            trigger_ack_timeout: Duration::from_secs(15),
            control_timeout: Duration::from_secs(15),
            dialog_timeout: Duration::from_secs(10),
            short_timeout: Duration::from_secs(5),
            view_timeout: Duration::from_secs(10),
            url_timeout: Duration::from_secs(10),
            skeleton_timeout: Duration::from_secs(10),
            option_retries: 2,
            option_retry_interval: Duration::from_millis(200),
        }
    }
}

/// Locators for the page controls around the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSelectors {
    pub trigger_button: Selector,
    pub confirm_button: Selector,
    pub next_page: Selector,
    pub prev_page: Selector,
    pub search_input: Selector,
    pub operator_filter: Selector,
    pub trigger_rule_filter: Selector,
    pub retries_filter: Selector,
    pub card_view_button: Selector,
    pub table_view_button: Selector,
    /// Only rendered in card view.
    pub sort_select: Selector,
    pub open_listbox: Selector,
    pub listbox_options: Selector,
    pub operator_header: Selector,
    pub task_rows: Selector,
}

impl Default for PageSelectors {
    fn default() -> Self {
        let open_listbox = Selector::css(r#"div[role="listbox"][data-state="open"]"#).first();
        Self {
            trigger_button: Selector::role_named("button", "Trigger Dag"),
            confirm_button: Selector::css(r#"[role="dialog"], [role="alertdialog"]"#)
                .child(Selector::role_named("button", "Trigger")),
            next_page: Selector::test_id("next"),
            prev_page: Selector::test_id("prev"),
            search_input: Selector::placeholder("Search Dags"),
            operator_filter: combobox("operator"),
            trigger_rule_filter: combobox("trigger"),
            retries_filter: combobox("retr"),
            card_view_button: Selector::role_named("button", "Show card view"),
            table_view_button: Selector::role_named("button", "Show table view"),
            sort_select: Selector::test_id("sort-by-select"),
            listbox_options: open_listbox.clone().child(Selector::css(r#"div[role="option"]"#)),
            open_listbox,
            operator_header: Selector::role_named("columnheader", "Operator"),
            task_rows: Selector::test_id("table-list").child(Selector::css("tbody > tr")),
        }
    }
}

impl PageSelectors {
    pub fn status_filter(filter: StatusFilter) -> Selector {
        Selector::role_named("button", filter.button_label())
    }

    pub fn option_value(value: &str) -> Selector {
        Selector::css(format!(r#"div[role="option"][data-value="{value}"]"#))
    }

    pub fn heading(name: &str) -> Selector {
        Selector::role_named("heading", name)
    }

    pub fn task_filter(&self, filter: TaskFilter) -> &Selector {
        match filter {
            TaskFilter::Operator => &self.operator_filter,
            TaskFilter::TriggerRule => &self.trigger_rule_filter,
            TaskFilter::Retries => &self.retries_filter,
        }
    }
}

fn combobox(label: &str) -> Selector {
    Selector::role("combobox").has_text(TextPattern::ignore_case(label))
}

/// Dropdown filters on the task list of a DAG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFilter {
    Operator,
    TriggerRule,
    Retries,
}

/// Collaborators a page drives.
#[derive(Clone)]
pub struct PageContext {
    pub surface: Arc<dyn Surface>,
    pub navigator: Arc<dyn Navigator>,
    pub network: Arc<dyn NetworkObserver>,
    pub status: Arc<dyn JobStatusSource>,
}

/// The DAG list page: every operation settles the list, acts, and verifies
/// the effect before returning.
///
/// State-changing operations take `&mut self`, so one page object never runs
/// two actions against the surface at once.
pub struct DagListPage {
    surface: Arc<dyn Surface>,
    navigator: Arc<dyn Navigator>,
    verifier: ActionVerifier,
    poller: RemoteStatusPoller,
    selectors: PageSelectors,
    settings: PageSettings,
}

impl DagListPage {
    pub fn new(context: PageContext, config: &EngineConfig) -> Self {
        let detector = ViewStateDetector::new(context.surface.clone(), ViewSelectors::default());
        let sync = ListSynchronizer::new(detector, config.sync.clone());
        Self {
            surface: context.surface,
            navigator: context.navigator,
            verifier: ActionVerifier::new(context.network, sync, config.verify.clone()),
            poller: RemoteStatusPoller::new(context.status, config.poll.clone()),
            selectors: PageSelectors::default(),
            settings: config.page.clone(),
        }
    }

    pub fn dag_detail_path(dag_id: &str) -> String {
        format!("/dags/{dag_id}")
    }

    pub fn dag_run_details_path(dag_id: &str, run_id: &str) -> String {
        format!("/dags/{dag_id}/runs/{run_id}/details")
    }

    pub fn verifier(&self) -> &ActionVerifier {
        &self.verifier
    }

    pub fn poller(&self) -> &RemoteStatusPoller {
        &self.poller
    }

    pub fn detector(&self) -> &ViewStateDetector {
        self.verifier.synchronizer().detector()
    }

    fn sync(&self) -> &ListSynchronizer {
        self.verifier.synchronizer()
    }

    pub async fn navigate(&mut self) -> Result<Verified, VerifyError> {
        let matcher = ResponseMatcher::new()
            .url_contains("/api/v2/dags")
            .status(200);
        let goto = async {
            self.navigator.goto(&self.settings.list_path).await?;
            Ok::<(), VerifyError>(())
        };
        self.verifier
            .correlated(matcher, self.settings.navigate_ack_timeout, goto)
            .await
    }

    pub async fn navigate_to_dag_detail(&mut self, dag_id: &str) -> Result<(), VerifyError> {
        self.navigator.goto(&Self::dag_detail_path(dag_id)).await?;
        Ok(())
    }

    pub async fn navigate_to_dag_tasks(&mut self, dag_id: &str) -> Result<(), VerifyError> {
        let path = format!("/dags/{dag_id}/tasks");
        let matcher = ResponseMatcher::new().url_contains(path.as_str()).status(200);
        let goto = async {
            self.navigator.goto(&path).await?;
            Ok::<(), VerifyError>(())
        };
        self.verifier
            .acknowledge(matcher, self.settings.tasks_ack_timeout, goto)
            .await?;

        let timeout = self.settings.control_timeout;
        self.surface
            .wait_for_visible(&self.selectors.operator_header, timeout)
            .await?;
        self.surface
            .wait_for_visible(&self.selectors.task_rows.clone().first(), timeout)
            .await?;
        Ok(())
    }

    /// Types `term` into the search box and waits for the list to change or
    /// report no results.
    pub async fn search(&mut self, term: &str) -> Result<Verified, VerifyError> {
        let matcher = ResponseMatcher::new().url_contains("/dags").status(200);
        let fill = async {
            self.surface.fill(&self.selectors.search_input, term).await?;
            Ok::<(), VerifyError>(())
        };
        self.verifier
            .correlated_change(
                "search",
                matcher,
                self.settings.search_ack_timeout,
                ChangeCondition::ItemsDifferOrEmpty,
                fill,
            )
            .await
    }

    pub async fn clear_search(&mut self) -> Result<Verified, VerifyError> {
        let matcher = ResponseMatcher::new().url_contains("/dags").status(200);
        let clear = async {
            self.surface.clear(&self.selectors.search_input).await?;
            self.surface.blur(&self.selectors.search_input).await?;
            Ok::<(), VerifyError>(())
        };
        self.verifier
            .correlated(matcher, self.settings.clear_search_ack_timeout, clear)
            .await
    }

    pub async fn next_page(&mut self) -> Result<ViewState, VerifyError> {
        self.paginate("next page", &self.selectors.next_page.clone()).await
    }

    pub async fn prev_page(&mut self) -> Result<ViewState, VerifyError> {
        self.paginate("previous page", &self.selectors.prev_page.clone()).await
    }

    async fn paginate(&self, label: &str, button: &Selector) -> Result<ViewState, VerifyError> {
        let click = async {
            self.surface
                .click(button, self.settings.control_timeout)
                .await?;
            Ok::<(), VerifyError>(())
        };
        self.verifier
            .until_changed(label, ChangeCondition::ItemsDiffer, click)
            .await
    }

    /// Opens the sort dropdown (card view only).
    pub async fn click_sort_select(&mut self) -> Result<(), VerifyError> {
        self.surface
            .click(&self.selectors.sort_select, self.settings.control_timeout)
            .await?;
        Ok(())
    }

    pub async fn filter_by_status(&mut self, filter: StatusFilter) -> Result<(), VerifyError> {
        let button = PageSelectors::status_filter(filter);
        let timeout = self.settings.short_timeout;
        self.surface.wait_for_visible(&button, timeout).await?;
        self.surface.click(&button, timeout).await?;
        self.navigator
            .wait_for_url(&filter.url_fragment(), self.settings.url_timeout)
            .await?;
        self.sync()
            .await_skeleton_cleared(self.settings.skeleton_timeout)
            .await
    }

    pub async fn filter_by_operator(&mut self, operator: &str) -> Result<(), VerifyError> {
        self.filter_by(TaskFilter::Operator, operator).await
    }

    pub async fn filter_by_trigger_rule(&mut self, rule: &str) -> Result<(), VerifyError> {
        self.filter_by(TaskFilter::TriggerRule, rule).await
    }

    pub async fn filter_by_retries(&mut self, retries: &str) -> Result<(), VerifyError> {
        self.filter_by(TaskFilter::Retries, retries).await
    }

    /// Selects `value` in a task filter dropdown, reopening the dropdown a
    /// bounded number of times when the option cannot be clicked.
    pub async fn filter_by(&mut self, filter: TaskFilter, value: &str) -> Result<(), VerifyError> {
        let dropdown = self.selectors.task_filter(filter).clone();
        let option = PageSelectors::option_value(value);
        let mut retries = 0;
        loop {
            self.surface
                .click(&dropdown, self.settings.control_timeout)
                .await?;
            match self.surface.click(&option, self.settings.short_timeout).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_timeout() && retries < self.settings.option_retries => {
                    retries += 1;
                    dagview_debug!("option {} not clickable, retry {}", value, retries);
                    self.surface.press_key("Escape").await?;
                    sleep(self.settings.option_retry_interval).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Values offered by a task filter dropdown. The dropdown is closed again.
    pub async fn filter_options(&mut self, filter: TaskFilter) -> Result<Vec<String>, VerifyError> {
        let timeout = self.settings.short_timeout;
        self.surface
            .click(self.selectors.task_filter(filter), self.settings.control_timeout)
            .await?;
        self.surface
            .wait_for_visible(&self.selectors.open_listbox, timeout)
            .await?;
        self.surface
            .wait_for_visible(&self.selectors.listbox_options.clone().first(), timeout)
            .await?;
        let values = self
            .surface
            .attribute_values(&self.selectors.listbox_options, "data-value")
            .await?;
        self.surface.press_key("Escape").await?;

        Ok(values
            .into_iter()
            .flatten()
            .filter(|value| !value.trim().is_empty())
            .collect())
    }

    pub async fn item_names(&self) -> Result<Vec<String>, VerifyError> {
        self.sync().await_settled().await?;
        Ok(self.detector().current_items().await?)
    }

    pub async fn item_links(&self) -> Result<Vec<String>, VerifyError> {
        self.sync().await_settled().await?;
        Ok(self.detector().item_links().await?)
    }

    pub async fn item_count(&self) -> Result<usize, VerifyError> {
        self.sync().await_settled().await?;
        Ok(self.detector().count().await?)
    }

    pub async fn item_exists(&self, dag_id: &str) -> Result<bool, VerifyError> {
        self.sync().await_settled().await?;
        Ok(self.detector().item_visible(dag_id).await)
    }

    pub async fn switch_to_card_view(&mut self) -> Result<(), VerifyError> {
        let button = self.selectors.card_view_button.clone();
        let container = self.detector().selectors().card_list.clone();
        self.switch_view(&button, &container).await
    }

    pub async fn switch_to_table_view(&mut self) -> Result<(), VerifyError> {
        let button = self.selectors.table_view_button.clone();
        let container = self.detector().selectors().any_table.clone();
        self.switch_view(&button, &container).await
    }

    async fn switch_view(&self, button: &Selector, container: &Selector) -> Result<(), VerifyError> {
        self.surface
            .wait_for_visible(button, self.settings.control_timeout)
            .await?;
        self.surface
            .wait_for_enabled(button, self.settings.view_timeout)
            .await?;
        self.surface
            .click(button, self.settings.control_timeout)
            .await?;
        self.surface
            .wait_for_visible(container, self.settings.view_timeout)
            .await?;
        Ok(())
    }

    pub async fn verify_card_view_visible(&self) -> Result<(), VerifyError> {
        self.surface
            .wait_for_visible(&self.detector().selectors().card_list, self.settings.view_timeout)
            .await?;
        Ok(())
    }

    pub async fn verify_table_view_visible(&self) -> Result<(), VerifyError> {
        self.surface
            .wait_for_visible(&self.detector().selectors().any_table, self.settings.view_timeout)
            .await?;
        Ok(())
    }

    pub async fn verify_list_visible(&self) -> Result<ViewState, VerifyError> {
        self.sync().await_settled().await
    }

    /// Opens the details tab of a DAG and waits for its heading.
    pub async fn verify_dag_details(&mut self, dag_id: &str) -> Result<(), VerifyError> {
        self.navigator.goto(&format!("/dags/{dag_id}/details")).await?;
        self.sync()
            .await_skeleton_cleared(self.settings.skeleton_timeout)
            .await?;
        self.surface
            .wait_for_visible(&PageSelectors::heading(dag_id), self.settings.control_timeout)
            .await?;
        Ok(())
    }

    /// Triggers a DAG run from its detail page and returns the run, if the
    /// backend acknowledged it with an id.
    pub async fn trigger_dag(&mut self, dag_id: &str) -> Result<Option<RemoteJob>, VerifyError> {
        let phase = self.submit_trigger(dag_id).await?;
        Ok(phase.run_id().map(|run_id| RemoteJob::new(dag_id, run_id)))
    }

    /// Waits for a triggered run to finish successfully. Without a run
    /// there is nothing to check.
    pub async fn verify_run_status(
        &self,
        job: Option<&RemoteJob>,
    ) -> Result<Option<JobStatus>, VerifyError> {
        match job {
            Some(job) => Ok(Some(self.poller.verify_succeeded(job).await?)),
            None => {
                dagview_debug!("no run id available, skipping status verification");
                Ok(None)
            }
        }
    }

    /// Triggers a DAG run and follows it to a terminal phase.
    ///
    /// Returns `AckTimedOut` when the run id is unknown and `Succeeded` on
    /// success; a failed run or a polling timeout is an error.
    pub async fn trigger_and_verify(&mut self, dag_id: &str) -> Result<TriggerPhase, VerifyError> {
        let phase = self.submit_trigger(dag_id).await?;
        let Some(run_id) = phase.run_id().map(ToOwned::to_owned) else {
            return Ok(phase);
        };

        let job = RemoteJob::new(dag_id, run_id);
        let phase = advance(phase, TriggerEvent::PollStarted);
        let event = match self.poller.verify_succeeded(&job).await {
            Ok(_) => TriggerEvent::PollSucceeded,
            Err(err @ VerifyError::RemoteJobFailed { .. }) => {
                dagview_info!("job {} -> {}", job, advance(phase, TriggerEvent::PollFailed));
                return Err(err);
            }
            Err(err @ VerifyError::RemoteJobTimeout { .. }) => {
                dagview_info!("job {} -> {}", job, advance(phase, TriggerEvent::PollTimeout));
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        let phase = advance(phase, event);
        dagview_info!("job {} -> {}", job, phase);
        Ok(phase)
    }

    async fn submit_trigger(&mut self, dag_id: &str) -> Result<TriggerPhase, VerifyError> {
        self.navigate_to_dag_detail(dag_id).await?;
        let trigger = &self.selectors.trigger_button;
        self.surface
            .wait_for_visible(trigger, self.settings.control_timeout)
            .await?;
        self.surface
            .click(trigger, self.settings.control_timeout)
            .await?;

        let matcher = ResponseMatcher::new()
            .method(Method::POST)
            .url_contains("dagRuns")
            .url_excludes("hitlDetails");
        let confirm = &self.selectors.confirm_button;
        let submit = async {
            self.surface
                .wait_for_visible(confirm, self.settings.dialog_timeout)
                .await?;
            self.surface
                .wait_for_enabled(confirm, self.settings.short_timeout)
                .await?;
            self.surface
                .click(confirm, self.settings.short_timeout)
                .await?;
            Ok::<(), VerifyError>(())
        };
        self.verifier
            .submit_job(matcher, self.settings.trigger_ack_timeout, submit)
            .await
    }
}
