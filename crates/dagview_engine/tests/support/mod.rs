#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use dagview_core::{JobStatus, RemoteJob, StatusFilter};
use dagview_engine::{
    DagListPage, EngineConfig, JobStatusSource, Navigator, ObservedResponse, PageContext,
    PageSelectors, ResponseBus, Selector, StatusQueryError, Surface, SurfaceError, ViewSelectors,
};
use reqwest::Method;
use tokio::time::{sleep, Instant};

static INIT: Once = Once::new();

const TICK: Duration = Duration::from_millis(50);

const STATUS_FILTERS: [StatusFilter; 5] = [
    StatusFilter::Success,
    StatusFilter::Failed,
    StatusFilter::Running,
    StatusFilter::Queued,
    StatusFilter::NeedsReview,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Card,
    Table,
}

#[derive(Debug, Clone)]
struct Element {
    text: String,
    href: Option<String>,
    value: Option<String>,
}

impl Element {
    fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            href: None,
            value: None,
        }
    }

    fn link(name: &str) -> Self {
        Self {
            text: format!("  {name} "),
            href: Some(format!("/dags/{name}")),
            value: None,
        }
    }

    fn option(value: &str) -> Self {
        Self {
            text: value.to_string(),
            href: None,
            value: Some(value.to_string()),
        }
    }
}

enum Change {
    Page(usize),
    Search(String),
}

/// Scripted state of the fake page. Tests tweak it through
/// [`FakeSurface::configure`].
pub struct FakeState {
    pub mode: Mode,
    pub dags: Vec<String>,
    pub page_size: usize,
    pub page: usize,
    pub search: String,
    /// The table is rendered without its `table-list` test id.
    pub bare_table: bool,
    /// `is_visible` on the card list runs into a driver timeout.
    pub card_query_times_out: bool,
    pub url: String,
    /// Containers are hidden until then.
    pub ready_at: Instant,
    pub skeleton_until: Instant,
    /// Both views are rendered until then.
    pub ambiguous_until: Option<Instant>,
    pub stuck_pagination: bool,
    /// Delay between an action and the list reflecting it.
    pub change_delay: Duration,
    /// Applied on every navigation.
    pub load_delay: Duration,
    pub skeleton_duration: Duration,
    pub dialog_open: bool,
    pub listbox_open: bool,
    pub options: Vec<String>,
    /// Dropdown openings that will not render the options.
    pub option_failures: usize,
    options_hidden: bool,
    pub selected_options: Vec<String>,
    pub escapes: usize,
    /// Published when the trigger confirmation is clicked.
    pub trigger_response: Option<ObservedResponse>,
    /// Publish list and task responses on navigation and search.
    pub list_responses: bool,
    /// Live subscriptions at the moment the confirmation was clicked.
    pub pending_at_confirm: Option<usize>,
    pub visited: Vec<String>,
    pending: Option<(Instant, Change)>,
}

impl FakeState {
    fn apply_pending(&mut self, now: Instant) {
        if self.pending.as_ref().is_some_and(|(at, _)| now >= *at) {
            if let Some((_, change)) = self.pending.take() {
                match change {
                    Change::Page(page) => self.page = page,
                    Change::Search(term) => {
                        self.search = term;
                        self.page = 0;
                    }
                }
            }
        }
    }

    fn filtered(&self) -> Vec<String> {
        self.dags
            .iter()
            .filter(|dag| dag.contains(&self.search))
            .cloned()
            .collect()
    }

    pub fn visible_items(&self) -> Vec<String> {
        self.filtered()
            .into_iter()
            .skip(self.page * self.page_size)
            .take(self.page_size)
            .collect()
    }

    fn on_list(&self) -> bool {
        !self.url.contains("/dags/")
    }

    fn on_tasks(&self) -> bool {
        self.url.contains("/tasks")
    }
}

/// In-memory page implementing [`Surface`] and [`Navigator`]. Selectors are
/// recognized by equality with the engine's default locators.
pub struct FakeSurface {
    state: Mutex<FakeState>,
    bus: Arc<ResponseBus>,
    view: ViewSelectors,
    page: PageSelectors,
}

impl FakeSurface {
    pub fn new(mode: Mode, dags: &[&str], page_size: usize) -> Arc<Self> {
        INIT.call_once(dagview_logging::initialize_for_tests);
        let now = Instant::now();
        Arc::new(Self {
            state: Mutex::new(FakeState {
                mode,
                dags: dags.iter().map(|dag| dag.to_string()).collect(),
                page_size,
                page: 0,
                search: String::new(),
                bare_table: false,
                card_query_times_out: false,
                url: "/dags".to_string(),
                ready_at: now,
                skeleton_until: now,
                ambiguous_until: None,
                stuck_pagination: false,
                change_delay: Duration::from_millis(300),
                load_delay: Duration::ZERO,
                skeleton_duration: Duration::ZERO,
                dialog_open: false,
                listbox_open: false,
                options: Vec::new(),
                option_failures: 0,
                options_hidden: false,
                selected_options: Vec::new(),
                escapes: 0,
                trigger_response: None,
                list_responses: false,
                pending_at_confirm: None,
                visited: Vec::new(),
                pending: None,
            }),
            bus: Arc::new(ResponseBus::new()),
            view: ViewSelectors::default(),
            page: PageSelectors::default(),
        })
    }

    pub fn bus(&self) -> Arc<ResponseBus> {
        self.bus.clone()
    }

    pub fn configure(&self, f: impl FnOnce(&mut FakeState)) {
        f(&mut self.lock());
    }

    pub fn read<R>(&self, f: impl FnOnce(&FakeState) -> R) -> R {
        let mut state = self.lock();
        state.apply_pending(Instant::now());
        f(&state)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    fn resolve(&self, selector: &Selector) -> Vec<Element> {
        let now = Instant::now();
        let mut state = self.lock();
        state.apply_pending(now);
        self.elements(&state, now, selector)
    }

    fn elements(&self, s: &FakeState, now: Instant, selector: &Selector) -> Vec<Element> {
        let v = &self.view;
        let p = &self.page;
        let list = s.on_list() && now >= s.ready_at;
        let loading = now < s.skeleton_until;
        let empty = s.filtered().is_empty();
        let ambiguous = s.ambiguous_until.is_some_and(|until| now < until);
        let card = list && !empty && (s.mode == Mode::Card || ambiguous);
        let table = list && !empty && (s.mode == Mode::Table || ambiguous);
        let items = |visible: bool| {
            if visible {
                s.visible_items().iter().map(|name| Element::link(name)).collect()
            } else {
                Vec::new()
            }
        };

        if selector == &v.card_list {
            return one(card, "");
        }
        if selector == &v.table_list {
            return one(table && !s.bare_table, "");
        }
        if selector == &v.any_table {
            return one(table, "");
        }
        if selector == &v.empty_indicator {
            return one(list && empty, "No Dags found");
        }
        if selector == &v.skeleton {
            return if loading {
                vec![Element::plain(""); 3]
            } else {
                Vec::new()
            };
        }
        if selector == &v.card_item {
            return items(card && !loading);
        }
        if selector == &v.table_item_link
            || selector == &v.table_any_link
            || selector == &v.table_row
        {
            return items(table && !s.bare_table && !loading);
        }
        if selector == &v.any_table_row
            || selector == &v.any_table_item_link
            || selector == &v.any_table_any_link
        {
            return items(table && !loading);
        }
        if selector == &p.next_page
            || selector == &p.prev_page
            || selector == &p.search_input
            || selector == &p.card_view_button
            || selector == &p.table_view_button
        {
            return one(list, "");
        }
        if selector == &p.sort_select {
            return one(list && s.mode == Mode::Card, "Sort");
        }
        if selector == &p.trigger_button {
            return one(!s.on_list(), "Trigger Dag");
        }
        if selector == &p.confirm_button {
            return one(s.dialog_open, "Trigger");
        }
        if selector == &p.operator_filter
            || selector == &p.trigger_rule_filter
            || selector == &p.retries_filter
            || selector == &p.operator_header
        {
            return one(s.on_tasks(), "");
        }
        if selector == &p.task_rows {
            return if s.on_tasks() {
                vec![Element::plain("extract"), Element::plain("load")]
            } else {
                Vec::new()
            };
        }
        if selector == &p.open_listbox {
            return one(s.listbox_open, "");
        }
        if selector == &p.listbox_options {
            return if s.listbox_open && !s.options_hidden {
                s.options.iter().map(|value| Element::option(value)).collect()
            } else {
                Vec::new()
            };
        }
        if STATUS_FILTERS
            .iter()
            .any(|filter| selector == &PageSelectors::status_filter(*filter))
        {
            return one(list, "");
        }
        if let Some(value) = option_value(selector) {
            let shown = s.listbox_open && !s.options_hidden && s.options.contains(&value);
            return one(shown, &value);
        }

        match selector {
            Selector::Role { role, name: Some(name) } if role == "heading" => one(
                s.url.ends_with("/details") && s.url.contains(name.as_str()) && !loading,
                name,
            ),
            Selector::First(inner) => {
                let mut found = self.elements(s, now, inner);
                found.truncate(1);
                found
            }
            Selector::AnyOf(list) => list
                .iter()
                .flat_map(|selector| self.elements(s, now, selector))
                .collect(),
            Selector::HasText { base, text } => self
                .elements(s, now, base)
                .into_iter()
                .filter(|element| text.matches(&element.text))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Side effect of clicking or otherwise activating `selector`.
    fn activate(&self, selector: &Selector) {
        let now = Instant::now();
        let mut s = self.lock();
        s.apply_pending(now);
        let p = &self.page;

        if selector == &p.next_page || selector == &p.prev_page {
            if s.stuck_pagination {
                return;
            }
            let page = if selector == &p.next_page {
                s.page + 1
            } else {
                s.page.saturating_sub(1)
            };
            s.pending = Some((now + s.change_delay, Change::Page(page)));
        } else if selector == &p.card_view_button {
            s.mode = Mode::Card;
        } else if selector == &p.table_view_button {
            s.mode = Mode::Table;
        } else if selector == &p.trigger_button {
            s.dialog_open = true;
        } else if selector == &p.confirm_button {
            s.dialog_open = false;
            s.pending_at_confirm = Some(self.bus.pending());
            if let Some(response) = s.trigger_response.clone() {
                self.bus.publish(response);
            }
        } else if selector == &p.operator_filter
            || selector == &p.trigger_rule_filter
            || selector == &p.retries_filter
        {
            s.listbox_open = true;
            s.options_hidden = s.option_failures > 0;
            s.option_failures = s.option_failures.saturating_sub(1);
        } else if let Some(filter) = STATUS_FILTERS
            .iter()
            .find(|filter| selector == &PageSelectors::status_filter(**filter))
        {
            s.url = format!("/dags?{}", filter.url_fragment());
            s.skeleton_until = now + Duration::from_millis(300);
        } else if let Some(value) = option_value(selector) {
            s.selected_options.push(value);
            s.listbox_open = false;
        }
    }

    fn timeout(selector: &Selector, what: &str, waited: Duration) -> SurfaceError {
        SurfaceError::Timeout {
            condition: format!("{selector:?} {what}"),
            waited,
        }
    }

    fn require(&self, selector: &Selector) -> Result<(), SurfaceError> {
        if self.resolve(selector).is_empty() {
            return Err(SurfaceError::NotFound(format!("{selector:?}")));
        }
        Ok(())
    }

    fn publish(&self, url: String) {
        if self.lock().list_responses {
            self.bus
                .publish(ObservedResponse::new(Method::GET, url, 200, "{}"));
        }
    }
}

fn one(visible: bool, text: &str) -> Vec<Element> {
    if visible {
        vec![Element::plain(text)]
    } else {
        Vec::new()
    }
}

fn option_value(selector: &Selector) -> Option<String> {
    match selector {
        Selector::Css(css) => css
            .strip_prefix(r#"div[role="option"][data-value=""#)
            .and_then(|rest| rest.strip_suffix(r#""]"#))
            .map(ToOwned::to_owned),
        _ => None,
    }
}

#[async_trait]
impl Surface for FakeSurface {
    async fn is_visible(&self, selector: &Selector) -> Result<bool, SurfaceError> {
        let stalls = selector == &self.view.card_list && self.lock().card_query_times_out;
        if stalls {
            let waited = Duration::from_secs(1);
            sleep(waited).await;
            return Err(Self::timeout(selector, "visible", waited));
        }
        Ok(!self.resolve(selector).is_empty())
    }

    async fn is_enabled(&self, selector: &Selector) -> Result<bool, SurfaceError> {
        self.is_visible(selector).await
    }

    async fn count(&self, selector: &Selector) -> Result<usize, SurfaceError> {
        Ok(self.resolve(selector).len())
    }

    async fn text_contents(&self, selector: &Selector) -> Result<Vec<String>, SurfaceError> {
        Ok(self.resolve(selector).into_iter().map(|e| e.text).collect())
    }

    async fn attribute_values(
        &self,
        selector: &Selector,
        name: &str,
    ) -> Result<Vec<Option<String>>, SurfaceError> {
        Ok(self
            .resolve(selector)
            .into_iter()
            .map(|e| match name {
                "href" => e.href,
                "data-value" => e.value,
                _ => None,
            })
            .collect())
    }

    async fn wait_for_visible(
        &self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<(), SurfaceError> {
        self.wait_for_count_where(selector, timeout, "visible", |n| n > 0)
            .await
    }

    async fn wait_for_enabled(
        &self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<(), SurfaceError> {
        self.wait_for_count_where(selector, timeout, "enabled", |n| n > 0)
            .await
    }

    async fn wait_for_count(
        &self,
        selector: &Selector,
        expected: usize,
        timeout: Duration,
    ) -> Result<(), SurfaceError> {
        self.wait_for_count_where(selector, timeout, "count", |n| n == expected)
            .await
    }

    async fn click(&self, selector: &Selector, timeout: Duration) -> Result<(), SurfaceError> {
        self.wait_for_visible(selector, timeout).await?;
        self.activate(selector);
        Ok(())
    }

    async fn fill(&self, selector: &Selector, value: &str) -> Result<(), SurfaceError> {
        self.require(selector)?;
        let now = Instant::now();
        {
            let mut s = self.lock();
            s.pending = Some((now + s.change_delay, Change::Search(value.to_string())));
        }
        self.publish(format!("/api/v2/dags?limit=50&dag_id_pattern={value}"));
        Ok(())
    }

    async fn clear(&self, selector: &Selector) -> Result<(), SurfaceError> {
        self.fill(selector, "").await
    }

    async fn blur(&self, selector: &Selector) -> Result<(), SurfaceError> {
        self.require(selector)
    }

    async fn press_key(&self, key: &str) -> Result<(), SurfaceError> {
        if key == "Escape" {
            let mut s = self.lock();
            s.escapes += 1;
            s.listbox_open = false;
        }
        Ok(())
    }
}

impl FakeSurface {
    async fn wait_for_count_where(
        &self,
        selector: &Selector,
        timeout: Duration,
        what: &str,
        accept: impl Fn(usize) -> bool + Send,
    ) -> Result<(), SurfaceError> {
        let started = Instant::now();
        let deadline = started + timeout;
        loop {
            if accept(self.resolve(selector).len()) {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(Self::timeout(selector, what, started.elapsed()));
            }
            sleep(TICK.min(deadline - now)).await;
        }
    }
}

#[async_trait]
impl Navigator for FakeSurface {
    async fn goto(&self, path: &str) -> Result<(), SurfaceError> {
        {
            let now = Instant::now();
            let mut s = self.lock();
            s.url = path.to_string();
            s.visited.push(path.to_string());
            s.ready_at = now + s.load_delay;
            s.skeleton_until = now + s.load_delay + s.skeleton_duration;
            s.dialog_open = false;
            s.listbox_open = false;
        }
        if path == "/dags" {
            self.publish("/api/v2/dags?limit=50&offset=0".to_string());
        } else if path.ends_with("/tasks") {
            self.publish(format!("/api/v2{path}"));
        }
        Ok(())
    }

    async fn wait_for_url(&self, fragment: &str, timeout: Duration) -> Result<(), SurfaceError> {
        let started = Instant::now();
        let deadline = started + timeout;
        loop {
            let reached = self.lock().url.contains(fragment);
            if reached {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(SurfaceError::Timeout {
                    condition: format!("url containing {fragment}"),
                    waited: started.elapsed(),
                });
            }
            sleep(TICK.min(deadline - now)).await;
        }
    }
}

/// Status source answering from a script, then repeating `fallback`.
pub struct ScriptedStatusSource {
    script: Mutex<VecDeque<Result<JobStatus, StatusQueryError>>>,
    fallback: JobStatus,
    calls: AtomicUsize,
}

impl ScriptedStatusSource {
    pub fn new(
        script: Vec<Result<JobStatus, StatusQueryError>>,
        fallback: JobStatus,
    ) -> Arc<Self> {
        INIT.call_once(dagview_logging::initialize_for_tests);
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobStatusSource for ScriptedStatusSource {
    async fn fetch_status(&self, _job: &RemoteJob) -> Result<JobStatus, StatusQueryError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.script.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }
}

/// A page over `surface`, with its bus as the network and `status` as the
/// job status source.
pub fn page(
    surface: &Arc<FakeSurface>,
    status: Arc<ScriptedStatusSource>,
    config: &EngineConfig,
) -> DagListPage {
    let context = PageContext {
        surface: surface.clone(),
        navigator: surface.clone(),
        network: surface.bus(),
        status,
    };
    DagListPage::new(context, config)
}

pub fn dag_names(count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("dag_{i:02}")).collect()
}
