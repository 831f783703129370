use std::sync::Arc;

use dagview_core::ViewState;
use dagview_logging::dagview_debug;

use crate::selector::{Selector, TextPattern};
use crate::surface::{Surface, SurfaceError};

/// Locators for the list containers and their items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSelectors {
    pub card_list: Selector,
    pub table_list: Selector,
    /// Any table on the page; some table renderings lack the test id.
    pub any_table: Selector,
    pub empty_indicator: Selector,
    pub skeleton: Selector,
    pub card_item: Selector,
    pub table_item_link: Selector,
    pub table_any_link: Selector,
    pub table_row: Selector,
    /// Item links and rows of a table rendered without the test id.
    pub any_table_item_link: Selector,
    pub any_table_any_link: Selector,
    pub any_table_row: Selector,
}

impl Default for ViewSelectors {
    fn default() -> Self {
        let table_list = Selector::test_id("table-list");
        let any_table = Selector::role("table");
        Self {
            card_list: Selector::test_id("card-list"),
            // "No Dag found", "No Dags found", "NO DAG FOUND", ...
            empty_indicator: Selector::text(TextPattern::ignore_case("no dag")),
            skeleton: Selector::test_id("skeleton"),
            card_item: Selector::test_id("dag-id"),
            table_item_link: table_list
                .clone()
                .child(Selector::css("tbody tr td:nth-child(2) a")),
            table_any_link: table_list.clone().child(Selector::css("tbody tr td a")),
            table_row: table_list.clone().child(Selector::css("tbody tr")),
            any_table_item_link: any_table
                .clone()
                .child(Selector::css("tbody tr td:nth-child(2) a")),
            any_table_any_link: any_table.clone().child(Selector::css("tbody tr td a")),
            any_table_row: any_table.clone().child(Selector::css("tbody tr")),
            table_list,
            any_table,
        }
    }
}

/// One classification of the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub state: ViewState,
    /// More than one settled predicate held; `state` is the preferred one.
    pub ambiguous: bool,
}

enum ActiveView {
    Card,
    TestIdTable,
    AnyTable,
}

/// Answers "what is currently shown" without assuming the active mode.
#[derive(Clone)]
pub struct ViewStateDetector {
    surface: Arc<dyn Surface>,
    selectors: ViewSelectors,
}

impl ViewStateDetector {
    pub fn new(surface: Arc<dyn Surface>, selectors: ViewSelectors) -> Self {
        Self { surface, selectors }
    }

    pub fn selectors(&self) -> &ViewSelectors {
        &self.selectors
    }

    pub fn surface(&self) -> &Arc<dyn Surface> {
        &self.surface
    }

    pub async fn is_card_visible(&self) -> Result<bool, SurfaceError> {
        self.surface.is_visible(&self.selectors.card_list).await
    }

    pub async fn is_table_visible(&self) -> Result<bool, SurfaceError> {
        Ok(self.surface.is_visible(&self.selectors.table_list).await?
            || self.surface.is_visible(&self.selectors.any_table).await?)
    }

    pub async fn is_empty_visible(&self) -> Result<bool, SurfaceError> {
        self.surface.is_visible(&self.selectors.empty_indicator).await
    }

    pub async fn is_loading(&self) -> Result<bool, SurfaceError> {
        Ok(self.surface.count(&self.selectors.skeleton).await? > 0)
    }

    /// Classifies the surface, preferring Empty, then CardView, then TableView.
    pub async fn detect(&self) -> Result<Detection, SurfaceError> {
        let candidates = [
            (ViewState::Empty, self.is_empty_visible().await?),
            (ViewState::CardView, self.is_card_visible().await?),
            (ViewState::TableView, self.is_table_visible().await?),
        ];
        let mut settled = candidates
            .iter()
            .filter(|(_, visible)| *visible)
            .map(|(state, _)| *state);

        let detection = if let Some(state) = settled.next() {
            Detection {
                state,
                ambiguous: settled.next().is_some(),
            }
        } else {
            let state = if self.is_loading().await? {
                ViewState::Loading
            } else {
                ViewState::Unknown
            };
            Detection {
                state,
                ambiguous: false,
            }
        };
        if detection.ambiguous {
            dagview_debug!("surface matched several settled states, preferring {}", detection.state);
        }
        Ok(detection)
    }

    pub async fn current_state(&self) -> Result<ViewState, SurfaceError> {
        Ok(self.detect().await?.state)
    }

    /// Visible item names from whichever view is active, trimmed, blanks dropped.
    pub async fn current_items(&self) -> Result<Vec<String>, SurfaceError> {
        let selector = self.item_selector().await?;
        let texts = self.surface.text_contents(selector).await?;
        Ok(texts
            .iter()
            .map(|text| text.trim())
            .filter(|text| !text.is_empty())
            .map(ToOwned::to_owned)
            .collect())
    }

    /// Non-empty item link targets from the active view.
    pub async fn item_links(&self) -> Result<Vec<String>, SurfaceError> {
        let selector = self.item_selector().await?;
        let hrefs = self.surface.attribute_values(selector, "href").await?;
        Ok(hrefs
            .into_iter()
            .flatten()
            .filter(|href| !href.is_empty())
            .collect())
    }

    pub async fn count(&self) -> Result<usize, SurfaceError> {
        let rows = match self.active_view().await? {
            ActiveView::Card => &self.selectors.card_item,
            ActiveView::TestIdTable => &self.selectors.table_row,
            ActiveView::AnyTable => &self.selectors.any_table_row,
        };
        self.surface.count(rows).await
    }

    /// Whether an item whose text contains `name` is shown. Lookup failures
    /// count as "not shown".
    pub async fn item_visible(&self, name: &str) -> bool {
        let base = match self.active_view().await {
            Ok(ActiveView::Card) => self.selectors.card_item.clone(),
            Ok(ActiveView::TestIdTable) => self.selectors.table_any_link.clone(),
            Ok(ActiveView::AnyTable) => self.selectors.any_table_any_link.clone(),
            Err(_) => return false,
        };
        self.surface
            .is_visible(&base.has_text(TextPattern::exact(name)))
            .await
            .unwrap_or(false)
    }

    /// `is_visible` with driver errors read as "not visible".
    pub(crate) async fn visible_or_false(&self, selector: &Selector) -> bool {
        self.surface.is_visible(selector).await.unwrap_or(false)
    }

    async fn item_selector(&self) -> Result<&Selector, SurfaceError> {
        Ok(match self.active_view().await? {
            ActiveView::Card => &self.selectors.card_item,
            ActiveView::TestIdTable => &self.selectors.table_item_link,
            ActiveView::AnyTable => &self.selectors.any_table_item_link,
        })
    }

    /// Which rendering the item reads go to. A table without the
    /// `table-list` test id is read through the generic table locators.
    async fn active_view(&self) -> Result<ActiveView, SurfaceError> {
        if self.is_card_visible().await? {
            Ok(ActiveView::Card)
        } else if self.surface.is_visible(&self.selectors.table_list).await? {
            Ok(ActiveView::TestIdTable)
        } else {
            Ok(ActiveView::AnyTable)
        }
    }
}
