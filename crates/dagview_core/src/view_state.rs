use std::fmt;

/// What the list surface currently shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewState {
    /// Skeleton placeholders are rendered and nothing has settled yet.
    Loading,
    CardView,
    TableView,
    /// The "no results" indicator is shown.
    Empty,
    Unknown,
}

impl ViewState {
    /// Settled states are the only ones a verification may stop on.
    pub fn is_settled(self) -> bool {
        matches!(self, Self::CardView | Self::TableView | Self::Empty)
    }

    /// True for the two states that render item elements.
    pub fn shows_items(self) -> bool {
        matches!(self, Self::CardView | Self::TableView)
    }
}

impl fmt::Display for ViewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Loading => "loading",
            Self::CardView => "card view",
            Self::TableView => "table view",
            Self::Empty => "empty",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}
