/// Substring text match, optionally case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextPattern {
    needle: String,
    ignore_case: bool,
}

impl TextPattern {
    pub fn exact(needle: impl Into<String>) -> Self {
        Self {
            needle: needle.into(),
            ignore_case: false,
        }
    }

    pub fn ignore_case(needle: impl Into<String>) -> Self {
        Self {
            needle: needle.into().to_lowercase(),
            ignore_case: true,
        }
    }

    pub fn needle(&self) -> &str {
        &self.needle
    }

    pub fn is_case_insensitive(&self) -> bool {
        self.ignore_case
    }

    pub fn matches(&self, text: &str) -> bool {
        if self.ignore_case {
            text.to_lowercase().contains(&self.needle)
        } else {
            text.contains(&self.needle)
        }
    }
}

/// Declarative element query understood by a [`crate::Surface`].
///
/// Selectors are plain data so drivers can translate them to their own
/// locator language and fakes can match them by equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// ARIA role, optionally narrowed by accessible name.
    Role { role: String, name: Option<String> },
    TestId(String),
    Text(TextPattern),
    Placeholder(String),
    Css(String),
    /// `child` resolved inside every match of `parent`.
    Within {
        parent: Box<Selector>,
        child: Box<Selector>,
    },
    /// Matches of `base` whose text contains `text`.
    HasText {
        base: Box<Selector>,
        text: TextPattern,
    },
    /// Union of several selectors.
    AnyOf(Vec<Selector>),
    First(Box<Selector>),
}

impl Selector {
    pub fn role(role: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: None,
        }
    }

    pub fn role_named(role: impl Into<String>, name: impl Into<String>) -> Self {
        Self::Role {
            role: role.into(),
            name: Some(name.into()),
        }
    }

    pub fn test_id(id: impl Into<String>) -> Self {
        Self::TestId(id.into())
    }

    pub fn text(pattern: TextPattern) -> Self {
        Self::Text(pattern)
    }

    pub fn placeholder(text: impl Into<String>) -> Self {
        Self::Placeholder(text.into())
    }

    pub fn css(css: impl Into<String>) -> Self {
        Self::Css(css.into())
    }

    pub fn child(self, child: Selector) -> Self {
        Self::Within {
            parent: Box::new(self),
            child: Box::new(child),
        }
    }

    pub fn has_text(self, text: TextPattern) -> Self {
        Self::HasText {
            base: Box::new(self),
            text,
        }
    }

    pub fn or(self, other: Selector) -> Self {
        match self {
            Self::AnyOf(mut list) => {
                list.push(other);
                Self::AnyOf(list)
            }
            first => Self::AnyOf(vec![first, other]),
        }
    }

    pub fn first(self) -> Self {
        Self::First(Box::new(self))
    }
}
