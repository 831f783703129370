use std::time::Duration;

use crate::selector::Selector;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SurfaceError {
    #[error("timed out after {waited:?} waiting for {condition}")]
    Timeout { condition: String, waited: Duration },
    #[error("no element matches {0}")]
    NotFound(String),
    #[error("driver error: {0}")]
    Driver(String),
}

impl SurfaceError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// The live rendered surface, as exposed by a browser driver adapter.
///
/// Query methods answer immediately. The `wait_for_*` methods and actions
/// are the driver's own bounded wait primitives: they return
/// [`SurfaceError::Timeout`] once `timeout` elapses and never retry beyond it.
#[async_trait::async_trait]
pub trait Surface: Send + Sync {
    async fn is_visible(&self, selector: &Selector) -> Result<bool, SurfaceError>;

    async fn is_enabled(&self, selector: &Selector) -> Result<bool, SurfaceError>;

    async fn count(&self, selector: &Selector) -> Result<usize, SurfaceError>;

    /// Text content of every match, in document order.
    async fn text_contents(&self, selector: &Selector) -> Result<Vec<String>, SurfaceError>;

    /// Value of attribute `name` for every match, in document order.
    async fn attribute_values(
        &self,
        selector: &Selector,
        name: &str,
    ) -> Result<Vec<Option<String>>, SurfaceError>;

    async fn wait_for_visible(
        &self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<(), SurfaceError>;

    async fn wait_for_enabled(
        &self,
        selector: &Selector,
        timeout: Duration,
    ) -> Result<(), SurfaceError>;

    async fn wait_for_count(
        &self,
        selector: &Selector,
        expected: usize,
        timeout: Duration,
    ) -> Result<(), SurfaceError>;

    async fn click(&self, selector: &Selector, timeout: Duration) -> Result<(), SurfaceError>;

    async fn fill(&self, selector: &Selector, value: &str) -> Result<(), SurfaceError>;

    async fn clear(&self, selector: &Selector) -> Result<(), SurfaceError>;

    async fn blur(&self, selector: &Selector) -> Result<(), SurfaceError>;

    async fn press_key(&self, key: &str) -> Result<(), SurfaceError>;
}

/// Page-level navigation.
#[async_trait::async_trait]
pub trait Navigator: Send + Sync {
    /// Navigates to a path relative to the application root.
    async fn goto(&self, path: &str) -> Result<(), SurfaceError>;

    /// Waits until the current URL contains `fragment`.
    async fn wait_for_url(&self, fragment: &str, timeout: Duration) -> Result<(), SurfaceError>;
}
