pub mod webdriver;

#[cfg(test)]
pub mod fixture;

use async_trait::async_trait;
use thiserror::Error;

pub use webdriver::WebDriverPage;

/// Errors raised while driving a browser page
#[derive(Debug, Error)]
pub enum PageError {
    #[error("failed to start WebDriver session: {0}")]
    Session(String),

    #[error("WebDriver command failed: {0}")]
    Command(String),

    #[error("invalid selector {0:?}")]
    InvalidSelector(String),

    #[error("element is no longer attached to the page")]
    StaleElement,

    #[error("timed out waiting for {0}")]
    Timeout(String),
}

impl From<fantoccini::error::CmdError> for PageError {
    fn from(error: fantoccini::error::CmdError) -> Self {
        PageError::Command(error.to_string())
    }
}

/// One browser tab as seen by the page agent.
///
/// `generation` increases on every navigation. Elements obtained before a
/// navigation must not be used after it.
#[async_trait]
pub trait Page: Send + Sync {
    type Element: Clone + Send + Sync;

    /// Navigation counter of the tab
    fn generation(&self) -> u64;

    async fn current_url(&self) -> Result<String, PageError>;

    async fn goto(&self, url: &str) -> Result<(), PageError>;

    /// Wait until the document reports it finished loading
    async fn wait_for_load(&self) -> Result<(), PageError>;

    /// Serialized DOM of the current document
    async fn source(&self) -> Result<String, PageError>;

    async fn find_all(&self, selector: &str) -> Result<Vec<Self::Element>, PageError>;

    async fn find_within(
        &self,
        scope: &Self::Element,
        selector: &str,
    ) -> Result<Vec<Self::Element>, PageError>;

    async fn attr(&self, element: &Self::Element, name: &str) -> Result<Option<String>, PageError>;

    async fn text(&self, element: &Self::Element) -> Result<String, PageError>;

    async fn is_enabled(&self, element: &Self::Element) -> Result<bool, PageError>;

    async fn is_displayed(&self, element: &Self::Element) -> Result<bool, PageError>;

    async fn click(&self, element: &Self::Element) -> Result<(), PageError>;

    async fn scroll_into_view(&self, element: &Self::Element) -> Result<(), PageError>;

    /// Value of `name` on the element or its nearest ancestor carrying it
    async fn closest_attr(
        &self,
        element: &Self::Element,
        name: &str,
    ) -> Result<Option<String>, PageError>;
}

/// First element matching `selector`, if any
pub async fn find_first<P: Page>(page: &P, selector: &str) -> Result<Option<P::Element>, PageError> {
    Ok(page.find_all(selector).await?.into_iter().next())
}
