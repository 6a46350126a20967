use async_trait::async_trait;
use harvest_common::{HarvestError, Locator, Result};
use serde_json::Value;

/// Where a lookup starts: the whole document or below a bound element.
#[derive(Debug)]
pub enum Scope<'a, H> {
    Document,
    Element(&'a H),
}

impl<H> Clone for Scope<'_, H> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<H> Copy for Scope<'_, H> {}

/// Primitive capabilities of one browser session.
///
/// Handles are opaque and only valid until the next navigation or DOM
/// mutation; using one afterwards yields [`HarvestError::Stale`]. Lookups
/// never wait: see [`crate::wait`] for timeout-bounded polling.
#[async_trait]
pub trait Browser: Send + Sync {
    type Handle: Clone + Send + Sync + 'static;

    /// Short backend name used in logs.
    fn backend(&self) -> &'static str;

    /// Whether [`Browser::eval`] can run scripts in the page.
    fn supports_scripts(&self) -> bool {
        true
    }

    async fn navigate(&mut self, url: &str) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    /// All elements matching `locator` below `scope`, in document order.
    async fn find_all(
        &self,
        scope: Scope<'_, Self::Handle>,
        locator: &Locator,
    ) -> Result<Vec<Self::Handle>>;

    /// First element matching `locator` below `scope`, or `NotFound`.
    async fn find(&self, scope: Scope<'_, Self::Handle>, locator: &Locator) -> Result<Self::Handle> {
        self.find_all(scope, locator)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| HarvestError::NotFound(locator.to_string()))
    }

    async fn click(&mut self, handle: &Self::Handle) -> Result<()>;

    /// Rendered text of the element, whitespace-trimmed.
    async fn text(&self, handle: &Self::Handle) -> Result<String>;

    async fn visible(&self, handle: &Self::Handle) -> Result<bool>;

    async fn eval(&mut self, script: &str) -> Result<Value>;

    /// Release the session. Calling it twice is a no-op.
    async fn quit(&mut self) -> Result<()>;
}
