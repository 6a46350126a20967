use super::fetch::PageFetcher;
use super::html;
use crate::browser::{Browser, Scope};
use async_trait::async_trait;
use harvest_common::{HarvestError, Locator, Result};
use scraper::ElementRef;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;
use url::Url;

/// Position of an element in a parsed page.
///
/// `epoch` identifies the page load the handle came from; any navigation
/// bumps the browser's epoch and turns older handles stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle {
    epoch: u64,
    ordinal: usize,
}

struct LoadedPage {
    url: Url,
    source: String,
}

/// Browser over static markup: no scripts, clicks follow links.
pub struct StaticBrowser {
    fetcher: Box<dyn PageFetcher>,
    page: Option<LoadedPage>,
    epoch: u64,
    history: Vec<String>,
    closed: bool,
}

impl StaticBrowser {
    pub fn new(fetcher: impl PageFetcher + 'static) -> Self {
        Self {
            fetcher: Box::new(fetcher),
            page: None,
            epoch: 0,
            history: Vec::new(),
            closed: false,
        }
    }

    /// URLs loaded so far, in order.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn loaded(&self) -> Result<&LoadedPage> {
        if self.closed {
            return Err(HarvestError::Driver(anyhow::anyhow!(
                "static browser session already closed"
            )));
        }
        self.page
            .as_ref()
            .ok_or_else(|| HarvestError::Config("no page loaded; navigate first".to_string()))
    }

    fn resolve_url(&self, raw: &str) -> Result<Url> {
        match Url::parse(raw) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self.page.as_ref().map(|p| &p.url).ok_or_else(|| {
                    HarvestError::Config(format!("relative URL '{raw}' without a loaded page"))
                })?;
                base.join(raw)
                    .map_err(|e| HarvestError::Config(format!("invalid URL '{raw}': {e}")))
            }
            Err(e) => Err(HarvestError::Config(format!("invalid URL '{raw}': {e}"))),
        }
    }

    fn check_epoch(&self, handle: &NodeHandle) -> Result<()> {
        if handle.epoch != self.epoch {
            return Err(HarvestError::Stale(format!(
                "element #{} belongs to page load {}, current is {}",
                handle.ordinal, handle.epoch, self.epoch
            )));
        }
        Ok(())
    }

    /// Run `f` against the live element behind `handle`.
    fn with_element<T>(&self, handle: &NodeHandle, f: impl FnOnce(ElementRef<'_>) -> T) -> Result<T> {
        self.check_epoch(handle)?;
        let doc = html::parse(&self.loaded()?.source);
        let elements = html::elements(&doc);
        let el = elements
            .get(handle.ordinal)
            .copied()
            .ok_or_else(|| HarvestError::Stale(format!("element #{} vanished", handle.ordinal)))?;
        Ok(f(el))
    }

    fn select(&self, scope: Scope<'_, NodeHandle>, locator: &Locator) -> Result<Vec<NodeHandle>> {
        let selector = html::selector_for(locator)?;
        let doc = html::parse(&self.loaded()?.source);
        let elements = html::elements(&doc);
        let scope_el = match scope {
            Scope::Document => doc.root_element(),
            Scope::Element(handle) => {
                self.check_epoch(handle)?;
                elements.get(handle.ordinal).copied().ok_or_else(|| {
                    HarvestError::Stale(format!("element #{} vanished", handle.ordinal))
                })?
            }
        };
        let index: HashMap<_, usize> = elements
            .iter()
            .enumerate()
            .map(|(ordinal, el)| (el.id(), ordinal))
            .collect();

        Ok(html::query(scope_el, &selector)
            .into_iter()
            .filter_map(|el| index.get(&el.id()).copied())
            .map(|ordinal| NodeHandle {
                epoch: self.epoch,
                ordinal,
            })
            .collect())
    }
}

#[async_trait]
impl Browser for StaticBrowser {
    type Handle = NodeHandle;

    fn backend(&self) -> &'static str {
        "static"
    }

    fn supports_scripts(&self) -> bool {
        false
    }

    async fn navigate(&mut self, url: &str) -> Result<()> {
        if self.closed {
            return Err(HarvestError::Driver(anyhow::anyhow!(
                "static browser session already closed"
            )));
        }
        let url = self.resolve_url(url)?;
        let source = self.fetcher.fetch(&url).await?;
        self.epoch += 1;
        debug!(target: "browser.static", %url, epoch = self.epoch, bytes = source.len(), "page loaded");
        self.history.push(url.to_string());
        self.page = Some(LoadedPage { url, source });
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.loaded()?.url.to_string())
    }

    async fn find_all(&self, scope: Scope<'_, NodeHandle>, locator: &Locator) -> Result<Vec<NodeHandle>> {
        self.select(scope, locator)
    }

    async fn click(&mut self, handle: &NodeHandle) -> Result<()> {
        let target = self.with_element(handle, html::link_target)?.ok_or_else(|| {
            HarvestError::Driver(anyhow::anyhow!(
                "static backend can only click links; element #{} has no href",
                handle.ordinal
            ))
        })?;
        self.navigate(&target).await
    }

    async fn text(&self, handle: &NodeHandle) -> Result<String> {
        self.with_element(handle, html::text)
    }

    async fn visible(&self, handle: &NodeHandle) -> Result<bool> {
        self.with_element(handle, |el| !html::is_hidden(el))
    }

    async fn eval(&mut self, _script: &str) -> Result<Value> {
        Err(HarvestError::Config(
            "script evaluation needs a webdriver session".to_string(),
        ))
    }

    async fn quit(&mut self) -> Result<()> {
        self.closed = true;
        self.page = None;
        Ok(())
    }
}
