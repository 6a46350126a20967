//! Pagination state machine.
//!
//! A [`PaginationConfig`] may describe several ways to reach the next page;
//! [`PaginationConfig::resolve`] picks exactly one of them and returns a
//! [`Paginator`] that owns the page counter. Each call to
//! [`Paginator::advance`] either reveals one more page (and refreshes the
//! container tree against it) or moves the state to `Exhausted` for good.
use crate::container::ContainerTree;
use harvest_common::{HarvestError, Locator, Result};
use harvest_drivers::wait::{wait_for, wait_until_visible};
use harvest_drivers::{Browser, Scope, WaitPolicy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info};

const SCROLL_EXTENT_SCRIPT: &str = "return document.body.scrollHeight;";
const SCROLL_TO_BOTTOM_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight);";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationKind {
    Disabled,
    NextButton,
    UrlTemplate,
    InfiniteScroll,
}

impl fmt::Display for PaginationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PaginationKind::Disabled => "disabled",
            PaginationKind::NextButton => "next_button",
            PaginationKind::UrlTemplate => "url_template",
            PaginationKind::InfiniteScroll => "infinite_scroll",
        })
    }
}

/// Maps a page number to the URL of that page.
#[derive(Clone)]
pub enum UrlTemplate {
    /// `{page}` is replaced by the page number; pages past `last_page` have no URL.
    Pattern {
        pattern: String,
        last_page: Option<u32>,
    },
    Custom(Arc<dyn Fn(u32) -> Option<String> + Send + Sync>),
}

impl UrlTemplate {
    pub fn pattern(pattern: impl Into<String>) -> Self {
        UrlTemplate::Pattern {
            pattern: pattern.into(),
            last_page: None,
        }
    }

    pub fn custom(f: impl Fn(u32) -> Option<String> + Send + Sync + 'static) -> Self {
        UrlTemplate::Custom(Arc::new(f))
    }

    pub fn with_last_page(self, last: u32) -> Self {
        match self {
            UrlTemplate::Pattern { pattern, .. } => UrlTemplate::Pattern {
                pattern,
                last_page: Some(last),
            },
            custom => custom,
        }
    }

    /// URL for `page`, or `None` when there is no such page.
    pub fn url_for(&self, page: u32) -> Option<String> {
        let url = match self {
            UrlTemplate::Pattern { pattern, last_page } => {
                if last_page.is_some_and(|last| page > last) {
                    return None;
                }
                pattern.replace("{page}", &page.to_string())
            }
            UrlTemplate::Custom(f) => f(page)?,
        };
        let url = url.trim();
        (!url.is_empty()).then(|| url.to_string())
    }
}

impl fmt::Debug for UrlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlTemplate::Pattern { pattern, last_page } => f
                .debug_struct("Pattern")
                .field("pattern", pattern)
                .field("last_page", last_page)
                .finish(),
            UrlTemplate::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// The "next page" control and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NextButton {
    pub locator: Locator,
    pub timeout: Duration,
}

impl NextButton {
    pub fn new(locator: Locator) -> Self {
        Self {
            locator,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Everything a run knows about reaching further pages.
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    pub max_pages: u32,
    pub preferred: Option<PaginationKind>,
    pub next_button: Option<NextButton>,
    pub url_template: Option<UrlTemplate>,
    pub infinite_scroll: bool,
    /// Pause after a click or scroll before the page is measured or re-bound.
    pub settle: Duration,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            max_pages: 1,
            preferred: None,
            next_button: None,
            url_template: None,
            infinite_scroll: false,
            settle: Duration::from_secs(2),
        }
    }
}

impl PaginationConfig {
    pub fn single_page() -> Self {
        Self::default()
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_preferred(mut self, kind: PaginationKind) -> Self {
        self.preferred = Some(kind);
        self
    }

    pub fn with_next_button(mut self, button: NextButton) -> Self {
        self.next_button = Some(button);
        self
    }

    pub fn with_url_template(mut self, template: UrlTemplate) -> Self {
        self.url_template = Some(template);
        self
    }

    pub fn with_infinite_scroll(mut self) -> Self {
        self.infinite_scroll = true;
        self
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    fn inferred(&self) -> PaginationKind {
        if self.infinite_scroll {
            PaginationKind::InfiniteScroll
        } else if self.url_template.is_some() {
            PaginationKind::UrlTemplate
        } else if self.next_button.is_some() {
            PaginationKind::NextButton
        } else {
            PaginationKind::Disabled
        }
    }

    /// Pick the single active strategy: `explicit`, then the preferred kind,
    /// then whatever the configured settings imply.
    pub fn resolve(&self, explicit: Option<PaginationKind>) -> Result<Paginator> {
        if self.max_pages == 0 {
            return Err(HarvestError::Config(
                "max_pages must be at least 1".to_string(),
            ));
        }
        let kind = explicit
            .or(self.preferred)
            .unwrap_or_else(|| self.inferred());
        let strategy = match kind {
            PaginationKind::Disabled => PaginationStrategy::Disabled,
            PaginationKind::InfiniteScroll => PaginationStrategy::InfiniteScroll,
            PaginationKind::UrlTemplate => PaginationStrategy::UrlTemplate(
                self.url_template.clone().ok_or_else(|| missing(kind, "url_template"))?,
            ),
            PaginationKind::NextButton => PaginationStrategy::NextButton(
                self.next_button.clone().ok_or_else(|| missing(kind, "next_button"))?,
            ),
        };
        debug!(target: "engine.pagination", %kind, max_pages = self.max_pages, "pagination resolved");
        Ok(Paginator {
            strategy,
            state: PaginationState {
                kind,
                current_page: 1,
                max_pages: self.max_pages,
                phase: PaginationPhase::Idle,
            },
            settle: self.settle,
        })
    }
}

fn missing(kind: PaginationKind, setting: &str) -> HarvestError {
    HarvestError::Config(format!("{kind} pagination selected but no {setting} configured"))
}

#[derive(Debug, Clone)]
pub enum PaginationStrategy {
    Disabled,
    NextButton(NextButton),
    UrlTemplate(UrlTemplate),
    InfiniteScroll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationPhase {
    Idle,
    Advancing,
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationState {
    pub kind: PaginationKind,
    /// Page currently on screen, starting at 1.
    pub current_page: u32,
    pub max_pages: u32,
    pub phase: PaginationPhase,
}

impl PaginationState {
    pub fn is_exhausted(&self) -> bool {
        self.phase == PaginationPhase::Exhausted
    }
}

/// Outcome of one advance attempt before bookkeeping.
enum Step {
    Advanced,
    Exhausted(&'static str),
}

#[derive(Debug, Clone)]
pub struct Paginator {
    strategy: PaginationStrategy,
    state: PaginationState,
    settle: Duration,
}

impl Paginator {
    pub fn state(&self) -> &PaginationState {
        &self.state
    }

    pub fn strategy(&self) -> &PaginationStrategy {
        &self.strategy
    }

    pub fn requires_scripts(&self) -> bool {
        matches!(self.strategy, PaginationStrategy::InfiniteScroll)
    }

    /// Infinite scroll keeps earlier rows in the DOM, so the page is read
    /// once after scrolling stops instead of once per advance.
    pub fn defers_extraction(&self) -> bool {
        matches!(self.strategy, PaginationStrategy::InfiniteScroll)
    }

    /// Reveal the next page and re-bind `tree` against it.
    ///
    /// Returns `Ok(false)` once there is nothing more to read; the paginator
    /// stays exhausted from then on. Missing or stale elements end the
    /// pagination instead of failing the run.
    pub async fn advance<B: Browser>(
        &mut self,
        browser: &mut B,
        tree: &mut ContainerTree<B::Handle>,
    ) -> Result<bool> {
        if self.state.is_exhausted() {
            return Ok(false);
        }
        if self.state.current_page >= self.state.max_pages {
            return Ok(self.exhaust("page limit reached"));
        }

        self.state.phase = PaginationPhase::Advancing;
        let step = match self.step(browser, tree).await {
            Ok(step) => step,
            Err(err) if err.is_recoverable() => {
                debug!(target: "engine.pagination", error = %err, "advance hit a missing element");
                Step::Exhausted("page structure ended")
            }
            Err(err) => {
                self.state.phase = PaginationPhase::Exhausted;
                return Err(err);
            }
        };

        match step {
            Step::Advanced => {
                self.state.current_page += 1;
                self.state.phase = PaginationPhase::Idle;
                info!(
                    target: "engine.pagination",
                    kind = %self.state.kind,
                    page = self.state.current_page,
                    "advanced"
                );
                Ok(true)
            }
            Step::Exhausted(reason) => Ok(self.exhaust(reason)),
        }
    }

    fn exhaust(&mut self, reason: &'static str) -> bool {
        self.state.phase = PaginationPhase::Exhausted;
        info!(
            target: "engine.pagination",
            kind = %self.state.kind,
            page = self.state.current_page,
            reason,
            "pagination exhausted"
        );
        false
    }

    async fn step<B: Browser>(
        &self,
        browser: &mut B,
        tree: &mut ContainerTree<B::Handle>,
    ) -> Result<Step> {
        match &self.strategy {
            PaginationStrategy::Disabled => Ok(Step::Exhausted("pagination disabled")),
            PaginationStrategy::InfiniteScroll => {
                let before = scroll_extent(browser).await?;
                browser.eval(SCROLL_TO_BOTTOM_SCRIPT).await?;
                sleep(self.settle).await;
                let after = scroll_extent(browser).await?;
                debug!(target: "engine.pagination", before, after, "scroll extent measured");
                if after == before {
                    return Ok(Step::Exhausted("scroll extent unchanged"));
                }
                tree.refresh(&*browser).await?;
                Ok(Step::Advanced)
            }
            PaginationStrategy::UrlTemplate(template) => {
                let page = self.state.current_page + 1;
                let Some(url) = template.url_for(page) else {
                    return Ok(Step::Exhausted("template produced no URL"));
                };
                debug!(target: "engine.pagination", page, %url, "navigating to templated page");
                browser.navigate(&url).await?;
                tree.refresh(&*browser).await?;
                Ok(Step::Advanced)
            }
            PaginationStrategy::NextButton(button) => {
                let policy = WaitPolicy::new(button.timeout);
                let control = wait_for(&*browser, Scope::Document, &button.locator, policy).await?;
                if !wait_until_visible(&*browser, &control, policy).await? {
                    return Ok(Step::Exhausted("next control not visible"));
                }
                browser.click(&control).await?;
                sleep(self.settle).await;
                tree.refresh(&*browser).await?;
                Ok(Step::Advanced)
            }
        }
    }
}

async fn scroll_extent<B: Browser>(browser: &mut B) -> Result<f64> {
    let value = browser.eval(SCROLL_EXTENT_SCRIPT).await?;
    value.as_f64().ok_or_else(|| {
        HarvestError::Driver(anyhow::anyhow!(
            "scroll extent script returned a non-number: {value}"
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_substitutes_page_and_respects_last_page() {
        let template = UrlTemplate::pattern("list?page={page}").with_last_page(2);
        assert_eq!(template.url_for(2).as_deref(), Some("list?page=2"));
        assert_eq!(template.url_for(3), None);
    }

    #[test]
    fn blank_custom_url_means_no_page() {
        let template = UrlTemplate::custom(|page| Some(if page < 3 { format!("p{page}") } else { " ".into() }));
        assert_eq!(template.url_for(2).as_deref(), Some("p2"));
        assert_eq!(template.url_for(3), None);
    }

    #[test]
    fn explicit_override_beats_preferred_and_inferred() {
        let config = PaginationConfig::default()
            .with_max_pages(5)
            .with_url_template(UrlTemplate::pattern("?p={page}"))
            .with_next_button(NextButton::new(Locator::id("next")))
            .with_preferred(PaginationKind::UrlTemplate);

        let paginator = config.resolve(Some(PaginationKind::NextButton)).unwrap();
        assert!(matches!(paginator.strategy(), PaginationStrategy::NextButton(_)));
        assert_eq!(paginator.state().current_page, 1);
        assert_eq!(paginator.state().phase, PaginationPhase::Idle);
    }

    #[test]
    fn inference_prefers_scroll_then_template_then_button() {
        let both = PaginationConfig::default()
            .with_url_template(UrlTemplate::pattern("?p={page}"))
            .with_next_button(NextButton::new(Locator::id("next")));
        assert_eq!(both.resolve(None).unwrap().state().kind, PaginationKind::UrlTemplate);

        let scroll = both.clone().with_infinite_scroll();
        let paginator = scroll.resolve(None).unwrap();
        assert_eq!(paginator.state().kind, PaginationKind::InfiniteScroll);
        assert!(paginator.requires_scripts());
        assert!(paginator.defers_extraction());

        let none = PaginationConfig::single_page().resolve(None).unwrap();
        assert_eq!(none.state().kind, PaginationKind::Disabled);
    }

    #[test]
    fn selecting_an_unconfigured_kind_is_a_config_error() {
        let err = PaginationConfig::default()
            .resolve(Some(PaginationKind::NextButton))
            .unwrap_err();
        assert!(matches!(err, HarvestError::Config(_)));

        let err = PaginationConfig::default().with_max_pages(0).resolve(None).unwrap_err();
        assert!(matches!(err, HarvestError::Config(_)));
    }
}
