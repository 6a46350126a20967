use crate::browser::{Browser, Scope};
use crate::remote::session::SessionSettings;
use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder};
use harvest_common::{HarvestError, Locator, Result, Strategy};
use serde_json::Value;
use std::fmt::Display;
use tracing::info;

/// A live WebDriver session.
pub struct WebDriverBrowser {
    client: Client,
    closed: bool,
}

impl WebDriverBrowser {
    /// Connect to the WebDriver service named in `settings`.
    pub async fn connect(settings: &SessionSettings) -> Result<Self> {
        let client = ClientBuilder::native()
            .capabilities(settings.capabilities())
            .connect(&settings.webdriver_url)
            .await
            .map_err(|e| {
                HarvestError::Driver(anyhow::anyhow!(
                    "failed to open WebDriver session at {}: {e}",
                    settings.webdriver_url
                ))
            })?;

        if settings.maximize && !settings.headless {
            client
                .maximize_window()
                .await
                .map_err(|e| classify(e, "maximize window"))?;
        }

        info!(
            target: "browser.session",
            endpoint = %settings.webdriver_url,
            headless = settings.headless,
            "webdriver session opened"
        );
        Ok(Self {
            client,
            closed: false,
        })
    }
}

/// Owned form of a [`Locator`] in WebDriver terms.
enum Query {
    Css(String),
    Id(String),
    XPath(String),
}

impl Query {
    fn from_locator(locator: &Locator) -> Self {
        match locator.strategy {
            Strategy::Id => Query::Id(locator.selector.clone()),
            Strategy::Xpath => Query::XPath(locator.selector.clone()),
            Strategy::Css | Strategy::Class | Strategy::Tag => {
                Query::Css(locator.to_css().unwrap_or_else(|| locator.selector.clone()))
            }
        }
    }

    fn as_locator(&self) -> fantoccini::Locator<'_> {
        match self {
            Query::Css(css) => fantoccini::Locator::Css(css),
            Query::Id(id) => fantoccini::Locator::Id(id),
            Query::XPath(xpath) => fantoccini::Locator::XPath(xpath),
        }
    }
}

/// Map a WebDriver failure onto the typed error kinds.
fn classify(err: CmdError, context: impl Display) -> HarvestError {
    if err.is_no_such_element() {
        return HarvestError::NotFound(context.to_string());
    }
    if err.is_stale_element_reference() {
        return HarvestError::Stale(context.to_string());
    }
    HarvestError::Driver(anyhow::Error::from(err).context(context.to_string()))
}

#[async_trait]
impl Browser for WebDriverBrowser {
    type Handle = Element;

    fn backend(&self) -> &'static str {
        "webdriver"
    }

    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.client
            .goto(url)
            .await
            .map_err(|e| classify(e, format!("navigate to {url}")))
    }

    async fn current_url(&self) -> Result<String> {
        self.client
            .current_url()
            .await
            .map(|url| url.to_string())
            .map_err(|e| classify(e, "current url"))
    }

    async fn find_all(&self, scope: Scope<'_, Element>, locator: &Locator) -> Result<Vec<Element>> {
        let query = Query::from_locator(locator);
        let found = match scope {
            Scope::Document => self.client.find_all(query.as_locator()).await,
            Scope::Element(element) => element.find_all(query.as_locator()).await,
        };
        found.map_err(|e| classify(e, locator))
    }

    async fn find(&self, scope: Scope<'_, Element>, locator: &Locator) -> Result<Element> {
        let query = Query::from_locator(locator);
        let found = match scope {
            Scope::Document => self.client.find(query.as_locator()).await,
            Scope::Element(element) => element.find(query.as_locator()).await,
        };
        found.map_err(|e| classify(e, locator))
    }

    async fn click(&mut self, handle: &Element) -> Result<()> {
        handle.click().await.map_err(|e| classify(e, "click"))
    }

    async fn text(&self, handle: &Element) -> Result<String> {
        handle
            .text()
            .await
            .map(|text| text.trim().to_string())
            .map_err(|e| classify(e, "element text"))
    }

    async fn visible(&self, handle: &Element) -> Result<bool> {
        handle
            .is_displayed()
            .await
            .map_err(|e| classify(e, "element visibility"))
    }

    async fn eval(&mut self, script: &str) -> Result<Value> {
        self.client
            .execute(script, vec![])
            .await
            .map_err(|e| classify(e, "execute script"))
    }

    async fn quit(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.client
            .clone()
            .close()
            .await
            .map_err(|e| classify(e, "close session"))?;
        info!(target: "browser.session", "webdriver session closed");
        Ok(())
    }
}
