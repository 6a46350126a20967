use async_trait::async_trait;
use harvest_common::{HarvestError, Result};
use harvest_http::{HttpClient, HttpError};
use std::collections::HashMap;
use url::Url;

/// Source of page markup for [`super::StaticBrowser`].
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String>;
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch(&self, url: &Url) -> Result<String> {
        self.get_text(url.as_str()).await.map_err(|err| match err {
            // A missing page is the end of the data, not a broken run.
            HttpError::Status { status, .. } if status.as_u16() == 404 || status.as_u16() == 410 => {
                HarvestError::NotFound(format!("{url} ({status})"))
            }
            other => HarvestError::Driver(anyhow::Error::from(other)),
        })
    }
}

/// In-memory pages keyed by absolute URL.
#[derive(Debug, Clone, Default)]
pub struct FixturePages {
    pages: HashMap<String, String>,
}

impl FixturePages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `html` under `url`; the URL is normalised the way navigation
    /// resolves it.
    pub fn with_page(mut self, url: &str, html: impl Into<String>) -> Self {
        let key = Url::parse(url)
            .map(String::from)
            .unwrap_or_else(|_| url.to_string());
        self.pages.insert(key, html.into());
        self
    }
}

#[async_trait]
impl PageFetcher for FixturePages {
    async fn fetch(&self, url: &Url) -> Result<String> {
        self.pages
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| HarvestError::NotFound(format!("no fixture page for {url}")))
    }
}
