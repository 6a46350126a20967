#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;
use harvest_common::observability::{LogConfig, LogFormat};
use harvest_common::{Locator, Result};
use harvest_drivers::static_page::{FixturePages, StaticBrowser};
use harvest_drivers::{Browser, Scope};
use serde_json::{json, Value};

static INIT_PATH: OnceLock<std::path::PathBuf> = OnceLock::new();

pub fn init_test_tracing() {
    let _ = INIT_PATH.get_or_init(|| {
        let config = LogConfig {
            app_name: "harvest-tests",
            log_dir: Some(std::env::temp_dir().join("harvest-tests")),
            emit_stderr: true,
            format: if std::env::var("HARVEST_LOG_FORMAT")
                .map(|raw| raw.trim().eq_ignore_ascii_case("json"))
                .unwrap_or(false)
            {
                LogFormat::Json
            } else {
                LogFormat::Text
            },
            default_filter: "debug",
        };

        harvest_common::observability::init_logging(config).unwrap_or_default()
    });
}

pub const BASE: &str = "https://example.test";

pub fn url(path: &str) -> String {
    format!("{BASE}/{path}")
}

/// A listing page: one `.row` per title, an optional "next" link.
pub fn list_page(titles: &[&str], next: Option<&str>, next_hidden: bool) -> String {
    let rows: String = titles
        .iter()
        .map(|title| format!(r#"<div class="row"><span class="title">{title}</span></div>"#))
        .collect();
    let next = match next {
        Some(href) if next_hidden => format!(r#"<a id="next" href="{href}" style="display: none">Next</a>"#),
        Some(href) => format!(r#"<a id="next" href="{href}">Next</a>"#),
        None => String::new(),
    };
    format!(r#"<html><body><div class="items">{rows}</div>{next}</body></html>"#)
}

pub fn site(pages: &[(&str, String)]) -> StaticBrowser {
    let fixtures = pages
        .iter()
        .fold(FixturePages::new(), |acc, (path, html)| acc.with_page(&url(path), html.clone()));
    StaticBrowser::new(fixtures)
}

/// Wraps a browser, recording every side-effecting or lookup call and
/// answering scroll-extent scripts from a scripted queue.
pub struct RecordingBrowser<B> {
    inner: B,
    calls: Mutex<Vec<String>>,
    extents: VecDeque<f64>,
}

impl<B: Browser> RecordingBrowser<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            calls: Mutex::new(Vec::new()),
            extents: VecDeque::new(),
        }
    }

    /// Successive answers to the scroll-extent script; the last one repeats.
    pub fn with_extents(mut self, extents: &[f64]) -> Self {
        self.extents = extents.iter().copied().collect();
        self
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls().iter().filter(|call| call.starts_with(prefix)).count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl<B: Browser> Browser for RecordingBrowser<B> {
    type Handle = B::Handle;

    fn backend(&self) -> &'static str {
        "recording"
    }

    async fn navigate(&mut self, url: &str) -> Result<()> {
        self.record(format!("navigate {url}"));
        self.inner.navigate(url).await
    }

    async fn current_url(&self) -> Result<String> {
        self.inner.current_url().await
    }

    async fn find_all(&self, scope: Scope<'_, B::Handle>, locator: &Locator) -> Result<Vec<B::Handle>> {
        self.record(format!("find {locator}"));
        self.inner.find_all(scope, locator).await
    }

    async fn click(&mut self, handle: &B::Handle) -> Result<()> {
        self.record("click".to_string());
        self.inner.click(handle).await
    }

    async fn text(&self, handle: &B::Handle) -> Result<String> {
        self.inner.text(handle).await
    }

    async fn visible(&self, handle: &B::Handle) -> Result<bool> {
        self.inner.visible(handle).await
    }

    async fn eval(&mut self, script: &str) -> Result<Value> {
        self.record(format!("eval {script}"));
        if script.contains("scrollTo") {
            return Ok(Value::Null);
        }
        if script.contains("scrollHeight") {
            let extent = if self.extents.len() > 1 {
                self.extents.pop_front()
            } else {
                self.extents.front().copied()
            };
            return Ok(extent.map(|h| json!(h)).unwrap_or(Value::Null));
        }
        self.inner.eval(script).await
    }

    async fn quit(&mut self) -> Result<()> {
        self.record("quit".to_string());
        self.inner.quit().await
    }
}
