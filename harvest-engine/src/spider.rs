//! Run orchestration: navigate, bind, then extract and advance until the
//! pagination is exhausted.
use crate::container::{ContainerBlueprint, ContainerTree};
use crate::output;
use crate::pagination::{PaginationConfig, PaginationKind, Paginator};
use crate::table::ExtractionTable;
use async_trait::async_trait;
use harvest_common::{HarvestError, OutputFormat, Result};
use harvest_drivers::{Browser, WaitPolicy};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Per-run knobs that are not part of the page structure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpiderOptions {
    /// How long container binds wait for their element.
    pub wait: WaitPolicy,
    /// Forces a pagination strategy regardless of configuration.
    pub pagination_override: Option<PaginationKind>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    NotStarted,
    Navigating,
    Extracting,
    Paginating,
    Finished,
    Failed,
}

/// The three capabilities a harvesting run is made of.
#[async_trait]
pub trait Harvester {
    /// Open `url` and bind the container tree against it.
    async fn init_session(&mut self, url: &str) -> Result<()>;

    /// Extract the current page into `table`, then try to reveal the next.
    /// Returns whether another pass should follow.
    async fn run_one_pass(&mut self, table: &mut ExtractionTable) -> Result<bool>;

    /// Write `table` to `{path}.{extension}`; `None` when nothing was written.
    async fn persist(
        &self,
        table: &ExtractionTable,
        path: &Path,
        format: OutputFormat,
    ) -> Result<Option<PathBuf>>;
}

/// Owns one browser session, one container tree and one paginator.
pub struct Spider<B: Browser> {
    browser: B,
    released: bool,
    options: SpiderOptions,
    tree: Option<ContainerTree<B::Handle>>,
    paginator: Option<Paginator>,
    phase: RunPhase,
    passes: u32,
}

impl<B: Browser> Spider<B> {
    pub fn new(browser: B, options: SpiderOptions) -> Self {
        Self {
            browser,
            released: false,
            options,
            tree: None,
            paginator: None,
            phase: RunPhase::NotStarted,
            passes: 0,
        }
    }

    /// Install a fresh container tree and paginator, replacing any earlier ones.
    pub fn configure(&mut self, root: &ContainerBlueprint, pagination: &PaginationConfig) -> Result<()> {
        let paginator = pagination.resolve(self.options.pagination_override)?;
        if paginator.requires_scripts() && !self.browser.supports_scripts() {
            return Err(HarvestError::Config(format!(
                "{} pagination needs script support, which the {} backend lacks",
                paginator.state().kind,
                self.browser.backend()
            )));
        }
        self.tree = Some(ContainerTree::plant(root, self.options.wait));
        self.paginator = Some(paginator);
        self.phase = RunPhase::NotStarted;
        self.passes = 0;
        debug!(target: "engine.spider", root = %root.name, backend = self.browser.backend(), "spider configured");
        Ok(())
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Extraction passes completed by the last run.
    pub fn passes(&self) -> u32 {
        self.passes
    }

    /// Page the paginator is on, if configured.
    pub fn current_page(&self) -> Option<u32> {
        self.paginator.as_ref().map(|p| p.state().current_page)
    }

    pub fn tree(&self) -> Option<&ContainerTree<B::Handle>> {
        self.tree.as_ref()
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Harvest every page reachable from `url`.
    ///
    /// The browser session is released before this returns, whatever the
    /// outcome; a spider therefore runs at most once.
    pub async fn run(&mut self, url: &str) -> Result<ExtractionTable> {
        if self.released {
            return Err(HarvestError::Config(
                "browser session already released; build a new spider".to_string(),
            ));
        }
        let outcome = self.drive(url).await;
        let reached = self.phase;
        let released = self.release().await;

        match (outcome, released) {
            (Ok(table), Ok(())) => {
                self.phase = RunPhase::Finished;
                info!(
                    target: "engine.spider",
                    passes = self.passes,
                    rows = table.row_count(),
                    "run finished"
                );
                Ok(table)
            }
            (Ok(_), Err(err)) => {
                self.phase = RunPhase::Failed;
                error!(target: "engine.spider", error = %err, "failed to release browser session");
                Err(err)
            }
            (Err(err), released) => {
                self.phase = RunPhase::Failed;
                if let Err(release_err) = released {
                    warn!(target: "engine.spider", error = %release_err, "release after failure also failed");
                }
                error!(target: "engine.spider", phase = ?reached, error = %err, "run failed");
                Err(err)
            }
        }
    }

    /// Write `table` to `{path}.{extension}`. The table is left untouched, so a
    /// failed save can be retried elsewhere.
    pub fn save(&self, table: &ExtractionTable, path: &Path, format: OutputFormat) -> Result<Option<PathBuf>> {
        output::save(table, path, format)
    }

    async fn drive(&mut self, url: &str) -> Result<ExtractionTable> {
        self.init_session(url).await?;
        let mut table = ExtractionTable::new();
        while self.run_one_pass(&mut table).await? {}
        Ok(table)
    }

    /// Quit the browser session. Only the first call reaches the browser.
    pub async fn release(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        debug!(target: "engine.spider", backend = self.browser.backend(), "releasing browser session");
        self.browser.quit().await
    }
}

#[async_trait]
impl<B: Browser> Harvester for Spider<B> {
    async fn init_session(&mut self, url: &str) -> Result<()> {
        let url = url.trim();
        if url.is_empty() {
            return Err(HarvestError::Config("start URL is empty".to_string()));
        }
        let tree = self
            .tree
            .as_mut()
            .ok_or_else(|| HarvestError::Config("spider has no container tree; call configure first".to_string()))?;
        if self.released {
            return Err(HarvestError::Config("browser session already released".to_string()));
        }

        self.phase = RunPhase::Navigating;
        self.passes = 0;
        info!(target: "engine.spider", %url, backend = self.browser.backend(), "navigating");
        self.browser.navigate(url).await?;
        tree.bind_tree(&self.browser).await
    }

    async fn run_one_pass(&mut self, table: &mut ExtractionTable) -> Result<bool> {
        let tree = self
            .tree
            .as_mut()
            .ok_or_else(|| HarvestError::Config("spider has no container tree; call configure first".to_string()))?;
        let paginator = self
            .paginator
            .as_mut()
            .ok_or_else(|| HarvestError::Config("spider has no pagination; call configure first".to_string()))?;

        if !paginator.defers_extraction() {
            self.phase = RunPhase::Extracting;
            let mut scratch = ExtractionTable::new();
            tree.extract(&self.browser, &mut scratch).await?;
            table.append(scratch);
            self.passes += 1;
            debug!(
                target: "engine.spider",
                page = paginator.state().current_page,
                rows = table.row_count(),
                "page extracted"
            );
        }

        self.phase = RunPhase::Paginating;
        let more = paginator.advance(&mut self.browser, tree).await?;

        if !more && paginator.defers_extraction() {
            self.phase = RunPhase::Extracting;
            let mut scratch = ExtractionTable::new();
            tree.extract(&self.browser, &mut scratch).await?;
            table.append(scratch);
            self.passes += 1;
        }
        Ok(more)
    }

    async fn persist(
        &self,
        table: &ExtractionTable,
        path: &Path,
        format: OutputFormat,
    ) -> Result<Option<PathBuf>> {
        self.save(table, path, format)
    }
}
