use std::fmt;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use harvest_common::observability::{init_logging, LogConfig, LogFormat};
use harvest_config::{default_config_paths, Backend, HarvestConfigLoader};
use harvest_drivers::remote::WebDriverBrowser;
use harvest_drivers::static_page::StaticBrowser;
use harvest_drivers::Browser;
use harvest_engine::Spider;
use scenario::Job;
use tracing::{error, info};

mod scenario;

/// Run one predefined harvesting scenario and save its table.
#[derive(Debug, Parser)]
#[command(name = "harvest", version)]
struct Cli {
    /// Scenario name from the catalogue (built-in or harvest.yaml).
    scenario: String,
}

/// What a finished run printed for the operator.
struct Report {
    scenario: String,
    pages: u32,
    passes: u32,
    rows: usize,
    columns: usize,
    saved: Option<PathBuf>,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "scenario: {}", self.scenario)?;
        writeln!(f, "pages visited: {}", self.pages)?;
        writeln!(f, "extraction passes: {}", self.passes)?;
        writeln!(f, "rows: {} ({} columns)", self.rows, self.columns)?;
        match &self.saved {
            Some(path) => write!(f, "saved to: {}", path.display()),
            None => write!(f, "nothing saved: the table is empty"),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(&cli).await {
        Ok(report) => {
            println!("{report}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(scenario = %cli.scenario, error = %format!("{err:#}"), "harvest failed");
            println!("harvest failed: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<Report> {
    // 1) Config: built-in catalogue, then harvest.yaml files, env wins.
    let cfg = default_config_paths()
        .into_iter()
        .fold(HarvestConfigLoader::new().with_defaults(), |loader, path| {
            loader.with_optional_file(path)
        })
        .load()
        .context("failed to load configuration")?;

    let log_path = init_logging(LogConfig {
        log_dir: cfg.logging.dir.clone(),
        emit_stderr: cfg.logging.stderr,
        format: if cfg.logging.json {
            LogFormat::Json
        } else {
            LogFormat::Text
        },
        ..LogConfig::default()
    })?;
    info!(log = %log_path.display(), "logging initialised");

    // 2) Everything that can be rejected statically is rejected before a
    //    browser session exists.
    let spec = cfg.scenario(&cli.scenario).with_context(|| {
        format!(
            "unknown scenario '{}' (available: {})",
            cli.scenario,
            cfg.scenario_names().join(", ")
        )
    })?;
    let job = Job::from_spec(spec, &cfg.driver)?;

    // 3) Open the session and harvest.
    match job.backend {
        Backend::Webdriver => {
            let browser = WebDriverBrowser::connect(&scenario::session_settings(&cfg.driver)).await?;
            harvest(browser, &job).await
        }
        Backend::Static => {
            let browser = StaticBrowser::new(scenario::http_client(&cfg.driver)?);
            harvest(browser, &job).await
        }
    }
}

async fn harvest<B: Browser>(browser: B, job: &Job) -> Result<Report> {
    let mut spider = Spider::new(browser, job.options);
    if let Err(err) = spider.configure(&job.blueprint, &job.pagination) {
        spider.release().await?;
        return Err(err.into());
    }

    info!(scenario = %job.name, url = %job.url, backend = ?job.backend, "starting run");
    let table = spider.run(&job.url).await?;
    let saved = spider
        .save(&table, &job.output.path, job.output.format)
        .with_context(|| format!("failed to save {} output", job.output.format))?;

    Ok(Report {
        scenario: job.name.clone(),
        pages: spider.current_page().unwrap_or(0),
        passes: spider.passes(),
        rows: table.row_count(),
        columns: table.column_count(),
        saved,
    })
}
