//! Turns configured scenarios into engine values.
use harvest_common::{HarvestError, Locator, Result, Strategy};
use harvest_config::{
    Backend, ContainerSpec, DriverSettings, OutputSpec, PaginationKindSpec, PaginationSpec,
    RowFilterSpec, RowSpec, ScenarioSpec,
};
use harvest_drivers::remote::SessionSettings;
use harvest_drivers::WaitPolicy;
use harvest_engine::{
    ContainerBlueprint, NextButton, PaginationConfig, PaginationKind, RowFilter, RowTemplate,
    SpiderOptions, UrlTemplate,
};
use harvest_http::HttpClient;
use std::time::Duration;

/// Everything needed to run one scenario, validated before any session opens.
#[derive(Debug, Clone)]
pub struct Job {
    pub name: String,
    pub backend: Backend,
    pub url: String,
    pub blueprint: ContainerBlueprint,
    pub pagination: PaginationConfig,
    pub options: SpiderOptions,
    pub output: OutputSpec,
}

impl Job {
    pub fn from_spec(spec: &ScenarioSpec, driver: &DriverSettings) -> Result<Self> {
        let url = spec.url.trim();
        if url.is_empty() {
            return Err(HarvestError::Config(format!(
                "scenario '{}' has an empty url",
                spec.name
            )));
        }

        let blueprint = blueprint(&spec.container);
        let pagination = pagination_config(&spec.pagination);
        let paginator = pagination.resolve(None)?;

        if spec.backend == Backend::Static {
            if paginator.requires_scripts() {
                return Err(HarvestError::Config(format!(
                    "scenario '{}' scrolls the page, which the static backend cannot do",
                    spec.name
                )));
            }
            if let Some(locator) = first_xpath(&spec.container, &spec.pagination) {
                return Err(HarvestError::Config(format!(
                    "scenario '{}' uses xpath locator '{locator}', which the static backend cannot evaluate",
                    spec.name
                )));
            }
        }

        Ok(Self {
            name: spec.name.clone(),
            backend: spec.backend,
            url: url.to_string(),
            blueprint,
            pagination,
            options: SpiderOptions {
                wait: WaitPolicy {
                    timeout: Duration::from_millis(driver.bind_timeout_ms),
                    poll: Duration::from_millis(driver.poll_ms),
                },
                pagination_override: None,
            },
            output: spec.output.clone(),
        })
    }
}

fn blueprint(spec: &ContainerSpec) -> ContainerBlueprint {
    let mut node = ContainerBlueprint::new(spec.name.clone(), spec.locator.clone());
    node.fields = spec.fields.clone();
    node.rows = spec.rows.as_ref().map(row_template);
    node.children = spec.children.iter().map(blueprint).collect();
    node
}

fn row_template(spec: &RowSpec) -> RowTemplate {
    let filter = match &spec.filter {
        RowFilterSpec::Any => RowFilter::Any,
        RowFilterSpec::MoreThan { locator, count } => RowFilter::MoreThan {
            locator: locator.clone(),
            count: *count,
        },
        RowFilterSpec::HasText => RowFilter::HasText,
    };
    RowTemplate::new(spec.common.clone(), spec.fields.clone()).with_filter(filter)
}

fn pagination_config(spec: &PaginationSpec) -> PaginationConfig {
    let mut config = PaginationConfig::default()
        .with_max_pages(spec.max_pages)
        .with_settle(Duration::from_millis(spec.settle_ms));
    config.preferred = spec.kind.map(|kind| match kind {
        PaginationKindSpec::Disabled => PaginationKind::Disabled,
        PaginationKindSpec::NextButton => PaginationKind::NextButton,
        PaginationKindSpec::UrlTemplate => PaginationKind::UrlTemplate,
        PaginationKindSpec::InfiniteScroll => PaginationKind::InfiniteScroll,
    });
    if let Some(locator) = &spec.next_button {
        config = config.with_next_button(
            NextButton::new(locator.clone()).with_timeout(Duration::from_millis(spec.next_timeout_ms)),
        );
    }
    if let Some(pattern) = &spec.url_template {
        let mut template = UrlTemplate::pattern(pattern.clone());
        if let Some(last) = spec.last_page {
            template = template.with_last_page(last);
        }
        config = config.with_url_template(template);
    }
    if spec.infinite_scroll {
        config = config.with_infinite_scroll();
    }
    config
}

fn first_xpath(container: &ContainerSpec, pagination: &PaginationSpec) -> Option<Locator> {
    let mut stack = vec![container];
    let mut locators: Vec<&Locator> = pagination.next_button.iter().collect();
    while let Some(node) = stack.pop() {
        locators.push(&node.locator);
        locators.extend(&node.fields);
        if let Some(rows) = &node.rows {
            locators.push(&rows.common);
            locators.extend(&rows.fields);
            if let RowFilterSpec::MoreThan { locator, .. } = &rows.filter {
                locators.push(locator);
            }
        }
        stack.extend(&node.children);
    }
    locators
        .into_iter()
        .find(|l| l.strategy == Strategy::Xpath)
        .cloned()
}

pub fn session_settings(driver: &DriverSettings) -> SessionSettings {
    SessionSettings {
        webdriver_url: driver.webdriver_url.clone(),
        headless: driver.headless,
        maximize: driver.maximize,
        window_size: driver.window_size.map(|[w, h]| (w, h)),
        user_agent: driver.user_agent.clone(),
        extra_args: driver.extra_args.clone(),
    }
}

pub fn http_client(driver: &DriverSettings) -> anyhow::Result<HttpClient> {
    let mut client = HttpClient::new()?
        .with_timeout(Duration::from_secs(driver.http_timeout_secs))
        .with_retries(driver.http_retries as usize);
    if let Some(agent) = &driver.user_agent {
        client = client.with_user_agent(agent.clone());
    }
    Ok(client)
}
