mod common;

use std::time::Duration;

use common::{init_test_tracing, list_page, site, url, RecordingBrowser};
use harvest_common::{HarvestError, Locator, OutputFormat};
use harvest_drivers::static_page::StaticBrowser;
use harvest_drivers::WaitPolicy;
use harvest_engine::{
    ContainerBlueprint, ExtractionTable, Harvester, NextButton, PaginationConfig, RowTemplate,
    RunPhase, Spider, SpiderOptions, UrlTemplate,
};
use tempfile::TempDir;

fn blueprint() -> ContainerBlueprint {
    ContainerBlueprint::new("items", Locator::class("items")).with_rows(RowTemplate::new(
        Locator::class("row"),
        vec![Locator::class("title").named("title")],
    ))
}

fn options() -> SpiderOptions {
    SpiderOptions {
        wait: WaitPolicy::immediate(),
        ..SpiderOptions::default()
    }
}

fn numbered_site() -> StaticBrowser {
    site(&[
        ("list?page=1", list_page(&["A1", "A2"], None, false)),
        ("list?page=2", list_page(&["B1"], None, false)),
        ("list?page=3", list_page(&["C1", "C2"], None, false)),
        ("list?page=4", list_page(&["D1"], None, false)),
    ])
}

#[tokio::test]
async fn url_template_run_visits_exactly_max_pages() {
    init_test_tracing();
    let mut spider = Spider::new(RecordingBrowser::new(numbered_site()), options());
    spider
        .configure(
            &blueprint(),
            &PaginationConfig::default()
                .with_max_pages(3)
                .with_url_template(UrlTemplate::pattern("list?page={page}")),
        )
        .unwrap();

    let table = spider.run(&url("list?page=1")).await.unwrap();

    assert_eq!(spider.passes(), 3);
    assert_eq!(spider.phase(), RunPhase::Finished);
    assert_eq!(
        spider.browser().inner().history(),
        [url("list?page=1"), url("list?page=2"), url("list?page=3")]
    );
    assert_eq!(spider.browser().count("navigate"), 3);
    assert_eq!(table.column("title").unwrap(), ["A1", "A2", "B1", "C1", "C2"]);
}

#[tokio::test]
async fn next_button_run_collects_every_page() {
    init_test_tracing();
    let browser = site(&[
        ("p1", list_page(&["A"], Some("p2"), false)),
        ("p2", list_page(&["B"], Some("p3"), false)),
        ("p3", list_page(&["C"], Some("p4"), true)),
    ]);
    let mut spider = Spider::new(browser, options());
    spider
        .configure(
            &blueprint(),
            &PaginationConfig::default()
                .with_max_pages(20)
                .with_next_button(NextButton::new(Locator::id("next")).with_timeout(Duration::from_millis(20)))
                .with_settle(Duration::ZERO),
        )
        .unwrap();

    let table = spider.run(&url("p1")).await.unwrap();

    assert_eq!(table.column("title").unwrap(), ["A", "B", "C"]);
    assert_eq!(spider.current_page(), Some(3));
    assert!(spider.browser().is_closed());
}

#[tokio::test]
async fn infinite_scroll_extracts_once_after_scrolling_stops() {
    init_test_tracing();
    let browser = RecordingBrowser::new(site(&[("feed", list_page(&["A", "B", "C"], None, false))]))
        .with_extents(&[100.0, 200.0, 200.0, 300.0, 300.0]);
    let mut spider = Spider::new(browser, options());
    spider
        .configure(
            &blueprint(),
            &PaginationConfig::default()
                .with_max_pages(1_000)
                .with_infinite_scroll()
                .with_settle(Duration::ZERO),
        )
        .unwrap();

    let table = spider.run(&url("feed")).await.unwrap();

    assert_eq!(spider.passes(), 1);
    assert_eq!(table.column("title").unwrap(), ["A", "B", "C"]);
    assert_eq!(spider.browser().count("eval window.scrollTo"), 3);
}

#[tokio::test]
async fn infinite_scroll_needs_a_scripting_backend() {
    init_test_tracing();
    let mut spider = Spider::new(numbered_site(), options());
    let err = spider
        .configure(&blueprint(), &PaginationConfig::default().with_infinite_scroll())
        .unwrap_err();
    assert!(matches!(err, HarvestError::Config(_)));
}

#[tokio::test]
async fn session_is_released_once_after_success() {
    init_test_tracing();
    let mut spider = Spider::new(RecordingBrowser::new(numbered_site()), options());
    spider
        .configure(&blueprint(), &PaginationConfig::single_page())
        .unwrap();

    let table = spider.run(&url("list?page=1")).await.unwrap();
    assert_eq!(table.row_count(), 2);
    assert!(spider.is_released());

    let again = spider.run(&url("list?page=1")).await.unwrap_err();
    assert!(matches!(again, HarvestError::Config(_)));
    assert_eq!(spider.browser().count("quit"), 1);
    assert_eq!(spider.browser().count("navigate"), 1);
}

#[tokio::test]
async fn failed_initial_bind_is_fatal_and_still_releases() {
    init_test_tracing();
    let browser = RecordingBrowser::new(site(&[("blank", "<html><body></body></html>".to_string())]));
    let mut spider = Spider::new(browser, options());
    spider
        .configure(&blueprint(), &PaginationConfig::single_page())
        .unwrap();

    let err = spider.run(&url("blank")).await.unwrap_err();

    assert!(matches!(err, HarvestError::NotFound(_)));
    assert_eq!(spider.phase(), RunPhase::Failed);
    assert_eq!(spider.browser().count("quit"), 1);
}

#[tokio::test]
async fn configuration_errors_surface_before_navigation() {
    init_test_tracing();
    let mut unconfigured = Spider::new(RecordingBrowser::new(numbered_site()), options());
    let err = unconfigured.run(&url("list?page=1")).await.unwrap_err();
    assert!(matches!(err, HarvestError::Config(_)));
    assert_eq!(unconfigured.browser().count("navigate"), 0);
    assert_eq!(unconfigured.browser().count("quit"), 1);

    let mut blank_url = Spider::new(RecordingBrowser::new(numbered_site()), options());
    blank_url
        .configure(&blueprint(), &PaginationConfig::single_page())
        .unwrap();
    let err = blank_url.run("   ").await.unwrap_err();
    assert!(matches!(err, HarvestError::Config(_)));
    assert_eq!(blank_url.browser().count("navigate"), 0);
    assert_eq!(blank_url.browser().count("quit"), 1);
}

#[tokio::test]
async fn reconfiguring_replaces_the_previous_tree() {
    init_test_tracing();
    let mut spider = Spider::new(numbered_site(), options());
    spider
        .configure(
            &ContainerBlueprint::new("absent", Locator::class("missing")),
            &PaginationConfig::single_page(),
        )
        .unwrap();
    spider
        .configure(&blueprint(), &PaginationConfig::single_page())
        .unwrap();

    let table = spider.run(&url("list?page=1")).await.unwrap();
    assert_eq!(table.column("title").unwrap(), ["A1", "A2"]);
}

#[tokio::test]
async fn saving_an_empty_table_writes_nothing() {
    init_test_tracing();
    let dir = TempDir::new().unwrap();
    let spider = Spider::new(numbered_site(), options());

    let saved = spider
        .persist(&ExtractionTable::new(), &dir.path().join("books"), OutputFormat::Csv)
        .await
        .unwrap();

    assert!(saved.is_none());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn failed_save_keeps_the_table_for_a_retry() {
    init_test_tracing();
    let dir = TempDir::new().unwrap();
    let mut spider = Spider::new(numbered_site(), options());
    spider
        .configure(&blueprint(), &PaginationConfig::single_page())
        .unwrap();
    let table = spider.run(&url("list?page=1")).await.unwrap();

    let unreachable = dir.path().join("no-such-dir").join("books");
    let err = spider.save(&table, &unreachable, OutputFormat::Json).unwrap_err();
    assert!(matches!(err, HarvestError::Io(_)));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

    let saved = spider
        .save(&table, &dir.path().join("books"), OutputFormat::Csv)
        .unwrap()
        .unwrap();
    assert_eq!(saved, dir.path().join("books.csv"));
    assert_eq!(
        std::fs::read_to_string(saved).unwrap(),
        "title\nA1\nA2\n"
    );
}
