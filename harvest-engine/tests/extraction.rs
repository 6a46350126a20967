mod common;

use std::collections::BTreeMap;

use common::{init_test_tracing, site, url};
use harvest_common::{HarvestError, Locator};
use harvest_drivers::{Browser, WaitPolicy};
use harvest_engine::{ContainerBlueprint, ContainerTree, ExtractionTable, RowFilter, RowTemplate};

fn items_with_title_rows() -> ContainerBlueprint {
    ContainerBlueprint::new("items", Locator::class("items")).with_rows(RowTemplate::new(
        Locator::class("row"),
        vec![Locator::class("title").named("title")],
    ))
}

fn columns(pairs: &[(&str, &[&str])]) -> BTreeMap<String, Vec<String>> {
    pairs
        .iter()
        .map(|(name, values)| (name.to_string(), values.iter().map(|v| v.to_string()).collect()))
        .collect()
}

#[tokio::test]
async fn missing_title_leaves_an_empty_placeholder() {
    init_test_tracing();
    let page = r#"<html><body><div class="items">
        <div class="row"><span class="title">Row1Text</span></div>
        <div class="row"><span class="subtitle">no title here</span></div>
    </div></body></html>"#;
    let mut browser = site(&[("list", page.to_string())]);
    browser.navigate(&url("list")).await.unwrap();

    let mut tree = ContainerTree::plant(&items_with_title_rows(), WaitPolicy::immediate());
    tree.bind_tree(&browser).await.unwrap();
    let mut table = ExtractionTable::new();
    tree.extract(&browser, &mut table).await.unwrap();

    assert_eq!(table.to_map(), columns(&[("title", &["Row1Text", ""])]));
    assert_eq!(tree.children(tree.root()).len(), 2);
}

#[tokio::test]
async fn nested_containers_keep_columns_aligned() {
    init_test_tracing();
    let page = r#"<html><body><div class="catalog">
        <h1 class="heading">Books</h1>
        <ul class="items">
          <li class="row"><b class="title">Dune</b><i class="author">Herbert</i></li>
          <li class="row"><b class="title">Emma</b></li>
          <li class="row"><i class="author">Anonymous</i></li>
        </ul>
    </div></body></html>"#;
    let mut browser = site(&[("catalog", page.to_string())]);
    browser.navigate(&url("catalog")).await.unwrap();

    let blueprint = ContainerBlueprint::new("catalog", Locator::class("catalog"))
        .with_field(Locator::class("heading").named("heading"))
        .with_child(
            ContainerBlueprint::new("items", Locator::class("items")).with_rows(RowTemplate::new(
                Locator::class("row"),
                vec![
                    Locator::class("title").named("title"),
                    Locator::class("author").named("author"),
                ],
            )),
        );
    let mut tree = ContainerTree::plant(&blueprint, WaitPolicy::immediate());
    tree.bind_tree(&browser).await.unwrap();
    let mut table = ExtractionTable::new();
    tree.extract(&browser, &mut table).await.unwrap();

    assert!(table.is_aligned());
    assert_eq!(
        table.to_map(),
        columns(&[
            ("heading", &["Books", "", ""]),
            ("title", &["Dune", "Emma", ""]),
            ("author", &["Herbert", "", "Anonymous"]),
        ])
    );
}

#[tokio::test]
async fn row_filter_drops_decorative_elements() {
    init_test_tracing();
    let page = r#"<html><body><div class="items">
        <div class="row"><ul><li>a</li><li>b</li><li>c</li></ul><span class="title">Real</span></div>
        <div class="row"><ul><li>ad</li></ul><span class="title">Banner</span></div>
    </div></body></html>"#;
    let mut browser = site(&[("list", page.to_string())]);
    browser.navigate(&url("list")).await.unwrap();

    let blueprint = ContainerBlueprint::new("items", Locator::class("items")).with_rows(
        RowTemplate::new(Locator::class("row"), vec![Locator::class("title").named("title")])
            .with_filter(RowFilter::MoreThan {
                locator: Locator::tag("li"),
                count: 2,
            }),
    );
    let mut tree = ContainerTree::plant(&blueprint, WaitPolicy::immediate());
    tree.bind_tree(&browser).await.unwrap();
    let mut table = ExtractionTable::new();
    tree.extract(&browser, &mut table).await.unwrap();

    assert_eq!(table.to_map(), columns(&[("title", &["Real"])]));
}

#[tokio::test]
async fn refresh_against_unchanged_page_is_idempotent() {
    init_test_tracing();
    let mut browser = site(&[("list", common::list_page(&["A", "B"], None, false))]);
    browser.navigate(&url("list")).await.unwrap();

    let mut tree = ContainerTree::plant(&items_with_title_rows(), WaitPolicy::immediate());
    tree.bind_tree(&browser).await.unwrap();
    let mut first = ExtractionTable::new();
    tree.extract(&browser, &mut first).await.unwrap();

    tree.refresh(&browser).await.unwrap();
    let mut second = ExtractionTable::new();
    tree.extract(&browser, &mut second).await.unwrap();

    tree.refresh(&browser).await.unwrap();
    let mut third = ExtractionTable::new();
    tree.extract(&browser, &mut third).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(second, third);
    assert_eq!(tree.children(tree.root()).len(), 2);
}

#[tokio::test]
async fn refresh_after_navigation_rebinds_rows_to_the_new_page() {
    init_test_tracing();
    let mut browser = site(&[
        ("one", common::list_page(&["A", "B"], None, false)),
        ("two", common::list_page(&["C"], None, false)),
    ]);
    browser.navigate(&url("one")).await.unwrap();
    let mut tree = ContainerTree::plant(&items_with_title_rows(), WaitPolicy::immediate());
    tree.bind_tree(&browser).await.unwrap();

    browser.navigate(&url("two")).await.unwrap();
    tree.refresh(&browser).await.unwrap();
    let mut table = ExtractionTable::new();
    tree.extract(&browser, &mut table).await.unwrap();

    assert_eq!(table.to_map(), columns(&[("title", &["C"])]));
    assert_eq!(tree.children(tree.root()).len(), 1);
    assert_eq!(tree.len(), 2);
}

#[tokio::test]
async fn rows_pruned_by_a_refresh_no_longer_resolve() {
    init_test_tracing();
    let mut browser = site(&[
        ("one", common::list_page(&["A", "B"], None, false)),
        ("two", common::list_page(&["C"], None, false)),
    ]);
    browser.navigate(&url("one")).await.unwrap();
    let mut tree = ContainerTree::plant(&items_with_title_rows(), WaitPolicy::immediate());
    tree.bind_tree(&browser).await.unwrap();
    let before = tree.children(tree.root());
    assert_eq!(before.len(), 2);

    browser.navigate(&url("two")).await.unwrap();
    tree.refresh(&browser).await.unwrap();
    let after = tree.children(tree.root());

    assert_eq!(after.len(), 1);
    assert_eq!(tree.name(after[0]), Some("items: row 1"));
    for old in before {
        assert!(!after.contains(&old));
        assert_eq!(tree.name(old), None);
        assert!(tree.handle(old).is_none());
        assert!(tree.children(old).is_empty());
    }
}

#[tokio::test]
async fn blank_rows_are_dropped_by_the_text_filter() {
    init_test_tracing();
    let page = r#"<html><body><ul class="scripts-list">
        <li><a href="/script/1">X</a></li>
        <li>   </li>
    </ul></body></html>"#;
    let mut browser = site(&[("movies", page.to_string())]);
    browser.navigate(&url("movies")).await.unwrap();

    let blueprint = ContainerBlueprint::new("movies", Locator::class("scripts-list")).with_rows(
        RowTemplate::new(Locator::tag("li"), vec![Locator::tag("a").named("title")])
            .with_filter(RowFilter::HasText),
    );
    let mut tree = ContainerTree::plant(&blueprint, WaitPolicy::immediate());
    tree.bind_tree(&browser).await.unwrap();
    let mut table = ExtractionTable::new();
    tree.extract(&browser, &mut table).await.unwrap();

    assert_eq!(table.to_map(), columns(&[("title", &["X"])]));
    assert_eq!(tree.children(tree.root()).len(), 1);
}

#[tokio::test]
async fn refresh_on_a_page_without_the_structure_reports_a_stale_subtree() {
    init_test_tracing();
    let mut browser = site(&[
        ("one", common::list_page(&["A"], None, false)),
        ("empty", "<html><body><p>nothing</p></body></html>".to_string()),
    ]);
    browser.navigate(&url("one")).await.unwrap();
    let mut tree = ContainerTree::plant(&items_with_title_rows(), WaitPolicy::immediate());
    tree.bind_tree(&browser).await.unwrap();

    browser.navigate(&url("empty")).await.unwrap();
    match tree.refresh(&browser).await.unwrap_err() {
        HarvestError::StaleSubtree { container, .. } => assert_eq!(container, "items"),
        other => panic!("expected a stale subtree, got {other:?}"),
    }
}

#[tokio::test]
async fn initial_bind_failure_is_not_found() {
    init_test_tracing();
    let mut browser = site(&[("empty", "<html><body></body></html>".to_string())]);
    browser.navigate(&url("empty")).await.unwrap();

    let mut tree = ContainerTree::plant(&items_with_title_rows(), WaitPolicy::immediate());
    let err = tree.bind_tree(&browser).await.unwrap_err();
    assert!(matches!(err, HarvestError::NotFound(_)));
}

#[tokio::test]
async fn derived_rows_cannot_be_rebound_by_locator() {
    init_test_tracing();
    let mut browser = site(&[("list", common::list_page(&["A"], None, false))]);
    browser.navigate(&url("list")).await.unwrap();
    let mut tree = ContainerTree::plant(&items_with_title_rows(), WaitPolicy::immediate());
    tree.bind_tree(&browser).await.unwrap();

    let row = tree.children(tree.root())[0];
    assert!(!tree.is_rebindable(row));
    assert_eq!(tree.parent(row), Some(tree.root()));
    assert_eq!(tree.name(row), Some("items: row 1"));

    let err = tree
        .bind(&browser, row, harvest_drivers::Scope::Document)
        .await
        .unwrap_err();
    assert!(matches!(err, HarvestError::Config(_)));
}
