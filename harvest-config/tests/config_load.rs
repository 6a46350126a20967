use harvest_common::{OutputFormat, Strategy};
use harvest_config::{HarvestConfigLoader, PaginationKindSpec, RowFilterSpec};
use serial_test::serial;
use std::{fs, path::PathBuf};
use tempfile::TempDir;

fn write_yaml(tmp: &TempDir, name: &str, yaml: &str) -> PathBuf {
    let p = tmp.path().join(name);
    fs::write(&p, yaml).expect("write yaml");
    p
}

const SHOP: &str = r#"
version: "2"
scenarios:
  - name: shop
    backend: static
    url: "${SHOP_ROOT}/catalog?page=1"
    container:
      name: catalog
      locator: { strategy: id, selector: products }
      fields:
        - { strategy: css, selector: h1, name: heading }
      rows:
        common: { strategy: class, selector: product }
        filter: { kind: more_than, locator: { strategy: tag, selector: span }, count: 1 }
        fields:
          - { strategy: class, selector: name, name: name }
          - { strategy: class, selector: price, name: price }
    pagination:
      max_pages: 4
      url_template: "catalog?page={page}"
      next_button: { strategy: id, selector: next }
    output:
      path: out/products
      format: XLSX
"#;

#[test]
#[serial]
fn file_scenarios_replace_the_builtin_catalogue() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(&tmp, "harvest.yaml", SHOP);

    let config = temp_env::with_var("SHOP_ROOT", Some("https://shop.test"), || {
        HarvestConfigLoader::new()
            .with_defaults()
            .with_file(&p)
            .load()
            .expect("load harvest config")
    });

    assert_eq!(config.version.as_deref(), Some("2"));
    assert_eq!(config.scenario_names(), ["shop"]);
    let shop = config.scenario("shop").unwrap();
    assert_eq!(shop.url, "https://shop.test/catalog?page=1");
    assert_eq!(shop.container.locator.strategy, Strategy::Id);
    assert_eq!(shop.container.fields[0].field_name(), "heading");
    let rows = shop.container.rows.as_ref().unwrap();
    assert!(matches!(rows.filter, RowFilterSpec::MoreThan { count: 1, .. }));
    assert_eq!(shop.pagination.kind, None);
    assert_eq!(shop.pagination.max_pages, 4);
    assert_eq!(shop.pagination.settle_ms, 2_000);
    assert_eq!(shop.output.format, OutputFormat::Xlsx);
}

#[test]
#[serial]
fn environment_overrides_win_over_files() {
    let tmp = TempDir::new().unwrap();
    let p = write_yaml(
        &tmp,
        "harvest.yaml",
        "driver:\n  headless: true\n  webdriver_url: http://grid.local:4444\n",
    );

    let config = temp_env::with_vars(
        [
            ("HARVEST__DRIVER__HEADLESS", Some("false")),
            ("HARVEST__DRIVER__BIND_TIMEOUT_MS", Some("2500")),
        ],
        || {
            HarvestConfigLoader::new()
                .with_defaults()
                .with_file(&p)
                .load()
                .expect("load harvest config")
        },
    );

    assert!(!config.driver.headless);
    assert_eq!(config.driver.bind_timeout_ms, 2_500);
    assert_eq!(config.driver.webdriver_url, "http://grid.local:4444");
    assert_eq!(config.scenario_names(), ["audible", "subslikescript"]);
    assert_eq!(
        config.scenario("audible").unwrap().pagination.kind,
        Some(PaginationKindSpec::NextButton)
    );
}

#[test]
#[serial]
fn missing_optional_file_is_skipped_but_required_file_is_not() {
    let tmp = TempDir::new().unwrap();
    let absent = tmp.path().join("absent.yaml");

    let config = HarvestConfigLoader::new()
        .with_defaults()
        .with_optional_file(&absent)
        .load()
        .expect("optional file may be missing");
    assert_eq!(config.scenarios.len(), 2);

    assert!(HarvestConfigLoader::new().with_file(&absent).load().is_err());
}

#[test]
#[serial]
fn unsupported_output_format_is_rejected_at_load_time() {
    let yaml = SHOP.replace("format: XLSX", "format: xls");
    let err = temp_env::with_var("SHOP_ROOT", Some("https://shop.test"), || {
        HarvestConfigLoader::new().with_yaml_str(&yaml).load().unwrap_err()
    });
    assert!(err.to_string().contains("xls"));
}
