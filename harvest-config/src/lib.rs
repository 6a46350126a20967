//! Loader for harvest configuration: built-in scenarios, YAML files and
//! environment overrides.
//!
//! Sources are merged in the order they are added, later ones winning.
//! `HARVEST__`-prefixed environment variables are applied last, with `__`
//! separating nested keys (`HARVEST__DRIVER__HEADLESS=false`). String values
//! may reference other environment variables as `${VAR}`; references are
//! expanded after merging.
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde_json::Value;
use std::path::{Path, PathBuf};

pub mod schema;

pub use schema::{
    Backend, ContainerSpec, DriverSettings, HarvestConfig, LoggingSettings, OutputSpec,
    PaginationKindSpec, PaginationSpec, RowFilterSpec, RowSpec, ScenarioSpec,
};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

/// Scenario catalogue compiled into the binary.
pub const DEFAULT_SCENARIOS: &str = include_str!("../scenarios.yaml");

/// File name looked up in the working directory and the user config dir.
pub const CONFIG_FILE_NAME: &str = "harvest.yaml";

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) if s.contains('$') => {
            let mut current = std::mem::take(s);
            for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                let next = shellexpand::env(&current)
                    .map(|cow| cow.into_owned())
                    .unwrap_or_else(|_| current.clone());
                if next == current {
                    break;
                }
                current = next;
            }
            *s = current;
        }
        Value::Array(items) => items.iter_mut().for_each(expand_env_in_value),
        Value::Object(map) => map.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// `harvest.yaml` locations, lowest precedence first: the user config dir,
/// then the working directory.
pub fn default_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::with_capacity(2);
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("harvest").join(CONFIG_FILE_NAME));
    }
    paths.push(PathBuf::from(CONFIG_FILE_NAME));
    paths
}

/// Builder over the `config` crate.
pub struct HarvestConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for HarvestConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl HarvestConfigLoader {
    /// An empty loader; only environment overrides apply.
    ///
    /// ```
    /// use harvest_config::HarvestConfigLoader;
    ///
    /// let config = HarvestConfigLoader::new()
    ///     .with_yaml_str("version: '1'\nscenarios: []")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert!(config.scenarios.is_empty());
    /// assert!(config.driver.headless);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Start from the built-in scenario catalogue.
    pub fn with_defaults(self) -> Self {
        self.with_yaml_str(DEFAULT_SCENARIOS)
    }

    /// Attach a file that must exist; the format is inferred from its suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is skipped when missing.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    /// Merge all sources, apply environment overrides, expand `${VAR}`
    /// references and deserialize.
    pub fn load(self) -> Result<HarvestConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix("HARVEST")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut value: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut value);

        serde_json::from_value(value).map_err(|e| ConfigError::Message(e.to_string()))
    }
}
