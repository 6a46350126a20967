//! Common types and utilities shared across Harvest crates.
//!
//! This crate defines the element [`Locator`] value, the closed set of
//! [`OutputFormat`]s, observability helpers, and the shared error type used
//! throughout the Harvest workspace. It stays dependency-light so every crate
//! can depend on it.
//!
//! # Overview
//!
//! - [`Locator`] and [`Strategy`]: how to find elements relative to a scope
//! - [`OutputFormat`]: persisted table encodings
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`HarvestError`] and [`Result`]: shared error handling
//!
//! # Examples
//!
//! ```rust
//! use harvest_common::{Locator, OutputFormat};
//!
//! let title = Locator::css("h3.title").named("title");
//! assert_eq!(title.field_name(), "title");
//!
//! let format: OutputFormat = "csv".parse().unwrap();
//! assert_eq!(format.extension(), "csv");
//! ```
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod locator;
pub mod observability;

pub use locator::{Locator, Strategy};

/// Encodings a finished extraction table can be persisted in.
///
/// The set is closed: anything else is rejected while parsing, before a
/// browser session is ever opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum OutputFormat {
    Csv,
    Json,
    Xlsx,
    Pickle,
}

impl OutputFormat {
    /// File extension appended to the output path.
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Xlsx => "xlsx",
            OutputFormat::Pickle => "pickle",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = HarvestError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            "xlsx" => Ok(OutputFormat::Xlsx),
            "pickle" | "pkl" => Ok(OutputFormat::Pickle),
            "xls" => Err(HarvestError::Config(
                "legacy xls output has no writer; use xlsx".to_string(),
            )),
            other => Err(HarvestError::Config(format!(
                "unsupported output format '{other}' (expected csv, json, xlsx or pickle)"
            ))),
        }
    }
}

impl TryFrom<String> for OutputFormat {
    type Error = HarvestError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<OutputFormat> for String {
    fn from(value: OutputFormat) -> Self {
        value.extension().to_string()
    }
}

/// Error types used across the Harvest system.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    /// A required locator matched nothing within its timeout.
    #[error("element not found: {0}")]
    NotFound(String),

    /// A previously bound handle no longer references a live node.
    #[error("stale element handle: {0}")]
    Stale(String),

    /// Re-binding a container during refresh failed; the subtree below it is
    /// no longer backed by the page.
    #[error("stale subtree at container '{container}': {reason}")]
    StaleSubtree { container: String, reason: String },

    /// Configuration was incomplete or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Persisting output failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A driver (browser, network, encoder) reported an unexpected error.
    #[error("driver error: {0}")]
    Driver(#[from] anyhow::Error),
}

impl HarvestError {
    /// Whether this error means "the data ran out" rather than "the run broke".
    ///
    /// Pagination treats recoverable errors as the terminal signal.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            HarvestError::NotFound(_) | HarvestError::Stale(_) | HarvestError::StaleSubtree { .. }
        )
    }
}

/// Convenient alias for results that use [`HarvestError`].
pub type Result<T> = std::result::Result<T, HarvestError>;
