//! Browser backend over static HTML.
//!
//! Pages come from a [`fetch::PageFetcher`] (HTTP or in-memory fixtures) and
//! are parsed with `scraper`. Handles record the page load they belong to, so
//! a handle used after navigation is reported stale instead of silently
//! pointing at the new page.
pub mod browser;
pub mod fetch;
pub mod html;

pub use browser::{NodeHandle, StaticBrowser};
pub use fetch::{FixturePages, PageFetcher};
