//! Driver layer for browser automation.
//!
//! The extraction engine only talks to the [`browser::Browser`] trait. Besides
//! the trait this crate holds:
//!
//! - [`remote::WebDriverBrowser`]: a `fantoccini` WebDriver session for
//!   dynamically rendered pages
//! - [`static_page::StaticBrowser`]: fetched (or fixture) HTML parsed with
//!   `scraper`, for pages that need no script execution
//! - [`wait`]: `wait_for` / `wait_until_visible` polling with a fixed timeout
pub mod browser;
pub mod static_page;
pub mod wait;
pub mod remote;

pub use browser::{Browser, Scope};
pub use wait::WaitPolicy;
