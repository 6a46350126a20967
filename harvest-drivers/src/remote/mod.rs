//! `fantoccini`-backed WebDriver session.
//!
//! - [`session::SessionSettings`]: endpoint, headless mode and Chrome args
//! - [`browser::WebDriverBrowser`]: the [`crate::Browser`] implementation
pub mod browser;
pub mod session;

pub use browser::WebDriverBrowser;
pub use session::SessionSettings;
