//! Element locators.
//!
//! A [`Locator`] says how to find zero or more elements relative to a scope
//! (the document or a bound element). It carries no behavior beyond equality
//! and description; drivers translate it into their own query language.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Query language of a [`Locator`] selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    Id,
    Class,
    Xpath,
    Css,
    Tag,
}

impl Strategy {
    fn as_str(&self) -> &'static str {
        match self {
            Strategy::Id => "id",
            Strategy::Class => "class",
            Strategy::Xpath => "xpath",
            Strategy::Css => "css",
            Strategy::Tag => "tag",
        }
    }
}

/// Immutable descriptor of a set of elements.
///
/// The optional `name` is the column a field locator feeds; binding locators
/// usually leave it unset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    pub strategy: Strategy,
    pub selector: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Locator {
    pub fn new(strategy: Strategy, selector: impl Into<String>) -> Self {
        Self {
            strategy,
            selector: selector.into(),
            name: None,
        }
    }

    pub fn id(selector: impl Into<String>) -> Self {
        Self::new(Strategy::Id, selector)
    }

    pub fn class(selector: impl Into<String>) -> Self {
        Self::new(Strategy::Class, selector)
    }

    pub fn xpath(selector: impl Into<String>) -> Self {
        Self::new(Strategy::Xpath, selector)
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(Strategy::Css, selector)
    }

    pub fn tag(selector: impl Into<String>) -> Self {
        Self::new(Strategy::Tag, selector)
    }

    /// Return a copy of this locator feeding the column `name`.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Column this locator feeds; falls back to the selector text.
    pub fn field_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.selector)
    }

    /// Express the locator as a CSS selector, if the strategy allows it.
    ///
    /// Class names containing whitespace are treated as a compound class
    /// (`"a b"` becomes `.a.b`). XPath has no CSS equivalent.
    ///
    /// ```
    /// use harvest_common::Locator;
    ///
    /// assert_eq!(Locator::class("item card").to_css().as_deref(), Some(".item.card"));
    /// assert_eq!(Locator::id("next").to_css().as_deref(), Some("#next"));
    /// assert_eq!(Locator::xpath("//li").to_css(), None);
    /// ```
    pub fn to_css(&self) -> Option<String> {
        let selector = self.selector.trim();
        match self.strategy {
            Strategy::Css | Strategy::Tag => Some(selector.to_string()),
            Strategy::Id => Some(format!("#{selector}")),
            Strategy::Class => Some(
                selector
                    .split_whitespace()
                    .map(|class| format!(".{class}"))
                    .collect(),
            ),
            Strategy::Xpath => None,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy.as_str(), self.selector)?;
        if let Some(name) = &self.name {
            write!(f, " ({name})")?;
        }
        Ok(())
    }
}
