//! Static HTML parsing and querying with `scraper`.
//!
//! These helpers are synchronous and keep parsed documents local to the call
//! so nothing non-`Send` crosses an `.await` in the async backend.
use harvest_common::{HarvestError, Locator, Result};
use scraper::{ElementRef, Html, Selector};

pub fn parse(source: &str) -> Html {
    Html::parse_document(source)
}

/// Compile a [`Locator`] into a CSS selector.
pub fn selector_for(locator: &Locator) -> Result<Selector> {
    let css = locator.to_css().ok_or_else(|| {
        HarvestError::Config(format!(
            "{locator}: xpath locators need a live browser session"
        ))
    })?;
    Selector::parse(&css)
        .map_err(|e| HarvestError::Config(format!("invalid selector '{css}': {e}")))
}

/// Every element of the document in document order, starting with `<html>`.
pub fn elements(doc: &Html) -> Vec<ElementRef<'_>> {
    doc.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .collect()
}

/// Descendants of `scope` matching `selector`, excluding `scope` itself.
pub fn query<'a>(scope: ElementRef<'a>, selector: &Selector) -> Vec<ElementRef<'a>> {
    scope
        .select(selector)
        .filter(|el| el.id() != scope.id())
        .collect()
}

/// Text content with runs of whitespace collapsed.
pub fn text(el: ElementRef<'_>) -> String {
    el.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether the element or one of its ancestors is hidden by markup.
pub fn is_hidden(el: ElementRef<'_>) -> bool {
    std::iter::once(el)
        .chain(el.ancestors().filter_map(ElementRef::wrap))
        .any(|node| {
            let value = node.value();
            if value.attr("hidden").is_some() {
                return true;
            }
            value
                .attr("style")
                .map(|style| {
                    let style: String = style
                        .chars()
                        .filter(|c| !c.is_whitespace())
                        .collect::<String>()
                        .to_ascii_lowercase();
                    style.contains("display:none") || style.contains("visibility:hidden")
                })
                .unwrap_or(false)
        })
}

/// `href` of the element or its nearest anchor ancestor.
pub fn link_target(el: ElementRef<'_>) -> Option<String> {
    std::iter::once(el)
        .chain(el.ancestors().filter_map(ElementRef::wrap))
        .find_map(|node| node.value().attr("href").map(str::to_string))
}
