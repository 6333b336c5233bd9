//! Ready-made extraction functions for [`Page`]
//!
//! These plug straight into [`Chain::extract`](crate::Chain::extract) when the
//! chain runs on an [`HttpFetcher`](crate::HttpFetcher):
//! - Page title
//! - Links to follow (from <a> tags and canonical links)
//! - Text or attributes of elements matching a CSS selector

use crate::fetcher::Page;
use crate::ExtractError;
use scraper::{ElementRef, Selector};
use serde_json::Value;
use url::Url;

/// Extracts the page title (from the <title> tag)
pub fn title(page: &Page) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    page.html
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Extracts all followable links as absolute URLs
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags
/// - `<link rel="canonical" href="...">`
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs
/// - Fragment-only links
///
/// Relative links are resolved against the final URL of the page.
pub fn links(page: &Page) -> Vec<String> {
    let mut links = Vec::new();

    if let Ok(a_selector) = Selector::parse("a[href]") {
        for element in page.html.select(&a_selector) {
            // Skip if it has the download attribute
            if element.value().attr("download").is_some() {
                continue;
            }

            if let Some(href) = element.value().attr("href") {
                if let Some(absolute_url) = resolve_link(href, &page.url) {
                    links.push(absolute_url);
                }
            }
        }
    }

    if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
        for element in page.html.select(&canonical_selector) {
            if let Some(href) = element.value().attr("href") {
                if let Some(absolute_url) = resolve_link(href, &page.url) {
                    links.push(absolute_url);
                }
            }
        }
    }

    links
}

/// Collects the trimmed text of every element matching `selector`
pub fn select_text(page: &Page, selector: &str) -> Result<Vec<String>, ExtractError> {
    select_map(page, selector, |element| {
        Some(element.text().collect::<String>().trim().to_string())
    })
}

/// Collects the value of `attr` on every matching element that has it
pub fn select_attr(page: &Page, selector: &str, attr: &str) -> Result<Vec<String>, ExtractError> {
    select_map(page, selector, |element| {
        element.value().attr(attr).map(str::to_string)
    })
}

/// Text of the first element matching `selector`
///
/// # Returns
///
/// * `Ok(String)` - Trimmed text of the first match
/// * `Err(ExtractError::NotFound)` - Nothing matched
pub fn first_text(page: &Page, selector: &str) -> Result<String, ExtractError> {
    select_text(page, selector)?
        .into_iter()
        .next()
        .ok_or_else(|| ExtractError::NotFound(selector.to_string()))
}

/// Like [`select_text`], with the selector taken from the first extraction argument
///
/// Meant for chains that pass the selector through `Chain::extract`'s
/// argument list rather than capturing it.
pub fn select_text_arg(page: &Page, args: &[Value]) -> Result<Vec<String>, ExtractError> {
    let selector = args
        .first()
        .and_then(Value::as_str)
        .ok_or_else(|| ExtractError::Invalid("expected a selector string argument".to_string()))?;

    select_text(page, selector)
}

fn select_map<M>(page: &Page, selector: &str, map: M) -> Result<Vec<String>, ExtractError>
where
    M: Fn(ElementRef<'_>) -> Option<String>,
{
    let parsed = Selector::parse(selector)
        .map_err(|e| ExtractError::InvalidSelector(format!("{}: {}", selector, e)))?;

    Ok(page.html.select(&parsed).filter_map(map).collect())
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    // Same page anchors
    if href.starts_with('#') {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}
