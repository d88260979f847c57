//! Locator strategies and the ordered fallback chain
//!
//! A locator finds at most one node under a root element. Document scope and
//! row scope differ only in the root that is passed in.

use scraper::{ElementRef, Selector};
use serde::Deserialize;
use std::fmt;
use tracing::warn;

/// Tags considered when clicking by visible text
pub const CLICKABLE_TAGS: &[&str] = &[
    "a", "button", "label", "summary", "li", "span", "div", "td", "th", "p", "h1", "h2", "h3",
    "h4", "h5", "h6",
];

/// How to find a node under a root element
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "String")]
pub enum Locator {
    /// First descendant matching a CSS selector
    Css { source: String, selector: Selector },
    /// The n-th (0-based) direct child element
    Nth(usize),
    /// A selector that failed to compile; never matches
    Unparseable(String),
}

impl Locator {
    /// Compile a CSS selector, keeping unparseable input as a dead locator
    pub fn css(selector: &str) -> Self {
        match Selector::parse(selector) {
            Ok(compiled) => Locator::Css {
                source: selector.to_string(),
                selector: compiled,
            },
            Err(e) => {
                warn!(selector, error = %e, "selector does not parse and will never match");
                Locator::Unparseable(selector.to_string())
            }
        }
    }

    /// First node this locator finds under `root`
    pub fn find_first<'a>(&self, root: ElementRef<'a>) -> Option<ElementRef<'a>> {
        match self {
            Locator::Css { selector, .. } => root.select(selector).next(),
            Locator::Nth(index) => root.children().filter_map(ElementRef::wrap).nth(*index),
            Locator::Unparseable(_) => None,
        }
    }

    /// Every node this locator finds under `root`, in document order
    pub fn find_all<'a>(&self, root: ElementRef<'a>) -> Vec<ElementRef<'a>> {
        match self {
            Locator::Css { selector, .. } => root.select(selector).collect(),
            other => other.find_first(root).into_iter().collect(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css { source, .. } | Locator::Unparseable(source) => f.write_str(source),
            Locator::Nth(index) => write!(f, "child #{index}"),
        }
    }
}

impl From<String> for Locator {
    fn from(selector: String) -> Self {
        Locator::css(&selector)
    }
}

impl From<&str> for Locator {
    fn from(selector: &str) -> Self {
        Locator::css(selector)
    }
}

/// Try each locator in order; the first match wins
pub fn resolve<'a>(locators: &[Locator], root: ElementRef<'a>) -> Option<ElementRef<'a>> {
    locators.iter().find_map(|locator| locator.find_first(root))
}

/// Trimmed text content of an element
pub fn node_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Collapse whitespace runs to one space, trim, and case fold
pub fn normalize(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// First element (in document order) whose normalized text equals `label`
pub fn find_label_node<'a>(label: &str, root: ElementRef<'a>) -> Option<ElementRef<'a>> {
    let wanted = normalize(label);
    if wanted.is_empty() {
        return None;
    }
    root.descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| normalize(&el.text().collect::<String>()) == wanted)
}

/// The next element after `element` in document order, skipping its own
/// descendants and never leaving `root`
pub fn following_element<'a>(
    element: ElementRef<'a>,
    root: ElementRef<'a>,
) -> Option<ElementRef<'a>> {
    let mut node = *element;
    loop {
        if node.id() == root.id() {
            return None;
        }
        if let Some(next) = node.next_siblings().find_map(ElementRef::wrap) {
            return Some(next);
        }
        node = node.parent()?;
    }
}

/// Trimmed text of the node following the caption `label`, or `""`
pub fn find_value_near_label(label: &str, root: ElementRef<'_>) -> String {
    find_label_node(label, root)
        .and_then(|caption| following_element(caption, root))
        .map(node_text)
        .unwrap_or_default()
}

/// Innermost clickable element whose visible text equals `text`, or contains
/// it when `fuzzy`. Comparison is case-insensitive and whitespace-normalized.
pub fn find_by_text<'a>(text: &str, fuzzy: bool, root: ElementRef<'a>) -> Option<ElementRef<'a>> {
    let wanted = normalize(text);
    if wanted.is_empty() {
        return None;
    }

    let mut matches = root.descendants().filter_map(ElementRef::wrap).filter(|el| {
        if !CLICKABLE_TAGS.contains(&el.value().name()) {
            return false;
        }
        let seen = normalize(&el.text().collect::<String>());
        if fuzzy {
            seen.contains(&wanted)
        } else {
            seen == wanted
        }
    });

    // Pre-order puts a match's matching descendants right after it, so keep
    // descending while the next match sits inside the current one.
    let mut best = matches.next()?;
    for candidate in matches {
        if candidate.ancestors().any(|a| a.id() == best.id()) {
            best = candidate;
        } else {
            break;
        }
    }
    Some(best)
}
