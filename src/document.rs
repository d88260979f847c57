//! Access to the live, asynchronously rendering page
//!
//! The engine never owns the page. It reads the current markup through
//! [`LiveDocument::snapshot`], parses it with `scraper`, and clicks elements by
//! handing their [`NodePath`] back to [`LiveDocument::activate`].
//!
//! `scraper::Html` is not `Send`, so parsed snapshots are always dropped
//! before the engine awaits anything.

use scraper::{ElementRef, Html, Selector};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::DocumentError;

/// Child-index path from the document root to one element.
///
/// Parsing identical markup yields identical trees, so a path computed on one
/// parse of a snapshot addresses the same element in any other parse of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodePath(Vec<usize>);

impl NodePath {
    /// Path of `element` within the tree it belongs to
    pub fn of(element: ElementRef<'_>) -> Self {
        let mut indices = Vec::new();
        let mut node = *element;
        while let Some(parent) = node.parent() {
            let index = parent
                .children()
                .position(|child| child.id() == node.id())
                .unwrap_or_default();
            indices.push(index);
            node = parent;
        }
        indices.reverse();
        NodePath(indices)
    }

    /// Element addressed by this path in `document`, if any
    pub fn resolve<'a>(&self, document: &'a Html) -> Option<ElementRef<'a>> {
        let mut node = document.tree.root();
        for &index in &self.0 {
            node = node.children().nth(index)?;
        }
        ElementRef::wrap(node)
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }
}

/// A page the engine can observe and interact with
pub trait LiveDocument: Send + Sync {
    /// Markup as currently rendered
    fn snapshot(&self) -> String;

    /// Click the element at `target`
    fn activate(&self, target: &NodePath) -> Result<(), DocumentError>;
}

/// Fixed markup. Activation is accepted but changes nothing.
#[derive(Debug, Clone)]
pub struct StaticDocument {
    html: String,
}

impl StaticDocument {
    pub fn new(html: impl Into<String>) -> Self {
        Self { html: html.into() }
    }
}

impl LiveDocument for StaticDocument {
    fn snapshot(&self) -> String {
        self.html.clone()
    }

    fn activate(&self, target: &NodePath) -> Result<(), DocumentError> {
        let document = Html::parse_document(&self.html);
        match target.resolve(&document) {
            Some(_) => Ok(()),
            None => Err(DocumentError::StaleNode(target.indices().to_vec())),
        }
    }
}

struct ClickHandler {
    selector: String,
    delay: Duration,
    markup: String,
}

struct ScriptState {
    markup: String,
    /// Markup waiting to be rendered, ordered by deadline
    pending: Vec<(Instant, String)>,
    handlers: Vec<ClickHandler>,
    activations: Vec<NodePath>,
}

impl ScriptState {
    fn advance(&mut self, now: Instant) {
        while let Some((deadline, _)) = self.pending.first() {
            if *deadline > now {
                break;
            }
            let (_, markup) = self.pending.remove(0);
            self.markup = markup;
        }
    }

    fn schedule(&mut self, deadline: Instant, markup: String) {
        let at = self
            .pending
            .iter()
            .position(|(d, _)| *d > deadline)
            .unwrap_or(self.pending.len());
        self.pending.insert(at, (deadline, markup));
    }
}

/// Replayable page for offline runs against captured markup.
///
/// Markup can be scheduled to render after a delay, and clicks on elements
/// matching a selector can swap in new markup, immediately or after a delay.
/// Time is read from the tokio clock so paused-time tests are deterministic.
pub struct ScriptedDocument {
    created: Instant,
    state: Mutex<ScriptState>,
}

impl ScriptedDocument {
    pub fn new(html: impl Into<String>) -> Self {
        Self {
            created: Instant::now(),
            state: Mutex::new(ScriptState {
                markup: html.into(),
                pending: Vec::new(),
                handlers: Vec::new(),
                activations: Vec::new(),
            }),
        }
    }

    /// Render `html` once `delay` has passed since construction
    pub fn reveal_after(self, delay: Duration, html: impl Into<String>) -> Self {
        let deadline = self.created + delay;
        self.lock().schedule(deadline, html.into());
        self
    }

    /// Render `html` as soon as an element matching `selector` is clicked
    pub fn on_click(self, selector: &str, html: impl Into<String>) -> Self {
        self.on_click_after(selector, Duration::ZERO, html)
    }

    /// Render `html` `delay` after an element matching `selector` is clicked
    pub fn on_click_after(self, selector: &str, delay: Duration, html: impl Into<String>) -> Self {
        self.lock().handlers.push(ClickHandler {
            selector: selector.to_string(),
            delay,
            markup: html.into(),
        });
        self
    }

    /// Paths clicked so far, oldest first
    pub fn activations(&self) -> Vec<NodePath> {
        self.lock().activations.clone()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl LiveDocument for ScriptedDocument {
    fn snapshot(&self) -> String {
        let mut state = self.lock();
        state.advance(Instant::now());
        state.markup.clone()
    }

    fn activate(&self, target: &NodePath) -> Result<(), DocumentError> {
        let now = Instant::now();
        let mut state = self.lock();
        state.advance(now);

        let reaction = {
            let document = Html::parse_document(&state.markup);
            let element = target
                .resolve(&document)
                .ok_or_else(|| DocumentError::StaleNode(target.indices().to_vec()))?;

            state.handlers.iter().find_map(|handler| {
                let selector = match Selector::parse(&handler.selector) {
                    Ok(s) => s,
                    Err(_) => {
                        warn!(
                            selector = %handler.selector,
                            "click handler selector does not parse"
                        );
                        return None;
                    }
                };
                selector
                    .matches(&element)
                    .then(|| (handler.delay, handler.markup.clone()))
            })
        };

        state.activations.push(target.clone());
        if let Some((delay, markup)) = reaction {
            debug!(path = ?target.indices(), ?delay, "scripted click handler fired");
            state.schedule(now + delay, markup);
            state.advance(now);
        }
        Ok(())
    }
}
