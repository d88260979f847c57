//! Interaction sequencer
//!
//! Runs a spec's action steps against the live document, strictly in order,
//! before anything is extracted. Every wait is a tokio suspension point that
//! also listens on the run's cancellation token.
//!
//! Engine runs use a private token, so a stuck run ends only when the step's
//! own timeout expires. Callers driving a [`Sequencer`] directly can pass
//! their own token with [`Sequencer::with_cancellation`].

use scraper::{ElementRef, Html};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::document::{LiveDocument, NodePath};
use crate::error::{ExtractError, Result};
use crate::extractors::{find_by_text, resolve, Locator};
use crate::spec::ActionStep;

/// What a step did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The step's target was found (and clicked, for click steps) or it slept
    Completed,
    /// An optional click found nothing
    NoOp,
    /// The step was not understood
    Skipped,
}

/// Something a step looks for in a snapshot
#[derive(Debug, Clone, Copy)]
enum Target<'s> {
    Locators(&'s [Locator]),
    Text { text: &'s str, fuzzy: bool },
}

impl Target<'_> {
    fn find<'a>(&self, root: ElementRef<'a>) -> Option<ElementRef<'a>> {
        match *self {
            Target::Locators(locators) => resolve(locators, root),
            Target::Text { text, fuzzy } => find_by_text(text, fuzzy, root),
        }
    }
}

pub struct Sequencer<'d> {
    document: &'d dyn LiveDocument,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl<'d> Sequencer<'d> {
    pub fn new(document: &'d dyn LiveDocument, config: &EngineConfig) -> Self {
        Self {
            document,
            poll_interval: config.poll_interval(),
            cancel: CancellationToken::new(),
        }
    }

    /// Race every wait against `cancel` instead of a private token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run `steps` in order. The first fatal error stops the sequence; steps
    /// failing with a non-fatal error are recorded as `Skipped`.
    pub async fn run(&self, steps: &[ActionStep]) -> Result<Vec<StepOutcome>> {
        let mut outcomes = Vec::with_capacity(steps.len());
        for (index, step) in steps.iter().enumerate() {
            debug!(step = index, kind = step.kind(), "running action step");
            let outcome = match self.run_step(step).await {
                Ok(outcome) => outcome,
                Err(e) if !e.is_fatal() => {
                    warn!(step = index, error = %e, "skipping action step");
                    StepOutcome::Skipped
                }
                Err(e) => {
                    warn!(step = index, kind = step.kind(), error = %e, "action step failed");
                    return Err(e);
                }
            };
            outcomes.push(outcome);
        }
        info!(steps = steps.len(), "action sequence complete");
        Ok(outcomes)
    }

    /// Execute one step. A step that was not understood fails with the
    /// non-fatal `UnknownActionStep`.
    pub async fn run_step(&self, step: &ActionStep) -> Result<StepOutcome> {
        match step {
            ActionStep::WaitForAppearance { locator, timeout_ms } => {
                let context = format!("selector `{locator}`");
                let target = Target::Locators(std::slice::from_ref(locator));
                self.poll_until(target, &context, *timeout_ms).await?;
                Ok(StepOutcome::Completed)
            }

            ActionStep::ClickFirstPresent { locators, settle_delay_ms } => {
                match self.locate(Target::Locators(locators)) {
                    Some(path) => {
                        self.click(&path, *settle_delay_ms).await?;
                        Ok(StepOutcome::Completed)
                    }
                    None => {
                        debug!(candidates = locators.len(), "nothing to click");
                        Ok(StepOutcome::NoOp)
                    }
                }
            }

            ActionStep::ClickByVisibleText { text, fuzzy, timeout_ms, settle_delay_ms } => {
                let context = format!("text `{text}`");
                let target = Target::Text { text: text.as_str(), fuzzy: *fuzzy };
                let path = self.poll_until(target, &context, *timeout_ms).await?;
                self.click(&path, *settle_delay_ms).await?;
                Ok(StepOutcome::Completed)
            }

            ActionStep::ClickByVisibleTextIfPresent { text, fuzzy, settle_delay_ms } => {
                match self.locate(Target::Text { text: text.as_str(), fuzzy: *fuzzy }) {
                    Some(path) => {
                        self.click(&path, *settle_delay_ms).await?;
                        Ok(StepOutcome::Completed)
                    }
                    None => {
                        debug!(text = %text, "no element with that text to click");
                        Ok(StepOutcome::NoOp)
                    }
                }
            }

            ActionStep::Sleep { ms } => {
                self.pause(Duration::from_millis(*ms)).await?;
                Ok(StepOutcome::Completed)
            }

            ActionStep::Unknown { kind, reason } => {
                debug!(kind = %kind, reason = %reason, "action step not understood");
                Err(ExtractError::UnknownActionStep(kind.clone()))
            }
        }
    }

    /// Find `target` in a fresh snapshot. The parsed tree is dropped before
    /// returning so no caller holds it across an await.
    fn locate(&self, target: Target<'_>) -> Option<NodePath> {
        let markup = self.document.snapshot();
        let document = Html::parse_document(&markup);
        target.find(document.root_element()).map(NodePath::of)
    }

    /// Poll for `target` until found or `timeout_ms` has elapsed. The last
    /// poll happens at the deadline, so a miss never fails early.
    async fn poll_until(
        &self,
        target: Target<'_>,
        context: &str,
        timeout_ms: u64,
    ) -> Result<NodePath> {
        let timeout = Duration::from_millis(timeout_ms);
        let started = Instant::now();
        loop {
            if let Some(path) = self.locate(target) {
                return Ok(path);
            }
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(ExtractError::timeout(context, timeout_ms));
            }
            self.pause(self.poll_interval.min(timeout - elapsed)).await?;
        }
    }

    async fn click(&self, path: &NodePath, settle_delay_ms: u64) -> Result<()> {
        self.document.activate(path)?;
        debug!(path = ?path.indices(), settle_delay_ms, "clicked");
        self.pause(Duration::from_millis(settle_delay_ms)).await
    }

    async fn pause(&self, duration: Duration) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(ExtractError::Cancelled);
        }
        if duration.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ExtractError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{ScriptedDocument, StaticDocument};
    use crate::spec::ExtractionSpec;

    fn steps(json: &str) -> Vec<ActionStep> {
        ExtractionSpec::from_json(&format!(r#"{{ "actions": {json} }}"#)).unwrap().actions
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_no_earlier_than_timeout() {
        let doc = StaticDocument::new("<p>nothing</p>");
        let seq = Sequencer::new(&doc, &EngineConfig::default());
        let started = Instant::now();

        let err = seq
            .run(&steps(
                r##"[{ "type": "waitFor", "selector": "#never", "timeout_ms": 1000 }]"##,
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, ExtractError::Timeout { timeout_ms: 1000, .. }));
        assert!(err.to_string().contains("#never"));
        assert!(started.elapsed() >= Duration::from_millis(1000));
        assert!(started.elapsed() < Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_resolves_within_one_poll_of_appearance() {
        let doc = ScriptedDocument::new("<p>loading</p>")
            .reveal_after(Duration::from_millis(250), r#"<table id="ops"></table>"#);
        let seq = Sequencer::new(&doc, &EngineConfig::default());
        let started = Instant::now();

        let outcomes = seq
            .run(&steps(
                r##"[{ "type": "waitFor", "selector": "table#ops", "timeout_ms": 8000 }]"##,
            ))
            .await
            .unwrap();

        assert_eq!(outcomes, vec![StepOutcome::Completed]);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(250));
        assert!(elapsed <= Duration::from_millis(350));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_succeeds_immediately_when_present() {
        let doc = StaticDocument::new(r#"<div id="wo">25-0811</div>"#);
        let seq = Sequencer::new(&doc, &EngineConfig::default());
        let started = Instant::now();
        seq.run(&steps(r##"[{ "type": "waitFor", "selector": "#wo" }]"##)).await.unwrap();
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_first_present_and_settle() {
        let doc = ScriptedDocument::new(r#"<button class="expand">+</button>"#)
            .on_click(".expand", r#"<div id="panel">open</div>"#);
        let seq = Sequencer::new(&doc, &EngineConfig::default());
        let started = Instant::now();

        let outcomes = seq
            .run(&steps(
                r##"[{
                    "type": "clickIfExists",
                    "selectorList": ["#nope", ".expand"],
                    "safetyDelay_ms": 200
                }]"##,
            ))
            .await
            .unwrap();

        assert_eq!(outcomes, vec![StepOutcome::Completed]);
        assert_eq!(doc.activations().len(), 1);
        assert!(doc.snapshot().contains("panel"));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(200) && elapsed < Duration::from_millis(210));
    }

    #[tokio::test(start_paused = true)]
    async fn test_optional_clicks_are_no_ops() {
        let doc = ScriptedDocument::new("<p>plain</p>");
        let seq = Sequencer::new(&doc, &EngineConfig::default());
        let started = Instant::now();

        let outcomes = seq
            .run(&steps(
                r##"[
                    { "type": "clickIfExists", "selectorList": ["#a", "#b"],
                      "safetyDelay_ms": 500 },
                    { "type": "clickByTextIfExists", "text": "Details", "fuzzy": true }
                ]"##,
            ))
            .await
            .unwrap();

        assert_eq!(outcomes, vec![StepOutcome::NoOp, StepOutcome::NoOp]);
        assert!(doc.activations().is_empty());
        assert_eq!(started.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_by_text_waits_for_late_tab() {
        let doc = ScriptedDocument::new("<nav></nav>")
            .reveal_after(
                Duration::from_millis(400),
                r#"<nav><a class="tab">Routing Steps</a></nav>"#,
            )
            .on_click_after(
                ".tab",
                Duration::from_millis(100),
                r#"<table id="ops"><tr><td>10</td></tr></table>"#,
            );
        let seq = Sequencer::new(&doc, &EngineConfig::default());

        seq.run(&steps(
            r##"[
                { "type": "clickByText", "text": "routing", "fuzzy": true,
                  "timeout_ms": 2000, "safetyDelay_ms": 150 },
                { "type": "waitFor", "selector": "table#ops", "timeout_ms": 1000 }
            ]"##,
        ))
        .await
        .unwrap();

        assert_eq!(doc.activations().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_by_text_timeout() {
        let doc = StaticDocument::new("<button>Summary</button>");
        let seq = Sequencer::new(&doc, &EngineConfig::default());
        let err = seq
            .run(&steps(
                r##"[{ "type": "clickByText", "text": "Details", "fuzzy": true,
                       "timeout_ms": 1000 }]"##,
            ))
            .await
            .unwrap_err();
        match err {
            ExtractError::Timeout { context, timeout_ms } => {
                assert_eq!(context, "text `Details`");
                assert_eq!(timeout_ms, 1000);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_step_is_skipped_and_sequence_continues() {
        let doc = StaticDocument::new("<p>x</p>");
        let seq = Sequencer::new(&doc, &EngineConfig::default());
        let started = Instant::now();
        let outcomes = seq
            .run(&steps(
                r##"[{ "type": "hover", "selector": "p" }, { "type": "sleep", "ms": 100 }]"##,
            ))
            .await
            .unwrap();
        assert_eq!(outcomes, vec![StepOutcome::Skipped, StepOutcome::Completed]);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(100) && elapsed < Duration::from_millis(110));
    }

    #[tokio::test]
    async fn test_unknown_step_alone_reports_non_fatal_error() {
        let doc = StaticDocument::new("<p>x</p>");
        let seq = Sequencer::new(&doc, &EngineConfig::default());
        let step = &steps(r#"[{ "type": "hover", "selector": "p" }]"#)[0];
        let err = seq.run_step(step).await.unwrap_err();
        assert!(matches!(err, ExtractError::UnknownActionStep(ref kind) if kind == "hover"));
        assert!(!err.is_fatal());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_step_stops_the_sequence() {
        let doc = ScriptedDocument::new(r#"<button id="go">Go</button>"#);
        let seq = Sequencer::new(&doc, &EngineConfig::default());
        let result = seq
            .run(&steps(
                r##"[
                    { "type": "waitFor", "selector": "#missing", "timeout_ms": 300 },
                    { "type": "clickIfExists", "selectorList": ["#go"] }
                ]"##,
            ))
            .await;
        assert!(result.is_err());
        assert!(doc.activations().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_token_interrupts_waits() {
        let doc = StaticDocument::new("<p>x</p>");
        let token = CancellationToken::new();
        token.cancel();
        let seq = Sequencer::new(&doc, &EngineConfig::default()).with_cancellation(token);
        let err = seq.run(&steps(r#"[{ "type": "sleep", "ms": 50 }]"#)).await.unwrap_err();
        assert!(matches!(err, ExtractError::Cancelled));
    }
}
