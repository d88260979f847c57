//! Run-level orchestration: load spec, interact, extract
//!
//! ```text
//! Loading ──► Interacting ──► Extracting ──► Done
//!    │             │
//!    └─ SpecNotFound└─ Timeout / Document / Cancelled
//! ```
//!
//! Extracting never fails. A failed interaction aborts the run before any
//! field is read, since the page is then in an unknown state.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, info_span, Instrument};

use crate::actions::Sequencer;
use crate::config::EngineConfig;
use crate::document::LiveDocument;
use crate::error::Result;
use crate::extractors::{extract_snapshot, ExtractionResult};
use crate::loader::{DirSpecSource, SpecLoader, SpecSource};
use crate::spec::ExtractionSpec;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Loading,
    Interacting,
    Extracting,
    Done,
}

/// One engine per document context. Runs are expected to be serialized by
/// the caller; each run keeps its state local, so overlapping runs only
/// contend on the page itself.
pub struct Engine {
    loader: SpecLoader,
    config: EngineConfig,
}

impl Engine {
    pub fn new(source: Arc<dyn SpecSource>, config: EngineConfig) -> Self {
        Self {
            loader: SpecLoader::new(source, config.spec_cache_ttl()),
            config,
        }
    }

    /// Engine reading `<dir>/<doc_type>.json` specs
    pub fn from_dir(dir: impl Into<PathBuf>, config: EngineConfig) -> Self {
        Self::new(Arc::new(DirSpecSource::new(dir)), config)
    }

    pub fn loader(&self) -> &SpecLoader {
        &self.loader
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Load the spec for `doc_type` and run it against `document`
    pub async fn run_extraction(
        &self,
        doc_type: &str,
        document: &dyn LiveDocument,
    ) -> Result<ExtractionResult> {
        let span = info_span!("extraction", doc_type);
        async {
            enter(RunState::Loading);
            let spec = self.loader.load(doc_type).await?;
            self.run_spec(&spec, document).await
        }
        .instrument(span)
        .await
    }

    /// Run an already loaded spec against `document`
    pub async fn run_spec(
        &self,
        spec: &ExtractionSpec,
        document: &dyn LiveDocument,
    ) -> Result<ExtractionResult> {
        if !spec.actions.is_empty() {
            enter(RunState::Interacting);
            Sequencer::new(document, &self.config).run(&spec.actions).await?;
        }

        enter(RunState::Extracting);
        let result = extract_snapshot(&document.snapshot(), spec);

        enter(RunState::Done);
        info!(
            fields = result.fields.len(),
            empty_fields = result.fields.values().filter(|v| v.is_empty()).count(),
            rows = result.rows.len(),
            "extraction complete"
        );
        Ok(result)
    }
}

fn enter(state: RunState) {
    tracing::debug!(?state, "extraction state");
}
