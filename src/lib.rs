//! Label data extraction engine
//!
//! Pulls labeled fields and tabular rows out of rendered ERP pages:
//! - Per document type extraction specs (directory or HTTP source, cached)
//! - Ordered locator fallback chains with label-proximity fallback
//! - Interaction steps (wait, click, click-by-text, sleep) run before reading
//! - Regex cleanup of extracted values
//! - Label stock and printer routing for the extracted document
//! - FFI entry points returning JSON

pub mod actions;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod extractors;
pub mod ffi;
pub mod labels;
pub mod loader;
pub mod logging;
pub mod spec;

pub use config::EngineConfig;
pub use document::{LiveDocument, NodePath, ScriptedDocument, StaticDocument};
pub use engine::Engine;
pub use error::{DocumentError, ExtractError, Result};
pub use extractors::*;
pub use ffi::*;
pub use loader::{DirSpecSource, HttpSpecSource, SpecCache, SpecLoader, SpecSource};
pub use spec::{ActionStep, ExtractionSpec, FieldSpec, TableSpec};
