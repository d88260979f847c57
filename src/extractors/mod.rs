//! Read-only extraction over a parsed snapshot
//!
//! Each module handles one part of the pipeline.

mod fields;
mod locator;
mod table;

pub use fields::*;
pub use locator::*;
pub use table::*;

use scraper::Html;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::spec::ExtractionSpec;

/// Combined output of one run, handed to the label renderer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Declared field key -> trimmed value (`""` when absent)
    pub fields: BTreeMap<String, String>,
    /// Table rows in document order
    pub rows: Vec<Row>,
}

/// Extract fields and rows from one snapshot of markup.
///
/// Never fails: missing data degrades to empty strings and dropped rows.
pub fn extract_snapshot(html: &str, spec: &ExtractionSpec) -> ExtractionResult {
    let document = Html::parse_document(html);
    let root = document.root_element();

    ExtractionResult {
        fields: extract_fields(&spec.fields, root),
        rows: extract_rows(spec.table.as_ref(), root),
    }
}
