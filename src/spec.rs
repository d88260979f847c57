//! Extraction spec data model
//!
//! One spec per document type, authored by hand as JSON:
//!
//! ```json
//! {
//!   "fields": {
//!     "workOrder": { "selectors": ["#woNumber", ".wo-id"], "label": "Work Order #" },
//!     "qty":       { "selectors": [".qty"], "regex": "(\\d+)" }
//!   },
//!   "operations": {
//!     "rowSelector": "table#ops tbody tr",
//!     "cols": { "op": { "selectors": [".op-num"], "nth": 0 } }
//!   },
//!   "actions": [
//!     { "type": "clickByText", "text": "Routing", "fuzzy": true, "timeout_ms": 8000 },
//!     { "type": "waitFor", "selector": "table#ops", "timeout_ms": 8000 }
//!   ]
//! }
//! ```
//!
//! Bad selectors and cleanup patterns do not fail the load; they are logged
//! and behave as "never matches" / "no pattern". Action objects that are not
//! understood become [`ActionStep::Unknown`] and are skipped at run time.

use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

use crate::config::{DEFAULT_SETTLE_MS, DEFAULT_TIMEOUT_MS};
use crate::error::ExtractError;
use crate::extractors::Locator;

/// Root artifact, immutable once loaded
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractionSpec {
    #[serde(default)]
    pub fields: BTreeMap<String, FieldSpec>,
    /// Repeating-row region; absent when `operations` has no `rowSelector`
    #[serde(default, rename = "operations", deserialize_with = "lenient_table")]
    pub table: Option<TableSpec>,
    /// Interaction script, run in order before extraction
    #[serde(default, deserialize_with = "lenient_steps")]
    pub actions: Vec<ActionStep>,
}

impl ExtractionSpec {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldSpec {
    #[serde(default, rename = "selectors")]
    pub locators: Vec<Locator>,
    /// Caption used for the proximity fallback
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default, rename = "regex")]
    pub cleanup: Option<CleanupPattern>,
}

/// A field's cleanup regex. A pattern that fails to compile is kept only so it
/// can be reported; it behaves as no pattern.
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "String")]
pub enum CleanupPattern {
    Compiled(Regex),
    Malformed(String),
}

impl CleanupPattern {
    pub fn regex(&self) -> Option<&Regex> {
        match self {
            CleanupPattern::Compiled(re) => Some(re),
            CleanupPattern::Malformed(_) => None,
        }
    }
}

impl From<String> for CleanupPattern {
    fn from(pattern: String) -> Self {
        match Regex::new(&pattern) {
            Ok(re) => CleanupPattern::Compiled(re),
            Err(source) => {
                let err = ExtractError::MalformedCleanupPattern {
                    pattern: pattern.clone(),
                    source,
                };
                warn!(error = %err, "cleanup pattern ignored");
                CleanupPattern::Malformed(pattern)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableSpec {
    /// Evaluated once against the whole document
    pub row_locator: Locator,
    pub columns: BTreeMap<String, ColumnSpec>,
}

/// `operations` as written, before the row selector is checked
#[derive(Deserialize)]
struct RawTable {
    #[serde(default, rename = "rowSelector")]
    row_selector: Option<Value>,
    #[serde(default, rename = "cols")]
    columns: BTreeMap<String, ColumnSpec>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ColumnSpec {
    /// Scoped to the row node
    #[serde(default, rename = "selectors")]
    pub locators: Vec<Locator>,
    /// 0-based child element used when no locator matches
    #[serde(default, rename = "nth", deserialize_with = "lenient_index")]
    pub positional_index: Option<usize>,
}

/// One pre-extraction interaction
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum ActionStep {
    #[serde(rename = "waitFor")]
    WaitForAppearance {
        #[serde(rename = "selector")]
        locator: Locator,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
    },

    #[serde(rename = "clickIfExists")]
    ClickFirstPresent {
        #[serde(default, rename = "selectorList")]
        locators: Vec<Locator>,
        #[serde(default, rename = "safetyDelay_ms")]
        settle_delay_ms: u64,
    },

    #[serde(rename = "clickByText")]
    ClickByVisibleText {
        text: String,
        #[serde(default)]
        fuzzy: bool,
        #[serde(default = "default_timeout_ms")]
        timeout_ms: u64,
        #[serde(default = "default_settle_ms", rename = "safetyDelay_ms")]
        settle_delay_ms: u64,
    },

    #[serde(rename = "clickByTextIfExists")]
    ClickByVisibleTextIfPresent {
        text: String,
        #[serde(default)]
        fuzzy: bool,
        #[serde(default = "default_settle_ms", rename = "safetyDelay_ms")]
        settle_delay_ms: u64,
    },

    #[serde(rename = "sleep")]
    Sleep { ms: u64 },

    /// A step this version does not understand (unknown `type` or bad fields)
    #[serde(skip)]
    Unknown { kind: String, reason: String },
}

impl ActionStep {
    /// The `type` tag as written in the spec file
    pub fn kind(&self) -> &str {
        match self {
            ActionStep::WaitForAppearance { .. } => "waitFor",
            ActionStep::ClickFirstPresent { .. } => "clickIfExists",
            ActionStep::ClickByVisibleText { .. } => "clickByText",
            ActionStep::ClickByVisibleTextIfPresent { .. } => "clickByTextIfExists",
            ActionStep::Sleep { .. } => "sleep",
            ActionStep::Unknown { kind, .. } => kind,
        }
    }
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_settle_ms() -> u64 {
    DEFAULT_SETTLE_MS
}

fn lenient_table<'de, D>(deserializer: D) -> Result<Option<TableSpec>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<RawTable>::deserialize(deserializer)? else {
        return Ok(None);
    };
    match raw.row_selector {
        Some(Value::String(selector)) => Ok(Some(TableSpec {
            row_locator: Locator::css(&selector),
            columns: raw.columns,
        })),
        other => {
            warn!(row_selector = ?other, "operations has no usable rowSelector, table skipped");
            Ok(None)
        }
    }
}

fn lenient_index<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    let index = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(value) => {
            let index = value.as_u64().and_then(|n| usize::try_from(n).ok());
            if index.is_none() {
                warn!(nth = %value, "nth is not a non-negative integer, positional fallback off");
            }
            index
        }
    };
    Ok(index)
}

fn lenient_steps<'de, D>(deserializer: D) -> Result<Vec<ActionStep>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw
        .into_iter()
        .map(|value| {
            let kind = value
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("<missing type>")
                .to_string();
            serde_json::from_value::<ActionStep>(value)
                .unwrap_or_else(|e| ActionStep::Unknown { kind, reason: e.to_string() })
        })
        .collect())
}
