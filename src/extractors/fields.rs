//! Header field extraction: locator chain, label fallback, regex cleanup

use regex::Regex;
use scraper::ElementRef;
use std::collections::BTreeMap;
use tracing::debug;

use super::locator::{find_value_near_label, node_text, resolve};
use crate::spec::FieldSpec;

/// Extract every declared field under `root`.
///
/// Total over the declared keys: a field nothing matches maps to `""`.
pub fn extract_fields(
    fields: &BTreeMap<String, FieldSpec>,
    root: ElementRef<'_>,
) -> BTreeMap<String, String> {
    fields
        .iter()
        .map(|(key, spec)| (key.clone(), extract_field(key, spec, root)))
        .collect()
}

/// Resolve one field
pub fn extract_field(key: &str, spec: &FieldSpec, root: ElementRef<'_>) -> String {
    let mut value = resolve(&spec.locators, root).map(node_text).unwrap_or_default();

    if value.is_empty() {
        if let Some(label) = spec.label.as_deref() {
            value = find_value_near_label(label, root);
            if !value.is_empty() {
                debug!(field = key, label, "field resolved by label proximity");
            }
        }
    }

    match spec.cleanup.as_ref().and_then(|c| c.regex()) {
        Some(re) => apply_cleanup(re, &value),
        None => value,
    }
}

/// First capture group if the pattern has one and it took part in the match,
/// else the whole match. No match leaves the value unchanged.
pub fn apply_cleanup(re: &Regex, value: &str) -> String {
    match re.captures(value) {
        Some(caps) => caps
            .get(1)
            .or_else(|| caps.get(0))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_else(|| value.to_string()),
        None => value.to_string(),
    }
}
