//! Label stock catalog and printer routing
//!
//! Each label type prints on one stock size. Large (4x6 inch) labels go to the
//! Zebra; small (62x100 mm) labels go to whichever Brother the user picked.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockSize {
    #[serde(rename = "4x6")]
    Large4x6,
    #[serde(rename = "62x100")]
    Small62x100,
}

impl StockSize {
    pub fn key(self) -> &'static str {
        match self {
            StockSize::Large4x6 => "4x6",
            StockSize::Small62x100 => "62x100",
        }
    }

    /// CSS page class the renderer lays the label out with
    pub fn page_class(self) -> &'static str {
        match self {
            StockSize::Large4x6 => "page-4x6",
            StockSize::Small62x100 => "page-62x100",
        }
    }

    /// Page geometry for this stock
    pub fn page(self) -> PrintPage {
        match self {
            StockSize::Large4x6 => PrintPage {
                size: self,
                width_mm: 101.6,
                height_mm: 152.4,
                margin_in: 0.375,
                orientation: Orientation::Portrait,
            },
            StockSize::Small62x100 => PrintPage {
                size: self,
                width_mm: 62.0,
                height_mm: 100.0,
                margin_in: 0.16,
                orientation: Orientation::Portrait,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// Page geometry handed to the renderer with the extracted data
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrintPage {
    #[serde(rename = "sizeKey")]
    pub size: StockSize,
    pub width_mm: f64,
    pub height_mm: f64,
    pub margin_in: f64,
    pub orientation: Orientation,
}

/// Stock used by a known label type
pub fn label_stock(label_type: &str) -> Option<StockSize> {
    match label_type {
        "label_1" | "label_4" => Some(StockSize::Large4x6),
        "label_2" | "label_3" | "label_5" | "label_6" => Some(StockSize::Small62x100),
        _ => None,
    }
}

pub fn is_large_label(label_type: &str) -> bool {
    label_stock(label_type) == Some(StockSize::Large4x6)
}

/// Page class for `label_type`; unknown types lay out as small labels
pub fn page_class_for(label_type: &str) -> &'static str {
    label_stock(label_type)
        .unwrap_or(StockSize::Small62x100)
        .page_class()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Printer {
    pub id: &'static str,
    pub label: &'static str,
    pub size: StockSize,
}

/// Logical printers; the native print agent maps ids to real queues
pub const PRINTERS: &[Printer] = &[
    Printer {
        id: "zebra_4x6",
        label: "Zebra (4×6, Shipping Area)",
        size: StockSize::Large4x6,
    },
    Printer {
        id: "bro_1",
        label: "Brother #1 (62×100)",
        size: StockSize::Small62x100,
    },
    Printer {
        id: "bro_2",
        label: "Brother #2 (62×100)",
        size: StockSize::Small62x100,
    },
    Printer {
        id: "bro_3",
        label: "Brother #3 (62×100)",
        size: StockSize::Small62x100,
    },
];

pub const LARGE_PRINTER_ID: &str = "zebra_4x6";

pub fn printer(id: &str) -> Option<&'static Printer> {
    PRINTERS.iter().find(|p| p.id == id)
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    #[error("unknown label type `{0}`")]
    UnknownLabel(String),
    #[error("unknown printer `{0}`")]
    UnknownPrinter(String),
    #[error("choose a 62x100 printer for label `{0}`")]
    NoSmallPrinter(String),
}

/// Where a label goes and on what page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PrintTarget {
    pub printer_id: &'static str,
    pub page: PrintPage,
}

/// Pick the printer and page for `label_type`.
///
/// Large labels go to the Zebra. If a small printer is also chosen and the
/// user confirmed `force_small`, the label is re-laid out on small stock and
/// sent there instead. Small labels always need a chosen small printer.
pub fn resolve_target(
    label_type: &str,
    chosen_small_printer: Option<&str>,
    force_small: bool,
) -> Result<PrintTarget, RoutingError> {
    let stock = label_stock(label_type)
        .ok_or_else(|| RoutingError::UnknownLabel(label_type.to_string()))?;

    let chosen = chosen_small_printer
        .map(|id| {
            printer(id)
                .filter(|p| p.size == StockSize::Small62x100)
                .ok_or_else(|| RoutingError::UnknownPrinter(id.to_string()))
        })
        .transpose()?;

    match (stock, chosen) {
        (StockSize::Large4x6, Some(small)) if force_small => Ok(PrintTarget {
            printer_id: small.id,
            page: StockSize::Small62x100.page(),
        }),
        (StockSize::Large4x6, _) => Ok(PrintTarget {
            printer_id: LARGE_PRINTER_ID,
            page: StockSize::Large4x6.page(),
        }),
        (StockSize::Small62x100, Some(small)) => Ok(PrintTarget {
            printer_id: small.id,
            page: StockSize::Small62x100.page(),
        }),
        (StockSize::Small62x100, None) => Err(RoutingError::NoSmallPrinter(label_type.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog() {
        assert!(is_large_label("label_1"));
        assert!(is_large_label("label_4"));
        assert!(!is_large_label("label_3"));
        assert!(!is_large_label("label_99"));
        assert_eq!(page_class_for("label_4"), "page-4x6");
        assert_eq!(page_class_for("label_2"), "page-62x100");
        assert_eq!(page_class_for("unknown"), "page-62x100");
        assert_eq!(printer("bro_2").unwrap().size, StockSize::Small62x100);
    }

    #[test]
    fn test_large_label_defaults_to_zebra() {
        let target = resolve_target("label_1", None, false).unwrap();
        assert_eq!(target.printer_id, "zebra_4x6");
        assert_eq!(target.page.width_mm, 101.6);

        // a chosen small printer without confirmation is ignored
        let target = resolve_target("label_1", Some("bro_1"), false).unwrap();
        assert_eq!(target.printer_id, "zebra_4x6");
    }

    #[test]
    fn test_large_label_forced_onto_small_stock() {
        let target = resolve_target("label_4", Some("bro_3"), true).unwrap();
        assert_eq!(target.printer_id, "bro_3");
        assert_eq!(target.page.size, StockSize::Small62x100);
        assert_eq!(target.page.margin_in, 0.16);
    }

    #[test]
    fn test_small_label_needs_a_small_printer() {
        assert_eq!(
            resolve_target("label_2", None, false),
            Err(RoutingError::NoSmallPrinter("label_2".into()))
        );
        assert_eq!(
            resolve_target("label_2", Some("zebra_4x6"), false),
            Err(RoutingError::UnknownPrinter("zebra_4x6".into()))
        );
        let target = resolve_target("label_5", Some("bro_1"), false).unwrap();
        assert_eq!(target.printer_id, "bro_1");
    }

    #[test]
    fn test_page_serializes_with_size_key() {
        let json = serde_json::to_value(StockSize::Large4x6.page()).unwrap();
        assert_eq!(json["sizeKey"], "4x6");
        assert_eq!(json["orientation"], "portrait");
    }
}
