//! Repeating-row extraction

use scraper::ElementRef;
use std::collections::BTreeMap;
use tracing::debug;

use super::locator::{node_text, resolve, Locator};
use crate::spec::{ColumnSpec, TableSpec};

pub type Row = BTreeMap<String, String>;

/// Rows under `root` in document order. Rows whose columns all trim to empty
/// are dropped; kept rows carry every declared column.
pub fn extract_rows(table: Option<&TableSpec>, root: ElementRef<'_>) -> Vec<Row> {
    let Some(table) = table else {
        return Vec::new();
    };

    let row_nodes = table.row_locator.find_all(root);
    let total = row_nodes.len();

    let rows: Vec<Row> = row_nodes
        .into_iter()
        .map(|row| extract_row(&table.columns, row))
        .filter(|row| row.values().any(|v| !v.is_empty()))
        .collect();

    debug!(matched = total, kept = rows.len(), "table rows extracted");
    rows
}

fn extract_row(columns: &BTreeMap<String, ColumnSpec>, row: ElementRef<'_>) -> Row {
    columns
        .iter()
        .map(|(key, column)| (key.clone(), extract_cell(column, row)))
        .collect()
}

fn extract_cell(column: &ColumnSpec, row: ElementRef<'_>) -> String {
    resolve(&column.locators, row)
        .or_else(|| {
            column
                .positional_index
                .and_then(|index| Locator::Nth(index).find_first(row))
        })
        .map(node_text)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::ExtractionSpec;
    use scraper::Html;

    const OPS: &str = r#"
    <table id="ops">
      <tr><td class="op-num">10</td><td>Saw cut</td><td>SAW-1</td></tr>
      <tr><td class="op-num"> </td><td>  </td><td></td></tr>
      <tr><td class="op-num">20</td><td>Mill</td><td>CNC-3</td></tr>
    </table>"#;

    fn table_spec() -> TableSpec {
        ExtractionSpec::from_json(
            r#"{ "operations": {
                "rowSelector": "table#ops tr",
                "cols": {
                    "op": { "selectors": [".op-num"], "nth": 0 },
                    "description": { "selectors": [".op-desc"], "nth": 1 },
                    "resource": { "nth": 2 }
                }
            } }"#,
        )
        .unwrap()
        .table
        .unwrap()
    }

    #[test]
    fn test_empty_rows_dropped_in_order() {
        let html = Html::parse_document(OPS);
        let rows = extract_rows(Some(&table_spec()), html.root_element());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["op"], "10");
        assert_eq!(rows[0]["description"], "Saw cut");
        assert_eq!(rows[0]["resource"], "SAW-1");
        assert_eq!(rows[1]["op"], "20");
        assert_eq!(rows[1]["resource"], "CNC-3");
    }

    #[test]
    fn test_partial_row_keeps_all_columns() {
        let html =
            Html::parse_document(r#"<table id="ops"><tr><td></td><td>Deburr</td></tr></table>"#);
        let rows = extract_rows(Some(&table_spec()), html.root_element());
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 3);
        assert_eq!(rows[0]["op"], "");
        assert_eq!(rows[0]["description"], "Deburr");
        assert_eq!(rows[0]["resource"], "");
    }

    #[test]
    fn test_column_locator_is_row_scoped() {
        let html = Html::parse_document(
            r#"<table id="ops">
                 <tr><td>10</td><td><span class="op-desc">Weld</span></td></tr>
                 <tr><td>20</td><td>Paint</td></tr>
               </table>"#,
        );
        let rows = extract_rows(Some(&table_spec()), html.root_element());
        assert_eq!(rows[0]["description"], "Weld");
        // second row has no .op-desc, so it must not borrow row one's
        assert_eq!(rows[1]["description"], "Paint");
    }

    #[test]
    fn test_absent_table_yields_no_rows() {
        let html = Html::parse_document(OPS);
        assert!(extract_rows(None, html.root_element()).is_empty());
    }
}
