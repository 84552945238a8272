//! Field-diff report: a downstream consumer of `audit_ready`
//! loads the original-BOM CSV and the normalized JSON objects, computes
//! per-field before/after/change-reason rows, and writes `field_diff-{label}.csv`.
//! Rows where every field is unchanged are omitted.

use serde_json::Value;
use uuid::Uuid;

use bomenrich_core::CoreError;

use crate::finalize::rows_to_csv;

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDiffRow {
    pub line_id: Uuid,
    pub field: String,
    pub before: String,
    pub after: String,
    pub change_reason: String,
}

/// Compares an original line item's field to its normalized counterpart for
/// every key present in either side, skipping fields whose values match.
pub fn diff_line(line_id: Uuid, original: &Value, normalized: &Value, change_reason: &str) -> Vec<FieldDiffRow> {
    let mut fields: Vec<&String> = Vec::new();
    if let Some(map) = original.as_object() {
        fields.extend(map.keys());
    }
    if let Some(map) = normalized.as_object() {
        for key in map.keys() {
            if !fields.contains(&key) {
                fields.push(key);
            }
        }
    }

    fields
        .into_iter()
        .filter_map(|field| {
            let before = original.get(field).cloned().unwrap_or(Value::Null);
            let after = normalized.get(field).cloned().unwrap_or(Value::Null);
            if before == after {
                return None;
            }
            Some(FieldDiffRow {
                    line_id,
                    field: field.clone(),
                    before: render(&before),
                    after: render(&after),
                    change_reason: change_reason.to_string(),
                })
        })
        .collect()
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn rows_to_csv_rows(rows: &[FieldDiffRow]) -> Vec<Value> {
    rows.iter()
        .map(|r| {
            serde_json::json!({
                    "line_id": r.line_id.to_string(),
                    "field": r.field,
                    "before": r.before,
                    "after": r.after,
                    "change_reason": r.change_reason,
                })
        })
        .collect()
}

pub const FIELD_DIFF_HEADER: [&str; 5] = ["line_id", "field", "before", "after", "change_reason"];

/// Renders a full field-diff report as CSV text, ready to upload at
/// `ObjectPaths::field_diff_csv`.
pub fn render_field_diff_csv(rows: &[FieldDiffRow]) -> Result<String, CoreError> {
    let values = rows_to_csv_rows(rows);
    Ok(rows_to_csv(&FIELD_DIFF_HEADER, &values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn omits_unchanged_fields() {
        let id = Uuid::new_v4();
        let rows = diff_line(
            id,
            &json!({"description": "resistor", "mpn": "R-100"}),
            &json!({"description": "100 ohm resistor", "mpn": "R-100"}),
            "normalized from supplier data",
        );
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].field, "description");
        assert_eq!(rows[0].before, "resistor");
        assert_eq!(rows[0].after, "100 ohm resistor");
    }

    #[test]
    fn no_diff_rows_when_everything_matches() {
        let id = Uuid::new_v4();
        let rows = diff_line(id, &json!({"mpn": "R-100"}), &json!({"mpn": "R-100"}), "noop");
        assert!(rows.is_empty());
    }

    #[test]
    fn csv_header_matches_declared_columns() {
        let id = Uuid::new_v4();
        let rows = diff_line(id, &json!({"a": 1}), &json!({"a": 2}), "enriched");
        let csv = render_field_diff_csv(&rows).unwrap();
        assert!(csv.starts_with("line_id,field,before,after,change_reason\n"));
    }
}
