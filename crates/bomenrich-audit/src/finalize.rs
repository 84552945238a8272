//! Phase 2 (finalize) of the audit sink: on workflow terminal
//! state, list every per-kind object under the BOM prefix, concatenate into
//! one CSV per kind with a canonical header order, and upload as the
//! downloadable artifact. The per-line JSON objects remain the source of
//! truth; the CSV is a derived view.

use aws_sdk_s3::primitives::ByteStream;
use uuid::Uuid;

use bomenrich_core::{AuditObjectKind, CoreError, ObjectPaths};

pub struct AuditFinalizer {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl AuditFinalizer {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self { client, bucket: bucket.into() }
    }

    /// Lists every per-line object for `kind`, downloads each, and flattens
    /// them into a single CSV keyed by line id, with `header` fixing the
    /// column order canonically across runs.
    pub async fn finalize_kind(
        &self,
        bom_id: Uuid,
        kind: AuditObjectKind,
        header: &[&str],
        label: &str,
    ) -> Result<String, CoreError> {
        let prefix = ObjectPaths::audit_object_prefix(bom_id, kind);

        let mut rows = Vec::new();
        let mut continuation_token = None;
        loop {
            let mut request = self.client.list_objects_v2().bucket(&self.bucket).prefix(&prefix);
            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }
            let listing = request
                .send()
                .await
                .map_err(|e| CoreError::Transient(format!("list audit objects: {e}")))?;

            for object in listing.contents() {
                let Some(key) = object.key() else { continue };
                let get = self
                    .client
                    .get_object()
                    .bucket(&self.bucket)
                    .key(key)
                    .send()
                    .await
                    .map_err(|e| CoreError::Transient(format!("get audit object {key}: {e}")))?;
                let bytes = get
                    .body
                    .collect()
                    .await
                    .map_err(|e| CoreError::Transient(format!("read audit object {key}: {e}")))?
                    .into_bytes();
                let value: serde_json::Value = serde_json::from_slice(&bytes)?;
                rows.push(value);
            }

            if listing.is_truncated().unwrap_or(false) {
                continuation_token = listing.next_continuation_token().map(String::from);
            } else {
                break;
            }
        }

        let csv = rows_to_csv(header, &rows);

        let key = ObjectPaths::finalized_csv(bom_id, kind, label);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(csv.clone().into_bytes()))
            .content_type("text/csv")
            .send()
            .await
            .map_err(|e| CoreError::Transient(format!("upload finalized csv {key}: {e}")))?;

        Ok(key)
    }
}

/// Renders `rows` (each expected to be a JSON object) into CSV text with
/// `header` as the fixed column order. Missing fields render empty;
/// commas/quotes/newlines are escaped per RFC 4180.
pub fn rows_to_csv(header: &[&str], rows: &[serde_json::Value]) -> String {
    let mut out = String::new();
    out.push_str(&header.join(","));
    out.push('\n');

    for row in rows {
        let cells: Vec<String> = header
            .iter()
            .map(|col| {
                let raw = row.get(*col).map(value_to_cell).unwrap_or_default();
                escape_csv_cell(&raw)
            })
            .collect();
        out.push_str(&cells.join(","));
        out.push('\n');
    }
    out
}

fn value_to_cell(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn escape_csv_cell(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') || cell.contains('\n') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_missing_fields_as_empty_cells() {
        let rows = vec![json!({"mpn": "LM358N"})];
        let csv = rows_to_csv(&["mpn", "manufacturer"], &rows);
        assert_eq!(csv, "mpn,manufacturer\nLM358N,\n");
    }

    #[test]
    fn escapes_commas_and_quotes() {
        let rows = vec![json!({"description": "8-pin, \"dual\" op-amp"})];
        let csv = rows_to_csv(&["description"], &rows);
        assert_eq!(csv, "description\n\"8-pin, \"\"dual\"\" op-amp\"\n");
    }
}
