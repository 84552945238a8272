//! Phase 1 (online) of the audit sink: per-line JSON objects
//! written to independent object paths so retries are safe (last-writer-wins
//! per line) and concurrent lines never contend on the same key.

use std::time::Duration;

use aws_sdk_s3::primitives::ByteStream;
use uuid::Uuid;

use bomenrich_core::{AuditObjectKind, CoreError, ObjectPaths};

const RETRY_ATTEMPTS: u32 = 3;
const RETRY_BASE: Duration = Duration::from_millis(500);
const RETRY_MAX: Duration = Duration::from_secs(10);

pub struct AuditSink {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl AuditSink {
    pub fn new(client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self { client, bucket: bucket.into() }
    }

    /// Writes one of the three per-line audit objects (Phase 1).
    pub async fn write_object(
        &self,
        bom_id: Uuid,
        kind: AuditObjectKind,
        line_id: Uuid,
        body: &serde_json::Value,
    ) -> Result<(), CoreError> {
        let key = ObjectPaths::audit_object(bom_id, kind, line_id);
        let bytes = serde_json::to_vec(body)?;

        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = self
                .client
                .put_object()
                .bucket(&self.bucket)
                .key(&key)
                .body(ByteStream::from(bytes.clone()))
                .content_type("application/json")
                .send()
                .await;

            match result {
                Ok(_) => {
                    tracing::debug!(%bom_id, ?kind, %line_id, "audit object written");
                    return Ok(());
                }
                Err(err) if attempt < RETRY_ATTEMPTS => {
                    let delay = backoff_delay(attempt);
                    tracing::warn!(%bom_id, ?kind, attempt, error = %err, ?delay, "audit object write failed, retrying");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    return Err(CoreError::PermanentDownstream(format!(
                                "audit object {key} failed after {attempt} attempts: {err}"
                            )));
                }
            }
        }
    }

    /// Writes all three audit objects for a single line (vendor responses,
    /// normalized data, comparison summary). A permanent failure here marks
    /// the audit step degraded but must not fail the workflow; callers
    /// decide how to surface that.
    pub async fn write_line_audit(
        &self,
        bom_id: Uuid,
        line_id: Uuid,
        vendor_responses: &serde_json::Value,
        normalized_data: &serde_json::Value,
        comparison_summary: &serde_json::Value,
    ) -> Vec<(AuditObjectKind, CoreError)> {
        let writes = [
            (AuditObjectKind::VendorResponses, vendor_responses),
            (AuditObjectKind::NormalizedData, normalized_data),
            (AuditObjectKind::ComparisonSummary, comparison_summary),
        ];

        let mut degraded = Vec::new();
        for (kind, body) in writes {
            if let Err(err) = self.write_object(bom_id, kind, line_id, body).await {
                degraded.push((kind, err));
            }
        }
        degraded
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let millis = RETRY_BASE.as_millis().saturating_mul(1u128 << attempt.min(10));
    Duration::from_millis(millis.min(RETRY_MAX.as_millis()) as u64)
}
