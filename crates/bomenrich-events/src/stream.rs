//! Transport model: an append-only event log with topic-like
//! routing keys and per-consumer offset tracking. `StreamTransport` is the
//! seam an external broker client plugs into; this crate owns filtering,
//! dedup, offset bookkeeping, and dispatch, not the wire protocol.

use async_trait::async_trait;
use serde_json::Value;

use bomenrich_core::CoreError;

/// `(routing_key, payload, priority, headers)` published by producers.
#[derive(Debug, Clone)]
pub struct StreamMessage {
    pub offset: u64,
    pub routing_key: String,
    pub payload: Value,
    pub priority: u8,
    pub headers: std::collections::HashMap<String, String>,
}

impl StreamMessage {
    /// The dedup identity: `event_id` if present, else `bom_id`, else the
    /// message's own offset.
    pub fn dedup_id(&self) -> String {
        self.payload
            .get("event_id")
            .and_then(|v| v.as_str())
            .or_else(|| self.payload.get("bom_id").and_then(|v| v.as_str()))
            .map(String::from)
            .unwrap_or_else(|| self.offset.to_string())
    }
}

/// The four named streams consumers subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamName {
    PlatformBom,
    PlatformEnrichment,
    PlatformAdmin,
    PlatformAudit,
}

impl StreamName {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamName::PlatformBom => "stream.platform.bom",
            StreamName::PlatformEnrichment => "stream.platform.enrichment",
            StreamName::PlatformAdmin => "stream.platform.admin",
            StreamName::PlatformAudit => "stream.platform.audit",
        }
    }
}

/// Broker-facing seam. An adapter over the real transport (e.g. RabbitMQ
/// Streams) implements this; the rest of the crate talks only to it.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    async fn connect(&self, stream: StreamName, consumer_group: &str, from_offset: Option<u64>) -> Result<(), CoreError>;

    /// Pulls the next message, blocking until one is available. Returns
    /// `None` on a clean stream end (not expected for these streams, but a
    /// caller's reconnect loop still needs somewhere to go).
    async fn next_message(&self) -> Result<Option<StreamMessage>, CoreError>;

    async fn commit_offset(&self, stream: StreamName, consumer_group: &str, offset: u64) -> Result<(), CoreError>;
}

/// Routing-key filter a consumer declares at subscribe time (/// "consumers declare a stream, a consumer group, and a routing-key
/// filter"). Supports a single trailing `*` wildcard, matching the
/// `customer.bom.*` / `cns.bom.*` style keys in the spec's stream table.
#[derive(Debug, Clone)]
pub struct RoutingKeyFilter {
    patterns: Vec<String>,
}

impl RoutingKeyFilter {
    pub fn new(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self { patterns: patterns.into_iter().map(Into::into).collect() }
    }

    pub fn matches(&self, routing_key: &str) -> bool {
        self.patterns.iter().any(|p| match p.strip_suffix('*') {
                Some(prefix) => routing_key.starts_with(prefix),
                None => routing_key == p,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_prefix_matches() {
        let filter = RoutingKeyFilter::new(["customer.bom.*", "bom.parsed"]);
        assert!(filter.matches("customer.bom.uploaded"));
        assert!(filter.matches("bom.parsed"));
        assert!(!filter.matches("cns.bom.created"));
    }

    #[test]
    fn dedup_id_falls_back_through_event_id_bom_id_offset() {
        let msg = StreamMessage {
            offset: 42,
            routing_key: "bom.parsed".to_string(),
            payload: serde_json::json!({"bom_id": "bom-7"}),
            priority: 5,
            headers: Default::default(),
        };
        assert_eq!(msg.dedup_id(), "bom-7");

        let msg_no_ids = StreamMessage { payload: serde_json::json!({}), ..msg };
        assert_eq!(msg_no_ids.dedup_id(), "42");
    }
}
