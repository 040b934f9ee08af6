//! The event: unit of session history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::constants::session::COMPACTION_METADATA_KEY;
use crate::llm::content::Content;
use crate::llm::response::UsageMetadata;

/// Who produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventAuthor {
    User,
    Model,
    Tool,
}

/// One entry in a session's append-only log. Events are totally ordered by
/// append sequence; timestamps are advisory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique id; filled on append when empty.
    #[serde(default)]
    pub id: String,
    /// Groups every event produced for one user turn.
    pub invocation_id: String,
    pub author: EventAuthor,
    /// Filled on append when unset.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub content: Content,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_metadata: Option<Map<String, Value>>,
}

impl Event {
    pub fn new(invocation_id: impl Into<String>, author: EventAuthor, content: Content) -> Self {
        Self {
            id: String::new(),
            invocation_id: invocation_id.into(),
            author,
            timestamp: None,
            content,
            usage_metadata: None,
            custom_metadata: None,
        }
    }

    pub fn with_usage(mut self, usage: UsageMetadata) -> Self {
        self.usage_metadata = Some(usage);
        self
    }

    pub fn with_custom_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.custom_metadata = Some(metadata);
        self
    }

    /// Whether this event is a compaction summary.
    pub fn is_compaction(&self) -> bool {
        self.custom_metadata
            .as_ref()
            .is_some_and(|metadata| metadata.contains_key(COMPACTION_METADATA_KEY))
    }

    /// The compaction payload, when present and well-formed.
    pub fn compaction_record(&self) -> Option<CompactionRecord> {
        let value = self.custom_metadata.as_ref()?.get(COMPACTION_METADATA_KEY)?;
        serde_json::from_value(value.clone()).ok()
    }
}

/// Payload stored under the reserved compaction metadata key. A compaction
/// event logically replaces every event whose invocation id lies between
/// `start_invocation_id` and `end_invocation_id` inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompactionRecord {
    pub start_timestamp: Option<DateTime<Utc>>,
    pub end_timestamp: Option<DateTime<Utc>>,
    pub start_invocation_id: String,
    pub end_invocation_id: String,
    pub event_count: usize,
    pub original_tokens: u64,
    pub compacted_tokens: u64,
    pub compression_ratio: f64,
    /// Summary content serialised as JSON.
    pub content: Value,
}

impl CompactionRecord {
    pub fn into_metadata(self) -> Map<String, Value> {
        let mut metadata = Map::new();
        metadata.insert(
            COMPACTION_METADATA_KEY.to_string(),
            serde_json::to_value(self).unwrap_or(Value::Null),
        );
        metadata
    }
}
