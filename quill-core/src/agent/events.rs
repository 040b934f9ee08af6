//! Structured events emitted by the loop for the presentation layer and the
//! non-interactive JSONL stream.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::telemetry::UsageSummary;

/// One structured event. Each carries the session id, a timestamp, and a
/// type-specific payload; `Result` terminates a non-interactive stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    Init {
        session_id: String,
        timestamp: DateTime<Utc>,
        model: String,
        workspace: String,
    },
    Message {
        session_id: String,
        timestamp: DateTime<Utc>,
        delta: String,
    },
    ToolUse {
        session_id: String,
        timestamp: DateTime<Utc>,
        call_id: String,
        name: String,
        args: Value,
    },
    ToolResult {
        session_id: String,
        timestamp: DateTime<Utc>,
        call_id: String,
        name: String,
        result: Value,
    },
    Error {
        session_id: String,
        timestamp: DateTime<Utc>,
        message: String,
    },
    Result {
        session_id: String,
        timestamp: DateTime<Utc>,
        outcome: String,
        usage: UsageSummary,
    },
}

/// Callback receiving structured events as the loop produces them.
pub type EventSink = Arc<dyn Fn(&AgentEvent) + Send + Sync>;
