//! Token accounting. Purely observational; never participates in control
//! flow.

use std::collections::HashMap;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::llm::response::UsageMetadata;

/// How a backend reports usage numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageSemantics {
    /// Counts cover just the finished request (Gemini, OpenAI chat).
    PerRequest,
    /// Counts accumulate across the API session; the tracker converts them
    /// to deltas against the previous report.
    Cumulative,
}

/// Aggregated counters for a session or the whole process.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub requests: u64,
    pub prompt_tokens: u64,
    pub response_tokens: u64,
    pub thought_tokens: u64,
    pub tool_use_tokens: u64,
    pub cached_tokens: u64,
    pub total_tokens: u64,
}

impl UsageSummary {
    fn add(&mut self, usage: &UsageMetadata) {
        self.requests += 1;
        self.prompt_tokens += usage.prompt_tokens;
        self.response_tokens += usage.response_tokens;
        self.thought_tokens += usage.thought_tokens;
        self.tool_use_tokens += usage.tool_use_tokens;
        self.cached_tokens += usage.cached_tokens;
        self.total_tokens += usage.total_tokens;
    }
}

#[derive(Default)]
struct SessionUsage {
    summary: UsageSummary,
    last_cumulative: Option<UsageMetadata>,
}

/// Per-session and global token accounting.
#[derive(Default)]
pub struct TokenTracker {
    sessions: Mutex<HashMap<String, SessionUsage>>,
    global: Mutex<UsageSummary>,
}

impl TokenTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one response's usage. For cumulative backends the delta
    /// against the previous report is credited; a drop in the cumulative
    /// value (provider-side reset) restarts the baseline.
    pub fn record(&self, session: &str, usage: &UsageMetadata, semantics: UsageSemantics) {
        let mut sessions = self.sessions.lock();
        let entry = sessions.entry(session.to_string()).or_default();

        let delta = match semantics {
            UsageSemantics::PerRequest => *usage,
            UsageSemantics::Cumulative => {
                let delta = match &entry.last_cumulative {
                    Some(previous) if usage.total_tokens >= previous.total_tokens => {
                        UsageMetadata {
                            prompt_tokens: usage
                                .prompt_tokens
                                .saturating_sub(previous.prompt_tokens),
                            response_tokens: usage
                                .response_tokens
                                .saturating_sub(previous.response_tokens),
                            thought_tokens: usage
                                .thought_tokens
                                .saturating_sub(previous.thought_tokens),
                            tool_use_tokens: usage
                                .tool_use_tokens
                                .saturating_sub(previous.tool_use_tokens),
                            cached_tokens: usage
                                .cached_tokens
                                .saturating_sub(previous.cached_tokens),
                            total_tokens: usage
                                .total_tokens
                                .saturating_sub(previous.total_tokens),
                        }
                    }
                    _ => *usage,
                };
                entry.last_cumulative = Some(*usage);
                delta
            }
        };

        entry.summary.add(&delta);
        self.global.lock().add(&delta);
    }

    pub fn session_summary(&self, session: &str) -> UsageSummary {
        self.sessions
            .lock()
            .get(session)
            .map(|entry| entry.summary)
            .unwrap_or_default()
    }

    pub fn global_summary(&self) -> UsageSummary {
        *self.global.lock()
    }

    /// Running total for one session, used by the compaction trigger.
    pub fn session_total_tokens(&self, session: &str) -> u64 {
        self.session_summary(session).total_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage(prompt: u64, response: u64) -> UsageMetadata {
        UsageMetadata {
            prompt_tokens: prompt,
            response_tokens: response,
            total_tokens: prompt + response,
            ..Default::default()
        }
    }

    #[test]
    fn per_request_usage_accumulates() {
        let tracker = TokenTracker::new();
        tracker.record("s1", &usage(100, 20), UsageSemantics::PerRequest);
        tracker.record("s1", &usage(150, 30), UsageSemantics::PerRequest);

        let summary = tracker.session_summary("s1");
        assert_eq!(summary.requests, 2);
        assert_eq!(summary.prompt_tokens, 250);
        assert_eq!(summary.total_tokens, 300);
    }

    #[test]
    fn cumulative_usage_is_converted_to_deltas() {
        let tracker = TokenTracker::new();
        tracker.record("s1", &usage(100, 20), UsageSemantics::Cumulative);
        tracker.record("s1", &usage(250, 70), UsageSemantics::Cumulative);

        let summary = tracker.session_summary("s1");
        // 120 from the first report, 200 delta from the second.
        assert_eq!(summary.total_tokens, 320);
        assert_eq!(summary.prompt_tokens, 250);
        assert_eq!(summary.response_tokens, 70);
    }

    #[test]
    fn cumulative_reset_restarts_baseline() {
        let tracker = TokenTracker::new();
        tracker.record("s1", &usage(500, 100), UsageSemantics::Cumulative);
        // Provider reset: cumulative total dropped.
        tracker.record("s1", &usage(50, 10), UsageSemantics::Cumulative);

        let summary = tracker.session_summary("s1");
        assert_eq!(summary.total_tokens, 660);
    }

    #[test]
    fn sessions_are_tracked_independently_and_globally() {
        let tracker = TokenTracker::new();
        tracker.record("a", &usage(10, 1), UsageSemantics::PerRequest);
        tracker.record("b", &usage(20, 2), UsageSemantics::PerRequest);

        assert_eq!(tracker.session_summary("a").total_tokens, 11);
        assert_eq!(tracker.session_summary("b").total_tokens, 22);
        assert_eq!(tracker.global_summary().total_tokens, 33);
        assert_eq!(tracker.global_summary().requests, 2);
    }

    #[test]
    fn unknown_session_summary_is_zeroed() {
        let tracker = TokenTracker::new();
        assert_eq!(tracker.session_summary("ghost"), UsageSummary::default());
    }
}
