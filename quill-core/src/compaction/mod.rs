//! Sliding-window compaction: selects the oldest invocations in the active
//! region and replaces them with an LLM-written summary event.

pub mod summarizer;

use chrono::{DateTime, Utc};

use crate::config::CompactionSettings;
use crate::config::constants::defaults;
use crate::session::Event;

pub use summarizer::Summarizer;

/// Compaction configuration. The prompt template receives the rendered
/// transcript appended after it.
#[derive(Debug, Clone)]
pub struct CompactionConfig {
    /// Distinct invocations in the active region before compaction fires.
    pub invocation_threshold: usize,
    /// Newest invocations left out of the window as overlap with the next
    /// compaction cycle.
    pub overlap_size: usize,
    /// Session token ceiling; the trigger fires at `safety_ratio` of it.
    pub token_threshold: u64,
    pub safety_ratio: f64,
    pub prompt_template: String,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            invocation_threshold: defaults::COMPACTION_INVOCATION_THRESHOLD,
            overlap_size: defaults::COMPACTION_OVERLAP_SIZE,
            token_threshold: defaults::COMPACTION_TOKEN_THRESHOLD,
            safety_ratio: defaults::COMPACTION_SAFETY_RATIO,
            prompt_template: default_prompt_template(),
        }
    }
}

impl From<&CompactionSettings> for CompactionConfig {
    fn from(settings: &CompactionSettings) -> Self {
        Self {
            invocation_threshold: settings.invocation_threshold,
            overlap_size: settings.overlap_size,
            token_threshold: settings.token_threshold,
            safety_ratio: settings.safety_ratio,
            prompt_template: default_prompt_template(),
        }
    }
}

fn default_prompt_template() -> String {
    "Summarize the conversation below. Preserve decisions, file paths, commands run, \
     edits made, and open questions. Keep it concise but complete enough to continue \
     the work without the original transcript."
        .to_string()
}

/// One distinct invocation in the active region, keyed by the timestamp of
/// its first event.
#[derive(Debug, Clone)]
struct InvocationEntry {
    id: String,
    first_timestamp: Option<DateTime<Utc>>,
    first_index: usize,
}

/// The sliding-window selector. Returns the events to compact, in append
/// order, or empty when the threshold has not been reached.
pub fn select_events(raw: &[Event], config: &CompactionConfig) -> Vec<Event> {
    let active_start = raw
        .iter()
        .rposition(Event::is_compaction)
        .map(|index| index + 1)
        .unwrap_or(0);
    let active = &raw[active_start..];

    let mut invocations: Vec<InvocationEntry> = Vec::new();
    for (index, event) in active.iter().enumerate() {
        if !invocations
            .iter()
            .any(|entry| entry.id == event.invocation_id)
        {
            invocations.push(InvocationEntry {
                id: event.invocation_id.clone(),
                first_timestamp: event.timestamp,
                first_index: index,
            });
        }
    }

    if invocations.len() < config.invocation_threshold {
        return Vec::new();
    }

    // Timestamps order the invocations; append order breaks ties since
    // timestamps may skew across invocations.
    invocations.sort_by_key(|entry| (entry.first_timestamp, entry.first_index));

    let n = invocations.len();
    let t = config.invocation_threshold;
    let window = t + config.overlap_size;

    let selected: Vec<&InvocationEntry> = if n >= window {
        // Compact the oldest T in the trailing window of W, keeping the
        // newest O as overlap for the next cycle.
        invocations[n - window..n - window + t].iter().collect()
    } else {
        invocations.iter().collect()
    };

    let selected_ids: Vec<&str> = selected.iter().map(|entry| entry.id.as_str()).collect();
    active
        .iter()
        .filter(|event| selected_ids.contains(&event.invocation_id.as_str()))
        .cloned()
        .collect()
}

/// Count distinct invocations after the most recent compaction event.
pub fn invocations_since_compaction(raw: &[Event]) -> usize {
    let active_start = raw
        .iter()
        .rposition(Event::is_compaction)
        .map(|index| index + 1)
        .unwrap_or(0);
    let mut seen: Vec<&str> = Vec::new();
    for event in &raw[active_start..] {
        if !seen.contains(&event.invocation_id.as_str()) {
            seen.push(&event.invocation_id);
        }
    }
    seen.len()
}

/// Trigger policy consulted by the loop between turns.
pub fn should_compact(raw: &[Event], running_tokens: u64, config: &CompactionConfig) -> bool {
    if invocations_since_compaction(raw) >= config.invocation_threshold {
        return true;
    }
    running_tokens as f64 > config.token_threshold as f64 * config.safety_ratio
}
