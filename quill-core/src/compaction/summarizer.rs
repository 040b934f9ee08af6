//! LLM-driven summarisation of selected event spans.

use std::fmt::Write as _;

use anyhow::{Context as _, Result};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::llm::content::Content;
use crate::llm::provider::LLMProvider;
use crate::llm::request::LLMRequest;
use crate::llm::utils::estimate_token_count;
use crate::session::event::{CompactionRecord, EventAuthor};
use crate::session::{Event, Session};

use super::{CompactionConfig, select_events};

/// Packages selected events into a summary prompt, invokes the model, and
/// appends the resulting compaction event through the normal append path.
pub struct Summarizer {
    model: String,
    config: CompactionConfig,
}

impl Summarizer {
    pub fn new(model: impl Into<String>, config: CompactionConfig) -> Self {
        Self {
            model: model.into(),
            config,
        }
    }

    /// Run one compaction cycle. Returns the appended compaction event, or
    /// `None` when the selector found nothing to compact.
    pub async fn compact(
        &self,
        session: &Session,
        provider: &dyn LLMProvider,
        cancel: CancellationToken,
    ) -> Result<Option<Event>> {
        let raw = session.events_raw().await;
        let selected = select_events(&raw, &self.config);
        if selected.is_empty() {
            return Ok(None);
        }

        let prompt = build_summary_prompt(&selected, &self.config.prompt_template);
        let original_tokens: u64 = selected
            .iter()
            .map(|event| match &event.usage_metadata {
                Some(usage) => usage.total_tokens,
                None => estimate_token_count(&event.content.joined_text()),
            })
            .sum();

        let request = LLMRequest::new(self.model.clone(), vec![Content::user_text(prompt)]);
        let response = provider
            .generate(request, cancel)
            .await
            .context("failed to generate compaction summary")?;

        let summary_text = response.content.joined_text().trim().to_string();
        let summary_content = Content::model_text(summary_text.clone());
        let compacted_tokens = estimate_token_count(&summary_text);

        let first = selected.first().expect("selection is non-empty");
        let last = selected.last().expect("selection is non-empty");
        let record = CompactionRecord {
            start_timestamp: first.timestamp,
            end_timestamp: last.timestamp,
            start_invocation_id: first.invocation_id.clone(),
            end_invocation_id: last.invocation_id.clone(),
            event_count: selected.len(),
            original_tokens,
            compacted_tokens,
            compression_ratio: if compacted_tokens > 0 {
                original_tokens as f64 / compacted_tokens as f64
            } else {
                0.0
            },
            content: serde_json::to_value(&summary_content)?,
        };

        let event = Event::new(
            Uuid::new_v4().to_string(),
            EventAuthor::Model,
            summary_content,
        )
        .with_custom_metadata(record.into_metadata());

        Ok(Some(session.append_event(event).await))
    }
}

/// Render `author: text` transcript lines under the instruction template.
/// Already-compacted events are marked so nested summaries stay legible to
/// the model.
fn build_summary_prompt(events: &[Event], template: &str) -> String {
    let mut prompt = String::new();
    let _ = writeln!(&mut prompt, "{template}");

    for event in events {
        let text = event.content.joined_text();
        if text.trim().is_empty() {
            continue;
        }
        let author = match event.author {
            EventAuthor::User => "user",
            EventAuthor::Model => "model",
            EventAuthor::Tool => "tool",
        };
        if event.is_compaction() {
            let _ = writeln!(&mut prompt, "\n[COMPACTED SUMMARY]\n{}", text.trim());
        } else {
            let _ = writeln!(&mut prompt, "\n{author}: {}", text.trim());
        }
    }

    prompt
}
