//! Context Compactor (C9): compacts dialog history to fit a token budget
//! before the final LLM call.

use crate::error::CoreError;
use crate::llm::{ChatModel, ChatOptions};
use crate::message::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionStrategy {
    SlidingWindow,
    Smart,
}

#[derive(Debug, Clone)]
pub struct CompactionConfig {
    pub strategy: CompactionStrategy,
    /// `sliding_window`: total messages kept (including the current turn).
    pub window_size: usize,
    /// `smart`: history longer than this triggers summarization.
    pub summarize_threshold: usize,
    /// `smart`: messages kept verbatim after the synthetic summary.
    pub recent_message_count: usize,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            strategy: CompactionStrategy::SlidingWindow,
            window_size: 20,
            summarize_threshold: 30,
            recent_message_count: 10,
        }
    }
}

const COMPACTED_MARKER: &str = "__compacted__";

fn is_synthetic_summary(message: &ChatMessage) -> bool {
    matches!(message, ChatMessage::System { content } if content.starts_with(COMPACTED_MARKER))
}

/// Compacts `history` per `config`. Idempotent: a history that already
/// starts with a synthetic summary (sliding window) or fits within bounds is
/// returned unchanged.
pub async fn compact(
    history: &[ChatMessage],
    config: &CompactionConfig,
    summarizer: Option<&dyn ChatModel>,
) -> Result<Vec<ChatMessage>, CoreError> {
    match config.strategy {
        CompactionStrategy::SlidingWindow => Ok(sliding_window(history, config.window_size)),
        CompactionStrategy::Smart => smart(history, config, summarizer).await,
    }
}

fn sliding_window(history: &[ChatMessage], window_size: usize) -> Vec<ChatMessage> {
    if history.len() <= window_size {
        return history.to_vec();
    }
    history[history.len() - window_size..].to_vec()
}

async fn smart(
    history: &[ChatMessage],
    config: &CompactionConfig,
    summarizer: Option<&dyn ChatModel>,
) -> Result<Vec<ChatMessage>, CoreError> {
    if history.len() <= config.summarize_threshold {
        return Ok(history.to_vec());
    }
    if !history.is_empty() && is_synthetic_summary(&history[0]) {
        return Ok(history.to_vec());
    }

    let recent_count = config.recent_message_count.min(history.len());
    let split_at = history.len() - recent_count;
    let (overflow, recent) = history.split_at(split_at);

    let summary_text = match summarizer {
        Some(model) => {
            let mut prompt = vec![ChatMessage::system(
                "Summarize the following conversation history concisely, preserving facts and decisions.",
            )];
            prompt.extend(overflow.iter().cloned());
            let response = model.chat(&prompt, &ChatOptions::default()).await?;
            response.content
        }
        None => overflow
            .iter()
            .map(ChatMessage::content)
            .collect::<Vec<_>>()
            .join(" "),
    };

    let mut compacted = vec![ChatMessage::system(format!("{}{}", COMPACTED_MARKER, summary_text))];
    compacted.extend(recent.iter().cloned());
    Ok(compacted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockChatModel;

    fn messages(n: usize) -> Vec<ChatMessage> {
        (0..n).map(|i| ChatMessage::user(format!("turn {}", i))).collect()
    }

    #[tokio::test]
    async fn sliding_window_keeps_last_n_messages() {
        let config = CompactionConfig { strategy: CompactionStrategy::SlidingWindow, window_size: 3, ..Default::default() };
        let result = compact(&messages(10), &config, None).await.unwrap();
        assert_eq!(result.len(), 3);
        assert_eq!(result[0].content(), "turn 7");
        assert_eq!(result[2].content(), "turn 9");
    }

    #[tokio::test]
    async fn sliding_window_is_noop_under_budget() {
        let config = CompactionConfig { strategy: CompactionStrategy::SlidingWindow, window_size: 20, ..Default::default() };
        let result = compact(&messages(5), &config, None).await.unwrap();
        assert_eq!(result.len(), 5);
    }

    #[tokio::test]
    async fn smart_below_threshold_is_noop() {
        let config = CompactionConfig {
            strategy: CompactionStrategy::Smart,
            summarize_threshold: 30,
            recent_message_count: 10,
            ..Default::default()
        };
        let result = compact(&messages(5), &config, None).await.unwrap();
        assert_eq!(result.len(), 5);
    }

    #[tokio::test]
    async fn smart_above_threshold_summarizes_overflow_and_keeps_recent() {
        let config = CompactionConfig {
            strategy: CompactionStrategy::Smart,
            summarize_threshold: 10,
            recent_message_count: 4,
            ..Default::default()
        };
        let result = compact(&messages(20), &config, None).await.unwrap();
        assert_eq!(result.len(), 5);
        assert!(is_synthetic_summary(&result[0]));
        assert_eq!(result[4].content(), "turn 19");
    }

    #[tokio::test]
    async fn smart_uses_summarizer_model_when_given() {
        let config = CompactionConfig {
            strategy: CompactionStrategy::Smart,
            summarize_threshold: 10,
            recent_message_count: 4,
            ..Default::default()
        };
        let model = MockChatModel { content: "summary text".to_string(), tool_calls: vec![] };
        let result = compact(&messages(20), &config, Some(&model)).await.unwrap();
        assert!(result[0].content().contains("summary text"));
    }

    #[tokio::test]
    async fn smart_is_idempotent_on_already_compacted_history() {
        let config = CompactionConfig {
            strategy: CompactionStrategy::Smart,
            summarize_threshold: 10,
            recent_message_count: 4,
            ..Default::default()
        };
        let first = compact(&messages(20), &config, None).await.unwrap();
        let second = smart(&first, &config, None).await.unwrap();
        assert_eq!(second.len(), first.len());
        assert_eq!(second[0].content(), first[0].content());
    }
}
