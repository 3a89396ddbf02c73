//! Answer generation from retrieved context
//!
//! The Answerer assembles a token-budgeted prompt from retrieved chunks (or
//! a document's full chunk set in summarization mode) and makes exactly one
//! language model call per request. Rate limits and budget violations are
//! surfaced as typed errors; nothing is retried indefinitely or silently
//! truncated past the documented policy. Answers are never cached.

mod client;
mod prompt;

pub use client::{ChatProvider, ChatRequest, GroqClient, LlmError};
pub use prompt::{
    build_answer_prompt, build_summary_prompt, estimate_tokens, BuiltPrompt, ContextEntry,
    CHARS_PER_TOKEN,
};

use crate::config::LlmConfig;
use crate::error::DocqaError;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnswerError {
    /// The prompt cannot be made to fit the upstream token budget
    #[error("prompt needs {needed} tokens but the budget is {budget}")]
    TokenBudgetExceeded { needed: usize, budget: usize },

    #[error(transparent)]
    Llm(#[from] LlmError),
}

impl From<AnswerError> for DocqaError {
    fn from(err: AnswerError) -> Self {
        match err {
            AnswerError::TokenBudgetExceeded { needed, budget } => {
                DocqaError::TokenBudgetExceeded { needed, budget }
            }
            AnswerError::Llm(LlmError::RateLimited { retry_after_secs }) => {
                DocqaError::RateLimited { retry_after_secs }
            }
            AnswerError::Llm(LlmError::Api { status, message }) => {
                DocqaError::LlmApi { status, message }
            }
            AnswerError::Llm(LlmError::Http(e)) => DocqaError::Http(e),
        }
    }
}

/// Builds prompts and invokes the chat model
pub struct Answerer {
    chat: Arc<dyn ChatProvider>,
    config: LlmConfig,
}

impl Answerer {
    pub fn new(chat: Arc<dyn ChatProvider>, config: LlmConfig) -> Self {
        Self { chat, config }
    }

    /// Answer a question from ranked context entries
    pub async fn answer(
        &self,
        question: &str,
        entries: &[ContextEntry],
    ) -> Result<String, AnswerError> {
        let budget = self.prompt_budget(self.config.answer_tokens);
        let prompt = build_answer_prompt(question, entries, budget)?;

        if prompt.truncated {
            tracing::debug!(
                entries_used = prompt.entries_used,
                "context truncated to fit token budget"
            );
        }

        self.chat
            .complete(&ChatRequest {
                prompt: prompt.text,
                max_tokens: self.config.answer_tokens,
                temperature: self.config.temperature,
            })
            .await
            .map_err(AnswerError::from)
    }

    /// Summarize a document from its full chunk set, in document order
    pub async fn summarize(&self, entries: &[ContextEntry]) -> Result<String, AnswerError> {
        let budget = self.prompt_budget(self.config.summary_tokens);
        let prompt = build_summary_prompt(entries, budget)?;

        if prompt.truncated {
            tracing::debug!(
                entries_used = prompt.entries_used,
                "document tail truncated to fit token budget"
            );
        }

        self.chat
            .complete(&ChatRequest {
                prompt: prompt.text,
                max_tokens: self.config.summary_tokens,
                temperature: self.config.temperature,
            })
            .await
            .map_err(AnswerError::from)
    }

    /// Prompt budget: the per-request token budget minus the completion
    /// reserve
    fn prompt_budget(&self, completion_tokens: usize) -> usize {
        self.config
            .max_tokens_per_request
            .saturating_sub(completion_tokens)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Chat stub that records prompts and returns a canned reply
    struct EchoChat {
        prompts: Mutex<Vec<ChatRequest>>,
        reply: Result<String, fn() -> LlmError>,
    }

    impl EchoChat {
        fn replying(reply: &str) -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                reply: Ok(reply.to_string()),
            }
        }

        fn rate_limited() -> Self {
            Self {
                prompts: Mutex::new(Vec::new()),
                reply: Err(|| LlmError::RateLimited {
                    retry_after_secs: Some(7),
                }),
            }
        }
    }

    #[async_trait]
    impl ChatProvider for EchoChat {
        async fn complete(&self, request: &ChatRequest) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(request.clone());
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err(make) => Err(make()),
            }
        }
    }

    fn entries() -> Vec<ContextEntry> {
        vec![ContextEntry {
            document: "paper.pdf".to_string(),
            page: 1,
            text: "The model uses multi-head attention.".to_string(),
        }]
    }

    #[tokio::test]
    async fn answer_sends_one_call_with_context() {
        let chat = Arc::new(EchoChat::replying("It uses attention."));
        let answerer = Answerer::new(chat.clone(), crate::config::Config::default().llm);

        let answer = answerer
            .answer("What does the model use?", &entries())
            .await
            .unwrap();

        assert_eq!(answer, "It uses attention.");

        let prompts = chat.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].prompt.contains("multi-head attention"));
        assert!(prompts[0].prompt.contains("What does the model use?"));
        assert_eq!(prompts[0].max_tokens, 500);
    }

    #[tokio::test]
    async fn summarize_uses_summary_reserve() {
        let chat = Arc::new(EchoChat::replying("A paper about attention."));
        let answerer = Answerer::new(chat.clone(), crate::config::Config::default().llm);

        let summary = answerer.summarize(&entries()).await.unwrap();
        assert_eq!(summary, "A paper about attention.");

        let prompts = chat.prompts.lock().unwrap();
        assert_eq!(prompts[0].max_tokens, 800);
        assert!(prompts[0].prompt.contains("Summary:"));
    }

    #[tokio::test]
    async fn rate_limit_is_surfaced() {
        let chat = Arc::new(EchoChat::rate_limited());
        let answerer = Answerer::new(chat, crate::config::Config::default().llm);

        let err = answerer.answer("q?", &entries()).await.unwrap_err();
        assert!(matches!(
            err,
            AnswerError::Llm(LlmError::RateLimited {
                retry_after_secs: Some(7)
            })
        ));
    }

    #[tokio::test]
    async fn oversized_context_fails_before_any_call() {
        let chat = Arc::new(EchoChat::replying("never reached"));
        let mut config = crate::config::Config::default().llm;
        config.max_tokens_per_request = 520;
        config.answer_tokens = 500;
        let answerer = Answerer::new(chat.clone(), config);

        let big = vec![ContextEntry {
            document: "big.pdf".to_string(),
            page: 1,
            text: "words ".repeat(5000),
        }];

        let err = answerer
            .answer(&"a long question ".repeat(20), &big)
            .await
            .unwrap_err();
        assert!(matches!(err, AnswerError::TokenBudgetExceeded { .. }));
        assert!(chat.prompts.lock().unwrap().is_empty());
    }
}
