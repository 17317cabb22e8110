//! Model client contract
//!
//! The harness depends only on a `generate`-shaped contract; the real
//! OpenAI-compatible client and the scripted test double both live behind
//! the same trait so runs can be substituted with fakes in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Result, TracegenError};

pub mod openai;

pub use openai::OpenAiClient;

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A message in a conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    /// Create a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }
}

/// Model identification for trace attribution
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub provider: String,
    pub model_name: String,
}

/// Chat-completion client contract.
///
/// Implementations are expected to be safe for concurrent use and to
/// self-report their own spans to the observability backend; the harness
/// only consumes the generated text.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Generate a completion for the given conversation
    async fn generate(&self, messages: &[Message]) -> Result<String>;

    /// Identify the underlying model
    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "unknown".to_string(),
            model_name: "unknown".to_string(),
        }
    }
}

/// Scripted model for deterministic runs and tests.
///
/// Replies are returned in order; the last reply repeats once the script is
/// exhausted. The call counter supports fail-fast assertions (an unknown
/// injection must fail before any model call is made).
pub struct ScriptedModel {
    replies: Vec<ScriptedReply>,
    calls: Arc<AtomicUsize>,
}

enum ScriptedReply {
    Text(String),
    Error(String),
}

impl ScriptedModel {
    /// Always reply with the same text
    pub fn fixed(reply: impl Into<String>) -> Self {
        Self {
            replies: vec![ScriptedReply::Text(reply.into())],
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Reply with the given texts in order
    pub fn script(replies: impl IntoIterator<Item = String>) -> Self {
        Self {
            replies: replies.into_iter().map(ScriptedReply::Text).collect(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Fail every call with the given message
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            replies: vec![ScriptedReply::Error(message.into())],
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of `generate` calls made so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Shared handle to the call counter
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn generate(&self, _messages: &[Message]) -> Result<String> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        let idx = call.min(self.replies.len().saturating_sub(1));

        match self.replies.get(idx) {
            Some(ScriptedReply::Text(text)) => Ok(text.clone()),
            Some(ScriptedReply::Error(message)) => Err(TracegenError::Model(message.clone())),
            None => Err(TracegenError::Model("scripted model has no replies".to_string())),
        }
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            provider: "scripted".to_string(),
            model_name: "scripted".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fixed_reply_and_counter() {
        let model = ScriptedModel::fixed("hello");

        let out = model.generate(&[Message::user("hi")]).await.unwrap();
        assert_eq!(out, "hello");
        assert_eq!(model.call_count(), 1);

        model.generate(&[]).await.unwrap();
        assert_eq!(model.call_count(), 2);
    }

    #[tokio::test]
    async fn test_script_order_and_repeat() {
        let model = ScriptedModel::script(vec!["one".to_string(), "two".to_string()]);

        assert_eq!(model.generate(&[]).await.unwrap(), "one");
        assert_eq!(model.generate(&[]).await.unwrap(), "two");
        // Last reply repeats once exhausted
        assert_eq!(model.generate(&[]).await.unwrap(), "two");
    }

    #[tokio::test]
    async fn test_failing_model() {
        let model = ScriptedModel::failing("connection refused");
        let err = model.generate(&[]).await.unwrap_err();
        assert!(matches!(err, TracegenError::Model(_)));
        assert_eq!(model.call_count(), 1);
    }
}
