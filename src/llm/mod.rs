//! Remote generative-language API integration.
//!
//! [`ChatBackend`] is the seam between the relay and the remote service: it takes a
//! complete turn history and returns the reply as a stream of text chunks.
//! [`GeminiClient`] implements it over the Gemini `streamGenerateContent` endpoint.
//! [`Conversation`] owns the history of one multi-turn exchange and commits each
//! turn once its reply has streamed through.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

pub mod conversation;
pub mod error;
pub mod gemini;
mod sse;

pub use conversation::{Conversation, EventStream, StreamEvent};
pub use error::{LlmError, LlmResult};
pub use gemini::{GeminiClient, GeminiSettings};

/// Who produced a turn. Serialized with the remote API's role names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One message in a conversation history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
        }
    }
}

/// Reply text chunks in arrival order. An `Err` item ends the reply.
pub type TokenStream = Pin<Box<dyn Stream<Item = LlmResult<String>> + Send>>;

/// A remote chat model that can stream a reply to a turn history.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Starts generating the reply to `history`, whose last turn is the user's
    /// new message.
    ///
    /// Errors raised before any text is produced (rejected key, bad status)
    /// are returned directly; later failures arrive as `Err` stream items.
    async fn stream_generate(&self, history: &[Turn]) -> LlmResult<TokenStream>;

    /// Model identifier, for logging.
    fn model(&self) -> &str;
}
