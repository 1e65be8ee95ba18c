// Copyright 2026 The Projexa Project
// SPDX-License-Identifier: Apache-2.0

// Generation backend
//
// Responsibilities:
// - Open a streaming chat call against the model daemon
// - Expose the response as a lazy stream of text fragments
// - Availability probe for readiness checks
//
// The trait is the injection point: handlers hold an
// `Arc<dyn GenerationBackend>` and never touch a concrete HTTP client.

mod ollama;

pub use ollama::{decode_chat_stream, OllamaBackend};

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::prompt::ChatMessage;
use crate::request::GenerationOptions;

/// One streaming chat call.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Backend model identifier. Never echoed to callers.
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub options: GenerationOptions,
}

/// One unit of streamed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub text: String,
    /// Set on the last fragment the backend will send.
    pub done: bool,
}

impl Fragment {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            done: false,
        }
    }

    pub fn last(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            done: true,
        }
    }
}

pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<Fragment, GenerationError>> + Send>>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("backend connection failed: {0}")]
    Transport(String),

    #[error("backend timed out: {0}")]
    Timeout(String),

    #[error("backend returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// Error record sent in-band by the backend mid-stream.
    #[error("{0}")]
    Backend(String),

    #[error("malformed backend response: {0}")]
    Malformed(String),
}

impl GenerationError {
    pub(crate) fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GenerationError::Timeout(e.to_string())
        } else {
            GenerationError::Transport(e.to_string())
        }
    }
}

/// Abstraction over the streaming text-generation service.
///
/// Implementations must be Send + Sync so they can be shared across
/// request handlers via `Arc`. Implementations hold no per-request state.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Start a streaming chat call.
    ///
    /// Errors before the first fragment (connection refused, non-success
    /// status) are returned here; errors after that arrive as stream items.
    async fn chat_stream(&self, request: ChatRequest) -> Result<FragmentStream, GenerationError>;

    /// Check that the backend is reachable and answering.
    async fn probe(&self) -> Result<(), GenerationError>;
}
