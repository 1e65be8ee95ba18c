// Copyright 2026 The Projexa Project
// SPDX-License-Identifier: Apache-2.0

// Ollama chat client
//
// POST {host}/api/chat with `stream: true` answers with newline-delimited
// JSON. Records can be split across network chunks (and a multi-byte
// character across two chunks), so bytes are buffered until a full line
// is available. GET {host}/api/tags serves as the readiness probe.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use super::{ChatRequest, Fragment, FragmentStream, GenerationBackend, GenerationError};
use crate::config::BackendConfig;
use crate::prompt::ChatMessage;
use crate::request::GenerationOptions;

const CHAT_PATH: &str = "/api/chat";
const TAGS_PATH: &str = "/api/tags";
const MAX_ERROR_BODY_CHARS: usize = 512;

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct WireChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    options: &'a GenerationOptions,
}

#[derive(Debug, Deserialize)]
struct WireChatChunk {
    #[serde(default)]
    message: Option<WireMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireMessage {
    #[serde(default)]
    content: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// [`GenerationBackend`] backed by an Ollama daemon over HTTP.
///
/// `timeout` applies per operation: connecting, waiting for the response
/// head, and each read of the body. A slow but steady stream is never cut
/// off here; the emitter owns the whole-stream deadline.
pub struct OllamaBackend {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl OllamaBackend {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, timeout: Duration) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client,
            base_url,
            timeout,
        }
    }

    pub fn from_config(config: &BackendConfig) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.timeout)
            .build()
            .map_err(GenerationError::from_reqwest)?;
        Ok(Self::new(client, config.host.clone(), config.timeout))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    async fn chat_stream(&self, request: ChatRequest) -> Result<FragmentStream, GenerationError> {
        let body = WireChatRequest {
            model: &request.model,
            messages: &request.messages,
            stream: true,
            options: &request.options,
        };
        let send = self.client.post(self.url(CHAT_PATH)).json(&body).send();

        let response = tokio::time::timeout(self.timeout, send)
            .await
            .map_err(|_| {
                GenerationError::Timeout(format!(
                    "no response within {}s",
                    self.timeout.as_secs_f64()
                ))
            })?
            .map_err(GenerationError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = tokio::time::timeout(self.timeout, response.text())
                .await
                .ok()
                .and_then(Result::ok)
                .unwrap_or_default();
            return Err(GenerationError::Status {
                status: status.as_u16(),
                message: error_message(&body, status),
            });
        }

        Ok(decode_chat_stream(response.bytes_stream(), self.timeout))
    }

    async fn probe(&self) -> Result<(), GenerationError> {
        let response = self
            .client
            .get(self.url(TAGS_PATH))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(GenerationError::from_reqwest)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(GenerationError::Status {
            status: status.as_u16(),
            message: error_message(&body, status),
        })
    }
}

/// Pull the `error` field out of an Ollama error body, falling back to the
/// (truncated) raw body or the status reason.
fn error_message(body: &str, status: StatusCode) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }

    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.error;
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return status.canonical_reason().unwrap_or("no detail").to_string();
    }
    trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

// ---------------------------------------------------------------------------
// NDJSON decoding
// ---------------------------------------------------------------------------

/// Turn a raw response body into a stream of fragments.
///
/// The stream ends after the record with `done: true`, at end of body, or
/// after the first error. Each read waits at most `read_timeout`.
pub fn decode_chat_stream<S, E>(input: S, read_timeout: Duration) -> FragmentStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + 'static,
{
    let input = input.map(|item| item.map_err(|e| GenerationError::Transport(e.to_string())));
    let state = DecodeState {
        input: Box::pin(input),
        buffer: Vec::new(),
        finished: false,
        read_timeout,
    };

    Box::pin(futures_util::stream::unfold(state, |mut state| async move {
        let item = state.next_fragment().await?;
        Some((item, state))
    }))
}

struct DecodeState {
    input: Pin<Box<dyn Stream<Item = Result<Bytes, GenerationError>> + Send>>,
    /// Bytes received but not yet terminated by a newline.
    buffer: Vec<u8>,
    finished: bool,
    read_timeout: Duration,
}

impl DecodeState {
    async fn next_fragment(&mut self) -> Option<Result<Fragment, GenerationError>> {
        loop {
            if self.finished {
                return None;
            }

            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = self.buffer.drain(..=pos).collect();
                match parse_line(&line) {
                    Ok(None) => continue,
                    Ok(Some(fragment)) => {
                        self.finished = fragment.done;
                        return Some(Ok(fragment));
                    }
                    Err(e) => {
                        self.finished = true;
                        return Some(Err(e));
                    }
                }
            }

            match tokio::time::timeout(self.read_timeout, self.input.next()).await {
                Err(_) => {
                    self.finished = true;
                    return Some(Err(GenerationError::Timeout(format!(
                        "no data within {}s",
                        self.read_timeout.as_secs_f64()
                    ))));
                }
                Ok(Some(Ok(chunk))) => self.buffer.extend_from_slice(&chunk),
                Ok(Some(Err(e))) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                Ok(None) => {
                    // End of body: a final record may lack its newline.
                    self.finished = true;
                    let rest = std::mem::take(&mut self.buffer);
                    return parse_line(&rest).transpose();
                }
            }
        }
    }
}

fn parse_line(line: &[u8]) -> Result<Option<Fragment>, GenerationError> {
    let line = line.trim_ascii();
    if line.is_empty() {
        return Ok(None);
    }

    let chunk: WireChatChunk = serde_json::from_slice(line)
        .map_err(|e| GenerationError::Malformed(format!("invalid chat record: {e}")))?;

    if let Some(error) = chunk.error {
        return Err(GenerationError::Backend(error));
    }

    Ok(Some(Fragment {
        text: chunk.message.map(|m| m.content).unwrap_or_default(),
        done: chunk.done,
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
