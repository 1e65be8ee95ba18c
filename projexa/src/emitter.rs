// Copyright 2026 The Projexa Project
// SPDX-License-Identifier: Apache-2.0

// Response emitter
//
// Responsibilities:
// - Branding line ahead of any generated text
// - Relay sanitized fragments as they arrive
// - Wall-clock stream timeout, checked on each fragment arrival
// - In-band error markers once the response has started
// - Stop pulling from the backend once the word budget is spent
//
// Everything after the first byte is reported in-band; the HTTP status
// has already been sent by then.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::sync::oneshot;

use crate::backend::{ChatRequest, FragmentStream, GenerationBackend, GenerationError};
use crate::config::Config;
use crate::sanitize::StreamCleaner;

pub const STREAM_ERROR_PREFIX: &str = "[STREAM ERROR]";

/// First line of every response body.
pub fn branding_line(display_name: &str) -> String {
    format!("MODEL: {display_name}\n\n")
}

/// Inline marker that terminates a failed stream.
pub fn error_marker(message: &str) -> String {
    format!("\n{STREAM_ERROR_PREFIX} {message}\n")
}

/// How a response stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The backend finished on its own.
    Completed,
    /// The word budget was spent; the backend was not read further.
    WordCap,
    Timeout,
    /// The backend failed before or during the stream.
    Error,
}

impl StreamOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            StreamOutcome::Completed => "completed",
            StreamOutcome::WordCap => "word_cap",
            StreamOutcome::Timeout => "timeout",
            StreamOutcome::Error => "error",
        }
    }

    /// The body ended with an inline error marker.
    pub fn is_failure(self) -> bool {
        matches!(self, StreamOutcome::Timeout | StreamOutcome::Error)
    }
}

/// Per-request knobs for [`emit`].
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub display_name: String,
    /// Scrubbed from any error text before it reaches the caller.
    pub backend_model: String,
    pub stream_timeout: Duration,
    pub max_words: usize,
    pub request_id: String,
}

impl StreamSettings {
    pub fn from_config(config: &Config, request_id: impl Into<String>) -> Self {
        Self {
            display_name: config.display_name.clone(),
            backend_model: config.backend.model.clone(),
            stream_timeout: config.limits.stream_timeout,
            max_words: config.limits.max_words_out,
            request_id: request_id.into(),
        }
    }

    fn public_message(&self, error: &GenerationError) -> String {
        scrub_model_id(&error.to_string(), &self.backend_model, &self.display_name)
    }
}

/// Replace the backend model identifier with the public display name.
///
/// Only whole-token occurrences are replaced: a match glued to a letter,
/// digit or `_` on either side is part of another word and stays.
pub fn scrub_model_id(message: &str, backend_model: &str, display_name: &str) -> String {
    if backend_model.is_empty() {
        return message.to_string();
    }

    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let mut out = String::with_capacity(message.len());
    let mut copied = 0;
    for (start, found) in message.match_indices(backend_model) {
        let end = start + found.len();
        let glued_before = message[..start].chars().next_back().is_some_and(is_word);
        let glued_after = message[end..].chars().next().is_some_and(is_word);
        if glued_before || glued_after {
            continue;
        }
        out.push_str(&message[copied..start]);
        out.push_str(display_name);
        copied = end;
    }
    out.push_str(&message[copied..]);
    out
}

// ---------------------------------------------------------------------------
// Stream state machine
// ---------------------------------------------------------------------------

enum Phase {
    Branding(ChatRequest),
    Connecting(ChatRequest),
    Streaming(FragmentStream),
    Finished,
}

struct EmitState {
    phase: Phase,
    settings: StreamSettings,
    backend: Arc<dyn GenerationBackend>,
    cleaner: StreamCleaner,
    started: Instant,
    fragments: usize,
    words: usize,
    outcome_tx: Option<oneshot::Sender<StreamOutcome>>,
}

impl EmitState {
    fn log_outcome(&mut self, outcome: StreamOutcome) {
        tracing::info!(
            request_id = %self.settings.request_id,
            fragments = self.fragments,
            words_emitted = self.words,
            elapsed_ms = self.started.elapsed().as_secs_f64() * 1000.0,
            outcome = outcome.as_str(),
            "stream finished"
        );
        if let Some(tx) = self.outcome_tx.take() {
            // The receiver may be gone; the stream does not care.
            let _ = tx.send(outcome);
        }
    }

    fn fail(&mut self, error: GenerationError) -> Bytes {
        tracing::warn!(
            request_id = %self.settings.request_id,
            error = %error,
            "generation failed"
        );
        self.log_outcome(StreamOutcome::Error);
        Bytes::from(error_marker(&self.settings.public_message(&error)))
    }

    fn text(&mut self, out: String) -> Bytes {
        self.words += out.split_whitespace().count();
        Bytes::from(out)
    }
}

/// Drive one generation call and yield the response body.
///
/// Pull-based: the only suspension points are the backend call and the
/// next upstream fragment. Dropping the returned stream drops the
/// upstream stream with it.
pub fn emit(
    settings: StreamSettings,
    backend: Arc<dyn GenerationBackend>,
    request: ChatRequest,
) -> impl Stream<Item = Bytes> + Send + 'static {
    emit_with_outcome(settings, backend, request).0
}

/// Like [`emit`], plus a receiver that resolves with the outcome once the
/// stream ends. It errors if the stream is dropped before finishing.
pub fn emit_with_outcome(
    settings: StreamSettings,
    backend: Arc<dyn GenerationBackend>,
    request: ChatRequest,
) -> (
    impl Stream<Item = Bytes> + Send + 'static,
    oneshot::Receiver<StreamOutcome>,
) {
    let (outcome_tx, outcome_rx) = oneshot::channel();
    let state = EmitState {
        phase: Phase::Branding(request),
        cleaner: StreamCleaner::new(settings.max_words),
        started: Instant::now(),
        settings,
        backend,
        fragments: 0,
        words: 0,
        outcome_tx: Some(outcome_tx),
    };

    let stream = futures_util::stream::unfold(state, |mut st| {
        async move {
            loop {
                match std::mem::replace(&mut st.phase, Phase::Finished) {
                    Phase::Branding(request) => {
                        st.phase = Phase::Connecting(request);
                        let line = branding_line(&st.settings.display_name);
                        return Some((Bytes::from(line), st));
                    }
                    Phase::Connecting(request) => {
                        let backend = Arc::clone(&st.backend);
                        match backend.chat_stream(request).await {
                            Ok(upstream) => st.phase = Phase::Streaming(upstream),
                            Err(e) => {
                                let marker = st.fail(e);
                                return Some((marker, st));
                            }
                        }
                    }
                    Phase::Streaming(mut upstream) => match upstream.next().await {
                        Some(_) if st.started.elapsed() > st.settings.stream_timeout => {
                            tracing::warn!(
                                request_id = %st.settings.request_id,
                                timeout_ms = st.settings.stream_timeout.as_millis() as u64,
                                "stream timed out"
                            );
                            st.log_outcome(StreamOutcome::Timeout);
                            return Some((Bytes::from(error_marker("timeout")), st));
                        }
                        Some(Ok(fragment)) => {
                            st.fragments += 1;
                            let mut out = st.cleaner.clean(&fragment.text);
                            let outcome = if st.cleaner.is_done() {
                                Some(StreamOutcome::WordCap)
                            } else if fragment.done {
                                Some(StreamOutcome::Completed)
                            } else {
                                None
                            };
                            match outcome {
                                Some(outcome) => {
                                    out.push_str(&st.cleaner.finish());
                                    let bytes = st.text(out);
                                    st.log_outcome(outcome);
                                    if !bytes.is_empty() {
                                        return Some((bytes, st));
                                    }
                                }
                                None => {
                                    st.phase = Phase::Streaming(upstream);
                                    if !out.is_empty() {
                                        return Some((st.text(out), st));
                                    }
                                }
                            }
                        }
                        Some(Err(e)) => {
                            let marker = st.fail(e);
                            return Some((marker, st));
                        }
                        None => {
                            let tail = st.cleaner.finish();
                            let bytes = st.text(tail);
                            st.log_outcome(StreamOutcome::Completed);
                            if !bytes.is_empty() {
                                return Some((bytes, st));
                            }
                        }
                    },
                    Phase::Finished => return None,
                }
            }
        }
    });
    (stream, outcome_rx)
}
