// Copyright 2026 The Projexa Project
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

pub const DEFAULT_DISPLAY_NAME: &str = "projexa";
pub const DEFAULT_BACKEND_MODEL: &str = "llama3.2:3b";
pub const DEFAULT_BACKEND_HOST: &str = "http://127.0.0.1:11434";
pub const DEFAULT_BACKEND_TIMEOUT_SECS: f64 = 60.0;
pub const DEFAULT_MAX_BYTES: usize = 512 * 1024;
pub const DEFAULT_MAX_WORDS_OUT: usize = 500;
pub const DEFAULT_STREAM_TIMEOUT_SECS: f64 = 120.0;
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_NUM_PREDICT_CAP: i64 = 1024;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Parsed and validated service config. Immutable once loaded; shared
/// across request handlers behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Public-facing brand, sent in the branding line and `X-Model`.
    pub display_name: String,
    /// Version string sent in `X-App-Version`.
    pub app_version: String,
    pub backend: BackendConfig,
    pub limits: LimitsConfig,
    pub generation: GenerationDefaults,
    pub cors: CorsConfig,
    /// SHA256 of the raw config text: "sha256:{hex}".
    pub config_hash: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            backend: BackendConfig::default(),
            limits: LimitsConfig::default(),
            generation: GenerationDefaults::default(),
            cors: CorsConfig::default(),
            config_hash: String::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Where the generation daemon lives and which model it runs.
///
/// `model` is private: it is sent to the backend and may be logged, but
/// never leaves the service in a response.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendConfig {
    pub model: String,
    pub host: String,
    /// Bounds connecting, the first response and each individual read.
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_BACKEND_MODEL.to_string(),
            host: DEFAULT_BACKEND_HOST.to_string(),
            timeout: Duration::from_secs_f64(DEFAULT_BACKEND_TIMEOUT_SECS),
        }
    }
}

/// Hard safety limits applied to every request.
#[derive(Debug, Clone, PartialEq)]
pub struct LimitsConfig {
    /// Ceiling on the UTF-8 size of the `data` payload.
    pub max_bytes: usize,
    /// Word budget for the sanitized output stream.
    pub max_words_out: usize,
    /// Wall-clock ceiling for one response stream.
    pub stream_timeout: Duration,
    /// Ceiling on the raw request body read from the socket.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            max_words_out: DEFAULT_MAX_WORDS_OUT,
            stream_timeout: Duration::from_secs_f64(DEFAULT_STREAM_TIMEOUT_SECS),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

/// Generation parameters filled in when a caller leaves them out.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationDefaults {
    pub temperature: f64,
    pub top_p: f64,
    pub repeat_penalty: f64,
    pub num_predict: i64,
    /// Upper bound applied to caller-supplied `num_predict`.
    pub num_predict_cap: i64,
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            top_p: 0.9,
            repeat_penalty: 1.05,
            num_predict: 512,
            num_predict_cap: DEFAULT_NUM_PREDICT_CAP,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CorsConfig {
    /// Allowed origins; a `*` entry allows any origin.
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["*".to_string()],
        }
    }
}
