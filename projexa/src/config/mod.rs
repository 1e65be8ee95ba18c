// Copyright 2026 The Projexa Project
// SPDX-License-Identifier: Apache-2.0

// Config loader and validator
//
// Loads an optional projexa.yaml, resolves `${VAR}` interpolation,
// applies environment overrides, validates limits and computes a
// fingerprint of the raw file for startup logging.

mod error;
mod interpolation;
mod loader;
mod raw;
mod source;
mod types;

pub use error::ConfigError;
pub use interpolation::resolve_variables;
pub use loader::{
    compute_hash, load_config, load_config_with_env, load_from_path, ENV_BACKEND_HOST,
    ENV_BACKEND_MODEL, ENV_BACKEND_TIMEOUT, ENV_CORS_ORIGINS, ENV_DISPLAY_NAME, ENV_MAX_BYTES,
    ENV_MAX_WORDS_OUT, ENV_STREAM_TIMEOUT,
};
pub use source::{ConfigSource, FileSource, StringSource};
pub use types::*;

#[cfg(test)]
mod tests;
