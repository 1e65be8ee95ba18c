// Copyright 2026 The Projexa Project
// SPDX-License-Identifier: Apache-2.0

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sha2::{Digest, Sha256};

use super::error::ConfigError;
use super::interpolation::resolve_variables;
use super::raw;
use super::source::{ConfigSource, FileSource, StringSource};
use super::types::*;

pub const ENV_DISPLAY_NAME: &str = "PROJEXA_DISPLAY_NAME";
pub const ENV_BACKEND_MODEL: &str = "OLLAMA_BACKEND_MODEL";
pub const ENV_BACKEND_HOST: &str = "OLLAMA_HOST";
pub const ENV_BACKEND_TIMEOUT: &str = "PROJEXA_OLLAMA_TIMEOUT_S";
pub const ENV_MAX_BYTES: &str = "PROJEXA_MAX_BYTES";
pub const ENV_MAX_WORDS_OUT: &str = "PROJEXA_MAX_WORDS_OUT";
pub const ENV_STREAM_TIMEOUT: &str = "PROJEXA_STREAM_TIMEOUT_S";
pub const ENV_CORS_ORIGINS: &str = "PROJEXA_CORS_ORIGINS";

/// Load and validate config from the given source, reading overrides from
/// the process environment.
pub fn load_config(source: &dyn ConfigSource) -> Result<Config, ConfigError> {
    load_config_with_env(source, &|name| std::env::var(name).ok())
}

/// Load config from a YAML file, or from defaults plus environment when no
/// path is given.
pub fn load_from_path(path: Option<&Path>) -> Result<Config, ConfigError> {
    match path {
        Some(p) => load_config(&FileSource {
            path: p.to_path_buf(),
        }),
        None => load_config(&StringSource::empty()),
    }
}

/// Load and validate config with an injected environment lookup.
///
/// Steps:
/// 1. Read raw YAML text from source and hash it
/// 2. Parse YAML into raw deserialization types (empty document = all defaults)
/// 3. Resolve `${VAR}` interpolation in string fields
/// 4. Apply environment overrides (they win over the file)
/// 5. Fill defaults, validate, build typed `Config`
pub fn load_config_with_env(
    source: &dyn ConfigSource,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<Config, ConfigError> {
    let raw_yaml = source.load()?;
    let config_hash = compute_hash(&raw_yaml);

    let value: serde_yaml::Value = serde_yaml::from_str(&raw_yaml)?;
    let mut raw: raw::RawConfig = if value.is_null() {
        raw::RawConfig::default()
    } else {
        serde_yaml::from_value(value)?
    };

    resolve_string_fields(&mut raw, env)?;
    apply_env_overrides(&mut raw, env)?;
    build_config(raw, config_hash)
}

pub fn compute_hash(raw_yaml: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw_yaml.as_bytes());
    format!("sha256:{:x}", hasher.finalize())
}

// ---------------------------------------------------------------------------
// Interpolation and overrides
// ---------------------------------------------------------------------------

fn resolve_string_fields(
    raw: &mut raw::RawConfig,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    let fields = [
        &mut raw.display_name,
        &mut raw.app_version,
        &mut raw.backend.model,
        &mut raw.backend.host,
    ];
    for field in fields {
        if let Some(value) = field.as_mut() {
            *value = resolve_variables(value, env)?;
        }
    }
    if let Some(origins) = raw.cors.allowed_origins.as_mut() {
        for origin in origins.iter_mut() {
            *origin = resolve_variables(origin, env)?;
        }
    }
    Ok(())
}

fn apply_env_overrides(
    raw: &mut raw::RawConfig,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(v) = env(ENV_DISPLAY_NAME) {
        raw.display_name = Some(v);
    }
    if let Some(v) = env(ENV_BACKEND_MODEL) {
        raw.backend.model = Some(v);
    }
    if let Some(v) = env(ENV_BACKEND_HOST) {
        raw.backend.host = Some(v);
    }
    override_parsed(&mut raw.backend.timeout_secs, ENV_BACKEND_TIMEOUT, env)?;
    override_parsed(&mut raw.limits.max_bytes, ENV_MAX_BYTES, env)?;
    override_parsed(&mut raw.limits.max_words_out, ENV_MAX_WORDS_OUT, env)?;
    override_parsed(&mut raw.limits.stream_timeout_secs, ENV_STREAM_TIMEOUT, env)?;
    if let Some(v) = env(ENV_CORS_ORIGINS) {
        raw.cors.allowed_origins = Some(split_origins(&v));
    }
    Ok(())
}

fn override_parsed<T>(
    target: &mut Option<T>,
    name: &str,
    env: &dyn Fn(&str) -> Option<String>,
) -> Result<(), ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(value) = env(name) else {
        return Ok(());
    };
    let parsed = value
        .trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidOverride {
            name: name.to_string(),
            reason: format!("\"{value}\": {e}"),
        })?;
    *target = Some(parsed);
    Ok(())
}

fn split_origins(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(String::from)
        .collect()
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn build_config(raw: raw::RawConfig, config_hash: String) -> Result<Config, ConfigError> {
    let display_name = raw
        .display_name
        .unwrap_or_else(|| DEFAULT_DISPLAY_NAME.to_string());
    if display_name.trim().is_empty() {
        return Err(ConfigError::Validation(
            "\"display_name\" must not be empty".to_string(),
        ));
    }
    ensure_header_safe("display_name", &display_name)?;

    let app_version = raw
        .app_version
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());
    ensure_header_safe("app_version", &app_version)?;

    let backend = build_backend_config(raw.backend)?;
    let limits = build_limits_config(raw.limits)?;
    let generation = build_generation_defaults(raw.generation)?;

    let allowed_origins = raw
        .cors
        .allowed_origins
        .unwrap_or_else(|| CorsConfig::default().allowed_origins);
    if allowed_origins.is_empty() {
        return Err(ConfigError::Validation(
            "\"cors.allowed_origins\" must list at least one origin (use \"*\" for any)"
                .to_string(),
        ));
    }

    Ok(Config {
        display_name,
        app_version,
        backend,
        limits,
        generation,
        cors: CorsConfig { allowed_origins },
        config_hash,
    })
}

fn build_backend_config(raw: raw::RawBackendConfig) -> Result<BackendConfig, ConfigError> {
    let model = raw
        .model
        .unwrap_or_else(|| DEFAULT_BACKEND_MODEL.to_string());
    if model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "\"backend.model\" must not be empty".to_string(),
        ));
    }

    let host = raw
        .host
        .unwrap_or_else(|| DEFAULT_BACKEND_HOST.to_string());
    let url = reqwest::Url::parse(&host).map_err(|e| {
        ConfigError::Validation(format!("\"backend.host\" is not a valid URL \"{host}\": {e}"))
    })?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::Validation(format!(
            "\"backend.host\" must use http or https, got \"{}\"",
            url.scheme()
        )));
    }

    let timeout = positive_duration(
        "backend.timeout_secs",
        raw.timeout_secs.unwrap_or(DEFAULT_BACKEND_TIMEOUT_SECS),
    )?;

    Ok(BackendConfig {
        model,
        host: host.trim_end_matches('/').to_string(),
        timeout,
    })
}

fn build_limits_config(raw: raw::RawLimitsConfig) -> Result<LimitsConfig, ConfigError> {
    let max_bytes = positive("limits.max_bytes", raw.max_bytes.unwrap_or(DEFAULT_MAX_BYTES))?;
    let max_words_out = positive(
        "limits.max_words_out",
        raw.max_words_out.unwrap_or(DEFAULT_MAX_WORDS_OUT),
    )?;
    let max_body_bytes = match raw.max_body_bytes {
        Some(value) => {
            let value = positive("limits.max_body_bytes", value)?;
            if value < max_bytes {
                return Err(ConfigError::Validation(format!(
                    "\"limits.max_body_bytes\" ({value}) must be at least \"limits.max_bytes\" ({max_bytes})"
                )));
            }
            value
        }
        None => DEFAULT_MAX_BODY_BYTES.max(body_ceiling_for(max_bytes)),
    };
    let stream_timeout = positive_duration(
        "limits.stream_timeout_secs",
        raw.stream_timeout_secs.unwrap_or(DEFAULT_STREAM_TIMEOUT_SECS),
    )?;

    Ok(LimitsConfig {
        max_bytes,
        max_words_out,
        stream_timeout,
        max_body_bytes,
    })
}

/// Smallest request body that can carry a `max_bytes` payload once it is
/// JSON-escaped (`\u00XX` is six bytes per input byte) inside an envelope.
fn body_ceiling_for(max_bytes: usize) -> usize {
    max_bytes.saturating_mul(6).saturating_add(1024)
}

fn build_generation_defaults(
    raw: raw::RawGenerationConfig,
) -> Result<GenerationDefaults, ConfigError> {
    let defaults = GenerationDefaults::default();
    let num_predict_cap = raw.num_predict_cap.unwrap_or(defaults.num_predict_cap);
    if num_predict_cap <= 0 {
        return Err(ConfigError::Validation(
            "\"generation.num_predict_cap\" must be greater than 0".to_string(),
        ));
    }

    Ok(GenerationDefaults {
        temperature: raw.temperature.unwrap_or(defaults.temperature),
        top_p: raw.top_p.unwrap_or(defaults.top_p),
        repeat_penalty: raw.repeat_penalty.unwrap_or(defaults.repeat_penalty),
        num_predict: raw
            .num_predict
            .unwrap_or(defaults.num_predict)
            .clamp(1, num_predict_cap),
        num_predict_cap,
    })
}

fn positive(name: &str, value: usize) -> Result<usize, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Validation(format!(
            "\"{name}\" must be greater than 0"
        )));
    }
    Ok(value)
}

fn positive_duration(name: &str, secs: f64) -> Result<Duration, ConfigError> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "\"{name}\" must be a positive number of seconds, got {secs}"
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| ConfigError::Validation(format!("\"{name}\" is out of range: {e}")))
}

/// Values that end up in response headers must be visible ASCII.
fn ensure_header_safe(name: &str, value: &str) -> Result<(), ConfigError> {
    if value.bytes().all(|b| b == b' ' || b.is_ascii_graphic()) {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "\"{name}\" must be printable ASCII, got \"{value}\""
        )))
    }
}
