// Copyright 2026 The Projexa Project
// SPDX-License-Identifier: Apache-2.0

use super::*;
use std::collections::HashMap;
use std::time::Duration;

fn source(yaml: &str) -> StringSource {
    StringSource {
        content: yaml.to_string(),
    }
}

fn no_env(_: &str) -> Option<String> {
    None
}

fn load(yaml: &str) -> Result<Config, ConfigError> {
    load_config_with_env(&source(yaml), &no_env)
}

fn load_with(yaml: &str, vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    load_config_with_env(&source(yaml), &move |name| vars.get(name).cloned())
}

const FULL_YAML: &str = r#"
display_name: acme-summaries
app_version: "2.0.0"
backend:
  model: qwen2.5-coder:7b
  host: http://gpu-box:11434/
  timeout_secs: 15
limits:
  max_bytes: 1024
  max_words_out: 50
  stream_timeout_secs: 30.5
  max_body_bytes: 4096
generation:
  temperature: 0.1
  top_p: 0.8
  repeat_penalty: 1.2
  num_predict: 256
  num_predict_cap: 300
cors:
  allowed_origins:
    - https://lms.example.com
"#;

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

#[test]
fn empty_source_yields_defaults() {
    let config = load("").unwrap();
    assert_eq!(config.display_name, "projexa");
    assert_eq!(config.app_version, env!("CARGO_PKG_VERSION"));
    assert_eq!(config.backend.model, "llama3.2:3b");
    assert_eq!(config.backend.host, "http://127.0.0.1:11434");
    assert_eq!(config.backend.timeout, Duration::from_secs(60));
    assert_eq!(config.limits.max_bytes, 512 * 1024);
    assert_eq!(config.limits.max_words_out, 500);
    assert_eq!(config.limits.stream_timeout, Duration::from_secs(120));
    assert_eq!(config.generation, GenerationDefaults::default());
    assert!(config.cors.allows_any_origin());
}

#[test]
fn comment_only_file_yields_defaults() {
    let config = load("# nothing configured yet\n").unwrap();
    assert_eq!(config.limits.max_words_out, DEFAULT_MAX_WORDS_OUT);
}

#[test]
fn loaded_defaults_match_default_impl() {
    let loaded = load("").unwrap();
    let built = Config::default();
    assert_eq!(loaded.backend, built.backend);
    assert_eq!(loaded.limits, built.limits);
    assert_eq!(loaded.generation, built.generation);
    assert_eq!(loaded.cors, built.cors);
}

// ---------------------------------------------------------------------------
// File values
// ---------------------------------------------------------------------------

#[test]
fn full_file_is_applied() {
    let config = load(FULL_YAML).unwrap();
    assert_eq!(config.display_name, "acme-summaries");
    assert_eq!(config.app_version, "2.0.0");
    assert_eq!(config.backend.model, "qwen2.5-coder:7b");
    assert_eq!(config.backend.host, "http://gpu-box:11434");
    assert_eq!(config.backend.timeout, Duration::from_secs(15));
    assert_eq!(config.limits.max_bytes, 1024);
    assert_eq!(config.limits.max_words_out, 50);
    assert_eq!(config.limits.stream_timeout, Duration::from_millis(30_500));
    assert_eq!(config.limits.max_body_bytes, 4096);
    assert_eq!(config.generation.temperature, 0.1);
    assert_eq!(config.generation.num_predict, 256);
    assert_eq!(config.generation.num_predict_cap, 300);
    assert_eq!(config.cors.allowed_origins, vec!["https://lms.example.com"]);
    assert!(!config.cors.allows_any_origin());
}

#[test]
fn default_num_predict_is_clamped_to_cap() {
    let config = load("generation:\n  num_predict: 4096\n  num_predict_cap: 1000\n").unwrap();
    assert_eq!(config.generation.num_predict, 1000);
}

#[test]
fn unknown_key_is_rejected() {
    let err = load("display_nme: typo\n").unwrap_err();
    assert!(matches!(err, ConfigError::YamlError(_)), "got {err:?}");
}

#[test]
fn malformed_yaml_is_rejected() {
    let err = load("limits: [unclosed\n").unwrap_err();
    assert!(matches!(err, ConfigError::YamlError(_)));
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

#[test]
fn env_overrides_win_over_file() {
    let config = load_with(
        FULL_YAML,
        &[
            (ENV_DISPLAY_NAME, "brand-x"),
            (ENV_BACKEND_MODEL, "mistral:7b"),
            (ENV_BACKEND_HOST, "https://ollama.internal"),
            (ENV_BACKEND_TIMEOUT, "5"),
            (ENV_MAX_BYTES, "2048"),
            (ENV_MAX_WORDS_OUT, "10"),
            (ENV_STREAM_TIMEOUT, "2.5"),
            (ENV_CORS_ORIGINS, "https://a.example, https://b.example,"),
        ],
    )
    .unwrap();

    assert_eq!(config.display_name, "brand-x");
    assert_eq!(config.backend.model, "mistral:7b");
    assert_eq!(config.backend.host, "https://ollama.internal");
    assert_eq!(config.backend.timeout, Duration::from_secs(5));
    assert_eq!(config.limits.max_bytes, 2048);
    assert_eq!(config.limits.max_words_out, 10);
    assert_eq!(config.limits.stream_timeout, Duration::from_millis(2500));
    assert_eq!(
        config.cors.allowed_origins,
        vec!["https://a.example", "https://b.example"]
    );
    // Untouched keys keep their file values.
    assert_eq!(config.limits.max_body_bytes, 4096);
}

#[test]
fn unparsable_override_names_the_variable() {
    let err = load_with("", &[(ENV_MAX_BYTES, "lots")]).unwrap_err();
    match err {
        ConfigError::InvalidOverride { name, .. } => assert_eq!(name, ENV_MAX_BYTES),
        other => panic!("expected InvalidOverride, got {other:?}"),
    }
}

#[test]
fn interpolates_variables_in_strings() {
    let config = load_with(
        "backend:\n  host: \"http://${OLLAMA_HOSTNAME}:11434\"\n",
        &[("OLLAMA_HOSTNAME", "inference-1")],
    )
    .unwrap();
    assert_eq!(config.backend.host, "http://inference-1:11434");
}

#[test]
fn undefined_interpolation_variable_is_an_error() {
    let err = load("display_name: \"${MISSING_BRAND}\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::UndefinedVariable { ref name } if name == "MISSING_BRAND"));
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

#[test]
fn zero_limits_are_rejected() {
    for yaml in [
        "limits:\n  max_bytes: 0\n",
        "limits:\n  max_words_out: 0\n",
        "limits:\n  max_body_bytes: 0\n",
        "limits:\n  stream_timeout_secs: 0\n",
        "backend:\n  timeout_secs: -1\n",
        "generation:\n  num_predict_cap: 0\n",
    ] {
        let err = load(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)), "{yaml}: {err:?}");
    }
}

#[test]
fn raised_max_bytes_raises_default_body_ceiling() {
    let config = load_with("", &[(ENV_MAX_BYTES, "16777216")]).unwrap();
    assert_eq!(config.limits.max_bytes, 16 * 1024 * 1024);
    assert!(config.limits.max_body_bytes >= 6 * 16 * 1024 * 1024);

    let small = load_with("", &[(ENV_MAX_BYTES, "1024")]).unwrap();
    assert_eq!(small.limits.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
}

#[test]
fn explicit_body_ceiling_below_max_bytes_is_rejected() {
    let err = load("limits:\n  max_bytes: 8192\n  max_body_bytes: 4096\n").unwrap_err();
    match err {
        ConfigError::Validation(msg) => {
            assert!(msg.contains("max_body_bytes") && msg.contains("8192"), "{msg}")
        }
        other => panic!("expected Validation, got {other:?}"),
    }
}

#[test]
fn default_num_predict_is_at_least_one() {
    let config = load("generation:\n  num_predict: -1\n").unwrap();
    assert_eq!(config.generation.num_predict, 1);
}

#[test]
fn empty_display_name_is_rejected() {
    let err = load_with("", &[(ENV_DISPLAY_NAME, "  ")]).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn non_ascii_display_name_is_rejected() {
    let err = load("display_name: \"proj\u{e9}xa\"\n").unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}

#[test]
fn backend_host_must_be_http_url() {
    assert!(matches!(
        load("backend:\n  host: not a url\n").unwrap_err(),
        ConfigError::Validation(_)
    ));
    assert!(matches!(
        load("backend:\n  host: ftp://models.example\n").unwrap_err(),
        ConfigError::Validation(_)
    ));
}

#[test]
fn empty_origin_list_is_rejected() {
    let err = load("cors:\n  allowed_origins: []\n").unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)));
}

// ---------------------------------------------------------------------------
// Fingerprint
// ---------------------------------------------------------------------------

#[test]
fn config_hash_is_deterministic_and_content_sensitive() {
    let a = load(FULL_YAML).unwrap().config_hash;
    let b = load(FULL_YAML).unwrap().config_hash;
    let c = load("display_name: other\n").unwrap().config_hash;
    assert!(a.starts_with("sha256:"));
    assert_eq!(a, b);
    assert_ne!(a, c);
}

#[test]
fn file_source_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("projexa.yaml");
    std::fs::write(&path, "limits:\n  max_words_out: 42\n").unwrap();

    let config = load_config_with_env(&FileSource { path }, &no_env).unwrap();
    assert_eq!(config.limits.max_words_out, 42);
}

#[test]
fn missing_file_is_an_io_error() {
    let source = FileSource {
        path: "/nonexistent/projexa.yaml".into(),
    };
    let err = load_config_with_env(&source, &no_env).unwrap_err();
    assert!(matches!(err, ConfigError::IoError(_)));
}
