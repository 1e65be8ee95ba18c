// Copyright 2026 The Projexa Project
// SPDX-License-Identifier: Apache-2.0

// Request validation
//
// Responsibilities:
// - Coerce the `data` payload to text
// - Enforce the payload byte ceiling before any backend call
// - Default and clamp generation options from the configured defaults

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::{GenerationDefaults, LimitsConfig};

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Body of `POST /analyze`.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    /// The file to summarize. Any JSON value; non-strings are serialized.
    pub data: Value,
    /// Caller-supplied generation parameters.
    #[serde(default)]
    pub options: Option<Map<String, Value>>,
}

/// Generation parameters sent to the backend.
///
/// The four named parameters are always present after validation; any
/// other keys the caller supplied are passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationOptions {
    pub temperature: f64,
    pub top_p: f64,
    pub repeat_penalty: f64,
    pub num_predict: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GenerationOptions {
    /// Fill absent parameters from `defaults` and clamp `num_predict` into
    /// `1..=num_predict_cap`.
    ///
    /// Explicit `null` counts as absent.
    pub fn resolve(
        options: Option<Map<String, Value>>,
        defaults: &GenerationDefaults,
    ) -> Result<Self, RequestError> {
        let mut extra = options.unwrap_or_default();

        let temperature = take_float(&mut extra, "temperature")?.unwrap_or(defaults.temperature);
        let top_p = take_float(&mut extra, "top_p")?.unwrap_or(defaults.top_p);
        let repeat_penalty =
            take_float(&mut extra, "repeat_penalty")?.unwrap_or(defaults.repeat_penalty);
        let num_predict = take_int(&mut extra, "num_predict")?
            .unwrap_or(defaults.num_predict)
            .clamp(1, defaults.num_predict_cap.max(1));

        Ok(Self {
            temperature,
            top_p,
            repeat_penalty,
            num_predict,
            extra,
        })
    }
}

impl From<&GenerationDefaults> for GenerationOptions {
    fn from(defaults: &GenerationDefaults) -> Self {
        Self {
            temperature: defaults.temperature,
            top_p: defaults.top_p,
            repeat_penalty: defaults.repeat_penalty,
            num_predict: defaults.num_predict.clamp(1, defaults.num_predict_cap.max(1)),
            extra: Map::new(),
        }
    }
}

/// A request that passed validation and is ready for prompt assembly.
#[derive(Debug, Clone)]
pub struct ValidatedRequest {
    pub text: String,
    /// UTF-8 size of `text`.
    pub byte_size: usize,
    pub options: GenerationOptions,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RequestError {
    #[error("payload too large: {size} bytes > limit {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("invalid option \"{name}\": {reason}")]
    InvalidOption { name: String, reason: String },
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Coerce an arbitrary payload to text. Strings are used verbatim;
/// anything else becomes its compact JSON form.
pub fn stringify_payload(data: &Value) -> String {
    match data {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Reject `text` if its UTF-8 size exceeds `limit`. Returns the size.
pub fn check_payload_size(text: &str, limit: usize) -> Result<usize, RequestError> {
    let size = text.len();
    if size > limit {
        return Err(RequestError::PayloadTooLarge { size, limit });
    }
    Ok(size)
}

/// Validate an incoming request against the configured limits.
///
/// Options are checked first, then the payload size. Nothing here talks
/// to the backend.
pub fn validate(
    request: AnalyzeRequest,
    limits: &LimitsConfig,
    defaults: &GenerationDefaults,
) -> Result<ValidatedRequest, RequestError> {
    let options = GenerationOptions::resolve(request.options, defaults)?;
    let text = stringify_payload(&request.data);
    let byte_size = check_payload_size(&text, limits.max_bytes)?;

    Ok(ValidatedRequest {
        text,
        byte_size,
        options,
    })
}

fn take_float(options: &mut Map<String, Value>, name: &str) -> Result<Option<f64>, RequestError> {
    match options.remove(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| invalid(name, "not representable as a float")),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| invalid(name, &format!("expected a number, got \"{s}\""))),
        Some(other) => Err(invalid(name, &format!("expected a number, got {other}"))),
    }
}

/// Integers, floats (truncated toward zero) and numeric strings.
fn take_int(options: &mut Map<String, Value>, name: &str) -> Result<Option<i64>, RequestError> {
    match options.remove(name) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                return Ok(Some(i));
            }
            match n.as_f64() {
                Some(f) if f.is_finite() && f.abs() < i64::MAX as f64 => Ok(Some(f.trunc() as i64)),
                _ => Err(invalid(name, &format!("integer out of range: {n}"))),
            }
        }
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(|_| invalid(name, &format!("expected an integer, got \"{s}\""))),
        Some(other) => Err(invalid(name, &format!("expected an integer, got {other}"))),
    }
}

fn invalid(name: &str, reason: &str) -> RequestError {
    RequestError::InvalidOption {
        name: name.to_string(),
        reason: reason.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn limits(max_bytes: usize) -> LimitsConfig {
        LimitsConfig {
            max_bytes,
            ..LimitsConfig::default()
        }
    }

    fn request(body: Value) -> AnalyzeRequest {
        serde_json::from_value(body).unwrap()
    }

    fn options(v: Value) -> Option<Map<String, Value>> {
        match v {
            Value::Object(m) => Some(m),
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Payload coercion and size
    // -----------------------------------------------------------------------

    #[test]
    fn string_payload_is_used_verbatim() {
        assert_eq!(stringify_payload(&json!("fn main() {}")), "fn main() {}");
    }

    #[test]
    fn non_string_payload_is_serialized() {
        assert_eq!(stringify_payload(&json!({"a": [1, 2]})), r#"{"a":[1,2]}"#);
        assert_eq!(stringify_payload(&json!(42)), "42");
        assert_eq!(stringify_payload(&Value::Null), "null");
    }

    #[test]
    fn size_is_measured_in_utf8_bytes() {
        // 4 chars, 8 bytes
        assert_eq!(check_payload_size("éééé", 8), Ok(8));
        assert_eq!(
            check_payload_size("éééé", 7),
            Err(RequestError::PayloadTooLarge { size: 8, limit: 7 })
        );
    }

    #[test]
    fn payload_at_limit_is_accepted() {
        let text = "x".repeat(1024);
        assert_eq!(check_payload_size(&text, 1024), Ok(1024));
    }

    #[test]
    fn oversized_payload_reports_both_sizes() {
        let big = "a".repeat(600 * 1024);
        let err = validate(
            request(json!({ "data": big })),
            &limits(512 * 1024),
            &GenerationDefaults::default(),
        )
        .unwrap_err();

        assert_eq!(
            err,
            RequestError::PayloadTooLarge {
                size: 614_400,
                limit: 524_288
            }
        );
        let msg = err.to_string();
        assert!(msg.contains("614400") && msg.contains("524288"), "{msg}");
    }

    #[test]
    fn serialized_form_counts_toward_the_limit() {
        // {"k":"vvvv"} is 12 bytes once serialized.
        let err = validate(
            request(json!({ "data": {"k": "vvvv"} })),
            &limits(11),
            &GenerationDefaults::default(),
        )
        .unwrap_err();
        assert_eq!(err, RequestError::PayloadTooLarge { size: 12, limit: 11 });
    }

    // -----------------------------------------------------------------------
    // Options
    // -----------------------------------------------------------------------

    #[test]
    fn missing_options_take_defaults() {
        let resolved = GenerationOptions::resolve(None, &GenerationDefaults::default()).unwrap();
        assert_eq!(resolved, GenerationOptions::from(&GenerationDefaults::default()));
        assert_eq!(resolved.temperature, 0.2);
        assert_eq!(resolved.top_p, 0.9);
        assert_eq!(resolved.repeat_penalty, 1.05);
        assert_eq!(resolved.num_predict, 512);
    }

    #[test]
    fn caller_values_are_kept() {
        let resolved = GenerationOptions::resolve(
            options(json!({"temperature": 0.7, "top_p": 0.5, "num_predict": 100})),
            &GenerationDefaults::default(),
        )
        .unwrap();
        assert_eq!(resolved.temperature, 0.7);
        assert_eq!(resolved.top_p, 0.5);
        assert_eq!(resolved.repeat_penalty, 1.05);
        assert_eq!(resolved.num_predict, 100);
    }

    #[test]
    fn num_predict_is_clamped_to_cap() {
        let resolved = GenerationOptions::resolve(
            options(json!({"num_predict": 99999})),
            &GenerationDefaults::default(),
        )
        .unwrap();
        assert_eq!(resolved.num_predict, 1024);
    }

    #[test]
    fn non_positive_num_predict_is_raised_to_one() {
        let defaults = GenerationDefaults::default();
        for value in [json!(-1), json!(0), json!("-5")] {
            let resolved =
                GenerationOptions::resolve(options(json!({ "num_predict": value })), &defaults)
                    .unwrap();
            assert_eq!(resolved.num_predict, 1);
        }
    }

    #[test]
    fn num_predict_accepts_floats_and_numeric_strings() {
        let defaults = GenerationDefaults::default();
        let from_float =
            GenerationOptions::resolve(options(json!({"num_predict": 300.9})), &defaults).unwrap();
        assert_eq!(from_float.num_predict, 300);
        let from_str =
            GenerationOptions::resolve(options(json!({"num_predict": " 64 "})), &defaults).unwrap();
        assert_eq!(from_str.num_predict, 64);
    }

    #[test]
    fn null_option_counts_as_absent() {
        let resolved = GenerationOptions::resolve(
            options(json!({"temperature": null})),
            &GenerationDefaults::default(),
        )
        .unwrap();
        assert_eq!(resolved.temperature, 0.2);
    }

    #[test]
    fn non_numeric_option_is_rejected() {
        let err = GenerationOptions::resolve(
            options(json!({"num_predict": "lots"})),
            &GenerationDefaults::default(),
        )
        .unwrap_err();
        assert!(matches!(err, RequestError::InvalidOption { ref name, .. } if name == "num_predict"));

        let err = GenerationOptions::resolve(
            options(json!({"temperature": [1]})),
            &GenerationDefaults::default(),
        )
        .unwrap_err();
        assert!(matches!(err, RequestError::InvalidOption { ref name, .. } if name == "temperature"));
    }

    #[test]
    fn unknown_options_pass_through() {
        let resolved = GenerationOptions::resolve(
            options(json!({"seed": 7, "stop": ["\n\n"]})),
            &GenerationDefaults::default(),
        )
        .unwrap();
        let wire = serde_json::to_value(&resolved).unwrap();
        assert_eq!(wire["seed"], 7);
        assert_eq!(wire["stop"], json!(["\n\n"]));
        assert_eq!(wire["num_predict"], 512);
    }

    #[test]
    fn invalid_options_win_over_size_check() {
        let err = validate(
            request(json!({"data": "x".repeat(64), "options": {"top_p": "high"}})),
            &limits(8),
            &GenerationDefaults::default(),
        )
        .unwrap_err();
        assert!(matches!(err, RequestError::InvalidOption { .. }));
    }

    #[test]
    fn valid_request_passes() {
        let validated = validate(
            request(json!({"data": "print('hi')", "options": null})),
            &limits(1024),
            &GenerationDefaults::default(),
        )
        .unwrap();
        assert_eq!(validated.text, "print('hi')");
        assert_eq!(validated.byte_size, 11);
        assert_eq!(validated.options.num_predict, 512);
    }

    #[test]
    fn missing_data_field_fails_to_deserialize() {
        let parsed = serde_json::from_value::<AnalyzeRequest>(json!({"options": {}}));
        assert!(parsed.is_err());
    }
}
