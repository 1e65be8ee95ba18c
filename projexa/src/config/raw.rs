// Raw YAML deserialization types (internal)
// Every field is optional here. Defaults, interpolation, environment
// overrides and validation happen in the loader on the way to `Config`.

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub display_name: Option<String>,
    pub app_version: Option<String>,
    #[serde(default)]
    pub backend: RawBackendConfig,
    #[serde(default)]
    pub limits: RawLimitsConfig,
    #[serde(default)]
    pub generation: RawGenerationConfig,
    #[serde(default)]
    pub cors: RawCorsConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawBackendConfig {
    pub model: Option<String>,
    pub host: Option<String>,
    pub timeout_secs: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawLimitsConfig {
    pub max_bytes: Option<usize>,
    pub max_words_out: Option<usize>,
    pub stream_timeout_secs: Option<f64>,
    pub max_body_bytes: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawGenerationConfig {
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub repeat_penalty: Option<f64>,
    pub num_predict: Option<i64>,
    pub num_predict_cap: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawCorsConfig {
    pub allowed_origins: Option<Vec<String>>,
}
