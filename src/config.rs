//! 提供者配置：默认模型与采样参数。
//!
//! Provider configuration.
//!
//! Supplied once when the provider is constructed and used only to fill request
//! defaults. Sources, lowest precedence first:
//! 1) built-in defaults
//! 2) the host's config mapping (JSON value) or a YAML document
//! 3) `WEBLLM_*` environment variables (see [`ProviderConfig::with_env_overrides`])

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorContext;
use crate::{Error, Result};

pub const DEFAULT_MODEL: &str = "Phi-3.5-mini-instruct-q4f16_1-MLC";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_TOP_P: f64 = 0.95;

pub const ENV_DEFAULT_MODEL: &str = "WEBLLM_DEFAULT_MODEL";
pub const ENV_TEMPERATURE: &str = "WEBLLM_TEMPERATURE";
pub const ENV_MAX_TOKENS: &str = "WEBLLM_MAX_TOKENS";
pub const ENV_TOP_P: &str = "WEBLLM_TOP_P";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Engine model id, e.g. an MLC build name.
    pub default_model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            default_model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            top_p: DEFAULT_TOP_P,
        }
    }
}

impl ProviderConfig {
    /// Build from the host's config mapping. Unknown keys are ignored, missing keys keep defaults.
    pub fn from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            return Ok(Self::default());
        }
        serde_json::from_value(value).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid provider config: {}", e),
                ErrorContext::new().with_source("provider_config"),
            )
        })
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid provider config YAML: {}", e),
                ErrorContext::new().with_source("provider_config"),
            )
        })
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Apply `WEBLLM_DEFAULT_MODEL`, `WEBLLM_TEMPERATURE`, `WEBLLM_MAX_TOKENS`, `WEBLLM_TOP_P`.
    ///
    /// Values that do not parse are ignored.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    pub(crate) fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_DEFAULT_MODEL) {
            let v = v.trim().to_string();
            if !v.is_empty() {
                self.default_model = v;
            }
        }
        if let Some(t) = lookup(ENV_TEMPERATURE).and_then(|s| s.trim().parse::<f64>().ok()) {
            self.temperature = t;
        }
        if let Some(n) = lookup(ENV_MAX_TOKENS).and_then(|s| s.trim().parse::<u32>().ok()) {
            self.max_tokens = n;
        }
        if let Some(p) = lookup(ENV_TOP_P).and_then(|s| s.trim().parse::<f64>().ok()) {
            self.top_p = p;
        }
        self
    }

    pub fn with_default_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    pub fn with_temperature(mut self, t: f64) -> Self {
        self.temperature = t;
        self
    }

    pub fn with_max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = n;
        self
    }

    pub fn with_top_p(mut self, p: f64) -> Self {
        self.top_p = p;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_model.trim().is_empty() {
            return Err(invalid("default_model", "must not be empty"));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(invalid(
                "temperature",
                format!("must be within [0, 2], got {}", self.temperature),
            ));
        }
        if self.max_tokens == 0 {
            return Err(invalid("max_tokens", "must be greater than 0"));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(invalid(
                "top_p",
                format!("must be within (0, 1], got {}", self.top_p),
            ));
        }
        Ok(())
    }
}

fn invalid(field: &str, details: impl Into<String>) -> Error {
    Error::configuration_with_context(
        format!("invalid value for {}", field),
        ErrorContext::new()
            .with_field_path(format!("config.{}", field))
            .with_details(details)
            .with_source("provider_config"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_from_value_partial() {
        let cfg = ProviderConfig::from_value(json!({
            "default_model": "Llama-3.2-1B-Instruct-q4f16_1-MLC",
            "max_tokens": 512,
            "unrelated": true
        }))
        .unwrap();
        assert_eq!(cfg.default_model, "Llama-3.2-1B-Instruct-q4f16_1-MLC");
        assert_eq!(cfg.max_tokens, 512);
        assert_eq!(cfg.temperature, DEFAULT_TEMPERATURE);
        assert_eq!(cfg.top_p, DEFAULT_TOP_P);
    }

    #[test]
    fn test_from_value_wrong_type() {
        let err = ProviderConfig::from_value(json!({"max_tokens": "lots"})).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_from_yaml() {
        let cfg = ProviderConfig::from_yaml_str("temperature: 0.2\ntop_p: 0.9\n").unwrap();
        assert_eq!(cfg.temperature, 0.2);
        assert_eq!(cfg.top_p, 0.9);
        assert_eq!(cfg.default_model, DEFAULT_MODEL);
        assert_eq!(ProviderConfig::from_yaml_str("").unwrap(), ProviderConfig::default());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            (ENV_DEFAULT_MODEL, "gemma-2-2b-it-q4f16_1-MLC"),
            (ENV_TEMPERATURE, "0.3"),
            (ENV_MAX_TOKENS, "not-a-number"),
        ]
        .into_iter()
        .collect();
        let cfg = ProviderConfig::default()
            .with_overrides(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.default_model, "gemma-2-2b-it-q4f16_1-MLC");
        assert_eq!(cfg.temperature, 0.3);
        assert_eq!(cfg.max_tokens, DEFAULT_MAX_TOKENS);
    }

    #[test]
    fn test_validate() {
        assert!(ProviderConfig::default().validate().is_ok());
        let err = ProviderConfig::default().with_top_p(0.0).validate().unwrap_err();
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("config.top_p")
        );
        assert!(ProviderConfig::default().with_max_tokens(0).validate().is_err());
        assert!(ProviderConfig::default().with_temperature(3.5).validate().is_err());
        assert!(ProviderConfig::default().with_default_model(" ").validate().is_err());
    }
}
