//! Completion request and the JSON payload handed to the bridge.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::ProviderConfig;
use crate::types::message::Message;
use crate::Result;

/// Keys owned by the payload itself; pass-through parameters never override them.
pub const RESERVED_KEYS: &[&str] = &["messages", "model", "temperature", "max_tokens", "top_p"];

/// Caller-facing completion request.
///
/// Sampling parameters left as `None` are filled from the provider configuration
/// when the request is resolved into a [`BridgeRequest`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    /// Engine-specific parameters forwarded verbatim (e.g. `seed`, `stop`).
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub extra: Map<String, Value>,
}

impl CompletionRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, t: f64) -> Self {
        self.temperature = Some(t);
        self
    }

    pub fn max_tokens(mut self, n: u32) -> Self {
        self.max_tokens = Some(n);
        self
    }

    pub fn top_p(mut self, p: f64) -> Self {
        self.top_p = Some(p);
        self
    }

    /// Attach an extra parameter for the engine. Reserved keys are ignored at resolve time.
    pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Fill every omitted field from `config` and produce the wire payload.
    pub fn resolve(&self, config: &ProviderConfig) -> BridgeRequest {
        let extra = self
            .extra
            .iter()
            .filter(|(k, _)| !RESERVED_KEYS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        BridgeRequest {
            messages: self.messages.clone(),
            model: self
                .model
                .clone()
                .unwrap_or_else(|| config.default_model.clone()),
            temperature: self.temperature.unwrap_or(config.temperature),
            max_tokens: self.max_tokens.unwrap_or(config.max_tokens),
            top_p: self.top_p.unwrap_or(config.top_p),
            extra,
        }
    }
}

/// Fully-resolved request as serialized for the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeRequest {
    pub messages: Vec<Message>,
    pub model: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub top_p: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BridgeRequest {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_applies_defaults() {
        let req = CompletionRequest::new(vec![Message::user("Hi")]);
        let wire = req.resolve(&ProviderConfig::default());
        assert_eq!(wire.temperature, 0.7);
        assert_eq!(wire.max_tokens, 1024);
        assert_eq!(wire.top_p, 0.95);
        assert_eq!(wire.model, "Phi-3.5-mini-instruct-q4f16_1-MLC");
    }

    #[test]
    fn test_resolve_keeps_explicit_values() {
        let req = CompletionRequest::new(vec![Message::user("Hi")])
            .temperature(0.0)
            .max_tokens(16)
            .top_p(0.5)
            .model("Llama-3.2-1B-Instruct-q4f16_1-MLC");
        let wire = req.resolve(&ProviderConfig::default());
        assert_eq!(wire.temperature, 0.0);
        assert_eq!(wire.max_tokens, 16);
        assert_eq!(wire.top_p, 0.5);
        assert_eq!(wire.model, "Llama-3.2-1B-Instruct-q4f16_1-MLC");
    }

    #[test]
    fn test_extra_cannot_override_named_fields() {
        let req = CompletionRequest::new(vec![Message::user("Hi")])
            .extra("temperature", json!(1.9))
            .extra("seed", json!(42));
        let text = req.resolve(&ProviderConfig::default()).to_json().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["temperature"], json!(0.7));
        assert_eq!(value["seed"], json!(42));
    }

    #[test]
    fn test_payload_shape() {
        let req = CompletionRequest::new(vec![Message::system("Be brief"), Message::user("Hi")]);
        let text = req.resolve(&ProviderConfig::default()).to_json().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            value["messages"],
            json!([
                {"role": "system", "content": "Be brief"},
                {"role": "user", "content": "Hi"}
            ])
        );
        assert_eq!(BridgeRequest::from_json(&text).unwrap().messages.len(), 2);
    }
}
