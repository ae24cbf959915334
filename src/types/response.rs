//! Completion response and the parser for bridge replies.
//!
//! The wire shape follows the widespread chat-completion convention
//! (`id`, `object`, `created`, `model`, `choices[0].message`, `choices[0].finish_reason`, `usage`),
//! so a bridge can forward its engine's reply without a provider-specific schema.

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::ErrorContext;
use crate::types::message::MessageRole;
use crate::{Error, Result};

/// Token accounting as reported by the engine. Passed through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Usage(pub Map<String, Value>);

impl Usage {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn prompt_tokens(&self) -> Option<u64> {
        self.0.get("prompt_tokens").and_then(Value::as_u64)
    }

    pub fn completion_tokens(&self) -> Option<u64> {
        self.0.get("completion_tokens").and_then(Value::as_u64)
    }

    pub fn total_tokens(&self) -> Option<u64> {
        self.0.get("total_tokens").and_then(Value::as_u64)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Object(map)) => Usage(map.clone()),
            _ => Usage::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    pub role: MessageRole,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: AssistantMessage,
    pub finish_reason: Option<String>,
}

/// Normalized completion result.
///
/// Serializes back to the same wire shape it was parsed from (single-element `choices`).
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub id: Option<String>,
    pub object: Option<String>,
    pub created: Option<u64>,
    pub model: Option<String>,
    pub choice: Choice,
    pub usage: Usage,
    /// The reply exactly as the bridge returned it.
    pub raw: Value,
}

impl CompletionResponse {
    /// Build a response from already-known parts (used when aggregating streamed chunks).
    pub fn from_parts(
        model: Option<String>,
        content: String,
        finish_reason: Option<String>,
        usage: Usage,
    ) -> Self {
        let choice = Choice {
            index: 0,
            message: AssistantMessage {
                role: MessageRole::Assistant,
                content,
            },
            finish_reason,
        };
        let mut response = Self {
            id: None,
            object: None,
            created: None,
            model,
            choice,
            usage,
            raw: Value::Null,
        };
        response.raw = response.to_value();
        response
    }

    pub fn content(&self) -> &str {
        &self.choice.message.content
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.choice.finish_reason.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// Parse the text returned by the bridge.
    ///
    /// The only requirement is a string at `choices[0].message.content`; everything else
    /// is carried over as-is. A top-level `error` field means the engine failed and is
    /// reported as [`Error::BridgeInvocation`].
    pub fn from_bridge_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| {
            warn!(error = %e, "bridge returned invalid JSON");
            Error::malformed_with_context(
                format!("reply is not valid JSON: {}", e),
                ErrorContext::new().with_source("response_parser"),
            )
        })?;
        Self::from_bridge_value(value)
    }

    pub fn from_bridge_value(value: Value) -> Result<Self> {
        let obj = value.as_object().ok_or_else(|| {
            Error::malformed_with_context(
                "reply is not a JSON object",
                ErrorContext::new().with_source("response_parser"),
            )
        })?;

        if let Some(err) = obj.get("error").filter(|v| !v.is_null()) {
            return Err(Error::bridge_reported(error_text(err)));
        }

        let first = obj
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .ok_or_else(|| {
                warn!("bridge reply has no choices");
                Error::malformed_with_context(
                    "reply contains no choices",
                    ErrorContext::new()
                        .with_field_path("choices")
                        .with_source("response_parser"),
                )
            })?;

        let content = first
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                warn!("bridge reply has no message content");
                Error::malformed_with_context(
                    "first choice has no message content",
                    ErrorContext::new()
                        .with_field_path("choices[0].message.content")
                        .with_source("response_parser"),
                )
            })?;

        let choice = Choice {
            index: first
                .get("index")
                .and_then(Value::as_u64)
                .and_then(|i| u32::try_from(i).ok())
                .unwrap_or(0),
            message: AssistantMessage {
                role: MessageRole::Assistant,
                content: content.to_string(),
            },
            finish_reason: first
                .get("finish_reason")
                .and_then(Value::as_str)
                .map(str::to_string),
        };

        Ok(Self {
            id: string_field(obj, "id"),
            object: string_field(obj, "object"),
            created: obj.get("created").and_then(Value::as_u64),
            model: string_field(obj, "model"),
            choice,
            usage: Usage::from_value(obj.get("usage")),
            raw: value,
        })
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(Value::as_str).map(str::to_string)
}

fn error_text(err: &Value) -> String {
    match err {
        Value::String(s) => s.clone(),
        Value::Object(o) => o
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string()),
        other => other.to_string(),
    }
}

#[derive(Serialize)]
struct WireResponse<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    object: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    created: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    choices: [&'a Choice; 1],
    usage: &'a Usage,
}

impl Serialize for CompletionResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        WireResponse {
            id: self.id.as_deref(),
            object: self.object.as_deref(),
            created: self.created,
            model: self.model.as_deref(),
            choices: [&self.choice],
            usage: &self.usage,
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const HELLO: &str = r#"{"model":"demo","choices":[{"index":0,"message":{"role":"assistant","content":"Hello!"},"finish_reason":"stop"}],"usage":{}}"#;

    #[test]
    fn test_parse_minimal_reply() {
        let resp = CompletionResponse::from_bridge_json(HELLO).unwrap();
        assert_eq!(resp.content(), "Hello!");
        assert_eq!(resp.finish_reason(), Some("stop"));
        assert_eq!(resp.model(), Some("demo"));
        assert!(resp.usage.is_empty());
    }

    #[test]
    fn test_reencode_is_structurally_equivalent() {
        let full = json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1700000000u64,
            "model": "demo",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Hello!"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 3, "completion_tokens": 2, "total_tokens": 5}
        });
        let resp = CompletionResponse::from_bridge_value(full.clone()).unwrap();
        assert_eq!(resp.to_value(), full);
        assert_eq!(resp.usage.total_tokens(), Some(5));
        assert_eq!(resp.raw, full);
    }

    #[test]
    fn test_usage_is_not_interpreted() {
        let reply = json!({
            "choices": [{"message": {"content": "ok"}}],
            "usage": {"prompt_tokens": "n/a", "vendor_field": [1, 2]}
        });
        let resp = CompletionResponse::from_bridge_value(reply).unwrap();
        assert_eq!(resp.usage.get("vendor_field"), Some(&json!([1, 2])));
        assert_eq!(resp.usage.prompt_tokens(), None);
        assert_eq!(resp.finish_reason(), None);
        assert_eq!(resp.model(), None);
    }

    #[test]
    fn test_missing_content_is_malformed() {
        for reply in [
            r#"{"choices":[]}"#,
            r#"{"choices":[{"message":{"role":"assistant"}}]}"#,
            r#"{"choices":[{"message":{"content":null}}]}"#,
            r#"{"usage":{}}"#,
            r#"["not", "an", "object"]"#,
            "Hello!",
        ] {
            let err = CompletionResponse::from_bridge_json(reply).unwrap_err();
            assert!(
                matches!(err, Error::MalformedResponse { .. }),
                "expected malformed for {reply}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_engine_error_field() {
        let err = CompletionResponse::from_bridge_json(r#"{"error":"Model not loaded"}"#)
            .unwrap_err();
        assert_eq!(err.bridge_message(), Some("Model not loaded"));

        let err = CompletionResponse::from_bridge_json(
            r#"{"error":{"message":"Device lost","code":"gpu"}}"#,
        )
        .unwrap_err();
        assert_eq!(err.bridge_message(), Some("Device lost"));
    }

    #[test]
    fn test_from_parts() {
        let resp = CompletionResponse::from_parts(
            Some("demo".into()),
            "Hi there".into(),
            Some("length".into()),
            Usage::default(),
        );
        assert_eq!(resp.raw["choices"][0]["message"]["content"], json!("Hi there"));
        assert_eq!(resp.raw["choices"][0]["finish_reason"], json!("length"));
    }
}
