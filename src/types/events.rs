//! Streaming chunk types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ErrorContext;
use crate::{Error, Result};

/// One incremental piece of streamed completion output, as seen by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamChunk {
    Delta { content: String },
}

impl StreamChunk {
    pub fn delta(content: impl Into<String>) -> Self {
        StreamChunk::Delta {
            content: content.into(),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            StreamChunk::Delta { content } => content,
        }
    }
}

/// Frames a streaming bridge emits, one JSON object per item.
///
/// `done` and `error` are terminal; the provider consumes them and only forwards deltas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum UpstreamFrame {
    Delta {
        content: String,
    },
    Done {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finish_reason: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<Map<String, Value>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
    },
    Error {
        error: Value,
    },
}

impl UpstreamFrame {
    pub fn parse(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| {
            Error::malformed_with_context(
                format!("stream frame is not a recognized chunk: {}", e),
                ErrorContext::new().with_source("stream_parser"),
            )
        })
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_chunk_wire_shape() {
        assert_eq!(
            serde_json::to_value(StreamChunk::delta("Hel")).unwrap(),
            json!({"type": "delta", "content": "Hel"})
        );
    }

    #[test]
    fn test_parse_frames() {
        assert_eq!(
            UpstreamFrame::parse(r#"{"type":"delta","content":"lo"}"#).unwrap(),
            UpstreamFrame::Delta {
                content: "lo".into()
            }
        );
        match UpstreamFrame::parse(r#"{"type":"done","finish_reason":"stop"}"#).unwrap() {
            UpstreamFrame::Done {
                finish_reason,
                usage,
                model,
            } => {
                assert_eq!(finish_reason.as_deref(), Some("stop"));
                assert!(usage.is_none());
                assert!(model.is_none());
            }
            other => panic!("unexpected frame {other:?}"),
        }
        assert!(matches!(
            UpstreamFrame::parse(r#"{"type":"progress","value":0.5}"#),
            Err(Error::MalformedResponse { .. })
        ));
    }
}
