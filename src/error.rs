use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path that caused the error (e.g., "choices[0].message.content", "config.top_p")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "response_parser", "provider_config")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Unified error type for the bridge provider.
///
/// Every variant is surfaced to the caller as-is; the provider never retries
/// or substitutes a fallback answer.
#[derive(Debug, Error)]
pub enum Error {
    /// No bridge has been registered yet.
    #[error("Bridge not initialized: {message}")]
    NotInitialized { message: String },

    /// The bridge callable itself failed. `message` is the bridge's own text, unmodified.
    #[error("Bridge invocation failed: {message}")]
    BridgeInvocation {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The bridge answered with text that is not a usable completion.
    #[error("Malformed bridge response: {message}{}", format_context(.context))]
    MalformedResponse {
        message: String,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn not_initialized(msg: impl Into<String>) -> Self {
        Error::NotInitialized {
            message: msg.into(),
        }
    }

    /// Wrap a failure raised by the bridge, keeping its message verbatim.
    pub fn bridge_invocation(err: anyhow::Error) -> Self {
        Error::BridgeInvocation {
            message: err.to_string(),
            source: Some(err.into()),
        }
    }

    /// A failure the engine reported inside an otherwise successful reply.
    pub fn bridge_reported(msg: impl Into<String>) -> Self {
        Error::BridgeInvocation {
            message: msg.into(),
            source: None,
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedResponse {
            message: msg.into(),
            context: ErrorContext::new().with_source("response_parser"),
        }
    }

    pub fn malformed_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::MalformedResponse {
            message: msg.into(),
            context,
        }
    }

    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::MalformedResponse { context, .. } | Error::Configuration { context, .. } => {
                Some(context)
            }
            _ => None,
        }
    }

    /// Whether retrying can succeed once the caller has fixed the underlying condition
    /// (registering a bridge, picking a smaller model, ...).
    ///
    /// Malformed replies and bad configuration reproduce on retry, so they are not retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::NotInitialized { .. } | Error::BridgeInvocation { .. }
        )
    }

    /// The bridge's original diagnostic, when this error came from the bridge.
    pub fn bridge_message(&self) -> Option<&str> {
        match self {
            Error::BridgeInvocation { message, .. } => Some(message.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_invocation_keeps_message() {
        let err = Error::bridge_invocation(anyhow::anyhow!("GPU device lost: out of memory"));
        assert_eq!(err.bridge_message(), Some("GPU device lost: out of memory"));
        assert_eq!(
            err.to_string(),
            "Bridge invocation failed: GPU device lost: out of memory"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_context_formatting() {
        let err = Error::malformed_with_context(
            "missing content",
            ErrorContext::new()
                .with_field_path("choices[0].message.content")
                .with_source("response_parser"),
        );
        assert_eq!(
            err.to_string(),
            "Malformed bridge response: missing content (field: choices[0].message.content, source: response_parser)"
        );
    }

    #[test]
    fn test_retry_classification() {
        assert!(Error::not_initialized("x").is_retryable());
        assert!(Error::bridge_reported("oom").is_retryable());
        assert!(!Error::malformed("bad").is_retryable());
        assert!(!Error::configuration_with_context("bad", ErrorContext::new()).is_retryable());
    }
}
