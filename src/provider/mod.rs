//! 提供者模块：通过桥接调用浏览器内推理引擎的补全适配器。
//!
//! # Provider Module
//!
//! [`WebLlmProvider`] is the completion adapter. One call goes through these states:
//!
//! ```text
//! idle ──lookup bridge──▶ awaiting-bridge-reply ──parse──▶ completed
//!   │                            │
//!   └──NotInitialized            └──BridgeInvocation / MalformedResponse ──▶ failed
//! ```
//!
//! There is exactly one suspension point per call (awaiting the bridge). The provider does
//! not queue, throttle, retry or cancel; those policies belong to the host.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use webllm_provider::bridge::{BridgeRegistry, FnBridge};
//! use webllm_provider::provider::WebLlmProvider;
//! use webllm_provider::types::{CompletionRequest, Message};
//!
//! # async fn run() -> webllm_provider::Result<()> {
//! let registry = Arc::new(BridgeRegistry::new());
//! registry.set_bridge(FnBridge::new(|_request: String| async move {
//!     Ok(r#"{"choices":[{"message":{"role":"assistant","content":"Hello!"},"finish_reason":"stop"}]}"#.to_string())
//! }));
//!
//! let provider = WebLlmProvider::builder().registry(registry).build()?;
//! let reply = provider
//!     .complete(&CompletionRequest::new(vec![Message::user("Hi")]))
//!     .await?;
//! assert_eq!(reply.content(), "Hello!");
//! # Ok(())
//! # }
//! ```

pub mod stream;

pub use stream::CompletionStream;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::bridge::{global_registry, BridgeHandle, BridgeRegistry};
use crate::config::ProviderConfig;
use crate::types::{CompletionRequest, CompletionResponse};
use crate::{Error, Result};

/// Completion provider as seen by the host session.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    /// Default model id used when a request does not name one.
    fn model(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse>;

    async fn stream(&self, request: &CompletionRequest) -> Result<CompletionStream>;
}

/// Provider that runs inference in the browser engine reached through the bridge.
pub struct WebLlmProvider {
    config: ProviderConfig,
    registry: Arc<BridgeRegistry>,
}

impl WebLlmProvider {
    pub const NAME: &'static str = "webllm";

    /// Provider bound to the process-wide bridge registry.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        Self::with_registry(config, global_registry())
    }

    pub fn with_registry(config: ProviderConfig, registry: Arc<BridgeRegistry>) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, registry })
    }

    pub fn builder() -> WebLlmProviderBuilder {
        WebLlmProviderBuilder::new()
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<BridgeRegistry> {
        &self.registry
    }

    /// Readiness probe. Fails with the same guidance a completion call would.
    pub fn check_bridge(&self) -> Result<()> {
        self.registry.get_bridge().map(|_| ())
    }

    pub async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        let handle = self.registry.get_bridge()?;
        self.complete_with(&handle, request, Uuid::new_v4()).await
    }

    /// Stream a completion.
    ///
    /// With a streaming-capable bridge, chunks are forwarded as the engine produces them.
    /// Otherwise this performs one regular completion and yields its content as a single chunk.
    pub async fn stream(&self, request: &CompletionRequest) -> Result<CompletionStream> {
        let handle = self.registry.get_bridge()?;
        let request_id = Uuid::new_v4();

        if !handle.capabilities().streaming {
            debug!(%request_id, "bridge is batch-only, streaming falls back to one completion");
            let response = self.complete_with(&handle, request, request_id).await?;
            return Ok(CompletionStream::from_response(response, request_id));
        }

        let payload = request.resolve(&self.config).to_json()?;
        debug!(
            %request_id,
            generation = handle.generation(),
            messages = request.messages.len(),
            bytes = payload.len(),
            "opening bridge stream"
        );
        let frames = handle.bridge().stream(payload).await.map_err(|e| {
            warn!(%request_id, error = %e, "bridge stream failed to start");
            Error::bridge_invocation(e)
        })?;
        Ok(CompletionStream::from_frames(frames, request_id))
    }

    async fn complete_with(
        &self,
        handle: &BridgeHandle,
        request: &CompletionRequest,
        request_id: Uuid,
    ) -> Result<CompletionResponse> {
        let payload = request.resolve(&self.config).to_json()?;
        debug!(
            %request_id,
            generation = handle.generation(),
            messages = request.messages.len(),
            bytes = payload.len(),
            "invoking bridge"
        );

        let reply = handle.bridge().complete(payload).await.map_err(|e| {
            warn!(%request_id, error = %e, "bridge invocation failed");
            Error::bridge_invocation(e)
        })?;

        let response = CompletionResponse::from_bridge_json(&reply)?;
        debug!(
            %request_id,
            finish_reason = ?response.finish_reason(),
            chars = response.content().len(),
            "bridge replied"
        );
        Ok(response)
    }
}

#[async_trait]
impl Provider for WebLlmProvider {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn model(&self) -> &str {
        &self.config.default_model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse> {
        WebLlmProvider::complete(self, request).await
    }

    async fn stream(&self, request: &CompletionRequest) -> Result<CompletionStream> {
        WebLlmProvider::stream(self, request).await
    }
}

/// Builder for [`WebLlmProvider`].
pub struct WebLlmProviderBuilder {
    config: ProviderConfig,
    registry: Option<Arc<BridgeRegistry>>,
    env_overrides: bool,
}

impl WebLlmProviderBuilder {
    pub fn new() -> Self {
        Self {
            config: ProviderConfig::default(),
            registry: None,
            env_overrides: false,
        }
    }

    pub fn config(mut self, config: ProviderConfig) -> Self {
        self.config = config;
        self
    }

    /// Inject a bridge registry. Defaults to the process-wide one.
    pub fn registry(mut self, registry: Arc<BridgeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Apply `WEBLLM_*` environment overrides on top of the config at build time.
    pub fn env_overrides(mut self, enable: bool) -> Self {
        self.env_overrides = enable;
        self
    }

    pub fn build(self) -> Result<WebLlmProvider> {
        let config = if self.env_overrides {
            self.config.with_env_overrides()
        } else {
            self.config
        };
        let registry = self.registry.unwrap_or_else(global_registry);
        WebLlmProvider::with_registry(config, registry)
    }
}

impl Default for WebLlmProviderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::FnBridge;
    use crate::types::Message;

    #[test]
    fn test_builder_rejects_invalid_config() {
        let err = WebLlmProvider::builder()
            .registry(Arc::new(BridgeRegistry::new()))
            .config(ProviderConfig::default().with_max_tokens(0))
            .build()
            .err()
            .unwrap();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[tokio::test]
    async fn test_trait_object_dispatch() {
        let registry = Arc::new(BridgeRegistry::new());
        registry.set_bridge(FnBridge::new(|_req: String| async move {
            Ok(r#"{"choices":[{"message":{"content":"via trait"}}]}"#.to_string())
        }));
        let provider: Arc<dyn Provider> =
            Arc::new(WebLlmProvider::builder().registry(registry).build().unwrap());

        assert_eq!(provider.name(), "webllm");
        assert_eq!(provider.model(), crate::config::DEFAULT_MODEL);
        let reply = provider
            .complete(&CompletionRequest::new(vec![Message::user("Hi")]))
            .await
            .unwrap();
        assert_eq!(reply.content(), "via trait");
    }

    #[test]
    fn test_check_bridge() {
        let registry = Arc::new(BridgeRegistry::new());
        let provider = WebLlmProvider::builder()
            .registry(registry.clone())
            .build()
            .unwrap();
        assert!(matches!(
            provider.check_bridge(),
            Err(Error::NotInitialized { .. })
        ));
        registry.set_bridge(FnBridge::new(|_req: String| async move { Ok(String::new()) }));
        assert!(provider.check_bridge().is_ok());
    }
}
