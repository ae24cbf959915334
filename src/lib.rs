//! # webllm-provider
//!
//! 浏览器内 LLM 引擎的补全提供者：通过注册的桥接函数调用外部推理引擎。
//!
//! Chat-completion provider for an agent session that reaches an in-browser LLM engine
//! (WebLLM over WebGPU, or anything with the same shape) through a single registered
//! callable, the *bridge*.
//!
//! ## Overview
//!
//! The provider is a JSON-in/JSON-out adapter:
//!
//! ```text
//! caller → WebLlmProvider → BridgeRegistry (lookup) → Bridge (opaque) → WebLlmProvider (parse) → caller
//! ```
//!
//! - **Bridge-Driven**: inference, model loading and GPU negotiation all live behind the bridge
//! - **Injectable**: the registry is an explicit dependency, with a process-wide default
//! - **Streaming as a capability**: streaming bridges are used when present, otherwise one batch call
//! - **Typed failures**: [`Error::NotInitialized`], [`Error::BridgeInvocation`], [`Error::MalformedResponse`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use webllm_provider::{set_bridge, CompletionRequest, FnBridge, Message, ProviderConfig, WebLlmProvider};
//!
//! #[tokio::main]
//! async fn main() -> webllm_provider::Result<()> {
//!     // Registered once by the host environment before any completion call.
//!     set_bridge(FnBridge::new(|request: String| async move {
//!         // hand `request` to the engine and return its JSON reply
//!         Ok(format!(
//!             r#"{{"choices":[{{"message":{{"role":"assistant","content":"echo: {} bytes"}}}}]}}"#,
//!             request.len()
//!         ))
//!     }));
//!
//!     let provider = WebLlmProvider::new(ProviderConfig::from_env())?;
//!     let reply = provider
//!         .complete(&CompletionRequest::new(vec![Message::user("Hi")]))
//!         .await?;
//!     println!("{}", reply.content());
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`bridge`] | Bridge trait, closure adapters and the registry |
//! | [`provider`] | Completion adapter and streamed completions |
//! | [`types`] | Request, response and chunk types |
//! | [`config`] | Provider defaults and their sources |
//! | [`mount`] | Host mount points |
//! | [`logging`] | Optional tracing subscriber setup |

pub mod bridge;
pub mod config;
pub mod logging;
pub mod mount;
pub mod provider;
pub mod types;

// Re-export main types for convenience
pub use bridge::{
    frame_channel, get_bridge, global_registry, is_ready, set_bridge, Bridge, BridgeCapabilities,
    BridgeHandle, BridgeRegistry, FnBridge, FnStreamingBridge, FrameSender,
};
pub use config::ProviderConfig;
pub use mount::{mount, MountPoints};
pub use provider::{CompletionStream, Provider, WebLlmProvider, WebLlmProviderBuilder};
pub use types::{
    events::StreamChunk,
    message::{Message, MessageRole},
    request::CompletionRequest,
    response::CompletionResponse,
};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for the library
pub mod error;
pub use error::{Error, ErrorContext};
