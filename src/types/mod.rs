//! 类型系统模块：定义桥接请求、响应与流式分片的数据类型。
//!
//! # Types Module
//!
//! Strongly-typed representations of everything that crosses the bridge.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Message`] | Chat message with role and content |
//! | [`CompletionRequest`] | Caller-facing request with optional sampling parameters |
//! | [`BridgeRequest`] | Fully-resolved JSON payload handed to the bridge |
//! | [`CompletionResponse`] | Normalized single-choice reply |
//! | [`StreamChunk`] | One streamed delta |
//! | [`UpstreamFrame`] | Frames emitted by a streaming bridge |
//!
//! ## Example
//!
//! ```rust
//! use webllm_provider::config::ProviderConfig;
//! use webllm_provider::types::{CompletionRequest, Message};
//!
//! let request = CompletionRequest::new(vec![
//!     Message::system("You are a helpful assistant"),
//!     Message::user("Hi"),
//! ])
//! .max_tokens(256);
//!
//! let payload = request.resolve(&ProviderConfig::default());
//! assert_eq!(payload.temperature, 0.7);
//! ```

pub mod events;
pub mod message;
pub mod request;
pub mod response;

pub use events::{StreamChunk, UpstreamFrame};
pub use message::{Message, MessageRole};
pub use request::{BridgeRequest, CompletionRequest};
pub use response::{AssistantMessage, Choice, CompletionResponse, Usage};
