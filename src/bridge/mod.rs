//! 桥接层：连接外部推理引擎的唯一可调用对象。
//!
//! # Bridge Layer
//!
//! The bridge is the one callable that reaches the inference engine living in another
//! execution environment (for example a WebGPU engine driven from JavaScript). It takes the
//! serialized request text and resolves to the serialized reply text; everything about
//! model loading and inference stays on the other side.
//!
//! Streaming is a capability of the bridge, not a separate protocol: a bridge advertises it
//! through [`BridgeCapabilities`] and the provider dispatches on that flag.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`Bridge`] | Trait implemented by every bridge |
//! | [`FnBridge`] | Adapts an async closure into a batch-only bridge |
//! | [`FnStreamingBridge`] | Adapts a pair of async closures into a streaming bridge |
//! | [`frame_channel`] | Callback-style sender feeding a streaming bridge's frame stream |
//! | [`BridgeRegistry`] | Slot holding the active [`BridgeHandle`] |

pub mod registry;

pub use registry::{
    get_bridge, global_registry, is_ready, set_bridge, BridgeHandle, BridgeRegistry,
};

use async_trait::async_trait;
use futures::Stream;
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::types::events::UpstreamFrame;

/// Failures raised on the far side of the bridge are opaque to this crate.
pub type BridgeResult<T> = anyhow::Result<T>;

/// Raw frames produced by a streaming bridge, one serialized [`UpstreamFrame`] per item.
pub type FrameStream = Pin<Box<dyn Stream<Item = BridgeResult<String>> + Send + 'static>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeCapabilities {
    pub streaming: bool,
}

/// Callable crossing into the inference environment.
///
/// Implementations receive the request as JSON text and must resolve to the reply as JSON
/// text. No signature or payload validation happens at registration time.
#[async_trait]
pub trait Bridge: Send + Sync {
    async fn complete(&self, request: String) -> BridgeResult<String>;

    fn capabilities(&self) -> BridgeCapabilities {
        BridgeCapabilities::default()
    }

    /// Start a streamed completion. Only called when `capabilities().streaming` is set.
    async fn stream(&self, request: String) -> BridgeResult<FrameStream> {
        let _ = request;
        Err(anyhow::anyhow!("bridge does not support streaming"))
    }
}

/// Batch-only bridge backed by an async closure.
pub struct FnBridge<F> {
    func: F,
}

impl<F, Fut> FnBridge<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = BridgeResult<String>> + Send + 'static,
{
    pub fn new(func: F) -> Self {
        Self { func }
    }
}

#[async_trait]
impl<F, Fut> Bridge for FnBridge<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = BridgeResult<String>> + Send + 'static,
{
    async fn complete(&self, request: String) -> BridgeResult<String> {
        (self.func)(request).await
    }
}

/// Streaming-capable bridge backed by two async closures.
pub struct FnStreamingBridge<C, S> {
    complete: C,
    stream: S,
}

impl<C, CFut, S, SFut> FnStreamingBridge<C, S>
where
    C: Fn(String) -> CFut + Send + Sync,
    CFut: Future<Output = BridgeResult<String>> + Send + 'static,
    S: Fn(String) -> SFut + Send + Sync,
    SFut: Future<Output = BridgeResult<FrameStream>> + Send + 'static,
{
    pub fn new(complete: C, stream: S) -> Self {
        Self { complete, stream }
    }
}

#[async_trait]
impl<C, CFut, S, SFut> Bridge for FnStreamingBridge<C, S>
where
    C: Fn(String) -> CFut + Send + Sync,
    CFut: Future<Output = BridgeResult<String>> + Send + 'static,
    S: Fn(String) -> SFut + Send + Sync,
    SFut: Future<Output = BridgeResult<FrameStream>> + Send + 'static,
{
    async fn complete(&self, request: String) -> BridgeResult<String> {
        (self.complete)(request).await
    }

    fn capabilities(&self) -> BridgeCapabilities {
        BridgeCapabilities { streaming: true }
    }

    async fn stream(&self, request: String) -> BridgeResult<FrameStream> {
        (self.stream)(request).await
    }
}

/// Sending half of a callback-driven frame stream.
///
/// The engine side calls [`FrameSender::delta`] per token batch and finishes with
/// [`FrameSender::done`] or [`FrameSender::fail`]; dropping the sender also ends the stream.
#[derive(Clone)]
pub struct FrameSender {
    tx: mpsc::Sender<BridgeResult<String>>,
}

impl FrameSender {
    pub async fn delta(&self, content: impl Into<String>) -> BridgeResult<()> {
        self.send_frame(UpstreamFrame::Delta {
            content: content.into(),
        })
        .await
    }

    pub async fn done(
        self,
        finish_reason: Option<String>,
        usage: Option<Map<String, Value>>,
    ) -> BridgeResult<()> {
        self.send_frame(UpstreamFrame::Done {
            finish_reason,
            usage,
            model: None,
        })
        .await
    }

    /// Terminate the stream with an engine-side failure.
    pub async fn fail(self, error: anyhow::Error) -> BridgeResult<()> {
        self.send_raw(Err(error)).await
    }

    /// Forward an already-serialized frame (or failure) untouched.
    pub async fn send_raw(&self, frame: BridgeResult<String>) -> BridgeResult<()> {
        self.tx
            .send(frame)
            .await
            .map_err(|_| anyhow::anyhow!("stream consumer dropped"))
    }

    async fn send_frame(&self, frame: UpstreamFrame) -> BridgeResult<()> {
        let text = serde_json::to_string(&frame)?;
        self.send_raw(Ok(text)).await
    }
}

/// Create a bounded frame channel; the receiving half is ready to return from [`Bridge::stream`].
pub fn frame_channel(buffer: usize) -> (FrameSender, FrameStream) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (FrameSender { tx }, Box::pin(ReceiverStream::new(rx)))
}
