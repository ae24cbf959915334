//! Streamed completion: forwards deltas as they arrive and aggregates them.

use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::task::{Context, Poll};
use tracing::debug;
use uuid::Uuid;

use crate::bridge::FrameStream;
use crate::types::events::{StreamChunk, UpstreamFrame};
use crate::types::response::{CompletionResponse, Usage};
use crate::{Error, Result};

enum Source {
    /// Batch-only bridge: the full reply, emitted as a single chunk.
    Batch {
        response: CompletionResponse,
        emitted: bool,
    },
    Upstream(FrameStream),
}

enum Failure {
    Bridge(String),
    Malformed(String),
}

impl Failure {
    fn to_error(&self) -> Error {
        match self {
            Failure::Bridge(msg) => Error::bridge_reported(msg.clone()),
            Failure::Malformed(msg) => Error::malformed(msg.clone()),
        }
    }
}

/// Stream of [`StreamChunk`]s for one completion.
///
/// Chunks are yielded as soon as the bridge produces them. After the stream ends,
/// [`CompletionStream::response`] gives the compound reply; [`CompletionStream::into_response`]
/// drains whatever is left and returns it. The first error ends the stream.
pub struct CompletionStream {
    source: Source,
    request_id: Uuid,
    content: String,
    chunks: usize,
    finish_reason: Option<String>,
    usage: Usage,
    model: Option<String>,
    finished: bool,
    failure: Option<Failure>,
}

impl CompletionStream {
    pub(crate) fn from_response(response: CompletionResponse, request_id: Uuid) -> Self {
        Self::with_source(
            Source::Batch {
                response,
                emitted: false,
            },
            request_id,
        )
    }

    pub(crate) fn from_frames(frames: FrameStream, request_id: Uuid) -> Self {
        Self::with_source(Source::Upstream(frames), request_id)
    }

    fn with_source(source: Source, request_id: Uuid) -> Self {
        Self {
            source,
            request_id,
            content: String::new(),
            chunks: 0,
            finish_reason: None,
            usage: Usage::default(),
            model: None,
            finished: false,
            failure: None,
        }
    }

    /// True when the chunks come from a single batch call instead of a streaming bridge.
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, Source::Batch { .. })
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Content received so far.
    pub fn content(&self) -> &str {
        match &self.source {
            Source::Batch { response, emitted } if *emitted => response.content(),
            Source::Batch { .. } => "",
            Source::Upstream(_) => &self.content,
        }
    }

    /// The aggregated reply, once the stream has ended successfully.
    pub fn response(&self) -> Option<CompletionResponse> {
        if !self.finished || self.failure.is_some() {
            return None;
        }
        match &self.source {
            Source::Batch { response, .. } => Some(response.clone()),
            Source::Upstream(_) => Some(CompletionResponse::from_parts(
                self.model.clone(),
                self.content.clone(),
                self.finish_reason.clone(),
                self.usage.clone(),
            )),
        }
    }

    /// Consume the rest of the stream and return the aggregated reply.
    pub async fn into_response(mut self) -> Result<CompletionResponse> {
        while let Some(item) = self.next().await {
            item?;
        }
        if let Some(failure) = &self.failure {
            return Err(failure.to_error());
        }
        self.response()
            .ok_or_else(|| Error::malformed("stream ended without a response"))
    }

    fn fail(&mut self, err: Error) -> Poll<Option<Result<StreamChunk>>> {
        self.finished = true;
        self.failure = Some(match &err {
            Error::BridgeInvocation { message, .. } => Failure::Bridge(message.clone()),
            Error::MalformedResponse { message, .. } => Failure::Malformed(message.clone()),
            other => Failure::Malformed(other.to_string()),
        });
        debug!(request_id = %self.request_id, chunks = self.chunks, error = %err, "stream failed");
        Poll::Ready(Some(Err(err)))
    }

    fn finish(&mut self) -> Poll<Option<Result<StreamChunk>>> {
        self.finished = true;
        debug!(
            request_id = %self.request_id,
            chunks = self.chunks,
            finish_reason = ?self.finish_reason,
            "stream completed"
        );
        Poll::Ready(None)
    }
}

impl std::fmt::Debug for CompletionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionStream")
            .field("request_id", &self.request_id)
            .field("fallback", &self.is_fallback())
            .field("chunks", &self.chunks)
            .field("finished", &self.finished)
            .field("failed", &self.failure.is_some())
            .finish()
    }
}

impl Stream for CompletionStream {
    type Item = Result<StreamChunk>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        let polled = match &mut this.source {
            Source::Batch { response, emitted } => {
                if *emitted {
                    None
                } else {
                    *emitted = true;
                    Some(Ok(StreamChunk::delta(response.content())))
                }
            }
            Source::Upstream(frames) => match frames.poll_next_unpin(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => None,
                Poll::Ready(Some(Err(e))) => return this.fail(Error::bridge_invocation(e)),
                Poll::Ready(Some(Ok(text))) => match UpstreamFrame::parse(&text) {
                    Err(e) => return this.fail(e),
                    Ok(UpstreamFrame::Delta { content }) => {
                        this.content.push_str(&content);
                        Some(Ok(StreamChunk::Delta { content }))
                    }
                    Ok(UpstreamFrame::Done {
                        finish_reason,
                        usage,
                        model,
                    }) => {
                        this.finish_reason = finish_reason;
                        this.usage = Usage(usage.unwrap_or_default());
                        this.model = model;
                        None
                    }
                    Ok(UpstreamFrame::Error { error }) => {
                        let message = match error {
                            serde_json::Value::String(s) => s,
                            other => other.to_string(),
                        };
                        return this.fail(Error::bridge_reported(message));
                    }
                },
            },
        };

        match polled {
            Some(chunk) => {
                this.chunks += 1;
                Poll::Ready(Some(chunk))
            }
            None => this.finish(),
        }
    }
}
