//! Echo bridge demo
//!
//! Registers a stand-in for the browser engine that echoes the last user message,
//! then runs one batch completion and one streamed completion through the provider.
//!
//! Usage:
//!   RUST_LOG=debug cargo run --example echo_bridge

use std::time::Duration;

use futures::StreamExt;
use webllm_provider::bridge::FrameStream;
use webllm_provider::logging::init_tracing;
use webllm_provider::types::BridgeRequest;
use webllm_provider::{
    frame_channel, set_bridge, CompletionRequest, FnStreamingBridge, Message, ProviderConfig,
    WebLlmProvider,
};

fn last_user_message(request_json: &str) -> anyhow::Result<(String, String)> {
    let request = BridgeRequest::from_json(request_json)?;
    let text = request
        .messages
        .iter()
        .rev()
        .find(|m| m.role == webllm_provider::MessageRole::User)
        .map(|m| m.content.clone())
        .unwrap_or_default();
    Ok((request.model, text))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    set_bridge(FnStreamingBridge::new(
        |req: String| async move {
            let (model, text) = last_user_message(&req)?;
            Ok::<String, anyhow::Error>(
                serde_json::json!({
                    "object": "chat.completion",
                    "model": model,
                    "choices": [{
                        "index": 0,
                        "message": {"role": "assistant", "content": format!("You said: {text}")},
                        "finish_reason": "stop"
                    }],
                    "usage": {}
                })
                .to_string(),
            )
        },
        |req: String| async move {
            let (model, text) = last_user_message(&req)?;
            let (tx, frames) = frame_channel(16);
            tokio::spawn(async move {
                for word in text.split_whitespace() {
                    if tx.delta(format!("{word} ")).await.is_err() {
                        return;
                    }
                    tokio::time::sleep(Duration::from_millis(50)).await;
                }
                let _ = tx
                    .send_raw(Ok(serde_json::json!({
                        "type": "done",
                        "finish_reason": "stop",
                        "model": model
                    })
                    .to_string()))
                    .await;
            });
            Ok::<FrameStream, anyhow::Error>(frames)
        },
    ));

    let provider = WebLlmProvider::new(ProviderConfig::from_env())?;

    let request = CompletionRequest::new(vec![
        Message::system("You are an echo."),
        Message::user("streaming tokens straight from the browser engine"),
    ]);

    let reply = provider.complete(&request).await?;
    println!("Batch reply: {}", reply.content());

    let mut stream = provider.stream(&request).await?;
    print!("Streamed: ");
    while let Some(chunk) = stream.next().await {
        print!("{}", chunk?.content());
    }
    println!();

    if let Some(resp) = stream.response() {
        println!(
            "finish_reason={:?} model={:?}",
            resp.finish_reason(),
            resp.model()
        );
    }

    Ok(())
}
