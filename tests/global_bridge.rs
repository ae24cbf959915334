//! Process-wide registration path, as used by a host that mounts the provider.
//!
//! Kept to a single test: the global registry is shared by every test in this binary.

use serde_json::json;
use webllm_provider::{
    get_bridge, is_ready, mount, set_bridge, CompletionRequest, Error, FnBridge, Message,
    MountPoints, Provider,
};

#[tokio::test]
async fn test_host_registration_flow() {
    assert!(!is_ready());
    assert!(matches!(get_bridge(), Err(Error::NotInitialized { .. })));

    let mut points = MountPoints::new();
    let provider = mount(&mut points, json!({"temperature": 0.5})).unwrap();
    assert_eq!(points.default_provider(), Some("webllm"));

    // Mounting before registration is fine; calling is not.
    let request = CompletionRequest::new(vec![Message::user("Hi")]);
    assert!(matches!(
        provider.complete(&request).await,
        Err(Error::NotInitialized { .. })
    ));

    set_bridge(FnBridge::new(|req: String| async move {
        let parsed: serde_json::Value = serde_json::from_str(&req)?;
        let temperature = parsed["temperature"].as_f64().unwrap_or_default();
        Ok::<String, anyhow::Error>(
            json!({
                "choices": [{
                    "message": {"role": "assistant", "content": format!("t={temperature}")},
                    "finish_reason": "stop"
                }]
            })
            .to_string(),
        )
    }));
    assert!(is_ready());
    assert_eq!(get_bridge().unwrap().generation(), 1);

    let default = points.default_mounted().unwrap();
    let resp = default.complete(&request).await.unwrap();
    assert_eq!(resp.content(), "t=0.5");
}
