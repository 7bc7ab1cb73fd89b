use axum::http::StatusCode;
use gateway::{GatewayServer, SessionLimits};
use providers::{AdapterRegistry, MockSettings, ProviderSettings, QwenSettings};
use std::time::Duration;
use tokio::time::timeout;

fn pick_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind ephemeral port");
    let port = listener.local_addr().expect("local addr").port();
    drop(listener);
    port
}

async fn wait_for_health(port: u16) {
    let url = format!("http://127.0.0.1:{port}/health");
    for _ in 0..80 {
        if let Ok(resp) = reqwest::get(&url).await
            && resp.status().is_success()
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
    panic!("gateway on port {port} did not become healthy in time");
}

fn mock_settings(fragments: &[&str]) -> ProviderSettings {
    ProviderSettings {
        mock: MockSettings {
            fragments: fragments.iter().map(|s| s.to_string()).collect(),
            delay: Duration::ZERO,
        },
        ..ProviderSettings::default()
    }
}

async fn spawn_gateway(
    settings: ProviderSettings,
    auth_token: &str,
) -> (u16, tokio::task::JoinHandle<()>) {
    let port = pick_free_port();
    let server = GatewayServer::new(
        port,
        auth_token.to_string(),
        "*".to_string(),
        AdapterRegistry::new(settings),
        SessionLimits::default(),
    );
    let handle = tokio::spawn(async move {
        let _ = server.run().await;
    });
    wait_for_health(port).await;
    (port, handle)
}

/// Fixed-response upstream standing in for the DashScope endpoint.
async fn spawn_upstream(
    status: StatusCode,
    body: &'static str,
) -> (String, tokio::task::JoinHandle<()>) {
    let app = axum::Router::new().route(
        "/generation",
        axum::routing::post(move || async move { (status, body) }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind upstream");
    let addr = listener.local_addr().expect("upstream addr");
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}/generation"), handle)
}

async fn post_completion(port: u16, body: serde_json::Value) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/v1/completions"))
        .json(&body)
        .send()
        .await
        .expect("POST /v1/completions")
}

#[tokio::test]
async fn mock_stream_delivers_fragments_then_end_sentinel() {
    let (port, server_task) = spawn_gateway(mock_settings(&["a", "b", "c"]), "").await;

    let resp = post_completion(
        port,
        serde_json::json!({
            "provider": "mock",
            "messages": [{"role": "user", "content": "hi"}]
        }),
    )
    .await;

    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok()),
        Some("text/event-stream")
    );
    assert_eq!(
        resp.headers()
            .get("cache-control")
            .and_then(|v| v.to_str().ok()),
        Some("no-cache")
    );

    let body = timeout(Duration::from_secs(5), resp.text())
        .await
        .expect("stream should finish")
        .expect("read body");
    assert_eq!(body, "data: a\n\ndata: b\n\ndata: c\n\ndata: [END]\n\n");

    server_task.abort();
    let _ = server_task.await;
}

#[tokio::test]
async fn unsupported_provider_is_rejected_before_streaming() {
    let (port, server_task) = spawn_gateway(mock_settings(&["a"]), "").await;

    let resp = post_completion(
        port,
        serde_json::json!({
            "provider": "gpt9",
            "messages": [{"role": "user", "content": "hi"}]
        }),
    )
    .await;

    assert_eq!(resp.status(), 400);
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(
        !content_type.contains("text/event-stream"),
        "no SSE headers on validation failure"
    );
    let body: serde_json::Value = resp.json().await.expect("json error body");
    assert_eq!(body["error"], "Unsupported provider: gpt9");

    server_task.abort();
    let _ = server_task.await;
}

#[tokio::test]
async fn empty_messages_are_rejected() {
    let (port, server_task) = spawn_gateway(mock_settings(&["a"]), "").await;

    let resp = post_completion(
        port,
        serde_json::json!({"provider": "mock", "messages": []}),
    )
    .await;

    assert_eq!(resp.status(), 400);
    let body: serde_json::Value = resp.json().await.expect("json error body");
    assert_eq!(body["error"], "messages must not be empty");

    server_task.abort();
    let _ = server_task.await;
}

#[tokio::test]
async fn completion_endpoint_requires_bearer_token_when_configured() {
    let (port, server_task) = spawn_gateway(mock_settings(&["a"]), "secret").await;

    let body = serde_json::json!({
        "provider": "mock",
        "messages": [{"role": "user", "content": "hi"}]
    });

    let resp = post_completion(port, body.clone()).await;
    assert_eq!(resp.status(), 401);

    let resp = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{port}/v1/completions"))
        .bearer_auth("secret")
        .json(&body)
        .send()
        .await
        .expect("authorized POST");
    assert_eq!(resp.status(), 200);
    let text = resp.text().await.expect("read body");
    assert!(text.ends_with("data: [END]\n\n"));

    server_task.abort();
    let _ = server_task.await;
}

#[tokio::test]
async fn upstream_http_error_yields_error_sentinel_without_content() {
    let (upstream_url, upstream_task) =
        spawn_upstream(StatusCode::INTERNAL_SERVER_ERROR, "boom").await;
    let settings = ProviderSettings {
        qwen: QwenSettings {
            api_key: "test-key".to_string(),
            url: upstream_url,
            model: "qwen-plus".to_string(),
        },
        ..ProviderSettings::default()
    };
    let (port, server_task) = spawn_gateway(settings, "").await;

    let resp = post_completion(
        port,
        serde_json::json!({
            "provider": "qwen",
            "messages": [{"role": "user", "content": "hi"}]
        }),
    )
    .await;

    assert_eq!(resp.status(), 200);
    let body = timeout(Duration::from_secs(5), resp.text())
        .await
        .expect("stream should finish")
        .expect("read body");
    // No content frames, and the upstream body text never leaks through.
    assert_eq!(body, "data: [ERROR]\n\n");

    server_task.abort();
    upstream_task.abort();
    let _ = server_task.await;
}

#[tokio::test]
async fn qwen_sse_frames_are_relayed_and_terminated() {
    let upstream_body = concat!(
        "data:{\"output\":{\"choices\":[{\"message\":{\"content\":\"Hello\"}}]}}\n\n",
        "data:{\"output\":{\"choices\":[{\"message\":{\"content\":\" world\"}}]}}\n\n",
    );
    let (upstream_url, upstream_task) = spawn_upstream(StatusCode::OK, upstream_body).await;
    let settings = ProviderSettings {
        qwen: QwenSettings {
            api_key: "test-key".to_string(),
            url: upstream_url,
            model: "qwen-plus".to_string(),
        },
        ..ProviderSettings::default()
    };
    let (port, server_task) = spawn_gateway(settings, "").await;

    let resp = post_completion(
        port,
        serde_json::json!({
            "provider": "qwen",
            "messages": [{"role": "user", "content": "hi"}]
        }),
    )
    .await;

    let body = timeout(Duration::from_secs(5), resp.text())
        .await
        .expect("stream should finish")
        .expect("read body");
    assert_eq!(body, "data: Hello\n\ndata:  world\n\ndata: [END]\n\n");

    server_task.abort();
    upstream_task.abort();
    let _ = server_task.await;
}
