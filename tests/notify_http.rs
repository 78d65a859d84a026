//! Exercises the chat notifier against a real HTTP listener.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use std::sync::{Arc, Mutex};
use steward::config::ChatConfig;
use steward::domain::ReplyChannel;
use steward::notify::{ChatNotifier, Notifier, NotifyError};
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct Captured {
    inner: Arc<Mutex<Vec<(String, String, String)>>>,
}

async fn capture(
    State(captured): State<Captured>,
    Path(channel): Path<String>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    let auth = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let content = body
        .get("content")
        .and_then(|value| value.as_str())
        .unwrap_or_default()
        .to_string();
    captured
        .inner
        .lock()
        .expect("capture log")
        .push((channel, auth, content));
    StatusCode::OK
}

async fn serve(router: Router) -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("serve");
    });
    addr
}

#[tokio::test(flavor = "multi_thread")]
async fn notify_posts_to_the_channel_message_endpoint() {
    let captured = Captured::default();
    let router = Router::new()
        .route("/channels/:channel/messages", post(capture))
        .with_state(captured.clone());
    let addr = serve(router).await;

    let notifier = ChatNotifier::new(&ChatConfig {
        api_base: format!("http://{addr}"),
        bot_token: "sekrit".to_string(),
    })
    .expect("client builds");

    notifier
        .notify(&ReplyChannel::new("1234"), "hello there")
        .await
        .expect("delivery succeeds");

    let entries = captured.inner.lock().expect("capture log").clone();
    assert_eq!(
        entries,
        vec![(
            "1234".to_string(),
            "Bot sekrit".to_string(),
            "hello there".to_string()
        )]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn non_success_status_surfaces_as_a_notify_error() {
    let router = Router::new().route(
        "/channels/:channel/messages",
        post(|| async { StatusCode::FORBIDDEN }),
    );
    let addr = serve(router).await;

    let notifier = ChatNotifier::new(&ChatConfig {
        api_base: format!("http://{addr}"),
        bot_token: "sekrit".to_string(),
    })
    .expect("client builds");

    let err = notifier
        .notify(&ReplyChannel::new("1234"), "hello")
        .await
        .expect_err("must fail");

    match err {
        NotifyError::Status { status } => assert_eq!(status, 403),
        other => panic!("unexpected error variant: {other:?}"),
    }
}
