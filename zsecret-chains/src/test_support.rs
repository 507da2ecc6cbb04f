//! Local JSON-RPC stub servers for adapter tests.

use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::Value;

/// Serve `handler` on an ephemeral port and return its base URL.
pub async fn spawn_rpc_stub<F>(handler: F) -> String
where
    F: Fn(Value) -> (StatusCode, Value) + Clone + Send + Sync + 'static,
{
    spawn_rpc_stub_with_delay(Duration::ZERO, handler).await
}

/// Like [`spawn_rpc_stub`], but every response is held back by `delay`.
pub async fn spawn_rpc_stub_with_delay<F>(delay: Duration, handler: F) -> String
where
    F: Fn(Value) -> (StatusCode, Value) + Clone + Send + Sync + 'static,
{
    let app = Router::new().route(
        "/",
        post(move |Json(request): Json<Value>| {
            let handler = handler.clone();
            async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let (status, body) = handler(request);
                (status, Json(body))
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub listener");
    let addr = listener.local_addr().expect("stub local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    format!("http://{addr}")
}
