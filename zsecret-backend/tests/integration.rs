use std::{sync::Arc, time::Duration};

use axum::{
    body::{self, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::util::ServiceExt;
use zsecret_backend::{app_router, AppState, CONTEXT_HEADER};
use zsecret_chains::{MockAdapter, MockScript, SharedAdapter};
use zsecret_common::{AdapterErrorKind, Amount, ChainId};
use zsecret_session::SessionConfig;

const BODY_LIMIT: usize = usize::MAX;

fn amount(s: &str) -> Amount {
    s.parse().unwrap()
}

fn test_app(adapters: Vec<SharedAdapter>) -> Router {
    let config = SessionConfig {
        aggregation_deadline: Duration::from_millis(500),
        ..SessionConfig::default()
    };
    app_router(AppState::with_components(adapters, config))
}

fn demo_adapters() -> Vec<SharedAdapter> {
    vec![
        Arc::new(MockAdapter::balance(
            ChainId::ZcashTestnet,
            Amount::ZERO,
            Some(amount("5.25")),
            amount("1.5"),
        )),
        Arc::new(MockAdapter::balance(
            ChainId::NearTestnet,
            amount("245.5"),
            None,
            Amount::ZERO,
        )),
    ]
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    context: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(context) = context {
        builder = builder.header(CONTEXT_HEADER, context);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), BODY_LIMIT).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn new_context(app: &Router) -> String {
    let (status, body) = send(app, "POST", "/api/session", None, None).await;
    assert_eq!(status, StatusCode::CREATED);
    body["contextId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_endpoint_is_open() {
    let app = test_app(demo_adapters());
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn balance_requires_context_and_session() {
    let app = test_app(demo_adapters());

    let (status, body) = send(&app, "GET", "/api/balance", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = send(
        &app,
        "GET",
        "/api/balance",
        Some("00000000-0000-4000-8000-000000000000"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let context = new_context(&app).await;
    let (status, body) = send(&app, "GET", "/api/balance", Some(&context), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn guard_redirect_connect_resume_and_balance() {
    let app = test_app(demo_adapters());
    let context = new_context(&app).await;

    let (status, decision) = send(
        &app,
        "GET",
        "/api/guard?path=/freelancer/dashboard",
        Some(&context),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        decision,
        json!({"decision": "redirect", "redirectTo": "/connect-wallet"})
    );

    let (status, outcome) = send(
        &app,
        "POST",
        "/api/session/connect",
        Some(&context),
        Some(json!({"wallet": "zcash-demo"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["resumeTo"], "/freelancer/dashboard");
    assert_eq!(outcome["session"]["state"], "authenticated");
    assert_eq!(outcome["session"]["walletKind"], "zcash-demo");
    assert_eq!(outcome["session"]["address"]["aliases"]["near"], "demo.near");

    let (_, decision) = send(
        &app,
        "GET",
        "/api/guard?path=/freelancer/dashboard",
        Some(&context),
        None,
    )
    .await;
    assert_eq!(decision, json!({"decision": "render"}));

    let (status, refreshed) =
        send(&app, "POST", "/api/balance/refresh", Some(&context), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refreshed["balance"], "250.75");
    assert_eq!(refreshed["pendingBalance"], "1.5");
    assert_eq!(refreshed["shielded"], true);
    assert_eq!(refreshed["completeness"], "full");
    assert!(refreshed.get("unavailable").is_none());

    let (status, balance) = send(&app, "GET", "/api/balance", Some(&context), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(balance["balance"], "250.75");
    assert_eq!(balance["completeness"], "full");

    let (status, session) =
        send(&app, "POST", "/api/session/disconnect", Some(&context), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["state"], "disconnected");

    let (status, _) = send(&app, "GET", "/api/balance", Some(&context), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn partial_outage_is_labelled() {
    let near = Arc::new(MockAdapter::new(
        ChainId::NearTestnet,
        MockScript::Fail(AdapterErrorKind::Transport),
    ));
    let zcash = Arc::new(MockAdapter::balance(
        ChainId::ZcashTestnet,
        amount("3.00"),
        Some(amount("2.25")),
        Amount::ZERO,
    ));
    let app = test_app(vec![zcash as SharedAdapter, near]);
    let context = new_context(&app).await;
    send(
        &app,
        "POST",
        "/api/session/connect",
        Some(&context),
        Some(json!({"wallet": "zcash-demo"})),
    )
    .await;

    let (_, view) = send(&app, "POST", "/api/balance/refresh", Some(&context), None).await;
    assert_eq!(view["balance"], "5.25");
    assert_eq!(view["pendingBalance"], "0");
    assert_eq!(view["shielded"], true);
    assert_eq!(view["completeness"], "partial");
    assert_eq!(
        view["chains"],
        json!([
            {"chainId": "near_testnet", "ok": false, "errorKind": "transport"},
            {"chainId": "zcash_testnet", "ok": true}
        ])
    );
}

#[tokio::test]
async fn total_outage_without_history_is_no_data() {
    let app = test_app(vec![
        Arc::new(MockAdapter::new(ChainId::ZcashTestnet, MockScript::Hang)) as SharedAdapter,
        Arc::new(MockAdapter::new(
            ChainId::NearTestnet,
            MockScript::Fail(AdapterErrorKind::Rpc),
        )),
    ]);
    let context = new_context(&app).await;
    send(
        &app,
        "POST",
        "/api/session/connect",
        Some(&context),
        Some(json!({"wallet": "zcash-demo"})),
    )
    .await;

    let (status, view) = send(&app, "POST", "/api/balance/refresh", Some(&context), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["balance"], "0");
    assert_eq!(view["pendingBalance"], "0");
    assert_eq!(view["shielded"], false);
    assert_eq!(view["completeness"], "stale");
    assert_eq!(view["unavailable"], "NO_DATA");
}

#[tokio::test]
async fn unknown_and_unwired_wallets_are_rejected() {
    let app = test_app(demo_adapters());
    let context = new_context(&app).await;

    let (status, body) = send(
        &app,
        "POST",
        "/api/session/connect",
        Some(&context),
        Some(json!({"wallet": "metamask"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "WALLET_UNKNOWN");

    let (status, body) = send(
        &app,
        "POST",
        "/api/session/connect",
        Some(&context),
        Some(json!({"wallet": "zcash-zashi"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["code"], "CONNECT_FAILED");
    assert!(body["message"].as_str().unwrap().contains("coming soon"));

    let (_, session) = send(&app, "GET", "/api/session", Some(&context), None).await;
    assert_eq!(session["state"], "error");
    assert_eq!(session["error"]["kind"], "CONNECT_FAILED");
}

#[tokio::test]
async fn deleting_a_context_forgets_it() {
    let app = test_app(demo_adapters());
    let context = new_context(&app).await;

    let (status, _) = send(&app, "DELETE", "/api/session", Some(&context), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, "GET", "/api/session", Some(&context), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
