use std::sync::{Arc, Mutex};

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use nub_api::auth::hash_password;
use nub_api::mailer::Mailer;
use nub_api::router;
use nub_api::state::{AdminCredential, AppStateInner};
use nub_db::Database;
use nub_engine::support::{ResponderError, SupportResponder};
use nub_gateway::dispatcher::Dispatcher;
use nub_types::models::RateInfo;

const ADMIN_EMAIL: &str = "ops@nub.market";
const ADMIN_PASSWORD: &str = "admin-password-123";
const DESK_ETH: &str = "0x71C7656EC7ab88b098defB751B7401B5f6d8976F";

#[derive(Clone, Default)]
struct CapturingMailer {
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl CapturingMailer {
    fn last_code(&self) -> String {
        self.sent.lock().unwrap().last().map(|(_, code)| code.clone()).unwrap()
    }
}

impl Mailer for CapturingMailer {
    fn send_verification_code(&self, email: &str, code: &str) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push((email.to_string(), code.to_string()));
        Ok(())
    }
}

struct FailingResponder;

impl SupportResponder for FailingResponder {
    fn respond(&self, _: &str, _: &[String], _: &RateInfo) -> Result<String, ResponderError> {
        Err(ResponderError("upstream timeout".into()))
    }
}

fn state() -> AppStateInner {
    AppStateInner::new(
        Database::open_in_memory().unwrap(),
        "test-secret".into(),
        Dispatcher::new(),
    )
    .with_admin(Some(AdminCredential {
        email: ADMIN_EMAIL.into(),
        password_hash: hash_password(ADMIN_PASSWORD).unwrap(),
    }))
}

fn app() -> Router {
    router(Arc::new(state()))
}

async fn send(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let request = match body {
        Some(payload) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn guest_token(app: &Router) -> (String, String) {
    let (status, body) = send(app, Method::POST, "/auth/guest", None, None).await;
    assert_eq!(status, StatusCode::CREATED);
    (
        body["token"].as_str().unwrap().to_string(),
        body["session"]["session_id"].as_str().unwrap().to_string(),
    )
}

async fn admin_token(app: &Router) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": ADMIN_EMAIL, "password": ADMIN_PASSWORD })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["session"]["kind"], "admin");
    body["token"].as_str().unwrap().to_string()
}

fn buy_order() -> Value {
    json!({
        "mode": "BUY",
        "amount": 100,
        "currency": "ETH",
        "grow_id": "NUBKING",
        "world_name": "DROPZONE"
    })
}

async fn place_order(app: &Router, token: &str) -> Value {
    let (status, body) = send(app, Method::POST, "/orders", Some(token), Some(buy_order())).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body
}

fn texts(messages: &Value) -> Vec<String> {
    messages
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["text"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn health_is_public() {
    let (status, body) = send(&app(), Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn protected_routes_need_a_token() {
    let app = app();
    let (status, body) = send(&app, Method::GET, "/orders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, Method::GET, "/orders", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_routes_reject_customers() {
    let app = app();
    let (token, _) = guest_token(&app).await;
    let (status, _) = send(&app, Method::GET, "/admin/rates", Some(&token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn wrong_admin_password_is_rejected() {
    let (status, _) = send(
        &app(),
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": ADMIN_EMAIL, "password": "nope-nope-nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn quote_and_calculator_tools() {
    let app = app();
    let (status, quote) = send(
        &app,
        Method::POST,
        "/market/quote",
        None,
        Some(json!({ "mode": "BUY", "currency": "ETH", "field": "quantity", "value": "100" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quote["total_usd"], 35.0);
    assert_eq!(quote["crypto_display"], "0.010000");

    let (status, split) = send(&app, Method::GET, "/market/split?total=17&worlds=5", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(split["allocations"], json!([4.0, 4.0, 3.0, 3.0, 3.0]));

    let (status, _) = send(&app, Method::GET, "/market/split?total=17&worlds=11", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, locks) = send(&app, Method::GET, "/tools/locks?world_locks=25000", None, None).await;
    assert_eq!(locks["diamond_locks"], 250.0);
}

#[tokio::test]
async fn txid_check_links_explorer_for_valid_hash() {
    let app = app();
    let hash = format!("0x{}", "ab".repeat(32));
    let (status, body) = send(
        &app,
        Method::POST,
        "/market/txid",
        None,
        Some(json!({ "currency": "ETH", "tx_hash": hash })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "valid");
    assert_eq!(body["explorer_url"], format!("https://etherscan.io/tx/{hash}"));

    let (_, body) = send(
        &app,
        Method::POST,
        "/market/txid",
        None,
        Some(json!({ "currency": "BTC", "tx_hash": hash })),
    )
    .await;
    assert_eq!(body["status"], "invalid");
    assert!(body["explorer_url"].is_null());
}

#[tokio::test]
async fn guest_order_raises_admin_only_alert() {
    let app = app();
    let (token, session_id) = guest_token(&app).await;
    let order = place_order(&app, &token).await;

    assert_eq!(order["status"], "PENDING");
    assert_eq!(order["total_usd"], 35.0);
    assert_eq!(order["is_guest"], true);
    assert_eq!(order["owner_id"], session_id);
    assert_eq!(order["id"].as_str().unwrap().len(), 9);

    let admin = admin_token(&app).await;
    let (_, all) = send(&app, Method::GET, "/chat/messages", Some(&admin), None).await;
    let alert = format!("New Guest Order #{} (100 DLs - $35.00)", order["id"].as_str().unwrap());
    assert!(texts(&all).iter().any(|t| t.contains(&alert)), "{all}");

    let (_, mine) = send(&app, Method::GET, "/chat/messages", Some(&token), None).await;
    assert!(texts(&mine).iter().all(|t| !t.contains("SYSTEM ALERT")));
}

#[tokio::test]
async fn invalid_orders_are_rejected() {
    let app = app();
    let (token, _) = guest_token(&app).await;

    let mut empty_world = buy_order();
    empty_world["world_name"] = json!("");
    let (status, _) = send(&app, Method::POST, "/orders", Some(&token), Some(empty_world)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let destinations: Vec<Value> = (0..4)
        .map(|i| json!({ "grow_id": format!("ALT{i}"), "world_name": format!("W{i}") }))
        .collect();
    let mut short_split = buy_order();
    short_split["is_safe_mode"] = json!(true);
    short_split["world_count"] = json!(5);
    short_split["destinations"] = json!(destinations);
    let (status, body) = send(&app, Method::POST, "/orders", Some(&token), Some(short_split)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Expected 5 destinations, got 4");
}

#[tokio::test]
async fn orders_are_private_to_their_owner() {
    let app = app();
    let (alice, _) = guest_token(&app).await;
    let (bob, _) = guest_token(&app).await;
    let order = place_order(&app, &alice).await;
    let uri = format!("/orders/{}", order["id"].as_str().unwrap());

    let (status, _) = send(&app, Method::GET, &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, Method::GET, &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, bobs) = send(&app, Method::GET, "/orders", Some(&bob), None).await;
    assert!(bobs.as_array().unwrap().is_empty());

    let admin = admin_token(&app).await;
    let (_, all) = send(&app, Method::GET, "/orders?filter=pending", Some(&admin), None).await;
    assert_eq!(all.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn completing_an_order_notifies_owner() {
    let app = app();
    let (token, _) = guest_token(&app).await;
    let order = place_order(&app, &token).await;
    let id = order["id"].as_str().unwrap();
    let admin = admin_token(&app).await;
    let uri = format!("/admin/orders/{id}/status");

    let (status, done) = send(&app, Method::PATCH, &uri, Some(&admin), Some(json!({ "status": "COMPLETED" }))).await;
    assert_eq!(status, StatusCode::OK, "{done}");
    assert_eq!(done["status"], "COMPLETED");
    assert!(done["completed_at"].is_string());

    let (status, _) = send(&app, Method::PATCH, &uri, Some(&admin), Some(json!({ "status": "PENDING" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, mine) = send(&app, Method::GET, "/chat/messages", Some(&token), None).await;
    let notice = format!("✅ Order #{id} completed!");
    assert!(texts(&mine).iter().any(|t| t.starts_with(&notice)), "{mine}");

    let (_, completed) = send(&app, Method::GET, "/orders?filter=completed", Some(&token), None).await;
    assert_eq!(completed.as_array().unwrap().len(), 1);
    let (_, pending) = send(&app, Method::GET, "/orders?filter=pending", Some(&token), None).await;
    assert!(pending.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn buyer_records_payment_tx() {
    let app = app();
    let (alice, _) = guest_token(&app).await;
    let (bob, _) = guest_token(&app).await;
    let order = place_order(&app, &alice).await;
    let id = order["id"].as_str().unwrap();
    let uri = format!("/orders/{id}/tx");
    let hash = format!("0x{}", "5c".repeat(32));

    let (status, _) = send(&app, Method::PUT, &uri, Some(&alice), Some(json!({ "tx_hash": "0x1234" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::PUT, &uri, Some(&bob), Some(json!({ "tx_hash": hash }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, Method::PUT, &uri, Some(&alice), Some(json!({ "tx_hash": hash }))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["tx_hash"], hash);

    let (_, stored) = send(&app, Method::GET, &format!("/orders/{id}"), Some(&alice), None).await;
    assert_eq!(stored["tx_hash"], hash);

    let admin = admin_token(&app).await;
    let (status, _) = send(&app, Method::PUT, &uri, Some(&admin), Some(json!({ "tx_hash": hash }))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    send(
        &app,
        Method::PATCH,
        &format!("/admin/orders/{id}/status"),
        Some(&admin),
        Some(json!({ "status": "PAID" })),
    )
    .await;
    let (status, _) = send(&app, Method::PUT, &uri, Some(&alice), Some(json!({ "tx_hash": hash }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn payment_needs_a_configured_wallet() {
    let app = app();
    let (token, _) = guest_token(&app).await;
    let order = place_order(&app, &token).await;
    let uri = format!("/orders/{}/payment", order["id"].as_str().unwrap());

    let (status, _) = send(&app, Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let admin = admin_token(&app).await;
    let (status, _) = send(
        &app,
        Method::PUT,
        "/admin/wallets",
        Some(&admin),
        Some(json!({ "BTC": "", "ETH": DESK_ETH, "LTC": "", "USDT": "" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, payment) = send(&app, Method::GET, &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payment["method"], "eth_transaction");
    assert_eq!(payment["to"], DESK_ETH);
    assert_eq!(payment["value_wei"], "0x2386f26fc10000");
}

#[tokio::test]
async fn admin_updates_rates_and_settings() {
    let app = app();
    let admin = admin_token(&app).await;

    let (status, _) = send(
        &app,
        Method::PUT,
        "/admin/rates",
        Some(&admin),
        Some(json!({ "buy_rate": 0.0, "sell_rate": 0.3 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        Method::PUT,
        "/admin/rates",
        Some(&admin),
        Some(json!({ "buy_rate": 0.4, "sell_rate": 0.3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (_, rates) = send(&app, Method::GET, "/market/rates", None, None).await;
    assert_eq!(rates["buy_rate"], 0.4);

    let (status, settings) = send(
        &app,
        Method::PUT,
        "/admin/settings",
        Some(&admin),
        Some(json!({ "live_support": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(settings["live_support"], true);
    assert_eq!(settings["drop_world_name"], "MARKET123");
}

#[tokio::test]
async fn lockbot_answers_until_live_support() {
    let app = app();
    let (token, _) = guest_token(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/chat/messages",
        Some(&token),
        Some(json!({ "text": "what are your rates?" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"]["user_name"], "User1");
    assert_eq!(body["reply"]["user_name"], "LockBot");
    assert!(body["reply"]["text"].as_str().unwrap().contains("$0.35"));

    let admin = admin_token(&app).await;
    send(&app, Method::PUT, "/admin/settings", Some(&admin), Some(json!({ "live_support": true }))).await;

    let (_, body) = send(&app, Method::POST, "/chat/messages", Some(&token), Some(json!({ "text": "anyone there?" }))).await;
    assert!(body["reply"].is_null());

    let (status, _) = send(
        &app,
        Method::POST,
        "/admin/chat",
        Some(&admin),
        Some(json!({ "text": "On my way", "target_user_id": body["message"]["user_id"] })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, mine) = send(&app, Method::GET, "/chat/messages", Some(&token), None).await;
    assert!(texts(&mine).contains(&"On my way".to_string()));
}

#[tokio::test]
async fn guests_keep_their_number() {
    let app = app();
    let (first, _) = guest_token(&app).await;
    let (second, _) = guest_token(&app).await;

    let mut names = Vec::new();
    for token in [&first, &second, &first] {
        let (_, body) = send(&app, Method::POST, "/chat/messages", Some(token), Some(json!({ "text": "hello there" }))).await;
        names.push(body["message"]["user_name"].as_str().unwrap().to_string());
    }
    assert_eq!(names, vec!["User1", "User2", "User1"]);
}

#[tokio::test]
async fn responder_failure_stores_apology() {
    let app = router(Arc::new(state().with_responder(FailingResponder)));
    let (token, _) = guest_token(&app).await;
    let (status, body) = send(&app, Method::POST, "/chat/messages", Some(&token), Some(json!({ "text": "hi" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        body["reply"]["text"],
        "I'm sorry, I encountered an error processing your request."
    );
    assert_eq!(body["reply"]["is_error"], true);
}

#[tokio::test]
async fn register_verify_login() {
    let mailer = CapturingMailer::default();
    let app = router(Arc::new(state().with_mailer(mailer.clone())));
    let signup = json!({ "username": "trader", "email": "Trader@Example.com", "password": "correct-horse" });

    let (status, body) = send(&app, Method::POST, "/auth/register", None, Some(signup.clone())).await;
    assert_eq!(status, StatusCode::ACCEPTED, "{body}");
    assert_eq!(body["email"], "trader@example.com");

    let (status, _) = send(
        &app,
        Method::POST,
        "/auth/verify",
        None,
        Some(json!({ "email": "trader@example.com", "code": "not-it" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let code = mailer.last_code();
    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/verify",
        None,
        Some(json!({ "email": "trader@example.com", "code": code })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["session"]["kind"], "customer");
    assert_eq!(body["session"]["username"], "trader");

    let (status, _) = send(&app, Method::POST, "/auth/register", None, Some(signup)).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({ "email": "trader@example.com", "password": "correct-horse" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["token"].as_str().unwrap().to_string();

    let order = place_order(&app, &token).await;
    assert_eq!(order["owner_id"], "trader@example.com");
    assert_eq!(order["is_guest"], false);

    let admin = admin_token(&app).await;
    let (_, users) = send(&app, Method::GET, "/admin/users", Some(&admin), None).await;
    assert_eq!(users.as_array().unwrap().len(), 1);
    assert!(users[0].get("password_hash").is_none());
}
