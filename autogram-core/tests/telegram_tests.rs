// tests/telegram_tests.rs
//
// Runs the Telegram client against a local stand-in for the Bot API.

use std::sync::Arc;
use std::time::Duration;

use autogram_core::Error;
use autogram_core::platforms::telegram::TelegramClient;
use autogram_core::platforms::{PlatformIntegration, ConnectionStatus};
use autogram_core::platforms::telegram::TelegramPlatform;
use autogram_core::services::MediaSource;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

#[derive(Clone, Default)]
struct FakeApi {
    sent: Arc<Mutex<Vec<Value>>>,
    polls: Arc<Mutex<u32>>,
}

async fn get_me() -> Json<Value> {
    Json(json!({"ok": true, "result": {"id": 777, "is_bot": true, "first_name": "Autogram", "username": "autogram_bot"}}))
}

async fn get_file(Json(body): Json<Value>) -> Json<Value> {
    match body["file_id"].as_str() {
        Some("photo-1") => Json(json!({"ok": true, "result": {"file_id": "photo-1", "file_size": 4, "file_path": "photos/file_1.jpg"}})),
        Some("nopath") => Json(json!({"ok": true, "result": {"file_id": "nopath"}})),
        _ => Json(json!({"ok": false, "error_code": 400, "description": "Bad Request: invalid file_id"})),
    }
}

async fn send_message(State(api): State<FakeApi>, Json(body): Json<Value>) -> Json<Value> {
    if body["chat_id"] == json!(-1) {
        return Json(json!({"ok": false, "error_code": 400, "description": "Bad Request: chat not found"}));
    }
    api.sent.lock().await.push(body.clone());
    Json(json!({"ok": true, "result": {"message_id": 1, "chat": {"id": body["chat_id"], "type": "private"}, "date": 0, "text": body["text"]}}))
}

async fn get_updates(State(api): State<FakeApi>, Json(body): Json<Value>) -> Json<Value> {
    let mut polls = api.polls.lock().await;
    *polls += 1;
    if *polls == 1 {
        assert_eq!(body["offset"], json!(0));
        Json(json!({"ok": true, "result": [
            {"update_id": 500, "message": {"message_id": 1, "chat": {"id": 5, "type": "private"}, "date": 0, "text": "one"}},
            {"update_id": 501, "message": {"message_id": 2, "chat": {"id": 5, "type": "private"}, "date": 0, "text": "two"}}
        ]}))
    } else {
        assert_eq!(body["offset"], json!(502));
        // Keep the long poll short so the test finishes quickly.
        tokio::time::sleep(Duration::from_millis(200)).await;
        Json(json!({"ok": true, "result": []}))
    }
}

async fn spawn_fake_api() -> (String, FakeApi) {
    let api = FakeApi::default();
    let app = Router::new()
        .route("/botTEST/getMe", post(get_me))
        .route("/botTEST/getFile", post(get_file))
        .route("/botTEST/sendMessage", post(send_message))
        .route("/botTEST/getUpdates", post(get_updates))
        .route("/file/botTEST/photos/file_1.jpg", get(|| async { vec![0xFFu8, 0xD8, 0xFF, 0xE0] }))
        .with_state(api.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), api)
}

#[tokio::test]
async fn test_download_file() {
    let (base, _api) = spawn_fake_api().await;
    let client = TelegramClient::with_api_base("TEST", &base).unwrap();

    let data = client.fetch("photo-1").await.unwrap();
    assert_eq!(&data[..], &[0xFF, 0xD8, 0xFF, 0xE0]);
}

#[tokio::test]
async fn test_api_errors_surface_as_telegram_errors() {
    let (base, _api) = spawn_fake_api().await;
    let client = TelegramClient::with_api_base("TEST", &base).unwrap();

    match client.download_file("bogus").await {
        Err(Error::Telegram(msg)) => assert!(msg.contains("invalid file_id")),
        other => panic!("unexpected: {:?}", other),
    }
    assert!(matches!(client.download_file("nopath").await, Err(Error::Telegram(_))));
    match client.send_message(-1, "hi").await {
        Err(Error::Telegram(msg)) => assert!(msg.contains("chat not found")),
        other => panic!("unexpected: {:?}", other),
    }
}

#[tokio::test]
async fn test_send_message_payload() {
    let (base, api) = spawn_fake_api().await;
    let client = TelegramClient::with_api_base("TEST", &base).unwrap();

    let msg = client.send_message(42, "carol: hi").await.unwrap();
    assert_eq!(msg.chat.id, 42);
    let sent = api.sent.lock().await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["text"], json!("carol: hi"));
}

#[tokio::test]
async fn test_platform_polls_and_advances_offset() {
    let (base, api) = spawn_fake_api().await;
    let client = Arc::new(TelegramClient::with_api_base("TEST", &base).unwrap());
    let mut platform = TelegramPlatform::new(client);
    let mut updates = platform.take_updates().unwrap();

    platform.connect().await.unwrap();
    assert_eq!(platform.get_connection_status().await.unwrap(), ConnectionStatus::Connected);

    let first = tokio::time::timeout(Duration::from_secs(5), updates.recv()).await.unwrap().unwrap();
    let second = tokio::time::timeout(Duration::from_secs(5), updates.recv()).await.unwrap().unwrap();
    assert_eq!(first.update_id, 500);
    assert_eq!(second.update_id, 501);

    // Wait for the follow-up poll that checks the offset.
    tokio::time::timeout(Duration::from_secs(5), async {
        while *api.polls.lock().await < 2 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();

    platform.disconnect().await.unwrap();
    assert_eq!(platform.get_connection_status().await.unwrap(), ConnectionStatus::Disconnected);
}
