//! Stub notification backend for end-to-end tests.
//!
//! Each test gets an isolated in-process server with its own notification
//! state, a switch to fail mutations, and a handle to emit push frames to
//! connected sockets.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, put};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use flowdesk_notify::Notification;

use super::TEST_TOKEN;

const SERVER_READY_TIMEOUT_MS: u64 = 5000;
const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

struct AppState {
    notifications: Mutex<Vec<Notification>>,
    fail_mutations: AtomicBool,
    push_tx: broadcast::Sender<String>,
    ws_close_tx: broadcast::Sender<()>,
}

/// Test server instance with isolated notification state
///
/// When dropped, the server gracefully shuts down.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    state: Arc<AppState>,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port, seeded with the given
    /// notifications.
    pub async fn spawn(seed: Vec<Notification>) -> Self {
        // RUST_LOG controls client/server log output when debugging tests
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();

        let (push_tx, _) = broadcast::channel(64);
        let (ws_close_tx, _) = broadcast::channel(4);
        let state = Arc::new(AppState {
            notifications: Mutex::new(seed),
            fail_mutations: AtomicBool::new(false),
            push_tx,
            ws_close_tx,
        });

        let app = Router::new()
            .route("/notifications", get(list_notifications))
            .route("/notifications/unread", get(list_unread))
            .route("/notifications/stats", get(get_stats))
            .route("/notifications/read-all", put(mark_all_read))
            .route("/notifications/{id}/read", put(mark_read))
            .route("/notifications/{id}", delete(delete_notification))
            .route("/notifications/ws", get(ws_handler))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            state,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Make every mutation endpoint return a 500.
    pub fn set_fail_mutations(&self, fail: bool) {
        self.state.fail_mutations.store(fail, Ordering::SeqCst);
    }

    /// Current server-side notification state.
    pub fn notifications(&self) -> Vec<Notification> {
        self.state.notifications.lock().unwrap().clone()
    }

    /// Drop every open socket server-side, as if the connection was lost.
    pub fn drop_ws_connections(&self) {
        let _ = self.state.ws_close_tx.send(());
    }

    /// Remove a notification server-side without announcing it.
    pub fn remove_notification_silently(&self, id: &str) {
        self.state
            .notifications
            .lock()
            .unwrap()
            .retain(|n| n.id != id);
    }

    /// Add a notification server-side without announcing it, as if it
    /// happened while this client was offline.
    pub fn add_notification_silently(&self, notification: Notification) {
        self.state
            .notifications
            .lock()
            .unwrap()
            .insert(0, notification);
    }

    /// Mark a notification read server-side without announcing it.
    pub fn mark_read_silently(&self, id: &str) {
        if let Some(n) = self
            .state
            .notifications
            .lock()
            .unwrap()
            .iter_mut()
            .find(|n| n.id == id)
        {
            n.read = true;
        }
    }

    /// Send a raw text frame to every connected socket.
    pub fn push_raw(&self, text: &str) {
        // No subscribers is fine, the test may connect later
        let _ = self.state.push_tx.send(text.to_string());
    }

    /// Add a notification server-side and announce it over the socket.
    pub fn push_new(&self, notification: Notification) {
        let frame = json!({
            "type": "notification:new",
            "payload": notification,
        });
        self.state
            .notifications
            .lock()
            .unwrap()
            .insert(0, notification);
        self.push_raw(&frame.to_string());
    }

    /// Mark a notification read server-side and announce it.
    pub fn push_read(&self, id: &str) {
        if let Some(n) = self
            .state
            .notifications
            .lock()
            .unwrap()
            .iter_mut()
            .find(|n| n.id == id)
        {
            n.read = true;
        }
        self.push_raw(&json!({"type": "notification:read", "payload": {"id": id}}).to_string());
    }

    /// Delete a notification server-side and announce it.
    pub fn push_deleted(&self, id: &str) {
        self.state
            .notifications
            .lock()
            .unwrap()
            .retain(|n| n.id != id);
        self.push_raw(&json!({"type": "notification:deleted", "payload": {"id": id}}).to_string());
    }

    /// Waits for the server to become ready by polling the list endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client
                .get(format!("{}/notifications", self.base_url))
                .bearer_auth(TEST_TOKEN)
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => {
                    return;
                }
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({"error": {"message": message}}))).into_response()
}

fn check_auth(headers: &HeaderMap) -> Result<(), Response> {
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TEST_TOKEN))
        .unwrap_or(false);
    if authorized {
        Ok(())
    } else {
        Err(error_response(StatusCode::UNAUTHORIZED, "invalid token"))
    }
}

fn check_mutations(state: &AppState) -> Result<(), Response> {
    if state.fail_mutations.load(Ordering::SeqCst) {
        Err(error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "injected failure",
        ))
    } else {
        Ok(())
    }
}

async fn list_notifications(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Err(response) = check_auth(&headers) {
        return response;
    }
    let items: Vec<Notification> = state
        .notifications
        .lock()
        .unwrap()
        .iter()
        .filter(|n| {
            params
                .get("read")
                .map(|r| n.read.to_string() == *r)
                .unwrap_or(true)
        })
        .filter(|n| {
            params
                .get("type")
                .map(|t| n.notification_type.as_str() == t)
                .unwrap_or(true)
        })
        .filter(|n| {
            params
                .get("search")
                .map(|s| {
                    let s = s.to_lowercase();
                    n.title.to_lowercase().contains(&s) || n.message.to_lowercase().contains(&s)
                })
                .unwrap_or(true)
        })
        .cloned()
        .collect();
    Json(json!({"data": items})).into_response()
}

async fn list_unread(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(response) = check_auth(&headers) {
        return response;
    }
    let items: Vec<Notification> = state
        .notifications
        .lock()
        .unwrap()
        .iter()
        .filter(|n| !n.read)
        .cloned()
        .collect();
    let count = items.len();
    Json(json!({"data": items, "count": count})).into_response()
}

async fn get_stats(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(response) = check_auth(&headers) {
        return response;
    }
    let items = state.notifications.lock().unwrap();
    let mut by_type: HashMap<&'static str, usize> = HashMap::new();
    for n in items.iter() {
        *by_type.entry(n.notification_type.as_str()).or_insert(0) += 1;
    }
    Json(json!({
        "total": items.len(),
        "unread": items.iter().filter(|n| !n.read).count(),
        "by_type": by_type,
    }))
    .into_response()
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(response) = check_auth(&headers) {
        return response;
    }
    if let Err(response) = check_mutations(&state) {
        return response;
    }
    let mut items = state.notifications.lock().unwrap();
    match items.iter_mut().find(|n| n.id == id) {
        Some(n) => {
            n.read = true;
            StatusCode::NO_CONTENT.into_response()
        }
        None => error_response(StatusCode::NOT_FOUND, "notification not found"),
    }
}

async fn mark_all_read(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Err(response) = check_auth(&headers) {
        return response;
    }
    if let Err(response) = check_mutations(&state) {
        return response;
    }
    let mut items = state.notifications.lock().unwrap();
    let mut updated = 0;
    for n in items.iter_mut().filter(|n| !n.read) {
        n.read = true;
        updated += 1;
    }
    Json(json!({"updated": updated})).into_response()
}

async fn delete_notification(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(response) = check_auth(&headers) {
        return response;
    }
    if let Err(response) = check_mutations(&state) {
        return response;
    }
    let mut items = state.notifications.lock().unwrap();
    let before = items.len();
    items.retain(|n| n.id != id);
    if items.len() < before {
        StatusCode::NO_CONTENT.into_response()
    } else {
        error_response(StatusCode::NOT_FOUND, "notification not found")
    }
}

async fn ws_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    if params.get("token").map(String::as_str) != Some(TEST_TOKEN) {
        return error_response(StatusCode::UNAUTHORIZED, "invalid token");
    }
    let mut push_rx = state.push_tx.subscribe();
    let mut close_rx = state.ws_close_tx.subscribe();
    ws.on_upgrade(move |mut socket| async move {
        loop {
            tokio::select! {
                frame = push_rx.recv() => match frame {
                    Ok(text) => {
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                },
                // Dropping the socket simulates a lost connection
                _ = close_rx.recv() => break,
                incoming = socket.recv() => match incoming {
                    // Client frames are ignored by the stub
                    Some(Ok(_)) => {}
                    _ => break,
                },
            }
        }
    })
}
