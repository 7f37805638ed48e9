//! WebSocket push channel with automatic reconnection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::backoff::ReconnectPolicy;
use super::messages::{Frame, PushEvent};

const EVENT_CHANNEL_CAPACITY: usize = 256;
const OUTBOUND_CHANNEL_CAPACITY: usize = 32;

/// Connection lifecycle of the push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection. `exhausted` is true when the reconnect budget ran out;
    /// only a new `connect()` call leaves that state.
    Disconnected { exhausted: bool },
    /// A connection attempt is in flight. `attempt` counts consecutive
    /// failed attempts, so it is zero on the first try and on the retry
    /// following every successful connection.
    Connecting { attempt: u32 },
    Connected,
}

/// Client for the server's notification WebSocket.
///
/// `connect()` starts a background task that owns the socket and keeps it
/// alive across drops, backing off per the `ReconnectPolicy` until either
/// the socket connects or the attempt budget is exhausted. Decoded events
/// fan out over a broadcast channel; the connection lifecycle is observable
/// through a watch channel.
pub struct PushChannel {
    url: String,
    policy: ReconnectPolicy,
    event_tx: broadcast::Sender<PushEvent>,
    state_tx: watch::Sender<ConnectionState>,
    running: AtomicBool,
    session: Mutex<Option<CancellationToken>>,
    outbound: Mutex<Option<mpsc::Sender<Frame>>>,
}

impl PushChannel {
    /// Create a new PushChannel. Does not connect.
    pub fn new(url: String, policy: ReconnectPolicy) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected { exhausted: false });
        Self {
            url,
            policy,
            event_tx,
            state_tx,
            running: AtomicBool::new(false),
            session: Mutex::new(None),
            outbound: Mutex::new(None),
        }
    }

    /// Subscribe to decoded push events.
    pub fn subscribe(&self) -> broadcast::Receiver<PushEvent> {
        self.event_tx.subscribe()
    }

    /// Observe the connection lifecycle.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        *self.state_tx.borrow() == ConnectionState::Connected
    }

    /// Start the connection task. Calling while already running is a no-op,
    /// so racing callers cannot spawn a second socket.
    pub fn connect(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            debug!("push channel already running");
            return;
        }
        let shutdown = CancellationToken::new();
        *self.session.lock().unwrap() = Some(shutdown.clone());

        let channel = self.clone();
        tokio::spawn(async move {
            channel.run(shutdown).await;
        });
    }

    /// Stop the connection task and close the socket. Idempotent.
    pub fn disconnect(&self) {
        if let Some(token) = self.session.lock().unwrap().take() {
            info!("push channel disconnecting");
            token.cancel();
        }
    }

    /// Fire-and-forget outbound frame. Dropped with a warning when the
    /// socket is down or the outbound queue is full.
    pub fn send(&self, frame: Frame) {
        let sender = self.outbound.lock().unwrap().clone();
        match sender {
            Some(tx) => {
                if let Err(e) = tx.try_send(frame) {
                    warn!("dropping outbound frame: {}", e);
                }
            }
            None => warn!("push channel not connected, dropping outbound frame"),
        }
    }

    async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        info!(url = %self.url, "push channel starting");
        let mut failures: u32 = 0;

        loop {
            self.state_tx
                .send_replace(ConnectionState::Connecting { attempt: failures });

            let established = tokio::select! {
                established = self.run_session() => established,
                _ = shutdown.cancelled() => {
                    break;
                }
            };
            *self.outbound.lock().unwrap() = None;

            if established {
                // A session that connected and later dropped starts the
                // backoff schedule over
                failures = 0;
            } else {
                failures += 1;
                if !self.policy.should_retry(failures) {
                    warn!(
                        attempts = failures,
                        "push channel reconnect budget exhausted"
                    );
                    self.state_tx
                        .send_replace(ConnectionState::Disconnected { exhausted: true });
                    break;
                }
            }

            let delay = self.policy.delay(failures.saturating_sub(1));
            self.state_tx
                .send_replace(ConnectionState::Disconnected { exhausted: false });
            debug!(
                failures,
                delay_ms = delay.as_millis() as u64,
                "push channel backing off"
            );

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.cancelled() => {
                    break;
                }
            }
        }

        *self.outbound.lock().unwrap() = None;
        if !matches!(
            *self.state_tx.borrow(),
            ConnectionState::Disconnected { exhausted: true }
        ) {
            self.state_tx
                .send_replace(ConnectionState::Disconnected { exhausted: false });
        }
        self.running.store(false, Ordering::SeqCst);
        info!("push channel stopped");
    }

    /// Run one socket session. Returns true if the connection was
    /// established, regardless of how it ended.
    async fn run_session(&self) -> bool {
        let (ws_stream, _) = match connect_async(&self.url).await {
            Ok(ok) => ok,
            Err(e) => {
                warn!("push channel connection failed: {}", e);
                return false;
            }
        };

        info!("push channel connected");
        self.state_tx.send_replace(ConnectionState::Connected);

        let (mut write, mut read) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::channel::<Frame>(OUTBOUND_CHANNEL_CAPACITY);
        *self.outbound.lock().unwrap() = Some(out_tx);

        loop {
            tokio::select! {
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.handle_text(&text),
                    Some(Ok(Message::Ping(data))) => {
                        if let Err(e) = write.send(Message::Pong(data)).await {
                            error!("failed to send pong: {}", e);
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        info!("push channel closed by server");
                        break;
                    }
                    Some(Err(e)) => {
                        error!("push channel socket error: {}", e);
                        break;
                    }
                    None => {
                        info!("push channel stream ended");
                        break;
                    }
                    _ => {}
                },
                frame = out_rx.recv() => {
                    // The sender half lives in self, so recv never yields None here
                    if let Some(frame) = frame {
                        match serde_json::to_string(&frame) {
                            Ok(text) => {
                                if let Err(e) = write.send(Message::Text(text.into())).await {
                                    error!("failed to send frame: {}", e);
                                    break;
                                }
                            }
                            Err(e) => warn!("failed to encode outbound frame: {}", e),
                        }
                    }
                }
            }
        }

        *self.outbound.lock().unwrap() = None;
        true
    }

    fn handle_text(&self, text: &str) {
        match PushEvent::parse(text) {
            Ok(Some(event)) => {
                debug!("received push event: {:?}", event);
                if self.event_tx.send(event).is_err() {
                    debug!("no subscribers for push event");
                }
            }
            Ok(None) => debug!("ignoring unknown frame type"),
            Err(e) => warn!("dropping malformed push frame: {}", e),
        }
    }
}

/// Derive the push socket address from the HTTP base URL.
///
/// `http` maps to `ws` and `https` to `wss`; the auth token rides in the
/// query string because browsers cannot set headers on socket upgrades and
/// the server accepts both conventions.
pub fn derive_ws_url(base_url: &str, ws_path: &str, token: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let base = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    let path = if ws_path.starts_with('/') {
        ws_path.to_string()
    } else {
        format!("/{}", ws_path)
    };
    format!("{}{}?token={}", base, path, urlencoding::encode(token))
}
