mod lobby;

use std::{
    future::Future,
    net::SocketAddr,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio::{net::TcpListener, sync::broadcast};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, info, warn};

use crate::protocol::encode_count;

pub use lobby::{Lobby, PlayerId};

struct AppState {
    broadcaster: broadcast::Sender<String>,
    lobby: Mutex<Lobby>,
}

impl AppState {
    fn lobby(&self) -> MutexGuard<'_, Lobby> {
        self.lobby.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Must be called with the lobby guard held, so broadcasts go out in the
    /// same order as the joins and leaves that produced them.
    fn announce(&self, _lobby: &MutexGuard<'_, Lobby>, count: usize) {
        if let Ok(payload) = encode_count(count) {
            // No receivers just means nobody is listening yet.
            let _ = self.broadcaster.send(payload);
        }
    }
}

pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

pub async fn run(config: ServerConfig) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", config.host, config.port))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "count server listening (Ctrl+C to stop)");
    serve(listener, shutdown_signal()).await
}

/// Serves the count stream on an already bound listener.
pub async fn serve(
    listener: TcpListener,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let (tx, _) = broadcast::channel::<String>(512);
    let state = Arc::new(AppState {
        broadcaster: tx,
        lobby: Mutex::new(Lobby::new()),
    });
    let router = Router::new().route("/", get(upgrade)).with_state(state);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down count server");
}

async fn upgrade(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| player_session(socket, state))
}

async fn player_session(socket: WebSocket, state: Arc<AppState>) {
    // Subscribe before joining so the newcomer hears its own arrival.
    let mut updates = BroadcastStream::new(state.broadcaster.subscribe());
    let id = {
        let mut lobby = state.lobby();
        let (id, count) = lobby.join();
        state.announce(&lobby, count);
        info!(player = %id, count, "player joined");
        id
    };

    let (mut outbound, mut inbound) = socket.split();
    loop {
        tokio::select! {
            update = updates.next() => match update {
                Some(Ok(payload)) => {
                    if outbound.send(Message::Text(payload)).await.is_err() {
                        break;
                    }
                }
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    warn!(player = %id, skipped, "player fell behind on count updates");
                }
                None => break,
            },
            message = inbound.next() => match message {
                Some(Ok(Message::Text(text))) => inspect_client_frame(id, text.as_bytes()),
                Some(Ok(Message::Binary(bytes))) => inspect_client_frame(id, &bytes),
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    warn!(player = %id, error = %err, "socket error");
                    break;
                }
            },
        }
    }

    let mut lobby = state.lobby();
    if let Some(count) = lobby.leave(id) {
        state.announce(&lobby, count);
        info!(player = %id, count, "player left");
    }
}

/// Clients have nothing to say yet; frames are only checked for being JSON.
fn inspect_client_frame(id: PlayerId, payload: &[u8]) {
    match serde_json::from_slice::<serde_json::Value>(payload) {
        Ok(value) => debug!(player = %id, %value, "client frame"),
        Err(err) => warn!(player = %id, error = %err, "malformed client frame"),
    }
}
