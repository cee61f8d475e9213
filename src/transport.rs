//! WebSocket client side of the count stream.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use crate::session::Frame;

/// Connects to `url` and forwards every data frame into `frames`.
///
/// Always finishes by queueing `Frame::Closed`, unless the session has
/// already gone away.
pub async fn connect(url: &str, frames: mpsc::Sender<Frame>) -> Result<()> {
    let (mut socket, _) = match connect_async(url).await {
        Ok(connected) => connected,
        Err(err) => {
            let _ = frames.send(Frame::Closed).await;
            return Err(err).with_context(|| format!("Failed to connect to {url}"));
        }
    };
    info!(url, "connected to count server");

    while let Some(message) = socket.next().await {
        let frame = match message {
            Ok(Message::Text(text)) => Frame::Text(text),
            Ok(Message::Binary(bytes)) => Frame::Binary(bytes),
            Ok(Message::Close(reason)) => {
                debug!(?reason, "server closed the socket");
                break;
            }
            Ok(_) => continue,
            Err(err) => {
                warn!(error = %err, "socket error");
                break;
            }
        };
        if frames.send(frame).await.is_err() {
            debug!("session dropped its queue");
            return Ok(());
        }
    }

    let _ = frames.send(Frame::Closed).await;
    info!(url, "disconnected from count server");
    Ok(())
}
