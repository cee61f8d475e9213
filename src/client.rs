use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::Config;
use crate::engine::Engine;
use crate::pool::EntityPool;
use crate::session::Session;
use crate::transport;
use crate::world::SimWorld;

/// Headless demo client: steps a `SimWorld` while keeping its pool in step
/// with the counts broadcast by the server.
pub async fn run(config: Config) -> Result<()> {
    let mut pool = EntityPool::new(SimWorld::new(), config.spawn);
    if let Some(player) = &config.local_player {
        let handle = pool
            .grow_with(player)
            .context("Failed to create the local player body")?;
        info!(entity = %handle, "local player spawned");
    }

    let session = Session::new(pool).with_max_count(config.max_count);
    let engine = Engine::new(session.shared(), config.engine_settings());
    let (tx, rx) = mpsc::channel(config.queue_capacity);

    let url = config.server_url.clone();
    let transport_task = tokio::spawn(async move { transport::connect(&url, tx).await });
    let simulation = tokio::spawn(engine.run());

    let finished = tokio::select! {
        stats = session.run(rx) => Some(stats),
        _ = tokio::signal::ctrl_c() => None,
    };
    simulation.abort();

    match finished {
        Some(stats) => {
            info!(applied = stats.applied, rejected = stats.rejected, "client session ended");
            match transport_task.await {
                Ok(Err(err)) => warn!(error = %format!("{err:#}"), "transport failed"),
                Err(err) => warn!(error = %err, "transport task failed"),
                Ok(Ok(())) => {}
            }
        }
        None => {
            info!("shutting down client");
            transport_task.abort();
        }
    }
    Ok(())
}
