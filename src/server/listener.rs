use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::http::connection::{Connection, ConnectionSettings};
use crate::routing::Router;

/// Binds the configured address and serves until the task is dropped.
pub async fn run(cfg: &Config, router: Arc<Router>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&cfg.server.listen_addr).await?;
    info!("Listening on {}", listener.local_addr()?);

    let settings = ConnectionSettings {
        limits: cfg.limits,
        idle_timeout: cfg.server.idle_timeout(),
    };
    serve(listener, router, settings).await
}

/// Accept loop. Each connection runs on its own task, so a failing or
/// panicking connection never takes the listener down.
pub async fn serve(
    listener: TcpListener,
    router: Arc<Router>,
    settings: ConnectionSettings,
) -> anyhow::Result<()> {
    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!(error = %e, "accept failed");
                continue;
            }
        };
        info!("Accepted connection from {}", peer);
        let _ = socket.set_nodelay(true);

        let router = Arc::clone(&router);
        let settings = settings.clone();
        tokio::spawn(async move {
            let mut conn = Connection::new(socket, router, &settings).with_peer(peer);
            if let Err(e) = conn.run().await {
                error!("Connection error from {}: {}", peer, e);
            }
            debug!(%peer, "connection closed");
        });
    }
}
