use crate::{create_router, AppState, ENDPOINTS};
use pandora_core::{PandoraConfig, PandoraError, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

pub struct Server {
    state: AppState,
    addr: SocketAddr,
}

impl Server {
    /// Build the server and start the backend's one-time initialization in
    /// the background. Requests are served while a local model loads.
    pub async fn new(config: Arc<PandoraConfig>) -> Result<Self> {
        let addr: SocketAddr = config.server.bind_address().parse().map_err(|e| {
            PandoraError::Config(format!(
                "Invalid bind address {}: {}",
                config.server.bind_address(),
                e
            ))
        })?;

        let state = AppState::from_config(&config)?;

        let backend = Arc::clone(state.pipeline.backend());
        tokio::spawn(async move {
            if let Err(e) = backend.initialize().await {
                error!("Backend {} failed to initialize: {}", backend.backend_name(), e);
            }
        });

        Ok(Self { state, addr })
    }

    pub async fn run(self) -> Result<()> {
        let router = create_router(self.state);

        info!("Starting Pandora API server on {}", self.addr);

        let listener = {
            let socket = if self.addr.is_ipv6() {
                tokio::net::TcpSocket::new_v6()
            } else {
                tokio::net::TcpSocket::new_v4()
            }?;

            let _ = socket.set_reuseaddr(true);
            let _ = socket.set_keepalive(true);

            socket.bind(self.addr)?;
            socket.listen(1024)?
        };

        info!("Server listening on http://{}", self.addr);
        info!("Endpoints: {}", ENDPOINTS.join(", "));

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down gracefully");
        },
        _ = terminate => {
            info!("Received SIGTERM, shutting down gracefully");
        },
    }
}
