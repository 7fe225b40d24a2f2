use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::room::{RoomRegistry, spawn_room_sweeper};
use crate::signaling::{SignalingRouter, ws_handler};
use axum::Router;
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tracing::{error, info};

/// Builds the HTTP surface: `/ws` for signaling channels and `/health`.
pub fn build_app(router: SignalingRouter, allowed_origin: &str) -> Result<Router, ServerError> {
    let origin = HeaderValue::from_str(allowed_origin)
        .map_err(|_| ServerError::InvalidOrigin(allowed_origin.to_owned()))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_credentials(true);

    Ok(Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(cors)
        .with_state(router))
}

async fn health() -> &'static str {
    "ok"
}

pub struct SignalingServer {
    listener: TcpListener,
    app: Router,
    router: SignalingRouter,
    config: ServerConfig,
}

impl SignalingServer {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let addr = config.bind_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        let registry = Arc::new(RoomRegistry::new());
        let router = SignalingRouter::new(registry, config.ice_server_configs());
        let app = build_app(router.clone(), &config.allowed_origin)?;

        Ok(Self {
            listener,
            app,
            router,
            config,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::Serve)
    }

    pub fn router(&self) -> &SignalingRouter {
        &self.router
    }

    /// Serves until `shutdown` resolves. The room sweeper lives as long as the server.
    pub async fn serve<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let sweeper = spawn_room_sweeper(
            self.router.registry().clone(),
            self.config.sweep_interval(),
        );

        let result = axum::serve(self.listener, self.app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(ServerError::Serve);

        sweeper.abort();
        result
    }
}

/// Resolves on SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, shutting down"),
            Err(e) => {
                error!("Failed to listen for SIGINT: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, shutting down");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
