//! Server crate provides the HTTP API of the online store.
//!
//! The API exposes CRUD endpoints for every entity kind, order and product
//! aggregates, bearer-token login, a health check and Prometheus metrics.
//! Every request opens its own unit of work from the configured
//! [`UnitOfWorkFactory`].

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use app_config::AppConfig;
use axum::Router;
use axum::routing::get;
use repository::{UnitOfWork, UnitOfWorkFactory};
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info, warn};

pub mod api;
pub mod auth;
pub mod error;
pub mod metrics;

use auth::JwtManager;
use error::ApiError;
use metrics::Metrics;

/// Application state shared between request handlers
#[derive(Clone)]
pub struct AppState {
    pub factory: Arc<dyn UnitOfWorkFactory>,
    pub jwt: Arc<JwtManager>,
    pub metrics: Arc<Metrics>,
    /// Page size used when only `page` is given.
    pub default_page_size: i64,
}

impl AppState {
    pub fn new(cfg: &AppConfig, factory: Arc<dyn UnitOfWorkFactory>) -> Result<Self> {
        let metrics = Metrics::new().context("Failed to register metrics")?;
        Ok(Self {
            factory,
            jwt: Arc::new(JwtManager::from_config(cfg)),
            metrics: Arc::new(metrics),
            default_page_size: cfg.default_page_size,
        })
    }

    /// Opens the unit of work of one request.
    pub async fn begin(&self) -> Result<Box<dyn UnitOfWork>, ApiError> {
        Ok(self.factory.begin().await?)
    }
}

/// Builds the complete router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/metrics", get(metrics::handle_metrics))
        .merge(api::routes())
        .route_layer(axum::middleware::from_fn_with_state(
            state.metrics.clone(),
            metrics::track,
        ))
        .with_state(state)
}

async fn handle_health() -> &'static str {
    "OK"
}

/// Server represents the HTTP server of the store API.
pub struct Server {
    port: u16,
    shutdown_timeout: Duration,
    state: AppState,
}

impl Server {
    /// Creates a new Server instance.
    ///
    /// # Arguments
    ///
    /// * `cfg` - Loaded configuration (port, tokens, paging, shutdown timeout)
    /// * `factory` - Source of per-request units of work
    pub fn new(cfg: &AppConfig, factory: Arc<dyn UnitOfWorkFactory>) -> Result<Self> {
        info!("Initializing HTTP server on port {}", cfg.http_port);
        Ok(Self {
            port: cfg.http_port,
            shutdown_timeout: cfg.shutdown_timeout,
            state: AppState::new(cfg, factory)?,
        })
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Starts the server and blocks until it's shut down.
    ///
    /// After a shutdown signal, in-flight requests get `shutdown_timeout` to
    /// finish.
    pub async fn start(&self) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", self.port))
            .await
            .context("Failed to bind to port")?;
        info!("HTTP server listening on port {}", self.port);

        let stopping = Arc::new(Notify::new());
        let signal = {
            let stopping = stopping.clone();
            async move {
                shutdown_signal().await;
                stopping.notify_one();
            }
        };
        let serve = axum::serve(listener, self.router())
            .with_graceful_shutdown(signal)
            .into_future();
        let deadline = async {
            stopping.notified().await;
            tokio::time::sleep(self.shutdown_timeout).await;
        };

        tokio::select! {
            result = serve => result.context("Server error")?,
            _ = deadline => warn!("Graceful shutdown timed out after {:?}", self.shutdown_timeout),
        }

        info!("HTTP server shut down");
        Ok(())
    }
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
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

    info!("Shutdown signal received");
}
