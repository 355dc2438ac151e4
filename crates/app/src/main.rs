/// Online Store Backend Application
///
/// This is the main entry point for the online store API service.
/// The application serves REST endpoints for the catalogue (categories,
/// producers, suppliers, products), clients and orders.
///
/// # Architecture
///
/// The application follows a layered architecture with:
/// - Repository layer and unit of work for data access
/// - Service layer for business rules and DTO mapping
/// - API layer for HTTP endpoints and bearer-token authorization
/// - Metrics for monitoring
///
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use app_config::{AppConfig, StorageBackend};
use memstore::MemoryStore;
use model::Role;
use model::dto::ClientCreateDto;
use repository::{PgUnitOfWorkFactory, UnitOfWorkFactory};
use server::Server;
use service::{Clients, ClientsService, CrudService, ServiceError};

/// Initialize the tracing subscriber for logging
fn init_logger() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

/// Connects the configured storage backend.
async fn init_storage(config: &AppConfig) -> Result<Arc<dyn UnitOfWorkFactory>> {
    match config.storage {
        StorageBackend::Postgres => {
            let pool = db::init_db_pool(config)
                .await
                .context("Failed to initialize database")?;
            info!("Database initialized successfully");
            Ok(Arc::new(PgUnitOfWorkFactory::new(pool)))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; data is lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}

/// Creates the configured administrator account unless its login exists.
async fn bootstrap_admin(config: &AppConfig, factory: &dyn UnitOfWorkFactory) -> Result<()> {
    let (Some(login), Some(password)) = (&config.admin_login, &config.admin_password) else {
        return Ok(());
    };
    let uow = factory.begin().await.context("Failed to open unit of work")?;
    match ClientsService::new(uow.as_ref()).get_by_login(login).await {
        Ok(_) => {
            info!(%login, "Administrator account already exists");
            return Ok(());
        }
        Err(ServiceError::NotFound(_)) => {}
        Err(err) => return Err(err).context("Failed to look up administrator"),
    }
    CrudService::<Clients>::new(uow.as_ref())
        .add(ClientCreateDto {
            full_name: "Administrator".to_string(),
            role: Role::Administrator,
            login: login.clone(),
            password: password.clone(),
        })
        .await
        .context("Failed to create administrator")?;
    info!(%login, "Administrator account created");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logger();
    info!("Online store backend starting...");

    // Load configuration
    let config = AppConfig::load().context("Failed to load configuration")?;

    let factory = init_storage(&config).await.inspect_err(|e| {
        error!("Storage is required for the application to function: {:#}", e);
    })?;
    bootstrap_admin(&config, factory.as_ref()).await?;

    let http_server = Server::new(&config, factory)?;
    if let Err(err) = http_server.start().await {
        error!("HTTP server error: {:#}", err);
        return Err(err);
    }

    info!("Application stopped");
    Ok(())
}
