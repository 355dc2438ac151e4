//! Business logic layer of the online store.
//!
//! Services borrow a request-scoped [`UnitOfWork`](repository::UnitOfWork),
//! translate between entities and transfer objects and turn storage outcomes
//! into [`ServiceError`]s.
//!
//! # Features
//! - [`CrudService`] for every entity kind, parameterized by a [`Resource`].
//! - Login and password checks in [`ClientsService`].
//! - Order pricing in [`OrdersService`] and product cards in [`ProductsService`].

use repository::RepositoryError;
use thiserror::Error;

pub mod clients;
pub mod crud;
pub mod orders;
pub mod password;
pub mod products;
pub mod resource;

pub use clients::ClientsService;
pub use crud::CrudService;
pub use orders::{OrderProductsService, OrdersService};
pub use products::ProductsService;
pub use resource::{
    Categories, Clients, OrderProducts, Orders, Producers, Products, Resource, Suppliers,
};

/// The main error type for all service operations.
///
/// Display strings are sent to API callers as they are.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Lookup by key or login found nothing.
    #[error("{0} not found")]
    NotFound(String),
    /// The insert was rejected or produced no row.
    #[error("Failed to create {0}")]
    CreationFailed(String),
    /// The commit was rejected or affected no rows.
    #[error("Failed to save changes: {0}")]
    SaveFailed(String),
    /// Nothing was deleted.
    #[error("Failed to delete {0}")]
    DeletionFailed(String),
    #[error("Invalid login or password")]
    AuthenticationFailed,
    /// The payload breaks a field rule.
    #[error("Invalid data: {0}")]
    Validation(String),
    /// Work moved to the blocking pool panicked or was cancelled.
    #[error("Background task failed: {0}")]
    Task(String),
    /// A storage operation failed.
    #[error("Storage error: {0}")]
    Repository(#[from] RepositoryError),
}
