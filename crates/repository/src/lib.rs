//! # Data Repository Layer
//!
//! This crate defines the storage contract of the online store:
//! a generic [`Repository`] per entity kind, two specialized repositories
//! with extra lookups, and the [`UnitOfWork`] that groups all repositories
//! behind one commit operation.
//!
//! The [`postgres`] module implements the contract on top of a deadpool
//! connection pool. Other backends (see the `memstore` crate) implement the
//! same traits.

use async_trait::async_trait;
use model::{Category, Client, Entity, Order, OrderProduct, Producer, Product, Supplier};
use thiserror::Error;
use tokio_postgres::error::SqlState;

pub mod postgres;

pub use postgres::{PgRepository, PgUnitOfWork, PgUnitOfWorkFactory};

/// # RepositoryError
///
/// Error types that can occur during repository operations.
///
/// Constraint violations reported by the store are split out of the generic
/// database error so that callers can tell a duplicate key or a dangling
/// reference from an infrastructure failure.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database-related errors, wrapping the underlying PostgreSQL error
    #[error("Database error: {0}")]
    Db(tokio_postgres::Error),
    /// Failed to obtain a connection from the pool.
    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),
    /// A row with the same primary or unique key already exists.
    #[error("Duplicate key: {0}")]
    Conflict(String),
    /// A foreign-key, check or not-null constraint rejected the write.
    #[error("Constraint violation: {0}")]
    Constraint(String),
    /// The row addressed by a write no longer exists.
    #[error("Not found")]
    NotFound,
}

impl From<tokio_postgres::Error> for RepositoryError {
    fn from(err: tokio_postgres::Error) -> Self {
        let Some(db) = err.as_db_error() else {
            return RepositoryError::Db(err);
        };
        let detail = db.detail().unwrap_or(db.message()).to_string();
        let code = db.code();
        if *code == SqlState::UNIQUE_VIOLATION {
            RepositoryError::Conflict(detail)
        } else if *code == SqlState::FOREIGN_KEY_VIOLATION
            || *code == SqlState::CHECK_VIOLATION
            || *code == SqlState::NOT_NULL_VIOLATION
        {
            RepositoryError::Constraint(detail)
        } else {
            RepositoryError::Db(err)
        }
    }
}

/// Converts a 1-based page number and a page size into `(offset, limit)`.
///
/// Returns `None` when either argument is below 1.
pub fn page_window(page: i64, page_size: i64) -> Option<(i64, i64)> {
    if page < 1 || page_size < 1 {
        return None;
    }
    Some(((page - 1).saturating_mul(page_size), page_size))
}

/// # Repository
///
/// Generic data accessor for one entity kind.
///
/// Listings are ordered by primary key so that pages are stable. Writes are
/// staged in the owning [`UnitOfWork`] and become durable only after
/// [`UnitOfWork::save_changes`].
#[async_trait]
pub trait Repository<E: Entity>: Send + Sync {
    async fn get_all(&self) -> Result<Vec<E>, RepositoryError>;

    /// One page of the listing; `None` when `page < 1` or `page_size < 1`.
    async fn get_all_paged(&self, page: i64, page_size: i64) -> Result<Option<Vec<E>>, RepositoryError>;

    async fn get_by_key(&self, key: &E::Key) -> Result<Option<E>, RepositoryError>;

    /// Inserts the entity and returns it as stored, with a generated key
    /// when the entity kind has one.
    async fn add(&self, entity: E) -> Result<Option<E>, RepositoryError>;

    /// Overwrites the mutable columns of the row addressed by `entity.key()`.
    async fn update(&self, entity: &E) -> Result<(), RepositoryError>;

    /// Returns `false` when no row had the key.
    async fn delete(&self, key: &E::Key) -> Result<bool, RepositoryError>;
}

/// # ClientsRepository
///
/// Client accessor with the login lookup used by authentication.
#[async_trait]
pub trait ClientsRepository: Repository<Client> {
    async fn get_by_login(&self, login: &str) -> Result<Option<Client>, RepositoryError>;
}

/// # OrderProductsRepository
///
/// Order-line accessor with a per-order listing.
#[async_trait]
pub trait OrderProductsRepository: Repository<OrderProduct> {
    /// Lines of one order ordered by product article.
    async fn get_all_by_order_id(&self, order_id: i32) -> Result<Vec<OrderProduct>, RepositoryError>;
}

/// # UnitOfWork
///
/// All repositories of one request, sharing a single transaction.
///
/// A unit of work dropped without [`save_changes`](UnitOfWork::save_changes)
/// discards everything staged through its repositories.
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    fn categories(&self) -> &dyn Repository<Category>;
    fn clients(&self) -> &dyn ClientsRepository;
    fn orders(&self) -> &dyn Repository<Order>;
    fn order_products(&self) -> &dyn OrderProductsRepository;
    fn producers(&self) -> &dyn Repository<Producer>;
    fn products(&self) -> &dyn Repository<Product>;
    fn suppliers(&self) -> &dyn Repository<Supplier>;

    /// Commits staged writes and returns the number of rows they touched.
    ///
    /// Returns `0` when nothing was staged since the previous commit.
    async fn save_changes(&self) -> Result<u64, RepositoryError>;
}

/// Creates a fresh [`UnitOfWork`] for every request.
#[async_trait]
pub trait UnitOfWorkFactory: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepositoryError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_window() {
        assert_eq!(page_window(1, 5), Some((0, 5)));
        assert_eq!(page_window(3, 10), Some((20, 10)));
    }

    #[test]
    fn test_page_window_rejects_non_positive_arguments() {
        assert_eq!(page_window(0, 5), None);
        assert_eq!(page_window(1, 0), None);
        assert_eq!(page_window(-2, -2), None);
    }

    #[test]
    fn test_page_window_saturates() {
        assert_eq!(page_window(i64::MAX, 2), Some((i64::MAX, 2)));
    }
}
