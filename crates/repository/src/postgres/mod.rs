//! PostgreSQL implementation of the repository contract.
//!
//! One [`PgUnitOfWork`] owns one pooled connection. Reads run directly on the
//! connection; the first write opens a transaction that stays open until
//! [`UnitOfWork::save_changes`] commits it. Every write runs inside its own
//! savepoint, so a rejected statement leaves earlier staged writes intact and
//! the transaction usable.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use deadpool_postgres::{Object, Pool};
use model::{Category, Client, Order, OrderProduct, Producer, Product, Supplier};
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;
use tracing::{debug, instrument, warn};

use crate::{
    ClientsRepository, OrderProductsRepository, Repository, RepositoryError, UnitOfWork,
    UnitOfWorkFactory, page_window,
};

pub mod tables;

pub use tables::Table;

#[derive(Debug, Default)]
struct TxState {
    open: bool,
    staged: u64,
}

/// A pooled connection plus the transaction bookkeeping of one unit of work.
///
/// Dropped with a transaction still open, it rolls the transaction back on a
/// background task before the connection goes back to the pool.
pub(crate) struct Session {
    conn: Arc<Object>,
    tx: Mutex<TxState>,
}

impl Session {
    fn new(conn: Object) -> Self {
        Self {
            conn: Arc::new(conn),
            tx: Mutex::new(TxState::default()),
        }
    }

    async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, RepositoryError> {
        Ok(self.conn.query(sql, params).await?)
    }

    async fn query_opt(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, RepositoryError> {
        Ok(self.conn.query_opt(sql, params).await?)
    }

    async fn open(&self, state: &mut TxState) -> Result<(), RepositoryError> {
        if !state.open {
            // Marked first: a BEGIN cancelled in flight still needs a rollback.
            state.open = true;
            self.conn.batch_execute("BEGIN").await?;
            debug!("transaction opened");
        }
        Ok(())
    }

    /// Runs a write inside a savepoint and stages the rows it touched.
    async fn write(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, RepositoryError> {
        let mut state = self.tx.lock().await;
        self.open(&mut state).await?;
        self.conn.batch_execute("SAVEPOINT staged_write").await?;
        match self.conn.execute(sql, params).await {
            Ok(rows) => {
                self.conn.batch_execute("RELEASE SAVEPOINT staged_write").await?;
                state.staged += rows;
                Ok(rows)
            }
            Err(err) => {
                self.conn
                    .batch_execute("ROLLBACK TO SAVEPOINT staged_write")
                    .await?;
                Err(err.into())
            }
        }
    }

    /// Same as [`write`](Self::write) for statements with a `RETURNING` clause.
    async fn write_returning(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<Row>, RepositoryError> {
        let mut state = self.tx.lock().await;
        self.open(&mut state).await?;
        self.conn.batch_execute("SAVEPOINT staged_write").await?;
        match self.conn.query_opt(sql, params).await {
            Ok(row) => {
                self.conn.batch_execute("RELEASE SAVEPOINT staged_write").await?;
                if row.is_some() {
                    state.staged += 1;
                }
                Ok(row)
            }
            Err(err) => {
                self.conn
                    .batch_execute("ROLLBACK TO SAVEPOINT staged_write")
                    .await?;
                Err(err.into())
            }
        }
    }

    async fn commit(&self) -> Result<u64, RepositoryError> {
        let mut state = self.tx.lock().await;
        if !state.open {
            return Ok(0);
        }
        let staged = std::mem::take(&mut state.staged);
        state.open = false;
        // A failed COMMIT ends the transaction as well.
        self.conn.batch_execute("COMMIT").await?;
        debug!(staged, "transaction committed");
        Ok(staged)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.tx.get_mut().open {
            return;
        }
        let conn = self.conn.clone();
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    match conn.batch_execute("ROLLBACK").await {
                        Ok(()) => debug!("abandoned transaction rolled back"),
                        Err(err) => warn!(error = %err, "rollback of abandoned transaction failed"),
                    }
                });
            }
            Err(_) => warn!("no runtime to roll back abandoned transaction"),
        }
    }
}

/// SQL text of one table, generated once per repository.
#[derive(Debug, Clone)]
pub(crate) struct Statements {
    select_all: String,
    select_page: String,
    select_one: String,
    insert: String,
    update: String,
    delete: String,
}

fn key_filter(columns: &[&str], first_param: usize) -> String {
    columns
        .iter()
        .enumerate()
        .map(|(i, column)| format!("{column} = ${}", first_param + i))
        .collect::<Vec<_>>()
        .join(" AND ")
}

fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Statements {
    pub(crate) fn for_table<E: Table>() -> Self {
        let table = E::TABLE;
        let columns = E::SELECT_COLUMNS.join(", ");
        let order_by = E::KEY_COLUMNS.join(", ");
        let assignments = E::UPDATE_COLUMNS
            .iter()
            .enumerate()
            .map(|(i, column)| format!("{column} = ${}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");

        Self {
            select_all: format!("SELECT {columns} FROM {table} ORDER BY {order_by}"),
            select_page: format!(
                "SELECT {columns} FROM {table} ORDER BY {order_by} LIMIT $1 OFFSET $2"
            ),
            select_one: format!(
                "SELECT {columns} FROM {table} WHERE {}",
                key_filter(E::KEY_COLUMNS, 1)
            ),
            insert: format!(
                "INSERT INTO {table} ({}) VALUES ({}) RETURNING {columns}",
                E::INSERT_COLUMNS.join(", "),
                placeholders(E::INSERT_COLUMNS.len())
            ),
            update: format!(
                "UPDATE {table} SET {assignments} WHERE {}",
                key_filter(E::KEY_COLUMNS, E::UPDATE_COLUMNS.len() + 1)
            ),
            delete: format!(
                "DELETE FROM {table} WHERE {}",
                key_filter(E::KEY_COLUMNS, 1)
            ),
        }
    }

    /// `SELECT` of all columns filtered by one column, ordered by `order_by`.
    pub(crate) fn select_by<E: Table>(column: &str, order_by: &str) -> String {
        format!(
            "SELECT {} FROM {} WHERE {column} = $1 ORDER BY {order_by}",
            E::SELECT_COLUMNS.join(", "),
            E::TABLE
        )
    }
}

/// # PgRepository
///
/// Generic PostgreSQL repository for any entity implementing [`Table`].
pub struct PgRepository<E: Table> {
    session: Arc<Session>,
    sql: Statements,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Table> PgRepository<E> {
    pub(crate) fn new(session: Arc<Session>) -> Self {
        Self {
            session,
            sql: Statements::for_table::<E>(),
            _entity: PhantomData,
        }
    }

    fn rows_to_entities(rows: Vec<Row>) -> Result<Vec<E>, RepositoryError> {
        rows.iter().map(E::from_row).collect()
    }
}

#[async_trait]
impl<E: Table> Repository<E> for PgRepository<E> {
    #[instrument(skip(self), fields(kind = E::KIND))]
    async fn get_all(&self) -> Result<Vec<E>, RepositoryError> {
        let rows = self.session.query(&self.sql.select_all, &[]).await?;
        Self::rows_to_entities(rows)
    }

    #[instrument(skip(self), fields(kind = E::KIND))]
    async fn get_all_paged(
        &self,
        page: i64,
        page_size: i64,
    ) -> Result<Option<Vec<E>>, RepositoryError> {
        let Some((offset, limit)) = page_window(page, page_size) else {
            return Ok(None);
        };
        let rows = self
            .session
            .query(&self.sql.select_page, &[&limit, &offset])
            .await?;
        Self::rows_to_entities(rows).map(Some)
    }

    #[instrument(skip(self), fields(kind = E::KIND))]
    async fn get_by_key(&self, key: &E::Key) -> Result<Option<E>, RepositoryError> {
        let params = E::key_params(key);
        match self.session.query_opt(&self.sql.select_one, &params).await? {
            Some(row) => E::from_row(&row).map(Some),
            None => Ok(None),
        }
    }

    #[instrument(skip_all, fields(kind = E::KIND))]
    async fn add(&self, entity: E) -> Result<Option<E>, RepositoryError> {
        let params = entity.insert_params();
        let row = self.session.write_returning(&self.sql.insert, &params).await?;
        match row {
            Some(row) => E::from_row(&row).map(Some),
            None => Ok(None),
        }
    }

    #[instrument(skip_all, fields(kind = E::KIND, key = %entity.key()))]
    async fn update(&self, entity: &E) -> Result<(), RepositoryError> {
        let key = entity.key();
        let mut params = entity.update_params();
        params.extend(E::key_params(&key));
        if self.session.write(&self.sql.update, &params).await? == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), fields(kind = E::KIND))]
    async fn delete(&self, key: &E::Key) -> Result<bool, RepositoryError> {
        let params = E::key_params(key);
        Ok(self.session.write(&self.sql.delete, &params).await? > 0)
    }
}

#[async_trait]
impl ClientsRepository for PgRepository<Client> {
    #[instrument(skip(self))]
    async fn get_by_login(&self, login: &str) -> Result<Option<Client>, RepositoryError> {
        let sql = Statements::select_by::<Client>("login", "id");
        match self.session.query_opt(&sql, &[&login]).await? {
            Some(row) => Client::from_row(&row).map(Some),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl OrderProductsRepository for PgRepository<OrderProduct> {
    #[instrument(skip(self))]
    async fn get_all_by_order_id(&self, order_id: i32) -> Result<Vec<OrderProduct>, RepositoryError> {
        let sql = Statements::select_by::<OrderProduct>("order_id", "product_article");
        let rows = self.session.query(&sql, &[&order_id]).await?;
        Self::rows_to_entities(rows)
    }
}

/// # PgUnitOfWork
///
/// All repositories of one request bound to a single pooled connection.
///
/// Dropping it without committing rolls back whatever was staged.
pub struct PgUnitOfWork {
    session: Arc<Session>,
    categories: PgRepository<Category>,
    clients: PgRepository<Client>,
    orders: PgRepository<Order>,
    order_products: PgRepository<OrderProduct>,
    producers: PgRepository<Producer>,
    products: PgRepository<Product>,
    suppliers: PgRepository<Supplier>,
}

impl PgUnitOfWork {
    pub fn new(conn: Object) -> Self {
        let session = Arc::new(Session::new(conn));
        Self {
            categories: PgRepository::new(session.clone()),
            clients: PgRepository::new(session.clone()),
            orders: PgRepository::new(session.clone()),
            order_products: PgRepository::new(session.clone()),
            producers: PgRepository::new(session.clone()),
            products: PgRepository::new(session.clone()),
            suppliers: PgRepository::new(session.clone()),
            session,
        }
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    fn categories(&self) -> &dyn Repository<Category> {
        &self.categories
    }

    fn clients(&self) -> &dyn ClientsRepository {
        &self.clients
    }

    fn orders(&self) -> &dyn Repository<Order> {
        &self.orders
    }

    fn order_products(&self) -> &dyn OrderProductsRepository {
        &self.order_products
    }

    fn producers(&self) -> &dyn Repository<Producer> {
        &self.producers
    }

    fn products(&self) -> &dyn Repository<Product> {
        &self.products
    }

    fn suppliers(&self) -> &dyn Repository<Supplier> {
        &self.suppliers
    }

    async fn save_changes(&self) -> Result<u64, RepositoryError> {
        self.session.commit().await.inspect_err(|err| {
            warn!(error = %err, "commit failed");
        })
    }
}

/// Hands out a [`PgUnitOfWork`] per request from the connection pool.
#[derive(Clone)]
pub struct PgUnitOfWorkFactory {
    pool: Pool,
}

impl PgUnitOfWorkFactory {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UnitOfWorkFactory for PgUnitOfWorkFactory {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepositoryError> {
        let conn = self.pool.get().await?;
        Ok(Box::new(PgUnitOfWork::new(conn)))
    }
}
