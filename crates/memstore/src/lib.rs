//! In-memory storage backend with thread-safe access.
//!
//! [`MemoryStore`] keeps every table behind one async `RwLock` and implements
//! [`UnitOfWorkFactory`]. Each [`MemoryUnitOfWork`] works on a private
//! snapshot: writes are validated against the snapshot immediately and logged,
//! and [`UnitOfWork::save_changes`] replays the log on the latest shared state
//! before publishing it. Nothing staged is visible to other units of work
//! until then.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use async_trait::async_trait;
use model::{Category, Client, Order, OrderProduct, Producer, Product, Supplier};
use repository::{
    ClientsRepository, OrderProductsRepository, Repository, RepositoryError, UnitOfWork,
    UnitOfWorkFactory, page_window,
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, instrument};

pub mod tables;

pub use tables::{MemTable, Stored, Tables};

type Op = Box<dyn FnOnce(&mut Tables) -> Result<(), RepositoryError> + Send>;

/// Id counters shared by all units of work; ids are never reused.
#[derive(Debug, Default)]
struct Sequences {
    next: StdMutex<HashMap<&'static str, i32>>,
}

impl Sequences {
    fn next(&self, kind: &'static str) -> i32 {
        let mut next = self.next.lock().unwrap_or_else(PoisonError::into_inner);
        let id = next.entry(kind).or_insert(0);
        *id += 1;
        *id
    }
}

/// Thread-safe in-memory store.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<Tables>>,
    sequences: Arc<Sequences>,
}

impl MemoryStore {
    /// Create a new, empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a unit of work on a snapshot of the current state.
    pub async fn unit_of_work(&self) -> MemoryUnitOfWork {
        let snapshot = self.inner.read().await.clone();
        MemoryUnitOfWork::new(self.clone(), snapshot)
    }
}

#[async_trait]
impl UnitOfWorkFactory for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, RepositoryError> {
        Ok(Box::new(self.unit_of_work().await))
    }
}

#[derive(Default)]
struct Working {
    tables: Tables,
    ops: Vec<Op>,
    staged: u64,
}

impl Working {
    fn stage(&mut self, op: Op) {
        self.ops.push(op);
        self.staged += 1;
    }
}

/// Repository over the working snapshot of one unit of work.
pub struct MemRepository<E: Stored> {
    working: Arc<Mutex<Working>>,
    sequences: Arc<Sequences>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Stored> MemRepository<E> {
    fn new(working: Arc<Mutex<Working>>, sequences: Arc<Sequences>) -> Self {
        Self {
            working,
            sequences,
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<E: Stored> Repository<E> for MemRepository<E> {
    async fn get_all(&self) -> Result<Vec<E>, RepositoryError> {
        let working = self.working.lock().await;
        Ok(E::table(&working.tables).values().cloned().collect())
    }

    async fn get_all_paged(
        &self,
        page: i64,
        page_size: i64,
    ) -> Result<Option<Vec<E>>, RepositoryError> {
        let Some((offset, limit)) = page_window(page, page_size) else {
            return Ok(None);
        };
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        let working = self.working.lock().await;
        Ok(Some(
            E::table(&working.tables)
                .values()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect(),
        ))
    }

    async fn get_by_key(&self, key: &E::Key) -> Result<Option<E>, RepositoryError> {
        let working = self.working.lock().await;
        Ok(E::table(&working.tables).get(key).cloned())
    }

    #[instrument(skip_all, fields(kind = E::KIND))]
    async fn add(&self, mut entity: E) -> Result<Option<E>, RepositoryError> {
        if E::GENERATED_KEY {
            entity.set_generated_key(self.sequences.next(E::KIND));
        }
        let mut working = self.working.lock().await;
        tables::insert(&mut working.tables, entity.clone())?;
        let logged = entity.clone();
        working.stage(Box::new(move |t: &mut Tables| tables::insert(t, logged)));
        debug!(key = %entity.key(), "staged insert");
        Ok(Some(entity))
    }

    #[instrument(skip_all, fields(kind = E::KIND, key = %entity.key()))]
    async fn update(&self, entity: &E) -> Result<(), RepositoryError> {
        let mut working = self.working.lock().await;
        tables::replace(&mut working.tables, entity.clone())?;
        let logged = entity.clone();
        working.stage(Box::new(move |t: &mut Tables| tables::replace(t, logged)));
        Ok(())
    }

    #[instrument(skip(self), fields(kind = E::KIND))]
    async fn delete(&self, key: &E::Key) -> Result<bool, RepositoryError> {
        let mut working = self.working.lock().await;
        if !tables::remove::<E>(&mut working.tables, key)? {
            return Ok(false);
        }
        let logged = key.clone();
        // Already gone at commit time counts as deleted.
        working.stage(Box::new(move |t: &mut Tables| tables::remove::<E>(t, &logged).map(|_| ())));
        Ok(true)
    }
}

#[async_trait]
impl ClientsRepository for MemRepository<Client> {
    async fn get_by_login(&self, login: &str) -> Result<Option<Client>, RepositoryError> {
        let working = self.working.lock().await;
        Ok(working
            .tables
            .clients
            .values()
            .find(|client| client.login == login)
            .cloned())
    }
}

#[async_trait]
impl OrderProductsRepository for MemRepository<OrderProduct> {
    async fn get_all_by_order_id(&self, order_id: i32) -> Result<Vec<OrderProduct>, RepositoryError> {
        let working = self.working.lock().await;
        // Keys sort by order id first, then by article.
        Ok(working
            .tables
            .order_products
            .values()
            .filter(|line| line.order_id == order_id)
            .cloned()
            .collect())
    }
}

/// All repositories of one request over a private snapshot of the store.
pub struct MemoryUnitOfWork {
    store: MemoryStore,
    working: Arc<Mutex<Working>>,
    categories: MemRepository<Category>,
    clients: MemRepository<Client>,
    orders: MemRepository<Order>,
    order_products: MemRepository<OrderProduct>,
    producers: MemRepository<Producer>,
    products: MemRepository<Product>,
    suppliers: MemRepository<Supplier>,
}

impl MemoryUnitOfWork {
    fn new(store: MemoryStore, snapshot: Tables) -> Self {
        let working = Arc::new(Mutex::new(Working {
            tables: snapshot,
            ..Working::default()
        }));
        let seq = store.sequences.clone();
        Self {
            categories: MemRepository::new(working.clone(), seq.clone()),
            clients: MemRepository::new(working.clone(), seq.clone()),
            orders: MemRepository::new(working.clone(), seq.clone()),
            order_products: MemRepository::new(working.clone(), seq.clone()),
            producers: MemRepository::new(working.clone(), seq.clone()),
            products: MemRepository::new(working.clone(), seq.clone()),
            suppliers: MemRepository::new(working.clone(), seq),
            working,
            store,
        }
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
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
        let mut working = self.working.lock().await;
        if working.ops.is_empty() {
            return Ok(0);
        }
        let ops = std::mem::take(&mut working.ops);
        let staged = std::mem::take(&mut working.staged);

        let mut shared = self.store.inner.write().await;
        let mut next = shared.clone();
        for op in ops {
            if let Err(err) = op(&mut next) {
                debug!(error = %err, "commit rejected, staged writes discarded");
                working.tables = shared.clone();
                return Err(err);
            }
        }
        *shared = next;
        working.tables = shared.clone();
        debug!(staged, "changes published");
        Ok(staged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use model::Role;
    use rust_decimal::dec;

    fn category(name: &str) -> Category {
        Category {
            id: 0,
            name: name.to_string(),
        }
    }

    async fn seed_catalogue(store: &MemoryStore) {
        let uow = store.unit_of_work().await;
        uow.categories().add(category("Tools")).await.unwrap();
        uow.producers()
            .add(Producer {
                id: 0,
                name: "Acme".to_string(),
            })
            .await
            .unwrap();
        uow.suppliers()
            .add(Supplier {
                id: 0,
                name: "Wholesale".to_string(),
            })
            .await
            .unwrap();
        uow.products()
            .add(Product {
                article: "A1".to_string(),
                category_id: 1,
                producer_id: 1,
                supplier_id: 1,
                name: "Hammer".to_string(),
                measurement: "pcs".to_string(),
                price: dec!(10.00),
                quantity: 5,
                discount: 0,
                description: String::new(),
                image_name: None,
            })
            .await
            .unwrap();
        assert_eq!(uow.save_changes().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_writes_are_invisible_until_saved() {
        let store = MemoryStore::new();
        let writer = store.unit_of_work().await;
        let added = writer.categories().add(category("Tools")).await.unwrap().unwrap();
        assert_eq!(added.id, 1);
        assert_eq!(writer.categories().get_all().await.unwrap().len(), 1);

        let reader = store.unit_of_work().await;
        assert!(reader.categories().get_all().await.unwrap().is_empty());

        assert_eq!(writer.save_changes().await.unwrap(), 1);
        let reader = store.unit_of_work().await;
        assert_eq!(reader.categories().get_by_key(&1).await.unwrap(), Some(added));
    }

    #[tokio::test]
    async fn test_dropped_unit_of_work_discards_changes() {
        let store = MemoryStore::new();
        {
            let uow = store.unit_of_work().await;
            uow.categories().add(category("Tools")).await.unwrap();
        }
        let uow = store.unit_of_work().await;
        assert!(uow.categories().get_all().await.unwrap().is_empty());
        assert_eq!(uow.save_changes().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_generated_ids_are_not_reused() {
        let store = MemoryStore::new();
        let first = store.unit_of_work().await;
        let a = first.categories().add(category("A")).await.unwrap().unwrap();
        drop(first);
        let second = store.unit_of_work().await;
        let b = second.categories().add(category("B")).await.unwrap().unwrap();
        assert!(b.id > a.id);
    }

    #[tokio::test]
    async fn test_paging_follows_key_order() {
        let store = MemoryStore::new();
        let uow = store.unit_of_work().await;
        for name in ["a", "b", "c", "d", "e"] {
            uow.categories().add(category(name)).await.unwrap();
        }
        let page = uow.categories().get_all_paged(2, 2).await.unwrap().unwrap();
        let ids: Vec<_> = page.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![3, 4]);
        assert!(uow.categories().get_all_paged(4, 2).await.unwrap().unwrap().is_empty());
        assert!(uow.categories().get_all_paged(0, 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_referenced_rows_cannot_be_deleted() {
        let store = MemoryStore::new();
        seed_catalogue(&store).await;
        let uow = store.unit_of_work().await;
        let result = uow.categories().delete(&1).await;
        assert!(matches!(result, Err(RepositoryError::Constraint(_))));
        assert!(!uow.categories().delete(&42).await.unwrap());
    }

    #[tokio::test]
    async fn test_conflicting_commits() {
        let store = MemoryStore::new();
        seed_catalogue(&store).await;
        let client = Client {
            id: 0,
            full_name: "Alice".to_string(),
            role: Role::Customer,
            login: "alice".to_string(),
            password_hash: "x".to_string(),
        };

        let first = store.unit_of_work().await;
        let second = store.unit_of_work().await;
        first.clients().add(client.clone()).await.unwrap();
        second.clients().add(client).await.unwrap();

        assert_eq!(first.save_changes().await.unwrap(), 1);
        let result = second.save_changes().await;
        assert!(matches!(result, Err(RepositoryError::Conflict(_))));

        let uow = store.unit_of_work().await;
        assert_eq!(uow.clients().get_all().await.unwrap().len(), 1);
        assert!(uow.clients().get_by_login("alice").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_order_lines_by_order() {
        let store = MemoryStore::new();
        seed_catalogue(&store).await;
        let uow = store.unit_of_work().await;
        let client = uow
            .clients()
            .add(Client {
                id: 0,
                full_name: "Bob".to_string(),
                role: Role::Customer,
                login: "bob".to_string(),
                password_hash: "x".to_string(),
            })
            .await
            .unwrap()
            .unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let order = uow
            .orders()
            .add(Order {
                id: 0,
                client_id: client.id,
                order_date: date,
                delivery_date: date,
                receive_code: 123,
                status: "New".to_string(),
            })
            .await
            .unwrap()
            .unwrap();
        uow.order_products()
            .add(OrderProduct {
                order_id: order.id,
                product_article: "A1".to_string(),
                amount: 2,
            })
            .await
            .unwrap();
        assert_eq!(uow.save_changes().await.unwrap(), 3);

        let uow = store.unit_of_work().await;
        let lines = uow.order_products().get_all_by_order_id(order.id).await.unwrap();
        assert_eq!(lines.len(), 1);
        assert!(uow.order_products().get_all_by_order_id(999).await.unwrap().is_empty());
    }
}
