//! Table storage and the integrity rules enforced on every write.

use std::collections::BTreeMap;

use model::{
    Category, Client, Entity, Order, OrderProduct, Producer, Product, Supplier,
};
use repository::RepositoryError;

/// Rows of one entity kind ordered by key.
pub type MemTable<E> = BTreeMap<<E as Entity>::Key, E>;

/// All tables of the store.
#[derive(Debug, Clone, Default)]
pub struct Tables {
    pub categories: MemTable<Category>,
    pub clients: MemTable<Client>,
    pub orders: MemTable<Order>,
    pub order_products: MemTable<OrderProduct>,
    pub producers: MemTable<Producer>,
    pub products: MemTable<Product>,
    pub suppliers: MemTable<Supplier>,
}

/// An entity kind kept in [`Tables`].
pub trait Stored: Entity {
    fn table(tables: &Tables) -> &MemTable<Self>;
    fn table_mut(tables: &mut Tables) -> &mut MemTable<Self>;

    /// Column that must be unique besides the key.
    fn unique_value(&self) -> Option<&str> {
        None
    }

    /// Fails when a referenced parent row is missing.
    fn check_references(&self, _tables: &Tables) -> Result<(), RepositoryError> {
        Ok(())
    }

    /// `true` while child rows point at `key`.
    fn referenced_by(_key: &Self::Key, _tables: &Tables) -> bool {
        false
    }
}

fn require<K: Ord, V>(
    table: &BTreeMap<K, V>,
    key: &K,
    what: &str,
    shown: impl std::fmt::Display,
) -> Result<(), RepositoryError> {
    if table.contains_key(key) {
        Ok(())
    } else {
        Err(RepositoryError::Constraint(format!("{what} {shown} does not exist")))
    }
}

impl Stored for Category {
    fn table(tables: &Tables) -> &MemTable<Self> {
        &tables.categories
    }

    fn table_mut(tables: &mut Tables) -> &mut MemTable<Self> {
        &mut tables.categories
    }

    fn unique_value(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn referenced_by(key: &i32, tables: &Tables) -> bool {
        tables.products.values().any(|p| p.category_id == *key)
    }
}

impl Stored for Producer {
    fn table(tables: &Tables) -> &MemTable<Self> {
        &tables.producers
    }

    fn table_mut(tables: &mut Tables) -> &mut MemTable<Self> {
        &mut tables.producers
    }

    fn unique_value(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn referenced_by(key: &i32, tables: &Tables) -> bool {
        tables.products.values().any(|p| p.producer_id == *key)
    }
}

impl Stored for Supplier {
    fn table(tables: &Tables) -> &MemTable<Self> {
        &tables.suppliers
    }

    fn table_mut(tables: &mut Tables) -> &mut MemTable<Self> {
        &mut tables.suppliers
    }

    fn unique_value(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn referenced_by(key: &i32, tables: &Tables) -> bool {
        tables.products.values().any(|p| p.supplier_id == *key)
    }
}

impl Stored for Client {
    fn table(tables: &Tables) -> &MemTable<Self> {
        &tables.clients
    }

    fn table_mut(tables: &mut Tables) -> &mut MemTable<Self> {
        &mut tables.clients
    }

    fn unique_value(&self) -> Option<&str> {
        Some(&self.login)
    }

    fn referenced_by(key: &i32, tables: &Tables) -> bool {
        tables.orders.values().any(|o| o.client_id == *key)
    }
}

impl Stored for Product {
    fn table(tables: &Tables) -> &MemTable<Self> {
        &tables.products
    }

    fn table_mut(tables: &mut Tables) -> &mut MemTable<Self> {
        &mut tables.products
    }

    fn check_references(&self, tables: &Tables) -> Result<(), RepositoryError> {
        require(&tables.categories, &self.category_id, "category", self.category_id)?;
        require(&tables.producers, &self.producer_id, "producer", self.producer_id)?;
        require(&tables.suppliers, &self.supplier_id, "supplier", self.supplier_id)
    }

    fn referenced_by(key: &String, tables: &Tables) -> bool {
        tables
            .order_products
            .values()
            .any(|line| &line.product_article == key)
    }
}

impl Stored for Order {
    fn table(tables: &Tables) -> &MemTable<Self> {
        &tables.orders
    }

    fn table_mut(tables: &mut Tables) -> &mut MemTable<Self> {
        &mut tables.orders
    }

    fn check_references(&self, tables: &Tables) -> Result<(), RepositoryError> {
        require(&tables.clients, &self.client_id, "client", self.client_id)
    }

    fn referenced_by(key: &i32, tables: &Tables) -> bool {
        tables.order_products.values().any(|line| line.order_id == *key)
    }
}

impl Stored for OrderProduct {
    fn table(tables: &Tables) -> &MemTable<Self> {
        &tables.order_products
    }

    fn table_mut(tables: &mut Tables) -> &mut MemTable<Self> {
        &mut tables.order_products
    }

    fn check_references(&self, tables: &Tables) -> Result<(), RepositoryError> {
        require(&tables.orders, &self.order_id, "order", self.order_id)?;
        require(
            &tables.products,
            &self.product_article,
            "product",
            &self.product_article,
        )
    }
}

fn check_unique<E: Stored>(entity: &E, tables: &Tables) -> Result<(), RepositoryError> {
    let Some(value) = entity.unique_value() else {
        return Ok(());
    };
    let key = entity.key();
    let taken = E::table(tables)
        .values()
        .any(|other| other.key() != key && other.unique_value() == Some(value));
    if taken {
        return Err(RepositoryError::Conflict(format!(
            "{} '{value}' already exists",
            E::KIND
        )));
    }
    Ok(())
}

/// Inserts a new row. Fails on a duplicate key or unique value.
pub fn insert<E: Stored>(tables: &mut Tables, entity: E) -> Result<(), RepositoryError> {
    let key = entity.key();
    if E::table(tables).contains_key(&key) {
        return Err(RepositoryError::Conflict(format!(
            "{} {key} already exists",
            E::KIND
        )));
    }
    check_unique(&entity, tables)?;
    entity.check_references(tables)?;
    E::table_mut(tables).insert(key, entity);
    Ok(())
}

/// Overwrites an existing row.
pub fn replace<E: Stored>(tables: &mut Tables, entity: E) -> Result<(), RepositoryError> {
    let key = entity.key();
    if !E::table(tables).contains_key(&key) {
        return Err(RepositoryError::NotFound);
    }
    check_unique(&entity, tables)?;
    entity.check_references(tables)?;
    E::table_mut(tables).insert(key, entity);
    Ok(())
}

/// Removes a row; `Ok(false)` when it was not there.
pub fn remove<E: Stored>(tables: &mut Tables, key: &E::Key) -> Result<bool, RepositoryError> {
    if !E::table(tables).contains_key(key) {
        return Ok(false);
    }
    if E::referenced_by(key, tables) {
        return Err(RepositoryError::Constraint(format!(
            "{} {key} is still referenced",
            E::KIND
        )));
    }
    Ok(E::table_mut(tables).remove(key).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: i32, name: &str) -> Category {
        Category {
            id,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_insert_rejects_duplicate_key_and_name() {
        let mut tables = Tables::default();
        insert(&mut tables, category(1, "Tools")).unwrap();

        let by_key = insert(&mut tables, category(1, "Garden"));
        assert!(matches!(by_key, Err(RepositoryError::Conflict(_))));

        let by_name = insert(&mut tables, category(2, "Tools"));
        assert!(matches!(by_name, Err(RepositoryError::Conflict(_))));
    }

    #[test]
    fn test_replace_keeps_own_unique_value() {
        let mut tables = Tables::default();
        insert(&mut tables, category(1, "Tools")).unwrap();
        replace(&mut tables, category(1, "Tools")).unwrap();
        assert!(matches!(
            replace(&mut tables, category(9, "Other")),
            Err(RepositoryError::NotFound)
        ));
    }

    #[test]
    fn test_order_line_requires_parents() {
        let mut tables = Tables::default();
        let line = OrderProduct {
            order_id: 1,
            product_article: "A1".to_string(),
            amount: 1,
        };
        assert!(matches!(
            insert(&mut tables, line),
            Err(RepositoryError::Constraint(_))
        ));
    }

    #[test]
    fn test_remove_missing_row() {
        let mut tables = Tables::default();
        assert!(!remove::<Category>(&mut tables, &1).unwrap());
    }
}
