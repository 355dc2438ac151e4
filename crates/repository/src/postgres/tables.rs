//! Table metadata driving [`PgRepository`](super::PgRepository).

use model::{
    Category, Client, Entity, Order, OrderProduct, OrderProductKey, Producer, Product, Supplier,
};
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

use crate::RepositoryError;

/// Param list borrowed from an entity or a key.
pub type Params<'a> = Vec<&'a (dyn ToSql + Sync)>;

/// Maps an entity onto a PostgreSQL table.
///
/// Column lists and param lists must line up positionally.
pub trait Table: Entity {
    const TABLE: &'static str;
    const KEY_COLUMNS: &'static [&'static str];
    const SELECT_COLUMNS: &'static [&'static str];
    /// Written on insert; excludes generated keys.
    const INSERT_COLUMNS: &'static [&'static str];
    /// Rewritten on update; never includes key columns.
    const UPDATE_COLUMNS: &'static [&'static str];

    fn from_row(row: &Row) -> Result<Self, RepositoryError>;
    fn key_params(key: &Self::Key) -> Params<'_>;
    fn insert_params(&self) -> Params<'_>;
    fn update_params(&self) -> Params<'_>;
}

macro_rules! named_table {
    ($ty:ident, $table:literal) => {
        impl Table for $ty {
            const TABLE: &'static str = $table;
            const KEY_COLUMNS: &'static [&'static str] = &["id"];
            const SELECT_COLUMNS: &'static [&'static str] = &["id", "name"];
            const INSERT_COLUMNS: &'static [&'static str] = &["name"];
            const UPDATE_COLUMNS: &'static [&'static str] = &["name"];

            fn from_row(row: &Row) -> Result<Self, RepositoryError> {
                Ok($ty {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                })
            }

            fn key_params(key: &i32) -> Params<'_> {
                vec![key]
            }

            fn insert_params(&self) -> Params<'_> {
                vec![&self.name]
            }

            fn update_params(&self) -> Params<'_> {
                vec![&self.name]
            }
        }
    };
}

named_table!(Category, "categories");
named_table!(Producer, "producers");
named_table!(Supplier, "suppliers");

impl Table for Client {
    const TABLE: &'static str = "clients";
    const KEY_COLUMNS: &'static [&'static str] = &["id"];
    const SELECT_COLUMNS: &'static [&'static str] =
        &["id", "full_name", "role", "login", "password_hash"];
    const INSERT_COLUMNS: &'static [&'static str] = &["full_name", "role", "login", "password_hash"];
    const UPDATE_COLUMNS: &'static [&'static str] = &["full_name", "role", "login", "password_hash"];

    fn from_row(row: &Row) -> Result<Self, RepositoryError> {
        Ok(Client {
            id: row.try_get("id")?,
            full_name: row.try_get("full_name")?,
            role: row.try_get("role")?,
            login: row.try_get("login")?,
            password_hash: row.try_get("password_hash")?,
        })
    }

    fn key_params(key: &i32) -> Params<'_> {
        vec![key]
    }

    fn insert_params(&self) -> Params<'_> {
        vec![&self.full_name, &self.role, &self.login, &self.password_hash]
    }

    fn update_params(&self) -> Params<'_> {
        self.insert_params()
    }
}

impl Table for Product {
    const TABLE: &'static str = "products";
    const KEY_COLUMNS: &'static [&'static str] = &["article"];
    const SELECT_COLUMNS: &'static [&'static str] = &[
        "article",
        "category_id",
        "producer_id",
        "supplier_id",
        "name",
        "measurement",
        "price",
        "quantity",
        "discount",
        "description",
        "image_name",
    ];
    const INSERT_COLUMNS: &'static [&'static str] = Self::SELECT_COLUMNS;
    const UPDATE_COLUMNS: &'static [&'static str] = &[
        "category_id",
        "producer_id",
        "supplier_id",
        "name",
        "measurement",
        "price",
        "quantity",
        "discount",
        "description",
        "image_name",
    ];

    fn from_row(row: &Row) -> Result<Self, RepositoryError> {
        Ok(Product {
            article: row.try_get("article")?,
            category_id: row.try_get("category_id")?,
            producer_id: row.try_get("producer_id")?,
            supplier_id: row.try_get("supplier_id")?,
            name: row.try_get("name")?,
            measurement: row.try_get("measurement")?,
            price: row.try_get("price")?,
            quantity: row.try_get("quantity")?,
            discount: row.try_get("discount")?,
            description: row.try_get("description")?,
            image_name: row.try_get("image_name")?,
        })
    }

    fn key_params(key: &String) -> Params<'_> {
        vec![key]
    }

    fn insert_params(&self) -> Params<'_> {
        let mut params: Params<'_> = vec![&self.article];
        params.extend(self.update_params());
        params
    }

    fn update_params(&self) -> Params<'_> {
        vec![
            &self.category_id,
            &self.producer_id,
            &self.supplier_id,
            &self.name,
            &self.measurement,
            &self.price,
            &self.quantity,
            &self.discount,
            &self.description,
            &self.image_name,
        ]
    }
}

impl Table for Order {
    const TABLE: &'static str = "orders";
    const KEY_COLUMNS: &'static [&'static str] = &["id"];
    const SELECT_COLUMNS: &'static [&'static str] = &[
        "id",
        "client_id",
        "order_date",
        "delivery_date",
        "receive_code",
        "status",
    ];
    const INSERT_COLUMNS: &'static [&'static str] =
        &["client_id", "order_date", "delivery_date", "receive_code", "status"];
    const UPDATE_COLUMNS: &'static [&'static str] = Self::INSERT_COLUMNS;

    fn from_row(row: &Row) -> Result<Self, RepositoryError> {
        Ok(Order {
            id: row.try_get("id")?,
            client_id: row.try_get("client_id")?,
            order_date: row.try_get("order_date")?,
            delivery_date: row.try_get("delivery_date")?,
            receive_code: row.try_get("receive_code")?,
            status: row.try_get("status")?,
        })
    }

    fn key_params(key: &i32) -> Params<'_> {
        vec![key]
    }

    fn insert_params(&self) -> Params<'_> {
        vec![
            &self.client_id,
            &self.order_date,
            &self.delivery_date,
            &self.receive_code,
            &self.status,
        ]
    }

    fn update_params(&self) -> Params<'_> {
        self.insert_params()
    }
}

impl Table for OrderProduct {
    const TABLE: &'static str = "order_products";
    const KEY_COLUMNS: &'static [&'static str] = &["order_id", "product_article"];
    const SELECT_COLUMNS: &'static [&'static str] = &["order_id", "product_article", "amount"];
    const INSERT_COLUMNS: &'static [&'static str] = Self::SELECT_COLUMNS;
    const UPDATE_COLUMNS: &'static [&'static str] = &["amount"];

    fn from_row(row: &Row) -> Result<Self, RepositoryError> {
        Ok(OrderProduct {
            order_id: row.try_get("order_id")?,
            product_article: row.try_get("product_article")?,
            amount: row.try_get("amount")?,
        })
    }

    fn key_params(key: &OrderProductKey) -> Params<'_> {
        vec![&key.order_id, &key.product_article]
    }

    fn insert_params(&self) -> Params<'_> {
        vec![&self.order_id, &self.product_article, &self.amount]
    }

    fn update_params(&self) -> Params<'_> {
        vec![&self.amount]
    }
}
