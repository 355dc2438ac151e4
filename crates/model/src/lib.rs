//! Persisted entities of the online store and the transfer objects exchanged
//! over the HTTP API.
//!
//! Entities mirror the relational schema one-to-one. Every entity implements
//! [`Entity`], which tells the generic repository and service layers how the
//! entity is keyed: by a server-generated numeric id, by a product article,
//! or by the composite `(order_id, product_article)` pair.

use std::fmt;

use chrono::NaiveDate;
use postgres_types::{FromSql, ToSql};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub mod dto;
pub mod pricing;

/// Identity and keying information shared by all persisted entities.
pub trait Entity: Clone + fmt::Debug + Send + Sync + 'static {
    /// Primary key type.
    type Key: Clone + Ord + fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// Entity name used in logs and error messages.
    const KIND: &'static str;

    /// `true` when the store assigns the key on insert.
    const GENERATED_KEY: bool = false;

    fn key(&self) -> Self::Key;

    /// Stores a server-assigned id. Entities with natural keys ignore it.
    fn set_generated_key(&mut self, _id: i32) {}
}

/// Client role, stored as the `client_role` enum in PostgreSQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSql, FromSql)]
#[postgres(name = "client_role")]
pub enum Role {
    Administrator,
    Manager,
    Customer,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::Administrator, Role::Manager, Role::Customer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Administrator => "Administrator",
            Role::Manager => "Manager",
            Role::Customer => "Customer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category — товарная категория.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: i32,
    pub name: String,
}

/// Producer — производитель товара.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Producer {
    pub id: i32,
    pub name: String,
}

/// Supplier — поставщик товара.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Supplier {
    pub id: i32,
    pub name: String,
}

/// Client — покупатель или сотрудник магазина.
///
/// `password_hash` holds an argon2 PHC string and never leaves the service layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub id: i32,
    pub full_name: String,
    pub role: Role,
    pub login: String,
    pub password_hash: String,
}

/// Product — товар, идентифицируется артикулом.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub article: String,
    pub category_id: i32,
    pub producer_id: i32,
    pub supplier_id: i32,
    pub name: String,
    pub measurement: String,
    pub price: Decimal,
    pub quantity: i32,
    /// Percent in `0..=100`.
    pub discount: i16,
    pub description: String,
    pub image_name: Option<String>,
}

impl Product {
    /// Unit price after the product discount.
    pub fn discounted_price(&self) -> Decimal {
        pricing::discounted_unit_price(self.price, self.discount)
    }
}

/// Order — заказ клиента.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: i32,
    pub client_id: i32,
    pub order_date: NaiveDate,
    pub delivery_date: NaiveDate,
    pub receive_code: i32,
    pub status: String,
}

/// OrderProduct — строка заказа: товар и его количество.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderProduct {
    pub order_id: i32,
    pub product_article: String,
    pub amount: i32,
}

/// Composite primary key of [`OrderProduct`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderProductKey {
    pub order_id: i32,
    pub product_article: String,
}

impl OrderProductKey {
    pub fn new(order_id: i32, product_article: impl Into<String>) -> Self {
        Self {
            order_id,
            product_article: product_article.into(),
        }
    }
}

impl fmt::Display for OrderProductKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.order_id, self.product_article)
    }
}

macro_rules! numeric_entity {
    ($ty:ty, $kind:literal) => {
        impl Entity for $ty {
            type Key = i32;
            const KIND: &'static str = $kind;
            const GENERATED_KEY: bool = true;

            fn key(&self) -> i32 {
                self.id
            }

            fn set_generated_key(&mut self, id: i32) {
                self.id = id;
            }
        }
    };
}

numeric_entity!(Category, "Category");
numeric_entity!(Producer, "Producer");
numeric_entity!(Supplier, "Supplier");
numeric_entity!(Client, "Client");
numeric_entity!(Order, "Order");

impl Entity for Product {
    type Key = String;
    const KIND: &'static str = "Product";

    fn key(&self) -> String {
        self.article.clone()
    }
}

impl Entity for OrderProduct {
    type Key = OrderProductKey;
    const KIND: &'static str = "OrderProduct";

    fn key(&self) -> OrderProductKey {
        OrderProductKey::new(self.order_id, self.product_article.clone())
    }
}
