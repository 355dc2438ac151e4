//! Transfer objects exchanged over the HTTP API.
//!
//! Each entity has a Full variant (every persisted field except secrets), a
//! Create variant (fields supplied by the caller on insert) and an Update
//! variant (mutable fields only). Field names are camelCase on the wire.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Category, Client, Order, OrderProduct, Producer, Product, Role, Supplier};

/// Full view of a category, producer or supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedFullDto {
    pub id: i32,
    pub name: String,
}

/// Create and update payload of a category, producer or supplier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedActionDto {
    pub name: String,
}

impl From<Category> for NamedFullDto {
    fn from(c: Category) -> Self {
        Self { id: c.id, name: c.name }
    }
}

impl From<Producer> for NamedFullDto {
    fn from(p: Producer) -> Self {
        Self { id: p.id, name: p.name }
    }
}

impl From<Supplier> for NamedFullDto {
    fn from(s: Supplier) -> Self {
        Self { id: s.id, name: s.name }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientFullDto {
    pub id: i32,
    pub full_name: String,
    pub role: Role,
    pub login: String,
}

impl From<Client> for ClientFullDto {
    fn from(c: Client) -> Self {
        Self {
            id: c.id,
            full_name: c.full_name,
            role: c.role,
            login: c.login,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCreateDto {
    pub full_name: String,
    pub role: Role,
    pub login: String,
    pub password: String,
}

/// `password: None` keeps the stored credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientUpdateDto {
    pub full_name: String,
    pub role: Role,
    pub login: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Identity used by the authorization boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientAuthDto {
    pub id: i32,
    pub login: String,
    pub role: Role,
}

impl From<Client> for ClientAuthDto {
    fn from(c: Client) -> Self {
        Self {
            id: c.id,
            login: c.login,
            role: c.role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFullDto {
    pub article: String,
    pub category_id: i32,
    pub producer_id: i32,
    pub supplier_id: i32,
    pub name: String,
    pub measurement: String,
    pub price: Decimal,
    pub quantity: i32,
    pub discount: i16,
    pub description: String,
    pub image_name: Option<String>,
}

impl From<Product> for ProductFullDto {
    fn from(p: Product) -> Self {
        Self {
            article: p.article,
            category_id: p.category_id,
            producer_id: p.producer_id,
            supplier_id: p.supplier_id,
            name: p.name,
            measurement: p.measurement,
            price: p.price,
            quantity: p.quantity,
            discount: p.discount,
            description: p.description,
            image_name: p.image_name,
        }
    }
}

/// Products are created with a caller-chosen article.
pub type ProductCreateDto = ProductFullDto;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdateDto {
    pub category_id: i32,
    pub producer_id: i32,
    pub supplier_id: i32,
    pub name: String,
    pub measurement: String,
    pub price: Decimal,
    pub quantity: i32,
    pub discount: i16,
    pub description: String,
    pub image_name: Option<String>,
}

/// Short product card used inside order breakdowns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSimpleDto {
    pub article: String,
    pub name: String,
    pub measurement: String,
    pub price: Decimal,
    pub discount: i16,
    pub image_name: Option<String>,
}

impl From<Product> for ProductSimpleDto {
    fn from(p: Product) -> Self {
        Self {
            article: p.article,
            name: p.name,
            measurement: p.measurement,
            price: p.price,
            discount: p.discount,
            image_name: p.image_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFullDto {
    pub id: i32,
    pub client_id: i32,
    pub order_date: NaiveDate,
    pub delivery_date: NaiveDate,
    pub receive_code: i32,
    pub status: String,
}

impl From<Order> for OrderFullDto {
    fn from(o: Order) -> Self {
        Self {
            id: o.id,
            client_id: o.client_id,
            order_date: o.order_date,
            delivery_date: o.delivery_date,
            receive_code: o.receive_code,
            status: o.status,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreateDto {
    pub client_id: i32,
    pub order_date: NaiveDate,
    pub delivery_date: NaiveDate,
    pub receive_code: i32,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdateDto {
    pub delivery_date: NaiveDate,
    pub receive_code: i32,
    pub status: String,
}

/// Order line; doubles as the create payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderProductDto {
    pub order_id: i32,
    pub product_article: String,
    pub amount: i32,
}

impl From<OrderProduct> for OrderProductDto {
    fn from(op: OrderProduct) -> Self {
        Self {
            order_id: op.order_id,
            product_article: op.product_article,
            amount: op.amount,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderProductUpdateDto {
    pub amount: i32,
}

/// One priced line of [`OrderFullInfoDto`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLineDto {
    pub product: ProductSimpleDto,
    pub amount: i32,
    pub total_price: Decimal,
    pub discounted_price: Decimal,
}

/// Order with its client name, priced lines and totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFullInfoDto {
    pub order: OrderFullDto,
    pub client_full_name: String,
    pub products: Vec<OrderLineDto>,
    pub total_price: Decimal,
    pub total_discounted_price: Decimal,
}

/// Product with the names of its category, producer and supplier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFullInfoDto {
    pub product: ProductFullDto,
    pub category_name: String,
    pub producer_name: String,
    pub supplier_name: String,
    pub discounted_price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub login: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub client_full_name: String,
    pub client_id: i32,
    pub role: Role,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::dec;

    #[test]
    fn test_deserialize_product_create_from_json() {
        let json = r#"
        {
            "article": "A112T4",
            "categoryId": 1,
            "producerId": 2,
            "supplierId": 3,
            "name": "Hammer",
            "measurement": "pcs",
            "price": "500.00",
            "quantity": 12,
            "discount": 15,
            "description": "Steel hammer",
            "imageName": null
        }
        "#;
        let dto: ProductCreateDto = serde_json::from_str(json).unwrap();
        assert_eq!(dto.article, "A112T4");
        assert_eq!(dto.price, dec!(500.00));
        assert_eq!(dto.discount, 15);
        assert!(dto.image_name.is_none());
    }

    #[test]
    fn test_client_full_dto_never_carries_password() {
        let client = Client {
            id: 3,
            full_name: "Alice Smith".to_string(),
            role: Role::Customer,
            login: "alice".to_string(),
            password_hash: "$argon2id$v=19$...".to_string(),
        };
        let json = serde_json::to_value(ClientFullDto::from(client)).unwrap();
        assert_eq!(json["fullName"], "Alice Smith");
        assert_eq!(json["role"], "Customer");
        assert!(json.get("password").is_none());
        assert!(json.get("passwordHash").is_none());
    }

    #[test]
    fn test_order_dates_use_iso_format() {
        let dto = OrderFullDto {
            id: 1,
            client_id: 2,
            order_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            delivery_date: NaiveDate::from_ymd_opt(2024, 3, 7).unwrap(),
            receive_code: 901,
            status: "New".to_string(),
        };
        let json = serde_json::to_value(&dto).unwrap();
        assert_eq!(json["orderDate"], "2024-03-01");
        assert_eq!(json["deliveryDate"], "2024-03-07");
        assert_eq!(json["receiveCode"], 901);
    }

    #[test]
    fn test_client_update_password_is_optional() {
        let dto: ClientUpdateDto =
            serde_json::from_str(r#"{"fullName":"Bob","role":"Manager","login":"bob"}"#).unwrap();
        assert_eq!(dto.role, Role::Manager);
        assert!(dto.password.is_none());
    }
}
