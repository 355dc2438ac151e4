//! Per-entity bindings used by [`CrudService`](crate::CrudService).
//!
//! A [`Resource`] ties an entity to its transfer objects, picks its repository
//! out of a [`UnitOfWork`] and validates incoming payloads while mapping them.

use model::dto::{
    ClientCreateDto, ClientFullDto, ClientUpdateDto, NamedActionDto, NamedFullDto, OrderCreateDto,
    OrderFullDto, OrderProductDto, OrderProductUpdateDto, OrderUpdateDto, ProductCreateDto,
    ProductFullDto, ProductUpdateDto,
};
use model::{Category, Client, Entity, Order, OrderProduct, Producer, Product, Supplier};
use repository::{Repository, UnitOfWork};
use rust_decimal::{Decimal, dec};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::ServiceError;
use crate::password::hash_password;

const NAME_MAX: usize = 50;
const FULL_NAME_MAX: usize = 100;
const MEASUREMENT_MAX: usize = 10;
const ARTICLE_MAX: usize = 6;
/// Largest value that fits `NUMERIC(10, 2)`.
const PRICE_MAX: Decimal = dec!(99999999.99);

/// Binds an entity kind to its DTOs and repository.
pub trait Resource: Send + Sync + 'static {
    type Entity: Entity;
    type FullDto: Serialize + DeserializeOwned + Send + Sync + 'static;
    type CreateDto: DeserializeOwned + Send + Sync + 'static;
    type UpdateDto: DeserializeOwned + Send + Sync + 'static;

    fn repository(uow: &dyn UnitOfWork) -> &dyn Repository<Self::Entity>;

    /// Mappers hash passwords and are run on the blocking pool.
    const CPU_BOUND_MAPPERS: bool = false;

    fn to_full(entity: Self::Entity) -> Self::FullDto;

    /// Validates a create payload and builds the entity to insert.
    fn from_create(dto: Self::CreateDto) -> Result<Self::Entity, ServiceError>;

    /// Validates an update payload and writes it onto `entity`.
    fn apply_update(entity: &mut Self::Entity, dto: Self::UpdateDto) -> Result<(), ServiceError>;
}

fn invalid(msg: impl Into<String>) -> ServiceError {
    ServiceError::Validation(msg.into())
}

fn check_text(field: &str, value: &str, max: usize) -> Result<String, ServiceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(invalid(format!("{field} must not be empty")));
    }
    if value.chars().count() > max {
        return Err(invalid(format!("{field} must be at most {max} characters")));
    }
    Ok(value.to_string())
}

/// Article: 1 to 6 ASCII letters or digits.
pub fn check_article(article: &str) -> Result<String, ServiceError> {
    let valid = !article.is_empty()
        && article.len() <= ARTICLE_MAX
        && article.chars().all(|c| c.is_ascii_alphanumeric());
    if !valid {
        return Err(invalid(format!(
            "article '{article}' must be 1 to {ARTICLE_MAX} letters or digits"
        )));
    }
    Ok(article.to_string())
}

fn check_price(price: Decimal) -> Result<Decimal, ServiceError> {
    if price < Decimal::ZERO {
        return Err(invalid("price must not be negative"));
    }
    if price.normalize().scale() > 2 {
        return Err(invalid("price must have at most two decimal places"));
    }
    if price > PRICE_MAX {
        return Err(invalid(format!("price must not exceed {PRICE_MAX}")));
    }
    Ok(price)
}

fn check_discount(discount: i16) -> Result<i16, ServiceError> {
    if !(0..=100).contains(&discount) {
        return Err(invalid("discount must be between 0 and 100"));
    }
    Ok(discount)
}

fn check_quantity(quantity: i32) -> Result<i32, ServiceError> {
    if quantity < 0 {
        return Err(invalid("quantity must not be negative"));
    }
    Ok(quantity)
}

fn check_amount(amount: i32) -> Result<i32, ServiceError> {
    if amount < 1 {
        return Err(invalid("amount must be at least 1"));
    }
    Ok(amount)
}

fn measurement_or_default(measurement: &str) -> Result<String, ServiceError> {
    if measurement.trim().is_empty() {
        return Ok("pcs".to_string());
    }
    check_text("measurement", measurement, MEASUREMENT_MAX)
}

fn check_image_name(image_name: Option<String>) -> Result<Option<String>, ServiceError> {
    match image_name.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(name) => check_text("imageName", name, NAME_MAX).map(Some),
    }
}

macro_rules! named_resource {
    ($marker:ident, $entity:ident, $accessor:ident) => {
        #[doc = concat!("[`", stringify!($entity), "`] bindings.")]
        pub struct $marker;

        impl Resource for $marker {
            type Entity = $entity;
            type FullDto = NamedFullDto;
            type CreateDto = NamedActionDto;
            type UpdateDto = NamedActionDto;

            fn repository(uow: &dyn UnitOfWork) -> &dyn Repository<$entity> {
                uow.$accessor()
            }

            fn to_full(entity: $entity) -> NamedFullDto {
                entity.into()
            }

            fn from_create(dto: NamedActionDto) -> Result<$entity, ServiceError> {
                Ok($entity {
                    id: 0,
                    name: check_text("name", &dto.name, NAME_MAX)?,
                })
            }

            fn apply_update(entity: &mut $entity, dto: NamedActionDto) -> Result<(), ServiceError> {
                entity.name = check_text("name", &dto.name, NAME_MAX)?;
                Ok(())
            }
        }
    };
}

named_resource!(Categories, Category, categories);
named_resource!(Producers, Producer, producers);
named_resource!(Suppliers, Supplier, suppliers);

/// [`Client`] bindings. Passwords are hashed on the way in.
pub struct Clients;

impl Resource for Clients {
    type Entity = Client;
    type FullDto = ClientFullDto;
    type CreateDto = ClientCreateDto;
    type UpdateDto = ClientUpdateDto;

    const CPU_BOUND_MAPPERS: bool = true;

    fn repository(uow: &dyn UnitOfWork) -> &dyn Repository<Client> {
        uow.clients()
    }

    fn to_full(entity: Client) -> ClientFullDto {
        entity.into()
    }

    fn from_create(dto: ClientCreateDto) -> Result<Client, ServiceError> {
        Ok(Client {
            id: 0,
            full_name: check_text("fullName", &dto.full_name, FULL_NAME_MAX)?,
            role: dto.role,
            login: check_text("login", &dto.login, FULL_NAME_MAX)?,
            password_hash: hash_password(&dto.password)?,
        })
    }

    fn apply_update(entity: &mut Client, dto: ClientUpdateDto) -> Result<(), ServiceError> {
        let full_name = check_text("fullName", &dto.full_name, FULL_NAME_MAX)?;
        let login = check_text("login", &dto.login, FULL_NAME_MAX)?;
        if let Some(password) = dto.password {
            entity.password_hash = hash_password(&password)?;
        }
        entity.full_name = full_name;
        entity.login = login;
        entity.role = dto.role;
        Ok(())
    }
}

/// [`Product`] bindings, keyed by article.
pub struct Products;

impl Resource for Products {
    type Entity = Product;
    type FullDto = ProductFullDto;
    type CreateDto = ProductCreateDto;
    type UpdateDto = ProductUpdateDto;

    fn repository(uow: &dyn UnitOfWork) -> &dyn Repository<Product> {
        uow.products()
    }

    fn to_full(entity: Product) -> ProductFullDto {
        entity.into()
    }

    fn from_create(dto: ProductCreateDto) -> Result<Product, ServiceError> {
        Ok(Product {
            article: check_article(&dto.article)?,
            category_id: dto.category_id,
            producer_id: dto.producer_id,
            supplier_id: dto.supplier_id,
            name: check_text("name", &dto.name, NAME_MAX)?,
            measurement: measurement_or_default(&dto.measurement)?,
            price: check_price(dto.price)?,
            quantity: check_quantity(dto.quantity)?,
            discount: check_discount(dto.discount)?,
            description: dto.description.trim().to_string(),
            image_name: check_image_name(dto.image_name)?,
        })
    }

    fn apply_update(entity: &mut Product, dto: ProductUpdateDto) -> Result<(), ServiceError> {
        *entity = Product {
            article: entity.article.clone(),
            category_id: dto.category_id,
            producer_id: dto.producer_id,
            supplier_id: dto.supplier_id,
            name: check_text("name", &dto.name, NAME_MAX)?,
            measurement: measurement_or_default(&dto.measurement)?,
            price: check_price(dto.price)?,
            quantity: check_quantity(dto.quantity)?,
            discount: check_discount(dto.discount)?,
            description: dto.description.trim().to_string(),
            image_name: check_image_name(dto.image_name)?,
        };
        Ok(())
    }
}

/// [`Order`] bindings. Client and order date are fixed at creation.
pub struct Orders;

impl Resource for Orders {
    type Entity = Order;
    type FullDto = OrderFullDto;
    type CreateDto = OrderCreateDto;
    type UpdateDto = OrderUpdateDto;

    fn repository(uow: &dyn UnitOfWork) -> &dyn Repository<Order> {
        uow.orders()
    }

    fn to_full(entity: Order) -> OrderFullDto {
        entity.into()
    }

    fn from_create(dto: OrderCreateDto) -> Result<Order, ServiceError> {
        if dto.delivery_date < dto.order_date {
            return Err(invalid("deliveryDate must not precede orderDate"));
        }
        Ok(Order {
            id: 0,
            client_id: dto.client_id,
            order_date: dto.order_date,
            delivery_date: dto.delivery_date,
            receive_code: dto.receive_code,
            status: check_text("status", &dto.status, NAME_MAX)?,
        })
    }

    fn apply_update(entity: &mut Order, dto: OrderUpdateDto) -> Result<(), ServiceError> {
        if dto.delivery_date < entity.order_date {
            return Err(invalid("deliveryDate must not precede orderDate"));
        }
        entity.status = check_text("status", &dto.status, NAME_MAX)?;
        entity.delivery_date = dto.delivery_date;
        entity.receive_code = dto.receive_code;
        Ok(())
    }
}

/// [`OrderProduct`] bindings, keyed by `(order id, article)`.
pub struct OrderProducts;

impl Resource for OrderProducts {
    type Entity = OrderProduct;
    type FullDto = OrderProductDto;
    type CreateDto = OrderProductDto;
    type UpdateDto = OrderProductUpdateDto;

    fn repository(uow: &dyn UnitOfWork) -> &dyn Repository<OrderProduct> {
        uow.order_products()
    }

    fn to_full(entity: OrderProduct) -> OrderProductDto {
        entity.into()
    }

    fn from_create(dto: OrderProductDto) -> Result<OrderProduct, ServiceError> {
        Ok(OrderProduct {
            order_id: dto.order_id,
            product_article: check_article(&dto.product_article)?,
            amount: check_amount(dto.amount)?,
        })
    }

    fn apply_update(
        entity: &mut OrderProduct,
        dto: OrderProductUpdateDto,
    ) -> Result<(), ServiceError> {
        entity.amount = check_amount(dto.amount)?;
        Ok(())
    }
}
