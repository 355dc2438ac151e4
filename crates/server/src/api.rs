//! REST endpoints under `/api`.
//!
//! Each resource gets the same five routes from the generic handlers below:
//!
//! | method | path                     | result                              |
//! |--------|--------------------------|-------------------------------------|
//! | GET    | `/api/{resource}`        | list, optionally paged; 204 if empty |
//! | POST   | `/api/{resource}`        | created object                      |
//! | GET    | `/api/{resource}/{key}`  | object                              |
//! | PUT    | `/api/{resource}/{key}`  | `true`                              |
//! | DELETE | `/api/{resource}/{key}`  | `true`                              |

use std::fmt::Debug;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use model::dto::{
    LoginRequest, LoginResponse, OrderFullInfoDto, OrderProductDto, ProductFullInfoDto,
};
use model::{Entity, OrderProductKey, Role};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use service::{
    Categories, Clients, ClientsService, CrudService, OrderProducts, OrderProductsService, Orders,
    OrdersService, Producers, Products, ProductsService, Resource, Suppliers,
};
use tracing::{info, instrument};

use crate::AppState;
use crate::auth::Authorized;
use crate::error::ApiError;

const CATALOGUE_WRITERS: &[Role] = &[Role::Administrator, Role::Manager];
const ADMINISTRATORS: &[Role] = &[Role::Administrator];
const EVERYONE: &[Role] = &Role::ALL;

/// HTTP binding of a [`Resource`].
pub trait ApiResource: Resource {
    /// Segment after `/api/`.
    const PATH: &'static str;
    /// Item route template after the resource path.
    const KEY_ROUTE: &'static str;
    /// Roles allowed to create, update and delete.
    const WRITE_ROLES: &'static [Role];

    type PathKey: DeserializeOwned + Debug + Send + 'static;

    fn key(path: Self::PathKey) -> <Self::Entity as Entity>::Key;
}

macro_rules! api_resource {
    ($resource:ty, $path:literal, $key_route:literal, $writers:expr, $path_key:ty) => {
        impl ApiResource for $resource {
            const PATH: &'static str = $path;
            const KEY_ROUTE: &'static str = $key_route;
            const WRITE_ROLES: &'static [Role] = $writers;
            type PathKey = $path_key;

            fn key(path: $path_key) -> $path_key {
                path
            }
        }
    };
}

api_resource!(Categories, "categories", "{id}", CATALOGUE_WRITERS, i32);
api_resource!(Producers, "producers", "{id}", CATALOGUE_WRITERS, i32);
api_resource!(Suppliers, "suppliers", "{id}", CATALOGUE_WRITERS, i32);
api_resource!(Clients, "clients", "{id}", ADMINISTRATORS, i32);
api_resource!(Orders, "orders", "{id}", EVERYONE, i32);
api_resource!(Products, "products", "{article}", CATALOGUE_WRITERS, String);

impl ApiResource for OrderProducts {
    const PATH: &'static str = "orderproducts";
    const KEY_ROUTE: &'static str = "orderid/{order_id}/article/{article}";
    const WRITE_ROLES: &'static [Role] = EVERYONE;
    type PathKey = (i32, String);

    fn key((order_id, article): (i32, String)) -> OrderProductKey {
        OrderProductKey::new(order_id, article)
    }
}

/// `page` and `pageSize` query parameters.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    #[serde(rename = "pageSize", alias = "pagesize")]
    pub page_size: Option<i64>,
}

impl PageQuery {
    /// `None` when neither parameter is present; a missing one falls back
    /// to page 1 or to `default_size`.
    pub fn window(&self, default_size: i64) -> Option<(i64, i64)> {
        match (self.page, self.page_size) {
            (None, None) => None,
            (page, size) => Some((page.unwrap_or(1), size.unwrap_or(default_size))),
        }
    }
}

fn json_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(value)| value)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}

#[instrument(skip_all, fields(resource = R::PATH, login = %auth.user.login))]
async fn list<R: ApiResource>(
    State(state): State<AppState>,
    auth: Authorized,
    Query(query): Query<PageQuery>,
) -> Result<Response, ApiError> {
    let service = CrudService::<R>::new(auth.uow.as_ref());
    let items = match query.window(state.default_page_size) {
        Some((page, page_size)) => service.get_all_paged(page, page_size).await?,
        None => service.get_all().await?,
    };
    if items.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(items).into_response())
}

#[instrument(skip_all, fields(resource = R::PATH, key = ?key))]
async fn get_one<R: ApiResource>(
    auth: Authorized,
    Path(key): Path<R::PathKey>,
) -> Result<Json<R::FullDto>, ApiError> {
    let service = CrudService::<R>::new(auth.uow.as_ref());
    Ok(Json(service.get_by_key(&R::key(key)).await?))
}

#[instrument(skip_all, fields(resource = R::PATH, login = %auth.user.login))]
async fn create<R: ApiResource>(
    auth: Authorized,
    body: Result<Json<R::CreateDto>, JsonRejection>,
) -> Result<Json<R::FullDto>, ApiError> {
    auth.user.require_any(R::WRITE_ROLES)?;
    let dto = json_body(body)?;
    let created = CrudService::<R>::new(auth.uow.as_ref()).add(dto).await?;
    info!("created");
    Ok(Json(created))
}

#[instrument(skip_all, fields(resource = R::PATH, key = ?key, login = %auth.user.login))]
async fn update<R: ApiResource>(
    auth: Authorized,
    Path(key): Path<R::PathKey>,
    body: Result<Json<R::UpdateDto>, JsonRejection>,
) -> Result<Json<bool>, ApiError> {
    auth.user.require_any(R::WRITE_ROLES)?;
    let dto = json_body(body)?;
    let service = CrudService::<R>::new(auth.uow.as_ref());
    Ok(Json(service.update(&R::key(key), dto).await?))
}

#[instrument(skip_all, fields(resource = R::PATH, key = ?key, login = %auth.user.login))]
async fn delete<R: ApiResource>(
    auth: Authorized,
    Path(key): Path<R::PathKey>,
) -> Result<Json<bool>, ApiError> {
    auth.user.require_any(R::WRITE_ROLES)?;
    let service = CrudService::<R>::new(auth.uow.as_ref());
    Ok(Json(service.delete(&R::key(key)).await?))
}

fn resource_routes<R: ApiResource>() -> Router<AppState> {
    let base = format!("/api/{}", R::PATH);
    let item = format!("{base}/{}", R::KEY_ROUTE);
    Router::new()
        .route(&base, get(list::<R>).post(create::<R>))
        .route(
            &item,
            get(get_one::<R>).put(update::<R>).delete(delete::<R>),
        )
}

#[instrument(skip_all)]
async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let request = json_body(body)?;
    let uow = state.begin().await?;
    let client = ClientsService::new(uow.as_ref())
        .get_by_login_and_password(&request.login, &request.password)
        .await?;
    let token = state.jwt.issue(&client.login, client.role)?;
    info!(login = %client.login, role = %client.role, "token issued");
    Ok(Json(LoginResponse {
        token,
        client_full_name: client.full_name,
        client_id: client.id,
        role: client.role,
    }))
}

async fn order_full_info(
    auth: Authorized,
    Path(order_id): Path<i32>,
) -> Result<Json<OrderFullInfoDto>, ApiError> {
    let info = OrdersService::new(auth.uow.as_ref())
        .get_full_info(order_id)
        .await?;
    Ok(Json(info))
}

async fn product_full_info(
    auth: Authorized,
    Path(article): Path<String>,
) -> Result<Json<ProductFullInfoDto>, ApiError> {
    let info = ProductsService::new(auth.uow.as_ref())
        .get_full_info(&article)
        .await?;
    Ok(Json(info))
}

async fn order_lines(
    auth: Authorized,
    Path(order_id): Path<i32>,
) -> Result<Response, ApiError> {
    let lines: Vec<OrderProductDto> = OrderProductsService::new(auth.uow.as_ref())
        .get_all_by_order_id(order_id)
        .await?;
    if lines.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(lines).into_response())
}

/// Every `/api` route.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/login", post(login))
        .route("/api/orders/{id}/fullinfo", get(order_full_info))
        .route("/api/products/{article}/fullinfo", get(product_full_info))
        .route("/api/orderproducts/order/{order_id}", get(order_lines))
        .merge(resource_routes::<Categories>())
        .merge(resource_routes::<Clients>())
        .merge(resource_routes::<Orders>())
        .merge(resource_routes::<OrderProducts>())
        .merge(resource_routes::<Producers>())
        .merge(resource_routes::<Products>())
        .merge(resource_routes::<Suppliers>())
}
