//! Typed HTTP clients for the store API.
//!
//! [`ApiClient`] holds one [`ResourceClient`] per resource plus the login and
//! aggregate endpoints. Every call except `login` takes the bearer token
//! returned by [`ApiClient::login`].

use std::fmt::Display;
use std::marker::PhantomData;

use model::OrderProductKey;
use model::dto::{
    ClientCreateDto, ClientFullDto, ClientUpdateDto, LoginRequest, LoginResponse,
    NamedActionDto, NamedFullDto, OrderCreateDto, OrderFullDto, OrderFullInfoDto,
    OrderProductDto, OrderProductUpdateDto, OrderUpdateDto, ProductCreateDto, ProductFullDto,
    ProductFullInfoDto, ProductUpdateDto,
};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::instrument;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("Error from reqwest: {0}")]
    Reqwest(#[from] reqwest::Error),
    /// The API answered with a non-success status; `message` is its body.
    #[error("{status}: {message}")]
    Status { status: StatusCode, message: String },
}

/// Renders a key as the item segment of a resource URL.
pub trait ClientKey {
    fn path(&self) -> String;
}

impl ClientKey for i32 {
    fn path(&self) -> String {
        self.to_string()
    }
}

impl ClientKey for String {
    fn path(&self) -> String {
        self.clone()
    }
}

impl ClientKey for OrderProductKey {
    fn path(&self) -> String {
        format!("orderid/{}/article/{}", self.order_id, self.product_article)
    }
}

async fn checked(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    Err(ClientError::Status { status, message })
}

async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, ClientError> {
    Ok(checked(request.send().await?).await?.json().await?)
}

/// A listing answered with 204 is an empty vector.
async fn send_list<T: DeserializeOwned>(request: RequestBuilder) -> Result<Vec<T>, ClientError> {
    let response = checked(request.send().await?).await?;
    if response.status() == StatusCode::NO_CONTENT {
        return Ok(Vec::new());
    }
    Ok(response.json().await?)
}

#[derive(Serialize)]
struct PageParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<i64>,
    #[serde(rename = "pageSize", skip_serializing_if = "Option::is_none")]
    page_size: Option<i64>,
}

/// CRUD client of one resource.
///
/// `F`, `C` and `U` are the full, create and update transfer objects, `K`
/// the key type.
pub struct ResourceClient<F, C, U, K> {
    http: reqwest::Client,
    url: String,
    _marker: PhantomData<fn() -> (F, C, U, K)>,
}

impl<F, C, U, K> Clone for ResourceClient<F, C, U, K> {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            url: self.url.clone(),
            _marker: PhantomData,
        }
    }
}

impl<F, C, U, K> ResourceClient<F, C, U, K>
where
    F: DeserializeOwned,
    C: Serialize,
    U: Serialize,
    K: ClientKey,
{
    pub fn new(http: reqwest::Client, base_url: &str, resource: &str) -> Self {
        Self {
            http,
            url: format!("{}/api/{resource}", base_url.trim_end_matches('/')),
            _marker: PhantomData,
        }
    }

    fn item_url(&self, key: &K) -> String {
        format!("{}/{}", self.url, key.path())
    }

    /// Lists the resource; passing neither `page` nor `page_size` lists
    /// everything.
    #[instrument(skip(self, token), fields(url = %self.url), err)]
    pub async fn get_all(
        &self,
        token: &str,
        page: Option<i64>,
        page_size: Option<i64>,
    ) -> Result<Vec<F>, ClientError> {
        let request = self
            .http
            .get(&self.url)
            .bearer_auth(token)
            .query(&PageParams { page, page_size });
        send_list(request).await
    }

    #[instrument(skip_all, fields(url = %self.url), err)]
    pub async fn get_by_key(&self, token: &str, key: &K) -> Result<F, ClientError> {
        send_json(self.http.get(self.item_url(key)).bearer_auth(token)).await
    }

    #[instrument(skip_all, fields(url = %self.url), err)]
    pub async fn create(&self, token: &str, dto: &C) -> Result<F, ClientError> {
        send_json(self.http.post(&self.url).bearer_auth(token).json(dto)).await
    }

    #[instrument(skip_all, fields(url = %self.url), err)]
    pub async fn update(&self, token: &str, key: &K, dto: &U) -> Result<bool, ClientError> {
        send_json(self.http.put(self.item_url(key)).bearer_auth(token).json(dto)).await
    }

    #[instrument(skip_all, fields(url = %self.url), err)]
    pub async fn delete(&self, token: &str, key: &K) -> Result<bool, ClientError> {
        send_json(self.http.delete(self.item_url(key)).bearer_auth(token)).await
    }
}

pub type NamedClient = ResourceClient<NamedFullDto, NamedActionDto, NamedActionDto, i32>;
pub type ClientsClient = ResourceClient<ClientFullDto, ClientCreateDto, ClientUpdateDto, i32>;
pub type OrdersClient = ResourceClient<OrderFullDto, OrderCreateDto, OrderUpdateDto, i32>;
pub type OrderProductsClient =
    ResourceClient<OrderProductDto, OrderProductDto, OrderProductUpdateDto, OrderProductKey>;
pub type ProductsClient = ResourceClient<ProductFullDto, ProductCreateDto, ProductUpdateDto, String>;

/// Client of the whole API.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    url: String,
    pub categories: NamedClient,
    pub clients: ClientsClient,
    pub orders: OrdersClient,
    pub order_products: OrderProductsClient,
    pub producers: NamedClient,
    pub products: ProductsClient,
    pub suppliers: NamedClient,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self::with_http(http, base_url))
    }

    pub fn with_http(http: reqwest::Client, base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        Self {
            categories: ResourceClient::new(http.clone(), base_url, "categories"),
            clients: ResourceClient::new(http.clone(), base_url, "clients"),
            orders: ResourceClient::new(http.clone(), base_url, "orders"),
            order_products: ResourceClient::new(http.clone(), base_url, "orderproducts"),
            producers: ResourceClient::new(http.clone(), base_url, "producers"),
            products: ResourceClient::new(http.clone(), base_url, "products"),
            suppliers: ResourceClient::new(http.clone(), base_url, "suppliers"),
            url: format!("{base_url}/api"),
            http,
        }
    }

    fn url(&self, path: impl Display) -> String {
        format!("{}/{path}", self.url)
    }

    /// Exchanges credentials for a bearer token.
    #[instrument(skip_all, fields(login = %request.login), err)]
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse, ClientError> {
        send_json(self.http.post(self.url("login")).json(request)).await
    }

    #[instrument(skip(self, token), err)]
    pub async fn order_full_info(
        &self,
        token: &str,
        order_id: i32,
    ) -> Result<OrderFullInfoDto, ClientError> {
        let url = self.url(format_args!("orders/{order_id}/fullinfo"));
        send_json(self.http.get(url).bearer_auth(token)).await
    }

    #[instrument(skip(self, token), err)]
    pub async fn product_full_info(
        &self,
        token: &str,
        article: &str,
    ) -> Result<ProductFullInfoDto, ClientError> {
        let url = self.url(format_args!("products/{article}/fullinfo"));
        send_json(self.http.get(url).bearer_auth(token)).await
    }

    /// Line items of one order; empty when the order has none.
    #[instrument(skip(self, token), err)]
    pub async fn order_lines(
        &self,
        token: &str,
        order_id: i32,
    ) -> Result<Vec<OrderProductDto>, ClientError> {
        let url = self.url(format_args!("orderproducts/order/{order_id}"));
        send_list(self.http.get(url).bearer_auth(token)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_paths() {
        assert_eq!(7_i32.path(), "7");
        assert_eq!("A112T4".to_string().path(), "A112T4");
        assert_eq!(
            OrderProductKey::new(3, "B1").path(),
            "orderid/3/article/B1"
        );
    }

    #[test]
    fn test_resource_urls() {
        let api = ApiClient::new("http://localhost:8081/").unwrap();
        assert_eq!(api.categories.url, "http://localhost:8081/api/categories");
        assert_eq!(
            api.order_products.item_url(&OrderProductKey::new(1, "A")),
            "http://localhost:8081/api/orderproducts/orderid/1/article/A"
        );
        assert_eq!(api.url("login"), "http://localhost:8081/api/login");
    }
}
