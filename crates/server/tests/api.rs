use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::NaiveDate;
use http_body_util::BodyExt;
use memstore::MemoryStore;
use model::Role;
use model::dto::{ClientCreateDto, NamedActionDto, OrderCreateDto, OrderProductDto, ProductCreateDto};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use server::AppState;
use server::auth::JwtManager;
use server::metrics::Metrics;
use service::{Categories, Clients, CrudService, OrderProducts, Orders, Producers, Products, Suppliers};
use tower::ServiceExt;

const ADMIN_PASSWORD: &str = "admin-pw";

struct TestApp {
    router: Router,
    store: MemoryStore,
}

impl TestApp {
    async fn new() -> Self {
        let store = MemoryStore::new();
        let uow = store.unit_of_work().await;
        for (login, role) in [
            ("admin", Role::Administrator),
            ("manager", Role::Manager),
            ("alice", Role::Customer),
        ] {
            CrudService::<Clients>::new(&uow)
                .add(ClientCreateDto {
                    full_name: format!("{login} full name"),
                    role,
                    login: login.to_string(),
                    password: ADMIN_PASSWORD.to_string(),
                })
                .await
                .unwrap();
        }

        let state = AppState {
            factory: Arc::new(store.clone()),
            jwt: Arc::new(JwtManager::new(
                "test-secret",
                "store",
                "clients",
                Duration::from_secs(600),
            )),
            metrics: Arc::new(Metrics::new().unwrap()),
            default_page_size: 2,
        };
        Self {
            router: server::router(state),
            store,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    async fn login(&self, login: &str) -> String {
        let (status, body) = self
            .send(json_request(
                "POST",
                "/api/login",
                None,
                json!({"login": login, "password": ADMIN_PASSWORD}),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        let value: Value = serde_json::from_slice(&body).unwrap();
        value["token"].as_str().unwrap().to_string()
    }

    async fn get(&self, uri: &str, token: &str) -> (StatusCode, Vec<u8>) {
        self.send(
            Request::get(uri)
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    async fn seed_order(&self) -> i32 {
        let uow = self.store.unit_of_work().await;
        CrudService::<Categories>::new(&uow)
            .add(NamedActionDto { name: "Tools".into() })
            .await
            .unwrap();
        CrudService::<Producers>::new(&uow)
            .add(NamedActionDto { name: "Acme".into() })
            .await
            .unwrap();
        CrudService::<Suppliers>::new(&uow)
            .add(NamedActionDto { name: "Wholesale".into() })
            .await
            .unwrap();
        for (article, cents, discount) in [("A", 5000, 10), ("B", 2000, 0)] {
            CrudService::<Products>::new(&uow)
                .add(ProductCreateDto {
                    article: article.to_string(),
                    category_id: 1,
                    producer_id: 1,
                    supplier_id: 1,
                    name: format!("Product {article}"),
                    measurement: "pcs".to_string(),
                    price: Decimal::new(cents, 2),
                    quantity: 10,
                    discount,
                    description: String::new(),
                    image_name: None,
                })
                .await
                .unwrap();
        }
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        let order_id = CrudService::<Orders>::new(&uow)
            .add(OrderCreateDto {
                client_id: 3,
                order_date: date,
                delivery_date: date,
                receive_code: 777,
                status: "New".to_string(),
            })
            .await
            .unwrap()
            .id;
        for (article, amount) in [("A", 2), ("B", 1)] {
            CrudService::<OrderProducts>::new(&uow)
                .add(OrderProductDto {
                    order_id,
                    product_article: article.to_string(),
                    amount,
                })
                .await
                .unwrap();
        }
        order_id
    }
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send(Request::get("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = TestApp::new().await;
    let (status, _) = app
        .send(Request::get("/api/categories").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.get("/api/categories", "garbage").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_with_wrong_password_is_unauthorized() {
    let app = TestApp::new().await;
    for (login, password) in [("admin", "wrong"), ("nobody", ADMIN_PASSWORD)] {
        let (status, body) = app
            .send(json_request(
                "POST",
                "/api/login",
                None,
                json!({"login": login, "password": password}),
            ))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(String::from_utf8(body).unwrap(), "Invalid login or password");
    }
}

#[tokio::test]
async fn test_login_response() {
    let app = TestApp::new().await;
    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/login",
            None,
            json!({"login": "alice", "password": ADMIN_PASSWORD}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let value: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(value["clientFullName"], "alice full name");
    assert_eq!(value["clientId"], 3);
    assert_eq!(value["role"], "Customer");
}

#[tokio::test]
async fn test_category_crud() {
    let app = TestApp::new().await;
    let token = app.login("admin").await;

    let (status, body) = app.get("/api/categories", &token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());

    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/categories",
            Some(&token),
            json!({"name": "Tools"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    let created: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(created, json!({"id": 1, "name": "Tools"}));

    let (status, body) = app
        .send(json_request(
            "PUT",
            "/api/categories/1",
            Some(&token),
            json!({"name": "Hand tools"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"true");

    let (status, body) = app.get("/api/categories/1", &token).await;
    assert_eq!(status, StatusCode::OK);
    let fetched: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(fetched["name"], "Hand tools");

    let (status, body) = app
        .send(
            Request::delete("/api/categories/1")
                .header(header::AUTHORIZATION, format!("Bearer {token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"true");

    let (status, body) = app.get("/api/categories/1", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(String::from_utf8(body).unwrap(), "Category 1 not found");
}

#[tokio::test]
async fn test_customer_cannot_write_catalogue() {
    let app = TestApp::new().await;
    let token = app.login("alice").await;
    let (status, _) = app
        .send(json_request(
            "POST",
            "/api/categories",
            Some(&token),
            json!({"name": "Tools"}),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let manager = app.login("manager").await;
    let (status, _) = app
        .send(json_request(
            "POST",
            "/api/categories",
            Some(&manager),
            json!({"name": "Tools"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_json_is_bad_request() {
    let app = TestApp::new().await;
    let token = app.login("admin").await;
    let (status, _) = app
        .send(json_request(
            "POST",
            "/api/categories",
            Some(&token),
            json!({"title": 5}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(json_request(
            "POST",
            "/api/categories",
            Some(&token),
            json!({"name": "   "}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_paged_listing() {
    let app = TestApp::new().await;
    let token = app.login("admin").await;

    let (status, body) = app.get("/api/clients?page=1&pageSize=2", &token).await;
    assert_eq!(status, StatusCode::OK);
    let page: Vec<Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0]["login"], "admin");
    assert!(page[0].get("password").is_none());

    let (_, body) = app.get("/api/clients?page=2", &token).await;
    let page: Vec<Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0]["login"], "alice");

    let (status, _) = app.get("/api/clients?page=3&pageSize=2", &token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = app.get("/api/clients", &token).await;
    let all: Vec<Value> = serde_json::from_slice(&body).unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn test_order_full_info() {
    let app = TestApp::new().await;
    let order_id = app.seed_order().await;
    let token = app.login("alice").await;

    let (status, body) = app
        .get(&format!("/api/orders/{order_id}/fullinfo"), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    let info: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(info["clientFullName"], "alice full name");
    assert_eq!(info["order"]["receiveCode"], 777);
    assert_eq!(info["products"].as_array().unwrap().len(), 2);
    let total: Decimal = serde_json::from_value(info["totalPrice"].clone()).unwrap();
    let discounted: Decimal = serde_json::from_value(info["totalDiscountedPrice"].clone()).unwrap();
    assert_eq!(total, Decimal::new(12000, 2));
    assert_eq!(discounted, Decimal::new(11000, 2));

    let (status, _) = app.get("/api/orders/999/fullinfo", &token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_product_full_info() {
    let app = TestApp::new().await;
    app.seed_order().await;
    let token = app.login("alice").await;

    let (status, body) = app.get("/api/products/A/fullinfo", &token).await;
    assert_eq!(status, StatusCode::OK);
    let info: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(info["categoryName"], "Tools");
    assert_eq!(info["product"]["article"], "A");
}

#[tokio::test]
async fn test_order_product_routes() {
    let app = TestApp::new().await;
    let order_id = app.seed_order().await;
    let token = app.login("alice").await;

    let (status, body) = app
        .get(&format!("/api/orderproducts/order/{order_id}"), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    let lines: Vec<OrderProductDto> = serde_json::from_slice(&body).unwrap();
    let articles: Vec<_> = lines.iter().map(|l| l.product_article.as_str()).collect();
    assert_eq!(articles, vec!["A", "B"]);

    let (status, body) = app
        .get(&format!("/api/orderproducts/orderid/{order_id}/article/B"), &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    let line: OrderProductDto = serde_json::from_slice(&body).unwrap();
    assert_eq!(line.amount, 1);

    let (status, _) = app
        .send(json_request(
            "PUT",
            &format!("/api/orderproducts/orderid/{order_id}/article/B"),
            Some(&token),
            json!({"amount": 4}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/api/orderproducts/order/999", &token).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn test_deleted_client_loses_access() {
    let app = TestApp::new().await;
    let admin = app.login("admin").await;
    let manager = app.login("manager").await;

    let (status, _) = app
        .send(
            Request::delete("/api/clients/2")
                .header(header::AUTHORIZATION, format!("Bearer {admin}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/api/categories", &manager).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = TestApp::new().await;
    app.send(Request::get("/health").body(Body::empty()).unwrap())
        .await;
    let (status, body) = app
        .send(Request::get("/metrics").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("http_requests_total"));
    assert!(text.contains("endpoint=\"/health\""));
}
