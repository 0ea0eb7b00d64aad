//! End-to-end tests against the router with an in-memory database.

use axum::body::{to_bytes, Body};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, StatusCode};
use std::time::Duration;

use axum::Router;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use mercado_core::{ChangeEvent, ChangeKind, Collection};
use mercado_db::{Database, DbConfig};
use mercado_server::auth::new_credential;
use mercado_server::{build_router, AppState, ServerConfig};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tower::ServiceExt;

const ADMIN: &str = "admin";
const PASSWORD: &str = "correct-horse";

async fn setup_state() -> AppState {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    let credential = new_credential(ADMIN, PASSWORD).await.unwrap();
    db.settings().insert_admin(&credential).await.unwrap();

    AppState::new(db, ServerConfig::default())
}

async fn setup() -> Router {
    build_router(setup_state().await)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn login(app: &Router, username: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/admin/login",
        None,
        Some(json!({ "username": username, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["token"].as_str().unwrap().to_string()
}

async fn create_product(app: &Router, token: &str, name: &str, stock: i64) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/admin/products",
        Some(token),
        Some(json!({
            "name": name,
            "category": "clothing",
            "costPriceCents": 1800,
            "salePriceCents": 3000,
            "stock": stock,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create product failed: {}", body);
    body["id"].as_str().unwrap().to_string()
}

async fn create_customer(app: &Router, token: &str, name: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/admin/customers",
        Some(token),
        Some(json!({ "name": name, "contact": "555-0101" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create customer failed: {}", body);
    body["id"].as_str().unwrap().to_string()
}

async fn credit_sale(app: &Router, token: &str, product: &str, customer: &str, plan: Option<u32>) -> Value {
    let mut request = json!({
        "items": [{ "productId": product, "quantity": 2 }],
        "type": "credit",
        "customerId": customer,
    });
    if let Some(n) = plan {
        request["installmentPlan"] = json!({ "numberOfInstallments": n, "frequency": "monthly" });
    }
    let (status, sale) = send(app, Method::POST, "/api/admin/sales", Some(token), Some(request)).await;
    assert_eq!(status, StatusCode::CREATED, "checkout failed: {}", sale);
    sale
}

fn drain(rx: &mut broadcast::Receiver<ChangeEvent>) -> Vec<ChangeEvent> {
    std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

// =============================================================================
// Health & Catalog
// =============================================================================

#[tokio::test]
async fn test_health() {
    let app = setup().await;
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], true);
}

#[tokio::test]
async fn test_catalog_hides_inactive_products_and_cost() {
    let app = setup().await;
    let token = login(&app, ADMIN, PASSWORD).await;
    let shirt = create_product(&app, &token, "Linen Shirt", 4).await;
    let hidden = create_product(&app, &token, "Old Stock", 2).await;

    let (status, _) = send(
        &app,
        Method::PUT,
        &format!("/api/admin/products/{}", hidden),
        Some(&token),
        Some(json!({ "active": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, Method::GET, "/api/catalog/products", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let products = body.as_array().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0]["id"], shirt.as_str());
    assert_eq!(products[0]["salePriceCents"], 3000);
    assert!(products[0].get("costPriceCents").is_none());

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/catalog/products/{}", hidden),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, Method::GET, "/api/catalog/categories", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let clothing = body
        .as_array()
        .unwrap()
        .iter()
        .find(|c| c["category"] == "clothing")
        .unwrap();
    assert_eq!(clothing["count"], 1);
}

#[tokio::test]
async fn test_catalog_rejects_unknown_category() {
    let app = setup().await;
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/catalog/products?category=spaceships",
        None,
        None,
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

// =============================================================================
// Authentication
// =============================================================================

#[tokio::test]
async fn test_admin_routes_require_token() {
    let app = setup().await;

    let (status, body) = send(&app, Method::GET, "/api/admin/products", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = send(&app, Method::GET, "/api/admin/products", Some("garbage"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_rejects_wrong_password() {
    let app = setup().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/admin/login",
        None,
        Some(json!({ "username": ADMIN, "password": "not-the-password" })),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.get("token").is_none());
}

// =============================================================================
// Point of Sale
// =============================================================================

#[tokio::test]
async fn test_credit_sale_with_installments() {
    let app = setup().await;
    let token = login(&app, ADMIN, PASSWORD).await;
    let product = create_product(&app, &token, "Denim Jacket", 10).await;
    let customer = create_customer(&app, &token, "Ana Souza").await;

    let (status, sale) = send(
        &app,
        Method::POST,
        "/api/admin/sales",
        Some(&token),
        Some(json!({
            "items": [{ "productId": product, "quantity": 3 }],
            "type": "credit",
            "customerId": customer,
            "installmentPlan": { "numberOfInstallments": 3, "frequency": "monthly" },
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "checkout failed: {}", sale);
    assert_eq!(sale["totalCents"], 9000);
    assert_eq!(sale["status"], "pending");
    assert_eq!(sale["remainingBalanceCents"], 9000);
    let sale_id = sale["id"].as_str().unwrap().to_string();

    let installments = sale["installmentPlan"]["installments"].as_array().unwrap();
    assert_eq!(installments.len(), 3);
    assert!(installments.iter().all(|i| i["amountCents"] == 3000));

    let (_, stocked) = send(
        &app,
        Method::GET,
        &format!("/api/admin/products/{}", product),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(stocked["stock"], 7);

    let (_, detail) = send(
        &app,
        Method::GET,
        &format!("/api/admin/customers/{}", customer),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(detail["balanceCents"], 9000);
    assert_eq!(detail["history"][0], sale_id.as_str());
    assert_eq!(detail["pendingInstallments"].as_array().unwrap().len(), 3);

    let (status, paid) = send(
        &app,
        Method::POST,
        &format!("/api/admin/sales/{}/installments/pay", sale_id),
        Some(&token),
        Some(json!({ "installments": [1, 2], "method": "card" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "payment failed: {}", paid);
    assert_eq!(paid["remainingBalanceCents"], 3000);
    assert_eq!(paid["status"], "pending");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/admin/sales/{}/installments/pay", sale_id),
        Some(&token),
        Some(json!({ "installments": [1] })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "BUSINESS_LOGIC");

    let (_, settled) = send(
        &app,
        Method::POST,
        &format!("/api/admin/sales/{}/installments/pay", sale_id),
        Some(&token),
        Some(json!({ "installments": [3] })),
    )
    .await;
    assert_eq!(settled["status"], "paid");
    assert_eq!(settled["remainingBalanceCents"], 0);

    let (_, detail) = send(
        &app,
        Method::GET,
        &format!("/api/admin/customers/{}", customer),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(detail["balanceCents"], 0);
    assert!(detail["pendingInstallments"].as_array().unwrap().is_empty());

    let (_, summary) = send(&app, Method::GET, "/api/admin/reports/summary", Some(&token), None).await;
    assert_eq!(summary["saleCount"], 1);
    assert_eq!(summary["revenueCents"], 9000);
    assert_eq!(summary["creditRevenueCents"], 9000);
    assert_eq!(summary["outstandingCents"], 0);
}

#[tokio::test]
async fn test_checkout_rejects_insufficient_stock() {
    let app = setup().await;
    let token = login(&app, ADMIN, PASSWORD).await;
    let product = create_product(&app, &token, "Sneakers", 2).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/admin/sales",
        Some(&token),
        Some(json!({
            "items": [{ "productId": product, "quantity": 5 }],
            "type": "cash",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INSUFFICIENT_STOCK");

    let (_, sales) = send(&app, Method::GET, "/api/admin/sales", Some(&token), None).await;
    assert!(sales.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_delete_sale_restores_stock() {
    let app = setup().await;
    let token = login(&app, ADMIN, PASSWORD).await;
    let product = create_product(&app, &token, "Scarf", 5).await;

    let (status, sale) = send(
        &app,
        Method::POST,
        "/api/admin/sales",
        Some(&token),
        Some(json!({
            "items": [{ "productId": product, "quantity": 2 }],
            "type": "cash",
            "paymentMethod": "transfer",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(sale["status"], "paid");

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/admin/sales/{}", sale["id"].as_str().unwrap()),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, restored) = send(
        &app,
        Method::GET,
        &format!("/api/admin/products/{}", product),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(restored["stock"], 5);
}

// =============================================================================
// Settings
// =============================================================================

#[tokio::test]
async fn test_admin_accounts() {
    let app = setup().await;
    let token = login(&app, ADMIN, PASSWORD).await;

    let (status, added) = send(
        &app,
        Method::POST,
        "/api/admin/settings/admins",
        Some(&token),
        Some(json!({ "username": "cashier", "password": "till-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(added["username"], "cashier");
    assert!(added.get("passwordHash").is_none());

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/admin/settings/admins",
        Some(&token),
        Some(json!({ "username": "cashier", "password": "another-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let cashier_token = login(&app, "cashier", "till-password").await;

    let (status, _) = send(
        &app,
        Method::DELETE,
        "/api/admin/settings/admins/cashier",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Removed admins lose access immediately
    let (status, _) = send(&app, Method::GET, "/api/admin/settings", Some(&cashier_token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/api/admin/settings/admins/{}", ADMIN),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "BUSINESS_LOGIC");
}

#[tokio::test]
async fn test_store_links_are_public() {
    let app = setup().await;
    let token = login(&app, ADMIN, PASSWORD).await;

    let (status, _) = send(
        &app,
        Method::PUT,
        "/api/admin/settings",
        Some(&token),
        Some(json!({ "storeName": "Casa Lima", "whatsapp": "+5491100000000" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, links) = send(&app, Method::GET, "/api/catalog/store", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(links["storeName"], "Casa Lima");
    assert_eq!(links["whatsapp"], "+5491100000000");
}

// =============================================================================
// Payments
// =============================================================================

#[tokio::test]
async fn test_free_form_payments() {
    let app = setup().await;
    let token = login(&app, ADMIN, PASSWORD).await;
    let product = create_product(&app, &token, "Wool Coat", 5).await;
    let customer = create_customer(&app, &token, "Bruno Lima").await;
    let sale = credit_sale(&app, &token, &product, &customer, None).await;
    let uri = format!("/api/admin/sales/{}/payments", sale["id"].as_str().unwrap());
    assert_eq!(sale["remainingBalanceCents"], 6000);

    let (status, body) = send(&app, Method::POST, &uri, Some(&token), Some(json!({ "amountCents": 7000 }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "PAYMENT_ERROR");

    let (status, body) = send(&app, Method::POST, &uri, Some(&token), Some(json!({ "amountCents": 0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, partial) = send(
        &app,
        Method::POST,
        &uri,
        Some(&token),
        Some(json!({ "amountCents": 2500, "method": "transfer", "note": "  first part " })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "payment failed: {}", partial);
    assert_eq!(partial["status"], "pending");
    assert_eq!(partial["remainingBalanceCents"], 3500);
    let payments = partial["payments"].as_array().unwrap();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0]["method"], "transfer");
    assert_eq!(payments[0]["note"], "first part");

    let (_, detail) = send(
        &app,
        Method::GET,
        &format!("/api/admin/customers/{}", customer),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(detail["balanceCents"], 3500);

    let (status, paid) = send(&app, Method::POST, &uri, Some(&token), Some(json!({ "amountCents": 3500 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(paid["status"], "paid");
    assert_eq!(paid["remainingBalanceCents"], 0);

    let (status, body) = send(&app, Method::POST, &uri, Some(&token), Some(json!({ "amountCents": 100 }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "BUSINESS_LOGIC");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/admin/sales/no-such-sale/payments",
        Some(&token),
        Some(json!({ "amountCents": 100 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_installment_selection_errors() {
    let app = setup().await;
    let token = login(&app, ADMIN, PASSWORD).await;
    let product = create_product(&app, &token, "Boots", 5).await;
    let customer = create_customer(&app, &token, "Carla Dias").await;
    let sale = credit_sale(&app, &token, &product, &customer, Some(2)).await;
    let sale_id = sale["id"].as_str().unwrap().to_string();
    let pay_uri = format!("/api/admin/sales/{}/installments/pay", sale_id);

    let (status, body) = send(&app, Method::POST, &pay_uri, Some(&token), Some(json!({ "installments": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = send(&app, Method::POST, &pay_uri, Some(&token), Some(json!({ "installments": [5] }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    // Repeated numbers in one request settle the installment once
    let (status, paid) = send(&app, Method::POST, &pay_uri, Some(&token), Some(json!({ "installments": [1, 1] }))).await;
    assert_eq!(status, StatusCode::OK, "payment failed: {}", paid);
    assert_eq!(paid["remainingBalanceCents"], 3000);
    assert_eq!(paid["payments"].as_array().unwrap().len(), 1);
    assert_eq!(paid["payments"][0]["amountCents"], 3000);

    // A batch with one settled installment is rejected whole
    let (status, body) = send(&app, Method::POST, &pay_uri, Some(&token), Some(json!({ "installments": [1, 2] }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "BUSINESS_LOGIC");

    let (status, body) = send(
        &app,
        Method::POST,
        &format!("/api/admin/sales/{}/payments", sale_id),
        Some(&token),
        Some(json!({ "amountCents": 1000 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "BUSINESS_LOGIC");

    let (_, current) = send(&app, Method::GET, &format!("/api/admin/sales/{}", sale_id), Some(&token), None).await;
    assert_eq!(current["remainingBalanceCents"], 3000);
    assert_eq!(current["installmentPlan"]["installments"][1]["status"], "pending");
}

// =============================================================================
// Inventory & Reports
// =============================================================================

#[tokio::test]
async fn test_stock_adjustment_bounds() {
    let app = setup().await;
    let token = login(&app, ADMIN, PASSWORD).await;
    let product = create_product(&app, &token, "Belt", 3).await;
    let uri = format!("/api/admin/products/{}/stock", product);

    let (status, body) = send(&app, Method::POST, &uri, Some(&token), Some(json!({ "delta": 4 }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stock"], 7);

    let (status, body) = send(&app, Method::POST, &uri, Some(&token), Some(json!({ "delta": i64::MAX }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = send(&app, Method::POST, &uri, Some(&token), Some(json!({ "delta": -8 }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "INSUFFICIENT_STOCK");

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/admin/products",
        Some(&token),
        Some(json!({
            "name": "Gold Watch",
            "category": "accessories",
            "costPriceCents": 1,
            "salePriceCents": i64::MAX,
            "stock": 1,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, value) = send(&app, Method::GET, "/api/admin/reports/inventory", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["units"], 7);
    assert_eq!(value["retailValueCents"], 21000);
}

#[tokio::test]
async fn test_report_date_ranges() {
    let app = setup().await;
    let token = login(&app, ADMIN, PASSWORD).await;
    let product = create_product(&app, &token, "Sun Hat", 5).await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/admin/sales",
        Some(&token),
        Some(json!({ "items": [{ "productId": product, "quantity": 1 }], "type": "cash" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let today = Utc::now().date_naive();
    let get = |path: String| {
        let app = app.clone();
        let token = token.clone();
        async move { send(&app, Method::GET, &path, Some(&token), None).await }
    };

    let (status, past) = get("/api/admin/reports/summary?from=2020-01-01&to=2020-01-31".to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(past["saleCount"], 0);
    assert_eq!(past["revenueCents"], 0);
    assert_eq!(past["collectedCents"], 0);

    let (_, current) = get(format!("/api/admin/reports/summary?from={today}&to={today}")).await;
    assert_eq!(current["saleCount"], 1);
    assert_eq!(current["revenueCents"], 3000);
    assert_eq!(current["collectedCents"], 3000);

    let (_, top) = get("/api/admin/reports/top-products?from=2020-01-01&to=2020-01-31".to_string()).await;
    assert!(top.as_array().unwrap().is_empty());
    let (_, top) = get(format!("/api/admin/reports/top-products?from={today}&to={today}")).await;
    assert_eq!(top[0]["productId"], product.as_str());

    let (_, daily) = get(format!("/api/admin/reports/daily?from={today}&to={today}")).await;
    let days = daily.as_array().unwrap();
    assert_eq!(days.len(), 1);
    assert_eq!(days[0]["revenueCents"], 3000);

    let (_, sales) = get("/api/admin/sales?from=2020-01-01&to=2020-01-31".to_string()).await;
    assert!(sales.as_array().unwrap().is_empty());

    let (status, body) = get("/api/admin/reports/summary?from=2026-02-01&to=2026-01-01".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, _) = get("/api/admin/sales?from=2026-02-01&to=2026-01-01".to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Change Feed
// =============================================================================

#[tokio::test]
async fn test_mutations_publish_change_events() {
    let state = setup_state().await;
    let mut rx = state.feed.subscribe();
    let app = build_router(state);
    let token = login(&app, ADMIN, PASSWORD).await;
    assert!(drain(&mut rx).is_empty());

    let product = create_product(&app, &token, "Tote Bag", 4).await;
    let customer = create_customer(&app, &token, "Dora Reis").await;
    let events = drain(&mut rx);
    assert_eq!(events.len(), 2);
    assert_eq!(
        (events[0].collection, events[0].id.as_str(), events[0].kind),
        (Collection::Products, product.as_str(), ChangeKind::Created)
    );
    assert_eq!(
        (events[1].collection, events[1].id.as_str(), events[1].kind),
        (Collection::Customers, customer.as_str(), ChangeKind::Created)
    );

    let sale = credit_sale(&app, &token, &product, &customer, None).await;
    let sale_id = sale["id"].as_str().unwrap();
    let events = drain(&mut rx);
    assert!(events
        .iter()
        .any(|e| e.collection == Collection::Sales && e.id == sale_id && e.kind == ChangeKind::Created));
    assert!(events
        .iter()
        .any(|e| e.collection == Collection::Products && e.id == product && e.kind == ChangeKind::Updated));
    assert!(events
        .iter()
        .any(|e| e.collection == Collection::Customers && e.id == customer && e.kind == ChangeKind::Updated));

    // Failed mutations publish nothing
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/admin/sales/{}/payments", sale_id),
        Some(&token),
        Some(json!({ "amountCents": 999_999 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(drain(&mut rx).is_empty());

    let (status, _) = send(&app, Method::DELETE, &format!("/api/admin/sales/{}", sale_id), Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let events = drain(&mut rx);
    assert_eq!(events[0].collection, Collection::Sales);
    assert_eq!(events[0].kind, ChangeKind::Deleted);
}

#[tokio::test]
async fn test_feed_socket_streams_events() {
    let app = setup().await;
    let token = login(&app, ADMIN, PASSWORD).await;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = app.clone();
    tokio::spawn(async move { axum::serve(listener, server).await });

    let (mut socket, _) = tokio_tungstenite::connect_async(format!("ws://{}/api/feed", addr))
        .await
        .unwrap();

    // A pong means the server side is reading, so it has subscribed
    socket.send(Message::Ping(Default::default())).await.unwrap();
    loop {
        let message = socket.next().await.unwrap().unwrap();
        if matches!(message, Message::Pong(_)) {
            break;
        }
    }

    let product = create_product(&app, &token, "Silk Scarf", 2).await;

    let message = tokio::time::timeout(Duration::from_secs(5), socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    let frame: Value = serde_json::from_str(message.to_text().unwrap()).unwrap();
    assert_eq!(frame["collection"], "products");
    assert_eq!(frame["id"], product.as_str());
    assert_eq!(frame["kind"], "created");
    assert!(frame["at"].is_string());

    socket.close(None).await.unwrap();
}
