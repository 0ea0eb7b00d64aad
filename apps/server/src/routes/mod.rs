//! # HTTP Routes
//!
//! ```text
//! /health                              liveness + database check
//! /api/catalog/*                       public storefront (no auth)
//! /api/admin/login                     credentials → bearer token
//! /api/admin/{products,sales,...}      AdminSession required
//! /api/feed                            WebSocket change feed
//! ```

pub mod auth;
pub mod catalog;
pub mod customers;
pub mod products;
pub mod reports;
pub mod sales;
pub mod settings;

use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post, put};
use axum::Router;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::config::ServerConfig;
use crate::feed;
use crate::state::AppState;

/// Largest page a list endpoint returns.
pub const MAX_LIST_LIMIT: u32 = 500;

/// Creates the application router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let catalog = Router::new()
        .route("/products", get(catalog::list_products))
        .route("/products/{id}", get(catalog::get_product))
        .route("/categories", get(catalog::categories))
        .route("/store", get(catalog::store));

    let admin = Router::new()
        .route("/login", post(auth::login))
        // Inventory
        .route("/products", get(products::list).post(products::create))
        .route("/products/barcode/{code}", get(products::by_barcode))
        .route(
            "/products/{id}",
            get(products::get).put(products::update).delete(products::delete),
        )
        .route("/products/{id}/stock", post(products::adjust_stock))
        // Point of sale
        .route("/sales", get(sales::list).post(sales::checkout))
        .route("/sales/{id}", get(sales::get).delete(sales::delete))
        .route("/sales/{id}/payments", post(sales::add_payment))
        .route("/sales/{id}/installments/pay", post(sales::pay_installments))
        // Customers
        .route("/customers", get(customers::list).post(customers::create))
        .route(
            "/customers/{id}",
            get(customers::get).put(customers::update).delete(customers::delete),
        )
        // Settings
        .route("/settings", get(settings::get).put(settings::update_links))
        .route(
            "/settings/admins",
            get(settings::list_admins).post(settings::add_admin),
        )
        .route(
            "/settings/admins/{username}",
            put(settings::change_password).delete(settings::remove_admin),
        )
        // Reports
        .route("/reports/summary", get(reports::summary))
        .route("/reports/top-products", get(reports::top_products))
        .route("/reports/low-stock", get(reports::low_stock))
        .route("/reports/overdue", get(reports::overdue))
        .route("/reports/inventory", get(reports::inventory))
        .route("/reports/daily", get(reports::daily));

    let cors = cors_layer(&state.config);

    Router::new()
        .route("/health", get(health))
        .nest("/api/catalog", catalog)
        .nest("/api/admin", admin)
        .route("/api/feed", get(feed::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Liveness plus a `SELECT 1` against the database.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let database = state.db.health_check().await;
    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if database { "ok" } else { "degraded" },
            "database": database,
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let base = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if config.server.cors_origins.is_empty() {
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .server
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    base.allow_origin(origins)
}

/// Clamps a requested page size.
pub(crate) fn clamp_limit(limit: Option<u32>) -> Option<u32> {
    limit.map(|l| l.clamp(1, MAX_LIST_LIMIT))
}
