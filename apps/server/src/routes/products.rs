//! Admin inventory: product CRUD, stock adjustment and barcode lookup.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use mercado_core::validation::{
    validate_new_product, validate_product_patch, validate_search_query, validate_stock,
};
use mercado_core::{ChangeKind, Collection, NewProduct, Product, ProductPatch};
use mercado_db::{generate_id, ProductFilter};
use serde::Deserialize;
use tracing::info;

use crate::auth::AdminSession;
use crate::error::{ApiError, ApiResult};
use crate::routes::catalog::parse_category;
use crate::routes::clamp_limit;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductQuery {
    pub category: Option<String>,
    pub q: Option<String>,
    /// Hide deactivated products.
    #[serde(default)]
    pub active_only: bool,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct StockAdjustment {
    /// Units to add (positive) or remove (negative).
    pub delta: i64,
}

fn check_stock(state: &AppState, stock: i64) -> ApiResult<()> {
    if stock < 0 && !state.allow_negative_stock() {
        return Err(ApiError::validation("stock cannot be negative"));
    }
    Ok(())
}

pub async fn list(
    _admin: AdminSession,
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
) -> ApiResult<Json<Vec<Product>>> {
    let filter = ProductFilter {
        category: parse_category(query.category.as_deref())?,
        query: query.q.as_deref().map(validate_search_query).transpose()?,
        active_only: query.active_only,
        limit: clamp_limit(query.limit),
    };
    Ok(Json(state.db.products().list(&filter).await?))
}

pub async fn create(
    admin: AdminSession,
    State(state): State<AppState>,
    Json(input): Json<NewProduct>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    validate_new_product(&input)?;
    check_stock(&state, input.stock)?;

    let product = Product::new(generate_id(), input, Utc::now());
    let product = state.db.products().insert(&product).await?;

    info!(id = %product.id, name = %product.name, by = %admin.username, "Product created");
    state.publish(Collection::Products, &product.id, ChangeKind::Created);
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn get(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Product>> {
    state
        .db
        .products()
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Product", &id))
}

pub async fn by_barcode(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<Json<Product>> {
    state
        .db
        .products()
        .get_by_barcode(&code)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Product with barcode", &code))
}

pub async fn update(
    admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<ProductPatch>,
) -> ApiResult<Json<Product>> {
    validate_product_patch(&patch)?;
    if let Some(stock) = patch.stock {
        check_stock(&state, stock)?;
    }

    let mut product = state
        .db
        .products()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product", &id))?;

    product.apply_patch(patch, Utc::now());
    state.db.products().update(&product).await?;

    info!(id = %product.id, by = %admin.username, "Product updated");
    state.publish(Collection::Products, &product.id, ChangeKind::Updated);
    Ok(Json(product))
}

pub async fn delete(
    admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.db.products().delete(&id).await?;

    info!(id = %id, by = %admin.username, "Product deleted");
    state.publish(Collection::Products, id, ChangeKind::Deleted);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn adjust_stock(
    admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(adjustment): Json<StockAdjustment>,
) -> ApiResult<Json<Product>> {
    if adjustment.delta == 0 {
        return Err(ApiError::validation("delta cannot be zero"));
    }
    validate_stock("delta", adjustment.delta)?;

    let product = state
        .db
        .products()
        .adjust_stock(&id, adjustment.delta, state.allow_negative_stock())
        .await?;

    info!(
        id = %product.id,
        delta = adjustment.delta,
        stock = product.stock,
        by = %admin.username,
        "Stock adjusted"
    );
    state.publish(Collection::Products, &product.id, ChangeKind::Updated);
    Ok(Json(product))
}
