//! Public storefront. Only active products, never cost prices.

use axum::extract::{Path, Query, State};
use axum::Json;
use mercado_core::validation::validate_search_query;
use mercado_core::{Category, CategoryCount, PublicProduct, StoreLinks};
use mercado_db::ProductFilter;
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::routes::clamp_limit;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    pub category: Option<String>,
    pub q: Option<String>,
    pub limit: Option<u32>,
}

/// Parses an optional `category` query value.
pub(crate) fn parse_category(value: Option<&str>) -> ApiResult<Option<Category>> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(v) => Category::parse(v)
            .map(Some)
            .ok_or_else(|| ApiError::validation(format!("Unknown category: {}", v))),
    }
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> ApiResult<Json<Vec<PublicProduct>>> {
    let filter = ProductFilter {
        category: parse_category(query.category.as_deref())?,
        query: query.q.as_deref().map(validate_search_query).transpose()?,
        limit: clamp_limit(query.limit),
        ..ProductFilter::storefront()
    };

    let products = state.db.products().list(&filter).await?;
    Ok(Json(products.iter().map(|p| p.to_public()).collect()))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<PublicProduct>> {
    state
        .db
        .products()
        .get_by_id(&id)
        .await?
        .filter(|p| p.active)
        .map(|p| Json(p.to_public()))
        .ok_or_else(|| ApiError::not_found("Product", &id))
}

pub async fn categories(State(state): State<AppState>) -> ApiResult<Json<Vec<CategoryCount>>> {
    Ok(Json(state.db.products().category_counts().await?))
}

pub async fn store(State(state): State<AppState>) -> ApiResult<Json<StoreLinks>> {
    Ok(Json(state.db.settings().get_links().await?))
}
