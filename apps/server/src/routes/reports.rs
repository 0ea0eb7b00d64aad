//! Read-only reports. Records are loaded here, aggregation lives in
//! `mercado_core::report`.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{Days, NaiveDate, Utc};
use mercado_core::report::{
    self, DailyRevenue, DateRange, InventoryValuation, LowStockItem, OverdueInstallment,
    SalesSummary, TopProduct,
};
use mercado_db::{ProductFilter, SaleFilter};
use serde::Deserialize;

use crate::auth::AdminSession;
use crate::error::ApiResult;
use crate::state::AppState;

/// Window used when a range report is requested without dates.
const DEFAULT_RANGE_DAYS: u64 = 30;
const DEFAULT_TOP_LIMIT: usize = 10;
const MAX_TOP_LIMIT: usize = 100;

#[derive(Debug, Default, Deserialize)]
pub struct RangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: Option<usize>,
}

impl RangeQuery {
    /// `to` defaults to today, `from` to 29 days before `to`.
    fn range(&self, today: NaiveDate) -> ApiResult<DateRange> {
        let to = self.to.unwrap_or(today);
        let from = self.from.unwrap_or_else(|| {
            to.checked_sub_days(Days::new(DEFAULT_RANGE_DAYS - 1))
                .unwrap_or(to)
        });
        Ok(DateRange::new(from, to)?)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ThresholdQuery {
    pub threshold: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverdueQuery {
    pub as_of: Option<NaiveDate>,
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// `GET /api/admin/reports/summary`
pub async fn summary(
    _admin: AdminSession,
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<SalesSummary>> {
    let range = query.range(today())?;
    let sales = state
        .db
        .sales()
        .list(&SaleFilter::between(range.from, range.to))
        .await?;
    let receivables = state.db.sales().receivables(range.from, range.to).await?;
    Ok(Json(report::summarize(&sales, range, receivables)))
}

pub async fn top_products(
    _admin: AdminSession,
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<Vec<TopProduct>>> {
    let range = query.range(today())?;
    let limit = query.limit.unwrap_or(DEFAULT_TOP_LIMIT).clamp(1, MAX_TOP_LIMIT);

    let sales = state
        .db
        .sales()
        .list(&SaleFilter::between(range.from, range.to))
        .await?;
    Ok(Json(report::top_products(&sales, range, limit)))
}

pub async fn low_stock(
    _admin: AdminSession,
    State(state): State<AppState>,
    Query(query): Query<ThresholdQuery>,
) -> ApiResult<Json<Vec<LowStockItem>>> {
    let threshold = query
        .threshold
        .unwrap_or(state.config.inventory.low_stock_threshold);

    let products = state.db.products().list(&ProductFilter::storefront()).await?;
    Ok(Json(report::low_stock(&products, threshold)))
}

pub async fn overdue(
    _admin: AdminSession,
    State(state): State<AppState>,
    Query(query): Query<OverdueQuery>,
) -> ApiResult<Json<Vec<OverdueInstallment>>> {
    let as_of = query.as_of.unwrap_or_else(today);

    let sales = state.db.sales().list(&SaleFilter::pending()).await?;
    let names = state.db.customers().names().await?;
    Ok(Json(report::overdue(&sales, &names, as_of)))
}

pub async fn inventory(
    _admin: AdminSession,
    State(state): State<AppState>,
) -> ApiResult<Json<InventoryValuation>> {
    let products = state.db.products().list(&ProductFilter::storefront()).await?;
    Ok(Json(report::inventory_valuation(&products)?))
}

pub async fn daily(
    _admin: AdminSession,
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> ApiResult<Json<Vec<DailyRevenue>>> {
    let range = query.range(today())?;
    let sales = state
        .db
        .sales()
        .list(&SaleFilter::between(range.from, range.to))
        .await?;
    Ok(Json(report::daily_revenue(&sales, range)?))
}
