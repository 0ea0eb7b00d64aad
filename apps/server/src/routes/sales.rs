//! Point of sale: checkout, sale lookup, payments and deletion.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::NaiveDate;
use mercado_core::checkout::CheckoutRequest;
use mercado_core::validation::validate_payment_amount;
use mercado_core::{
    ChangeKind, Collection, Money, PaymentMethod, Sale, SaleStatus, SaleType,
};
use mercado_db::SaleFilter;
use serde::Deserialize;
use tracing::info;

use crate::auth::AdminSession;
use crate::error::{ApiError, ApiResult};
use crate::routes::clamp_limit;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub status: Option<SaleStatus>,
    #[serde(rename = "type")]
    pub sale_type: Option<SaleType>,
    pub customer_id: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub amount_cents: i64,
    #[serde(default)]
    pub method: PaymentMethod,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayInstallmentsRequest {
    pub installments: Vec<u32>,
    #[serde(default)]
    pub method: PaymentMethod,
    #[serde(default)]
    pub note: Option<String>,
}

fn clean_note(note: Option<String>) -> Option<String> {
    note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}

/// Publishes the sale plus everything a sale touches: its products and
/// the customer whose balance moved.
fn publish_sale(state: &AppState, sale: &Sale, kind: ChangeKind) {
    state.publish(Collection::Sales, &sale.id, kind);
    if matches!(kind, ChangeKind::Created | ChangeKind::Deleted) {
        for item in &sale.items {
            state.publish(Collection::Products, &item.product_id, ChangeKind::Updated);
        }
    }
    if let Some(customer_id) = &sale.customer_id {
        state.publish(Collection::Customers, customer_id, ChangeKind::Updated);
    }
}

pub async fn list(
    _admin: AdminSession,
    State(state): State<AppState>,
    Query(query): Query<SaleQuery>,
) -> ApiResult<Json<Vec<Sale>>> {
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(ApiError::validation("from must not be after to"));
        }
    }

    let filter = SaleFilter {
        from: query.from,
        to: query.to,
        status: query.status,
        sale_type: query.sale_type,
        customer_id: query.customer_id.filter(|id| !id.trim().is_empty()),
        limit: clamp_limit(query.limit),
    };
    Ok(Json(state.db.sales().list(&filter).await?))
}

/// `POST /api/admin/sales`
pub async fn checkout(
    admin: AdminSession,
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> ApiResult<(StatusCode, Json<Sale>)> {
    let sale = state
        .db
        .sales()
        .checkout(&request, state.allow_negative_stock())
        .await?;

    info!(sale_id = %sale.id, total = %sale.total(), by = %admin.username, "Checkout complete");
    publish_sale(&state, &sale, ChangeKind::Created);
    Ok((StatusCode::CREATED, Json(sale)))
}

pub async fn get(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Sale>> {
    state
        .db
        .sales()
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Sale", &id))
}

pub async fn delete(
    admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let sale = state.db.sales().delete(&id).await?;

    info!(sale_id = %sale.id, by = %admin.username, "Sale removed");
    publish_sale(&state, &sale, ChangeKind::Deleted);
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/admin/sales/{id}/payments`
pub async fn add_payment(
    admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<PaymentRequest>,
) -> ApiResult<Json<Sale>> {
    validate_payment_amount(request.amount_cents)?;

    let sale = state
        .db
        .sales()
        .add_payment(
            &id,
            Money::from_cents(request.amount_cents),
            request.method,
            clean_note(request.note),
        )
        .await?;

    info!(sale_id = %sale.id, by = %admin.username, "Payment taken");
    publish_sale(&state, &sale, ChangeKind::Updated);
    Ok(Json(sale))
}

/// `POST /api/admin/sales/{id}/installments/pay`
pub async fn pay_installments(
    admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<PayInstallmentsRequest>,
) -> ApiResult<Json<Sale>> {
    if request.installments.is_empty() {
        return Err(ApiError::validation("Select at least one installment"));
    }

    let sale = state
        .db
        .sales()
        .pay_installments(
            &id,
            &request.installments,
            request.method,
            clean_note(request.note),
        )
        .await?;

    info!(
        sale_id = %sale.id,
        installments = ?request.installments,
        by = %admin.username,
        "Installments collected"
    );
    publish_sale(&state, &sale, ChangeKind::Updated);
    Ok(Json(sale))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_note() {
        assert_eq!(clean_note(Some("  ".into())), None);
        assert_eq!(clean_note(Some(" abono ".into())), Some("abono".into()));
        assert_eq!(clean_note(None), None);
    }
}
