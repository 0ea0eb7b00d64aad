//! Customer accounts and their receivables.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{NaiveDate, Utc};
use mercado_core::validation::{validate_customer_name, validate_new_customer, validate_search_query};
use mercado_core::{ChangeKind, Collection, Customer, CustomerPatch, NewCustomer, SaleStatus};
use mercado_db::{generate_id, SaleFilter};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::AdminSession;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CustomerQuery {
    pub q: Option<String>,
}

/// An unpaid installment on one of the customer's sales.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingInstallment {
    pub sale_id: String,
    pub number: u32,
    pub amount_cents: i64,
    pub due_date: NaiveDate,
    pub overdue: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetail {
    #[serde(flatten)]
    pub customer: Customer,
    pub pending_installments: Vec<PendingInstallment>,
}

pub async fn list(
    _admin: AdminSession,
    State(state): State<AppState>,
    Query(query): Query<CustomerQuery>,
) -> ApiResult<Json<Vec<Customer>>> {
    let term = query.q.as_deref().map(validate_search_query).transpose()?;
    let term = term.as_deref().filter(|t| !t.is_empty());
    Ok(Json(state.db.customers().list(term).await?))
}

pub async fn create(
    admin: AdminSession,
    State(state): State<AppState>,
    Json(input): Json<NewCustomer>,
) -> ApiResult<(StatusCode, Json<Customer>)> {
    validate_new_customer(&input)?;

    let customer = Customer::new(generate_id(), input, Utc::now());
    let customer = state.db.customers().insert(&customer).await?;

    info!(id = %customer.id, by = %admin.username, "Customer created");
    state.publish(Collection::Customers, &customer.id, ChangeKind::Created);
    Ok((StatusCode::CREATED, Json(customer)))
}

/// The customer plus every unpaid installment, soonest first.
pub async fn get(
    _admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<CustomerDetail>> {
    let customer = state
        .db
        .customers()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Customer", &id))?;

    let filter = SaleFilter {
        customer_id: Some(customer.id.clone()),
        status: Some(SaleStatus::Pending),
        ..SaleFilter::default()
    };
    let sales = state.db.sales().list(&filter).await?;

    let today = Utc::now().date_naive();
    let mut pending: Vec<PendingInstallment> = sales
        .iter()
        .flat_map(|sale| {
            sale.pending_installments().map(move |i| PendingInstallment {
                sale_id: sale.id.clone(),
                number: i.number,
                amount_cents: i.amount_cents,
                due_date: i.due_date,
                overdue: i.is_overdue(today),
            })
        })
        .collect();
    pending.sort_by(|a, b| a.due_date.cmp(&b.due_date).then(a.number.cmp(&b.number)));

    Ok(Json(CustomerDetail {
        customer,
        pending_installments: pending,
    }))
}

pub async fn update(
    admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<CustomerPatch>,
) -> ApiResult<Json<Customer>> {
    if let Some(name) = &patch.name {
        validate_customer_name(name)?;
    }

    let mut customer = state
        .db
        .customers()
        .get_by_id(&id)
        .await?
        .ok_or_else(|| ApiError::not_found("Customer", &id))?;

    customer.apply_patch(patch, Utc::now());
    validate_new_customer(&NewCustomer {
        name: customer.name.clone(),
        contact: customer.contact.clone(),
    })?;
    state.db.customers().update(&customer).await?;

    info!(id = %customer.id, by = %admin.username, "Customer updated");
    state.publish(Collection::Customers, &customer.id, ChangeKind::Updated);
    Ok(Json(customer))
}

/// Sales keep their reference to a deleted customer.
pub async fn delete(
    admin: AdminSession,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.db.customers().delete(&id).await?;

    info!(id = %id, by = %admin.username, "Customer deleted");
    state.publish(Collection::Customers, id, ChangeKind::Deleted);
    Ok(StatusCode::NO_CONTENT)
}
