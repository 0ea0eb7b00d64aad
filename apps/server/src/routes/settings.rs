//! Store links and admin account management.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use mercado_core::validation::{validate_password, validate_store_links};
use mercado_core::{AdminSummary, ChangeKind, Collection, StoreLinks, StoreSettings};
use serde::Deserialize;
use tracing::info;

use crate::auth::{hash_password, new_credential, AdminSession};
use crate::error::ApiResult;
use crate::state::AppState;

const SETTINGS_ID: &str = "store";

#[derive(Debug, Deserialize)]
pub struct NewAdminRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PasswordChange {
    pub password: String,
}

pub async fn get(
    _admin: AdminSession,
    State(state): State<AppState>,
) -> ApiResult<Json<StoreSettings>> {
    Ok(Json(state.db.settings().get_settings().await?))
}

pub async fn update_links(
    admin: AdminSession,
    State(state): State<AppState>,
    Json(links): Json<StoreLinks>,
) -> ApiResult<Json<StoreLinks>> {
    validate_store_links(&links)?;
    let links = state.db.settings().update_links(&links).await?;

    info!(by = %admin.username, "Store links updated");
    state.publish(Collection::Settings, SETTINGS_ID, ChangeKind::Updated);
    Ok(Json(links))
}

pub async fn list_admins(
    _admin: AdminSession,
    State(state): State<AppState>,
) -> ApiResult<Json<Vec<AdminSummary>>> {
    let admins = state.db.settings().list_admins().await?;
    Ok(Json(admins.iter().map(AdminSummary::from).collect()))
}

pub async fn add_admin(
    admin: AdminSession,
    State(state): State<AppState>,
    Json(request): Json<NewAdminRequest>,
) -> ApiResult<(StatusCode, Json<AdminSummary>)> {
    let credential = new_credential(&request.username, &request.password).await?;
    state.db.settings().insert_admin(&credential).await?;

    info!(username = %credential.username, by = %admin.username, "Admin added");
    state.publish(Collection::Settings, SETTINGS_ID, ChangeKind::Updated);
    Ok((StatusCode::CREATED, Json(AdminSummary::from(&credential))))
}

pub async fn change_password(
    admin: AdminSession,
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(change): Json<PasswordChange>,
) -> ApiResult<StatusCode> {
    validate_password(&change.password)?;
    let hash = hash_password(&change.password).await?;
    state.db.settings().update_password(&username, &hash).await?;

    info!(username = %username, by = %admin.username, "Admin password changed");
    Ok(StatusCode::NO_CONTENT)
}

/// The last remaining admin cannot be removed.
pub async fn remove_admin(
    admin: AdminSession,
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> ApiResult<StatusCode> {
    state.db.settings().delete_admin(&username).await?;

    info!(username = %username, by = %admin.username, "Admin removed");
    state.publish(Collection::Settings, SETTINGS_ID, ChangeKind::Updated);
    Ok(StatusCode::NO_CONTENT)
}
