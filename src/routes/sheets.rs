// SPDX-License-Identifier: MIT

//! Spreadsheet routes: thin argument-shaping wrappers around the Sheets
//! pass-through service. Light validation only; all credential handling
//! happens in the service layer.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::services::sheets::{CreatedSpreadsheet, SortSpec, ValueRange};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

/// Spreadsheet routes (require a session; the auth middleware is applied
/// in routes/mod.rs).
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/sheets", post(create_spreadsheet))
        .route("/api/sheets/{id}", get(get_spreadsheet))
        .route(
            "/api/sheets/{id}/values/{range}",
            get(get_values).put(update_values),
        )
        .route("/api/sheets/{id}/values/{range}/append", post(append_values))
        .route("/api/sheets/{id}/values/{range}/clear", post(clear_values))
        .route("/api/sheets/{id}/sheets", post(add_sheet))
        .route("/api/sheets/{id}/sheets/{sheet_id}", delete(delete_sheet))
        .route("/api/sheets/{id}/sort", post(sort_range))
}

#[derive(Deserialize)]
pub struct CreateSpreadsheetRequest {
    title: String,
}

async fn create_spreadsheet(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateSpreadsheetRequest>,
) -> Result<Json<CreatedSpreadsheet>> {
    if body.title.trim().is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }

    let created = state
        .sheets
        .create_spreadsheet(&user.internal_id, &body.title)
        .await?;

    tracing::info!(
        internal_id = %user.internal_id,
        spreadsheet_id = %created.spreadsheet_id,
        "Spreadsheet created"
    );

    Ok(Json(created))
}

async fn get_spreadsheet(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    let sheet = state.sheets.get_spreadsheet(&user.internal_id, &id).await?;
    Ok(Json(sheet))
}

async fn get_values(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((id, range)): Path<(String, String)>,
) -> Result<Json<ValueRange>> {
    let values = state
        .sheets
        .get_values(&user.internal_id, &id, &range)
        .await?;
    Ok(Json(values))
}

#[derive(Deserialize)]
pub struct ValuesRequest {
    values: Vec<Vec<serde_json::Value>>,
}

async fn update_values(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((id, range)): Path<(String, String)>,
    Json(body): Json<ValuesRequest>,
) -> Result<Json<serde_json::Value>> {
    if body.values.is_empty() {
        return Err(AppError::Validation("values must not be empty".to_string()));
    }

    let result = state
        .sheets
        .update_values(&user.internal_id, &id, &range, &body.values)
        .await?;
    Ok(Json(result))
}

async fn append_values(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((id, range)): Path<(String, String)>,
    Json(body): Json<ValuesRequest>,
) -> Result<Json<serde_json::Value>> {
    if body.values.is_empty() {
        return Err(AppError::Validation("values must not be empty".to_string()));
    }

    let result = state
        .sheets
        .append_values(&user.internal_id, &id, &range, &body.values)
        .await?;
    Ok(Json(result))
}

async fn clear_values(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((id, range)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>> {
    let result = state
        .sheets
        .clear_values(&user.internal_id, &id, &range)
        .await?;
    Ok(Json(result))
}

#[derive(Deserialize)]
pub struct AddSheetRequest {
    title: String,
}

async fn add_sheet(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<AddSheetRequest>,
) -> Result<Json<serde_json::Value>> {
    if body.title.trim().is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }

    let result = state
        .sheets
        .add_sheet(&user.internal_id, &id, &body.title)
        .await?;
    Ok(Json(result))
}

async fn delete_sheet(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path((id, sheet_id)): Path<(String, i64)>,
) -> Result<Json<serde_json::Value>> {
    let result = state
        .sheets
        .delete_sheet(&user.internal_id, &id, sheet_id)
        .await?;
    Ok(Json(result))
}

async fn sort_range(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(sort): Json<SortSpec>,
) -> Result<Json<serde_json::Value>> {
    if sort.start_row_index >= sort.end_row_index
        || sort.start_column_index >= sort.end_column_index
    {
        return Err(AppError::Validation(
            "sort range must be non-empty".to_string(),
        ));
    }

    let result = state
        .sheets
        .sort_range(&user.internal_id, &id, &sort)
        .await?;
    Ok(Json(result))
}
