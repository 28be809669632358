//! Generic table routes: read, insert, and update-by-key on any table.
//!
//! Request and response bodies are shared with
//! [`HttpTableStore`](crate::client::HttpTableStore).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use helpdesk_core::{Principal, ReadRequest, Record, Value};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::AppState;
use crate::network::error::ApiError;

/// Response of `POST /api/tables/{table}/read`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowsResponse {
    pub rows: Vec<Record>,
}

/// Body of `POST /api/tables/{table}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertRowBody {
    pub fields: Record,
}

/// Body of `PATCH /api/tables/{table}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRowBody {
    pub key_column: String,
    pub key_value: Value,
    pub fields: Record,
}

/// Response of `PATCH /api/tables/{table}`: the stored row after the update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowResponse {
    pub row: Record,
}

pub async fn read_rows(
    State(state): State<AppState>,
    Path(table): Path<String>,
    Json(request): Json<ReadRequest>,
) -> Result<Json<RowsResponse>, ApiError> {
    let _guard = state.shutdown.in_flight_guard();
    debug!(table = %table, filtered = request.filter.is_some(), limit = ?request.limit, "read rows");
    let rows = state.store.read(&table, &request).await?;
    Ok(Json(RowsResponse { rows }))
}

pub async fn insert_row(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(table): Path<String>,
    Json(body): Json<InsertRowBody>,
) -> Result<StatusCode, ApiError> {
    let _guard = state.shutdown.in_flight_guard();
    state.store.insert(&table, body.fields).await?;
    info!(table = %table, principal = %principal.id, "row inserted");
    Ok(StatusCode::CREATED)
}

pub async fn update_row(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(table): Path<String>,
    Json(body): Json<UpdateRowBody>,
) -> Result<Json<RowResponse>, ApiError> {
    let _guard = state.shutdown.in_flight_guard();
    let row = state
        .store
        .update_by_key(&table, &body.key_column, &body.key_value, body.fields)
        .await?;
    info!(
        table = %table,
        key = %body.key_value,
        principal = %principal.id,
        "row updated"
    );
    Ok(Json(RowResponse { row }))
}
