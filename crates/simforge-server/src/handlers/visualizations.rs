// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Handlers for the `/api/visualizations` resource.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use simforge_engine::Visualization;

use crate::AppState;
use crate::error::AppResult;

/// Routes mounted at `/api/visualizations`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create))
        .route("/{id}", get(fetch).delete(remove))
        .route("/{id}/ws-url", get(websocket_url))
}

/// Body of `POST /api/visualizations`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVisualizationRequest {
    /// Simulation whose results are shown.
    pub simulation_id: String,
    /// Result location relative to the results volume; defaults to the
    /// simulation id.
    #[serde(default)]
    pub result_path: Option<String>,
}

/// Body of `GET /api/visualizations/{id}/ws-url`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WsUrlResponse {
    /// `ws://<podIP>:9000/ws`
    pub ws_url: String,
}

/// POST /api/visualizations
async fn create(
    State(state): State<AppState>,
    payload: Result<Json<CreateVisualizationRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<Visualization>)> {
    let Json(request) = payload?;
    let viz = state
        .visualizations
        .create(&request.simulation_id, request.result_path.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(viz)))
}

/// GET /api/visualizations/{id}
async fn fetch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Visualization>> {
    Ok(Json(state.visualizations.get(&id).await?))
}

/// GET /api/visualizations/{id}/ws-url
///
/// 409 with code `NOT_READY` until the session's Pod is ready.
async fn websocket_url(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<WsUrlResponse>> {
    let ws_url = state.visualizations.websocket_url(&id).await?;
    Ok(Json(WsUrlResponse { ws_url }))
}

/// DELETE /api/visualizations/{id}
async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<StatusCode> {
    state.visualizations.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
