// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Handlers for the `/api/simulations` resource.

use axum::body::Body;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use simforge_engine::{Simulation, SimulationType, Visualization};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::AppState;
use crate::error::{AppError, AppResult};

/// Routes mounted at `/api/simulations`.
///
/// ```text
/// POST   /                      -> create (multipart: name, type, file)
/// GET    /                      -> list
/// GET    /{id}                  -> get
/// DELETE /{id}                  -> delete
/// GET    /{id}/visualizations   -> list_visualizations
/// GET    /{id}/results          -> download_results (.tar.gz)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(fetch).delete(remove))
        .route("/{id}/visualizations", get(list_visualizations))
        .route("/{id}/results", get(download_results))
}

struct Upload {
    filename: String,
    content: Vec<u8>,
}

/// POST /api/simulations
///
/// Validate the uploaded input, stage it and submit the solver Job.
async fn create(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> AppResult<(StatusCode, Json<Simulation>)> {
    let mut multipart = multipart?;
    let mut name = None;
    let mut sim_type = None;
    let mut upload = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("name") => name = Some(field.text().await?),
            Some("type") => sim_type = Some(field.text().await?),
            Some("file") => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let content = field.bytes().await?.to_vec();
                upload = Some(Upload { filename, content });
            }
            other => debug!(field = ?other, "Ignoring unknown form field"),
        }
    }

    let (Some(name), Some(sim_type)) = (name, sim_type) else {
        return Err(AppError::BadRequest("name and type are required".to_string()));
    };
    let sim_type: SimulationType = sim_type.trim().parse()?;
    let upload = upload.ok_or_else(|| AppError::BadRequest("file is required".to_string()))?;

    let sim = state
        .simulations
        .create_with_upload(&name, sim_type, &upload.filename, &upload.content)
        .await?;
    Ok((StatusCode::CREATED, Json(sim)))
}

/// GET /api/simulations
async fn list(State(state): State<AppState>) -> AppResult<Json<Vec<Simulation>>> {
    Ok(Json(state.simulations.list().await?))
}

/// GET /api/simulations/{id}
async fn fetch(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Simulation>> {
    Ok(Json(state.simulations.get(&id).await?))
}

/// DELETE /api/simulations/{id}
async fn remove(State(state): State<AppState>, Path(id): Path<String>) -> AppResult<StatusCode> {
    state.simulations.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/simulations/{id}/visualizations
async fn list_visualizations(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Json<Vec<Visualization>>> {
    Ok(Json(state.visualizations.list_by_simulation(&id).await?))
}

/// GET /api/simulations/{id}/results
///
/// Stream the result directory as a gzip-compressed tarball.
async fn download_results(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let archive = state.simulations.results(&id).await?;
    let disposition = format!("attachment; filename=\"{}\"", archive.file_name);
    let body = Body::from_stream(ReaderStream::new(archive.into_reader()));

    Ok((
        [
            (header::CONTENT_TYPE, "application/gzip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
