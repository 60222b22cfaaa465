// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Simforge Server - HTTP API
//!
//! Thin axum layer over [`simforge_engine`]. Handlers parse requests, call
//! the engine's use cases and render results; every failure is rendered as
//! `{ "error": <reason>, "code": <CODE> }`.
//!
//! # Routes
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | GET | `/health` | Liveness |
//! | POST | `/api/simulations` | Multipart upload (`name`, `type`, `file`), submit |
//! | GET | `/api/simulations` | List, newest first |
//! | GET | `/api/simulations/{id}` | Get with reconciled status |
//! | DELETE | `/api/simulations/{id}` | Delete Job and record (idempotent) |
//! | GET | `/api/simulations/{id}/visualizations` | Sessions for a simulation |
//! | GET | `/api/simulations/{id}/results` | Result directory as `.tar.gz` |
//! | POST | `/api/visualizations` | Start a session (`simulationId`, `resultPath?`) |
//! | GET | `/api/visualizations/{id}` | Session status |
//! | GET | `/api/visualizations/{id}/ws-url` | Websocket endpoint (`wsUrl`) |
//! | DELETE | `/api/visualizations/{id}` | Delete Pod and record |

pub mod config;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::Method;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use simforge_engine::EngineRuntime;
use simforge_engine::simulations::SimulationService;
use simforge_engine::validator::MAX_CFD_ARCHIVE_BYTES;
use simforge_engine::visualizations::VisualizationService;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Headroom above the largest accepted upload for the other form fields.
const FORM_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// Simulation use cases.
    pub simulations: Arc<SimulationService>,
    /// Visualization use cases.
    pub visualizations: Arc<VisualizationService>,
}

impl AppState {
    /// State backed by a running engine.
    pub fn new(runtime: &EngineRuntime) -> Self {
        Self {
            simulations: runtime.simulations().clone(),
            visualizations: runtime.visualizations().clone(),
        }
    }
}

/// Build the full router with CORS, tracing and the upload body limit.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION]);

    Router::new()
        .merge(handlers::health::router())
        .nest("/api/simulations", handlers::simulations::router())
        .nest("/api/visualizations", handlers::visualizations::router())
        .layer(DefaultBodyLimit::max(
            MAX_CFD_ARCHIVE_BYTES as usize + FORM_OVERHEAD_BYTES,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
