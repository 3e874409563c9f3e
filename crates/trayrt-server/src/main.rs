use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Query, State};
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{post, put};
use axum::{Json, Router};
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tower_http::cors::{Any, CorsLayer};

use trayrt_core::error::RoutingError;
use trayrt_core::model::{parse_length, GridConfig, UpdateCableLengthRequest, UpdateCableLengthResponse};

/// Bind address and worker-concurrency limit, mirroring the teacher's
/// `Semaphore::new(5)` but made configurable instead of hard-coded.
#[derive(Parser, Debug)]
#[command(version, about = "Cable-tray routing engine HTTP server")]
struct ServerConfig {
    #[arg(long, env = "TRAYRT_BIND", default_value = "0.0.0.0:3133")]
    bind: String,
    #[arg(long, env = "TRAYRT_MAX_CONCURRENT_REQUESTS", default_value_t = 5)]
    max_concurrent_requests: usize,
}

struct AppState {
    concurrency: Semaphore,
}

#[derive(Debug, Deserialize)]
struct DebugQuery {
    #[serde(default)]
    debug: bool,
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let config = ServerConfig::parse();
    let state = Arc::new(AppState {
        concurrency: Semaphore::new(config.max_concurrent_requests),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![Method::GET, Method::POST, Method::PUT])
        .allow_headers(Any);

    let app = Router::new()
        .route("/optimize-paths", post(optimize_paths))
        .route("/cables/length", put(update_cable_length))
        .layer(cors)
        .with_state(state);

    let addr: SocketAddr = config.bind.parse()?;
    let listener = TcpListener::bind(addr).await?;
    log::info!("trayrt-server listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Submit-routing endpoint (§6). `?debug=true` is accepted but currently a
/// no-op beyond logging, since `debug_info` already ships on every response;
/// it exists as the hook the spec names for a future fuller graph dump.
async fn optimize_paths(State(state): State<Arc<AppState>>, Query(query): Query<DebugQuery>, Json(config): Json<GridConfig>) -> impl IntoResponse {
    let _permit = state.concurrency.acquire().await.expect("semaphore is never closed");
    let started = Instant::now();

    let result = tokio::task::spawn_blocking(move || trayrt_core::route(&config))
        .await
        .expect("routing task panicked");

    match result {
        Ok(response) => {
            log::info!(
                "optimize-paths: {} cable(s), {} section(s), debug={} in {:?}",
                response.cable_routes.len(),
                response.sections.len(),
                query.debug,
                started.elapsed()
            );
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => {
            log::warn!("optimize-paths failed in {:?}: {err}", started.elapsed());
            map_error(err).into_response()
        }
    }
}

/// Only `RoutingError::Internal` (§7 kind 5) maps to a 500; every other
/// validation failure is a 422.
fn map_error(err: RoutingError) -> (StatusCode, Json<ErrorBody>) {
    let status = match &err {
        RoutingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    };
    (status, Json(ErrorBody { message: err.to_string() }))
}

/// Update-cable-length endpoint (§6). The engine is stateless: this just
/// validates the new length string and tells the caller to resubmit the
/// full grid to re-optimize.
async fn update_cable_length(Json(request): Json<UpdateCableLengthRequest>) -> impl IntoResponse {
    let identifier = request.cable_label.clone().unwrap_or_else(|| format!("{}->{}", request.source, request.target));
    let trimmed = request.new_length.trim();

    let response = if trimmed.is_empty() || parse_length(trimmed).is_some() {
        UpdateCableLengthResponse {
            success: true,
            message: "length ceiling updated; resubmit the grid to re-optimize".to_string(),
            cable_identifier: identifier,
        }
    } else {
        UpdateCableLengthResponse {
            success: false,
            message: format!("could not parse length {:?}", request.new_length),
            cable_identifier: identifier,
        }
    };
    Json(response)
}
