//! HTTP surface.
//!
//! - `GET|POST /{engine}/{mode}` runs the engine's template for that mode
//! - `GET /init` (re)seeds every engine
//! - `GET /status` reports per-engine seed state

mod routes;

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, RawQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;

use crate::error::LabError;
use crate::extract::{extract, ParameterRequest};
use crate::querier::Querier;
use crate::registry::Engine;
use crate::seed::Seeder;
use crate::template::Params;

pub use routes::{Mode, RouteTable};

/// Shared handler state. Cloned per request; everything inside is shared.
#[derive(Clone)]
pub struct AppState {
    querier: Querier,
    seeder: Arc<Seeder>,
    routes: Arc<RouteTable>,
}

impl AppState {
    pub fn new(querier: Querier, seeder: Arc<Seeder>) -> Self {
        let routes = Arc::new(RouteTable::new(querier.registry()));
        Self {
            querier,
            seeder,
            routes,
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/init", get(init))
        .route("/status", get(status))
        .route("/{engine}/{mode}", get(query).post(query))
        .fallback(unknown_route)
        .with_state(state)
}

async fn query(
    State(state): State<AppState>,
    Path((engine, mode)): Path<(String, String)>,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some((engine, mode, template)) = state.routes.resolve(&engine, &mode) else {
        return unknown_route().await;
    };

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let request = ParameterRequest::from_http(raw_query.as_deref(), content_type, body).await;

    let name = mode.param_name();
    let value = match extract(&request, name) {
        Some(value) if !value.is_blank() => value,
        _ => return error_response(&LabError::MissingParameter(name.to_string())),
    };

    let mut params = Params::new();
    params.insert(mode.binding().to_string(), value);

    let outcome = state.querier.dispatch(engine, template, &params).await;
    let status =
        StatusCode::from_u16(outcome.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(outcome.body())).into_response()
}

async fn init(State(state): State<AppState>) -> Response {
    let seeder = Arc::clone(&state.seeder);
    // Run on its own task so a panic in a driver surfaces as a 500.
    match tokio::spawn(async move { seeder.initialize_all().await }).await {
        Ok(report) => {
            for outcome in report.engines.iter().filter(|o| !o.seeded) {
                tracing::warn!(
                    engine = %outcome.engine,
                    error = ?outcome.error,
                    "engine left unseeded"
                );
            }
            (StatusCode::OK, "Databases Initialized Successfully").into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "database initialization aborted");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error initializing databases: {e}"),
            )
                .into_response()
        }
    }
}

async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let registry = state.querier.registry();
    let engines: Vec<_> = Engine::ALL
        .into_iter()
        .map(|engine| {
            let descriptor = registry.descriptor(engine);
            json!({
                "engine": engine,
                "display_name": descriptor.display_name,
                "executes_via": descriptor.executes_via,
                "seeded": state.seeder.is_seeded(engine),
            })
        })
        .collect();
    Json(json!({ "engines": engines }))
}

async fn unknown_route() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Unknown route" })),
    )
        .into_response()
}

fn error_response(error: &LabError) -> Response {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}
