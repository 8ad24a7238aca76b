//! HTTP routes.
//!
//! Each route hands its work to [`RequestHandler`] on tokio's blocking pool
//! and maps [`ServerError`] onto a JSON error body.

use crate::error::{ServerError, ServerResult};
use crate::handler::RequestHandler;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use drawmirror_sync_protocol::{AddNodeRequest, EXPORT_PATH};

/// Build the axum router with all endpoints.
pub fn build_router(handler: RequestHandler) -> Router {
    Router::new()
        .route(EXPORT_PATH, get(export_data))
        .route("/nodes", get(list_nodes).post(add_node))
        .route("/nodes/:name", delete(remove_node))
        .route("/pull/:name", post(pull))
        .route("/start-pull/:name", post(start_pull))
        .route("/pull-status", get(pull_status))
        .route("/health", get(health))
        .with_state(handler)
}

/// Runs a handler on the blocking pool.
async fn blocking<T, F>(handler: RequestHandler, f: F) -> ServerResult<T>
where
    T: Send + 'static,
    F: FnOnce(&RequestHandler) -> ServerResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || f(&handler))
        .await
        .map_err(|e| ServerError::Internal(format!("handler task failed: {e}")))?
}

async fn export_data(State(handler): State<RequestHandler>) -> ServerResult<Response> {
    let export = blocking(handler, RequestHandler::handle_export).await?;

    let mut builder = axum::http::Response::builder()
        .status(export.status)
        .header(header::CONTENT_TYPE, export.content_type)
        .header(header::CONTENT_LENGTH, export.body.len());
    for (name, value) in export.headers {
        builder = builder.header(name, value);
    }
    builder
        .body(Body::from(export.body))
        .map_err(|e| ServerError::Internal(format!("building export response: {e}")))
}

async fn list_nodes(State(handler): State<RequestHandler>) -> impl IntoResponse {
    Json(handler.handle_list_nodes())
}

async fn add_node(
    State(handler): State<RequestHandler>,
    body: Result<Json<AddNodeRequest>, JsonRejection>,
) -> ServerResult<Response> {
    let Json(request) = body.map_err(|e| ServerError::InvalidRequest(e.body_text()))?;
    let node = blocking(handler, move |h| h.handle_add_node(request)).await?;
    Ok((StatusCode::CREATED, Json(node)).into_response())
}

async fn remove_node(
    State(handler): State<RequestHandler>,
    Path(name): Path<String>,
) -> ServerResult<Response> {
    let node = blocking(handler, move |h| h.handle_remove_node(&name)).await?;
    Ok(Json(node).into_response())
}

async fn pull(
    State(handler): State<RequestHandler>,
    Path(name): Path<String>,
) -> ServerResult<Response> {
    let report = blocking(handler, move |h| h.handle_pull(&name)).await?;
    Ok(Json(report).into_response())
}

async fn start_pull(
    State(handler): State<RequestHandler>,
    Path(name): Path<String>,
) -> ServerResult<Response> {
    let status = blocking(handler, move |h| h.handle_start_pull(&name)).await?;
    Ok((StatusCode::ACCEPTED, Json(status)).into_response())
}

async fn pull_status(State(handler): State<RequestHandler>) -> impl IntoResponse {
    Json(handler.handle_pull_status())
}

async fn health(State(handler): State<RequestHandler>) -> impl IntoResponse {
    Json(handler.handle_health())
}
