//! Axum REST API handlers.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;

use crate::auth;
use crate::config::Config;
use crate::db;
use crate::errors::{MarketError, Result};
use crate::models::{MarketStats, NewProject, Order, Project, PurchaseRequest};
use crate::registry::{self, RegistryEntry, DEFAULT_REGISTRY_LIMIT};
use crate::settlement;

pub struct ApiState {
    pub pool: SqlitePool,
    pub config: Config,
}

/// All routes, without the transport layers added in `main`.
pub fn router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/projects", get(list_projects).post(create_project))
        .route("/projects/:id", get(get_project).delete(delete_project))
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
        .route("/stats", get(stats))
        .route("/registry", get(get_registry))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub message: &'static str,
    pub deleted: bool,
}

#[derive(Debug, Deserialize)]
pub struct RegistryQuery {
    pub limit: Option<u32>,
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `GET /projects`
pub async fn list_projects(State(state): State<Arc<ApiState>>) -> Result<Json<Vec<Project>>> {
    Ok(Json(db::list_projects(&state.pool).await?))
}

/// `GET /projects/:id`
pub async fn get_project(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<Project>> {
    db::get_project(&state.pool, &id)
        .await?
        .map(Json)
        .ok_or_else(|| MarketError::NotFound(format!("Project {id}")))
}

/// `POST /projects` (admin only)
///
/// The body is taken raw so the access guard can read `user_email` before
/// the rest of the payload is validated.
pub async fn create_project(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse> {
    let value = auth::require_admin(&state.config, &headers, &body)?.ok_or_else(|| {
        MarketError::Validation("request body must be a JSON project object".to_string())
    })?;
    let new_project: NewProject =
        serde_json::from_value(value).map_err(|e| MarketError::Validation(e.to_string()))?;
    new_project.validate()?;

    let project = new_project.into_project(Utc::now().timestamp_millis());
    let mut conn = state.pool.acquire().await?;
    db::insert_project(&mut conn, &project).await?;

    info!("Project {} '{}' listed", project.id, project.title);
    Ok((StatusCode::CREATED, Json(project)))
}

/// `DELETE /projects/:id` (admin only)
///
/// Hard delete; orders that reference the project keep their title snapshot.
pub async fn delete_project(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<DeleteResponse>> {
    auth::require_admin(&state.config, &headers, &body)?;
    let deleted = db::delete_project(&state.pool, &id).await?;
    info!("Delete of project {id} requested (removed: {deleted})");
    Ok(Json(DeleteResponse {
        message: "Project deleted successfully",
        deleted,
    }))
}

/// `POST /orders`
pub async fn create_order(
    State(state): State<Arc<ApiState>>,
    payload: std::result::Result<Json<PurchaseRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(request) = payload.map_err(|e| MarketError::Validation(e.body_text()))?;
    let order = settlement::settle(&state.pool, &state.config, request).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// `GET /orders/:id`
pub async fn get_order(
    State(state): State<Arc<ApiState>>,
    Path(id): Path<String>,
) -> Result<Json<Order>> {
    db::get_order(&state.pool, &id)
        .await?
        .map(Json)
        .ok_or_else(|| MarketError::NotFound(format!("Order {id}")))
}

/// `GET /stats`
pub async fn stats(State(state): State<Arc<ApiState>>) -> Result<Json<MarketStats>> {
    Ok(Json(db::market_stats(&state.pool).await?))
}

/// `GET /registry?limit=N`
///
/// Defaults to 20 entries; larger requests are clamped to the configured maximum.
pub async fn get_registry(
    State(state): State<Arc<ApiState>>,
    query: std::result::Result<Query<RegistryQuery>, QueryRejection>,
) -> Result<Json<Vec<RegistryEntry>>> {
    let Query(query) = query.map_err(|e| MarketError::Validation(e.body_text()))?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_REGISTRY_LIMIT)
        .min(state.config.registry_max_limit);
    Ok(Json(registry::recent_entries(&state.pool, limit).await?))
}
