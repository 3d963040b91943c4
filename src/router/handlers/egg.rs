//! Egg registry and instance-configuration handlers: `listEggs`, `getEgg`,
//! `putEgg`, `deleteEgg`, `configure`, `getConfig`, and `getHealth`.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;

use crate::egg::{Egg, InstanceConfig};

use super::super::AppState;
use super::ApiError;

/// `GET /api/eggs`
pub async fn list_eggs(State(state): State<AppState>) -> Json<Vec<Egg>> {
    Json(state.eggs.list())
}

/// `GET /api/eggs/:egg_id`
pub async fn get_egg(
    State(state): State<AppState>,
    Path(egg_id): Path<String>,
) -> Result<Json<Egg>, ApiError> {
    state
        .eggs
        .get(&egg_id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("egg not found: {}", egg_id)))
}

/// `PUT /api/eggs/:egg_id` — create or update. The path id and body id must agree.
pub async fn put_egg(
    State(state): State<AppState>,
    Path(egg_id): Path<String>,
    Json(egg): Json<Egg>,
) -> Result<Json<Egg>, ApiError> {
    if egg.id != egg_id {
        return Err(ApiError::bad_request("egg id in body must match path"));
    }
    state.eggs.put(egg.clone())?;
    Ok(Json(egg))
}

/// `DELETE /api/eggs/:egg_id`
pub async fn delete_egg(
    State(state): State<AppState>,
    Path(egg_id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.eggs.delete(&egg_id)?;
    Ok(Json(json!({ "deleted": egg_id })))
}

/// `POST /api/instances/:id` — `configure(id, cfg)`: persist a local,
/// egg-backed instance configuration and materialize (or update) the live
/// `Server` that backs it, so the existing `/api/servers/:id/...` lifecycle
/// routes (install, power, commands, logs, files) operate on it directly.
pub async fn configure(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(mut cfg): Json<InstanceConfig>,
) -> Result<Json<InstanceConfig>, ApiError> {
    cfg.id = id;
    let saved = state.configs.create(cfg, &state.eggs)?;

    let instance_dir = state.config.system.data_directory.join(&saved.id);
    tokio::fs::create_dir_all(&instance_dir).await?;

    let egg = state
        .eggs
        .get(&saved.egg_id)
        .ok_or_else(|| ApiError::bad_request(format!("unknown egg: {}", saved.egg_id)))?;
    let server_config = crate::server::ServerConfig::from_egg_instance(&saved, &egg);

    if let Some(server) = state.manager.get(&saved.id) {
        server.update_config(server_config);
    } else {
        state
            .manager
            .add(server_config)
            .await
            .map_err(|e| ApiError::internal(format!("failed to materialize server: {}", e)))?;
    }

    Ok(Json(saved))
}

/// `GET /api/instances/:id` — `getConfig(id)`, egg snapshot rehydrated from the registry.
pub async fn get_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<InstanceConfig>, ApiError> {
    state
        .configs
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("instance not found: {}", id)))
}

/// `GET /health` (unauthenticated) — `{status, timestamp, counts:{containers,eggs,images}}`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub counts: HealthCounts,
}

#[derive(Debug, Serialize)]
pub struct HealthCounts {
    pub containers: usize,
    pub eggs: usize,
    pub images: usize,
}

pub async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let eggs = state.eggs.list();
    let images: std::collections::HashSet<&String> =
        eggs.iter().flat_map(|e| e.docker_images.values()).collect();

    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now().to_rfc3339(),
        counts: HealthCounts {
            containers: state.manager.count(),
            eggs: eggs.len(),
            images: images.len(),
        },
    })
}
