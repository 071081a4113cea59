//! `sbomguard serve` - read-only threat query API using axum.

use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use sbomguard_core::SbomguardConfig;
use sbomguard_scanner::storage::StoredThreat;
use sbomguard_scanner::ThreatStore;

type SharedStore = Arc<Mutex<ThreatStore>>;

pub async fn run(config: SbomguardConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    let store = ThreatStore::open(&config.db_path)?;
    let state: SharedStore = Arc::new(Mutex::new(store));

    let app = Router::new()
        .route("/health", get(health))
        .route("/threats", get(list_threats))
        .route("/threats/:id", get(get_threat))
        .with_state(state);

    let host = host.unwrap_or(config.api.host);
    let port = port.unwrap_or(config.api.port);
    let addr = format!("{host}:{port}");
    info!("query API listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

#[derive(Debug, Deserialize)]
struct ThreatFilter {
    project: Option<String>,
}

async fn list_threats(
    State(store): State<SharedStore>,
    Query(filter): Query<ThreatFilter>,
) -> Result<Json<Value>, StatusCode> {
    let store = store.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let threats = store
        .list_threats(filter.project.as_deref())
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    let payload: Vec<Value> = threats.iter().map(threat_json).collect();
    Ok(Json(json!(payload)))
}

async fn get_threat(
    State(store): State<SharedStore>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, StatusCode> {
    let store = store.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    match store
        .get_threat(id)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
    {
        Some(stored) => Ok(Json(threat_json(&stored))),
        None => Err(StatusCode::NOT_FOUND),
    }
}

fn threat_json(stored: &StoredThreat) -> Value {
    let mut value = serde_json::to_value(&stored.threat).unwrap_or_else(|_| json!({}));
    if let Some(map) = value.as_object_mut() {
        map.insert("threat_id".to_string(), json!(stored.id));
        map.insert("project".to_string(), json!(stored.project));
    }
    value
}
