use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use classifieds::listings::{
    listing_router, FieldSpec, FileStore, ListingRepository, ListingServices, ListingType,
    QuotaGate, SchemaRegistry,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub(crate) struct SchemaView {
    pub(crate) category_id: u32,
    pub(crate) category: Option<String>,
    pub(crate) listing_type: ListingType,
    pub(crate) fields: Vec<FieldSpec>,
}

pub(crate) fn schema_catalog(registry: &SchemaRegistry) -> Vec<SchemaView> {
    registry
        .keys()
        .into_iter()
        .filter_map(|key| {
            registry.lookup(key).map(|specs| SchemaView {
                category_id: key.category_id,
                category: registry.category_name(key.category_id).map(str::to_string),
                listing_type: key.listing_type,
                fields: specs.fields().to_vec(),
            })
        })
        .collect()
}

pub(crate) fn with_listing_routes<R, Q, F>(
    services: Arc<ListingServices<R, Q, F>>,
) -> axum::Router
where
    R: ListingRepository + 'static,
    Q: QuotaGate + 'static,
    F: FileStore + 'static,
{
    listing_router(services)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/api/v1/schemas", axum::routing::get(schemas_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready", "schemas": state.registry.len() })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn schemas_endpoint(
    Extension(state): Extension<AppState>,
) -> Json<Vec<SchemaView>> {
    Json(schema_catalog(&state.registry))
}
