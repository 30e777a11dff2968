use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    ImageId, ImageUpload, ListingId, ListingImage, ListingPatch, ListingRecord, NewListing, OwnerId,
    SubscriptionId, UpdateOutcome,
};
use super::images::ImageCollectionService;
use super::lifecycle::{ListingLifecycleService, ListingServiceError};
use super::repository::{FileStore, ListingRepository, QuotaGate, RepositoryError};
use super::schema::ValidationError;

/// Header carrying the client-side name of an uploaded image.
pub const FILE_NAME_HEADER: &str = "x-file-name";
const DEFAULT_UPLOAD_NAME: &str = "upload.bin";

/// Both services behind one shared state value.
pub struct ListingServices<R, Q, F> {
    pub lifecycle: ListingLifecycleService<R, Q>,
    pub images: ImageCollectionService<R, Q, F>,
}

#[derive(Debug, Deserialize)]
pub struct CreateListingRequest {
    pub owner_id: OwnerId,
    #[serde(flatten)]
    pub listing: NewListing,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub subscription_id: Option<SubscriptionId>,
}

#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub image_ids: Vec<ImageId>,
}

/// HTTP surface over the lifecycle and image services.
pub fn listing_router<R, Q, F>(services: Arc<ListingServices<R, Q, F>>) -> Router
where
    R: ListingRepository + 'static,
    Q: QuotaGate + 'static,
    F: FileStore + 'static,
{
    Router::new()
        .route("/api/v1/listings", post(create_handler::<R, Q, F>))
        .route(
            "/api/v1/listings/:listing_id",
            get(show_handler::<R, Q, F>).patch(update_handler::<R, Q, F>),
        )
        .route(
            "/api/v1/listings/:listing_id/submit",
            post(submit_handler::<R, Q, F>),
        )
        .route(
            "/api/v1/listings/:listing_id/approve",
            post(approve_handler::<R, Q, F>),
        )
        .route(
            "/api/v1/listings/:listing_id/reject",
            post(reject_handler::<R, Q, F>),
        )
        .route(
            "/api/v1/listings/:listing_id/images",
            get(images_handler::<R, Q, F>).post(add_images_handler::<R, Q, F>),
        )
        .route(
            "/api/v1/listings/:listing_id/images/order",
            put(reorder_handler::<R, Q, F>),
        )
        .route(
            "/api/v1/images/:image_id",
            delete(delete_image_handler::<R, Q, F>),
        )
        .with_state(services)
}

type Services<R, Q, F> = State<Arc<ListingServices<R, Q, F>>>;

pub(crate) async fn create_handler<R, Q, F>(
    State(services): Services<R, Q, F>,
    Json(request): Json<CreateListingRequest>,
) -> Result<(StatusCode, Json<ListingRecord>), ListingServiceError>
where
    R: ListingRepository + 'static,
    Q: QuotaGate + 'static,
    F: FileStore + 'static,
{
    let record = services
        .lifecycle
        .create(request.listing, request.owner_id)?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub(crate) async fn show_handler<R, Q, F>(
    State(services): Services<R, Q, F>,
    Path(listing_id): Path<u64>,
) -> Result<Json<ListingRecord>, ListingServiceError>
where
    R: ListingRepository + 'static,
    Q: QuotaGate + 'static,
    F: FileStore + 'static,
{
    Ok(Json(services.lifecycle.get(ListingId(listing_id))?))
}

pub(crate) async fn update_handler<R, Q, F>(
    State(services): Services<R, Q, F>,
    Path(listing_id): Path<u64>,
    Json(patch): Json<ListingPatch>,
) -> Result<Json<UpdateOutcome>, ListingServiceError>
where
    R: ListingRepository + 'static,
    Q: QuotaGate + 'static,
    F: FileStore + 'static,
{
    Ok(Json(services.lifecycle.update(ListingId(listing_id), patch)?))
}

pub(crate) async fn submit_handler<R, Q, F>(
    State(services): Services<R, Q, F>,
    Path(listing_id): Path<u64>,
    request: Option<Json<SubmitRequest>>,
) -> Result<Json<ListingRecord>, ListingServiceError>
where
    R: ListingRepository + 'static,
    Q: QuotaGate + 'static,
    F: FileStore + 'static,
{
    let request = request.map(|Json(request)| request).unwrap_or_default();
    let record = services
        .lifecycle
        .submit(ListingId(listing_id), request.subscription_id.as_ref())?;
    Ok(Json(record))
}

pub(crate) async fn approve_handler<R, Q, F>(
    State(services): Services<R, Q, F>,
    Path(listing_id): Path<u64>,
) -> Result<Json<ListingRecord>, ListingServiceError>
where
    R: ListingRepository + 'static,
    Q: QuotaGate + 'static,
    F: FileStore + 'static,
{
    Ok(Json(services.lifecycle.approve(ListingId(listing_id))?))
}

pub(crate) async fn reject_handler<R, Q, F>(
    State(services): Services<R, Q, F>,
    Path(listing_id): Path<u64>,
    Json(request): Json<RejectRequest>,
) -> Result<Json<ListingRecord>, ListingServiceError>
where
    R: ListingRepository + 'static,
    Q: QuotaGate + 'static,
    F: FileStore + 'static,
{
    Ok(Json(
        services
            .lifecycle
            .reject(ListingId(listing_id), &request.reason)?,
    ))
}

pub(crate) async fn images_handler<R, Q, F>(
    State(services): Services<R, Q, F>,
    Path(listing_id): Path<u64>,
) -> Result<Json<Vec<ListingImage>>, ListingServiceError>
where
    R: ListingRepository + 'static,
    Q: QuotaGate + 'static,
    F: FileStore + 'static,
{
    Ok(Json(services.images.list_images(ListingId(listing_id))?))
}

/// One raw image per request. The body is the file content.
pub(crate) async fn add_images_handler<R, Q, F>(
    State(services): Services<R, Q, F>,
    Path(listing_id): Path<u64>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Vec<ListingImage>>), ListingServiceError>
where
    R: ListingRepository + 'static,
    Q: QuotaGate + 'static,
    F: FileStore + 'static,
{
    let header_text = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };
    let upload = ImageUpload {
        file_name: header_text(FILE_NAME_HEADER).unwrap_or_else(|| DEFAULT_UPLOAD_NAME.to_string()),
        content_type: header_text(header::CONTENT_TYPE.as_str())
            .unwrap_or_else(|| "application/octet-stream".to_string()),
        bytes: body.to_vec(),
    };

    let images = services
        .images
        .add_images(ListingId(listing_id), vec![upload])?;
    Ok((StatusCode::CREATED, Json(images)))
}

pub(crate) async fn reorder_handler<R, Q, F>(
    State(services): Services<R, Q, F>,
    Path(listing_id): Path<u64>,
    Json(request): Json<ReorderRequest>,
) -> Result<Json<Vec<ListingImage>>, ListingServiceError>
where
    R: ListingRepository + 'static,
    Q: QuotaGate + 'static,
    F: FileStore + 'static,
{
    Ok(Json(
        services
            .images
            .reorder_images(ListingId(listing_id), &request.image_ids)?,
    ))
}

pub(crate) async fn delete_image_handler<R, Q, F>(
    State(services): Services<R, Q, F>,
    Path(image_id): Path<u64>,
) -> Result<StatusCode, ListingServiceError>
where
    R: ListingRepository + 'static,
    Q: QuotaGate + 'static,
    F: FileStore + 'static,
{
    services.images.delete_image(ImageId(image_id))?;
    Ok(StatusCode::NO_CONTENT)
}

impl ListingServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ListingServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ListingServiceError::InvalidTransition { .. }
            | ListingServiceError::InvalidState { .. } => StatusCode::CONFLICT,
            ListingServiceError::QuotaExceeded(_) => StatusCode::FORBIDDEN,
            ListingServiceError::Storage(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            ListingServiceError::Storage(_) | ListingServiceError::FileStore(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ListingServiceError {
    fn into_response(self) -> Response {
        let mut payload = json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });

        match &self {
            ListingServiceError::Validation(error) => {
                if let Some(field) = error.field() {
                    payload["field"] = json!(field);
                }
                if let ValidationError::RuleViolation { rule, value, .. } = error {
                    payload["rule"] = json!(rule);
                    payload["value"] = value.clone();
                }
            }
            ListingServiceError::InvalidTransition { from, event } => {
                payload["status"] = json!(from);
                payload["event"] = json!(event);
            }
            ListingServiceError::InvalidState { status, .. } => {
                payload["status"] = json!(status);
            }
            _ => {}
        }

        (self.status_code(), Json(payload)).into_response()
    }
}
