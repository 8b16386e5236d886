//! HTTP handlers for bucket and object operations.
//!
//! Every handler authorizes through the `AccessGate` first, then runs the
//! blocking `ObjectStore` call on the blocking thread pool.

use crate::{
    errors::AppError,
    models::{
        object::{ObjectMetadata, SizedMetadata, StoredObject},
        operation::OperationKind,
    },
    routes::routes::AppState,
    services::object_store::{ObjectStore, StoreResult},
};
use axum::{
    Json,
    body::Body,
    extract::{FromRequest, Multipart, Path, Query, Request, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use anyhow::Context;
use bytes::Bytes;
use serde::Deserialize;
use uuid::Uuid;

pub const HEADER_BUCKET_NAME: &str = "x-buckets-bucket-name";
pub const HEADER_OBJECT_NAME: &str = "x-buckets-object-name";
pub const HEADER_OBJECT_ID: &str = "x-buckets-object-id";
/// Mirrors `Content-Length`, which HTTP forbids on a 204 HEAD response.
pub const HEADER_OBJECT_SIZE: &str = "x-buckets-object-size";

const DEFAULT_MIME_TYPE: &str = "application/octet-stream";
const UPLOAD_FIELD: &str = "file";
const LIST_SEGMENT: &str = "List";

/// Query overrides accepted by `PUT /Bucket/{bucket}`.
#[derive(Debug, Default, Deserialize)]
pub struct CreateObjectQuery {
    #[serde(rename = "nameOverride")]
    pub name_override: Option<String>,
    #[serde(rename = "mimeOverride")]
    pub mime_override: Option<String>,
}

/// An upload body after unwrapping raw or multipart encoding.
struct Upload {
    file_name: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

/// Run a blocking store call off the async workers.
async fn with_store<T, F>(store: &ObjectStore, op: F) -> Result<T, AppError>
where
    T: Send + 'static,
    F: FnOnce(&ObjectStore) -> StoreResult<T> + Send + 'static,
{
    let store = store.clone();
    tokio::task::spawn_blocking(move || op(&store))
        .await
        .context("storage task failed")?
        .map_err(AppError::from)
}

fn object_not_found() -> AppError {
    AppError::not_found("The specified object could not be found")
}

/// GET `/Bucket/List`: names of all buckets.
pub async fn list_buckets(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<String>>, AppError> {
    state.gate.authorize(OperationKind::BucketList, &headers)?;
    let buckets = with_store(&state.store, |store| store.list_buckets()).await?;
    Ok(Json(buckets))
}

/// GET `/Bucket/{bucket}/List`: ids of all objects in a bucket.
pub async fn list_objects(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<String>>, AppError> {
    state.gate.authorize(OperationKind::ObjectList, &headers)?;
    let ids = with_store(&state.store, move |store| store.list_objects(&bucket)).await?;
    Ok(Json(ids))
}

/// HEAD `/Bucket/{bucket}/{id}`: object headers, no body.
pub async fn head_object(
    State(state): State<AppState>,
    Path((bucket, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    state.gate.authorize(OperationKind::ObjectRead, &headers)?;
    let SizedMetadata { metadata, size } =
        with_store(&state.store, move |store| store.get_metadata(&bucket, &id))
            .await?
            .ok_or_else(object_not_found)?;

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NO_CONTENT;
    set_object_headers(response.headers_mut(), &metadata, size);
    Ok(response)
}

/// GET `/Bucket/{bucket}/{id}`: the payload with object headers.
pub async fn get_object(
    State(state): State<AppState>,
    Path((bucket, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    state.gate.authorize(OperationKind::ObjectRead, &headers)?;
    let object: StoredObject =
        with_store(&state.store, move |store| store.get_object(&bucket, &id))
            .await?
            .ok_or_else(object_not_found)?;

    let size = object.size();
    let mut response = Response::new(Body::from(object.data));
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &object.metadata, size);
    Ok(response)
}

/// PUT `/Bucket/{bucket}`: store a new object, respond with its id.
///
/// Accepts either a raw body or a `multipart/form-data` body with a `file`
/// part.
pub async fn create_object(
    State(state): State<AppState>,
    Path(bucket): Path<String>,
    Query(query): Query<CreateObjectQuery>,
    request: Request,
) -> Result<Json<String>, AppError> {
    create_in_bucket(state, bucket, query, request).await
}

/// PUT `/Bucket/List`: upload into the bucket named `List`, whose path
/// collides with the static bucket listing route.
pub async fn create_object_in_list_bucket(
    State(state): State<AppState>,
    Query(query): Query<CreateObjectQuery>,
    request: Request,
) -> Result<Json<String>, AppError> {
    create_in_bucket(state, LIST_SEGMENT.to_string(), query, request).await
}

async fn create_in_bucket(
    state: AppState,
    bucket: String,
    query: CreateObjectQuery,
    request: Request,
) -> Result<Json<String>, AppError> {
    state
        .gate
        .authorize(OperationKind::ObjectCreate, request.headers())?;

    let upload = read_upload(request).await?;
    let name = non_blank(query.name_override)
        .or(non_blank(upload.file_name))
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let mime_type = non_blank(query.mime_override)
        .or(non_blank(upload.content_type))
        .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());

    let data = upload.data;
    let id = with_store(&state.store, move |store| {
        store.create_object(&bucket, &name, &mime_type, &data)
    })
    .await?;

    tracing::info!(id = %id, "object created");
    Ok(Json(id))
}

/// DELETE `/Bucket/{bucket}/{id}`
pub async fn delete_object(
    State(state): State<AppState>,
    Path((bucket, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    state.gate.authorize(OperationKind::ObjectDelete, &headers)?;
    with_store(&state.store, move |store| store.delete_object(&bucket, &id)).await?;
    Ok(StatusCode::OK)
}

async fn read_upload(request: Request) -> Result<Upload, AppError> {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let is_multipart = content_type
        .as_deref()
        .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("multipart/form-data"));

    if !is_multipart {
        let data = Bytes::from_request(request, &())
            .await
            .map_err(|rejection| AppError::new(rejection.status(), rejection.body_text()))?;
        return Ok(Upload {
            file_name: None,
            content_type,
            data,
        });
    }

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|rejection| AppError::new(rejection.status(), rejection.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::new(err.status(), err.body_text()))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|err| AppError::new(err.status(), err.body_text()))?;
        return Ok(Upload {
            file_name,
            content_type,
            data,
        });
    }

    Err(AppError::bad_request("The multipart body has no `file` part"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn set_object_headers(headers: &mut HeaderMap, meta: &ObjectMetadata, size: u64) {
    let mut insert = |name: HeaderName, value: &str| match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => tracing::debug!("omitting unrepresentable header {}", name),
    };

    insert(HeaderName::from_static(HEADER_BUCKET_NAME), &meta.bucket);
    insert(HeaderName::from_static(HEADER_OBJECT_NAME), &meta.name);
    insert(HeaderName::from_static(HEADER_OBJECT_ID), &meta.id);
    insert(header::CONTENT_TYPE, &meta.mime_type);

    let length = size.to_string();
    insert(header::CONTENT_LENGTH, &length);
    insert(HeaderName::from_static(HEADER_OBJECT_SIZE), &length);
}
