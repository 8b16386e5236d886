//! Defines routes for the bucket API.
//!
//! ## Structure
//! - **Bucket-level endpoints**
//!   - `GET    /Bucket/List`           list buckets
//!   - `GET    /Bucket/{bucket}/List`  list object ids in a bucket
//!   - `PUT    /Bucket/{bucket}`       upload an object, returns its id
//!     (`PUT /Bucket/List` uploads into the bucket named `List`)
//!
//! - **Object-level endpoints**
//!   - `GET    /Bucket/{bucket}/{id}`  download object
//!   - `HEAD   /Bucket/{bucket}/{id}`  object headers only
//!   - `DELETE /Bucket/{bucket}/{id}`  delete object
//!
//! - **System endpoints** (never gated)
//!   - `GET    /System/AuthenticationRequirements`
//!   - `GET    /AuthenticationRequirements` (same map)
//!   - `GET    /healthz`, `GET /readyz`

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        object_handlers::{
            create_object, create_object_in_list_bucket, delete_object, get_object, head_object,
            list_buckets, list_objects,
        },
        system_handlers::authentication_requirements,
    },
    services::{access_gate::AccessGate, object_store::ObjectStore},
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, put},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: ObjectStore,
    pub gate: Arc<AccessGate>,
}

impl AppState {
    pub fn new(store: ObjectStore, gate: AccessGate) -> Self {
        Self {
            store,
            gate: Arc::new(gate),
        }
    }
}

/// Build the router for all routes, without state.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/System/AuthenticationRequirements",
            get(authentication_requirements),
        )
        .route("/AuthenticationRequirements", get(authentication_requirements))
        // Bucket-level routes; static segments win over `{bucket}`/`{id}`
        .route(
            "/Bucket/List",
            get(list_buckets).put(create_object_in_list_bucket),
        )
        .route("/Bucket/{bucket}/List", get(list_objects))
        .route("/Bucket/{bucket}", put(create_object))
        // Object-level routes
        .route(
            "/Bucket/{bucket}/{id}",
            get(get_object).head(head_object).delete(delete_object),
        )
}

/// The complete application: routes, upload limit, request tracing and state.
pub fn app(state: AppState, max_upload_bytes: usize) -> Router {
    routes()
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
