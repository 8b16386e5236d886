//! System endpoints that are never gated.

use crate::{routes::routes::AppState, services::access_gate::AuthRequirements};
use axum::{Json, extract::State};

/// GET `/System/AuthenticationRequirements`
///
/// Which operation kinds require a bearer token, e.g.
/// `{"BucketList": false, "ObjectCreate": true, ...}`. Clients fetch this once
/// to avoid sending requests that are bound to be rejected.
pub async fn authentication_requirements(State(state): State<AppState>) -> Json<AuthRequirements> {
    Json(state.gate.requirements().clone())
}
