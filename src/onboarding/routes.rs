//! REST endpoints for health and stored profiles.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use super::manager::OnboardingManager;

/// Shared state for onboarding routes.
#[derive(Clone)]
pub struct OnboardingRouteState {
    pub manager: Arc<OnboardingManager>,
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// GET /api/profiles/{user_id}
///
/// Returns the stored profile, or 404 if the user has none.
async fn get_profile(
    State(state): State<OnboardingRouteState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match state.manager.profile(&user_id).await {
        Ok(Some(profile)) => Json(profile).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "No profile for this user"})),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(user_id, "Profile lookup failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "Profile lookup failed"})),
            )
                .into_response()
        }
    }
}

/// Build the REST routes.
pub fn onboarding_routes(state: OnboardingRouteState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/profiles/{user_id}", get(get_profile))
        .with_state(state)
}
