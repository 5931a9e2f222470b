use axum::{
    Json, Router, middleware,
    routing::{get, post, put},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::gateway;
use crate::middleware::require_auth;
use crate::profiles;
use crate::state::AppState;
use crate::stories;

/// Full application router: public health check, bearer-protected REST
/// routes and the WebSocket gateway (which authenticates in-band).
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/gateway", get(gateway::ws_upgrade))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/stories", post(stories::create_story))
        .route("/stories/feed", get(stories::get_feed))
        .route("/stories/{story_id}/views", post(stories::record_view))
        .route("/stories/{story_id}/viewers", get(stories::get_viewers))
        .route("/users/{user_id}/stories", get(stories::get_user_stories))
        .route("/profile", put(profiles::upsert_profile))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use glimpse_stories::{MemoryProfiles, MemoryStore, StoryService, SystemClock};
    use tower::ServiceExt;

    use super::*;
    use crate::state::AppStateInner;

    fn app() -> Router {
        let profiles = Arc::new(MemoryProfiles::new());
        let service = StoryService::new(Arc::new(MemoryStore::new()), profiles.clone(), Arc::new(SystemClock));
        router(Arc::new(AppStateInner {
            service,
            profiles,
            jwt_secret: "unit-test-secret".into(),
        }))
    }

    #[tokio::test]
    async fn health_is_public() {
        let res = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn story_routes_need_a_token() {
        let res = app()
            .oneshot(Request::get("/stories/feed").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
