use axum::{Extension, Json, extract::State};
use tracing::{error, info};

use glimpse_types::api::{Claims, UpsertProfileRequest};
use glimpse_types::models::Profile;

use crate::error::ApiError;
use crate::state::AppState;

const USERNAME_MIN_CHARS: usize = 3;
const USERNAME_MAX_CHARS: usize = 32;

/// Create or replace the caller's own profile.
pub async fn upsert_profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<UpsertProfileRequest>,
) -> Result<Json<Profile>, ApiError> {
    let (username, display_name) = validate(&req)?;

    let profile = Profile {
        user_id: claims.sub,
        username,
        display_name,
        avatar_url: req.avatar_url.filter(|u| !u.trim().is_empty()),
    };

    let directory = state.profiles.clone();
    let stored = profile.clone();
    tokio::task::spawn_blocking(move || directory.upsert_profile(stored))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal
        })?
        .map_err(|e| ApiError::Story(glimpse_stories::StoryError::Unavailable(e)))?;

    info!("Profile updated for {}", profile.user_id);
    Ok(Json(profile))
}

/// Trimmed username and display name. Lengths count characters.
fn validate(req: &UpsertProfileRequest) -> Result<(String, String), ApiError> {
    let username = req.username.trim().to_string();
    let len = username.chars().count();
    if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&len) {
        return Err(ApiError::BadRequest(format!(
            "username must be {}-{} characters",
            USERNAME_MIN_CHARS, USERNAME_MAX_CHARS
        )));
    }
    let display_name = req.display_name.trim().to_string();
    if display_name.is_empty() {
        return Err(ApiError::BadRequest("display_name must not be empty".into()));
    }
    Ok((username, display_name))
}
