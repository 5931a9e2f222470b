use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use glimpse_stories::{NewStory, StoryError, StoryService};
use glimpse_types::api::{Claims, CreateStoryRequest, ViewerEntry, ViewersResponse};
use glimpse_types::models::{Story, StoryGroup};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AuthorStoriesQuery {
    /// Only stories still inside the 24h window.
    #[serde(default)]
    pub active: bool,
}

pub async fn create_story(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateStoryRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new = NewStory {
        media_url: req.media_url,
        media_type: req.media_type,
        caption: req.caption,
    };
    let story = state
        .run_blocking(move |svc| svc.create_story(&claims.sub, new))
        .await?;

    Ok((StatusCode::CREATED, Json(story)))
}

pub async fn get_feed(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<StoryGroup>>, ApiError> {
    let viewer = claims.sub.clone();
    let mut groups = state
        .run_blocking(move |svc| svc.list_story_groups_for_viewer(&viewer))
        .await?;

    for group in &mut groups {
        redact_viewers(&mut group.stories, &group.author_id, &claims.sub);
    }
    Ok(Json(groups))
}

pub async fn get_user_stories(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(query): Query<AuthorStoriesQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<Story>>, ApiError> {
    let author = user_id.clone();
    let mut stories = state
        .run_blocking(move |svc| {
            if query.active {
                svc.active_stories_by_author(&author)
            } else {
                svc.stories_by_author(&author)
            }
        })
        .await?;

    redact_viewers(&mut stories, &user_id, &claims.sub);
    Ok(Json(stories))
}

pub async fn record_view(
    State(state): State<AppState>,
    Path(story_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<StatusCode, ApiError> {
    state
        .run_blocking(move |svc| svc.record_view(story_id, &claims.sub))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Viewer list for the author's own story. Unknown stories yield an empty list.
pub async fn get_viewers(
    State(state): State<AppState>,
    Path(story_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ViewersResponse>, ApiError> {
    let caller = claims.sub;
    let viewers = state
        .run_blocking(move |svc| author_viewers(svc, story_id, &caller))
        .await?
        .ok_or(ApiError::Forbidden)?;

    Ok(Json(ViewersResponse {
        story_id,
        views_count: viewers.len(),
        viewers,
    }))
}

/// `None` when `caller` did not write the story; profiles are only resolved
/// for the author.
fn author_viewers(
    svc: &StoryService,
    story_id: Uuid,
    caller: &str,
) -> Result<Option<Vec<ViewerEntry>>, StoryError> {
    match svc.get_story(story_id)? {
        Some(story) if story.author_id != caller => Ok(None),
        Some(_) => svc.viewer_profiles(story_id).map(Some),
        None => Ok(Some(vec![])),
    }
}

/// Other people's viewer sets are private; callers only learn whether they
/// themselves have seen a story.
fn redact_viewers(stories: &mut [Story], author_id: &str, caller: &str) {
    if author_id == caller {
        return;
    }
    for story in stories {
        story.viewed_by.retain(|v| v == caller);
    }
}
