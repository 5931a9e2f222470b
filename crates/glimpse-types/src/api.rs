use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AuthorDisplay, MediaType};

// -- JWT Claims --

/// Claims of tokens issued by the external identity provider. `sub` is the
/// acting user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

// -- Stories --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateStoryRequest {
    pub media_url: String,
    pub media_type: MediaType,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ViewerEntry {
    pub user_id: String,
    #[serde(flatten)]
    pub display: AuthorDisplay,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ViewersResponse {
    pub story_id: Uuid,
    pub views_count: usize,
    pub viewers: Vec<ViewerEntry>,
}

// -- Profiles --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpsertProfileRequest {
    pub username: String,
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}
