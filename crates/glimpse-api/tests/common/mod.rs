use std::net::SocketAddr;
use std::sync::Arc;

use jsonwebtoken::{EncodingKey, Header, encode};
use tokio::net::TcpListener;

use glimpse_api::{AppStateInner, router};
use glimpse_db::Database;
use glimpse_stories::{SqliteProfiles, SqliteStore, StoryService, SystemClock};
use glimpse_types::api::Claims;

pub const SECRET: &str = "integration-test-secret";

pub fn token_for(user_id: &str) -> String {
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (chrono::Utc::now().timestamp() + 3600) as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

/// Serves a fresh in-memory SQLite deployment on an ephemeral port.
pub async fn spawn_server() -> anyhow::Result<(SocketAddr, tokio::task::JoinHandle<()>)> {
    let db = Arc::new(Database::open_in_memory()?);
    let profiles = Arc::new(SqliteProfiles::new(db.clone()));
    let service = StoryService::new(
        Arc::new(SqliteStore::new(db)),
        profiles.clone(),
        Arc::new(SystemClock),
    );
    let state = Arc::new(AppStateInner {
        service,
        profiles,
        jwt_secret: SECRET.to_string(),
    });
    let app = router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server error");
    });

    Ok((addr, handle))
}
