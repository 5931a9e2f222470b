mod common;

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use glimpse_types::events::StoryEvent;

use common::{spawn_server, token_for};

const TIMEOUT: Duration = Duration::from_secs(5);

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn connect(addr: SocketAddr, token: &str) -> WsStream {
    let (mut ws, _) = connect_async(format!("ws://{}/gateway", addr)).await.unwrap();
    let identify = json!({ "type": "Identify", "data": { "token": token } });
    ws.send(Message::text(identify.to_string())).await.unwrap();
    ws
}

/// Next text frame as a `StoryEvent`, skipping pings.
async fn next_event(ws: &mut WsStream) -> StoryEvent {
    loop {
        let msg = timeout(TIMEOUT, ws.next())
            .await
            .expect("timeout waiting for event")
            .expect("stream closed")
            .expect("ws error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn post_story(addr: SocketAddr, author: &str) -> String {
    let story: Value = reqwest::Client::new()
        .post(format!("http://{}/stories", addr))
        .bearer_auth(token_for(author))
        .json(&json!({ "media_url": "https://cdn.example.com/s.jpg", "media_type": "image" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    story["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn identify_then_relay_created_stories() -> anyhow::Result<()> {
    let (addr, handle) = spawn_server().await?;

    let mut ws = connect(addr, &token_for("alice")).await;
    assert_eq!(next_event(&mut ws).await, StoryEvent::Ready { user_id: "alice".into() });

    let story_id = post_story(addr, "alice").await;
    match next_event(&mut ws).await {
        StoryEvent::StoryCreated { story_id: id, author_id } => {
            assert_eq!(id.to_string(), story_id);
            assert_eq!(author_id, "alice");
        }
        other => panic!("expected StoryCreated, got {:?}", other),
    }

    handle.abort();
    Ok(())
}

#[tokio::test]
async fn invalid_token_closes_the_socket() -> anyhow::Result<()> {
    let (addr, handle) = spawn_server().await?;

    let mut ws = connect(addr, "not-a-jwt").await;
    let closed = timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                None | Some(Err(_)) | Some(Ok(Message::Close(_))) => return true,
                Some(Ok(Message::Text(_))) => return false,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await
    .expect("socket stayed open");
    assert!(closed, "unidentified socket received an event");

    handle.abort();
    Ok(())
}

#[tokio::test]
async fn view_events_reach_only_author_and_viewer() -> anyhow::Result<()> {
    let (addr, handle) = spawn_server().await?;
    let client = reqwest::Client::new();

    let mut alice = connect(addr, &token_for("alice")).await;
    let mut carol = connect(addr, &token_for("carol")).await;
    assert!(matches!(next_event(&mut alice).await, StoryEvent::Ready { .. }));
    assert!(matches!(next_event(&mut carol).await, StoryEvent::Ready { .. }));

    let first = post_story(addr, "alice").await;
    client
        .post(format!("http://{}/stories/{}/views", addr, first))
        .bearer_auth(token_for("bob"))
        .send()
        .await?;
    let second = post_story(addr, "alice").await;

    // Carol sees both stories appear but not bob's view in between
    for expected in [&first, &second] {
        match next_event(&mut carol).await {
            StoryEvent::StoryCreated { story_id, .. } => assert_eq!(&story_id.to_string(), expected),
            other => panic!("carol received {:?}", other),
        }
    }

    assert!(matches!(next_event(&mut alice).await, StoryEvent::StoryCreated { .. }));
    assert_eq!(
        next_event(&mut alice).await,
        StoryEvent::StoryViewed {
            story_id: first.parse()?,
            author_id: "alice".into(),
            viewer_id: "bob".into(),
        }
    );
    assert!(matches!(next_event(&mut alice).await, StoryEvent::StoryCreated { .. }));

    handle.abort();
    Ok(())
}
