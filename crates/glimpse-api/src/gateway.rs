use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{info, trace, warn};

use glimpse_types::events::{GatewayCommand, StoryEvent};

use crate::middleware::decode_claims;
use crate::state::AppState;

/// Heartbeat interval: server sends a Ping every 15 seconds.
/// If 2 consecutive Pongs are missed (~30s), the connection is dropped.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long a fresh socket may take to send `Identify`.
const IDENTIFY_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

/// Identify handshake, then relay story events until either side goes away.
/// View events are only relayed to the story's author and the viewer.
pub async fn handle_connection(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    let user_id = match wait_for_identify(&mut receiver, &state.jwt_secret).await {
        Some(id) => id,
        None => {
            warn!("WebSocket client failed to identify, closing");
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    };

    info!("{} connected to gateway", user_id);

    // Subscribe before Ready so nothing published after the handshake is missed
    let events = state.service.subscribe();

    let ready = StoryEvent::Ready { user_id: user_id.clone() };
    if send_event(&mut sender, &ready).await.is_err() {
        return;
    }

    run_connection_loop(sender, receiver, events, user_id.clone()).await;
    info!("{} disconnected from gateway", user_id);
}

async fn wait_for_identify(receiver: &mut SplitStream<WebSocket>, secret: &str) -> Option<String> {
    let first = tokio::time::timeout(IDENTIFY_TIMEOUT, receiver.next()).await.ok()??;
    let Ok(Message::Text(text)) = first else {
        return None;
    };

    match serde_json::from_str::<GatewayCommand>(text.as_str()) {
        Ok(GatewayCommand::Identify { token }) => decode_claims(&token, secret).map(|c| c.sub),
        Err(e) => {
            warn!("Invalid gateway command: {}", e);
            None
        }
    }
}

async fn send_event(sender: &mut SplitSink<WebSocket, Message>, event: &StoryEvent) -> Result<(), ()> {
    let text = serde_json::to_string(event).map_err(|e| warn!("Failed to encode event: {}", e))?;
    sender.send(Message::Text(text.into())).await.map_err(|_| ())
}

async fn run_connection_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut events: broadcast::Receiver<StoryEvent>,
    user_id: String,
) {
    let pong_received = Arc::new(AtomicBool::new(true));
    let pong_flag_send = pong_received.clone();

    // Forward story events -> client, with heartbeat
    let mut send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;
        let mut missed_heartbeats: u8 = 0;

        loop {
            tokio::select! {
                result = events.recv() => {
                    let event = match result {
                        Ok(event) => event,
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("Event receiver lagged by {} messages", n);
                            continue;
                        }
                        Err(_) => break,
                    };
                    if !event.is_visible_to(&user_id) {
                        continue;
                    }

                    if send_event(&mut sender, &event).await.is_err() {
                        break;
                    }
                }
                _ = heartbeat.tick() => {
                    if pong_flag_send.swap(false, Ordering::Acquire) {
                        missed_heartbeats = 0;
                    } else {
                        missed_heartbeats += 1;
                        if missed_heartbeats >= 2 {
                            warn!("Heartbeat timeout (missed {} pongs), dropping connection", missed_heartbeats);
                            break;
                        }
                    }
                    if sender.send(Message::Ping(vec![].into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    // The gateway is read-only after Identify; only pongs and close matter
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Pong(_) => pong_received.store(true, Ordering::Release),
                Message::Close(_) => break,
                other => trace!("Ignoring client frame: {:?}", other),
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }
}
