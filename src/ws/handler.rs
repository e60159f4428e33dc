//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{MatchCommand, CLIENT_QUEUE_CAPACITY};
use crate::util::rate_limit::ClientRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// WebSocket upgrade handler. Every connection gets a fresh id.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let id = Uuid::new_v4();
    ws.on_upgrade(move |socket| handle_socket(socket, id, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, id: Uuid, state: AppState) {
    info!(player_id = %id, "New WebSocket connection");
    state.sessions.insert(id, unix_millis());

    let (ws_sink, ws_stream) = socket.split();
    let (client_tx, client_rx) = mpsc::channel(CLIENT_QUEUE_CAPACITY);
    let events_rx = state.game.subscribe();

    let connect = MatchCommand::Connect { id, tx: client_tx };
    if state.game.command_tx.send(connect).await.is_err() {
        error!(player_id = %id, "Match loop is not running");
        state.sessions.remove(&id);
        return;
    }

    run_session(id, ws_sink, ws_stream, &state.game.command_tx, client_rx, events_rx).await;

    // Signal disconnect to match loop
    let _ = state
        .game
        .command_tx
        .send(MatchCommand::Disconnect { id })
        .await;
    state.sessions.remove(&id);

    info!(player_id = %id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    id: Uuid,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    command_tx: &mpsc::Sender<MatchCommand>,
    mut client_rx: mpsc::Receiver<ServerMsg>,
    mut events_rx: broadcast::Receiver<ServerMsg>,
) {
    let rate_limiter = ClientRateLimiter::new();

    // Writer task: targeted messages and global events -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                targeted = client_rx.recv() => match targeted {
                    Some(msg) => msg,
                    None => break,
                },
                global = events_rx.recv() => match global {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(player_id = %id, lagged_count = n, "Client lagged, skipping events");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            };
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(player_id = %id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> match loop
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    debug!(player_id = %id, "Rate limited input message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => {
                        if command_tx.send(MatchCommand::Intent { id, msg }).await.is_err() {
                            debug!(player_id = %id, "Command channel closed");
                            break;
                        }
                    }
                    Err(e) => {
                        warn!(player_id = %id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id = %id, "Client initiated close");
                break;
            }
            Err(e) => {
                debug!(player_id = %id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
