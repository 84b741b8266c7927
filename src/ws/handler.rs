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
use crate::game::{MatchError, MatchHandle};
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Longest display name kept, in characters
const MAX_DISPLAY_NAME: usize = 24;

/// WebSocket upgrade handler. Each connection gets an opaque id that doubles
/// as its player id.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let connection_id = Uuid::new_v4();
    ws.on_upgrade(move |socket| handle_socket(socket, connection_id, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, connection_id: Uuid, state: AppState) {
    info!(connection_id = %connection_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        connection_id,
        server_time: unix_millis(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(connection_id = %connection_id, error = %e, "Failed to send welcome");
        return;
    }

    let game = state.game.clone();
    let snapshot_rx = game.subscribe();

    run_session(connection_id, &game, ws_sink, ws_stream, snapshot_rx).await;

    // Connection drop removes the player immediately
    if let Err(e) = game.leave(connection_id).await {
        warn!(connection_id = %connection_id, error = %e, "Failed to remove player");
    }

    info!(connection_id = %connection_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    connection_id: Uuid,
    game: &MatchHandle,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    mut snapshot_rx: broadcast::Receiver<ServerMsg>,
) {
    let rate_limiter = ConnectionRateLimiter::new();
    let (direct_tx, mut direct_rx) = mpsc::channel::<ServerMsg>(32);

    // Writer task: broadcast snapshots and direct replies -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                direct = direct_rx.recv() => match direct {
                    Some(msg) => msg,
                    None => break,
                },
                snapshot = snapshot_rx.recv() => match snapshot {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(
                            connection_id = %connection_id,
                            lagged_count = n,
                            "Client lagged, skipping {} snapshots", n
                        );
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(connection_id = %connection_id, "Snapshot channel closed");
                        break;
                    }
                },
            };

            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(connection_id = %connection_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    let mut joined = false;

    // Reader loop: WebSocket -> match task
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let client_msg = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(
                            connection_id = %connection_id,
                            error = %e,
                            "Failed to parse client message"
                        );
                        let _ = direct_tx
                            .send(ServerMsg::error("bad_message", e.to_string()))
                            .await;
                        continue;
                    }
                };

                if !allowed(&rate_limiter, &client_msg) {
                    warn!(connection_id = %connection_id, "Rate limited client message");
                    continue;
                }

                let reply = match dispatch(connection_id, game, client_msg, &mut joined).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        error!(connection_id = %connection_id, error = %e, "Match unavailable");
                        break;
                    }
                };

                if let Some(reply) = reply {
                    if direct_tx.send(reply).await.is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(connection_id = %connection_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(connection_id = %connection_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(connection_id = %connection_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

fn allowed(limiter: &ConnectionRateLimiter, msg: &ClientMsg) -> bool {
    match msg {
        ClientMsg::Input { .. } => limiter.check_input(),
        ClientMsg::PlaceBuilding { .. } => limiter.check_build(),
        ClientMsg::Join { .. } | ClientMsg::ReadyUp | ClientMsg::Ping { .. } => {
            limiter.check_control()
        }
    }
}

/// Forward one client message to the match, returning a direct reply if any
async fn dispatch(
    connection_id: Uuid,
    game: &MatchHandle,
    msg: ClientMsg,
    joined: &mut bool,
) -> Result<Option<ServerMsg>, MatchError> {
    if let Some(input) = msg.move_input() {
        game.input(connection_id, input).await?;
        return Ok(None);
    }

    let reply = match msg {
        ClientMsg::Join { display_name } => {
            if *joined {
                ServerMsg::error("already_joined", "This connection already has a player")
            } else {
                let name = sanitize_display_name(&display_name, connection_id);
                let player = game.join(connection_id, name).await?;
                *joined = true;
                let (world_width, world_height) = game.world_size();
                ServerMsg::Joined {
                    player,
                    world_width,
                    world_height,
                }
            }
        }
        ClientMsg::PlaceBuilding {
            x,
            y,
            building_type,
        } => match game.place_building(connection_id, x, y, building_type).await? {
            Ok(building) => ServerMsg::BuildingPlaced { building },
            Err(reason) => ServerMsg::BuildingRejected { reason },
        },
        ClientMsg::ReadyUp => ServerMsg::ReadyResult {
            match_reset: game.ready_up(connection_id).await?,
        },
        ClientMsg::Ping { t } => ServerMsg::Pong { t },
        ClientMsg::Input { .. } => return Ok(None),
    };

    Ok(Some(reply))
}

/// Trim, strip control characters and cap the length; fall back to a
/// generated name.
fn sanitize_display_name(raw: &str, connection_id: Uuid) -> String {
    let name: String = raw
        .trim()
        .chars()
        .filter(|c| !c.is_control())
        .take(MAX_DISPLAY_NAME)
        .collect();
    if name.is_empty() {
        format!("Player_{}", &connection_id.to_string()[..8])
    } else {
        name
    }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameMatch, WorldConfig};

    #[test]
    fn display_names_are_cleaned() {
        let id = Uuid::new_v4();
        assert_eq!(sanitize_display_name("  Ada \n", id), "Ada");
        assert_eq!(sanitize_display_name(&"x".repeat(40), id).len(), MAX_DISPLAY_NAME);
        let fallback = sanitize_display_name("   ", id);
        assert!(fallback.starts_with("Player_"));
        assert_eq!(fallback.len(), "Player_".len() + 8);
    }

    #[tokio::test]
    async fn dispatch_replies_per_message_kind() {
        let (game_match, handle) = GameMatch::new(WorldConfig::default(), 3);
        tokio::spawn(game_match.run());
        let id = Uuid::new_v4();
        let mut joined = false;

        let join = || ClientMsg::Join {
            display_name: "Ada".into(),
        };

        let reply = dispatch(id, &handle, join(), &mut joined).await.unwrap();
        assert!(matches!(reply, Some(ServerMsg::Joined { .. })));
        assert!(joined);

        let reply = dispatch(id, &handle, join(), &mut joined).await.unwrap();
        assert!(matches!(reply, Some(ServerMsg::Error { .. })));

        let input = ClientMsg::Input {
            up: true,
            down: false,
            left: false,
            right: false,
        };
        assert!(dispatch(id, &handle, input, &mut joined).await.unwrap().is_none());

        let reply = dispatch(
            id,
            &handle,
            ClientMsg::PlaceBuilding {
                x: 100.0,
                y: 100.0,
                building_type: Default::default(),
            },
            &mut joined,
        )
        .await
        .unwrap();
        assert!(matches!(reply, Some(ServerMsg::BuildingRejected { .. })));

        let reply = dispatch(id, &handle, ClientMsg::ReadyUp, &mut joined).await.unwrap();
        assert!(matches!(
            reply,
            Some(ServerMsg::ReadyResult { match_reset: true })
        ));

        let reply = dispatch(id, &handle, ClientMsg::Ping { t: 9 }, &mut joined).await.unwrap();
        assert!(matches!(reply, Some(ServerMsg::Pong { t: 9 })));
    }
}
