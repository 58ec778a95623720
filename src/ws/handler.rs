//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::layout::catalogue;
use crate::session::RoomManager;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::ws::protocol::{ClientMsg, ServerMsg};
use crate::ws::{deliver, Outbound, OUTBOUND_BUFFER};

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let player_id = Uuid::new_v4();
    info!(player_id = %player_id, "New WebSocket connection");

    let (mut ws_sink, mut ws_stream) = socket.split();
    let (outbound, mut outbound_rx) = mpsc::channel::<ServerMsg>(OUTBOUND_BUFFER);

    // Writer task: outbound queue -> WebSocket
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(player_id = %player_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    state.rooms.connect(player_id);
    deliver(
        player_id,
        &outbound,
        ServerMsg::Connected {
            player_id,
            maps: catalogue(),
        },
    );

    let rate_limiter = ConnectionRateLimiter::new();

    // Reader loop: WebSocket -> room manager
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_message() {
                    warn!(player_id = %player_id, "Rate limited message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => handle_message(&state.rooms, player_id, &outbound, msg).await,
                    Err(e) => {
                        warn!(player_id = %player_id, error = %e, "Failed to parse client message");
                        deliver(player_id, &outbound, ServerMsg::error("Invalid message format"));
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(player_id = %player_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(player_id = %player_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(player_id = %player_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    state.rooms.disconnect(player_id);
    writer_handle.abort();

    info!(player_id = %player_id, "WebSocket connection closed");
}

/// Dispatch one parsed client message. Success replies are sent by the room
/// manager; failures are reported back to the sender only.
pub async fn handle_message(
    rooms: &RoomManager,
    player_id: Uuid,
    outbound: &Outbound,
    msg: ClientMsg,
) {
    let result = match msg {
        ClientMsg::CreateRoom => rooms.create_room(player_id, outbound.clone()).map(drop),
        ClientMsg::JoinRoom { code } => rooms.join_room(player_id, &code, outbound.clone()).map(drop),
        ClientMsg::UpdateSettings { code, settings } => {
            rooms.update_settings(player_id, &code, settings).map(drop)
        }
        ClientMsg::StartGame { code } => rooms.start_game(&code),
        ClientMsg::Action { code, action } => {
            if let Err(e) = rooms.route_action(player_id, &code, action).await {
                deliver(player_id, outbound, ServerMsg::action_failed(e.to_string()));
            }
            return;
        }
        ClientMsg::GetState { code } => {
            if let Some(state) = rooms.get_state(player_id, &code).await {
                deliver(player_id, outbound, ServerMsg::StateUpdate { state });
            }
            return;
        }
        ClientMsg::GetMaps => {
            deliver(player_id, outbound, ServerMsg::MapsList { maps: catalogue() });
            return;
        }
    };

    if let Err(e) = result {
        debug!(player_id = %player_id, error = %e, "Request refused");
        deliver(player_id, outbound, ServerMsg::error(e.to_string()));
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}
