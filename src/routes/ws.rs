//! WebSocket upgrade + per-connection session loop. Each connection owns one
//! player session and its timer table; the loop selects between socket
//! messages and fired timers, feeds them into the session state machine, and
//! applies the resulting effects.

use std::sync::Arc;
use axum::{
  extract::{
    ws::{Message, WebSocket},
    State, WebSocketUpgrade,
  },
  response::IntoResponse,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument};
use uuid::Uuid;

use crate::config::PlayerConfig;
use crate::protocol::{ClientWsMessage, ServerWsMessage};
use crate::session::{Effect, PlayerEvent, PlayerSession};
use crate::timer::TimerTable;
use crate::util::trunc_for_log;

#[instrument(level = "info", skip(ws, config))]
pub async fn ws_upgrade(ws: WebSocketUpgrade, State(config): State<Arc<PlayerConfig>>) -> impl IntoResponse {
  info!(target: "player_core", "WebSocket upgrade requested");
  ws.on_upgrade(move |socket| handle_ws(socket, config))
}

#[instrument(level = "info", skip(socket, config))]
async fn handle_ws(mut socket: WebSocket, config: Arc<PlayerConfig>) {
  let connection = Uuid::new_v4();
  info!(target: "player_core", %connection, "player connected");

  let mut session = PlayerSession::new(&config);
  let mut timers = TimerTable::new();
  let (timer_tx, mut timer_rx) = mpsc::channel(16);

  // The ready notification goes out exactly once, before any start command.
  let ready = ServerWsMessage::VopReadyNotification { metadata: config.metadata.clone() };
  if send(&mut socket, &ready).await.is_err() {
    return;
  }

  'conn: loop {
    let event = tokio::select! {
      msg = socket.recv() => match msg {
        Some(Ok(Message::Text(txt))) => {
          match serde_json::from_str::<ClientWsMessage>(&txt) {
            Ok(incoming) => {
              debug!(target: "player_core", %connection, "WS received: {:?}", &incoming);
              PlayerEvent::Message(incoming)
            }
            Err(e) => {
              debug!(target: "player_core", %connection, error = %e, payload = %trunc_for_log(&txt, 200), "invalid client message");
              let reply = ServerWsMessage::Error { message: format!("Invalid JSON: {e}") };
              if send(&mut socket, &reply).await.is_err() {
                break 'conn;
              }
              continue;
            }
          }
        }
        Some(Ok(Message::Ping(payload))) => {
          let _ = socket.send(Message::Pong(payload)).await;
          continue;
        }
        Some(Ok(Message::Close(_))) | None => break 'conn,
        Some(Ok(_)) => continue,
        Some(Err(e)) => {
          error!(target: "player_core", %connection, error = %e, "WS receive error");
          break 'conn;
        }
      },
      fired = timer_rx.recv() => match fired {
        Some(purpose) => PlayerEvent::Timer(purpose),
        None => break 'conn,
      },
    };

    for effect in session.handle(event) {
      match effect {
        Effect::Send(msg) => {
          if send(&mut socket, &msg).await.is_err() {
            error!(target: "player_core", %connection, "WS send error");
            break 'conn;
          }
        }
        Effect::Schedule(purpose, delay) => timers.schedule(purpose, delay, timer_tx.clone()),
        Effect::Cancel(purpose) => timers.cancel(purpose),
      }
    }
  }

  timers.cancel_all();
  info!(target: "player_core", %connection, session = %session.session_id(), "player disconnected");
}

async fn send(socket: &mut WebSocket, msg: &ServerWsMessage) -> Result<(), axum::Error> {
  let out = serde_json::to_string(msg).unwrap_or_else(|e| {
    serde_json::json!({ "type": "error", "message": format!("Serialization error: {}", e) }).to_string()
  });
  socket.send(Message::Text(out)).await
}
