use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::models::SeatEvent;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/shows/{show_id}/live", get(seat_feed))
}

// GET /api/shows/{show_id}/live
async fn seat_feed(
    ws: WebSocketUpgrade,
    Path(show_id): Path<i64>,
    State(state): State<Arc<AppState>>,
) -> Response {
    // подписываемся до апгрейда, чтобы не потерять события между ними
    let events = state.seat_events.subscribe();
    ws.on_upgrade(move |socket| handle_seat_feed(socket, show_id, events))
}

async fn handle_seat_feed(
    socket: WebSocket,
    show_id: i64,
    mut events: broadcast::Receiver<SeatEvent>,
) {
    debug!("Seat feed opened for show {}", show_id);
    let (mut sender, mut receiver) = socket.split();

    // Пересылаем клиенту события только его сеанса
    let mut send_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if event.show_id() != show_id {
                        continue;
                    }
                    let Ok(json) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // медленный клиент пропустил часть событий, но остаётся подключён
                    warn!("Seat feed for show {} lagged by {} events", show_id, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // Ничего не читаем от клиента, ждём только Close
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    debug!("Seat feed closed for show {}", show_id);
}
