use axum::{
    debug_handler,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message as WsMessage, WebSocket},
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink};
use serde_json::Value;
use tower_sessions::Session;
use tracing::debug;

use crate::{AppResult, AppState, GetField};

use super::{FeedFrame, MessageFeed, MessageSender, RenderedMessage};

/// One feed instance per socket; closing the socket tears it down.
#[debug_handler]
pub(crate) async fn feed_ws(
    State(state): State<AppState>,
    session: Session,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let store = state.session_store(session).await;
    let feed = MessageFeed::for_session(&store)?;

    Ok(ws.on_upgrade(move |socket| run_feed(socket, feed)).into_response())
}

async fn run_feed(socket: WebSocket, mut feed: MessageFeed) {
    let (mut sender, mut receiver) = socket.split();

    if let Err(e) = feed.mount().await {
        let _ = send_frame(&mut sender, &FeedFrame::Error { error: e.to_string() }).await;
        return;
    }
    if send_frame(&mut sender, &FeedFrame::history(feed.messages())).await.is_err() {
        feed.teardown();
        return;
    }

    let outbox = feed.sender();
    loop {
        tokio::select! {
            live = feed.next_live() => {
                let Some(message) = live else {
                    break;
                };
                let frame = FeedFrame::Message {
                    message: RenderedMessage::from(&message),
                };
                if send_frame(&mut sender, &frame).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => {
                let Some(Ok(incoming)) = incoming else {
                    break;
                };
                match incoming {
                    WsMessage::Text(text) => {
                        if let Err(error) = post(&outbox, text.as_str()).await {
                            let _ = send_frame(&mut sender, &FeedFrame::Error { error }).await;
                        }
                    }
                    WsMessage::Close(_) => break,
                    _ => {}
                }
            }
        }
    }

    feed.teardown();
    debug!(user_id = %outbox.author_id(), "feed socket closed");
}

/// Frames look like `{"content": "..."}`.
async fn post(outbox: &MessageSender, frame: &str) -> Result<(), String> {
    let Ok(frame) = serde_json::from_str::<Value>(frame) else {
        return Err("expected a JSON frame".to_owned());
    };
    let content = frame.get_str_field("content").map_err(|e| e.to_string())?;

    outbox.send(content).await.map_err(|e| e.to_string())
}

async fn send_frame(
    sender: &mut SplitSink<WebSocket, WsMessage>,
    frame: &FeedFrame,
) -> Result<(), axum::Error> {
    let text = serde_json::to_string(frame).map_err(axum::Error::new)?;
    sender.send(WsMessage::Text(text.into())).await
}
