//! The live message feed.
//!
//! Mounting loads the history, joins it onto author profiles and then
//! subscribes to message inserts. Each insert is re-fetched, joined and
//! appended in notification order. Sending never appends locally; the
//! sender sees their own message when the push channel echoes it.

mod join;
mod live;
mod msg;
mod ws;

use axum::{
    Json, Router, debug_handler,
    extract::State,
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{AppResult, AppState};

pub use join::{Author, AuthorIndex, FeedMessage, UNKNOWN_AUTHOR};
pub use live::{FeedState, MAX_MESSAGE_CHARS, MessageFeed, MessageSender, TeardownHandle};
pub use msg::{FeedFrame, RenderedMessage, render_content};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(history).post(send))
        .route("/ws", get(ws::feed_ws))
}

/// The joined history, for clients that do not hold a socket open.
#[debug_handler]
async fn history(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Json<Vec<RenderedMessage>>> {
    let store = state.session_store(session).await;
    let mut feed = MessageFeed::for_session(&store)?;

    feed.mount().await?;
    let messages = feed.messages().iter().map(RenderedMessage::from).collect();
    feed.teardown();

    Ok(Json(messages))
}

#[derive(Deserialize)]
struct SendMessageRequest {
    content: String,
}

#[debug_handler]
async fn send(
    State(state): State<AppState>,
    session: Session,
    Json(SendMessageRequest { content }): Json<SendMessageRequest>,
) -> AppResult<StatusCode> {
    let store = state.session_store(session).await;
    MessageFeed::for_session(&store)?.send(&content).await?;
    Ok(StatusCode::ACCEPTED)
}
