use axum::{debug_handler, extract::State, http::StatusCode};
use tower_sessions::Session;

use crate::AppState;

#[debug_handler]
pub(crate) async fn logout(State(state): State<AppState>, session: Session) -> StatusCode {
    let mut store = state.session_store(session).await;
    store.logout().await;
    StatusCode::NO_CONTENT
}
