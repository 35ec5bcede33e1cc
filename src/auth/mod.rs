mod login;
mod logout;
mod signup;

use axum::{Json, Router, debug_handler, extract::State, routing::{get, post}};
use tower_sessions::Session;

use crate::{AppState, models};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login::login))
        .route("/signup", post(signup::signup))
        .route("/logout", post(logout::logout))
        .route("/session", get(current_session))
}

/// The signed in user, or `null`. Views gate on this.
#[debug_handler]
async fn current_session(
    State(state): State<AppState>,
    session: Session,
) -> Json<Option<models::Session>> {
    let store = state.session_store(session).await;
    Json(store.current().cloned())
}
