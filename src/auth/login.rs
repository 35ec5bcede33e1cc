use axum::{Json, debug_handler, extract::State};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{AppResult, AppState, models};

#[derive(Deserialize)]
pub(crate) struct LoginRequest {
    email: String,
    password: String,
}

#[debug_handler]
pub(crate) async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(LoginRequest { email, password }): Json<LoginRequest>,
) -> AppResult<Json<models::Session>> {
    session.cycle_id().await?;

    let mut store = state.session_store(session).await;
    let current = store.login(&email, &password).await?;
    Ok(Json(current.clone()))
}
