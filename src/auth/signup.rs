use axum::{Json, debug_handler, extract::State};
use serde::Deserialize;
use tower_sessions::Session;

use crate::{AppResult, AppState, models};

#[derive(Deserialize)]
pub(crate) struct SignupRequest {
    email: String,
    password: String,
    name: Option<String>,
}

#[debug_handler]
pub(crate) async fn signup(
    State(state): State<AppState>,
    session: Session,
    Json(SignupRequest { email, password, name }): Json<SignupRequest>,
) -> AppResult<Json<models::Session>> {
    session.cycle_id().await?;

    let mut store = state.session_store(session).await;
    let current = store.signup(&email, &password, name.as_deref()).await?;
    Ok(Json(current.clone()))
}
