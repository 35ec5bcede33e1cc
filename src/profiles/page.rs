use axum::{
    Json, debug_handler,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, header::CONTENT_TYPE},
};
use tower_sessions::Session;
use uuid::Uuid;

use crate::{AppResult, AppState, models::ProfileUpdate};

use super::{AvatarUpload, ProfileTarget, ProfileView};

#[debug_handler]
pub(crate) async fn my_profile(
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Json<ProfileView>> {
    let store = state.session_store(session).await;
    let view = state.profiles().fetch_profile(&store, ProfileTarget::Myself).await?;
    Ok(Json(view))
}

#[debug_handler]
pub(crate) async fn profile(
    Path(profile_id): Path<Uuid>,
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Json<ProfileView>> {
    let store = state.session_store(session).await;
    let view = state.profiles().fetch_profile(&store, ProfileTarget::User(profile_id)).await?;
    Ok(Json(view))
}

#[debug_handler]
pub(crate) async fn save_my_profile(
    State(state): State<AppState>,
    session: Session,
    Json(update): Json<ProfileUpdate>,
) -> AppResult<Json<ProfileView>> {
    let mut store = state.session_store(session).await;
    let profiles = state.profiles();

    let mut view = profiles.fetch_profile(&store, ProfileTarget::Myself).await?;
    profiles.save_profile(&mut store, &mut view, update, None).await?;
    Ok(Json(view))
}

#[debug_handler]
pub(crate) async fn upload_avatar(
    State(state): State<AppState>,
    session: Session,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<ProfileView>> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    let avatar = AvatarUpload::new(body.to_vec(), content_type);

    let mut store = state.session_store(session).await;
    let profiles = state.profiles();

    let mut view = profiles.fetch_profile(&store, ProfileTarget::Myself).await?;
    profiles
        .save_profile(&mut store, &mut view, ProfileUpdate::default(), Some(avatar))
        .await?;
    Ok(Json(view))
}
