use axum::{
    Json, debug_handler,
    extract::{Query, State},
};
use serde::Deserialize;
use tower_sessions::Session;
use uuid::Uuid;

use crate::{AppResult, AppState, models::Profile};

use super::Directory;

pub(crate) fn filter_profiles<'a>(
    profiles: &'a [Profile],
    term: &str,
    caller: Option<Uuid>,
) -> Vec<&'a Profile> {
    let term = term.trim().to_lowercase();

    profiles
        .iter()
        .filter(|profile| Some(profile.id) != caller)
        .filter(|profile| {
            let Some(name) = profile.display_name() else {
                return false;
            };
            term.is_empty()
                || name.to_lowercase().contains(&term)
                || profile
                    .email
                    .as_deref()
                    .is_some_and(|email| email.to_lowercase().contains(&term))
                || profile.id.to_string().contains(&term)
        })
        .collect()
}

#[derive(Deserialize)]
pub(crate) struct DirectoryQuery {
    #[serde(default)]
    q: String,
}

#[debug_handler]
pub(crate) async fn directory(
    Query(DirectoryQuery { q }): Query<DirectoryQuery>,
    State(state): State<AppState>,
    session: Session,
) -> AppResult<Json<Vec<Profile>>> {
    let store = state.session_store(session).await;
    let caller = store.require()?.user_id();

    let mut directory = Directory::new(state.backend.clone());
    directory.load_all().await?;

    Ok(Json(
        directory
            .search(&q, Some(caller))
            .into_iter()
            .cloned()
            .collect(),
    ))
}
