//! Member directory: every known profile, held in memory for searching.
//!
//! There is no invalidation. Each mount calls [`Directory::load_all`] again,
//! so the listing is at most one navigation stale.

mod search;

use std::sync::Arc;

use axum::{Router, routing::get};
use tracing::debug;
use uuid::Uuid;

use crate::{
    AppState,
    backend::Backend,
    error::Result,
    generation::Generation,
    models::Profile,
};

pub struct Directory {
    backend: Arc<dyn Backend>,
    // kept in the order the backend returned them
    profiles: Vec<Profile>,
    generation: Generation,
}

impl Directory {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            profiles: Vec::new(),
            generation: Generation::new(),
        }
    }

    /// Replace the listing with every profile row.
    ///
    /// A response that arrives after [`Directory::unmount`] is dropped.
    pub async fn load_all(&mut self) -> Result<()> {
        let token = self.generation.token();
        let profiles = self.backend.select_profiles().await?;

        let count = profiles.len();
        let listing = &mut self.profiles;
        match token.run_if_current(|| *listing = profiles) {
            Some(()) => debug!(count, "directory loaded"),
            None => debug!(count, "dropping directory load for unmounted view"),
        }
        Ok(())
    }

    /// Handle the view can use to cancel in-flight loads.
    pub fn generation(&self) -> Generation {
        self.generation.clone()
    }

    pub fn unmount(&self) {
        self.generation.advance();
    }

    pub fn get(&self, id: Uuid) -> Option<&Profile> {
        self.profiles.iter().find(|profile| profile.id == id)
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// Case-insensitive match on name, email or id. Skips `caller` and
    /// anyone without a display name; keeps load order.
    pub fn search(&self, term: &str, caller: Option<Uuid>) -> Vec<&Profile> {
        search::filter_profiles(&self.profiles, term, caller)
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(search::directory))
}
