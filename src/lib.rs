pub mod appresult;
pub mod auth;
pub mod backend;
pub mod config;
pub mod directory;
pub mod error;
pub mod feed;
pub mod generation;
pub mod models;
pub mod profiles;
pub mod session;

use std::sync::Arc;

use axum::{Router, extract::FromRef};
use serde_json::Value;

use backend::{Backend, ObjectStorage};
use error::{BackendError, BackendResult};
use profiles::ProfileRepository;
use session::{SessionStore, SignupGate};

pub use appresult::{AppError, AppResult};
pub use error::{Error, Result};

#[derive(Clone, FromRef)]
pub struct AppState {
    pub backend: Arc<dyn Backend>,
    pub storage: Arc<dyn ObjectStorage>,
    pub gate: SignupGate,
}

impl AppState {
    /// Session store for one request, rehydrated from its cookie session.
    pub async fn session_store(&self, session: tower_sessions::Session) -> SessionStore {
        SessionStore::restore(self.backend.clone(), Arc::new(session), self.gate.clone()).await
    }

    pub fn profiles(&self) -> ProfileRepository {
        ProfileRepository::new(self.backend.clone(), self.storage.clone())
    }
}

/// Every API route, without state or layers.
pub fn router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/profiles", profiles::router())
        .nest("/directory", directory::router())
        .nest("/feed", feed::router())
}

pub trait GetField {
    fn get_str_field(&self, field: &str) -> BackendResult<&str>;
    fn get_i64_field(&self, field: &str) -> BackendResult<i64>;
}

impl GetField for Value {
    fn get_str_field(&self, field: &str) -> BackendResult<&str> {
        self.get(field)
            .ok_or_else(|| BackendError::Malformed(format!("expected {field} in {self}")))?
            .as_str()
            .ok_or_else(|| {
                BackendError::Malformed(format!("expected {field} in {self} to be string"))
            })
    }

    fn get_i64_field(&self, field: &str) -> BackendResult<i64> {
        self.get(field)
            .ok_or_else(|| BackendError::Malformed(format!("expected {field} in {self}")))?
            .as_i64()
            .ok_or_else(|| {
                BackendError::Malformed(format!("expected {field} in {self} to be integer"))
            })
    }
}
