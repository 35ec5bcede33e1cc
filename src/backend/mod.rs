//! The remote collaborator: row store, auth, push channel and object storage.
//!
//! Views only ever talk to these traits. [`SqliteBackend`] and
//! [`LocalStorage`] are the self-hosted implementations the server uses.

mod push;
mod sqlite;
mod storage;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    error::BackendResult,
    models::{Identity, Message, Profile, ProfileUpdate},
};

pub use push::{ChangeEvent, ChangeKind, ChangeStream, PushChannel, Table};
pub use sqlite::SqliteBackend;
pub use storage::LocalStorage;

#[async_trait]
pub trait Backend: Send + Sync {
    /// Check credentials against the identity provider.
    async fn sign_in(&self, email: &str, password: &str) -> BackendResult<Identity>;

    /// Register a new identity. The backend creates the matching profile
    /// row, named after `name` or, failing that, the email.
    async fn sign_up(&self, email: &str, password: &str, name: Option<&str>)
    -> BackendResult<Identity>;

    async fn select_profile(&self, id: Uuid) -> BackendResult<Option<Profile>>;

    async fn select_profiles(&self) -> BackendResult<Vec<Profile>>;

    /// Write the fields set in `update` and return the stored row.
    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> BackendResult<Profile>;

    /// Every message, ascending by creation time then id.
    async fn select_messages(&self) -> BackendResult<Vec<Message>>;

    async fn select_message(&self, id: i64) -> BackendResult<Option<Message>>;

    async fn insert_message(&self, user_id: Uuid, content: &str) -> BackendResult<Message>;

    /// Changes committed after this call returns.
    fn subscribe(&self, table: Table, kind: ChangeKind) -> ChangeStream;
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `bytes` at `path` inside `bucket` and return its public URL.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> BackendResult<String>;

    async fn remove(&self, bucket: &str, paths: &[String]) -> BackendResult<()>;

    /// Recover the stored path from a public URL this storage produced.
    fn object_path(&self, bucket: &str, public_url: &str) -> Option<String>;
}
