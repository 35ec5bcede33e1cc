//! Shared fixtures for the integration tests.

use std::{
    future::Future,
    io,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use classmates::{
    backend::{Backend, ChangeKind, ChangeStream, LocalStorage, ObjectStorage, SqliteBackend, Table},
    error::{BackendError, BackendResult},
    models::{Identity, Message, Profile, ProfileUpdate},
    session::{MemoryStorage, SessionStore, SignupGate},
};
use tempfile::TempDir;
use tokio::sync::Notify;
use uuid::Uuid;

pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How long to wait before deciding nothing else is coming.
#[allow(dead_code)]
pub const QUIET_PERIOD: Duration = Duration::from_millis(200);

#[allow(dead_code)]
pub const PASSWORD: &str = "hunter22";

#[allow(dead_code)]
pub fn init_test_logging() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("classmates=debug")),
        )
        .with_test_writer()
        .try_init();
}

#[allow(dead_code)]
pub async fn with_timeout<T, F>(fut: F) -> T
where
    F: Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, fut)
        .await
        .expect("test operation timed out")
}

pub async fn backend() -> Arc<SqliteBackend> {
    Arc::new(
        SqliteBackend::in_memory()
            .await
            .expect("in-memory database"),
    )
}

/// A fresh, signed out store with its own session storage.
#[allow(dead_code)]
pub fn session_store(backend: &Arc<SqliteBackend>, gate: SignupGate) -> SessionStore {
    SessionStore::new(backend.clone(), Arc::new(MemoryStorage::new()), gate)
}

/// Sign up `email` and return the signed in store.
#[allow(dead_code)]
pub async fn signed_in(backend: &Arc<SqliteBackend>, email: &str, name: &str) -> SessionStore {
    let mut store = session_store(backend, SignupGate::open());
    store
        .signup(email, PASSWORD, Some(name))
        .await
        .expect("signup");
    store
}

#[allow(dead_code)]
pub fn local_storage() -> (TempDir, Arc<LocalStorage>) {
    let dir = tempfile::tempdir().expect("temp dir");
    let storage = Arc::new(LocalStorage::new(dir.path(), "/storage"));
    (dir, storage)
}

/// Object storage whose uploads always fail. Counts every call it gets.
#[allow(dead_code)]
#[derive(Default)]
pub struct BrokenStorage {
    pub uploads: AtomicUsize,
    pub removals: AtomicUsize,
}

#[allow(dead_code)]
impl BrokenStorage {
    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStorage for BrokenStorage {
    async fn upload(&self, _: &str, _: &str, _: &[u8], _: &str) -> BackendResult<String> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Err(BackendError::Io(io::Error::other("bucket unavailable")))
    }

    async fn remove(&self, _: &str, _: &[String]) -> BackendResult<()> {
        self.removals.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn object_path(&self, _: &str, _: &str) -> Option<String> {
        None
    }
}

/// Wraps a real backend and can break or stall individual reads.
#[allow(dead_code)]
pub struct FlakyBackend {
    inner: Arc<SqliteBackend>,
    fail_profiles: AtomicBool,
    hide_messages: AtomicBool,
    hold_profiles: AtomicBool,
    held: Notify,
    release: Notify,
}

#[allow(dead_code)]
impl FlakyBackend {
    pub fn new(inner: Arc<SqliteBackend>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_profiles: AtomicBool::new(false),
            hide_messages: AtomicBool::new(false),
            hold_profiles: AtomicBool::new(false),
            held: Notify::new(),
            release: Notify::new(),
        })
    }

    /// Make every bulk profile read fail.
    pub fn fail_profiles(&self, fail: bool) {
        self.fail_profiles.store(fail, Ordering::SeqCst);
    }

    /// Make single message reads find nothing, as if the row were gone.
    pub fn hide_messages(&self, hide: bool) {
        self.hide_messages.store(hide, Ordering::SeqCst);
    }

    /// Park the next bulk profile read until [`FlakyBackend::release_profiles`].
    pub fn hold_profiles(&self) {
        self.hold_profiles.store(true, Ordering::SeqCst);
    }

    /// Resolves once a bulk profile read is parked.
    pub async fn profiles_held(&self) {
        self.held.notified().await;
    }

    pub fn release_profiles(&self) {
        self.release.notify_one();
    }
}

#[async_trait]
impl Backend for FlakyBackend {
    async fn sign_in(&self, email: &str, password: &str) -> BackendResult<Identity> {
        self.inner.sign_in(email, password).await
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> BackendResult<Identity> {
        self.inner.sign_up(email, password, name).await
    }

    async fn select_profile(&self, id: Uuid) -> BackendResult<Option<Profile>> {
        self.inner.select_profile(id).await
    }

    async fn select_profiles(&self) -> BackendResult<Vec<Profile>> {
        if self.fail_profiles.load(Ordering::SeqCst) {
            return Err(BackendError::Io(io::Error::other("profiles unavailable")));
        }
        // read before parking, so the response is already stale when it returns
        let profiles = self.inner.select_profiles().await;
        if self.hold_profiles.swap(false, Ordering::SeqCst) {
            self.held.notify_one();
            self.release.notified().await;
        }
        profiles
    }

    async fn update_profile(&self, id: Uuid, update: &ProfileUpdate) -> BackendResult<Profile> {
        self.inner.update_profile(id, update).await
    }

    async fn select_messages(&self) -> BackendResult<Vec<Message>> {
        self.inner.select_messages().await
    }

    async fn select_message(&self, id: i64) -> BackendResult<Option<Message>> {
        if self.hide_messages.load(Ordering::SeqCst) {
            return Ok(None);
        }
        self.inner.select_message(id).await
    }

    async fn insert_message(&self, user_id: Uuid, content: &str) -> BackendResult<Message> {
        self.inner.insert_message(user_id, content).await
    }

    fn subscribe(&self, table: Table, kind: ChangeKind) -> ChangeStream {
        self.inner.subscribe(table, kind)
    }
}
