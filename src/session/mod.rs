//! The session store: who is signed in, and the durable copy of it.

mod storage;

use std::{collections::HashSet, sync::Arc};

use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    backend::Backend,
    error::{BackendError, Error, Result},
    models::{Identity, Profile, ProfileUpdate, Session},
};

pub use storage::{FileStorage, MemoryStorage, SessionStorage};

/// Key the session snapshot is stored under.
pub const SESSION_KEY: &str = "classmates.session";

pub const MIN_PASSWORD_LEN: usize = 6;

/// Optional signup allow-list. Emails are compared case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct SignupGate {
    allowed: Option<HashSet<String>>,
}

impl SignupGate {
    /// Anyone may sign up.
    pub fn open() -> Self {
        Self::default()
    }

    pub fn allow_list<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: Some(
                emails
                    .into_iter()
                    .map(|email| email.as_ref().trim().to_lowercase())
                    .filter(|email| !email.is_empty())
                    .collect(),
            ),
        }
    }

    pub fn is_enforced(&self) -> bool {
        self.allowed.is_some()
    }

    pub fn permits(&self, email: &str) -> bool {
        match &self.allowed {
            Some(allowed) => allowed.contains(&email.trim().to_lowercase()),
            None => true,
        }
    }
}

/// Handle on the signed in user. Created at startup with [`SessionStore::restore`]
/// and passed explicitly to whatever needs to know who is acting.
pub struct SessionStore {
    backend: Arc<dyn Backend>,
    storage: Arc<dyn SessionStorage>,
    gate: SignupGate,
    current: Option<Session>,
}

impl SessionStore {
    /// A signed out store that ignores anything already in `storage`.
    pub fn new(
        backend: Arc<dyn Backend>,
        storage: Arc<dyn SessionStorage>,
        gate: SignupGate,
    ) -> Self {
        Self {
            backend,
            storage,
            gate,
            current: None,
        }
    }

    /// Rehydrate the session persisted by an earlier run, if any.
    pub async fn restore(
        backend: Arc<dyn Backend>,
        storage: Arc<dyn SessionStorage>,
        gate: SignupGate,
    ) -> Self {
        let mut store = Self::new(backend, storage, gate);

        match store.storage.load(SESSION_KEY).await {
            Ok(Some(snapshot)) => match serde_json::from_str::<Session>(&snapshot) {
                Ok(session) => store.current = Some(session),
                Err(e) => {
                    warn!("discarding unreadable session snapshot: {e}");
                    if let Err(e) = store.storage.remove(SESSION_KEY).await {
                        warn!("failed to clear session snapshot: {e}");
                    }
                }
            },
            Ok(None) => {}
            Err(e) => warn!("failed to read session snapshot: {e}"),
        }

        store
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn user_id(&self) -> Option<Uuid> {
        self.current.as_ref().map(Session::user_id)
    }

    pub fn is_signed_in(&self) -> bool {
        self.current.is_some()
    }

    /// The current session, or `Authorization` when signed out.
    pub fn require(&self) -> Result<&Session> {
        self.current
            .as_ref()
            .ok_or_else(|| Error::Authorization("sign in first".to_owned()))
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub async fn login(&mut self, email: &str, password: &str) -> Result<&Session> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(Error::Validation("email and password are required".to_owned()));
        }

        let identity = self
            .backend
            .sign_in(email, password)
            .await
            .map_err(|e| match e {
                BackendError::InvalidCredentials => Error::Authentication,
                e => Error::Backend(e),
            })?;

        info!(user_id = %identity.id, "signed in");
        self.establish(identity).await
    }

    pub async fn signup(
        &mut self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<&Session> {
        if !self.gate.permits(email) {
            return Err(Error::Authorization(format!(
                "{} is not allowed to sign up",
                email.trim()
            )));
        }
        validate_signup(email, password)?;

        let identity = self
            .backend
            .sign_up(email, password, name.map(str::trim).filter(|name| !name.is_empty()))
            .await
            .map_err(|e| match e {
                BackendError::Conflict(reason) => Error::Validation(reason),
                e => Error::Persistence(e),
            })?;

        self.establish(identity).await
    }

    /// Forget the session here and in durable storage. Never fails.
    pub async fn logout(&mut self) {
        if let Some(session) = self.current.take() {
            info!(user_id = %session.user_id(), "signed out");
        }
        if let Err(e) = self.storage.remove(SESSION_KEY).await {
            warn!("failed to clear session snapshot: {e}");
        }
    }

    /// Write `update` to the signed in user's profile, then merge it into
    /// the session. A failed write leaves the session as it was.
    pub async fn update_profile(&mut self, update: &ProfileUpdate) -> Result<&Profile> {
        let session = self.require()?;
        let user_id = session.user_id();
        let mut merged = session.profile.clone();

        let stored = self
            .backend
            .update_profile(user_id, update)
            .await
            .map_err(Error::Persistence)?;

        merged.apply(update);
        merged.is_admin = stored.is_admin;

        if let Some(session) = self.current.as_mut() {
            session.profile = merged;
        }
        self.persist().await;

        Ok(&self.require()?.profile)
    }

    async fn establish(&mut self, identity: Identity) -> Result<&Session> {
        let profile = self
            .backend
            .select_profile(identity.id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("profile for {}", identity.email)))?;

        self.current = Some(Session {
            identity,
            profile,
            signed_in_at: OffsetDateTime::now_utc(),
        });
        self.persist().await;

        self.require()
    }

    async fn persist(&self) {
        let Some(session) = &self.current else {
            return;
        };

        let snapshot = match serde_json::to_string(session) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("failed to serialize session: {e}");
                return;
            }
        };
        if let Err(e) = self.storage.store(SESSION_KEY, &snapshot).await {
            warn!("failed to persist session: {e}");
        }
    }
}

fn validate_signup(email: &str, password: &str) -> Result<()> {
    let email = email.trim();
    let valid_email = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));

    if !valid_email {
        return Err(Error::Validation(format!("{email} is not a valid email address")));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(Error::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}
