use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    backend::{Backend, ObjectStorage},
    error::{Error, Result},
    models::{Profile, ProfileUpdate},
    session::SessionStore,
};

use super::avatar::{AVATAR_BUCKET, AvatarUpload, object_name};

/// Whose profile to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileTarget {
    /// Whoever is signed in.
    Myself,
    User(Uuid),
}

/// What the profile page shows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileView {
    pub profile: Profile,
    /// The viewer is looking at their own profile and may edit it.
    pub is_own: bool,
}

pub struct ProfileRepository {
    backend: Arc<dyn Backend>,
    storage: Arc<dyn ObjectStorage>,
}

impl ProfileRepository {
    pub fn new(backend: Arc<dyn Backend>, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { backend, storage }
    }

    pub async fn fetch_profile(
        &self,
        session: &SessionStore,
        target: ProfileTarget,
    ) -> Result<ProfileView> {
        let id = match target {
            ProfileTarget::User(id) => id,
            ProfileTarget::Myself => session.require()?.user_id(),
        };

        let profile = self
            .backend
            .select_profile(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("profile {id}")))?;

        Ok(ProfileView {
            is_own: session.user_id() == Some(profile.id),
            profile,
        })
    }

    /// Save the viewer's own profile and merge the result into `view`.
    ///
    /// Only fields that differ from `view` are written. A new avatar is
    /// validated before anything touches the network; the previous image is
    /// deleted (best effort) before the new one is uploaded.
    pub async fn save_profile(
        &self,
        session: &mut SessionStore,
        view: &mut ProfileView,
        update: ProfileUpdate,
        avatar: Option<AvatarUpload>,
    ) -> Result<()> {
        // Ownership here only decides what the UI offers; the backend has
        // to enforce it on its own.
        if !view.is_own || session.user_id() != Some(view.profile.id) {
            return Err(Error::Authorization("you can only edit your own profile".to_owned()));
        }

        let mut changes = update.changes_from(&view.profile);
        // avatar_url only ever points at an object this user uploaded
        if changes.avatar_url.is_some() {
            return Err(Error::Validation(
                "the profile image is changed by uploading a new one".to_owned(),
            ));
        }
        let extension = avatar.as_ref().map(AvatarUpload::validate).transpose()?;

        let mut uploaded = None;
        if let (Some(avatar), Some(extension)) = (&avatar, extension) {
            let (path, url) = self.replace_avatar(&view.profile, avatar, extension).await?;
            changes.avatar_url = Some(url);
            uploaded = Some(path);
        }

        if changes.is_empty() {
            debug!(user_id = %view.profile.id, "no profile changes to save");
            return Ok(());
        }

        if let Err(e) = session.update_profile(&changes).await {
            if let Some(path) = uploaded {
                if let Err(e) = self.storage.remove(AVATAR_BUCKET, &[path]).await {
                    warn!("failed to remove orphaned avatar: {e}");
                }
            }
            return Err(e);
        }

        view.profile.apply(&changes);
        Ok(())
    }

    async fn replace_avatar(
        &self,
        current: &Profile,
        avatar: &AvatarUpload,
        extension: &str,
    ) -> Result<(String, String)> {
        let owned_prefix = format!("{}-", current.id);
        let previous = current
            .avatar_url
            .as_deref()
            .and_then(|url| self.storage.object_path(AVATAR_BUCKET, url))
            .filter(|path| {
                let owned = path.starts_with(&owned_prefix) && !path.contains('/');
                if !owned {
                    warn!(user_id = %current.id, path, "previous avatar is not owned, keeping it");
                }
                owned
            });

        if let Some(previous) = previous {
            if let Err(e) = self.storage.remove(AVATAR_BUCKET, &[previous]).await {
                warn!(user_id = %current.id, "failed to remove previous avatar: {e}");
            }
        }

        let path = object_name(current.id, extension);
        let url = self
            .storage
            .upload(AVATAR_BUCKET, &path, &avatar.bytes, &avatar.content_type)
            .await
            .map_err(Error::Upload)?;

        Ok((path, url))
    }
}
