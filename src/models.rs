//! Records shared by the session, profile, directory and feed layers.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Display attributes of a member. One row per identity; the row is
/// created by the backend when the identity registers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Same value as the owning identity's id.
    pub id: Uuid,
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub about: Option<String>,
    pub class: Option<String>,
    pub section: Option<String>,
    pub batch: Option<String>,
    pub hobby: Option<String>,
    pub website: Option<String>,
    pub social_handle: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Profile {
    /// The trimmed display name, `None` when unset or blank.
    pub fn display_name(&self) -> Option<&str> {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }

    /// Merge every field present in `update` into this record.
    pub fn apply(&mut self, update: &ProfileUpdate) {
        for (slot, value) in self.editable_mut().into_iter().zip(update.values()) {
            if let Some(value) = value {
                *slot = Some(value.clone());
            }
        }
    }

    fn editable(&self) -> [&Option<String>; 10] {
        [
            &self.name,
            &self.avatar_url,
            &self.bio,
            &self.about,
            &self.class,
            &self.section,
            &self.batch,
            &self.hobby,
            &self.website,
            &self.social_handle,
        ]
    }

    fn editable_mut(&mut self) -> [&mut Option<String>; 10] {
        [
            &mut self.name,
            &mut self.avatar_url,
            &mut self.bio,
            &mut self.about,
            &mut self.class,
            &mut self.section,
            &mut self.batch,
            &mut self.hobby,
            &mut self.website,
            &mut self.social_handle,
        ]
    }
}

/// A partial profile write. `None` leaves the stored value alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub about: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hobby: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_handle: Option<String>,
}

impl ProfileUpdate {
    /// Column names, in the same order as [`ProfileUpdate::values`].
    pub const COLUMNS: [&'static str; 10] = [
        "name",
        "avatar_url",
        "bio",
        "about",
        "class",
        "section",
        "batch",
        "hobby",
        "website",
        "social_handle",
    ];

    pub fn name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// `(column, value)` pairs for every field that is set.
    pub fn columns(&self) -> impl Iterator<Item = (&'static str, &str)> {
        Self::COLUMNS
            .into_iter()
            .zip(self.values())
            .filter_map(|(column, value)| Some((column, value.as_deref()?)))
    }

    pub fn is_empty(&self) -> bool {
        self.columns().next().is_none()
    }

    /// Drop the fields whose value already matches `current`.
    pub fn changes_from(&self, current: &Profile) -> ProfileUpdate {
        let mut changes = self.clone();
        for (slot, stored) in changes.values_mut().into_iter().zip(current.editable()) {
            if slot.is_some() && *slot == *stored {
                *slot = None;
            }
        }
        changes
    }

    fn values(&self) -> [&Option<String>; 10] {
        [
            &self.name,
            &self.avatar_url,
            &self.bio,
            &self.about,
            &self.class,
            &self.section,
            &self.batch,
            &self.hobby,
            &self.website,
            &self.social_handle,
        ]
    }

    fn values_mut(&mut self) -> [&mut Option<String>; 10] {
        [
            &mut self.name,
            &mut self.avatar_url,
            &mut self.bio,
            &mut self.about,
            &mut self.class,
            &mut self.section,
            &mut self.batch,
            &mut self.hobby,
            &mut self.website,
            &mut self.social_handle,
        ]
    }
}

/// A chat message. Immutable once inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    /// Author, references [`Profile::id`].
    pub user_id: Uuid,
    pub content: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// An authenticated identity as reported by the auth provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
}

/// The signed in user, mirrored to durable storage so a reload restores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub identity: Identity,
    pub profile: Profile,
    #[serde(with = "time::serde::rfc3339")]
    pub signed_in_at: OffsetDateTime,
}

impl Session {
    pub fn user_id(&self) -> Uuid {
        self.identity.id
    }
}

#[cfg(test)]
pub(crate) fn test_profile(name: Option<&str>, email: &str) -> Profile {
    Profile {
        id: Uuid::new_v4(),
        name: name.map(str::to_owned),
        email: Some(email.to_owned()),
        avatar_url: None,
        bio: None,
        about: None,
        class: None,
        section: None,
        batch: None,
        hobby: None,
        website: None,
        social_handle: None,
        is_admin: false,
        created_at: OffsetDateTime::UNIX_EPOCH,
    }
}
