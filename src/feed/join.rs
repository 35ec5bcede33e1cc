//! Client-side join of messages onto their authors' profiles.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::models::{Message, Profile};

pub const UNKNOWN_AUTHOR: &str = "Unknown User";

/// The slice of a profile a message is rendered with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Author {
    pub id: Uuid,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
}

impl From<&Profile> for Author {
    fn from(profile: &Profile) -> Self {
        Author {
            id: profile.id,
            name: profile.display_name().map(str::to_owned),
            avatar_url: profile.avatar_url.clone(),
        }
    }
}

/// A message with its author snapshot. `author` is `None` when no profile
/// matched; such messages are kept, never dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedMessage {
    #[serde(flatten)]
    pub message: Message,
    pub author: Option<Author>,
}

impl FeedMessage {
    pub fn display_name(&self) -> &str {
        self.author
            .as_ref()
            .and_then(|author| author.name.as_deref())
            .unwrap_or(UNKNOWN_AUTHOR)
    }
}

/// Author id to author snapshot.
#[derive(Debug, Default)]
pub struct AuthorIndex {
    authors: HashMap<Uuid, Author>,
}

impl AuthorIndex {
    pub fn new(profiles: &[Profile]) -> Self {
        Self {
            authors: profiles
                .iter()
                .map(|profile| (profile.id, Author::from(profile)))
                .collect(),
        }
    }

    pub fn lookup(&self, id: Uuid) -> Option<&Author> {
        self.authors.get(&id)
    }

    pub fn join(&self, message: Message) -> FeedMessage {
        FeedMessage {
            author: self.lookup(message.user_id).cloned(),
            message,
        }
    }

    /// Join every message, keeping order.
    pub fn join_all(&self, messages: Vec<Message>) -> Vec<FeedMessage> {
        messages
            .into_iter()
            .map(|message| self.join(message))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.authors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.authors.is_empty()
    }
}
