use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    GetField,
    backend::{Backend, ChangeKind, ChangeStream, Table},
    error::{Error, Result},
    generation::{Generation, GenerationToken},
    session::SessionStore,
};

use super::{Author, AuthorIndex, FeedMessage};

pub const MAX_MESSAGE_CHARS: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Uninitialized,
    /// History loaded, being joined onto authors.
    Joining,
    /// Subscribed; inserts are appended as they arrive.
    Live,
    /// Torn down, or the push channel ended. Mount again to reload.
    Closed,
}

struct LiveSubscription {
    stream: ChangeStream,
    token: GenerationToken,
}

/// Ordered chat log kept current by the push channel.
///
/// The push channel has no replay: inserts committed while it is down are
/// not seen until the feed is mounted again.
pub struct MessageFeed {
    backend: Arc<dyn Backend>,
    sender: MessageSender,
    state: FeedState,
    messages: Vec<FeedMessage>,
    live: Option<LiveSubscription>,
    // id whose re-fetch was interrupted, retried first on the next call
    pending: Option<i64>,
    generation: Generation,
}

impl MessageFeed {
    /// Feed whose sends are authored by `author_id`.
    pub fn new(backend: Arc<dyn Backend>, author_id: Uuid) -> Self {
        Self {
            sender: MessageSender {
                backend: backend.clone(),
                author_id,
            },
            backend,
            state: FeedState::Uninitialized,
            messages: Vec::new(),
            live: None,
            pending: None,
            generation: Generation::new(),
        }
    }

    pub fn for_session(session: &SessionStore) -> Result<Self> {
        let user_id = session.require()?.user_id();
        Ok(Self::new(session.backend().clone(), user_id))
    }

    pub fn state(&self) -> FeedState {
        self.state
    }

    pub fn messages(&self) -> &[FeedMessage] {
        &self.messages
    }

    pub fn sender(&self) -> MessageSender {
        self.sender.clone()
    }

    pub fn teardown_handle(&self) -> TeardownHandle {
        TeardownHandle {
            generation: self.generation.clone(),
        }
    }

    /// Load history, join it onto author profiles, then go live.
    ///
    /// The subscription opens only after the history snapshot is taken, so
    /// nothing is delivered twice.
    pub async fn mount(&mut self) -> Result<()> {
        if matches!(self.state, FeedState::Joining | FeedState::Live) {
            return Err(Error::Validation("feed is already mounted".to_owned()));
        }

        let previous = self.state;
        self.live = None;
        self.pending = None;
        let token = self.generation.token();

        let history = match self.backend.select_messages().await {
            Ok(history) => history,
            Err(e) => {
                self.state = previous;
                return Err(e.into());
            }
        };

        self.state = FeedState::Joining;
        let index = match self.backend.select_profiles().await {
            Ok(profiles) => AuthorIndex::new(&profiles),
            Err(e) => {
                warn!("author lookup failed, showing messages as unknown: {e}");
                AuthorIndex::default()
            }
        };

        if !token.is_current() {
            debug!("feed torn down while mounting");
            self.state = FeedState::Closed;
            return Ok(());
        }

        self.messages = index.join_all(history);
        self.live = Some(LiveSubscription {
            stream: self.backend.subscribe(Table::Messages, ChangeKind::Insert),
            token,
        });
        self.state = FeedState::Live;

        if index.is_empty() && !self.messages.is_empty() {
            debug!("no authors to join, every message shows as unknown");
        }
        info!(count = self.messages.len(), authors = index.len(), "feed live");
        Ok(())
    }

    /// Wait for the next inserted message, append it and return it.
    ///
    /// Returns `None` once the feed is torn down or the push channel ends.
    /// Cancel safe: an insert whose re-fetch was interrupted is retried on
    /// the next call.
    pub async fn next_live(&mut self) -> Option<FeedMessage> {
        loop {
            if !self.is_current() {
                self.close();
                return None;
            }

            let id = match self.pending {
                Some(id) => id,
                None => {
                    let event = {
                        let LiveSubscription { stream, token } = self.live.as_mut()?;
                        tokio::select! {
                            biased;
                            _ = token.superseded() => None,
                            event = stream.next() => Some(event),
                        }
                    };

                    let event = match event {
                        None => continue,
                        Some(None) => {
                            warn!("push channel closed, feed will not update until remounted");
                            self.close();
                            return None;
                        }
                        Some(Some(event)) => event,
                    };

                    match event.record.get_i64_field("id") {
                        Ok(id) => {
                            self.pending = Some(id);
                            id
                        }
                        Err(e) => {
                            warn!("ignoring insert notification: {e}");
                            continue;
                        }
                    }
                }
            };

            let joined = self.resolve(id).await;
            self.pending = None;

            let Some(LiveSubscription { token, .. }) = &self.live else {
                self.close();
                return None;
            };
            let messages = &mut self.messages;
            let appended = token.run_if_current(|| {
                if let Some(message) = &joined {
                    messages.push(message.clone());
                }
            });

            if appended.is_none() {
                self.close();
                return None;
            }
            if joined.is_some() {
                return joined;
            }
        }
    }

    /// Insert a message. The feed shows it when the push channel echoes it.
    pub async fn send(&self, text: &str) -> Result<()> {
        self.sender.send(text).await
    }

    /// Close the subscription. Nothing is appended after this returns.
    pub fn teardown(&mut self) {
        self.generation.advance();
        self.close();
    }

    fn is_current(&self) -> bool {
        self.live
            .as_ref()
            .is_some_and(|live| live.token.is_current())
    }

    fn close(&mut self) {
        if self.live.take().is_some() {
            debug!("feed subscription closed");
        }
        self.pending = None;
        self.state = FeedState::Closed;
    }

    /// Re-fetch the inserted row and its author rather than trusting the
    /// notification payload.
    async fn resolve(&self, id: i64) -> Option<FeedMessage> {
        let message = match self.backend.select_message(id).await {
            Ok(Some(message)) => message,
            Ok(None) => {
                warn!(message_id = id, "notified message not found");
                return None;
            }
            Err(e) => {
                warn!(message_id = id, "failed to fetch notified message: {e}");
                return None;
            }
        };

        let author = match self.backend.select_profile(message.user_id).await {
            Ok(profile) => profile.as_ref().map(Author::from),
            Err(e) => {
                warn!(user_id = %message.user_id, "author lookup failed: {e}");
                None
            }
        };

        Some(FeedMessage { message, author })
    }
}

/// Cancels a feed from outside the task that drives it.
#[derive(Debug, Clone)]
pub struct TeardownHandle {
    generation: Generation,
}

impl TeardownHandle {
    pub fn cancel(&self) {
        self.generation.advance();
    }
}

/// Posts messages as one author. Never touches any feed's state.
#[derive(Clone)]
pub struct MessageSender {
    backend: Arc<dyn Backend>,
    author_id: Uuid,
}

impl MessageSender {
    pub fn author_id(&self) -> Uuid {
        self.author_id
    }

    pub async fn send(&self, text: &str) -> Result<()> {
        let content = text.trim();
        if content.is_empty() {
            return Err(Error::Validation("message is empty".to_owned()));
        }
        if content.chars().count() > MAX_MESSAGE_CHARS {
            return Err(Error::Validation(format!(
                "message is longer than {MAX_MESSAGE_CHARS} characters"
            )));
        }

        let message = self
            .backend
            .insert_message(self.author_id, content)
            .await
            .map_err(Error::Send)?;

        debug!(message_id = message.id, "message sent");
        Ok(())
    }
}
