//! crates/study_companion_core/src/session_manager.rs
//!
//! Owns the current conversation and mediates every change to the persisted
//! session collection.
//!
//! One `SessionManager` is built per application instance and handed to the UI
//! by reference. It guarantees that a current session always exists: opening an
//! empty store, deleting the current session and clearing all data each leave a
//! usable session behind.

use futures::stream::Fuse;
use futures::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::content::stringify_study_item;
use crate::domain::{Message, Mode, Role, Session, StudyItem, DEFAULT_SESSION_TITLE};
use crate::ports::{ChatCompletionService, ChatRequest, PortError, PortResult, TextStream};
use crate::prompts;
use crate::store::CompanionStore;

/// Longest user message accepted by `send_message`, in characters.
pub const MAX_MESSAGE_CHARS: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Cannot change mode once conversation has started. Create a new chat to use a different mode.")]
    ModeLocked,
    #[error("A reply is still being received.")]
    RequestInFlight,
    #[error("Message is empty.")]
    EmptyMessage,
    #[error("Please keep messages under {max} characters.")]
    MessageTooLong { max: usize },
    #[error(transparent)]
    Port(#[from] PortError),
}

//=========================================================================================
// Send Lock
//=========================================================================================

/// Holds the manager's "sending" flag. Dropping it releases the flag, so a
/// reply that is abandoned midway never leaves the manager stuck.
struct SendLock(Arc<AtomicBool>);

impl SendLock {
    fn acquire(flag: &Arc<AtomicBool>) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag.clone()))
    }
}

impl Drop for SendLock {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

//=========================================================================================
// Reply Stream
//=========================================================================================

/// The assistant's reply as it arrives, one fragment at a time.
///
/// Pull fragments with [`ReplyStream::next_fragment`], then hand the result of
/// [`ReplyStream::finish`] back to [`SessionManager::complete_reply`].
pub struct ReplyStream {
    inner: Fuse<TextStream>,
    text: String,
    error: Option<PortError>,
    _lock: SendLock,
}

impl ReplyStream {
    fn new(inner: TextStream, lock: SendLock) -> Self {
        Self {
            inner: inner.fuse(),
            text: String::new(),
            error: None,
            _lock: lock,
        }
    }

    /// The next fragment, or `None` once the reply is over or has failed.
    pub async fn next_fragment(&mut self) -> Option<PortResult<String>> {
        if self.error.is_some() {
            return None;
        }
        match self.inner.next().await? {
            Ok(fragment) => {
                self.text.push_str(&fragment);
                Some(Ok(fragment))
            }
            Err(e) => {
                self.error = Some(e.clone());
                Some(Err(e))
            }
        }
    }

    /// Everything received so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Drains what is left and returns the whole reply.
    pub async fn finish(mut self) -> PortResult<String> {
        while self.next_fragment().await.is_some() {}
        match self.error {
            Some(e) => Err(e),
            None if self.text.is_empty() => Err(PortError::EmptyResponse),
            None => Ok(self.text),
        }
    }
}

//=========================================================================================
// Session Manager
//=========================================================================================

pub struct SessionManager {
    store: CompanionStore,
    llm: Arc<dyn ChatCompletionService>,
    current: Session,
    in_flight: Arc<AtomicBool>,
}

impl SessionManager {
    /// Restores the last current session, or creates a fresh one if it is gone.
    pub async fn open(store: CompanionStore, llm: Arc<dyn ChatCompletionService>) -> PortResult<Self> {
        let restored = match store.current_session_id().await {
            Some(id) => store.session(&id).await,
            None => None,
        };
        let current = match restored {
            Some(session) => session,
            None => {
                let default_mode = store.settings().await.default_mode;
                let session = Session::new(DEFAULT_SESSION_TITLE, default_mode);
                store.save_session(&session).await?;
                store.set_current_session_id(&session.id).await?;
                info!("Created default session {}", session.id);
                session
            }
        };
        Ok(Self {
            store,
            llm,
            current,
            in_flight: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn store(&self) -> &CompanionStore {
        &self.store
    }

    pub fn current(&self) -> &Session {
        &self.current
    }

    /// The full conversation, system messages included.
    pub fn history(&self) -> &[Message] {
        &self.current.messages
    }

    /// The conversation as it is shown on screen.
    pub fn visible_messages(&self) -> impl Iterator<Item = &Message> {
        self.current.messages.iter().filter(|m| m.is_visible())
    }

    pub fn is_sending(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    // --- Session lifecycle ---

    /// Persists a new empty session without switching to it.
    pub async fn create_session(&self, title: &str, mode: Mode) -> PortResult<String> {
        let session = Session::new(title, mode);
        self.store.save_session(&session).await?;
        debug!("Created session {} ({})", session.id, mode);
        Ok(session.id)
    }

    /// Starts a new "New Chat" in the current mode and makes it current.
    pub async fn new_chat(&mut self) -> PortResult<String> {
        let id = self.create_session(DEFAULT_SESSION_TITLE, self.current.mode).await?;
        self.switch_to(&id).await?;
        Ok(id)
    }

    /// Makes `id` the current session. Returns `false` without touching anything
    /// when `id` is already current or does not exist.
    pub async fn switch_to(&mut self, id: &str) -> PortResult<bool> {
        if id == self.current.id {
            return Ok(false);
        }
        let Some(session) = self.store.session(id).await else {
            debug!("Ignoring switch to unknown session {}", id);
            return Ok(false);
        };
        self.store.set_current_session_id(id).await?;
        self.current = session;
        Ok(true)
    }

    /// Renames a session. Blocks any later automatic title for it.
    pub async fn rename(&mut self, id: &str, title: &str) -> PortResult<bool> {
        let title = title.trim();
        if title.is_empty() {
            return Ok(false);
        }
        let Some(mut session) = self.store.session(id).await else {
            return Ok(false);
        };
        session.title = title.to_string();
        session.user_renamed = true;
        session.touch();
        self.store.save_session(&session).await?;
        if id == self.current.id {
            self.current.title = session.title;
            self.current.user_renamed = true;
            self.current.updated_at = session.updated_at;
        }
        Ok(true)
    }

    /// Deletes a session. If it was current, the most recently updated other
    /// session takes its place, or a fresh default session when none is left.
    pub async fn delete(&mut self, id: &str) -> PortResult<()> {
        if id == self.current.id {
            let fallback = self
                .store
                .recent_sessions()
                .await
                .into_iter()
                .find(|s| s.id != id)
                .map(|s| s.id);
            let next = match fallback {
                Some(next) => next,
                None => {
                    let mode = self.store.settings().await.default_mode;
                    self.create_session(DEFAULT_SESSION_TITLE, mode).await?
                }
            };
            self.switch_to(&next).await?;
        }
        self.store.delete_session(id).await?;
        info!("Deleted session {}", id);
        Ok(())
    }

    /// Changes the subject mode of the current session while it is still empty.
    pub async fn change_mode(&mut self, mode: Mode) -> Result<(), SessionError> {
        if self.current.is_mode_locked() {
            return Err(SessionError::ModeLocked);
        }
        self.current.mode = mode;
        self.current.touch();
        self.store.save_session(&self.current).await?;
        Ok(())
    }

    /// Appends to the current conversation and writes the session back.
    pub async fn append_and_persist(&mut self, message: Message) -> PortResult<()> {
        self.current.messages.push(message);
        self.current.touch();
        self.store.save_session(&self.current).await
    }

    /// Removes every persisted collection and starts over with a default session.
    pub async fn clear_all(&mut self) -> PortResult<()> {
        self.store.clear_all().await?;
        let session = Session::new(DEFAULT_SESSION_TITLE, Mode::default());
        self.store.save_session(&session).await?;
        self.store.set_current_session_id(&session.id).await?;
        self.current = session;
        warn!("All stored data cleared");
        Ok(())
    }

    // --- Chat ---

    /// Records the user's message and starts streaming the assistant's reply.
    ///
    /// Overlapping sends are rejected, not queued. The caller passes the
    /// reply's outcome to [`Self::complete_reply`]. The send lock is released
    /// once the returned stream is finished or dropped.
    pub async fn send_message(&mut self, text: &str) -> Result<ReplyStream, SessionError> {
        let lock = SendLock::acquire(&self.in_flight).ok_or(SessionError::RequestInFlight)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        if text.chars().count() > MAX_MESSAGE_CHARS {
            return Err(SessionError::MessageTooLong {
                max: MAX_MESSAGE_CHARS,
            });
        }

        self.append_and_persist(Message::user(text)).await?;
        let stream = self.llm.stream(self.chat_request()).await?;
        Ok(ReplyStream::new(stream, lock))
    }

    /// Finishes a send. A successful reply is appended, persisted and may
    /// trigger automatic titling; a failed one leaves the history as it was.
    pub async fn complete_reply(&mut self, outcome: PortResult<String>) -> Result<String, SessionError> {
        self.in_flight.store(false, Ordering::SeqCst);
        let reply = match outcome {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Chat request failed: {}", e);
                return Err(e.into());
            }
        };
        self.append_and_persist(Message::assistant(reply.clone())).await?;
        self.auto_title().await;
        Ok(reply)
    }

    /// `[mode system prompt] + history`, the payload of every chat request.
    fn chat_request(&self) -> ChatRequest {
        let mut messages = Vec::with_capacity(self.current.messages.len() + 1);
        messages.push(Message::system(prompts::system_prompt(self.current.mode)));
        messages.extend(self.current.messages.iter().cloned());
        ChatRequest::new(messages)
    }

    /// Gives the current session a generated title, at most once.
    ///
    /// Only runs for a non-empty session that still has a placeholder title and
    /// was neither auto-titled nor renamed by the user. A failed attempt leaves
    /// the flag unset so the next completed reply can try again. Returns whether
    /// a title was set.
    pub async fn auto_title(&mut self) -> bool {
        let session = &self.current;
        if session.messages.is_empty()
            || session.auto_title_generated
            || session.user_renamed
            || !session.has_placeholder_title()
        {
            return false;
        }
        let Some(first_user) = session.messages.iter().find(|m| m.role == Role::User) else {
            return false;
        };
        let latest_reply = session
            .messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str());

        let request = ChatRequest::new(vec![
            Message::system(prompts::TITLE_SYSTEM_PROMPT),
            Message::user(prompts::title_prompt(&first_user.content, latest_reply)),
        ])
        .with_max_tokens(prompts::TITLE_MAX_TOKENS);
        let title = match self.llm.complete(request).await {
            Ok(reply) => prompts::clean_title(&reply),
            Err(e) => {
                warn!("Failed to auto-generate chat title: {}", e);
                return false;
            }
        };
        let Some(title) = title else {
            return false;
        };

        self.current.title = title;
        self.current.auto_title_generated = true;
        self.current.touch();
        if let Err(e) = self.store.save_session(&self.current).await {
            warn!("Failed to persist generated title: {}", e);
        }
        info!("Session {} titled '{}'", self.current.id, self.current.title);
        true
    }

    // --- Study items ---

    /// Opens the conversation about `item`, creating and seeding it on first use.
    pub async fn open_study_discussion(&mut self, item: &StudyItem) -> PortResult<String> {
        let existing = self
            .store
            .sessions()
            .await
            .into_values()
            .find(|s| s.study_id.as_deref() == Some(item.id.as_str()));
        if let Some(session) = existing {
            self.switch_to(&session.id).await?;
            return Ok(session.id);
        }

        let title = if item.title.is_empty() { "Study Item" } else { item.title.as_str() };
        let mode = item
            .subject
            .as_deref()
            .map(Mode::parse_or_general)
            .unwrap_or_default();
        let mut session = Session::new(format!("{} Discussion", title), mode);
        session.study_id = Some(item.id.clone());
        session.messages.push(Message::system(stringify_study_item(item)));
        session.messages.push(Message::assistant(prompts::study_greeting(item)));
        self.store.save_session(&session).await?;
        self.switch_to(&session.id).await?;
        Ok(session.id)
    }
}
