//! crates/study_companion_core/src/store.rs
//!
//! Typed collections on top of the `KeyValueStore` port.
//!
//! Each collection lives under a fixed key as one JSON blob. Every mutation reads
//! the whole collection, applies the change and writes the whole collection back,
//! so writes cost O(total stored size). There is no locking: two processes sharing
//! a store can overwrite each other's last write.
//!
//! Reads never fail. A missing key, a store error or a blob that does not parse
//! all read as the empty default collection.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

use crate::domain::{Session, Settings, StudyItem};
use crate::ports::{KeyValueStore, PortError, PortResult};

/// The fixed keys of the persisted collections.
pub mod keys {
    pub const SESSIONS: &str = "sessions";
    pub const CURRENT_SESSION: &str = "current_session";
    pub const SETTINGS: &str = "settings";
    pub const STUDY_ITEMS: &str = "study_items";

    pub const ALL: &[&str] = &[SESSIONS, CURRENT_SESSION, SETTINGS, STUDY_ITEMS];
}

pub type SessionMap = BTreeMap<String, Session>;
pub type StudyItemMap = BTreeMap<String, StudyItem>;

#[derive(Clone)]
pub struct CompanionStore {
    kv: Arc<dyn KeyValueStore>,
}

impl CompanionStore {
    pub fn new(kv: Arc<dyn KeyValueStore>) -> Self {
        Self { kv }
    }

    async fn read<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        let raw = match self.kv.get(key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return T::default(),
            Err(e) => {
                warn!("Failed to read '{}' from store, using empty default: {}", key, e);
                return T::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Stored '{}' is corrupt, using empty default: {}", key, e);
            T::default()
        })
    }

    async fn write<T: Serialize>(&self, key: &str, value: &T) -> PortResult<()> {
        let raw = serde_json::to_string(value).map_err(|e| PortError::Unexpected(e.to_string()))?;
        self.kv.set(key, &raw).await
    }

    // --- Sessions ---

    pub async fn sessions(&self) -> SessionMap {
        self.read(keys::SESSIONS).await
    }

    pub async fn session(&self, id: &str) -> Option<Session> {
        self.sessions().await.remove(id)
    }

    pub async fn save_session(&self, session: &Session) -> PortResult<()> {
        let mut sessions = self.sessions().await;
        sessions.insert(session.id.clone(), session.clone());
        self.write(keys::SESSIONS, &sessions).await
    }

    pub async fn delete_session(&self, id: &str) -> PortResult<()> {
        let mut sessions = self.sessions().await;
        if sessions.remove(id).is_some() {
            self.write(keys::SESSIONS, &sessions).await?;
        }
        Ok(())
    }

    /// All sessions, most recently updated first.
    pub async fn recent_sessions(&self) -> Vec<Session> {
        let mut sessions: Vec<Session> = self.sessions().await.into_values().collect();
        sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        sessions
    }

    pub async fn current_session_id(&self) -> Option<String> {
        self.read::<Option<String>>(keys::CURRENT_SESSION).await
    }

    pub async fn set_current_session_id(&self, id: &str) -> PortResult<()> {
        self.write(keys::CURRENT_SESSION, &id).await
    }

    /// The sessions map as pretty-printed JSON, for the user to keep.
    pub async fn export_sessions(&self) -> PortResult<String> {
        serde_json::to_string_pretty(&self.sessions().await)
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }

    // --- Settings ---

    pub async fn settings(&self) -> Settings {
        self.read(keys::SETTINGS).await
    }

    pub async fn save_settings(&self, settings: &Settings) -> PortResult<()> {
        self.write(keys::SETTINGS, settings).await
    }

    // --- Study Items ---

    pub async fn study_items(&self) -> StudyItemMap {
        self.read(keys::STUDY_ITEMS).await
    }

    pub async fn study_item(&self, id: &str) -> Option<StudyItem> {
        self.study_items().await.remove(id)
    }

    pub async fn save_study_item(&self, item: &StudyItem) -> PortResult<()> {
        let mut items = self.study_items().await;
        items.insert(item.id.clone(), item.clone());
        self.write(keys::STUDY_ITEMS, &items).await
    }

    pub async fn delete_study_item(&self, id: &str) -> PortResult<()> {
        let mut items = self.study_items().await;
        if items.remove(id).is_some() {
            self.write(keys::STUDY_ITEMS, &items).await?;
        }
        Ok(())
    }

    /// All study items, most recently updated first.
    pub async fn recent_study_items(&self) -> Vec<StudyItem> {
        let mut items: Vec<StudyItem> = self.study_items().await.into_values().collect();
        items.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
        items
    }

    /// Removes every collection, settings included.
    pub async fn clear_all(&self) -> PortResult<()> {
        for key in keys::ALL {
            self.kv.delete(key).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Message, Mode, StudyContent};
    use crate::testing::MemoryStore;

    fn store_with(kv: Arc<MemoryStore>) -> CompanionStore {
        CompanionStore::new(kv)
    }

    #[tokio::test]
    async fn saved_session_loads_back_identically() {
        let store = store_with(Arc::new(MemoryStore::default()));
        let mut session = Session::new("Kinematics", Mode::Physics);
        session.messages.push(Message::user("What is velocity?"));
        session.messages.push(Message::assistant("Speed with a direction."));
        store.save_session(&session).await.unwrap();

        let loaded = store.session(&session.id).await.unwrap();
        assert_eq!(loaded.title, "Kinematics");
        assert_eq!(loaded.messages, session.messages);
        assert_eq!(loaded, session);
    }

    #[tokio::test]
    async fn corrupt_collections_read_as_empty() {
        let kv = Arc::new(MemoryStore::default());
        kv.insert(keys::SESSIONS, "{not json");
        kv.insert(keys::SETTINGS, "[1,2,3]");
        let store = store_with(kv);

        assert!(store.sessions().await.is_empty());
        assert_eq!(store.settings().await, Settings::default());
        assert_eq!(store.current_session_id().await, None);
    }

    #[tokio::test]
    async fn store_read_errors_read_as_empty() {
        let kv = Arc::new(MemoryStore::default());
        kv.fail_reads();
        let store = store_with(kv);
        assert!(store.study_items().await.is_empty());
    }

    #[tokio::test]
    async fn current_session_pointer_round_trips() {
        let store = store_with(Arc::new(MemoryStore::default()));
        store.set_current_session_id("session_abc").await.unwrap();
        assert_eq!(store.current_session_id().await.as_deref(), Some("session_abc"));
    }

    #[tokio::test]
    async fn recent_study_items_are_newest_first() {
        let store = store_with(Arc::new(MemoryStore::default()));
        let mut older = StudyItem::new("Old", StudyContent::StudyGuide { markdown: "a".into() });
        older.updated_at = older.updated_at - chrono::Duration::hours(1);
        let newer = StudyItem::new("New", StudyContent::StudyGuide { markdown: "b".into() });
        store.save_study_item(&older).await.unwrap();
        store.save_study_item(&newer).await.unwrap();

        let titles: Vec<String> = store.recent_study_items().await.into_iter().map(|i| i.title).collect();
        assert_eq!(titles, vec!["New", "Old"]);

        store.delete_study_item(&newer.id).await.unwrap();
        assert_eq!(store.study_items().await.len(), 1);
    }

    #[tokio::test]
    async fn clear_all_removes_every_key() {
        let kv = Arc::new(MemoryStore::default());
        let store = store_with(kv.clone());
        store.save_session(&Session::new("A", Mode::General)).await.unwrap();
        store.save_settings(&Settings::default()).await.unwrap();
        store.clear_all().await.unwrap();
        assert!(kv.is_empty());
    }
}
