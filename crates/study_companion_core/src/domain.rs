//! crates/study_companion_core/src/domain.rs
//!
//! Defines the core data structures of the study companion: chat sessions and
//! their messages, generated study items, and the user's settings.
//!
//! Every record here is persisted as part of a JSON collection in the key-value
//! store, so field names serialize in camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::content::{self, ContentError};

/// Title given to freshly created chat sessions.
pub const DEFAULT_SESSION_TITLE: &str = "New Chat";

/// Titles that still count as "not yet named" for automatic titling.
pub const PLACEHOLDER_TITLES: &[&str] = &[DEFAULT_SESSION_TITLE, "Photosynthesis Study Guide"];

//=========================================================================================
// Messages
//=========================================================================================

/// The author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Synthetic context injected into the conversation. Never rendered.
    System,
    User,
    Assistant,
}

/// A single entry of a conversation, replayed verbatim to the remote model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn is_visible(&self) -> bool {
        self.role != Role::System
    }
}

//=========================================================================================
// Modes
//=========================================================================================

/// The subject area of a chat session. Controls the tutor system prompt.
///
/// Unknown strings in persisted data decode as `General`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Math,
    Physics,
    Chemistry,
    Biology,
    History,
    Literature,
    #[default]
    #[serde(other)]
    General,
}

impl Mode {
    pub fn all() -> [Mode; 7] {
        [
            Mode::General,
            Mode::Math,
            Mode::Physics,
            Mode::Chemistry,
            Mode::Biology,
            Mode::History,
            Mode::Literature,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::General => "general",
            Mode::Math => "math",
            Mode::Physics => "physics",
            Mode::Chemistry => "chemistry",
            Mode::Biology => "biology",
            Mode::History => "history",
            Mode::Literature => "literature",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let wanted = s.trim().to_lowercase();
        Mode::all().into_iter().find(|m| m.as_str() == wanted)
    }

    /// Parses a mode name, falling back to `General` for anything unrecognised.
    pub fn parse_or_general(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Mode::General => "General",
            Mode::Math => "Math",
            Mode::Physics => "Physics",
            Mode::Chemistry => "Chemistry",
            Mode::Biology => "Biology",
            Mode::History => "History",
            Mode::Literature => "Literature",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            Mode::General => "✨",
            Mode::Math => "🧮",
            Mode::Physics => "⚛️",
            Mode::Chemistry => "⚗️",
            Mode::Biology => "🧬",
            Mode::History => "📜",
            Mode::Literature => "📚",
        }
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

//=========================================================================================
// Sessions
//=========================================================================================

/// A persisted conversation thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub mode: Mode,
    #[serde(default)]
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub auto_title_generated: bool,
    #[serde(default)]
    pub user_renamed: bool,
    /// The study item this conversation discusses, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub study_id: Option<String>,
}

impl Session {
    /// Creates an empty session with a fresh, collision-resistant id.
    pub fn new(title: impl Into<String>, mode: Mode) -> Self {
        let now = Utc::now();
        Self {
            id: format!("session_{}", Uuid::new_v4().simple()),
            title: title.into(),
            mode,
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
            auto_title_generated: false,
            user_renamed: false,
            study_id: None,
        }
    }

    /// The mode may only change while the conversation is empty.
    pub fn is_mode_locked(&self) -> bool {
        !self.messages.is_empty()
    }

    pub fn has_placeholder_title(&self) -> bool {
        let trimmed = self.title.trim();
        trimmed.is_empty() || PLACEHOLDER_TITLES.contains(&trimmed)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

//=========================================================================================
// Study Items
//=========================================================================================

/// The three kinds of generated study material.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StudyKind {
    Flashcards,
    StudyGuide,
    PracticeTest,
}

impl StudyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StudyKind::Flashcards => "flashcards",
            StudyKind::StudyGuide => "studyGuide",
            StudyKind::PracticeTest => "practiceTest",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "flashcards" => Some(StudyKind::Flashcards),
            "studyGuide" => Some(StudyKind::StudyGuide),
            "practiceTest" => Some(StudyKind::PracticeTest),
            _ => None,
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            StudyKind::Flashcards => "Flashcards",
            StudyKind::StudyGuide => "Study Guide",
            StudyKind::PracticeTest => "Practice Test",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            StudyKind::Flashcards => "🃏",
            StudyKind::StudyGuide => "📖",
            StudyKind::PracticeTest => "🎯",
        }
    }
}

impl std::fmt::Display for StudyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeQuestion {
    pub text: String,
    pub answer: String,
}

/// The body of a study item. The variant always agrees with the item's kind.
///
/// Serializes to the bare shape (`{cards}`, `{markdown}` or `{questions}`);
/// decoding goes through [`content::decode`] because the shape alone does not
/// carry the kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum StudyContent {
    Flashcards { cards: Vec<Flashcard> },
    StudyGuide { markdown: String },
    PracticeTest { questions: Vec<PracticeQuestion> },
}

impl StudyContent {
    pub fn kind(&self) -> StudyKind {
        match self {
            StudyContent::Flashcards { .. } => StudyKind::Flashcards,
            StudyContent::StudyGuide { .. } => StudyKind::StudyGuide,
            StudyContent::PracticeTest { .. } => StudyKind::PracticeTest,
        }
    }

    pub fn to_value(&self) -> serde_json::Value {
        match self {
            StudyContent::Flashcards { cards } => serde_json::json!({
                "cards": cards
                    .iter()
                    .map(|c| serde_json::json!({ "front": c.front, "back": c.back }))
                    .collect::<Vec<_>>(),
            }),
            StudyContent::StudyGuide { markdown } => serde_json::json!({ "markdown": markdown }),
            StudyContent::PracticeTest { questions } => serde_json::json!({
                "questions": questions
                    .iter()
                    .map(|q| serde_json::json!({ "text": q.text, "answer": q.answer }))
                    .collect::<Vec<_>>(),
            }),
        }
    }
}

/// A generated artifact, independent of any chat session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StudyItemRecord", into = "StudyItemRecord")]
pub struct StudyItem {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub subject: Option<String>,
    pub content: StudyContent,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudyItem {
    pub fn new(title: impl Into<String>, content: StudyContent) -> Self {
        let now = Utc::now();
        Self {
            id: format!("study_{}", Uuid::new_v4().simple()),
            title: title.into(),
            description: None,
            subject: None,
            content,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn kind(&self) -> StudyKind {
        self.content.kind()
    }
}

/// The persisted shape of a study item: `type` sits beside `content`.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StudyItemRecord {
    id: String,
    #[serde(rename = "type")]
    kind: StudyKind,
    #[serde(default)]
    title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    content: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<StudyItemRecord> for StudyItem {
    type Error = ContentError;

    fn try_from(record: StudyItemRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            content: content::decode(record.kind, &record.content)?,
            id: record.id,
            title: record.title,
            description: record.description,
            subject: record.subject,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

impl From<StudyItem> for StudyItemRecord {
    fn from(item: StudyItem) -> Self {
        Self {
            kind: item.kind(),
            content: item.content.to_value(),
            id: item.id,
            title: item.title,
            description: item.description,
            subject: item.subject,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}

//=========================================================================================
// Settings
//=========================================================================================

/// Flat user preferences. Missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub default_mode: Mode,
    pub detail_level: String,
    pub auto_follow_up: bool,
    /// Minutes.
    pub focus_timer_default: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_mode: Mode::General,
            detail_level: "detailed".to_string(),
            auto_follow_up: true,
            focus_timer_default: 25,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_are_unique_even_when_created_back_to_back() {
        let ids: std::collections::HashSet<String> = (0..1000)
            .map(|_| Session::new(DEFAULT_SESSION_TITLE, Mode::General).id)
            .collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn unknown_mode_decodes_as_general() {
        let mode: Mode = serde_json::from_str("\"astrology\"").unwrap();
        assert_eq!(mode, Mode::General);
        let mode: Mode = serde_json::from_str("\"general\"").unwrap();
        assert_eq!(mode, Mode::General);
        assert_eq!(serde_json::to_string(&Mode::General).unwrap(), "\"general\"");
        assert_eq!(Mode::all()[0], Mode::General);
        assert_eq!(Mode::parse_or_general("Physics"), Mode::Physics);
        assert_eq!(Mode::parse_or_general("cooking"), Mode::General);
    }

    #[test]
    fn settings_fill_missing_fields_with_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"defaultMode":"math"}"#).unwrap();
        assert_eq!(settings.default_mode, Mode::Math);
        assert_eq!(settings.detail_level, "detailed");
        assert!(settings.auto_follow_up);
        assert_eq!(settings.focus_timer_default, 25);
    }

    #[test]
    fn study_item_persists_type_beside_content() {
        let item = StudyItem::new(
            "Cells",
            StudyContent::StudyGuide {
                markdown: "# Cells".to_string(),
            },
        );
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["type"], "studyGuide");
        assert_eq!(value["content"]["markdown"], "# Cells");

        let back: StudyItem = serde_json::from_value(value).unwrap();
        assert_eq!(back, item);
    }

    #[test]
    fn placeholder_titles_are_recognised() {
        let mut session = Session::new("  New Chat ", Mode::Math);
        assert!(session.has_placeholder_title());
        session.title = "Quadratic equations".to_string();
        assert!(!session.has_placeholder_title());
    }
}
