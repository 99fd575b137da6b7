//! crates/study_companion_core/src/content.rs
//!
//! Turns loosely shaped model output into validated `StudyContent`.
//!
//! Models answer with "roughly" the requested JSON: keys vary (`front` vs
//! `question` vs `q`), values are not always strings, and the object is often
//! wrapped in prose or markdown fences. Decoding here accepts those variations
//! but rejects any payload that does not match the shape of the requested kind.

use serde_json::{Map, Value};

use crate::domain::{Flashcard, PracticeQuestion, StudyContent, StudyItem, StudyKind};

/// Upper bound on cards / questions kept from a single model response.
pub const MAX_ENTRIES: usize = 50;

/// How much raw model output an error may carry for diagnosis.
pub const RAW_EXCERPT_CHARS: usize = 500;

const FRONT_KEYS: &[&str] = &["front", "question", "q"];
const BACK_KEYS: &[&str] = &["back", "answer", "a"];
const QUESTION_KEYS: &[&str] = &["text", "question", "q"];
const ANSWER_KEYS: &[&str] = &["answer", "a"];
const GUIDE_TEXT_KEYS: &[&str] = &["content", "text", "body"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContentError {
    #[error("Unknown study item type: {0}")]
    UnknownType(String),
    #[error("Payload does not match the {0} shape")]
    ShapeMismatch(StudyKind),
    #[error("Could not parse valid content from model response: {excerpt}")]
    Unparseable { excerpt: String },
}

/// Resolves the wire name of a study item type. A missing name is unknown too.
pub fn parse_kind(name: Option<&str>) -> Result<StudyKind, ContentError> {
    let name = name.unwrap_or_default();
    StudyKind::parse(name).ok_or_else(|| ContentError::UnknownType(name.to_string()))
}

/// Returns the first `RAW_EXCERPT_CHARS` characters of `raw`.
pub fn excerpt(raw: &str) -> String {
    raw.chars().take(RAW_EXCERPT_CHARS).collect()
}

/// Parses the span between the first `{` and the last `}` of `text`.
///
/// Anything outside that span (prose, code fences) is discarded.
pub fn extract_json_object(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

/// Decodes `value` as the content of a study item of the given kind.
pub fn decode(kind: StudyKind, value: &Value) -> Result<StudyContent, ContentError> {
    let obj = value.as_object().ok_or(ContentError::ShapeMismatch(kind))?;
    match kind {
        StudyKind::Flashcards => {
            let cards = entries(obj, "cards")
                .ok_or(ContentError::ShapeMismatch(kind))?
                .map(|card| Flashcard {
                    front: coerce_field(card, FRONT_KEYS),
                    back: coerce_field(card, BACK_KEYS),
                })
                .collect();
            Ok(StudyContent::Flashcards { cards })
        }
        StudyKind::PracticeTest => {
            let questions = entries(obj, "questions")
                .ok_or(ContentError::ShapeMismatch(kind))?
                .map(|q| PracticeQuestion {
                    text: coerce_field(q, QUESTION_KEYS),
                    answer: coerce_field(q, ANSWER_KEYS),
                })
                .collect();
            Ok(StudyContent::PracticeTest { questions })
        }
        StudyKind::StudyGuide => {
            let markdown = guide_markdown(obj).ok_or(ContentError::ShapeMismatch(kind))?;
            Ok(StudyContent::StudyGuide { markdown })
        }
    }
}

/// Locates, parses and decodes the JSON object in a raw model reply.
///
/// Failures carry a bounded excerpt of `raw`, never the whole reply.
pub fn parse_model_output(kind: StudyKind, raw: &str) -> Result<StudyContent, ContentError> {
    extract_json_object(raw)
        .and_then(|value| decode(kind, &value).ok())
        .ok_or_else(|| ContentError::Unparseable {
            excerpt: excerpt(raw),
        })
}

/// Renders a study item as plain text for use as conversation context.
pub fn stringify_study_item(item: &StudyItem) -> String {
    let mut text = format!(
        "STUDY ITEM CONTEXT:\nType: {}\nTitle: {}\nDescription: {}\n\nCONTENT:\n",
        item.kind(),
        if item.title.is_empty() { "Untitled" } else { item.title.as_str() },
        item.description.as_deref().unwrap_or(""),
    );
    match &item.content {
        StudyContent::Flashcards { cards } => {
            for (i, card) in cards.iter().enumerate() {
                text.push_str(&format!("Card {}:\nQ: {}\nA: {}\n\n", i + 1, card.front, card.back));
            }
        }
        StudyContent::StudyGuide { markdown } => text.push_str(markdown),
        StudyContent::PracticeTest { questions } => {
            for (i, q) in questions.iter().enumerate() {
                text.push_str(&format!(
                    "Question {}: {}\nAnswer: {}\n\n",
                    i + 1,
                    q.text,
                    q.answer
                ));
            }
        }
    }
    text
}

/// The first `MAX_ENTRIES` object entries of the array at `key`.
fn entries<'a>(
    obj: &'a Map<String, Value>,
    key: &str,
) -> Option<impl Iterator<Item = &'a Map<String, Value>>> {
    let array = obj.get(key)?.as_array()?;
    Some(array.iter().take(MAX_ENTRIES).filter_map(Value::as_object))
}

/// Reads the first usable value among `keys`, coercing scalars to strings.
fn coerce_field(obj: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| match obj.get(*key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        })
        .unwrap_or_default()
}

fn guide_markdown(obj: &Map<String, Value>) -> Option<String> {
    if let Some(Value::String(md)) = obj.get("markdown") {
        return Some(md.clone());
    }
    if let Some(sections @ (Value::Object(_) | Value::Array(_))) = obj.get("sections") {
        return serde_json::to_string(sections).ok();
    }
    GUIDE_TEXT_KEYS
        .iter()
        .find_map(|key| obj.get(*key).and_then(Value::as_str).map(str::to_string))
}
