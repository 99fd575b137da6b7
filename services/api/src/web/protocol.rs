//! services/api/src/web/protocol.rs
//!
//! Request and response bodies of the study item generation endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// The body of `POST /api/generate-study-item`.
///
/// `type` stays a free string here so an unknown value can be answered with a
/// 400 naming the accepted types rather than a generic decode failure.
#[derive(Deserialize, Debug, Default, ToSchema)]
pub struct GenerateStudyItemBody {
    /// One of `flashcards`, `studyGuide`, `practiceTest`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// What the material should cover.
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
}

/// A successful generation.
#[derive(Serialize, Debug, ToSchema)]
pub struct GenerateStudyItemResponse {
    /// `{cards}`, `{markdown}` or `{questions}`, matching the requested type.
    #[schema(value_type = Object)]
    pub content: Value,
}

/// The body of every failed request.
#[derive(Serialize, Debug, PartialEq, Eq, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// The start of the model output that could not be parsed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: None,
            raw: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }
}
