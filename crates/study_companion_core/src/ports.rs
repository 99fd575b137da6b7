//! crates/study_companion_core/src/ports.rs
//!
//! Defines the service contracts (traits) the core logic depends on.
//! These traits form the boundary of the hexagonal architecture: the core never
//! talks to a file system or an HTTP client directly, only to these ports.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::domain::{Message, StudyContent, StudyKind};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (file system, network).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    /// A non-2xx answer from a remote service, already reduced to readable text.
    #[error("{message}")]
    Http { status: u16, message: String },
    #[error("API returned an empty response.")]
    EmptyResponse,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A finite, single-pass sequence of reply text fragments.
pub type TextStream = Pin<Box<dyn Stream<Item = PortResult<String>> + Send>>;

//=========================================================================================
// Request Types
//=========================================================================================

/// A chat-completion request as the core sees it. The adapter adds the model name.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    /// Overrides the adapter's default sampling temperature.
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Ask the remote model for a single JSON object.
    pub json_response: bool,
}

impl ChatRequest {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            temperature: None,
            max_tokens: None,
            json_response: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn json_object(mut self) -> Self {
        self.json_response = true;
        self
    }
}

/// What the user asked the study item generator for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequest {
    #[serde(rename = "type")]
    pub kind: StudyKind,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl GenerateRequest {
    pub fn new(kind: StudyKind, prompt: impl Into<String>) -> Self {
        Self {
            kind,
            prompt: prompt.into(),
            title: None,
            subject: None,
        }
    }
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// A persistent string-keyed store holding one JSON blob per key.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Returns `None` when the key has never been written.
    async fn get(&self, key: &str) -> PortResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> PortResult<()>;

    /// Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> PortResult<()>;
}

#[async_trait]
pub trait ChatCompletionService: Send + Sync {
    /// Sends a one-shot request and returns the whole reply.
    async fn complete(&self, request: ChatRequest) -> PortResult<String>;

    /// Sends a streaming request. The returned stream yields text fragments in
    /// arrival order and ends with `PortError::EmptyResponse` if no text came.
    async fn stream(&self, request: ChatRequest) -> PortResult<TextStream>;
}

#[async_trait]
pub trait StudyContentService: Send + Sync {
    /// Produces validated content of the requested kind.
    async fn generate_content(&self, request: &GenerateRequest) -> PortResult<StudyContent>;
}
