//! crates/study_companion_core/src/generator.rs
//!
//! Produces study items. The served study endpoint is asked first; when it is
//! not configured or fails, the chat model is prompted directly and its output
//! goes through the same normalization the endpoint applies.

use std::sync::Arc;
use tracing::{info, warn};

use crate::content::{self, ContentError};
use crate::domain::{Message, StudyContent, StudyItem};
use crate::ports::{ChatCompletionService, ChatRequest, GenerateRequest, PortError, StudyContentService};
use crate::prompts;

/// Temperature for study material requests.
pub const STUDY_TEMPERATURE: f32 = 0.6;

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    Port(#[from] PortError),
}

pub struct StudyItemGenerator {
    endpoint: Option<Arc<dyn StudyContentService>>,
    chat: Arc<dyn ChatCompletionService>,
    temperature: f32,
}

impl StudyItemGenerator {
    pub fn new(endpoint: Option<Arc<dyn StudyContentService>>, chat: Arc<dyn ChatCompletionService>) -> Self {
        Self {
            endpoint,
            chat,
            temperature: STUDY_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Generates the content for `request`.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<StudyContent, GenerationError> {
        if let Some(endpoint) = &self.endpoint {
            match endpoint.generate_content(request).await {
                Ok(content) if content.kind() == request.kind => return Ok(content),
                Ok(content) => warn!(
                    "Study endpoint returned {} for a {} request, falling back to direct generation",
                    content.kind(),
                    request.kind
                ),
                Err(e) => warn!("Study endpoint failed, falling back to direct generation: {}", e),
            }
        }
        self.generate_directly(request).await
    }

    /// Prompts the chat model for `request` and normalizes its JSON reply.
    pub async fn generate_directly(&self, request: &GenerateRequest) -> Result<StudyContent, GenerationError> {
        let chat_request = ChatRequest::new(vec![
            Message::system(prompts::study_system_prompt(request.kind)),
            Message::user(prompts::study_user_message(
                &request.prompt,
                request.title.as_deref(),
                request.subject.as_deref(),
            )),
        ])
        .with_temperature(self.temperature)
        .json_object();

        let raw = self.chat.complete(chat_request).await?;
        Ok(content::parse_model_output(request.kind, &raw)?)
    }

    /// Generates content and wraps it in a new study item.
    ///
    /// The item is titled after the request title, or the kind when none is given.
    pub async fn create_item(&self, request: &GenerateRequest) -> Result<StudyItem, GenerationError> {
        let content = self.generate(request).await?;
        let title = request
            .title
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| request.kind.display_name().to_string());
        let mut item = StudyItem::new(title, content);
        item.subject = request.subject.clone();
        item.description = Some(request.prompt.trim().to_string()).filter(|d| !d.is_empty());
        info!("Generated {} '{}'", item.kind(), item.title);
        Ok(item)
    }
}
