//! services/api/src/adapters/study_endpoint.rs
//!
//! The `StudyContentService` adapter that calls the served
//! `POST /api/generate-study-item` endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use study_companion_core::content;
use study_companion_core::domain::StudyContent;
use study_companion_core::ports::{GenerateRequest, PortError, PortResult, StudyContentService};

use super::proxy_llm::describe_error;

#[derive(Deserialize)]
struct GenerateResponse {
    content: Value,
}

#[derive(Clone)]
pub struct HttpStudyContentAdapter {
    client: Client,
    url: String,
}

impl HttpStudyContentAdapter {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl StudyContentService for HttpStudyContentAdapter {
    async fn generate_content(&self, request: &GenerateRequest) -> PortResult<StudyContent> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to reach study endpoint: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PortError::Http {
                status: status.as_u16(),
                message: describe_error(status, &text),
            });
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Invalid study endpoint response: {}", e)))?;
        content::decode(request.kind, &body.content).map_err(|e| PortError::Unexpected(e.to_string()))
    }
}
