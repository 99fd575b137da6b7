//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::protocol::{ErrorResponse, GenerateStudyItemBody, GenerateStudyItemResponse};
use crate::web::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use study_companion_core::content::{self, ContentError};
use study_companion_core::generator::GenerationError;
use study_companion_core::ports::{GenerateRequest, PortError};
use tracing::{error, info, warn};
use utoipa::OpenApi;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        generate_study_item_handler,
    ),
    components(
        schemas(GenerateStudyItemBody, GenerateStudyItemResponse, ErrorResponse)
    ),
    tags(
        (name = "Study Companion API", description = "Study material generation for the study companion.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// REST API Handlers
//=========================================================================================

fn reply(status: StatusCode, body: ErrorResponse) -> Response {
    (status, Json(body)).into_response()
}

/// Generate flashcards, a study guide or a practice test.
///
/// The model is asked for a single JSON object which is then normalized to
/// the shape of the requested type.
#[utoipa::path(
    post,
    path = "/api/generate-study-item",
    request_body = GenerateStudyItemBody,
    responses(
        (status = 200, description = "Content generated", body = GenerateStudyItemResponse),
        (status = 400, description = "Malformed body or unknown type", body = ErrorResponse),
        (status = 500, description = "No server credential configured, or generation failed", body = ErrorResponse),
        (status = 502, description = "The model returned nothing usable", body = ErrorResponse)
    )
)]
pub async fn generate_study_item_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<GenerateStudyItemBody>, JsonRejection>,
) -> Response {
    let Some(generator) = &app_state.generator else {
        return reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse::new("OPENAI_API_KEY not configured")
                .with_message("Set OPENAI_API_KEY in the server environment."),
        );
    };

    let Ok(Json(body)) = payload else {
        return reply(StatusCode::BAD_REQUEST, ErrorResponse::new("Invalid JSON body"));
    };

    let kind = match content::parse_kind(body.kind.as_deref()) {
        Ok(kind) => kind,
        Err(e) => {
            warn!("Rejected study generation request: {}", e);
            return reply(
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("Missing or invalid type (use: flashcards, studyGuide, practiceTest)"),
            );
        }
    };

    let mut request = GenerateRequest::new(kind, body.prompt.unwrap_or_default());
    request.title = body.title;
    request.subject = body.subject;

    match generator.generate(&request).await {
        Ok(content) => {
            info!("Generated {} content", kind);
            (
                StatusCode::OK,
                Json(GenerateStudyItemResponse {
                    content: content.to_value(),
                }),
            )
                .into_response()
        }
        Err(GenerationError::Port(PortError::Http { status, message })) => {
            warn!("Upstream rejected study generation with {}: {}", status, message);
            let status = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            reply(status, ErrorResponse::new(message))
        }
        Err(GenerationError::Port(PortError::EmptyResponse)) => {
            reply(StatusCode::BAD_GATEWAY, ErrorResponse::new("Empty response from model"))
        }
        Err(GenerationError::Content(ContentError::Unparseable { excerpt })) => {
            warn!("Unparseable {} output from model", kind);
            reply(
                StatusCode::BAD_GATEWAY,
                ErrorResponse::new("Could not parse valid study content from model response")
                    .with_raw(excerpt),
            )
        }
        Err(e) => {
            error!("Study generation failed: {}", e);
            reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::new("Generation failed").with_message(e.to_string()),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::to_bytes;
    use serde_json::{json, Value};
    use std::sync::Mutex;
    use study_companion_core::generator::StudyItemGenerator;
    use study_companion_core::ports::{ChatCompletionService, ChatRequest, PortResult, TextStream};

    /// Answers every completion with the same outcome and keeps the last request.
    struct CannedChat {
        outcome: PortResult<String>,
        last: Mutex<Option<ChatRequest>>,
    }

    #[async_trait]
    impl ChatCompletionService for CannedChat {
        async fn complete(&self, request: ChatRequest) -> PortResult<String> {
            *self.last.lock().unwrap() = Some(request);
            self.outcome.clone()
        }

        async fn stream(&self, _request: ChatRequest) -> PortResult<TextStream> {
            Err(PortError::Unexpected("not streamed".to_string()))
        }
    }

    fn state(outcome: Option<PortResult<String>>) -> (Arc<AppState>, Option<Arc<CannedChat>>) {
        let chat = outcome.map(|outcome| {
            Arc::new(CannedChat {
                outcome,
                last: Mutex::new(None),
            })
        });
        let generator = chat
            .clone()
            .map(|chat| Arc::new(StudyItemGenerator::new(None, chat)));
        (Arc::new(AppState { generator }), chat)
    }

    async fn call(state: Arc<AppState>, body: Value) -> (StatusCode, Value) {
        let body: GenerateStudyItemBody = serde_json::from_value(body).unwrap();
        let response = generate_study_item_handler(State(state), Ok(Json(body))).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn flashcards_are_normalized() {
        let (state, chat) = state(Some(Ok(
            r#"{"cards":[{"question":"ATP?","answer":"Energy"},{"front":"DNA","back":"Genes"}]}"#.to_string(),
        )));

        let (status, body) = call(
            state,
            json!({"type": "flashcards", "prompt": "cells", "title": "Biology", "subject": "biology"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"content": {"cards": [
                {"front": "ATP?", "back": "Energy"},
                {"front": "DNA", "back": "Genes"}
            ]}})
        );
        let request = chat.unwrap().last.lock().unwrap().clone().unwrap();
        assert!(request.json_response);
        assert_eq!(request.messages[1].content, "cells\nTitle: Biology\nSubject: biology");
    }

    #[tokio::test]
    async fn missing_credential_is_a_server_error() {
        let (state, _) = state(None);
        let (status, body) = call(state, json!({"type": "flashcards"})).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "OPENAI_API_KEY not configured");
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn unknown_type_is_a_bad_request() {
        let (state, chat) = state(Some(Ok("{}".to_string())));
        let (status, body) = call(state.clone(), json!({"type": "essay"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("practiceTest"));

        let (status, _) = call(state, json!({"prompt": "no type"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(chat.unwrap().last.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn upstream_status_is_passed_through() {
        let (state, _) = state(Some(Err(PortError::Http {
            status: 401,
            message: "Incorrect API key provided".to_string(),
        })));
        let (status, body) = call(state, json!({"type": "studyGuide", "prompt": "Rome"})).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"error": "Incorrect API key provided"}));
    }

    #[tokio::test]
    async fn empty_model_output_is_a_bad_gateway() {
        let (state, _) = state(Some(Err(PortError::EmptyResponse)));
        let (status, body) = call(state, json!({"type": "practiceTest"})).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body, json!({"error": "Empty response from model"}));
    }

    #[tokio::test]
    async fn unparseable_output_returns_a_bounded_excerpt() {
        let raw = format!("Sorry, {}", "no json here ".repeat(100));
        let (state, _) = state(Some(Ok(raw)));
        let (status, body) = call(state, json!({"type": "practiceTest", "prompt": "WW2"})).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Could not parse valid study content from model response");
        assert_eq!(body["raw"].as_str().unwrap().chars().count(), 500);
    }
}
