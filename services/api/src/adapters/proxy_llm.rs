//! services/api/src/adapters/proxy_llm.rs
//!
//! The `ChatCompletionService` adapter for the chat/completions proxy. Requests
//! follow the OpenAI chat shape; streamed replies are handed to the core's
//! line-buffered delta reader.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use study_companion_core::domain::Message;
use study_companion_core::ports::{ChatCompletionService, ChatRequest, PortError, PortResult, TextStream};
use study_companion_core::stream::delta_stream;
use tracing::{debug, warn};

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    temperature: f32,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    /// Some proxies flatten the reply into a single field.
    #[serde(default)]
    output_text: Option<String>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    message: Option<CompletionMessage>,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone)]
pub struct ProxyChatAdapter {
    client: Client,
    url: String,
    model: String,
    temperature: f32,
    api_key: Option<String>,
}

impl ProxyChatAdapter {
    pub fn new(client: Client, url: impl Into<String>, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            client,
            url: url.into(),
            model: model.into(),
            temperature,
            api_key: None,
        }
    }

    /// Sends `Authorization: Bearer <key>` with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    async fn send(&self, request: &ChatRequest, stream: bool) -> PortResult<reqwest::Response> {
        let body = CompletionBody {
            model: &self.model,
            temperature: request.temperature.unwrap_or(self.temperature),
            messages: &request.messages,
            stream,
            max_tokens: request.max_tokens,
            response_format: request
                .json_response
                .then_some(ResponseFormat { kind: "json_object" }),
        };

        let mut builder = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to reach chat proxy: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = describe_error(status, &text);
            warn!("Chat proxy returned {}: {}", status, message);
            return Err(PortError::Http {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatCompletionService for ProxyChatAdapter {
    async fn complete(&self, request: ChatRequest) -> PortResult<String> {
        let response = self.send(&request, false).await?;
        let body: CompletionResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Invalid completion response: {}", e)))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .or(body.output_text)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(PortError::EmptyResponse);
        }
        Ok(content)
    }

    async fn stream(&self, request: ChatRequest) -> PortResult<TextStream> {
        let response = self.send(&request, true).await?;
        debug!("Streaming reply from {}", self.url);
        Ok(delta_stream(response.bytes_stream()))
    }
}

/// Turns an error response body into one readable sentence.
///
/// Accepts `{"error": "..."}`, `{"error": {"message": "..."}}`,
/// `{"message": "..."}` or plain text.
pub fn describe_error(status: StatusCode, body: &str) -> String {
    let from_json = serde_json::from_str::<Value>(body).ok().and_then(|json| {
        match json.get("error") {
            Some(Value::String(message)) => Some(message.clone()),
            Some(error) => error.get("message").and_then(Value::as_str).map(str::to_string),
            None => json.get("message").and_then(Value::as_str).map(str::to_string),
        }
    });
    from_json
        .or_else(|| {
            let text = body.trim();
            (!text.is_empty()).then(|| text.to_string())
        })
        .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::State, http::header, response::IntoResponse, routing::post, Json, Router};
    use std::sync::{Arc, Mutex};
    use study_companion_core::stream::collect_text;

    type Captured = Arc<Mutex<Vec<(Option<String>, Value)>>>;

    /// Serves `reply` for every POST and records what was sent.
    async fn proxy(reply: (StatusCode, &'static str, &'static str)) -> (String, Captured) {
        let captured: Captured = Arc::default();
        let app = Router::new()
            .route(
                "/chat",
                post(
                    move |State(seen): State<Captured>, headers: axum::http::HeaderMap, Json(body): Json<Value>| async move {
                        let auth = headers
                            .get(header::AUTHORIZATION)
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        seen.lock().unwrap().push((auth, body));
                        let (status, content_type, body) = reply;
                        (status, [(header::CONTENT_TYPE, content_type)], body).into_response()
                    },
                ),
            )
            .with_state(captured.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}/chat", addr), captured)
    }

    fn adapter(url: String) -> ProxyChatAdapter {
        ProxyChatAdapter::new(Client::new(), url, "gpt-4o-mini", 0.7)
    }

    fn hello() -> ChatRequest {
        ChatRequest::new(vec![Message::user("Hello")])
    }

    #[tokio::test]
    async fn complete_reads_the_first_choice() {
        let (url, captured) = proxy((
            StatusCode::OK,
            "application/json",
            r#"{"choices":[{"message":{"content":"Hi there"}}]}"#,
        ))
        .await;

        let reply = adapter(url).complete(hello()).await.unwrap();
        assert_eq!(reply, "Hi there");

        let (auth, body) = captured.lock().unwrap()[0].clone();
        assert_eq!(auth, None);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["messages"][0]["role"], "user");
        assert!(body.get("stream").is_none());
        assert!(body.get("response_format").is_none());
    }

    #[tokio::test]
    async fn json_requests_carry_format_temperature_and_key() {
        let (url, captured) = proxy((
            StatusCode::OK,
            "application/json",
            r#"{"choices":[{"message":{"content":"{\"cards\":[]}"}}]}"#,
        ))
        .await;

        adapter(url)
            .with_api_key("sk-test")
            .complete(hello().with_temperature(0.6).json_object())
            .await
            .unwrap();

        let (auth, body) = captured.lock().unwrap()[0].clone();
        assert_eq!(auth.as_deref(), Some("Bearer sk-test"));
        assert_eq!(body["response_format"]["type"], "json_object");
        assert!((body["temperature"].as_f64().unwrap() - 0.6).abs() < 1e-6);
    }

    #[tokio::test]
    async fn empty_completion_is_an_error() {
        let (url, _) = proxy((StatusCode::OK, "application/json", r#"{"choices":[]}"#)).await;
        assert_eq!(adapter(url).complete(hello()).await, Err(PortError::EmptyResponse));
    }

    #[tokio::test]
    async fn stream_yields_deltas() {
        let (url, captured) = proxy((
            StatusCode::OK,
            "text/event-stream",
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\ndata: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\ndata: [DONE]\n\n",
        ))
        .await;

        let stream = adapter(url).stream(hello()).await.unwrap();
        assert_eq!(collect_text(stream).await.unwrap(), "Hello");
        assert_eq!(captured.lock().unwrap()[0].1["stream"], true);
    }

    #[tokio::test]
    async fn error_status_maps_to_http_error() {
        let (url, _) = proxy((
            StatusCode::TOO_MANY_REQUESTS,
            "application/json",
            r#"{"error":{"message":"Rate limited"}}"#,
        ))
        .await;

        let err = adapter(url).stream(hello()).await.err().unwrap();
        assert_eq!(
            err,
            PortError::Http {
                status: 429,
                message: "Rate limited".to_string()
            }
        );
    }

    #[test]
    fn describe_error_handles_every_body_shape() {
        let status = StatusCode::BAD_GATEWAY;
        assert_eq!(describe_error(status, r#"{"error":"Upstream down"}"#), "Upstream down");
        assert_eq!(describe_error(status, r#"{"error":{"message":"Bad key"}}"#), "Bad key");
        assert_eq!(describe_error(status, r#"{"message":"Nope"}"#), "Nope");
        assert_eq!(describe_error(status, "gateway timeout\n"), "gateway timeout");
        assert_eq!(describe_error(status, ""), "Request failed with status 502");
    }
}
