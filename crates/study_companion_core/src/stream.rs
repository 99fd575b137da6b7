//! crates/study_companion_core/src/stream.rs
//!
//! Incremental reader for the chat proxy's server-sent-event stream.
//!
//! The proxy answers a streaming request with lines of the form
//! `data: {"choices":[{"delta":{"content":"..."}}]}` terminated by
//! `data: [DONE]`. Chunks from the transport split those lines at arbitrary
//! byte offsets, including inside multi-byte characters, so bytes are buffered
//! until a full line is available and only complete lines are decoded.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::ports::{PortError, PortResult, TextStream};

const DONE_SENTINEL: &str = "[DONE]";

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<Delta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

/// Line buffer that turns raw chunks into reply text fragments.
#[derive(Debug, Default)]
pub struct DeltaDecoder {
    buffer: Vec<u8>,
}

impl DeltaDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk and returns the fragments of every line it completed.
    ///
    /// The trailing partial line stays buffered for the next call.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let Some(last_newline) = self.buffer.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };
        let complete: Vec<u8> = self.buffer.drain(..=last_newline).collect();
        complete
            .split(|b| *b == b'\n')
            .filter_map(|line| Self::decode_line(&String::from_utf8_lossy(line)))
            .collect()
    }

    /// Ends the stream, returning whatever never saw a terminating newline.
    pub fn finish(self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.buffer).trim().to_string();
        (!rest.is_empty()).then_some(rest)
    }

    fn decode_line(line: &str) -> Option<String> {
        let line = line.trim();
        let payload = line.strip_prefix("data:")?.trim_start();
        if payload == DONE_SENTINEL {
            debug!("Received [DONE] signal");
            return None;
        }
        let chunk: StreamChunk = match serde_json::from_str(payload) {
            Ok(chunk) => chunk,
            Err(e) => {
                warn!("Skipping unparseable stream line ({}): {}", e, payload);
                return None;
            }
        };
        let choice = chunk.choices.into_iter().next()?;
        if let Some(reason) = &choice.finish_reason {
            debug!("Stream finish reason: {}", reason);
        }
        choice
            .delta
            .and_then(|d| d.content)
            .filter(|content| !content.is_empty())
    }
}

/// Adapts a chunked response body into a lazy stream of reply fragments.
///
/// A transport error ends the stream with that error. If the body ends without
/// yielding any text, the last item is `PortError::EmptyResponse`.
pub fn delta_stream<S, E>(body: S) -> TextStream
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut decoder = DeltaDecoder::new();
        let mut received = 0usize;
        futures::pin_mut!(body);

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    for fragment in decoder.feed(&bytes) {
                        received += fragment.len();
                        yield Ok(fragment);
                    }
                }
                Err(e) => {
                    yield Err(PortError::Unexpected(format!("Stream reading error: {}", e)));
                    return;
                }
            }
        }

        if let Some(rest) = decoder.finish() {
            warn!("Stream ended mid-line, discarding remaining buffer: {}", rest);
        }
        debug!("Stream completed. Total length: {}", received);
        if received == 0 {
            yield Err(PortError::EmptyResponse);
        }
    })
}

/// Drains a fragment stream into the full reply text.
pub async fn collect_text(mut stream: TextStream) -> PortResult<String> {
    let mut full = String::new();
    while let Some(fragment) = stream.next().await {
        full.push_str(&fragment?);
    }
    Ok(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    const HELLO_STREAM: &str = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n",
        "data: [DONE]\n",
    );

    fn chunked(body: &[u8], sizes: &[usize]) -> Vec<Result<Bytes, String>> {
        let mut chunks = Vec::new();
        let mut rest = body;
        for size in sizes.iter().cycle() {
            if rest.is_empty() {
                break;
            }
            let take = (*size).min(rest.len()).max(1);
            chunks.push(Ok(Bytes::copy_from_slice(&rest[..take])));
            rest = &rest[take..];
        }
        chunks
    }

    async fn read_all(chunks: Vec<Result<Bytes, String>>) -> PortResult<String> {
        collect_text(delta_stream(stream::iter(chunks))).await
    }

    #[tokio::test]
    async fn whole_stream_in_one_chunk() {
        let text = read_all(chunked(HELLO_STREAM.as_bytes(), &[usize::MAX])).await;
        assert_eq!(text.unwrap(), "Hello");
    }

    #[tokio::test]
    async fn any_chunk_split_yields_the_same_text() {
        let body = HELLO_STREAM.as_bytes();
        for size in 1..body.len() {
            let text = read_all(chunked(body, &[size])).await.unwrap();
            assert_eq!(text, "Hello", "chunk size {size}");
        }
        let text = read_all(chunked(body, &[3, 17, 1, 40, 9])).await.unwrap();
        assert_eq!(text, "Hello");
    }

    #[tokio::test]
    async fn multibyte_characters_survive_byte_splits() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"6CO₂ → C₆H₁₂O₆ 🌿\"}}]}\ndata: [DONE]\n";
        for size in 1..8 {
            let text = read_all(chunked(body.as_bytes(), &[size])).await.unwrap();
            assert_eq!(text, "6CO₂ → C₆H₁₂O₆ 🌿");
        }
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"A\"}}]}\n",
            "data: {broken\n",
            ": keep-alive\n",
            "\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"B\"}}]}\r\n",
        );
        let text = read_all(chunked(body.as_bytes(), &[usize::MAX])).await;
        assert_eq!(text.unwrap(), "AB");
    }

    #[tokio::test]
    async fn unterminated_last_line_is_not_processed() {
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"kept\"}}]}\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lost\"}}]}",
        );
        let text = read_all(chunked(body.as_bytes(), &[usize::MAX])).await;
        assert_eq!(text.unwrap(), "kept");
    }

    #[tokio::test]
    async fn stream_without_text_is_an_empty_response() {
        let text = read_all(chunked(b"data: [DONE]\n", &[usize::MAX])).await;
        assert_eq!(text, Err(PortError::EmptyResponse));
    }

    #[tokio::test]
    async fn transport_errors_end_the_stream() {
        let chunks = vec![
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"par\"}}]}\n")),
            Err("connection reset".to_string()),
        ];
        let mut stream = delta_stream(stream::iter(chunks));
        assert_eq!(stream.next().await, Some(Ok("par".to_string())));
        assert!(matches!(stream.next().await, Some(Err(PortError::Unexpected(_)))));
        assert_eq!(stream.next().await, None);
    }

    #[test]
    fn decoder_keeps_partial_line_buffered() {
        let mut decoder = DeltaDecoder::new();
        assert!(decoder.feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]").is_empty());
        assert_eq!(decoder.feed(b"}\n"), vec!["x".to_string()]);
        decoder.feed(b"data: [DO");
        assert_eq!(decoder.finish().as_deref(), Some("data: [DO"));
    }
}
