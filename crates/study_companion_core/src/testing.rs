//! In-memory fakes of the ports, shared by the unit tests of this crate.

use async_trait::async_trait;
use futures::stream;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::domain::StudyContent;
use crate::ports::{
    ChatCompletionService, ChatRequest, GenerateRequest, KeyValueStore, PortError, PortResult,
    StudyContentService, TextStream,
};

#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    failing_reads: AtomicBool,
}

impl MemoryStore {
    pub fn insert(&self, key: &str, value: &str) {
        self.entries.lock().unwrap().insert(key.to_string(), value.to_string());
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().unwrap().is_empty()
    }

    pub fn fail_reads(&self) {
        self.failing_reads.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> PortResult<Option<String>> {
        if self.failing_reads.load(Ordering::SeqCst) {
            return Err(PortError::Unexpected("disk on fire".to_string()));
        }
        Ok(self.raw(key))
    }

    async fn set(&self, key: &str, value: &str) -> PortResult<()> {
        self.insert(key, value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> PortResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}

/// A scripted chat model. Each call pops the next queued reply; an empty
/// queue answers with an HTTP 500.
#[derive(Default)]
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<PortResult<Vec<String>>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedLlm {
    /// Queues a reply that streams as the given fragments.
    pub fn reply_in_parts(&self, parts: &[&str]) {
        let parts = parts.iter().map(|p| p.to_string()).collect();
        self.replies.lock().unwrap().push_back(Ok(parts));
    }

    pub fn reply(&self, text: &str) {
        self.reply_in_parts(&[text]);
    }

    pub fn fail(&self, error: PortError) {
        self.replies.lock().unwrap().push_back(Err(error));
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: ChatRequest) -> PortResult<Vec<String>> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(PortError::Http {
                    status: 500,
                    message: "no scripted reply".to_string(),
                })
            })
    }
}

#[async_trait]
impl ChatCompletionService for ScriptedLlm {
    async fn complete(&self, request: ChatRequest) -> PortResult<String> {
        let text = self.next(request)?.concat();
        if text.is_empty() {
            return Err(PortError::EmptyResponse);
        }
        Ok(text)
    }

    async fn stream(&self, request: ChatRequest) -> PortResult<TextStream> {
        let parts = self.next(request)?;
        let mut items: Vec<PortResult<String>> = parts.into_iter().map(Ok).collect();
        if items.is_empty() {
            items.push(Err(PortError::EmptyResponse));
        }
        Ok(Box::pin(stream::iter(items)))
    }
}

/// A study endpoint that always answers with the same outcome.
pub struct FixedStudyEndpoint(pub PortResult<StudyContent>);

#[async_trait]
impl StudyContentService for FixedStudyEndpoint {
    async fn generate_content(&self, _request: &GenerateRequest) -> PortResult<StudyContent> {
        self.0.clone()
    }
}
