pub mod content;
pub mod domain;
pub mod generator;
pub mod ports;
pub mod prompts;
pub mod session_manager;
pub mod store;
pub mod stream;
pub mod suggestions;

#[cfg(test)]
mod testing;

pub use domain::{
    Flashcard, Message, Mode, PracticeQuestion, Role, Session, Settings, StudyContent, StudyItem,
    StudyKind,
};
pub use generator::{GenerationError, StudyItemGenerator};
pub use ports::{
    ChatCompletionService, ChatRequest, GenerateRequest, KeyValueStore, PortError, PortResult,
    StudyContentService, TextStream,
};
pub use session_manager::{ReplyStream, SessionError, SessionManager};
pub use store::CompanionStore;
