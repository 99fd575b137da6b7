pub mod file_store;
pub mod proxy_llm;
pub mod study_endpoint;

pub use file_store::FileStore;
pub use proxy_llm::ProxyChatAdapter;
pub use study_endpoint::HttpStudyContentAdapter;
