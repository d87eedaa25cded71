//! Generation backend access: chat client, prompts, translation, and the
//! query enhancer feeding prompt construction.

pub mod client;
pub mod enhancer;
pub mod morphology;
pub mod prompts;
pub mod translator;

pub use client::{ChatBackend, ChatMessage, ChatRequest, OllamaClient, Role, DEFAULT_CHAT_TIMEOUT};
pub use enhancer::QueryEnhancer;
pub use morphology::{gloss, Morphology, SuffixStemmer};
pub use translator::Translator;
