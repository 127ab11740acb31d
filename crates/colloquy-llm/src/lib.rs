//! OpenAI-compatible language-model backend and embedder.
//!
//! - [`OpenAiBackend`] streams chat completions and implements
//!   [`colloquy_core::model::ModelBackend`].
//! - [`OpenAiEmbedder`] calls the embeddings endpoint and implements
//!   [`colloquy_core::knowledge::Embedder`].
//!
//! Both work with any endpoint that speaks the OpenAI wire format (OpenAI,
//! Azure-style gateways, Ollama, vLLM, llama.cpp server, ...).

pub mod chat;
pub mod config;
pub mod embeddings;
pub mod error;
pub mod prompt;
pub mod sse;
pub mod types;

pub use chat::OpenAiBackend;
pub use config::ProviderConfig;
pub use embeddings::OpenAiEmbedder;
pub use error::{ProviderError, Result};
