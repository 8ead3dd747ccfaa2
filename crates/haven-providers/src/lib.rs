//! LLM provider adapters for Haven.
//!
//! One adapter covers the field: most hosted and local model servers
//! expose an OpenAI-compatible `/v1/chat/completions` endpoint.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatProvider;
