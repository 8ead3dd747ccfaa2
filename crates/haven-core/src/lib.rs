//! # Haven Core
//!
//! Domain types, traits, and error definitions for the Haven companion agent.
//! This crate has **zero framework dependencies** — it defines the domain model
//! that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here. Implementations live in their
//! respective crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod diary;
pub mod error;
pub mod message;
pub mod provider;
pub mod retrieval;
pub mod session;
pub mod token;

// Re-export key types at crate root for ergonomics
pub use diary::{CbtRecord, DiaryResult, Thought};
pub use error::{Error, Result};
pub use message::{Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use retrieval::{RetrievedItem, Retriever};
pub use session::{SessionStore, Speaker, Turn};
pub use token::TokenEstimator;
