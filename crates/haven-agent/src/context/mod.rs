//! Context assembly — the deterministic half of prompt construction.
//!
//! `assembler` merges already-prepared inputs into one ordered message
//! sequence; `token` sizes text for the summarization buffer's recency
//! window. Neither module performs I/O.

pub mod assembler;
pub mod token;

pub use assembler::ContextAssembler;
pub use token::HeuristicTokenEstimator;
