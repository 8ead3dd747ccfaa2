//! Session stores and local retrievers for Haven.
//!
//! Two `SessionStore` backends: SQLite for persistence, in-memory for
//! tests and ephemeral sessions. `KeywordRetriever` is an in-process
//! stand-in for the external vector engine, usable wherever a ranked
//! retriever is needed without network dependencies.

pub mod in_memory;
pub mod keyword;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemorySessionStore;
pub use keyword::{KeywordRetriever, StoredDocument};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteSessionStore;
