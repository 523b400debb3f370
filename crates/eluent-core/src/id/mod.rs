//! Identifier generation, the per-repo prefix trie, and short-ID
//! resolution. ULID encoding itself lives on [`crate::model::types::Ulid`]
//! since [`crate::model::types::AtomId`] is built directly from it.

pub mod resolver;
pub mod trie;

pub use resolver::{resolve, ResolveError};
pub use trie::PrefixTrie;
