//! udl - table-driven multi-language tokenizer
//!
//! Highlights documents that mix markup, CSS, client script, server script
//! and template directives, driven by compiled `.lexres` descriptions.

pub mod config;
pub mod document;
pub mod error;
pub mod udl;

pub use config::Config;
pub use document::{Document, MemoryDocument};
pub use error::{LoadError, LoadErrorKind, Result, UdlError};
pub use udl::{DefinitionCache, DefinitionStore, Family, UdlLexer};
