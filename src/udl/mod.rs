//! UDL tokenizer engine
//!
//! This module provides the table-driven lexer:
//! - Bytecode loading into shared definition stores
//! - The colorizing automaton with push/pop and delimiter tracking
//! - Line-state resynchronization for incremental re-lexing
//! - Fold level computation

pub mod cache;
pub mod driver;
pub mod family;
pub mod fold;
pub mod line_state;
pub mod loader;
pub mod lookback;
pub mod machine;
pub mod resync;
pub mod store;
pub mod style;
pub mod transition;

pub use cache::{percent_decode, DefinitionCache, DefinitionSource, FileSource, MemorySource};
pub use driver::UdlLexer;
pub use family::{Family, FamilyInfo};
pub use fold::{fold, FOLD_LEVEL_BASE, FOLD_LEVEL_HEADER_FLAG, FOLD_LEVEL_NUMBER_MASK, FOLD_LEVEL_WHITE_FLAG};
pub use line_state::{delimiter_hash, LineState, StateFamily};
pub use loader::{load, load_or_not_ready, LOADER_VERSION};
pub use machine::{colorize, Colorizer, StateStack};
pub use resync::{find_restart_point, Restart};
pub use store::DefinitionStore;
pub use style::Style;
