//! Error types for the UDL engine

use thiserror::Error;

/// Result type alias for UDL operations
pub type Result<T> = std::result::Result<T, UdlError>;

/// Engine error types
#[derive(Error, Debug)]
pub enum UdlError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("load error: {0}")]
    Load(#[from] LoadError),

    #[error("config error: {0}")]
    Config(String),

    #[error("definition not ready: {0}")]
    NotReady(String),
}

/// A failure while loading a bytecode description, tagged with the
/// 1-based line number of the offending instruction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {kind}")]
pub struct LoadError {
    pub line: usize,
    pub kind: LoadErrorKind,
}

impl LoadError {
    pub fn new(line: usize, kind: LoadErrorKind) -> Self {
        Self { line, kind }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadErrorKind {
    #[error("definition file not found: {0}")]
    MissingFile(String),

    #[error("malformed instruction")]
    BadLine,

    #[error("bad integer argument: {0}")]
    BadInteger(String),

    #[error("negative argument: {0}")]
    NegativeArgument(String),

    #[error("opcode {op} expects {expected} arguments, got {got}")]
    BadArity {
        op: &'static str,
        expected: &'static str,
        got: usize,
    },

    #[error("unknown opcode {0}")]
    UnknownOpcode(u32),

    #[error("no family selected")]
    NoFamily,

    #[error("no lookback tests created for the current family")]
    NoLookbackTests,

    #[error("transition table has not been sized")]
    NoTransitionTable,

    #[error("no transition to modify")]
    NoTransition,

    #[error("state {0} is out of range")]
    StateOutOfRange(u32),

    #[error("bad family index {0}")]
    BadFamily(u32),

    #[error("bad style {0}")]
    BadStyle(u32),

    #[error("bad lookback action {0}")]
    BadAction(u32),

    #[error("bad match kind {0}")]
    BadMatchKind(u32),

    #[error("first instruction must be a version")]
    MissingVersion,

    #[error("instruction needs a string payload")]
    MissingPayload,
}
