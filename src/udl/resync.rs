//! Resynchronization
//!
//! Lexing can only resume at a line start whose state is known. We walk
//! backward from the requested line until the previous line's stored
//! [`LineState`] is resumable and its last character carries the default
//! style of its family.

use tracing::debug;

use super::family::Family;
use super::line_state::{LineState, StateFamily};
use super::store::DefinitionStore;
use crate::document::Document;

/// Where a colorize or fold pass actually begins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Restart {
    pub pos: usize,
    pub current: StateFamily,
    /// Stack depth recorded for the restart line
    pub depth: usize,
}

impl Restart {
    /// The fallback: document start, markup family
    pub fn document_start(store: &DefinitionStore) -> Self {
        Self {
            pos: 0,
            current: store.start(Family::Markup),
            depth: 0,
        }
    }
}

/// Find a safe restart point at or before `requested`.
///
/// Lines with a non-empty state stack are accepted only within
/// `nested_window` lines of the requested line, and only when every push
/// saves the same frame so the stack can be rebuilt from its depth.
pub fn find_restart_point<D: Document + ?Sized>(
    store: &DefinitionStore,
    doc: &D,
    requested: usize,
    nested_window: usize,
) -> Restart {
    let requested_line = doc.line_of(requested.min(doc.len()));
    let mut line = requested_line;

    while line > 0 {
        let prev = LineState::unpack(doc.line_state(line - 1));
        let nested_ok =
            prev.depth == 0 || (requested_line - line <= nested_window && store.resume_frame().is_some());
        if prev.is_resumable() && nested_ok && store.transitions(prev.state).is_some() {
            let pos = doc.line_start(line);
            let style = doc.style_at(pos - 1);
            let family = Family::of_style(style);
            if style == family.default_style() {
                debug!(line, state = prev.state, family = family.name(), depth = prev.depth, "resync");
                return Restart {
                    pos,
                    current: StateFamily::new(prev.state, family),
                    depth: prev.depth,
                };
            }
        }
        line -= 1;
    }

    debug!(requested, "resync to document start");
    Restart::document_start(store)
}
