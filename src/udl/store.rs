//! Loaded language definitions
//!
//! A [`DefinitionStore`] holds everything one `.lexres` description
//! declares. It is built once by the loader and never mutated afterwards.

use super::family::{Family, FamilyInfo};
use super::fold::Flippers;
use super::line_state::StateFamily;
use super::transition::{StateId, StateTransitions, TransitionTable};
use crate::error::LoadError;

/// Writer version triple of a bytecode description
pub type FormatVersion = (u32, u32, u32);

#[derive(Debug, Default)]
pub struct DefinitionStore {
    pub(crate) identifier: String,
    pub(crate) ready: bool,
    pub(crate) language: String,
    pub(crate) version: FormatVersion,
    pub(crate) families: [FamilyInfo; Family::COUNT],
    pub(crate) table: TransitionTable,
    pub(crate) flippers: Flippers,
    /// Frame shared by every push, which lets nested lines be resumed
    pub(crate) resume_frame: Option<StateFamily>,
    pub(crate) load_error: Option<LoadError>,
}

impl DefinitionStore {
    /// A store that failed to load. It is cached like a good one so the
    /// load is not retried, but callers must check [`is_ready`](Self::is_ready).
    pub fn not_ready(identifier: &str, error: LoadError) -> Self {
        Self {
            identifier: identifier.to_string(),
            load_error: Some(error),
            ..Default::default()
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Display name declared by the description (may be empty)
    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn version(&self) -> FormatVersion {
        self.version
    }

    /// Why loading failed, if it did
    pub fn load_error(&self) -> Option<&LoadError> {
        self.load_error.as_ref()
    }

    pub fn family(&self, family: Family) -> &FamilyInfo {
        &self.families[family.index()]
    }

    pub fn families(&self) -> impl Iterator<Item = (Family, &FamilyInfo)> {
        Family::ALL.into_iter().zip(self.families.iter())
    }

    /// Transition lists of a state, if it declared any
    pub fn transitions(&self, state: StateId) -> Option<&StateTransitions> {
        self.table.get(state)
    }

    pub fn state_count(&self) -> usize {
        self.table.size()
    }

    pub fn flippers(&self) -> &Flippers {
        &self.flippers
    }

    /// The stack entry every push saves, if the table only has one kind.
    /// Without it a stack can't be rebuilt from a stored depth.
    pub fn resume_frame(&self) -> Option<StateFamily> {
        self.resume_frame
    }

    /// Where lexing starts in a family
    pub fn start(&self, family: Family) -> StateFamily {
        StateFamily::new(self.family(family).start_state, family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LoadErrorKind;

    #[test]
    fn test_not_ready() {
        let store = DefinitionStore::not_ready("html", LoadError::new(3, LoadErrorKind::BadLine));
        assert!(!store.is_ready());
        assert_eq!(store.identifier(), "html");
        assert_eq!(store.load_error().map(|e| e.line), Some(3));
        assert!(store.transitions(1).is_none());
        assert_eq!(store.start(Family::Markup), StateFamily::new(0, Family::Markup));
    }
}
