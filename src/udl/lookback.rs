//! Lookback tests
//!
//! Some transitions are ambiguous on their own: `/` in script code starts a
//! regex literal after an operator but is division after an identifier.
//! A lookback test resolves this by walking backward over text that has
//! already been styled and classifying each same-style run.

use std::ops::RangeInclusive;

use rustc_hash::FxHashSet;

use super::style::Style;
use crate::document::Document;

/// What a lookback entry decides
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookBackAction {
    Accept,
    Reject,
    /// Keep walking backward past the consumed text
    Skip,
}

impl LookBackAction {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(LookBackAction::Accept),
            1 => Some(LookBackAction::Reject),
            2 => Some(LookBackAction::Skip),
            _ => None,
        }
    }
}

/// What part of a run an entry matches
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookBackMatch {
    /// Every run of the style
    All,
    /// Runs whose whole text is a family keyword
    Keywords,
    /// Runs ending in one of these strings; `Skip` consumes only the suffix
    Literals(Vec<Vec<u8>>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookBackTest {
    pub kind: LookBackMatch,
    pub action: LookBackAction,
}

/// Lookback tests of one family, covering a contiguous block of styles
#[derive(Debug, Clone)]
pub struct LookBackTests {
    range: RangeInclusive<Style>,
    tests: Vec<Vec<LookBackTest>>,
    defaults: Vec<Option<LookBackAction>>,
}

impl LookBackTests {
    pub fn new(lo: Style, hi: Style) -> Self {
        let count = hi.saturating_sub(lo) as usize + 1;
        Self {
            range: lo..=hi,
            tests: vec![Vec::new(); count],
            defaults: vec![None; count],
        }
    }

    pub fn contains(&self, style: Style) -> bool {
        self.range.contains(&style)
    }

    fn slot(&self, style: Style) -> Option<usize> {
        self.contains(style)
            .then(|| (style - self.range.start()) as usize)
    }

    /// Append an entry for a style; `false` if the style is out of range
    pub fn add_test(&mut self, style: Style, test: LookBackTest) -> bool {
        match self.slot(style) {
            Some(slot) => {
                self.tests[slot].push(test);
                true
            }
            None => false,
        }
    }

    /// Set the action used when no entry for the style matches
    pub fn set_default(&mut self, style: Style, action: LookBackAction) -> bool {
        match self.slot(style) {
            Some(slot) => {
                self.defaults[slot] = Some(action);
                true
            }
            None => false,
        }
    }

    /// Classify one run; returns the action and the number of bytes it
    /// consumes from the end of the run.
    fn classify(&self, style: Style, run: &[u8], keywords: &FxHashSet<Vec<u8>>) -> (LookBackAction, usize) {
        let Some(slot) = self.slot(style) else {
            return (LookBackAction::Accept, run.len());
        };
        for test in &self.tests[slot] {
            match &test.kind {
                LookBackMatch::All => return (test.action, run.len()),
                LookBackMatch::Keywords if keywords.contains(run) => {
                    return (test.action, run.len());
                }
                LookBackMatch::Keywords => {}
                LookBackMatch::Literals(literals) => {
                    if let Some(literal) = literals.iter().find(|lit| run.ends_with(lit)) {
                        return (test.action, literal.len());
                    }
                }
            }
        }
        let action = self.defaults[slot].unwrap_or(LookBackAction::Accept);
        (action, run.len())
    }

    /// Walk backward from `pos` (exclusive) and decide whether the
    /// transition at `pos` may fire.
    ///
    /// Reaching a style outside this set's range, or the start of the
    /// document, accepts.
    pub fn passes<D: Document + ?Sized>(&self, doc: &D, pos: usize, keywords: &FxHashSet<Vec<u8>>) -> bool {
        let mut end = pos.min(doc.len());
        while end > 0 {
            let last = end - 1;
            let style = doc.style_at(last);
            if !self.contains(style) {
                return true;
            }
            let start = doc.style_run_start(last);
            let run = doc.bytes(start..end);
            match self.classify(style, &run, keywords) {
                (LookBackAction::Accept, _) => return true,
                (LookBackAction::Reject, _) => return false,
                (LookBackAction::Skip, consumed) => end -= consumed.clamp(1, end - start),
            }
        }
        true
    }
}
