//! Fold levels
//!
//! Folding walks same-style runs that the colorizer already produced and
//! feeds them through the flipper rules, independent of the transition
//! table. Each line gets the nesting level in effect at its start.

use rustc_hash::FxHashMap;
use tracing::debug;

use super::resync::find_restart_point;
use super::store::DefinitionStore;
use super::style::Style;
use crate::document::Document;

/// Level 0 as stored by the host
pub const FOLD_LEVEL_BASE: u32 = 0x400;
/// Line holds no visible tokens
pub const FOLD_LEVEL_WHITE_FLAG: u32 = 0x1000;
/// Line opens a fold
pub const FOLD_LEVEL_HEADER_FLAG: u32 = 0x2000;
pub const FOLD_LEVEL_NUMBER_MASK: u32 = 0x0FFF;

const MAX_LEVEL: i32 = (FOLD_LEVEL_NUMBER_MASK - FOLD_LEVEL_BASE) as i32;

/// Direction of a flipper
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlipDirection {
    Open,
    Close,
}

impl FlipDirection {
    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(FlipDirection::Open),
            1 => Some(FlipDirection::Close),
            _ => None,
        }
    }

    pub fn delta(self) -> i32 {
        match self {
            FlipDirection::Open => 1,
            FlipDirection::Close => -1,
        }
    }
}

/// `(style, token text) -> nesting delta` rules, shared by all families
#[derive(Debug, Default)]
pub struct Flippers {
    by_style: FxHashMap<Style, FxHashMap<Vec<u8>, i32>>,
    longest: usize,
}

impl Flippers {
    pub fn add(&mut self, style: Style, token: Vec<u8>, direction: FlipDirection) {
        self.longest = self.longest.max(token.len());
        self.by_style.entry(style).or_default().insert(token, direction.delta());
    }

    pub fn is_empty(&self) -> bool {
        self.by_style.is_empty()
    }

    pub fn lookup(&self, style: Style, token: &[u8]) -> Option<i32> {
        self.by_style.get(&style)?.get(token).copied()
    }

    /// Apply the flippers of one token to `level`, never going below 0.
    ///
    /// Operator runs may glue several glyphs together (`){`), so they are
    /// split by repeatedly taking the longest prefix that is a flipper.
    pub fn apply(&self, level: i32, style: Style, token: &[u8], probe_prefixes: bool) -> i32 {
        let step = |level: i32, delta: i32| (level + delta).clamp(0, MAX_LEVEL);
        if !self.by_style.contains_key(&style) {
            return level;
        }
        if !probe_prefixes {
            return self.lookup(style, token).map_or(level, |delta| step(level, delta));
        }

        let mut level = level;
        let mut i = 0;
        while i < token.len() {
            let max = (token.len() - i).min(self.longest);
            let hit = (1..=max)
                .rev()
                .find_map(|n| self.lookup(style, &token[i..i + n]).map(|delta| (n, delta)));
            match hit {
                Some((n, delta)) => {
                    level = step(level, delta);
                    i += n;
                }
                None => i += 1,
            }
        }
        level
    }
}

/// Compute fold levels for the lines covering `[start, start + length)`.
pub fn fold<D: Document + ?Sized>(
    store: &DefinitionStore,
    doc: &mut D,
    start: usize,
    length: usize,
    nested_window: usize,
) {
    let len = doc.len();
    let end = start.saturating_add(length).min(len);
    let restart = find_restart_point(store, &*doc, start, nested_window);
    let compact = doc.property_int("fold.compact", 1) != 0;
    let flippers = store.flippers();
    let is_operator = |style: Style| store.families().any(|(_, info)| info.operator_style == Some(style));

    let mut line = doc.line_of(restart.pos);
    let mut level_start = if line == 0 {
        0
    } else {
        ((doc.fold_level(line) & FOLD_LEVEL_NUMBER_MASK).saturating_sub(FOLD_LEVEL_BASE)) as i32
    };
    let mut level = level_start;
    let mut visible = false;
    let mut pos = doc.line_start(line);
    debug!(line, level = level_start, end, "folding");

    let level_for = |level_start: i32, level: i32, visible: bool| {
        let mut lev = FOLD_LEVEL_BASE + level_start as u32;
        if visible && level > level_start {
            lev |= FOLD_LEVEL_HEADER_FLAG;
        }
        if !visible && compact {
            lev |= FOLD_LEVEL_WHITE_FLAG;
        }
        lev
    };

    while pos < end {
        let line_end = doc.line_end(line);
        let run_end = doc.style_run_end(pos, line_end.min(end));
        let style = doc.style_at(pos);
        let token = doc.bytes(pos..run_end);
        if token.iter().any(|b| !b.is_ascii_whitespace()) {
            visible = true;
            level = flippers.apply(level, style, &token, is_operator(style));
        }
        pos = run_end;

        if pos >= line_end {
            doc.set_fold_level(line, level_for(level_start, level, visible));
            line += 1;
            level_start = level;
            visible = false;
        }
    }

    // The last line of the range gets a level even without a line break.
    if line < doc.line_count() && (pos > doc.line_start(line) || end == len) {
        doc.set_fold_level(line, level_for(level_start, level, visible));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn braces() -> Flippers {
        let mut flippers = Flippers::default();
        flippers.add(5, b"{".to_vec(), FlipDirection::Open);
        flippers.add(5, b"}".to_vec(), FlipDirection::Close);
        flippers.add(5, b"{{".to_vec(), FlipDirection::Open);
        flippers.add(2, b"begin".to_vec(), FlipDirection::Open);
        flippers.add(2, b"end".to_vec(), FlipDirection::Close);
        flippers
    }

    #[test]
    fn test_whole_token() {
        let flippers = braces();
        assert_eq!(flippers.apply(0, 2, b"begin", false), 1);
        assert_eq!(flippers.apply(1, 2, b"end", false), 0);
        assert_eq!(flippers.apply(1, 2, b"beginning", false), 1);
        assert_eq!(flippers.apply(1, 3, b"begin", false), 1);
    }

    #[test]
    fn test_operator_prefixes() {
        let flippers = braces();
        assert_eq!(flippers.apply(1, 5, b"}{", true), 1);
        // "{{" is one flipper, not two.
        assert_eq!(flippers.apply(0, 5, b"{{", true), 1);
        assert_eq!(flippers.apply(0, 5, b"{{{", true), 2);
        assert_eq!(flippers.apply(0, 5, b"({", true), 1);
    }

    #[test]
    fn test_never_negative() {
        let flippers = braces();
        assert_eq!(flippers.apply(0, 5, b"}}}", true), 0);
        assert_eq!(flippers.apply(0, 2, b"end", false), 0);
        assert_eq!(flippers.apply(1, 5, b"}}{", true), 1);
    }

    #[test]
    fn test_direction_codes() {
        assert_eq!(FlipDirection::from_code(0), Some(FlipDirection::Open));
        assert_eq!(FlipDirection::from_code(1).map(FlipDirection::delta), Some(-1));
        assert_eq!(FlipDirection::from_code(2), None);
    }
}
