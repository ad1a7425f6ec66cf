//! Document accessor
//!
//! The engine never owns text. Everything it reads or writes goes through
//! [`Document`], which the host text store implements. [`MemoryDocument`]
//! is a plain in-memory implementation used by the CLI and the tests.

use std::ops::Range;
use std::path::Path;

use rustc_hash::FxHashMap;

use crate::udl::fold::FOLD_LEVEL_BASE;

/// Host capabilities consumed by the colorizer and the fold computer.
///
/// Positions are byte offsets. Lines are terminated by `\n`; the newline
/// byte belongs to the line it ends. Reads past the end return zero.
pub trait Document {
    /// Total buffer length in bytes
    fn len(&self) -> usize;

    /// Byte at a position (0 past the end)
    fn byte_at(&self, pos: usize) -> u8;

    /// Style of the byte at a position (0 past the end)
    fn style_at(&self, pos: usize) -> u8;

    /// Colour a half-open range
    fn set_style_range(&mut self, range: Range<usize>, style: u8);

    /// Line containing a position; the end of the buffer belongs to the last line
    fn line_of(&self, pos: usize) -> usize;

    /// Start position of a line; lines past the end start at `len()`
    fn line_start(&self, line: usize) -> usize;

    /// Number of lines (at least one)
    fn line_count(&self) -> usize;

    /// Opaque per-line integer
    fn line_state(&self, line: usize) -> u32;

    fn set_line_state(&mut self, line: usize, state: u32);

    fn fold_level(&self, line: usize) -> u32;

    fn set_fold_level(&mut self, line: usize, level: u32);

    /// Named integer option, e.g. `fold.compact`
    fn property_int(&self, key: &str, default: i32) -> i32;

    /// Whether a byte starts a multi-byte sequence
    fn is_lead_byte(&self, byte: u8) -> bool {
        byte >= 0xC0
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length of the character starting at `pos`
    fn char_len_at(&self, pos: usize) -> usize {
        let byte = self.byte_at(pos);
        if !self.is_lead_byte(byte) {
            return 1;
        }
        let len = match byte {
            0xF0..=0xFF => 4,
            0xE0..=0xEF => 3,
            _ => 2,
        };
        len.min(self.len().saturating_sub(pos)).max(1)
    }

    /// End of the line containing `line`, i.e. the start of the next line
    fn line_end(&self, line: usize) -> usize {
        self.line_start(line + 1)
    }

    /// End of the maximal same-style run starting at `pos`, bounded by `limit`
    fn style_run_end(&self, pos: usize, limit: usize) -> usize {
        let style = self.style_at(pos);
        let mut end = pos + 1;
        while end < limit && self.style_at(end) == style {
            end += 1;
        }
        end.min(limit.max(pos + 1))
    }

    /// Start of the maximal same-style run ending at `pos` (inclusive)
    fn style_run_start(&self, pos: usize) -> usize {
        let style = self.style_at(pos);
        let mut start = pos;
        while start > 0 && self.style_at(start - 1) == style {
            start -= 1;
        }
        start
    }

    /// Copy a range of bytes
    fn bytes(&self, range: Range<usize>) -> Vec<u8> {
        range.map(|pos| self.byte_at(pos)).collect()
    }
}

/// An in-memory document: text plus parallel style, line-state and
/// fold-level storage.
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    text: Vec<u8>,
    styles: Vec<u8>,
    /// Start offset of every line; always starts with 0
    line_starts: Vec<usize>,
    line_states: Vec<u32>,
    fold_levels: Vec<u32>,
    properties: FxHashMap<String, i32>,
}

impl MemoryDocument {
    /// Create a document from text, unstyled
    pub fn new(text: impl Into<Vec<u8>>) -> Self {
        let text = text.into();
        let line_starts = compute_line_starts(&text);
        let lines = line_starts.len();
        Self {
            styles: vec![0; text.len()],
            text,
            line_starts,
            line_states: vec![0; lines],
            fold_levels: vec![FOLD_LEVEL_BASE; lines],
            properties: FxHashMap::default(),
        }
    }

    /// Create a document from file contents
    pub fn from_file(path: &Path) -> std::io::Result<Self> {
        Ok(Self::new(std::fs::read(path)?))
    }

    /// Get the text content
    pub fn text(&self) -> &[u8] {
        &self.text
    }

    /// Get all styles
    pub fn styles(&self) -> &[u8] {
        &self.styles
    }

    /// Set a named integer option
    pub fn set_property(&mut self, key: &str, value: i32) {
        self.properties.insert(key.to_string(), value);
    }

    /// Replace a byte range with new text.
    ///
    /// Inserted bytes get style 0. The first affected line keeps its line
    /// state and fold level; lines created by the insertion start zeroed.
    pub fn replace(&mut self, range: Range<usize>, text: &[u8]) {
        let start = range.start.min(self.text.len());
        let end = range.end.clamp(start, self.text.len());
        let first_line = self.line_of(start);
        let last_line = self.line_of(end);

        self.text.splice(start..end, text.iter().copied());
        self.styles.splice(start..end, std::iter::repeat(0).take(text.len()));
        self.line_starts = compute_line_starts(&self.text);

        let added = text.iter().filter(|&&b| b == b'\n').count();
        let kept_state = self.line_states[first_line];
        let kept_level = self.fold_levels[first_line];
        self.line_states.splice(
            first_line..=last_line,
            std::iter::once(kept_state).chain(std::iter::repeat(0).take(added)),
        );
        self.fold_levels.splice(
            first_line..=last_line,
            std::iter::once(kept_level).chain(std::iter::repeat(FOLD_LEVEL_BASE).take(added)),
        );
        debug_assert_eq!(self.line_states.len(), self.line_starts.len());
    }
}

fn compute_line_starts(text: &[u8]) -> Vec<usize> {
    std::iter::once(0)
        .chain(
            text.iter()
                .enumerate()
                .filter(|(_, &b)| b == b'\n')
                .map(|(i, _)| i + 1),
        )
        .collect()
}

impl Document for MemoryDocument {
    fn len(&self) -> usize {
        self.text.len()
    }

    fn byte_at(&self, pos: usize) -> u8 {
        self.text.get(pos).copied().unwrap_or(0)
    }

    fn style_at(&self, pos: usize) -> u8 {
        self.styles.get(pos).copied().unwrap_or(0)
    }

    fn set_style_range(&mut self, range: Range<usize>, style: u8) {
        let end = range.end.min(self.styles.len());
        if range.start < end {
            self.styles[range.start..end].fill(style);
        }
    }

    fn line_of(&self, pos: usize) -> usize {
        match self.line_starts.binary_search(&pos) {
            Ok(line) => line,
            Err(next) => next - 1,
        }
    }

    fn line_start(&self, line: usize) -> usize {
        self.line_starts.get(line).copied().unwrap_or(self.text.len())
    }

    fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    fn line_state(&self, line: usize) -> u32 {
        self.line_states.get(line).copied().unwrap_or(0)
    }

    fn set_line_state(&mut self, line: usize, state: u32) {
        if let Some(slot) = self.line_states.get_mut(line) {
            *slot = state;
        }
    }

    fn fold_level(&self, line: usize) -> u32 {
        self.fold_levels.get(line).copied().unwrap_or(FOLD_LEVEL_BASE)
    }

    fn set_fold_level(&mut self, line: usize, level: u32) {
        if let Some(slot) = self.fold_levels.get_mut(line) {
            *slot = level;
        }
    }

    fn property_int(&self, key: &str, default: i32) -> i32 {
        self.properties.get(key).copied().unwrap_or(default)
    }
}
