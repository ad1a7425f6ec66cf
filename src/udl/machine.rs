//! The colorizing automaton
//!
//! A [`Colorizer`] walks forward from a restart point. At each position the
//! current state's transitions are tried in order; the first that matches
//! (and passes its lookback test) colors text and moves the automaton.
//! Text that no transition has colored yet stays pending until a later
//! "upto" or "include" paint covers it. A pass keeps scanning past its
//! requested end until the requested text is settled; only at the end of
//! the document is the remainder given the family default.

use tracing::{debug, trace, warn};

use super::family::Family;
use super::line_state::{delimiter_hash, LineState, StateFamily};
use super::resync::{find_restart_point, Restart};
use super::store::DefinitionStore;
use super::style::Style;
use super::transition::{MatchKind, StackOp, StateId, StateTransitions, Transition};
use crate::config::Config;
use crate::document::Document;

/// Saved return points for push/pop transitions
#[derive(Debug, Default, Clone)]
pub struct StateStack {
    items: Vec<StateFamily>,
}

impl StateStack {
    /// A stack of `depth` copies of `filler`, for resuming on a nested line
    /// of a table whose pushes all save `filler`
    pub fn seeded(depth: usize, filler: StateFamily) -> Self {
        Self {
            items: vec![filler; depth],
        }
    }

    pub fn push(&mut self, entry: StateFamily) {
        self.items.push(entry);
    }

    pub fn pop(&mut self) -> Option<StateFamily> {
        self.items.pop()
    }

    pub fn depth(&self) -> usize {
        self.items.len()
    }
}

/// A state switch waiting for the cursor to leave `line`
#[derive(Debug, Clone, Copy)]
struct PendingEol {
    state: StateId,
    family: Option<Family>,
    line: usize,
}

/// Bytes of the line the regex matchers run against
#[derive(Debug, Default)]
struct LineBuffer {
    line: Option<usize>,
    start: usize,
    bytes: Vec<u8>,
}

/// Line state computed at a boundary, written once its text is styled
#[derive(Debug)]
struct LineRecord {
    line: usize,
    boundary: usize,
    state: LineState,
    family: Family,
}

/// The transition chosen at a position
struct Selected<'s> {
    transition: &'s Transition,
    start: usize,
    len: usize,
    capture: Option<Vec<u8>>,
    /// The upto span was already painted by the lookback pre-pass
    pre_styled: bool,
}

pub struct Colorizer<'s, 'd, D: Document + ?Sized> {
    store: &'s DefinitionStore,
    doc: &'d mut D,
    pos: usize,
    styled_to: usize,
    end: usize,
    current: StateFamily,
    stack: StateStack,
    delimiter: Vec<u8>,
    pending_eol: Option<PendingEol>,
    line: LineBuffer,
    records: Vec<LineRecord>,
    redo_limit: usize,
    stall_pos: usize,
    stalls: usize,
}

impl<'s, 'd, D: Document + ?Sized> Colorizer<'s, 'd, D> {
    pub fn new(store: &'s DefinitionStore, doc: &'d mut D, restart: Restart, end: usize, redo_limit: usize) -> Self {
        let end = end.min(doc.len());
        Self {
            store,
            doc,
            pos: restart.pos,
            styled_to: restart.pos,
            end,
            current: restart.current,
            stack: StateStack::seeded(
                restart.depth,
                store.resume_frame().unwrap_or_else(|| store.start(Family::Markup)),
            ),
            delimiter: Vec::new(),
            pending_eol: None,
            line: LineBuffer::default(),
            records: Vec::new(),
            redo_limit: redo_limit.max(1),
            stall_pos: usize::MAX,
            stalls: 0,
        }
    }

    /// Run until the range is styled; returns the final state.
    pub fn run(mut self) -> StateFamily {
        let store = self.store;
        let len = self.doc.len();
        let mut abandoned = false;
        while self.pos < len && (self.pos < self.end || self.styled_to < self.end) {
            let Some(entry) = store.transitions(self.current.state) else {
                warn!(
                    state = self.current.state,
                    family = self.current.family.name(),
                    pos = self.pos,
                    "state has no transitions, abandoning the rest of the range"
                );
                abandoned = true;
                break;
            };
            let before = (self.current, self.stack.depth());
            let old_pos = self.pos;
            match self.select(entry) {
                Some(selected) => {
                    let (new_pos, redo) = self.execute(selected);
                    self.settle(old_pos, new_pos, redo, before);
                }
                None => self.step_forward(),
            }
        }

        if self.pos >= len {
            if let Some(eof) = store.transitions(self.current.state).and_then(|e| e.eof.as_ref()) {
                trace!(state = self.current.state, "end of buffer transition");
                let selected = Selected {
                    transition: eof,
                    start: len,
                    len: 0,
                    capture: None,
                    pre_styled: false,
                };
                self.execute(selected);
            }
        }

        self.finish(abandoned);
        self.current
    }

    /// Try the state's transitions at the cursor, falling back to its
    /// empty transition.
    fn select(&mut self, entry: &'s StateTransitions) -> Option<Selected<'s>> {
        for transition in &entry.transitions {
            let Some((len, capture)) = self.try_match(transition) else {
                continue;
            };
            let mut pre_styled = false;
            if transition.lookback {
                // Lookback walks styled text, so the gap before the match
                // must carry its upto style first.
                if let Some(style) = transition.upto_style {
                    if self.styled_to < self.pos {
                        self.doc.set_style_range(self.styled_to..self.pos, style);
                    }
                    pre_styled = true;
                }
                if !self.lookback_passes() {
                    trace!(pos = self.pos, "lookback rejected transition");
                    continue;
                }
            }
            return Some(Selected {
                transition,
                start: self.pos,
                len,
                capture,
                pre_styled,
            });
        }
        entry.empty.as_ref().map(|transition| Selected {
            transition,
            start: self.pos,
            len: 0,
            capture: None,
            pre_styled: false,
        })
    }

    fn try_match(&mut self, transition: &Transition) -> Option<(usize, Option<Vec<u8>>)> {
        if let MatchKind::Regex { .. } = transition.kind {
            self.refresh_line();
            return transition.match_regex(&self.line.bytes, self.pos - self.line.start);
        }
        let literal = match &transition.kind {
            MatchKind::Literal(literal) => literal.as_slice(),
            MatchKind::Delimiter if !self.delimiter.is_empty() => self.delimiter.as_slice(),
            _ => return None,
        };
        let doc = &*self.doc;
        let fits = self.pos + literal.len() <= doc.len();
        (fits && Transition::match_literal(literal, |i| doc.byte_at(i), self.pos, transition.ignore_case))
            .then(|| (literal.len(), None))
    }

    fn refresh_line(&mut self) {
        let line = self.doc.line_of(self.pos);
        if self.line.line != Some(line) {
            let start = self.doc.line_start(line);
            let end = self.doc.line_end(line);
            self.line = LineBuffer {
                line: Some(line),
                start,
                bytes: self.doc.bytes(start..end),
            };
        }
    }

    fn lookback_passes(&self) -> bool {
        let info = self.store.family(self.current.family);
        match &info.lookback {
            Some(tests) => tests.passes(&*self.doc, self.pos, &info.keywords),
            None => {
                warn!(family = self.current.family.name(), "lookback requested but family has no tests");
                false
            }
        }
    }

    /// Apply a chosen transition; returns the new cursor and whether the
    /// transition's redo took effect.
    ///
    /// A pop on an empty stack is logged and the transition's own target
    /// (if any) applies instead, so `)` with no opener still leaves the
    /// state the grammar names for it.
    fn execute(&mut self, selected: Selected<'s>) -> (usize, bool) {
        let t = selected.transition;
        let match_end = selected.start + selected.len;

        if let Some(style) = t.upto_style {
            if selected.pre_styled {
                self.styled_to = self.styled_to.max(selected.start);
                self.flush_records();
            } else {
                self.color_to(selected.start, style);
            }
        }

        if let Some(style) = t.include_style {
            let style = if t.no_keyword {
                style
            } else {
                let from = self.styled_to.min(match_end);
                let text = self.doc.bytes(from..match_end);
                self.store.family(self.current.family).promote(style, &text)
            };
            self.color_to(match_end, style);
        }

        let redo = t.redo && !(self.stall_pos == selected.start && self.stalls >= self.redo_limit);
        let new_pos = if redo { selected.start } else { match_end };

        if !self.apply_pending_eol(new_pos) {
            match t.stack {
                StackOp::Push(saved) => {
                    let state = if saved.state == 0 { self.current.state } else { saved.state };
                    self.stack.push(StateFamily::new(state, saved.family));
                    self.apply_target(t);
                }
                StackOp::Pop => match self.stack.pop() {
                    Some(previous) => self.current = previous,
                    None => {
                        warn!(pos = selected.start, "pop on an empty state stack");
                        self.apply_target(t);
                    }
                },
                StackOp::None => self.apply_target(t),
            }
        }

        if let Some((state, family)) = t.eol_target {
            self.pending_eol = Some(PendingEol {
                state,
                family,
                line: self.doc.line_of(selected.start),
            });
        }

        match selected.capture {
            Some(text) => self.delimiter = text,
            None if matches!(t.kind, MatchKind::Delimiter) && !t.keep_delimiter => self.delimiter.clear(),
            None => {}
        }
        if t.clear_delimiter {
            self.delimiter.clear();
        }

        trace!(
            pos = selected.start,
            len = selected.len,
            state = self.current.state,
            family = self.current.family.name(),
            "transition"
        );
        (new_pos, redo)
    }

    fn apply_target(&mut self, t: &Transition) {
        if let Some(state) = t.target {
            self.current.state = state;
        }
        if let Some(family) = t.target_family {
            self.current.family = family;
        }
    }

    /// Fire the deferred switch once `new_pos` reaches the end of its line.
    ///
    /// Reaching the line's last byte is enough: the newline itself is
    /// lexed in the deferred state.
    fn apply_pending_eol(&mut self, new_pos: usize) -> bool {
        let Some(pending) = self.pending_eol else {
            return false;
        };
        if new_pos + 1 < self.doc.line_start(pending.line + 1) {
            return false;
        }
        if pending.state != 0 {
            self.current.state = pending.state;
        }
        if let Some(family) = pending.family {
            self.current.family = family;
        }
        self.pending_eol = None;
        true
    }

    /// Account for a transition that did not move the cursor and force a
    /// step when it would otherwise repeat forever.
    fn settle(&mut self, old_pos: usize, new_pos: usize, redo: bool, before: (StateFamily, usize)) {
        let mut new_pos = new_pos;
        if new_pos <= old_pos {
            if self.stall_pos != old_pos {
                self.stall_pos = old_pos;
                self.stalls = 0;
            }
            self.stalls += 1;
            let unchanged = !redo && (self.current, self.stack.depth()) == before;
            if unchanged || self.stalls > self.redo_limit {
                if !unchanged {
                    debug!(pos = old_pos, stalls = self.stalls, "no progress, forcing a step");
                }
                new_pos = old_pos + self.doc.char_len_at(old_pos);
                self.stalls = 0;
                self.apply_pending_eol(new_pos);
            }
        }
        self.advance_to(new_pos);
    }

    fn step_forward(&mut self) {
        let new_pos = self.pos + self.doc.char_len_at(self.pos);
        self.apply_pending_eol(new_pos);
        self.advance_to(new_pos);
    }

    /// Move the cursor, recording a line state for every boundary crossed.
    fn advance_to(&mut self, new_pos: usize) {
        let len = self.doc.len();
        let new_pos = new_pos.min(len);
        let old_line = self.doc.line_of(self.pos);
        let new_line = self.doc.line_of(new_pos);
        self.pos = new_pos;
        for line in old_line..new_line {
            let boundary = self.doc.line_start(line + 1);
            self.cross_line(line, boundary, boundary == new_pos);
        }
    }

    fn cross_line(&mut self, line: usize, boundary: usize, exact: bool) {
        let hash = delimiter_hash(&self.delimiter);
        let previous = LineState::unpack(self.doc.line_state(line));
        if hash != previous.delimiter_hash {
            // The following line was lexed under a different delimiter.
            let extended = self.doc.line_end(line + 1).min(self.doc.len());
            if extended > self.end {
                debug!(line, from = self.end, to = extended, "delimiter changed, extending range");
                self.end = extended;
            }
        }
        let state = if exact && self.pending_eol.is_none() {
            self.current.state
        } else {
            0
        };
        self.records.push(LineRecord {
            line,
            boundary,
            state: LineState {
                state,
                delimiter_hash: hash,
                depth: self.stack.depth(),
            },
            family: self.current.family,
        });
    }

    /// Write out line states whose line text is fully styled.
    fn flush_records(&mut self) {
        let styled_to = self.styled_to;
        let split = self.records.partition_point(|r| r.boundary <= styled_to);
        for record in self.records.drain(..split) {
            let mut state = record.state;
            let last = self.doc.style_at(record.boundary - 1);
            if Family::of_style(last) != record.family {
                state.state = 0;
            }
            self.doc.set_line_state(record.line, state.pack());
        }
    }

    fn color_to(&mut self, to: usize, style: Style) {
        let to = to.min(self.doc.len());
        if self.styled_to < to {
            self.doc.set_style_range(self.styled_to..to, style);
            self.styled_to = to;
            self.flush_records();
        }
    }

    fn finish(&mut self, abandoned: bool) {
        if abandoned || self.pos >= self.doc.len() {
            let to = self.pos.max(self.end);
            self.color_to(to, self.current.family.default_style());
        }
        self.flush_records();
        // Lines whose text is still pending keep their delimiter hash but
        // are not offered for resync.
        for record in self.records.drain(..) {
            let state = LineState {
                state: 0,
                ..record.state
            };
            self.doc.set_line_state(record.line, state.pack());
        }
        debug!(
            styled_to = self.styled_to,
            pos = self.pos,
            state = self.current.state,
            family = self.current.family.name(),
            depth = self.stack.depth(),
            "colorized"
        );
    }
}

/// Colorize `[start, start + length)`, resuming from the nearest safe
/// line start at or before `start`.
pub fn colorize<D: Document + ?Sized>(
    store: &DefinitionStore,
    doc: &mut D,
    start: usize,
    length: usize,
    config: &Config,
) -> StateFamily {
    let len = doc.len();
    let start = start.min(len);
    let end = start.saturating_add(length).min(len);
    let restart = find_restart_point(store, &*doc, start, config.nested_resync_window);
    Colorizer::new(store, doc, restart, end, config.redo_limit).run()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MemoryDocument;
    use crate::udl::loader::load;
    use crate::udl::style::{
        CSL_DEFAULT, CSL_IDENTIFIER, CSL_OPERATOR, CSL_REGEX, CSL_WORD, M_CDATA, M_COMMENT, M_DEFAULT, M_OPERATOR,
        M_PI, M_STRING, M_TAGNAME, SSL_DEFAULT,
    };
    use pretty_assertions::assert_eq;

    const TEMPLATE: &str = "\
0:1:0:0
10:0
12:1
30:3
31:1:0\t<%
32:0
35:2:3
36:0:0
31:2:0\t%>
33:31
37
";

    const SCRIPT: &str = "\
0:1:0:0
10:0
12:1
10:2
11:28:27:29
2\treturn typeof
3
13
20:22:30
21:22:2
21:28:1
22:27:1:1
30:3
31:1:2
35:2:2
31:2:1\t[A-Za-z_]\\w*
32:22
33:28
31:2:1\t/[^/\\n]*/
34:4
32:22
33:30
31:2:0\t/
32:22
33:29
31:2:0\t=
32:22
33:29
";

    const HEREDOC: &str = "\
0:1:0:0
10:0
12:1
30:3
31:1:1\t<<(\\w+)
32:0
33:12
35:2
39:1:0
31:2:4
32:8
33:13
35:1
";

    fn styles_of(doc: &MemoryDocument) -> Vec<Style> {
        doc.styles().to_vec()
    }

    fn run(source: &str, text: &str) -> (MemoryDocument, StateFamily) {
        let store = load("test", source).unwrap();
        let mut doc = MemoryDocument::new(text);
        let len = doc.len();
        let end = colorize(&store, &mut doc, 0, len, &Config::default());
        (doc, end)
    }

    #[test]
    fn test_template_push_pop() {
        let (doc, end) = run(TEMPLATE, "a<%b%>c");
        assert_eq!(
            styles_of(&doc),
            vec![M_DEFAULT, SSL_DEFAULT, SSL_DEFAULT, SSL_DEFAULT, SSL_DEFAULT, SSL_DEFAULT, M_DEFAULT]
        );
        assert_eq!(end, StateFamily::new(1, Family::Markup));
    }

    #[test]
    fn test_unterminated_block_uses_family_default() {
        let (doc, end) = run(TEMPLATE, "a<%b");
        assert_eq!(styles_of(&doc), vec![M_DEFAULT, SSL_DEFAULT, SSL_DEFAULT, SSL_DEFAULT]);
        assert_eq!(end, StateFamily::new(2, Family::ServerScript));
    }

    #[test]
    fn test_lookback_rejects_regex_after_keyword() {
        let (doc, _) = run(SCRIPT, "return /x/");
        assert_eq!(&doc.styles()[..6], &[CSL_WORD; 6]);
        assert_eq!(doc.style_at(6), CSL_DEFAULT);
        assert_eq!(doc.style_at(7), CSL_OPERATOR);
        assert_eq!(doc.style_at(8), CSL_IDENTIFIER);
        assert_eq!(doc.style_at(9), CSL_OPERATOR);
    }

    #[test]
    fn test_lookback_accepts_regex_after_operator() {
        let (doc, _) = run(SCRIPT, "x = /y/");
        assert_eq!(doc.style_at(0), CSL_IDENTIFIER);
        assert_eq!(doc.style_at(2), CSL_OPERATOR);
        assert_eq!(&doc.styles()[4..7], &[CSL_REGEX; 3]);
    }

    #[test]
    fn test_heredoc_delimiter() {
        let text = "x <<EOT\nbody\nEOT\ny";
        let (doc, end) = run(HEREDOC, text);
        assert_eq!(&doc.styles()[..2], &[M_DEFAULT; 2]);
        assert_eq!(&doc.styles()[2..7], &[M_PI; 5]);
        assert_eq!(&doc.styles()[7..13], &[M_STRING; 6]);
        assert_eq!(&doc.styles()[13..16], &[M_CDATA; 3]);
        assert_eq!(doc.style_at(17), M_DEFAULT);
        assert_eq!(end, StateFamily::new(1, Family::Markup));

        let line0 = LineState::unpack(doc.line_state(0));
        let line1 = LineState::unpack(doc.line_state(1));
        let line2 = LineState::unpack(doc.line_state(2));
        assert_eq!(line0.delimiter_hash, delimiter_hash(b"EOT"));
        assert!(!line1.is_resumable());
        assert_eq!(line2.delimiter_hash, 0);
    }

    #[test]
    fn test_delimiter_change_extends_range() {
        let store = load("test", HEREDOC).unwrap();
        let config = Config::default();
        let mut doc = MemoryDocument::new("x <<EOT\nbody\nEOT\ny");
        let len = doc.len();
        colorize(&store, &mut doc, 0, len, &config);
        assert_eq!(doc.style_at(8), M_STRING);

        doc.replace(4..7, b"EOX");
        colorize(&store, &mut doc, 0, 8, &config);
        // Line 1 was re-lexed although it lies outside the request.
        assert_eq!(doc.style_at(8), M_DEFAULT);
        assert_eq!(LineState::unpack(doc.line_state(0)).delimiter_hash, delimiter_hash(b"EOX"));
    }

    #[test]
    fn test_eol_target_fires_on_next_line() {
        let source = "0:1:0:0\n10:0\n12:1\n30:3\n31:1:0\t#\n32:0\n33:14\n35:2\n38:1\n31:2:1\t.\n33:14\n\
                      31:1:0\t\\n\n33:5\n";
        let (doc, end) = run(source, "a#bc\nd");
        assert_eq!(doc.style_at(0), M_DEFAULT);
        assert_eq!(&doc.styles()[1..4], &[M_COMMENT; 3]);
        // The switch fires on the line's last byte, so state 1 lexes the newline.
        assert_eq!(doc.style_at(4), M_OPERATOR);
        assert_eq!(doc.style_at(5), M_DEFAULT);
        assert_eq!(end.state, 1);
        assert_eq!(LineState::unpack(doc.line_state(0)).state, 1);
    }

    #[test]
    fn test_redo_terminates() {
        let source = "0:1:0:0\n10:0\n12:1\n30:2\n31:1:0\ta\n33:2\n34:1\n";
        let store = load("test", source).unwrap();
        let mut doc = MemoryDocument::new("aaa b");
        let config = Config {
            redo_limit: 5,
            ..Config::default()
        };
        colorize(&store, &mut doc, 0, 5, &config);
        assert_eq!(&doc.styles()[..3], &[M_TAGNAME; 3]);
        assert_eq!(doc.style_at(4), M_DEFAULT);
    }

    #[test]
    fn test_empty_transition_loop_terminates() {
        // 1 -> 2 -> 1 on empty transitions never consumes text.
        let source = "0:1:0:0\n10:0\n12:1\n30:3\n31:1:2\n35:2\n31:2:2\n35:1\n";
        let store = load("test", source).unwrap();
        let mut doc = MemoryDocument::new("abc");
        let config = Config {
            redo_limit: 3,
            ..Config::default()
        };
        colorize(&store, &mut doc, 0, 3, &config);
        assert_eq!(doc.styles(), &[M_DEFAULT; 3]);
    }

    #[test]
    fn test_pop_on_empty_stack_uses_target() {
        let source = "0:1:0:0\n10:0\n12:1\n30:3\n31:1:0\t)\n33:5\n37\n35:2\n";
        let (doc, end) = run(source, "))");
        assert_eq!(doc.style_at(0), M_OPERATOR);
        assert_eq!(end.state, 2);
    }

    #[test]
    fn test_missing_state_abandons_range() {
        let source = "0:1:0:0\n10:0\n12:1\n30:4\n31:1:0\tx\n33:5\n35:3\n";
        let (doc, end) = run(source, "x yz");
        assert_eq!(doc.style_at(0), M_OPERATOR);
        assert_eq!(&doc.styles()[1..], &[M_DEFAULT; 3]);
        assert_eq!(end.state, 3);
    }

    #[test]
    fn test_eof_transition() {
        let source = "0:1:0:0\n10:0\n12:1\n30:3\n31:1:3\n35:2\n31:1:1\t.\n33:0\n";
        let store = load("test", source).unwrap();
        let config = Config::default();

        let mut doc = MemoryDocument::new("abc");
        assert_eq!(colorize(&store, &mut doc, 0, 3, &config).state, 2);

        let mut doc = MemoryDocument::new("abc");
        assert_eq!(colorize(&store, &mut doc, 0, 2, &config).state, 1);
    }

    #[test]
    fn test_partial_rerun_keeps_pending_styles() {
        let store = load("test", HEREDOC).unwrap();
        let config = Config::default();
        let text = "x <<EOT\nhello world\nEOT\ny";
        let mut doc = MemoryDocument::new(text);
        let len = doc.len();
        colorize(&store, &mut doc, 0, len, &config);
        let styles = styles_of(&doc);
        let states: Vec<u32> = (0..doc.line_count()).map(|l| doc.line_state(l)).collect();

        // The range ends inside the heredoc body, before its terminator.
        let world = text.find("world").unwrap();
        colorize(&store, &mut doc, 0, world, &config);
        assert_eq!(styles_of(&doc), styles);
        assert_eq!(&doc.styles()[8..20], &[M_STRING; 12]);
        let again: Vec<u32> = (0..doc.line_count()).map(|l| doc.line_state(l)).collect();
        assert_eq!(again, states);

        let mut prefix = MemoryDocument::new(text);
        colorize(&store, &mut prefix, 0, world, &config);
        assert_eq!(&prefix.styles()[..world], &styles[..world]);
    }

    // `{` saves a return to state 3 and enters server code; state 3 styles
    // `a` differently from state 1.
    const FRAME: &str = "\
0:1:0:0
10:0
12:1
30:4
31:1:0\t{
33:31
36:3:0
35:2:3
31:1:0\ta
33:4
31:3:0\ta
33:2
31:2:0\t}
33:31
37
";

    #[test]
    fn test_resume_on_nested_line_restores_saved_frame() {
        let store = load("test", FRAME).unwrap();
        assert_eq!(store.resume_frame(), Some(StateFamily::new(3, Family::Markup)));
        let config = Config::default();
        let text = "{\n\n}a";
        let mut doc = MemoryDocument::new(text);
        colorize(&store, &mut doc, 0, 5, &config);
        assert_eq!(styles_of(&doc), vec![SSL_DEFAULT, SSL_DEFAULT, SSL_DEFAULT, SSL_DEFAULT, M_TAGNAME]);

        let restart = find_restart_point(&store, &doc, 2, config.nested_resync_window);
        assert_eq!((restart.pos, restart.depth), (2, 1));
        let mut resumed = MemoryDocument::new(text);
        colorize(&store, &mut resumed, 0, 5, &config);
        colorize(&store, &mut resumed, 2, 3, &config);
        assert_eq!(resumed.styles(), doc.styles());
    }

    #[test]
    fn test_mixed_push_frames_resume_from_top_level() {
        let source = format!("{FRAME}31:1:0\t[\n33:31\n36:1:0\n35:2:3\n");
        let store = load("test", &source).unwrap();
        assert_eq!(store.resume_frame(), None);
        let config = Config::default();
        let text = "{\n\n}a";
        let mut doc = MemoryDocument::new(text);
        colorize(&store, &mut doc, 0, 5, &config);
        let styles = styles_of(&doc);

        assert_eq!(find_restart_point(&store, &doc, 2, config.nested_resync_window).pos, 0);
        colorize(&store, &mut doc, 2, 3, &config);
        assert_eq!(styles_of(&doc), styles);
        assert_eq!(doc.style_at(4), M_TAGNAME);
    }

    #[test]
    fn test_line_states_and_resume() {
        let store = load("test", TEMPLATE).unwrap();
        let config = Config::default();
        let text = "ab\n<%\nx\n%>\ncd\n";
        let mut full = MemoryDocument::new(text);
        let len = full.len();
        colorize(&store, &mut full, 0, len, &config);

        assert_eq!(LineState::unpack(full.line_state(0)).state, 1);
        let inside = LineState::unpack(full.line_state(1));
        assert_eq!((inside.state, inside.depth), (2, 1));
        let after = LineState::unpack(full.line_state(3));
        assert_eq!(after.state, 1);
        assert_eq!(after.depth, 0);

        let mut again = MemoryDocument::new(text);
        colorize(&store, &mut again, 0, len, &config);
        colorize(&store, &mut again, 11, len - 11, &config);
        assert_eq!(again.styles(), full.styles());
        // Resuming inside the block reseeds the stack.
        colorize(&store, &mut again, 6, len - 6, &config);
        assert_eq!(again.styles(), full.styles());
    }
}
