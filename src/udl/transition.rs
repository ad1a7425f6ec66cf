//! Transitions and the per-state transition table
//!
//! A state owns an ordered list of transitions, plus optional "empty"
//! (nothing else matched) and end-of-buffer fallbacks.

use regex::bytes::{Regex, RegexBuilder};
use tracing::warn;

use super::family::Family;
use super::line_state::StateFamily;
use super::style::Style;

/// Automaton state id; 0 means "no transition" / stay
pub type StateId = u32;

/// How a transition recognises its input
#[derive(Debug, Clone)]
pub enum MatchKind {
    /// Direct byte comparison
    Literal(Vec<u8>),
    /// Pattern that must match starting at the cursor. It sees the whole
    /// current line, so `^` and `\b` judge the text before the cursor.
    /// `compiled` is `None` for patterns that failed to compile.
    Regex {
        source: String,
        compiled: Option<Regex>,
    },
    /// Fallback taken when no other transition matched
    Empty,
    /// Taken once when lexing reaches the end of the buffer
    EndOfBuffer,
    /// Matches the current captured delimiter
    Delimiter,
}

impl MatchKind {
    pub fn from_code(code: u32, payload: Option<Vec<u8>>) -> Option<Self> {
        match code {
            0 => Some(MatchKind::Literal(payload.unwrap_or_default())),
            1 => Some(MatchKind::Regex {
                source: String::from_utf8_lossy(&payload.unwrap_or_default()).into_owned(),
                compiled: None,
            }),
            2 => Some(MatchKind::Empty),
            3 => Some(MatchKind::EndOfBuffer),
            4 => Some(MatchKind::Delimiter),
            _ => None,
        }
    }

    /// Whether the kind takes a pattern payload
    pub fn needs_payload(code: u32) -> bool {
        code <= 1
    }
}

/// Where the automaton goes after a transition fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StackOp {
    #[default]
    None,
    /// Save this continuation (state 0 saves the current state), then
    /// move to the transition's own target
    Push(StateFamily),
    Pop,
}

/// Extraction of a closing delimiter from a regex capture group
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimiterCapture {
    pub group: usize,
    /// Store the bracket-opposite of the captured text (`(` becomes `)`)
    pub opposite: bool,
}

/// A single match-and-act rule
#[derive(Debug, Clone)]
pub struct Transition {
    pub kind: MatchKind,
    pub upto_style: Option<Style>,
    pub include_style: Option<Style>,
    pub redo: bool,
    pub no_keyword: bool,
    pub lookback: bool,
    pub ignore_case: bool,
    /// `None` stays in the current state
    pub target: Option<StateId>,
    pub target_family: Option<Family>,
    pub stack: StackOp,
    /// Deferred switch applied when the scan crosses the next line boundary
    pub eol_target: Option<(StateId, Option<Family>)>,
    pub capture: Option<DelimiterCapture>,
    pub keep_delimiter: bool,
    pub clear_delimiter: bool,
}

impl Transition {
    pub fn new(kind: MatchKind) -> Self {
        Self {
            kind,
            upto_style: None,
            include_style: None,
            redo: false,
            no_keyword: false,
            lookback: false,
            ignore_case: false,
            target: None,
            target_family: None,
            stack: StackOp::None,
            eol_target: None,
            capture: None,
            keep_delimiter: false,
            clear_delimiter: false,
        }
    }

    pub const FLAG_REDO: u32 = 1;
    pub const FLAG_NO_KEYWORD: u32 = 2;
    pub const FLAG_LOOKBACK: u32 = 4;
    pub const FLAG_IGNORE_CASE: u32 = 8;

    pub fn set_flags(&mut self, flags: u32) {
        self.redo = flags & Self::FLAG_REDO != 0;
        self.no_keyword = flags & Self::FLAG_NO_KEYWORD != 0;
        self.lookback = flags & Self::FLAG_LOOKBACK != 0;
        self.ignore_case = flags & Self::FLAG_IGNORE_CASE != 0;
    }

    /// Compile a regex pattern; failures leave the rule dead
    fn compile(&mut self) {
        let ignore_case = self.ignore_case;
        if let MatchKind::Regex { source, compiled } = &mut self.kind {
            match RegexBuilder::new(source)
                .case_insensitive(ignore_case)
                .build()
            {
                Ok(regex) => *compiled = Some(regex),
                Err(err) => {
                    warn!(pattern = %source, error = %err, "regex failed to compile; rule disabled");
                    *compiled = None;
                }
            }
        }
    }

    /// Match a literal against the text at `pos`
    pub fn match_literal(literal: &[u8], text: impl Fn(usize) -> u8, pos: usize, ignore_case: bool) -> bool {
        literal.iter().enumerate().all(|(i, &expected)| {
            let actual = text(pos + i);
            if ignore_case {
                actual.eq_ignore_ascii_case(&expected)
            } else {
                actual == expected
            }
        })
    }

    /// Match the compiled regex at `offset` within `line`.
    ///
    /// Returns the match length and, if this transition captures a
    /// delimiter, the (possibly bracket-flipped) captured text.
    pub fn match_regex(&self, line: &[u8], offset: usize) -> Option<(usize, Option<Vec<u8>>)> {
        let MatchKind::Regex {
            compiled: Some(regex),
            ..
        } = &self.kind
        else {
            return None;
        };
        if offset > line.len() {
            return None;
        }
        // Leftmost-first: a match starting at `offset` is the one an
        // anchored search would pick.
        match self.capture {
            None => regex
                .find_at(line, offset)
                .filter(|m| m.start() == offset)
                .map(|m| (m.end() - offset, None)),
            Some(capture) => {
                let caps = regex.captures_at(line, offset)?;
                let whole = caps.get(0)?;
                if whole.start() != offset {
                    return None;
                }
                let len = whole.end() - offset;
                // A group that did not participate captures nothing.
                let text = caps.get(capture.group).map_or_else(Vec::new, |m| {
                    let bytes = m.as_bytes();
                    if capture.opposite {
                        bytes.iter().map(|&b| bracket_opposite(b)).collect()
                    } else {
                        bytes.to_vec()
                    }
                });
                Some((len, Some(text)))
            }
        }
    }
}

/// Swap an ASCII bracket for its partner; other bytes are unchanged
pub fn bracket_opposite(byte: u8) -> u8 {
    match byte {
        b'(' => b')',
        b')' => b'(',
        b'[' => b']',
        b']' => b'[',
        b'{' => b'}',
        b'}' => b'{',
        b'<' => b'>',
        b'>' => b'<',
        other => other,
    }
}

/// All transitions of one state
#[derive(Debug, Default)]
pub struct StateTransitions {
    pub transitions: Vec<Transition>,
    pub empty: Option<Transition>,
    pub eof: Option<Transition>,
}

/// Handle to a transition inside the table, used by the loader to apply
/// modifier instructions to the most recently created transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionSlot {
    Regular(StateId, usize),
    Empty(StateId),
    Eof(StateId),
}

/// Transition lists indexed by state id
#[derive(Debug, Default)]
pub struct TransitionTable {
    states: Vec<Option<StateTransitions>>,
}

impl TransitionTable {
    pub fn with_size(size: usize) -> Self {
        let mut states = Vec::with_capacity(size);
        states.resize_with(size, || None);
        Self { states }
    }

    pub fn size(&self) -> usize {
        self.states.len()
    }

    /// Transitions of a state, `None` if the state declared none
    pub fn get(&self, state: StateId) -> Option<&StateTransitions> {
        self.states.get(state as usize)?.as_ref()
    }

    /// Add a transition; returns `None` if the state is out of range
    pub fn add(&mut self, state: StateId, transition: Transition) -> Option<TransitionSlot> {
        let entry = self
            .states
            .get_mut(state as usize)?
            .get_or_insert_with(StateTransitions::default);
        let slot = match transition.kind {
            MatchKind::Empty => {
                entry.empty = Some(transition);
                TransitionSlot::Empty(state)
            }
            MatchKind::EndOfBuffer => {
                entry.eof = Some(transition);
                TransitionSlot::Eof(state)
            }
            _ => {
                entry.transitions.push(transition);
                TransitionSlot::Regular(state, entry.transitions.len() - 1)
            }
        };
        Some(slot)
    }

    pub fn get_mut(&mut self, slot: TransitionSlot) -> Option<&mut Transition> {
        match slot {
            TransitionSlot::Regular(state, idx) => self.entry_mut(state)?.transitions.get_mut(idx),
            TransitionSlot::Empty(state) => self.entry_mut(state)?.empty.as_mut(),
            TransitionSlot::Eof(state) => self.entry_mut(state)?.eof.as_mut(),
        }
    }

    fn entry_mut(&mut self, state: StateId) -> Option<&mut StateTransitions> {
        self.states.get_mut(state as usize)?.as_mut()
    }

    /// The frame every push in the table saves, if they all save the same
    /// one. A push saving state 0 saves the state that owns it.
    pub fn uniform_push_frame(&self) -> Option<StateFamily> {
        let mut frame = None;
        for (state, entry) in self.states.iter().enumerate() {
            let Some(entry) = entry else {
                continue;
            };
            let all = entry.transitions.iter().chain(&entry.empty).chain(&entry.eof);
            for transition in all {
                let StackOp::Push(saved) = transition.stack else {
                    continue;
                };
                let state = if saved.state == 0 { state as StateId } else { saved.state };
                let saved = StateFamily::new(state, saved.family);
                match frame {
                    None => frame = Some(saved),
                    Some(existing) if existing == saved => {}
                    Some(_) => return None,
                }
            }
        }
        frame
    }

    /// Compile every regex pattern once the table is complete
    pub fn compile_patterns(&mut self) {
        for entry in self.states.iter_mut().flatten() {
            for transition in entry.transitions.iter_mut() {
                transition.compile();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regex_transition(pattern: &str) -> Transition {
        Transition::new(MatchKind::from_code(1, Some(pattern.as_bytes().to_vec())).unwrap())
    }

    #[test]
    fn test_literal_match() {
        let text = b"a<%b";
        let at = |i: usize| text.get(i).copied().unwrap_or(0);
        assert!(Transition::match_literal(b"<%", at, 1, false));
        assert!(!Transition::match_literal(b"<%", at, 0, false));
        assert!(!Transition::match_literal(b"b%>", at, 3, false));
        let upper = b"SELECT";
        let at = |i: usize| upper.get(i).copied().unwrap_or(0);
        assert!(Transition::match_literal(b"select", at, 0, true));
    }

    #[test]
    fn test_regex_is_anchored() {
        let mut table = TransitionTable::with_size(2);
        table.add(1, regex_transition(r"[0-9]+")).unwrap();
        table.compile_patterns();
        let t = &table.get(1).unwrap().transitions[0];
        assert_eq!(t.match_regex(b"ab12", 2), Some((2, None)));
        assert_eq!(t.match_regex(b"ab12", 0), None);
    }

    #[test]
    fn test_regex_sees_text_before_cursor() {
        let mut table = TransitionTable::with_size(2);
        table.add(1, regex_transition(r"\bin\b")).unwrap();
        table.add(1, regex_transition(r"^#")).unwrap();
        table.compile_patterns();
        let word = &table.get(1).unwrap().transitions[0];
        assert_eq!(word.match_regex(b"xin ", 1), None);
        assert_eq!(word.match_regex(b"x in ", 2), Some((2, None)));
        let hash = &table.get(1).unwrap().transitions[1];
        assert_eq!(hash.match_regex(b"#a", 0), Some((1, None)));
        assert_eq!(hash.match_regex(b"a#", 1), None);
    }

    #[test]
    fn test_regex_capture_mid_line() {
        let mut t = regex_transition(r"<<(\w+)");
        t.capture = Some(DelimiterCapture { group: 1, opposite: false });
        t.compile();
        assert_eq!(t.match_regex(b"x <<EOT", 2), Some((5, Some(b"EOT".to_vec()))));
        assert_eq!(t.match_regex(b"x <<EOT", 0), None);
    }

    #[test]
    fn test_regex_capture_opposite() {
        let mut t = regex_transition(r"q([(\[])");
        t.capture = Some(DelimiterCapture { group: 1, opposite: true });
        t.compile();
        assert_eq!(t.match_regex(b"q(abc)", 0), Some((2, Some(b")".to_vec()))));
    }

    #[test]
    fn test_bad_regex_is_dead() {
        let mut t = regex_transition(r"(unclosed");
        t.compile();
        assert!(matches!(t.kind, MatchKind::Regex { compiled: None, .. }));
        assert_eq!(t.match_regex(b"(unclosed", 0), None);
    }

    #[test]
    fn test_uniform_push_frame() {
        let mut table = TransitionTable::with_size(4);
        assert_eq!(table.uniform_push_frame(), None);

        let mut open = Transition::new(MatchKind::Literal(b"{".to_vec()));
        open.stack = StackOp::Push(StateFamily::new(0, Family::Markup));
        table.add(1, open.clone());
        let mut again = Transition::new(MatchKind::Literal(b"[".to_vec()));
        again.stack = StackOp::Push(StateFamily::new(1, Family::Markup));
        table.add(1, again);
        assert_eq!(table.uniform_push_frame(), Some(StateFamily::new(1, Family::Markup)));

        // The same push from another state saves a different frame.
        table.add(3, open);
        assert_eq!(table.uniform_push_frame(), None);
    }

    #[test]
    fn test_slots() {
        let mut table = TransitionTable::with_size(3);
        assert_eq!(table.add(1, Transition::new(MatchKind::Empty)), Some(TransitionSlot::Empty(1)));
        assert_eq!(table.add(3, Transition::new(MatchKind::Empty)), None);
        let slot = table.add(2, Transition::new(MatchKind::Literal(b"x".to_vec()))).unwrap();
        table.get_mut(slot).unwrap().upto_style = Some(4);
        assert_eq!(table.get(2).unwrap().transitions[0].upto_style, Some(4));
        assert!(table.get(0).is_none());
    }
}
