//! Bytecode loader
//!
//! A description is a line-oriented instruction stream:
//!
//! ```text
//! # comment
//! 0:1:0:0
//! 10:0
//! 31:1:0	<%
//! 35:2:3
//! ```
//!
//! Each line is `<opcode>[:<int>...]`, optionally followed by a tab and a
//! literal payload. Opcodes resolve through [`OPS`]; every handler checks
//! its own preconditions. Unknown opcodes are skipped only when the writer
//! is newer than [`LOADER_VERSION`].

use tracing::{debug, warn};

use super::family::Family;
use super::fold::FlipDirection;
use super::line_state::{StateFamily, MAX_STATE};
use super::lookback::{LookBackAction, LookBackMatch, LookBackTest, LookBackTests};
use super::store::{DefinitionStore, FormatVersion};
use super::style::{self, Style};
use super::transition::{DelimiterCapture, MatchKind, StackOp, StateId, Transition, TransitionSlot, TransitionTable};
use crate::error::{LoadError, LoadErrorKind};

/// Highest writer version this loader fully understands
pub const LOADER_VERSION: FormatVersion = (1, 0, 0);

/// One decoded instruction line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: u32,
    pub args: Vec<u32>,
    pub payload: Option<Vec<u8>>,
}

type Handler = fn(&mut Builder, &Instruction) -> Result<(), LoadErrorKind>;

/// Opcode table entry
struct OpSpec {
    code: u32,
    name: &'static str,
    min_args: usize,
    max_args: usize,
    arity: &'static str,
    handler: Handler,
}

macro_rules! op {
    ($code:expr, $name:expr, $min:expr, $max:expr, $arity:expr, $handler:expr) => {
        OpSpec {
            code: $code,
            name: $name,
            min_args: $min,
            max_args: $max,
            arity: $arity,
            handler: $handler,
        }
    };
}

static OPS: &[OpSpec] = &[
    op!(0, "version", 3, 3, "3", op_version),
    op!(1, "language", 0, 0, "0", op_language),
    op!(2, "scratch-append", 0, 0, "0", op_scratch_append),
    op!(3, "scratch-flush", 0, 0, "0", op_scratch_flush),
    op!(10, "select-family", 1, 1, "1", op_select_family),
    op!(11, "family-styles", 3, 3, "3", op_family_styles),
    op!(12, "family-start-state", 1, 1, "1", op_family_start_state),
    op!(13, "family-keywords", 0, 0, "0", op_family_keywords),
    op!(20, "lookback-create", 2, 2, "2", op_lookback_create),
    op!(21, "lookback-default", 2, 2, "2", op_lookback_default),
    op!(22, "lookback-test", 3, 3, "3", op_lookback_test),
    op!(30, "table-size", 1, 1, "1", op_table_size),
    op!(31, "transition", 2, 2, "2", op_transition),
    op!(32, "upto-style", 1, 1, "1", op_upto_style),
    op!(33, "include-style", 1, 1, "1", op_include_style),
    op!(34, "flags", 1, 1, "1", op_flags),
    op!(35, "target", 1, 2, "1..2", op_target),
    op!(36, "push", 2, 2, "2", op_push),
    op!(37, "pop", 0, 0, "0", op_pop),
    op!(38, "eol-target", 1, 2, "1..2", op_eol_target),
    op!(39, "capture-delimiter", 2, 2, "2", op_capture_delimiter),
    op!(40, "keep-delimiter", 0, 0, "0", op_keep_delimiter),
    op!(41, "clear-delimiter", 0, 0, "0", op_clear_delimiter),
    op!(50, "flipper", 2, 2, "2", op_flipper),
];

fn lookup(opcode: u32) -> Option<&'static OpSpec> {
    OPS.iter().find(|spec| spec.code == opcode)
}

/// Load state threaded through the handlers
#[derive(Default)]
struct Builder {
    store: DefinitionStore,
    version: Option<FormatVersion>,
    scratch: Vec<u8>,
    pending: Option<Vec<u8>>,
    family: Option<Family>,
    table_sized: bool,
    current: Option<TransitionSlot>,
}

impl Builder {
    /// String argument: the instruction's own payload, else the flushed
    /// scratch buffer
    fn take_string(&mut self, instr: &Instruction) -> Result<Vec<u8>, LoadErrorKind> {
        instr
            .payload
            .clone()
            .or_else(|| self.pending.take())
            .ok_or(LoadErrorKind::MissingPayload)
    }

    fn family(&self) -> Result<Family, LoadErrorKind> {
        self.family.ok_or(LoadErrorKind::NoFamily)
    }

    fn lookback(&mut self) -> Result<&mut LookBackTests, LoadErrorKind> {
        let family = self.family()?;
        self.store.families[family.index()]
            .lookback
            .as_mut()
            .ok_or(LoadErrorKind::NoLookbackTests)
    }

    fn transition(&mut self) -> Result<&mut Transition, LoadErrorKind> {
        let slot = self.current.ok_or(LoadErrorKind::NoTransition)?;
        self.store.table.get_mut(slot).ok_or(LoadErrorKind::NoTransition)
    }

    /// A state id usable as a target (0 means "stay")
    fn state(&self, raw: u32) -> Result<StateId, LoadErrorKind> {
        if !self.table_sized {
            return Err(LoadErrorKind::NoTransitionTable);
        }
        if (raw as usize) < self.store.table.size() {
            Ok(raw)
        } else {
            Err(LoadErrorKind::StateOutOfRange(raw))
        }
    }
}

fn style_arg(raw: u32) -> Result<Style, LoadErrorKind> {
    if style::is_valid(raw) {
        Ok(raw as Style)
    } else {
        Err(LoadErrorKind::BadStyle(raw))
    }
}

fn family_arg(raw: u32) -> Result<Family, LoadErrorKind> {
    Family::from_index(raw).ok_or(LoadErrorKind::BadFamily(raw))
}

fn flag_arg(raw: u32) -> Result<bool, LoadErrorKind> {
    match raw {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(LoadErrorKind::BadInteger(other.to_string())),
    }
}

fn word_list(bytes: &[u8]) -> Vec<Vec<u8>> {
    bytes
        .split(|b| b.is_ascii_whitespace())
        .filter(|word| !word.is_empty())
        .map(<[u8]>::to_vec)
        .collect()
}

fn op_version(b: &mut Builder, instr: &Instruction) -> Result<(), LoadErrorKind> {
    let version = (instr.args[0], instr.args[1], instr.args[2]);
    b.version = Some(version);
    b.store.version = version;
    Ok(())
}

fn op_language(b: &mut Builder, instr: &Instruction) -> Result<(), LoadErrorKind> {
    let name = b.take_string(instr)?;
    b.store.language = String::from_utf8_lossy(&name).into_owned();
    Ok(())
}

fn op_scratch_append(b: &mut Builder, instr: &Instruction) -> Result<(), LoadErrorKind> {
    let text = instr.payload.as_ref().ok_or(LoadErrorKind::MissingPayload)?;
    b.scratch.extend_from_slice(text);
    Ok(())
}

fn op_scratch_flush(b: &mut Builder, _instr: &Instruction) -> Result<(), LoadErrorKind> {
    b.pending = Some(std::mem::take(&mut b.scratch));
    Ok(())
}

fn op_select_family(b: &mut Builder, instr: &Instruction) -> Result<(), LoadErrorKind> {
    b.family = Some(family_arg(instr.args[0])?);
    Ok(())
}

fn op_family_styles(b: &mut Builder, instr: &Instruction) -> Result<(), LoadErrorKind> {
    let family = b.family()?;
    let identifier = style_arg(instr.args[0])?;
    let keyword = style_arg(instr.args[1])?;
    let operator = style_arg(instr.args[2])?;
    let info = &mut b.store.families[family.index()];
    info.identifier_style = Some(identifier);
    info.keyword_style = Some(keyword);
    info.operator_style = Some(operator);
    Ok(())
}

fn op_family_start_state(b: &mut Builder, instr: &Instruction) -> Result<(), LoadErrorKind> {
    let family = b.family()?;
    let state = instr.args[0];
    if state > MAX_STATE {
        return Err(LoadErrorKind::StateOutOfRange(state));
    }
    b.store.families[family.index()].start_state = state;
    Ok(())
}

fn op_family_keywords(b: &mut Builder, instr: &Instruction) -> Result<(), LoadErrorKind> {
    let family = b.family()?;
    let list = b.take_string(instr)?;
    b.store.families[family.index()].keywords.extend(word_list(&list));
    Ok(())
}

fn op_lookback_create(b: &mut Builder, instr: &Instruction) -> Result<(), LoadErrorKind> {
    let family = b.family()?;
    let lo = style_arg(instr.args[0])?;
    let hi = style_arg(instr.args[1])?;
    if lo > hi {
        return Err(LoadErrorKind::BadStyle(instr.args[1]));
    }
    b.store.families[family.index()].lookback = Some(LookBackTests::new(lo, hi));
    Ok(())
}

fn op_lookback_default(b: &mut Builder, instr: &Instruction) -> Result<(), LoadErrorKind> {
    let style = style_arg(instr.args[0])?;
    let action = LookBackAction::from_code(instr.args[1]).ok_or(LoadErrorKind::BadAction(instr.args[1]))?;
    if b.lookback()?.set_default(style, action) {
        Ok(())
    } else {
        Err(LoadErrorKind::BadStyle(instr.args[0]))
    }
}

fn op_lookback_test(b: &mut Builder, instr: &Instruction) -> Result<(), LoadErrorKind> {
    let style = style_arg(instr.args[0])?;
    let action = LookBackAction::from_code(instr.args[2]).ok_or(LoadErrorKind::BadAction(instr.args[2]))?;
    let kind = match instr.args[1] {
        0 => LookBackMatch::All,
        1 => LookBackMatch::Keywords,
        2 => {
            let literals = word_list(&b.take_string(instr)?);
            if literals.is_empty() {
                return Err(LoadErrorKind::MissingPayload);
            }
            LookBackMatch::Literals(literals)
        }
        other => return Err(LoadErrorKind::BadMatchKind(other)),
    };
    if b.lookback()?.add_test(style, LookBackTest { kind, action }) {
        Ok(())
    } else {
        Err(LoadErrorKind::BadStyle(instr.args[0]))
    }
}

fn op_table_size(b: &mut Builder, instr: &Instruction) -> Result<(), LoadErrorKind> {
    let size = instr.args[0];
    if size > MAX_STATE + 1 {
        return Err(LoadErrorKind::StateOutOfRange(size));
    }
    b.store.table = TransitionTable::with_size(size as usize);
    b.table_sized = true;
    b.current = None;
    Ok(())
}

fn op_transition(b: &mut Builder, instr: &Instruction) -> Result<(), LoadErrorKind> {
    let state = b.state(instr.args[0])?;
    let code = instr.args[1];
    let payload = if MatchKind::needs_payload(code) {
        let text = b.take_string(instr)?;
        if text.is_empty() {
            return Err(LoadErrorKind::MissingPayload);
        }
        Some(text)
    } else {
        None
    };
    let kind = MatchKind::from_code(code, payload).ok_or(LoadErrorKind::BadMatchKind(code))?;
    b.current = b.store.table.add(state, Transition::new(kind));
    b.current
        .map(|_| ())
        .ok_or(LoadErrorKind::StateOutOfRange(state))
}

fn op_upto_style(b: &mut Builder, instr: &Instruction) -> Result<(), LoadErrorKind> {
    let style = style_arg(instr.args[0])?;
    b.transition()?.upto_style = Some(style);
    Ok(())
}

fn op_include_style(b: &mut Builder, instr: &Instruction) -> Result<(), LoadErrorKind> {
    let style = style_arg(instr.args[0])?;
    b.transition()?.include_style = Some(style);
    Ok(())
}

fn op_flags(b: &mut Builder, instr: &Instruction) -> Result<(), LoadErrorKind> {
    b.transition()?.set_flags(instr.args[0]);
    Ok(())
}

fn op_target(b: &mut Builder, instr: &Instruction) -> Result<(), LoadErrorKind> {
    let state = b.state(instr.args[0])?;
    let family = instr.args.get(1).copied().map(family_arg).transpose()?;
    let transition = b.transition()?;
    transition.target = (state != 0).then_some(state);
    transition.target_family = family;
    Ok(())
}

fn op_push(b: &mut Builder, instr: &Instruction) -> Result<(), LoadErrorKind> {
    let state = b.state(instr.args[0])?;
    let family = family_arg(instr.args[1])?;
    b.transition()?.stack = StackOp::Push(StateFamily::new(state, family));
    Ok(())
}

fn op_pop(b: &mut Builder, _instr: &Instruction) -> Result<(), LoadErrorKind> {
    b.transition()?.stack = StackOp::Pop;
    Ok(())
}

fn op_eol_target(b: &mut Builder, instr: &Instruction) -> Result<(), LoadErrorKind> {
    let state = b.state(instr.args[0])?;
    let family = instr.args.get(1).copied().map(family_arg).transpose()?;
    b.transition()?.eol_target = Some((state, family));
    Ok(())
}

fn op_capture_delimiter(b: &mut Builder, instr: &Instruction) -> Result<(), LoadErrorKind> {
    let opposite = flag_arg(instr.args[1])?;
    b.transition()?.capture = Some(DelimiterCapture {
        group: instr.args[0] as usize,
        opposite,
    });
    Ok(())
}

fn op_keep_delimiter(b: &mut Builder, _instr: &Instruction) -> Result<(), LoadErrorKind> {
    b.transition()?.keep_delimiter = true;
    Ok(())
}

fn op_clear_delimiter(b: &mut Builder, _instr: &Instruction) -> Result<(), LoadErrorKind> {
    b.transition()?.clear_delimiter = true;
    Ok(())
}

fn op_flipper(b: &mut Builder, instr: &Instruction) -> Result<(), LoadErrorKind> {
    let style = style_arg(instr.args[0])?;
    let direction = FlipDirection::from_code(instr.args[1]).ok_or(LoadErrorKind::BadAction(instr.args[1]))?;
    let token = b.take_string(instr)?;
    if token.is_empty() {
        return Err(LoadErrorKind::MissingPayload);
    }
    b.store.flippers.add(style, token, direction);
    Ok(())
}

/// Undo payload escapes: `\t`, `\n`, `\r`, `\\`
fn unescape(raw: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut bytes = raw.bytes();
    while let Some(b) = bytes.next() {
        if b != b'\\' {
            out.push(b);
            continue;
        }
        match bytes.next() {
            Some(b't') => out.push(b'\t'),
            Some(b'n') => out.push(b'\n'),
            Some(b'r') => out.push(b'\r'),
            Some(b'\\') => out.push(b'\\'),
            Some(other) => {
                out.push(b'\\');
                out.push(other);
            }
            None => out.push(b'\\'),
        }
    }
    out
}

fn parse_int(field: &str) -> Result<u32, LoadErrorKind> {
    let field = field.trim();
    if field.starts_with('-') {
        return Err(LoadErrorKind::NegativeArgument(field.to_string()));
    }
    field
        .parse::<u32>()
        .map_err(|_| LoadErrorKind::BadInteger(field.to_string()))
}

/// Decode one line; `None` for comments and blank lines
pub fn parse_line(line: &str) -> Result<Option<Instruction>, LoadErrorKind> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    if line.trim().is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let (head, payload) = match line.split_once('\t') {
        Some((head, payload)) => (head, Some(unescape(payload))),
        None => (line, None),
    };
    let mut fields = head.split(':');
    let opcode = match fields.next() {
        Some(field) if !field.trim().is_empty() => parse_int(field)?,
        _ => return Err(LoadErrorKind::BadLine),
    };
    let args = fields.map(parse_int).collect::<Result<Vec<_>, _>>()?;
    Ok(Some(Instruction { opcode, args, payload }))
}

/// Build a store from bytecode text.
///
/// Any failure discards the partial store and reports the line number.
pub fn load(identifier: &str, source: &str) -> Result<DefinitionStore, LoadError> {
    let mut builder = Builder::default();
    builder.store.identifier = identifier.to_string();
    let mut last_line = 0;

    for (idx, text) in source.lines().enumerate() {
        let line_no = idx + 1;
        last_line = line_no;
        let fail = |kind| LoadError::new(line_no, kind);

        let Some(instr) = parse_line(text).map_err(fail)? else {
            continue;
        };

        if builder.version.is_none() && instr.opcode != 0 {
            return Err(fail(LoadErrorKind::MissingVersion));
        }

        let Some(spec) = lookup(instr.opcode) else {
            let writer = builder.version.unwrap_or_default();
            if writer > LOADER_VERSION {
                debug!(opcode = instr.opcode, line = line_no, "skipping opcode from newer writer");
                continue;
            }
            return Err(fail(LoadErrorKind::UnknownOpcode(instr.opcode)));
        };

        if instr.args.len() < spec.min_args || instr.args.len() > spec.max_args {
            return Err(fail(LoadErrorKind::BadArity {
                op: spec.name,
                expected: spec.arity,
                got: instr.args.len(),
            }));
        }

        (spec.handler)(&mut builder, &instr).map_err(fail)?;
    }

    if builder.version.is_none() {
        return Err(LoadError::new(last_line, LoadErrorKind::MissingVersion));
    }

    let mut store = builder.store;
    store.table.compile_patterns();
    store.resume_frame = store.table.uniform_push_frame();
    store.ready = true;
    debug!(
        identifier,
        language = %store.language,
        states = store.table.size(),
        "definition loaded"
    );
    Ok(store)
}

/// Load, or produce a not-ready store carrying the error
pub fn load_or_not_ready(identifier: &str, source: &str) -> DefinitionStore {
    match load(identifier, source) {
        Ok(store) => store,
        Err(err) => {
            warn!(identifier, error = %err, "failed to load definition");
            DefinitionStore::not_ready(identifier, err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::udl::style::{M_DEFAULT, SSL_DEFAULT};

    const SMALL: &str = "\
# two-state server template
0:1:0:0
1\tSmall
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

    #[test]
    fn test_parse_line() {
        assert_eq!(parse_line("# note").unwrap(), None);
        assert_eq!(parse_line("").unwrap(), None);
        assert_eq!(
            parse_line("31:1:0\ta\\tb").unwrap(),
            Some(Instruction {
                opcode: 31,
                args: vec![1, 0],
                payload: Some(b"a\tb".to_vec()),
            })
        );
        assert_eq!(parse_line("35:-1"), Err(LoadErrorKind::NegativeArgument("-1".into())));
        assert_eq!(parse_line("x:1"), Err(LoadErrorKind::BadInteger("x".into())));
        assert_eq!(parse_line(":1"), Err(LoadErrorKind::BadLine));
    }

    #[test]
    fn test_load_small() {
        let store = load("small", SMALL).unwrap();
        assert!(store.is_ready());
        assert_eq!(store.language(), "Small");
        assert_eq!(store.version(), (1, 0, 0));
        assert_eq!(store.family(Family::Markup).start_state, 1);

        let open = &store.transitions(1).unwrap().transitions[0];
        assert_eq!(open.upto_style, Some(M_DEFAULT));
        assert_eq!(open.target, Some(2));
        assert_eq!(open.target_family, Some(Family::ServerScript));
        assert_eq!(open.stack, StackOp::Push(StateFamily::new(0, Family::Markup)));

        let close = &store.transitions(2).unwrap().transitions[0];
        assert_eq!(close.include_style, Some(SSL_DEFAULT));
        assert_eq!(close.stack, StackOp::Pop);
    }

    #[test]
    fn test_scratch_buffer_feeds_keywords() {
        let source = "0:1:0:0\n10:2\n2\tif else \n2\treturn\n3\n13\n";
        let store = load("kw", source).unwrap();
        let info = store.family(Family::ClientScript);
        assert!(info.is_keyword(b"return"));
        assert!(info.is_keyword(b"else"));
        assert!(!info.is_keyword(b"elsereturn"));
    }

    #[test]
    fn test_dependency_order() {
        let err = load("x", "0:1:0:0\n12:1\n").unwrap_err();
        assert_eq!(err, LoadError::new(2, LoadErrorKind::NoFamily));

        let err = load("x", "0:1:0:0\n30:2\n32:3\n").unwrap_err();
        assert_eq!(err, LoadError::new(3, LoadErrorKind::NoTransition));

        let err = load("x", "0:1:0:0\n31:1:0\tx\n").unwrap_err();
        assert_eq!(err, LoadError::new(2, LoadErrorKind::NoTransitionTable));

        let err = load("x", "0:1:0:0\n10:2\n21:22:2\n").unwrap_err();
        assert_eq!(err, LoadError::new(3, LoadErrorKind::NoLookbackTests));
    }

    #[test]
    fn test_bad_arguments() {
        let err = load("x", "0:1:0:0\n30:4\n31:9:0\tx\n").unwrap_err();
        assert_eq!(err.kind, LoadErrorKind::StateOutOfRange(9));

        let err = load("x", "0:1:0:0\n10:1:2\n").unwrap_err();
        assert!(matches!(err.kind, LoadErrorKind::BadArity { op: "select-family", got: 2, .. }));

        let err = load("x", "0:1:0:0\n10:7\n").unwrap_err();
        assert_eq!(err.kind, LoadErrorKind::BadFamily(7));

        let err = load("x", "0:1:0:0\n30:2\n31:1:0\n").unwrap_err();
        assert_eq!(err.kind, LoadErrorKind::MissingPayload);
    }

    #[test]
    fn test_version_gates_unknown_opcodes() {
        let err = load("x", "0:1:0:0\n99:1\n").unwrap_err();
        assert_eq!(err, LoadError::new(2, LoadErrorKind::UnknownOpcode(99)));

        let err = load("x", "0:0:9:0\n99:1\n").unwrap_err();
        assert_eq!(err.kind, LoadErrorKind::UnknownOpcode(99));

        assert!(load("x", "0:1:1:0\n99:1:2:3\n").unwrap().is_ready());
        assert!(load("x", "0:2:0:0\n99\n").unwrap().is_ready());
    }

    #[test]
    fn test_missing_version() {
        assert_eq!(load("x", "10:0\n").unwrap_err(), LoadError::new(1, LoadErrorKind::MissingVersion));
        assert_eq!(load("x", "# empty\n").unwrap_err(), LoadError::new(1, LoadErrorKind::MissingVersion));
    }

    #[test]
    fn test_not_ready_on_failure() {
        let store = load_or_not_ready("broken", "0:1:0:0\nnonsense\n");
        assert!(!store.is_ready());
        assert_eq!(store.load_error().map(|e| e.line), Some(2));
    }

    #[test]
    fn test_bad_regex_loads() {
        let store = load("x", "0:1:0:0\n30:2\n31:1:1\t(oops\n").unwrap();
        assert!(store.is_ready());
        let t = &store.transitions(1).unwrap().transitions[0];
        assert!(matches!(t.kind, MatchKind::Regex { compiled: None, .. }));
    }
}
