// error.rs - compiler error taxonomy and diagnostics
// Every failure maps to a distinct negative code; success is 0. The
// numeric values are frozen: external tooling compares against them.

use thiserror::Error;

use crate::scanner::{is_space, truncate_bytes};

/// Offending token is capped at 63 bytes in diagnostics.
const MAX_ERROR_TOKEN_LEN: usize = 63;
/// Containing source line is capped at 127 bytes in diagnostics.
const MAX_ERROR_CONTEXT_LEN: usize = 127;

/// Everything that can go wrong during compilation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorKind {
    #[error("unknown token")]
    UnknownToken,
    #[error("invalid integer literal")]
    InvalidInteger,
    #[error("out of memory")]
    OutOfMemory,
    #[error("buffer too small")]
    BufferTooSmall,

    #[error("ELSE without matching IF")]
    ElseWithoutIf,
    #[error("THEN without matching IF")]
    ThenWithoutIf,
    #[error("duplicate ELSE in IF")]
    DuplicateElse,
    #[error("unclosed IF (missing THEN)")]
    UnclosedIf,

    #[error("UNTIL without matching BEGIN")]
    UntilWithoutBegin,
    #[error("WHILE without matching BEGIN")]
    WhileWithoutBegin,
    #[error("REPEAT without matching BEGIN")]
    RepeatWithoutBegin,
    #[error("REPEAT without WHILE")]
    RepeatWithoutWhile,
    #[error("duplicate WHILE in BEGIN")]
    DuplicateWhile,
    #[error("UNTIL after WHILE (use REPEAT)")]
    UntilAfterWhile,
    #[error("AGAIN without matching BEGIN")]
    AgainWithoutBegin,
    #[error("AGAIN after WHILE (use REPEAT)")]
    AgainAfterWhile,
    #[error("unclosed BEGIN (missing UNTIL, REPEAT, or AGAIN)")]
    UnclosedBegin,

    #[error("LOOP without matching DO")]
    LoopWithoutDo,
    #[error("+LOOP without matching DO")]
    PLoopWithoutDo,
    #[error("LEAVE outside DO loop")]
    LeaveWithoutDo,
    #[error("too many LEAVEs in one DO loop")]
    LeaveDepthExceeded,
    #[error("unclosed DO (missing LOOP)")]
    UnclosedDo,

    #[error("nested word definition")]
    NestedColon,
    #[error("missing or invalid word name after ':'")]
    ColonWithoutName,
    #[error("';' outside word definition")]
    SemicolonWithoutColon,
    #[error("duplicate word definition")]
    DuplicateWord,
    #[error("word dictionary full")]
    DictionaryFull,
    #[error("unclosed word definition (missing ';')")]
    UnclosedColon,
    #[error("RECURSE outside word definition")]
    RecurseOutsideWord,

    #[error("control structures nested too deeply")]
    ControlDepthExceeded,

    #[error("missing system call id after SYS")]
    MissingSysId,
    #[error("invalid system call id (expected 0..255)")]
    InvalidSysId,
    #[error("missing local variable index")]
    MissingLocalIdx,
    #[error("invalid local variable index (expected 0..255)")]
    InvalidLocalIdx,
}

impl ErrorKind {
    /// The frozen ABI error code. Success is 0; every kind is a distinct
    /// negative integer.
    pub fn code(self) -> i32 {
        match self {
            ErrorKind::UnknownToken => -1,
            ErrorKind::InvalidInteger => -2,
            ErrorKind::OutOfMemory => -3,
            ErrorKind::BufferTooSmall => -4,
            ErrorKind::ElseWithoutIf => -5,
            ErrorKind::ThenWithoutIf => -6,
            ErrorKind::DuplicateElse => -7,
            ErrorKind::UnclosedIf => -8,
            ErrorKind::UntilWithoutBegin => -9,
            ErrorKind::WhileWithoutBegin => -10,
            ErrorKind::RepeatWithoutBegin => -11,
            ErrorKind::RepeatWithoutWhile => -12,
            ErrorKind::DuplicateWhile => -13,
            ErrorKind::UntilAfterWhile => -14,
            ErrorKind::AgainWithoutBegin => -15,
            ErrorKind::AgainAfterWhile => -16,
            ErrorKind::UnclosedBegin => -17,
            ErrorKind::LoopWithoutDo => -18,
            ErrorKind::PLoopWithoutDo => -19,
            ErrorKind::LeaveWithoutDo => -20,
            ErrorKind::LeaveDepthExceeded => -21,
            ErrorKind::UnclosedDo => -22,
            ErrorKind::NestedColon => -23,
            ErrorKind::ColonWithoutName => -24,
            ErrorKind::SemicolonWithoutColon => -25,
            ErrorKind::DuplicateWord => -26,
            ErrorKind::DictionaryFull => -27,
            ErrorKind::UnclosedColon => -28,
            ErrorKind::RecurseOutsideWord => -29,
            ErrorKind::ControlDepthExceeded => -30,
            ErrorKind::MissingSysId => -31,
            ErrorKind::InvalidSysId => -32,
            ErrorKind::MissingLocalIdx => -33,
            ErrorKind::InvalidLocalIdx => -34,
        }
    }
}

/// Where in the source an error happened, with enough surrounding text to
/// render a diagnostic without re-reading the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcePosition {
    /// Byte offset of the offending token (or end of source).
    pub offset: usize,
    /// 1-based line number.
    pub line: u32,
    /// 1-based column in bytes since the last newline.
    pub column: u32,
    /// The offending token, capped at 63 bytes.
    pub token: String,
    /// The containing source line, capped at 127 bytes.
    pub context: String,
}

/// A compilation failure: the error kind plus, when known, the source
/// position it was detected at.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct CompileError {
    kind: ErrorKind,
    position: Option<SourcePosition>,
}

impl CompileError {
    /// Build an error anchored at a byte offset into `source`.
    pub fn at(kind: ErrorKind, source: &str, offset: usize) -> Self {
        CompileError { kind, position: Some(locate(source, offset)) }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The frozen ABI code for this error's kind.
    pub fn code(&self) -> i32 {
        self.kind.code()
    }

    pub fn position(&self) -> Option<&SourcePosition> {
        self.position.as_ref()
    }

    /// Render the multi-line diagnostic:
    ///
    /// ```text
    /// Error: <message> at line <L>, column <C>
    ///   <context line>
    ///       ^~~~~~
    /// ```
    ///
    /// The caret sits under the first byte of the offending token, tildes
    /// under the remainder. Without a position only the first line is
    /// produced.
    pub fn format(&self) -> String {
        let mut out = String::new();
        match &self.position {
            Some(pos) if pos.line > 0 && pos.column > 0 => {
                out.push_str(&format!(
                    "Error: {} at line {}, column {}\n",
                    self.kind, pos.line, pos.column
                ));
                if !pos.context.is_empty() {
                    out.push_str(&format!("  {}\n", pos.context));
                    out.push_str("  ");
                    for _ in 1..pos.column {
                        out.push(' ');
                    }
                    out.push('^');
                    for _ in 1..pos.token.len().max(1) {
                        out.push('~');
                    }
                    out.push('\n');
                }
            }
            _ => {
                out.push_str(&format!("Error: {}\n", self.kind));
            }
        }
        out
    }
}

/// Compute line, column, offending token, and containing line for a byte
/// offset. Line counts newlines before the offset; column is byte-based.
fn locate(source: &str, offset: usize) -> SourcePosition {
    let offset = offset.min(source.len());
    let bytes = source.as_bytes();

    let mut line: u32 = 1;
    let mut line_start = 0;
    for (i, &b) in bytes[..offset].iter().enumerate() {
        if b == b'\n' {
            line += 1;
            line_start = i + 1;
        }
    }
    let column = (offset - line_start) as u32 + 1;

    // Longest non-whitespace run around the offset.
    let mut tok_start = offset;
    while tok_start > 0 && !is_space(bytes[tok_start - 1]) {
        tok_start -= 1;
    }
    let mut tok_end = offset;
    while tok_end < bytes.len() && !is_space(bytes[tok_end]) {
        tok_end += 1;
    }
    let token = truncate_bytes(&source[tok_start..tok_end], MAX_ERROR_TOKEN_LEN).to_string();

    // Containing line: previous newline (or start) to next newline (or end).
    let mut ctx_end = offset;
    while ctx_end < bytes.len() && bytes[ctx_end] != b'\n' {
        ctx_end += 1;
    }
    let context = truncate_bytes(&source[line_start..ctx_end], MAX_ERROR_CONTEXT_LEN).to_string();

    SourcePosition { offset, line, column, token, context }
}
