// compiler.rs - single-pass Forth-to-bytecode compiler
// One token loop drives everything: keyword dispatch, control-flow
// back-patching, word definitions, and opcode emission. No AST; jumps
// are patched in place as their targets become known.

use crate::context::CompileContext;
use crate::emitter::Emitter;
use crate::error::{CompileError, ErrorKind};
use crate::opcode::Op;
use crate::primitives;
use crate::scanner::{parse_int, IntParse, Span, TokenCursor};

/// Maximum nesting depth for control structures.
pub const MAX_CONTROL_DEPTH: usize = 32;
/// Maximum LEAVEs inside a single DO loop.
pub const MAX_LEAVE_DEPTH: usize = 8;
/// Maximum number of word definitions per compilation.
pub const MAX_WORDS: usize = 256;
/// Maximum word name length in bytes (exclusive bound).
pub const MAX_WORD_NAME_LEN: usize = 64;

/// SYS id emitted for EMIT.
const SYS_EMIT: u8 = 0x30;
/// SYS id emitted for KEY.
const SYS_KEY: u8 = 0x31;

/// A named word definition. The code always ends with RET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordDef {
    pub name: String,
    pub code: Vec<u8>,
}

/// Result of a successful compilation: the main bytecode plus the word
/// definitions encountered, in definition order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompileOutput {
    pub code: Vec<u8>,
    pub words: Vec<WordDef>,
}

/// One open control structure. Back-patch positions are offsets into the
/// emission buffer that was active when the frame was pushed; structural
/// keywords never switch buffers while frames are open, so each frame is
/// resolved against the buffer it was recorded in.
enum ControlFrame {
    If {
        jz_patch: u32,
        /// JMP placeholder recorded by ELSE; None until then.
        else_jmp: Option<u32>,
    },
    Begin {
        begin_addr: u32,
        /// JZ placeholder recorded by WHILE; None until then.
        while_patch: Option<u32>,
    },
    Do {
        do_addr: u32,
        leave_patches: Vec<u32>,
    },
}

struct PendingWord {
    name: String,
    body: Emitter,
}

/// Compile a source string with no external context.
pub fn compile(source: &str) -> Result<CompileOutput, CompileError> {
    compile_with_context(None, source)
}

/// Compile a source string, resolving unknown tokens against `ctx` after
/// the local word table. Word references found in the context emit the
/// context's VM-assigned index verbatim.
pub fn compile_with_context(
    ctx: Option<&CompileContext>,
    source: &str,
) -> Result<CompileOutput, CompileError> {
    Compiler::new(source, ctx)
        .run()
        .map_err(|(kind, offset)| CompileError::at(kind, source, offset))
}

/// Internal error form: kind plus the byte offset it was detected at.
type CResult = Result<(), (ErrorKind, usize)>;

struct Compiler<'a> {
    source: &'a str,
    cursor: TokenCursor<'a>,
    main: Emitter,
    /// The word body under construction between `:` and `;`, if any.
    pending: Option<PendingWord>,
    words: Vec<WordDef>,
    control: Vec<ControlFrame>,
    ctx: Option<&'a CompileContext>,
}

impl<'a> Compiler<'a> {
    fn new(source: &'a str, ctx: Option<&'a CompileContext>) -> Self {
        Compiler {
            source,
            cursor: TokenCursor::new(source),
            main: Emitter::new(),
            pending: None,
            words: Vec::new(),
            control: Vec::new(),
            ctx,
        }
    }

    fn run(mut self) -> Result<CompileOutput, (ErrorKind, usize)> {
        while let Some(span) = self.cursor.next_span() {
            self.dispatch(span)?;
        }

        // Unclosed structures are classified by the top frame.
        if let Some(frame) = self.control.last() {
            return Err((unclosed_kind(frame), self.source.len()));
        }
        if self.pending.is_some() {
            return Err((ErrorKind::UnclosedColon, self.source.len()));
        }

        // Trailing RET, unless the final instruction was an unconditional
        // backward JMP (AGAIN/REPEAT) and the RET would be unreachable.
        if !self.main.tail_is_jmp() {
            self.main.emit_op(Op::Ret);
        }

        Ok(CompileOutput { code: self.main.into_bytes(), words: self.words })
    }

    /// The currently active emission buffer: the pending word body inside
    /// a definition, the main buffer otherwise.
    fn out(&mut self) -> &mut Emitter {
        match &mut self.pending {
            Some(word) => &mut word.body,
            None => &mut self.main,
        }
    }

    /// Ordered dispatch; first match wins.
    fn dispatch(&mut self, span: Span) -> CResult {
        let token = span.token(self.source);
        let upper = token.to_ascii_uppercase();
        match upper.as_str() {
            ":" => self.compile_colon(span),
            ";" => self.compile_semicolon(span),

            "BEGIN" => self.compile_begin(span),
            "DO" => self.compile_do(span),
            "UNTIL" => self.compile_until(span),
            "WHILE" => self.compile_while(span),
            "REPEAT" => self.compile_repeat(span),
            "AGAIN" => self.compile_again(span),
            "LEAVE" => self.compile_leave(span),
            "LOOP" => self.compile_loop(span, false),
            "+LOOP" => self.compile_loop(span, true),
            "IF" => self.compile_if(span),
            "ELSE" => self.compile_else(span),
            "THEN" => self.compile_then(span),
            "EXIT" => {
                self.out().emit_op(Op::Ret);
                Ok(())
            }

            "SYS" => {
                let id = self.read_u8_operand(span, ErrorKind::MissingSysId, ErrorKind::InvalidSysId)?;
                let out = self.out();
                out.emit_op(Op::Sys);
                out.emit_u8(id);
                Ok(())
            }
            "EMIT" => {
                let out = self.out();
                out.emit_op(Op::Sys);
                out.emit_u8(SYS_EMIT);
                Ok(())
            }
            "KEY" => {
                let out = self.out();
                out.emit_op(Op::Sys);
                out.emit_u8(SYS_KEY);
                Ok(())
            }

            "L@" => self.compile_local(span, Op::LGet),
            "L!" => self.compile_local(span, Op::LSet),
            "L>!" => self.compile_local(span, Op::LTee),
            "L++" => self.compile_local(span, Op::LInc),
            "L--" => self.compile_local(span, Op::LDec),

            "RECURSE" => self.compile_recurse(span),

            _ => self.compile_value(span, token, &upper),
        }
    }

    /// Non-keyword tokens: word reference, integer literal, composite,
    /// or plain primitive.
    fn compile_value(&mut self, span: Span, token: &str, upper: &str) -> CResult {
        // User-defined words shadow composites and primitives.
        if let Some(idx) = self.lookup_word(token) {
            let out = self.out();
            out.emit_op(Op::Call);
            out.emit_i16_le(idx as i16);
            return Ok(());
        }

        match parse_int(token) {
            IntParse::Value(value) => {
                let out = self.out();
                out.emit_op(Op::Lit);
                out.emit_i32_le(value);
                return Ok(());
            }
            IntParse::OutOfRange => return Err((ErrorKind::InvalidInteger, span.start)),
            IntParse::NotAnInt => {}
        }

        if self.compile_composite(upper) {
            return Ok(());
        }

        if let Some(op) = primitives::lookup(token) {
            self.out().emit_op(op);
            return Ok(());
        }

        Err((ErrorKind::UnknownToken, span.start))
    }

    /// Local word table first, then the external context. Local indices
    /// are positions in the in-flight word list; context indices are
    /// VM-assigned and emitted verbatim.
    fn lookup_word(&self, token: &str) -> Option<i32> {
        if let Some(i) = self
            .words
            .iter()
            .position(|w| w.name.eq_ignore_ascii_case(token))
        {
            return Some(i as i32);
        }
        self.ctx.and_then(|ctx| ctx.find(token))
    }

    // ========================================================================
    // WORD DEFINITIONS
    // ========================================================================

    fn compile_colon(&mut self, span: Span) -> CResult {
        if self.pending.is_some() {
            return Err((ErrorKind::NestedColon, span.start));
        }
        // A structure opened before ':' cannot be closed inside the
        // definition: its back-patch offsets belong to the main buffer.
        if let Some(frame) = self.control.last() {
            return Err((unclosed_kind(frame), span.start));
        }

        let name_span = match self.cursor.next_span() {
            Some(s) => s,
            None => return Err((ErrorKind::ColonWithoutName, self.source.len())),
        };
        if name_span.len >= MAX_WORD_NAME_LEN {
            return Err((ErrorKind::ColonWithoutName, name_span.start));
        }
        let name = name_span.token(self.source);

        if self.words.iter().any(|w| w.name.eq_ignore_ascii_case(name)) {
            return Err((ErrorKind::DuplicateWord, name_span.start));
        }
        if self.words.len() >= MAX_WORDS {
            return Err((ErrorKind::DictionaryFull, name_span.start));
        }

        self.pending = Some(PendingWord { name: name.to_string(), body: Emitter::new() });
        Ok(())
    }

    fn compile_semicolon(&mut self, span: Span) -> CResult {
        let mut pending = match self.pending.take() {
            Some(word) => word,
            None => return Err((ErrorKind::SemicolonWithoutColon, span.start)),
        };
        // Any structure opened inside the body must be closed before ';',
        // or its patch positions would outlive the body buffer.
        if let Some(frame) = self.control.last() {
            return Err((unclosed_kind(frame), span.start));
        }
        pending.body.emit_op(Op::Ret);
        self.words.push(WordDef { name: pending.name, code: pending.body.into_bytes() });
        Ok(())
    }

    fn compile_recurse(&mut self, span: Span) -> CResult {
        if self.pending.is_none() {
            return Err((ErrorKind::RecurseOutsideWord, span.start));
        }
        // The pending definition will occupy the next free index once its
        // ';' fires; definitions are appended in encounter order.
        let idx = self.words.len() as i16;
        let out = self.out();
        out.emit_op(Op::Call);
        out.emit_i16_le(idx);
        Ok(())
    }

    // ========================================================================
    // CONTROL FLOW
    // ========================================================================

    fn check_depth(&self, span: Span) -> CResult {
        if self.control.len() >= MAX_CONTROL_DEPTH {
            return Err((ErrorKind::ControlDepthExceeded, span.start));
        }
        Ok(())
    }

    fn compile_if(&mut self, span: Span) -> CResult {
        self.check_depth(span)?;
        let out = self.out();
        out.emit_op(Op::Jz);
        let jz_patch = out.here();
        out.emit_i16_le(0);
        self.control.push(ControlFrame::If { jz_patch, else_jmp: None });
        Ok(())
    }

    fn compile_else(&mut self, span: Span) -> CResult {
        let jz_patch = match self.control.last() {
            Some(ControlFrame::If { else_jmp: Some(_), .. }) => {
                return Err((ErrorKind::DuplicateElse, span.start));
            }
            Some(ControlFrame::If { jz_patch, .. }) => *jz_patch,
            _ => return Err((ErrorKind::ElseWithoutIf, span.start)),
        };

        let out = self.out();
        out.emit_op(Op::Jmp);
        let jmp_patch = out.here();
        out.emit_i16_le(0);
        // The IF's JZ now lands here, at the start of the ELSE clause.
        out.backpatch(jz_patch);

        if let Some(ControlFrame::If { else_jmp, .. }) = self.control.last_mut() {
            *else_jmp = Some(jmp_patch);
        }
        Ok(())
    }

    fn compile_then(&mut self, span: Span) -> CResult {
        let patch = match self.control.last() {
            Some(ControlFrame::If { jz_patch, else_jmp }) => else_jmp.unwrap_or(*jz_patch),
            _ => return Err((ErrorKind::ThenWithoutIf, span.start)),
        };
        self.control.pop();
        self.out().backpatch(patch);
        Ok(())
    }

    fn compile_begin(&mut self, span: Span) -> CResult {
        self.check_depth(span)?;
        let begin_addr = self.out().here();
        self.control.push(ControlFrame::Begin { begin_addr, while_patch: None });
        Ok(())
    }

    fn compile_until(&mut self, span: Span) -> CResult {
        let begin_addr = match self.control.last() {
            Some(ControlFrame::Begin { while_patch: Some(_), .. }) => {
                return Err((ErrorKind::UntilAfterWhile, span.start));
            }
            Some(ControlFrame::Begin { begin_addr, .. }) => *begin_addr,
            _ => return Err((ErrorKind::UntilWithoutBegin, span.start)),
        };
        self.out().emit_jump_back(Op::Jz, begin_addr);
        self.control.pop();
        Ok(())
    }

    fn compile_while(&mut self, span: Span) -> CResult {
        match self.control.last() {
            Some(ControlFrame::Begin { while_patch: Some(_), .. }) => {
                return Err((ErrorKind::DuplicateWhile, span.start));
            }
            Some(ControlFrame::Begin { .. }) => {}
            _ => return Err((ErrorKind::WhileWithoutBegin, span.start)),
        }

        let out = self.out();
        out.emit_op(Op::Jz);
        let patch = out.here();
        out.emit_i16_le(0);

        if let Some(ControlFrame::Begin { while_patch, .. }) = self.control.last_mut() {
            *while_patch = Some(patch);
        }
        Ok(())
    }

    fn compile_repeat(&mut self, span: Span) -> CResult {
        let (begin_addr, while_patch) = match self.control.last() {
            Some(ControlFrame::Begin { begin_addr, while_patch }) => match while_patch {
                Some(patch) => (*begin_addr, *patch),
                None => return Err((ErrorKind::RepeatWithoutWhile, span.start)),
            },
            _ => return Err((ErrorKind::RepeatWithoutBegin, span.start)),
        };

        let out = self.out();
        out.emit_jump_back(Op::Jmp, begin_addr);
        // WHILE's JZ exits the loop here, past the backward jump.
        out.backpatch(while_patch);
        out.mark_tail_jmp();
        self.control.pop();
        Ok(())
    }

    fn compile_again(&mut self, span: Span) -> CResult {
        let begin_addr = match self.control.last() {
            Some(ControlFrame::Begin { while_patch: Some(_), .. }) => {
                return Err((ErrorKind::AgainAfterWhile, span.start));
            }
            Some(ControlFrame::Begin { begin_addr, .. }) => *begin_addr,
            _ => return Err((ErrorKind::AgainWithoutBegin, span.start)),
        };
        let out = self.out();
        out.emit_jump_back(Op::Jmp, begin_addr);
        out.mark_tail_jmp();
        self.control.pop();
        Ok(())
    }

    fn compile_do(&mut self, span: Span) -> CResult {
        self.check_depth(span)?;
        // ( limit index -- R: limit index )
        let out = self.out();
        out.emit_op(Op::Swap);
        out.emit_op(Op::Tor);
        out.emit_op(Op::Tor);
        let do_addr = out.here();
        self.control.push(ControlFrame::Do { do_addr, leave_patches: Vec::new() });
        Ok(())
    }

    fn compile_loop(&mut self, span: Span, with_increment: bool) -> CResult {
        let kind = if with_increment { ErrorKind::PLoopWithoutDo } else { ErrorKind::LoopWithoutDo };
        let (do_addr, leave_patches) = match self.control.last() {
            Some(ControlFrame::Do { do_addr, leave_patches }) => (*do_addr, leave_patches.clone()),
            _ => return Err((kind, span.start)),
        };
        self.control.pop();

        let out = self.out();
        // Pop index, add the step (literal 1 for LOOP, stack value for
        // +LOOP), pop limit, compare, and either loop or fall through.
        out.emit_op(Op::FromR);
        if !with_increment {
            out.emit_op(Op::Lit);
            out.emit_i32_le(1);
        }
        out.emit_op(Op::Add);
        out.emit_op(Op::FromR);
        out.emit_op(Op::Over);
        out.emit_op(Op::Over);
        out.emit_op(Op::Lt);
        out.emit_op(Op::Jz);
        let jz_patch = out.here();
        out.emit_i16_le(0);
        out.emit_op(Op::Swap);
        out.emit_op(Op::Tor);
        out.emit_op(Op::Tor);
        out.emit_jump_back(Op::Jmp, do_addr);
        // Exit lands before the DROPs: the copies used by the comparison
        // are still on the stack here.
        out.backpatch(jz_patch);
        out.emit_op(Op::Drop);
        out.emit_op(Op::Drop);
        // LEAVE already unwound the return stack; it exits past the DROPs.
        for patch in leave_patches {
            out.backpatch(patch);
        }
        Ok(())
    }

    fn compile_leave(&mut self, span: Span) -> CResult {
        // LEAVE binds to the innermost DO; frames above it (an IF inside
        // the loop body) are fine.
        let frame_idx = match self
            .control
            .iter()
            .rposition(|f| matches!(f, ControlFrame::Do { .. }))
        {
            Some(idx) => idx,
            None => return Err((ErrorKind::LeaveWithoutDo, span.start)),
        };
        if let ControlFrame::Do { leave_patches, .. } = &self.control[frame_idx] {
            if leave_patches.len() >= MAX_LEAVE_DEPTH {
                return Err((ErrorKind::LeaveDepthExceeded, span.start));
            }
        }

        let out = self.out();
        out.emit_op(Op::FromR);
        out.emit_op(Op::FromR);
        out.emit_op(Op::Drop);
        out.emit_op(Op::Drop);
        out.emit_op(Op::Jmp);
        let patch = out.here();
        out.emit_i16_le(0);

        if let ControlFrame::Do { leave_patches, .. } = &mut self.control[frame_idx] {
            leave_patches.push(patch);
        }
        Ok(())
    }

    // ========================================================================
    // OPERAND-TAKING KEYWORDS
    // ========================================================================

    /// Consume the next raw token as an 8-bit unsigned operand. A missing
    /// token reports at the keyword, a bad one at the operand.
    fn read_u8_operand(
        &mut self,
        keyword: Span,
        missing: ErrorKind,
        invalid: ErrorKind,
    ) -> Result<u8, (ErrorKind, usize)> {
        let span = match self.cursor.next_span() {
            Some(s) => s,
            None => return Err((missing, keyword.start)),
        };
        match parse_int(span.token(self.source)) {
            IntParse::Value(v) if (0..=255).contains(&v) => Ok(v as u8),
            _ => Err((invalid, span.start)),
        }
    }

    fn compile_local(&mut self, span: Span, op: Op) -> CResult {
        let idx =
            self.read_u8_operand(span, ErrorKind::MissingLocalIdx, ErrorKind::InvalidLocalIdx)?;
        let out = self.out();
        out.emit_op(op);
        out.emit_u8(idx);
        Ok(())
    }

    // ========================================================================
    // COMPOSITE PSEUDO-WORDS
    // ========================================================================

    /// Fixed multi-byte expansions. Self-contained: embedded branches use
    /// literal offsets and never touch the control stack. Returns false
    /// if the token is not a composite.
    fn compile_composite(&mut self, upper: &str) -> bool {
        let out = self.out();
        match upper {
            // J copies the enclosing loop's index to the data stack:
            // R> R> R> DUP >R >R >R
            "J" => {
                for _ in 0..3 {
                    out.emit_op(Op::FromR);
                }
                out.emit_op(Op::Dup);
                for _ in 0..3 {
                    out.emit_op(Op::Tor);
                }
            }
            // K reaches one loop further out: R> x5 DUP >R x5
            "K" => {
                for _ in 0..5 {
                    out.emit_op(Op::FromR);
                }
                out.emit_op(Op::Dup);
                for _ in 0..5 {
                    out.emit_op(Op::Tor);
                }
            }
            // ROT ( a b c -- b c a )
            "ROT" => emit_rot(out),
            // NIP ( a b -- b )
            "NIP" => {
                out.emit_op(Op::Swap);
                out.emit_op(Op::Drop);
            }
            // TUCK ( a b -- b a b )
            "TUCK" => {
                out.emit_op(Op::Swap);
                out.emit_op(Op::Over);
            }
            // NEGATE ( n -- -n ): 0 SWAP -
            "NEGATE" => {
                out.emit_op(Op::Lit0);
                out.emit_op(Op::Swap);
                out.emit_op(Op::Sub);
            }
            // ?DUP ( x -- 0 | x x ): DUP DUP JZ +1 DUP
            "?DUP" => {
                out.emit_op(Op::Dup);
                out.emit_op(Op::Dup);
                out.emit_op(Op::Jz);
                out.emit_i16_le(1);
                out.emit_op(Op::Dup);
            }
            // ABS ( n -- |n| ): DUP 0< JZ +3, then the NEGATE sequence
            "ABS" => {
                out.emit_op(Op::Dup);
                out.emit_op(Op::Lit0);
                out.emit_op(Op::Lt);
                out.emit_op(Op::Jz);
                out.emit_i16_le(3);
                out.emit_op(Op::Lit0);
                out.emit_op(Op::Swap);
                out.emit_op(Op::Sub);
            }
            // MIN ( a b -- min ): 2DUP < IF DROP ELSE SWAP DROP THEN
            "MIN" => emit_min_max(out, Op::Lt),
            // MAX ( a b -- max ): same with >
            "MAX" => emit_min_max(out, Op::Gt),
            "0=" => {
                out.emit_op(Op::Lit0);
                out.emit_op(Op::Eq);
            }
            "0<" => {
                out.emit_op(Op::Lit0);
                out.emit_op(Op::Lt);
            }
            "0>" => {
                out.emit_op(Op::Lit0);
                out.emit_op(Op::Gt);
            }
            "2DUP" => {
                out.emit_op(Op::Over);
                out.emit_op(Op::Over);
            }
            "2DROP" => {
                out.emit_op(Op::Drop);
                out.emit_op(Op::Drop);
            }
            // 2SWAP ( a b c d -- c d a b ): ROT >R ROT R>
            "2SWAP" => emit_2swap(out),
            // 2OVER ( a b c d -- a b c d a b ): stash the top pair, copy,
            // restore, then swap pairs into place.
            "2OVER" => {
                out.emit_op(Op::Tor);
                out.emit_op(Op::Tor);
                out.emit_op(Op::Over);
                out.emit_op(Op::Over);
                out.emit_op(Op::FromR);
                out.emit_op(Op::FromR);
                emit_2swap(out);
            }
            // +! ( n addr -- ): DUP >R @ + R> !
            "+!" => {
                out.emit_op(Op::Dup);
                out.emit_op(Op::Tor);
                out.emit_op(Op::Load);
                out.emit_op(Op::Add);
                out.emit_op(Op::FromR);
                out.emit_op(Op::Store);
            }
            "TRUE" => out.emit_op(Op::LitN1),
            "FALSE" => out.emit_op(Op::Lit0),
            _ => return false,
        }
        true
    }
}

/// Error kind for a structure left open at a buffer boundary (':', ';',
/// or end of source).
fn unclosed_kind(frame: &ControlFrame) -> ErrorKind {
    match frame {
        ControlFrame::If { .. } => ErrorKind::UnclosedIf,
        ControlFrame::Do { .. } => ErrorKind::UnclosedDo,
        ControlFrame::Begin { .. } => ErrorKind::UnclosedBegin,
    }
}

fn emit_rot(out: &mut Emitter) {
    out.emit_op(Op::Tor);
    out.emit_op(Op::Swap);
    out.emit_op(Op::FromR);
    out.emit_op(Op::Swap);
}

fn emit_2swap(out: &mut Emitter) {
    emit_rot(out);
    out.emit_op(Op::Tor);
    emit_rot(out);
    out.emit_op(Op::FromR);
}

/// Shared body of MIN and MAX: keep one of the top two depending on the
/// comparison. JZ +4 skips DROP and the JMP; JMP +2 skips SWAP DROP.
fn emit_min_max(out: &mut Emitter, compare: Op) {
    out.emit_op(Op::Over);
    out.emit_op(Op::Over);
    out.emit_op(compare);
    out.emit_op(Op::Jz);
    out.emit_i16_le(4);
    out.emit_op(Op::Drop);
    out.emit_op(Op::Jmp);
    out.emit_i16_le(2);
    out.emit_op(Op::Swap);
    out.emit_op(Op::Drop);
}
