// disasm.rs - bytecode disassembler
// Read-only inverse of emission: walks a buffer instruction by
// instruction and renders one line per opcode. Decoding lengths come
// from the opcode catalog, never from local assumptions.

use crate::opcode::{self, ImmKind};

fn read_i16(code: &[u8], off: usize) -> Option<i16> {
    let bytes = code.get(off..off + 2)?;
    Some(i16::from_le_bytes([bytes[0], bytes[1]]))
}

fn read_i32(code: &[u8], off: usize) -> Option<i32> {
    let bytes = code.get(off..off + 4)?;
    Some(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Disassemble the instruction at `pc`. Returns the rendered line and the
/// number of bytes consumed, or `None` when `pc` is past the end.
///
/// Line shape: `hhhh: MNEMONIC imm`, with the mnemonic left-padded to 8
/// columns. Relative jumps render the signed offset and the resolved
/// target; truncated immediates render a `<trunc-*>` marker and consume
/// the rest of the buffer.
pub fn disassemble_one(code: &[u8], pc: usize) -> Option<(String, usize)> {
    if pc >= code.len() {
        return None;
    }

    let byte = code[pc];
    let (name, imm) = match opcode::lookup(byte) {
        Some(info) => (info.name, info.imm),
        None => ("???", ImmKind::None),
    };

    let mut line = format!("{:04x}: {:<8}", pc, name);
    let mut consumed = 1;

    match imm {
        ImmKind::None => {}
        ImmKind::I8 => match code.get(pc + consumed) {
            Some(&v) => {
                line.push_str(&format!(" {}", v as i8));
                consumed += 1;
            }
            None => {
                line.push_str(" <trunc-i8>");
                consumed = code.len() - pc;
            }
        },
        ImmKind::I16 => match read_i16(code, pc + consumed) {
            Some(v) => {
                line.push_str(&format!(" {}", v));
                consumed += 2;
            }
            None => {
                line.push_str(" <trunc-i16>");
                consumed = code.len() - pc;
            }
        },
        ImmKind::I32 => match read_i32(code, pc + consumed) {
            Some(v) => {
                line.push_str(&format!(" {}", v));
                consumed += 4;
            }
            None => {
                line.push_str(" <trunc-i32>");
                consumed = code.len() - pc;
            }
        },
        ImmKind::Rel16 => match read_i16(code, pc + consumed) {
            Some(off) => {
                let target = pc as i64 + consumed as i64 + 2 + off as i64;
                let sign = if off >= 0 { "+" } else { "" };
                line.push_str(&format!(" {}{} ; -> {:04x}", sign, off, target));
                consumed += 2;
            }
            None => {
                line.push_str(" <trunc-rel16>");
                consumed = code.len() - pc;
            }
        },
        ImmKind::Idx16 => match read_i16(code, pc + consumed) {
            Some(idx) => {
                line.push_str(&format!(" @{}", idx));
                consumed += 2;
            }
            None => {
                line.push_str(" <trunc-idx16>");
                consumed = code.len() - pc;
            }
        },
    }

    Some((line, consumed))
}

/// Disassemble a whole buffer into lines.
pub fn disassemble(code: &[u8]) -> Vec<String> {
    let mut lines = Vec::new();
    let mut pc = 0;
    while let Some((line, consumed)) = disassemble_one(code, pc) {
        lines.push(line);
        if consumed == 0 {
            break;
        }
        pc += consumed;
    }
    lines
}
