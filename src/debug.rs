//! Chunk disassembler.
//!
//! Renders to a `String` rather than printing, so the compiler can route the
//! listing through `log` and tests can assert on it.  Format, per
//! instruction: a 4-digit byte offset, the source line (or `|` when the line
//! repeats), the mnemonic, and any operand.

use std::fmt::Write;

use crate::chunk::{Chunk, OpCode};

pub fn disassemble_chunk(chunk: &Chunk, name: &str) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "== {} ==", name);

    let mut offset: usize = 0;

    while offset < chunk.len() {
        let (next, line) = disassemble_instruction(chunk, offset);

        let _ = writeln!(out, "{}", line);

        offset = next;
    }

    out
}

/// Disassembles the instruction at `offset`, returning the offset of the
/// next instruction and the rendered line.
pub fn disassemble_instruction(chunk: &Chunk, offset: usize) -> (usize, String) {
    let mut line = format!("{:04} ", offset);

    if offset > 0 && chunk.line_at(offset) == chunk.line_at(offset - 1) {
        line.push_str("   | ");
    } else {
        let _ = write!(line, "{:4} ", chunk.line_at(offset));
    }

    let byte = chunk.byte_at(offset);

    match OpCode::from_byte(byte) {
        Some(OpCode::Constant) => {
            let index = chunk.byte_at(offset + 1) as usize;

            if index < chunk.constant_count() {
                let _ = write!(
                    line,
                    "{:<16} {:4} '{}'",
                    OpCode::Constant.name(),
                    index,
                    chunk.constant_at(index)
                );
            } else {
                let _ = write!(
                    line,
                    "{:<16} {:4} <out of bounds>",
                    OpCode::Constant.name(),
                    index
                );
            }

            (offset + 2, line)
        }

        Some(op) => {
            line.push_str(op.name());

            (offset + 1, line)
        }

        None => {
            let _ = write!(line, "Unknown opcode {}", byte);

            (offset + 1, line)
        }
    }
}
