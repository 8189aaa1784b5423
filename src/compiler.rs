//! Single-pass bytecode compiler.
//!
//! A Pratt parser pulling tokens straight from the scanner and emitting
//! instructions into a [`Chunk`] as it goes (no AST in between).  Each token
//! type maps to a `{prefix, infix, precedence}` rule; `parse_precedence`
//! consumes one prefix handler, then keeps consuming infix handlers while
//! the next token binds at least as tightly as requested.
//!
//! Errors use panic-mode suppression: the first diagnostic sets `panic_mode`
//! and later ones are swallowed until the parse ends, so one typo does not
//! cascade.  Any diagnostic fails the compile as a whole.

use log::{debug, log_enabled, Level};

use crate::chunk::{Chunk, OpCode};
use crate::debug::disassemble_chunk;
use crate::error::LoxError;
use crate::reporter::Reporter;
use crate::scanner::Scanner;
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Precedence ladder, lowest to highest.  `next()` steps one level up, which
/// is how left-associativity falls out of `binary`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    None,
    Assignment, // =
    Or,         // or
    And,        // and
    Equality,   // == !=
    Comparison, // < > <= >=
    Term,       // + -
    Factor,     // * /
    Unary,      // ! -
    Call,       // . ()
    Primary,
}

impl Precedence {
    fn next(self) -> Precedence {
        match self {
            Precedence::None => Precedence::Assignment,
            Precedence::Assignment => Precedence::Or,
            Precedence::Or => Precedence::And,
            Precedence::And => Precedence::Equality,
            Precedence::Equality => Precedence::Comparison,
            Precedence::Comparison => Precedence::Term,
            Precedence::Term => Precedence::Factor,
            Precedence::Factor => Precedence::Unary,
            Precedence::Unary => Precedence::Call,
            Precedence::Call | Precedence::Primary => Precedence::Primary,
        }
    }
}

type ParseFn<'r> = fn(&mut Compiler<'r>);

struct ParseRule<'r> {
    prefix: Option<ParseFn<'r>>,
    infix: Option<ParseFn<'r>>,
    precedence: Precedence,
}

impl<'r> ParseRule<'r> {
    fn new(prefix: Option<ParseFn<'r>>, infix: Option<ParseFn<'r>>, precedence: Precedence) -> Self {
        ParseRule {
            prefix,
            infix,
            precedence,
        }
    }
}

/// Compiles one expression to a chunk ending in `OP_RETURN`.
pub fn compile(source: &str, reporter: &mut Reporter) -> Result<Chunk, LoxError> {
    let mut compiler = Compiler::new(source, reporter);

    compiler.advance();
    compiler.expression();
    compiler.consume(&TokenType::EOF, "Expect end of expression.");

    compiler.end()
}

struct Compiler<'r> {
    scanner: Scanner,
    previous: Token,
    current: Token,
    chunk: Chunk,
    had_error: bool,
    panic_mode: bool,
    reporter: &'r mut Reporter,
}

impl<'r> Compiler<'r> {
    fn new(source: &str, reporter: &'r mut Reporter) -> Self {
        Compiler {
            scanner: Scanner::new(source),
            previous: Token::eof(1),
            current: Token::eof(1),
            chunk: Chunk::new(),
            had_error: false,
            panic_mode: false,
            reporter,
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Token plumbing
    // ─────────────────────────────────────────────────────────────────────

    /// Steps to the next real token, reporting (and skipping past) any
    /// lexical errors in between.
    fn advance(&mut self) {
        self.previous = std::mem::replace(&mut self.current, Token::eof(1));

        loop {
            match self.scanner.next() {
                Some(Ok(token)) => {
                    self.current = token;
                    break;
                }

                Some(Err(error)) => self.scan_error(&error),

                // The scanner fuses after EOF; only reachable if `advance`
                // is called past the end, which `consume(EOF, …)` prevents.
                None => {
                    self.current = Token::eof(self.previous.line);
                    break;
                }
            }
        }
    }

    fn consume(&mut self, token_type: &TokenType, message: &str) {
        if &self.current.token_type == token_type {
            self.advance();
            return;
        }

        self.error_at_current(message);
    }

    fn expression(&mut self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn parse_precedence(&mut self, precedence: Precedence) {
        self.advance();

        match Self::rule(&self.previous.token_type).prefix {
            Some(prefix) => prefix(self),

            None => {
                self.error("Expect expression.");
                return;
            }
        }

        while precedence <= Self::rule(&self.current.token_type).precedence {
            self.advance();

            if let Some(infix) = Self::rule(&self.previous.token_type).infix {
                infix(self);
            }
        }
    }

    /// The Pratt table.  Token types without a row parse as nothing, which
    /// surfaces as "Expect expression." when one is needed.
    fn rule(token_type: &TokenType) -> ParseRule<'r> {
        match token_type {
            TokenType::LEFT_PAREN => {
                ParseRule::new(Some(Compiler::grouping), None, Precedence::None)
            }

            TokenType::MINUS => {
                ParseRule::new(Some(Compiler::unary), Some(Compiler::binary), Precedence::Term)
            }

            TokenType::PLUS => ParseRule::new(None, Some(Compiler::binary), Precedence::Term),

            TokenType::SLASH | TokenType::STAR => {
                ParseRule::new(None, Some(Compiler::binary), Precedence::Factor)
            }

            TokenType::NUMBER(_) => ParseRule::new(Some(Compiler::number), None, Precedence::None),

            TokenType::FALSE | TokenType::TRUE | TokenType::NIL => {
                ParseRule::new(Some(Compiler::literal), None, Precedence::None)
            }

            TokenType::BANG => ParseRule::new(Some(Compiler::unary), None, Precedence::None),

            TokenType::BANG_EQUAL | TokenType::EQUAL_EQUAL => {
                ParseRule::new(None, Some(Compiler::binary), Precedence::Equality)
            }

            TokenType::GREATER
            | TokenType::GREATER_EQUAL
            | TokenType::LESS
            | TokenType::LESS_EQUAL => {
                ParseRule::new(None, Some(Compiler::binary), Precedence::Comparison)
            }

            _ => ParseRule::new(None, None, Precedence::None),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Prefix and infix handlers
    // ─────────────────────────────────────────────────────────────────────

    fn number(&mut self) {
        if let TokenType::NUMBER(value) = self.previous.token_type {
            let index = self.make_constant(Value::Number(value));

            self.emit_bytes(OpCode::Constant as u8, index);
        }
    }

    fn literal(&mut self) {
        match self.previous.token_type {
            TokenType::FALSE => self.emit_op(OpCode::False),

            TokenType::TRUE => self.emit_op(OpCode::True),

            TokenType::NIL => self.emit_op(OpCode::Nil),

            _ => unreachable!("literal handler only registered for false/true/nil"),
        }
    }

    fn grouping(&mut self) {
        self.expression();
        self.consume(&TokenType::RIGHT_PAREN, "Expect ')' after expression.");
    }

    fn unary(&mut self) {
        let operator = self.previous.token_type.clone();

        // Operand first; the instruction pops its result.
        self.parse_precedence(Precedence::Unary);

        match operator {
            TokenType::MINUS => self.emit_op(OpCode::Negate),

            TokenType::BANG => self.emit_op(OpCode::Not),

            _ => unreachable!("unary handler only registered for '-' and '!'"),
        }
    }

    fn binary(&mut self) {
        let operator = self.previous.token_type.clone();

        // Right operand binds one level tighter: left-associativity.
        let rule = Self::rule(&operator);
        self.parse_precedence(rule.precedence.next());

        match operator {
            // Three comparisons are derived from the other three.
            TokenType::BANG_EQUAL => self.emit_ops(OpCode::Equal, OpCode::Not),

            TokenType::EQUAL_EQUAL => self.emit_op(OpCode::Equal),

            TokenType::GREATER => self.emit_op(OpCode::Greater),

            TokenType::GREATER_EQUAL => self.emit_ops(OpCode::Less, OpCode::Not),

            TokenType::LESS => self.emit_op(OpCode::Less),

            TokenType::LESS_EQUAL => self.emit_ops(OpCode::Greater, OpCode::Not),

            TokenType::PLUS => self.emit_op(OpCode::Add),

            TokenType::MINUS => self.emit_op(OpCode::Subtract),

            TokenType::STAR => self.emit_op(OpCode::Multiply),

            TokenType::SLASH => self.emit_op(OpCode::Divide),

            _ => unreachable!("binary handler only registered for operator tokens"),
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Emission
    // ─────────────────────────────────────────────────────────────────────

    fn emit_byte(&mut self, byte: u8) {
        self.chunk.write(byte, self.previous.line);
    }

    fn emit_bytes(&mut self, first: u8, second: u8) {
        self.emit_byte(first);
        self.emit_byte(second);
    }

    fn emit_op(&mut self, op: OpCode) {
        self.emit_byte(op as u8);
    }

    fn emit_ops(&mut self, first: OpCode, second: OpCode) {
        self.emit_op(first);
        self.emit_op(second);
    }

    fn make_constant(&mut self, value: Value) -> u8 {
        let index = self.chunk.add_constant(value);

        if index > u8::MAX as usize {
            self.error("Too many constants in one chunk.");
            return 0;
        }

        index as u8
    }

    fn end(mut self) -> Result<Chunk, LoxError> {
        self.emit_op(OpCode::Return);

        if self.had_error {
            return Err(LoxError::parse(self.previous.line, "Compile error."));
        }

        if log_enabled!(Level::Debug) {
            debug!("\n{}", disassemble_chunk(&self.chunk, "code"));
        }

        Ok(self.chunk)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Error handling
    // ─────────────────────────────────────────────────────────────────────

    fn error_at_current(&mut self, message: &str) {
        let token = self.current.clone();

        self.error_at(&token, message);
    }

    fn error(&mut self, message: &str) {
        let token = self.previous.clone();

        self.error_at(&token, message);
    }

    fn error_at(&mut self, token: &Token, message: &str) {
        if self.panic_mode {
            return;
        }

        self.panic_mode = true;
        self.had_error = true;

        self.reporter.token_error(token, message);
    }

    /// A lexical error: anchored to a line, not a token.
    fn scan_error(&mut self, error: &LoxError) {
        if self.panic_mode {
            return;
        }

        self.panic_mode = true;
        self.had_error = true;

        self.reporter.diagnose(error);
    }
}
