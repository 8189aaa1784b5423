//! Diagnostic sink shared by every pipeline stage.
//!
//! Scan, parse, and resolve failures are *reported* here and execution keeps
//! going; the pipeline then consults [`Reporter::had_error`] between stages
//! as its pass/fail oracle.  Runtime failures are reported once, at the
//! `interpret` boundary.
//!
//! Formats:
//! - compile-time: `[line N] Error <where>: <msg>` with `<where>` being
//!   ` at end` at EOF, ` at '<lexeme>'` at a token, or empty at a bare line;
//! - runtime: the message, a newline, then `[line N]`.

use std::io::{self, Write};

use log::{debug, info};

use crate::error::LoxError;
use crate::token::Token;

pub struct Reporter {
    sink: Box<dyn Write>,
    had_error: bool,
    had_runtime_error: bool,
}

impl Reporter {
    /// Reporter writing to standard error.
    pub fn new() -> Self {
        Self::with_sink(Box::new(io::stderr()))
    }

    /// Reporter writing to an arbitrary sink.  Tests use shared in-memory
    /// buffers here.
    pub fn with_sink(sink: Box<dyn Write>) -> Self {
        info!("Reporter instantiated");

        Self {
            sink,
            had_error: false,
            had_runtime_error: false,
        }
    }

    /// Diagnostic anchored to a bare source line.
    pub fn error(&mut self, line: usize, message: &str) {
        self.report(line, "", message);
    }

    /// Diagnostic anchored to a specific token.
    pub fn token_error(&mut self, token: &Token, message: &str) {
        if token.is_eof() {
            self.report(token.line, " at end", message);
        } else {
            let location = format!(" at '{}'", token.lexeme);
            self.report(token.line, &location, message);
        }
    }

    pub fn report(&mut self, line: usize, location: &str, message: &str) {
        debug!("Reporting diagnostic: line={}, msg={}", line, message);

        let _ = writeln!(self.sink, "[line {}] Error{}: {}", line, location, message);

        self.had_error = true;
    }

    /// Routes an already-constructed compile-stage error.  Used by the driver
    /// for scanner diagnostics, which carry a line but no token.
    pub fn diagnose(&mut self, error: &LoxError) {
        match error {
            LoxError::Lex { message, line }
            | LoxError::Parse { message, line }
            | LoxError::Resolve { message, line } => self.error(*line, message),

            LoxError::Runtime { message, line } => self.runtime_error(*line, message),

            other => {
                let _ = writeln!(self.sink, "{}", other);
                self.had_error = true;
            }
        }
    }

    /// A runtime failure that unwound to the interpret boundary.
    pub fn runtime_error(&mut self, line: usize, message: &str) {
        debug!("Reporting runtime error: line={}, msg={}", line, message);

        let _ = writeln!(self.sink, "{}\n[line {}]", message, line);

        self.had_runtime_error = true;
    }

    pub fn had_error(&self) -> bool {
        self.had_error
    }

    pub fn had_runtime_error(&self) -> bool {
        self.had_runtime_error
    }

    /// Clears the failure flags.  The REPL calls this between lines so one
    /// bad entry does not poison the session.
    pub fn reset(&mut self) {
        self.had_error = false;
        self.had_runtime_error = false;
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}
