//! Pipeline driver: scan → parse → resolve → interpret.
//!
//! One [`Lox`] value owns the interpreter and the diagnostic reporter, so a
//! REPL session keeps its globals between lines and tests can swap both
//! sinks for in-memory buffers.  The driver never executes a program that
//! produced a scan, parse, or resolve diagnostic.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;

use log::{debug, info, log_enabled, Level};

use crate::ast_printer::AstPrinter;
use crate::error::{LoxError, Result};
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::reporter::Reporter;
use crate::resolver::Resolver;
use crate::scanner::Scanner;
use crate::stmt::Stmt;
use crate::token::Token;

/// How a run ended; the binary maps these onto exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    CompileError,
    RuntimeError,
}

pub struct Lox {
    interpreter: Interpreter,
    reporter: Reporter,
    next_expr_id: u32,
}

impl Lox {
    /// Driver wired to stdout/stderr.
    pub fn new() -> Self {
        Lox {
            interpreter: Interpreter::new(),
            reporter: Reporter::new(),
            next_expr_id: 0,
        }
    }

    /// Driver with injected sinks, for tests.
    pub fn with_sinks(output: Box<dyn Write>, errors: Box<dyn Write>) -> Self {
        Lox {
            interpreter: Interpreter::with_output(output),
            reporter: Reporter::with_sink(errors),
            next_expr_id: 0,
        }
    }

    pub fn run_file(&mut self, path: &Path) -> Result<Outcome> {
        info!("Running file {}", path.display());

        let bytes: Vec<u8> = fs::read(path)?;
        let source: String = String::from_utf8(bytes)?;

        Ok(self.run(&source))
    }

    /// Interactive prompt: one line at a time against the same interpreter,
    /// so definitions persist.  Diagnostics never end the session.
    pub fn run_prompt(&mut self) -> Result<()> {
        info!("Starting REPL");

        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            write!(stdout, "> ")?;
            stdout.flush()?;

            let mut line = String::new();

            if stdin.lock().read_line(&mut line)? == 0 {
                // EOF ends the session cleanly.
                return Ok(());
            }

            self.run(&line);
            self.reset();
        }
    }

    /// Clears sticky failure flags so the next [`run`](Lox::run) starts
    /// fresh.  The REPL does this between lines.
    pub fn reset(&mut self) {
        self.reporter.reset();
    }

    /// Runs one source text through the full pipeline.
    pub fn run(&mut self, source: &str) -> Outcome {
        // 1. Scan.  Lexical errors are reported and scanning continues, so
        //    one bad character still yields tokens for the rest.
        let mut tokens: Vec<Token> = Vec::new();

        for item in Scanner::new(source) {
            match item {
                Ok(token) => tokens.push(token),

                Err(error) => self.reporter.diagnose(&error),
            }
        }

        // 2. Parse.  Expression ids continue across runs so the resolution
        //    map never aliases entries from an earlier REPL line.
        let mut parser =
            Parser::new(tokens, &mut self.reporter).starting_ids(self.next_expr_id);

        let statements: Vec<Stmt> = parser.parse();

        self.next_expr_id = parser.next_id();

        if log_enabled!(Level::Debug) {
            for stmt in &statements {
                if let Stmt::Expression(expr) | Stmt::Print(expr) = stmt {
                    debug!("AST: {}", AstPrinter::print(expr));
                }
            }
        }

        if self.reporter.had_error() {
            return Outcome::CompileError;
        }

        // 3. Resolve.  Records binding distances into the interpreter and
        //    surfaces scope misuse.
        Resolver::new(&mut self.interpreter, &mut self.reporter).resolve(&statements);

        if self.reporter.had_error() {
            return Outcome::CompileError;
        }

        // 4. Execute.  The compile stages were clean, so any diagnostic
        //    raised from here on is a runtime failure (this includes I/O
        //    failures writing `print` output).
        self.interpreter.interpret(&statements, &mut self.reporter);

        if self.reporter.had_runtime_error() || self.reporter.had_error() {
            return Outcome::RuntimeError;
        }

        Outcome::Success
    }
}

impl Default for Lox {
    fn default() -> Self {
        Self::new()
    }
}

/// Exit code for an outcome, following the `sysexits` convention: 65 for
/// compile-stage failures, 70 for runtime failures.
pub fn exit_code(outcome: Outcome) -> i32 {
    match outcome {
        Outcome::Success => 0,
        Outcome::CompileError => 65,
        Outcome::RuntimeError => 70,
    }
}

/// Exit code for an error that escaped the pipeline (I/O and encoding
/// problems reading the script itself).
pub fn error_exit_code(error: &LoxError) -> i32 {
    match error {
        LoxError::Io(_) | LoxError::Utf8(_) => 74,
        LoxError::Runtime { .. } => 70,
        _ => 65,
    }
}
