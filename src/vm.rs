//! Stack virtual machine executing a [`Chunk`].
//!
//! State is deliberately small: the chunk, a byte-indexed instruction
//! pointer, and a value stack capped at [`STACK_MAX`] slots.  Type errors
//! are runtime errors reported against the line table at `ip - 1`; stack
//! over- or underflow means the compiler emitted unbalanced code and is a
//! fatal internal fault.

use std::io::{self, Write};

use log::{debug, info, log_enabled, Level};

use crate::chunk::{Chunk, OpCode};
use crate::compiler;
use crate::debug::disassemble_instruction;
use crate::error::LoxError;
use crate::reporter::Reporter;
use crate::value::Value;

/// Compile-time maximum depth of the value stack.
pub const STACK_MAX: usize = 256;

pub struct Vm {
    stack: Vec<Value>,
    output: Box<dyn Write>,
    errors: Box<dyn Write>,
}

impl Vm {
    pub fn new() -> Self {
        Self::with_sinks(Box::new(io::stdout()), Box::new(io::stderr()))
    }

    /// VM writing results and runtime errors to arbitrary sinks.
    pub fn with_sinks(output: Box<dyn Write>, errors: Box<dyn Write>) -> Self {
        info!("Initializing Vm");

        Vm {
            stack: Vec::with_capacity(STACK_MAX),
            output,
            errors,
        }
    }

    /// Compile and run in one step.  Compile diagnostics go through the
    /// reporter; runtime errors go to the VM's error sink.
    pub fn interpret(&mut self, source: &str, reporter: &mut Reporter) -> Result<(), LoxError> {
        let chunk = compiler::compile(source, reporter)?;

        self.run(&chunk)
    }

    /// The dispatch loop: fetch byte, advance, dispatch.
    pub fn run(&mut self, chunk: &Chunk) -> Result<(), LoxError> {
        self.stack.clear();

        let mut ip: usize = 0;

        loop {
            assert!(ip < chunk.len(), "instruction pointer ran off the chunk");

            if log_enabled!(Level::Debug) {
                let slots: Vec<String> =
                    self.stack.iter().map(|v| format!("[ {} ]", v)).collect();

                let (_, rendered) = disassemble_instruction(chunk, ip);

                debug!("          {}", slots.join(""));
                debug!("{}", rendered);
            }

            let op = OpCode::from_byte(chunk.byte_at(ip))
                .expect("chunk contains only opcodes this VM knows");

            ip += 1;

            match op {
                OpCode::Constant => {
                    let index = chunk.byte_at(ip) as usize;

                    ip += 1;

                    self.push(chunk.constant_at(index).clone());
                }

                OpCode::Nil => self.push(Value::Nil),

                OpCode::True => self.push(Value::Bool(true)),

                OpCode::False => self.push(Value::Bool(false)),

                // Equality is the one binary operator defined on any pair of
                // values.
                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();

                    self.push(Value::Bool(a == b));
                }

                OpCode::Greater => {
                    let (a, b) = self.number_operands(chunk, ip)?;

                    self.push(Value::Bool(a > b));
                }

                OpCode::Less => {
                    let (a, b) = self.number_operands(chunk, ip)?;

                    self.push(Value::Bool(a < b));
                }

                OpCode::Add => {
                    let (a, b) = self.number_operands(chunk, ip)?;

                    self.push(Value::Number(a + b));
                }

                OpCode::Subtract => {
                    let (a, b) = self.number_operands(chunk, ip)?;

                    self.push(Value::Number(a - b));
                }

                OpCode::Multiply => {
                    let (a, b) = self.number_operands(chunk, ip)?;

                    self.push(Value::Number(a * b));
                }

                OpCode::Divide => {
                    let (a, b) = self.number_operands(chunk, ip)?;

                    self.push(Value::Number(a / b));
                }

                OpCode::Not => {
                    let value = self.pop();

                    self.push(Value::Bool(!value.is_truthy()));
                }

                OpCode::Negate => {
                    if !matches!(self.peek(0), Value::Number(_)) {
                        return Err(self.runtime_error(
                            "Operand must be a number.",
                            chunk,
                            ip,
                        ));
                    }

                    if let Value::Number(n) = self.pop() {
                        self.push(Value::Number(-n));
                    }
                }

                OpCode::Return => {
                    let value = self.pop();

                    writeln!(self.output, "{}", value)?;

                    return Ok(());
                }
            }
        }
    }

    /// Pops two numeric operands for an arithmetic or comparison op,
    /// checking types before touching the stack.
    fn number_operands(&mut self, chunk: &Chunk, ip: usize) -> Result<(f64, f64), LoxError> {
        if !matches!(self.peek(0), Value::Number(_)) || !matches!(self.peek(1), Value::Number(_)) {
            return Err(self.runtime_error("Operands must be numbers.", chunk, ip));
        }

        let b = self.pop();
        let a = self.pop();

        match (a, b) {
            (Value::Number(a), Value::Number(b)) => Ok((a, b)),

            _ => unreachable!("operand types were just checked"),
        }
    }

    /// Reports against the line of the instruction that just executed, then
    /// resets the stack so the VM is reusable.
    fn runtime_error(&mut self, message: &str, chunk: &Chunk, ip: usize) -> LoxError {
        let line = chunk.line_at(ip - 1);

        let _ = writeln!(self.errors, "{}", message);
        let _ = writeln!(self.errors, "[line {}] in script", line);

        self.stack.clear();

        LoxError::runtime(line, message)
    }

    fn push(&mut self, value: Value) {
        assert!(self.stack.len() < STACK_MAX, "value stack overflow");

        self.stack.push(value);
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("value stack underflow")
    }

    fn peek(&self, distance: usize) -> &Value {
        &self.stack[self.stack.len() - 1 - distance]
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}
