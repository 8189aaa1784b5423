//! Tree-walking evaluator.
//!
//! Executes a resolved statement list against a chain of environments.  Two
//! environment handles are kept: `globals` (the root, consulted whenever the
//! resolver recorded no distance for a reference) and `environment` (the
//! innermost active scope).  Runtime failures and `return` both unwind as an
//! [`Unwind`], but only call boundaries consume the `Return` arm; a failure
//! keeps going until [`Interpreter::interpret`] reports it and stops the
//! batch.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::{self, Write};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, info};

use crate::class::{LoxClass, LoxInstance};
use crate::environment::Environment;
use crate::error::LoxError;
use crate::expr::{Expr, ExprId, LiteralValue};
use crate::function::LoxFunction;
use crate::reporter::Reporter;
use crate::stmt::{FunctionDecl, Stmt};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Non-linear exits from statement execution.  `Return` is ordinary control
/// flow consumed at the nearest call boundary; `Fail` is a runtime error on
/// its way to the interpret boundary.
#[derive(Debug)]
pub enum Unwind {
    Return(Value),
    Fail(LoxError),
}

impl From<LoxError> for Unwind {
    fn from(error: LoxError) -> Self {
        Unwind::Fail(error)
    }
}

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    locals: HashMap<ExprId, usize>,
    output: Box<dyn Write>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_output(Box::new(io::stdout()))
    }

    /// Interpreter writing `print` output to an arbitrary sink.
    pub fn with_output(output: Box<dyn Write>) -> Self {
        info!("Initializing Interpreter");

        let globals = Rc::new(RefCell::new(Environment::new()));

        globals.borrow_mut().define(
            "clock",
            Value::NativeFunction {
                name: "clock",
                arity: 0,
                func: clock_native,
            },
        );

        Interpreter {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            output,
        }
    }

    /// Records a resolved scope distance for one expression occurrence.
    /// Called back by the resolver; references without an entry fall through
    /// to the global environment.
    pub fn note_local(&mut self, id: ExprId, depth: usize) {
        self.locals.insert(id, depth);
    }

    /// Runs each statement in order.  A runtime failure is reported once and
    /// stops the rest of the batch.
    pub fn interpret(&mut self, statements: &[Stmt], reporter: &mut Reporter) {
        info!("Interpreting {} statement(s)", statements.len());

        for stmt in statements {
            match self.execute(stmt) {
                Ok(()) => {}

                Err(Unwind::Fail(LoxError::Runtime { message, line })) => {
                    reporter.runtime_error(line, &message);
                    return;
                }

                Err(Unwind::Fail(other)) => {
                    reporter.diagnose(&other);
                    return;
                }

                Err(Unwind::Return(_)) => {
                    // The resolver rejects top-level `return`, so this arm is
                    // unreachable for any program that passed resolution.
                    debug!("Top-level return escaped to interpret boundary");
                    return;
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Statement execution
    // ─────────────────────────────────────────────────────────────────────

    fn execute(&mut self, stmt: &Stmt) -> Result<(), Unwind> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;

                Ok(())
            }

            Stmt::Print(expr) => {
                let value: Value = self.evaluate(expr)?;

                writeln!(self.output, "{}", value).map_err(LoxError::from)?;

                Ok(())
            }

            Stmt::Var { name, initializer } => {
                let value: Value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                self.environment.borrow_mut().define(&name.lexeme, value);

                Ok(())
            }

            Stmt::Function(declaration) => {
                // The closure captures the environment active at the
                // declaration, which makes recursion and counters work.
                let function = LoxFunction::new(
                    Rc::clone(declaration),
                    Rc::clone(&self.environment),
                    false,
                );

                self.environment
                    .borrow_mut()
                    .define(&declaration.name.lexeme, Value::Function(Rc::new(function)));

                Ok(())
            }

            Stmt::Block(statements) => {
                let environment = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
                    &self.environment,
                ))));

                self.execute_block(statements, environment)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)?;
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)?;
                }

                Ok(())
            }

            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    self.execute(body)?;
                }

                Ok(())
            }

            Stmt::Return { value, .. } => {
                let value: Value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };

                Err(Unwind::Return(value))
            }

            Stmt::Class {
                name,
                superclass,
                methods,
            } => self.execute_class(name, superclass.as_ref(), methods),
        }
    }

    /// Executes `statements` inside `environment`, restoring the previous
    /// environment on every exit path (normal completion, runtime failure,
    /// or a `return` unwinding through the block).
    pub fn execute_block(
        &mut self,
        statements: &[Stmt],
        environment: Rc<RefCell<Environment>>,
    ) -> Result<(), Unwind> {
        let previous: Rc<RefCell<Environment>> =
            std::mem::replace(&mut self.environment, environment);

        let mut result: Result<(), Unwind> = Ok(());

        for stmt in statements {
            result = self.execute(stmt);

            if result.is_err() {
                break;
            }
        }

        self.environment = previous;

        result
    }

    fn execute_class(
        &mut self,
        name: &Token,
        superclass: Option<&Expr>,
        methods: &[Rc<FunctionDecl>],
    ) -> Result<(), Unwind> {
        debug!("Declaring class '{}'", name.lexeme);

        // 1. Evaluate the superclass expression, if any; it must name a
        //    class at runtime.
        let superclass: Option<Rc<LoxClass>> = match superclass {
            Some(expr) => {
                let line = superclass_line(expr, name);

                match self.evaluate(expr)? {
                    Value::Class(class) => Some(class),

                    _ => {
                        return Err(
                            LoxError::runtime(line, "Superclass must be a class.").into()
                        );
                    }
                }
            }

            None => None,
        };

        // 2. Two-phase definition so methods can refer to the class by name.
        self.environment.borrow_mut().define(&name.lexeme, Value::Nil);

        // 3. With a superclass, methods close over one extra scope in which
        //    `super` names it.
        let defining_env: Rc<RefCell<Environment>> = match &superclass {
            Some(class) => {
                let mut env = Environment::with_enclosing(Rc::clone(&self.environment));

                env.define("super", Value::Class(Rc::clone(class)));

                Rc::new(RefCell::new(env))
            }

            None => Rc::clone(&self.environment),
        };

        // 4. Build the method table in source order; `init` is the
        //    initializer.
        let mut method_table: HashMap<String, LoxFunction> = HashMap::new();

        for method in methods {
            let is_initializer = method.name.lexeme == "init";

            let function =
                LoxFunction::new(Rc::clone(method), Rc::clone(&defining_env), is_initializer);

            method_table.insert(method.name.lexeme.clone(), function);
        }

        let class = LoxClass::new(name.lexeme.clone(), superclass, method_table);

        // 5. Close the two-phase definition.
        self.environment
            .borrow_mut()
            .assign(&name.lexeme, Value::Class(Rc::new(class)), name.line)?;

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────
    // Expression evaluation
    // ─────────────────────────────────────────────────────────────────────

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value, Unwind> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Number(n) => Value::Number(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::True => Value::Bool(true),
                LiteralValue::False => Value::Bool(false),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary { operator, right } => self.evaluate_unary(operator, right),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left_value: Value = self.evaluate(left)?;

                // Short-circuiting hands back the operand itself, untouched.
                match operator.token_type {
                    TokenType::OR if left_value.is_truthy() => Ok(left_value),

                    TokenType::AND if !left_value.is_truthy() => Ok(left_value),

                    _ => self.evaluate(right),
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::Assign { id, name, value } => {
                let value: Value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => {
                        Environment::assign_at(
                            &self.environment,
                            distance,
                            &name.lexeme,
                            value.clone(),
                        );
                    }

                    None => {
                        self.globals.borrow_mut().assign(
                            &name.lexeme,
                            value.clone(),
                            name.line,
                        )?;
                    }
                }

                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => self.evaluate_call(callee, paren, arguments),

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => Ok(LoxInstance::get(&instance, name)?),

                _ => Err(LoxError::runtime(
                    name.line,
                    "Only instances have properties.",
                )
                .into()),
            },

            Expr::Set {
                object,
                name,
                value,
            } => match self.evaluate(object)? {
                Value::Instance(instance) => {
                    let value: Value = self.evaluate(value)?;

                    instance.borrow_mut().set(name, value.clone());

                    Ok(value)
                }

                _ => Err(LoxError::runtime(name.line, "Only instances have fields.").into()),
            },

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Super {
                id,
                keyword,
                method,
            } => self.evaluate_super(*id, keyword, method),
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, right: &Expr) -> Result<Value, Unwind> {
        let value: Value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::MINUS => match value {
                Value::Number(n) => Ok(Value::Number(-n)),

                _ => Err(LoxError::runtime(operator.line, "Operand must be a number.").into()),
            },

            TokenType::BANG => Ok(Value::Bool(!value.is_truthy())),

            _ => unreachable!("parser only emits '!' and '-' unary operators"),
        }
    }

    fn evaluate_binary(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> Result<Value, Unwind> {
        let left_value: Value = self.evaluate(left)?;
        let right_value: Value = self.evaluate(right)?;

        match operator.token_type {
            TokenType::PLUS => match (left_value, right_value) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),

                (Value::String(a), Value::String(b)) => Ok(Value::String(a + &b)),

                _ => Err(LoxError::runtime(
                    operator.line,
                    "Operands must be two numbers or two strings.",
                )
                .into()),
            },

            TokenType::MINUS => {
                let (a, b) = self.number_operands(left_value, right_value, operator)?;

                Ok(Value::Number(a - b))
            }

            TokenType::STAR => {
                let (a, b) = self.number_operands(left_value, right_value, operator)?;

                Ok(Value::Number(a * b))
            }

            // Division by zero is not an error: IEEE-754 gives back an
            // infinity (or NaN for 0/0).
            TokenType::SLASH => {
                let (a, b) = self.number_operands(left_value, right_value, operator)?;

                Ok(Value::Number(a / b))
            }

            TokenType::GREATER => {
                let (a, b) = self.number_operands(left_value, right_value, operator)?;

                Ok(Value::Bool(a > b))
            }

            TokenType::GREATER_EQUAL => {
                let (a, b) = self.number_operands(left_value, right_value, operator)?;

                Ok(Value::Bool(a >= b))
            }

            TokenType::LESS => {
                let (a, b) = self.number_operands(left_value, right_value, operator)?;

                Ok(Value::Bool(a < b))
            }

            TokenType::LESS_EQUAL => {
                let (a, b) = self.number_operands(left_value, right_value, operator)?;

                Ok(Value::Bool(a <= b))
            }

            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left_value == right_value)),

            TokenType::BANG_EQUAL => Ok(Value::Bool(left_value != right_value)),

            _ => unreachable!("parser only emits arithmetic and comparison binary operators"),
        }
    }

    fn number_operands(
        &self,
        left: Value,
        right: Value,
        operator: &Token,
    ) -> Result<(f64, f64), Unwind> {
        match (left, right) {
            (Value::Number(a), Value::Number(b)) => Ok((a, b)),

            _ => Err(LoxError::runtime(operator.line, "Operands must be numbers.").into()),
        }
    }

    fn evaluate_call(
        &mut self,
        callee: &Expr,
        paren: &Token,
        arguments: &[Expr],
    ) -> Result<Value, Unwind> {
        let callee_value: Value = self.evaluate(callee)?;

        // Arguments evaluate left to right, before the callable check.
        let mut argument_values: Vec<Value> = Vec::with_capacity(arguments.len());

        for argument in arguments {
            argument_values.push(self.evaluate(argument)?);
        }

        match callee_value {
            Value::Function(function) => {
                self.check_arity(function.arity(), argument_values.len(), paren)?;

                function.call(self, argument_values)
            }

            Value::Class(class) => {
                self.check_arity(class.arity(), argument_values.len(), paren)?;

                let instance = Rc::new(RefCell::new(LoxInstance::new(Rc::clone(&class))));

                // Construction runs `init` bound to the fresh instance; the
                // instance is the call's value either way.
                if let Some(initializer) = class.find_method("init") {
                    initializer
                        .bind(Rc::clone(&instance))
                        .call(self, argument_values)?;
                }

                Ok(Value::Instance(instance))
            }

            Value::NativeFunction { arity, func, name } => {
                debug!("Calling native '{}'", name);

                self.check_arity(arity, argument_values.len(), paren)?;

                func(&argument_values)
                    .map_err(|message| LoxError::runtime(paren.line, message).into())
            }

            _ => {
                Err(LoxError::runtime(paren.line, "Can only call functions and classes.").into())
            }
        }
    }

    fn check_arity(&self, arity: usize, got: usize, paren: &Token) -> Result<(), Unwind> {
        if arity != got {
            return Err(LoxError::runtime(
                paren.line,
                format!("Expected {} arguments but got {}.", arity, got),
            )
            .into());
        }

        Ok(())
    }

    fn evaluate_super(
        &mut self,
        id: ExprId,
        keyword: &Token,
        method: &Token,
    ) -> Result<Value, Unwind> {
        let distance: usize = *self
            .locals
            .get(&id)
            .expect("resolver records a distance for every 'super' it accepts");

        // `super` lives at the recorded distance; the implicit `this` scope
        // sits directly inside it.
        let superclass: Rc<LoxClass> =
            match Environment::get_at(&self.environment, distance, "super") {
                Value::Class(class) => class,

                _ => unreachable!("'super' scope always holds a class"),
            };

        let instance: Rc<RefCell<LoxInstance>> =
            match Environment::get_at(&self.environment, distance - 1, "this") {
                Value::Instance(instance) => instance,

                _ => unreachable!("'this' scope always holds an instance"),
            };

        match superclass.find_method(&method.lexeme) {
            Some(found) => Ok(Value::Function(Rc::new(found.bind(instance)))),

            None => Err(LoxError::runtime(
                keyword.line,
                format!("Undefined property '{}'.", method.lexeme),
            )
            .into()),
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value, Unwind> {
        match self.locals.get(&id) {
            Some(&distance) => Ok(Environment::get_at(
                &self.environment,
                distance,
                &name.lexeme,
            )),

            None => Ok(self.globals.borrow().get(&name.lexeme, name.line)?),
        }
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Extracts the line of the superclass name for error anchoring; the parser
/// only ever stores an `Expr::Variable` there.
fn superclass_line(expr: &Expr, class_name: &Token) -> usize {
    match expr {
        Expr::Variable { name, .. } => name.line,
        _ => class_name.line,
    }
}

/// The one built-in: seconds since the Unix epoch, as a Lox number.
fn clock_native(_args: &[Value]) -> Result<Value, String> {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| format!("Clock error: {}", e))?
        .as_secs_f64();

    Ok(Value::Number(timestamp))
}
