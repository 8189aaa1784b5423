//! User-defined functions: a declaration plus the environment captured at
//! the point of definition.

use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use crate::class::LoxInstance;
use crate::environment::Environment;
use crate::interpreter::{Interpreter, Unwind};
use crate::stmt::FunctionDecl;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct LoxFunction {
    declaration: Rc<FunctionDecl>,
    closure: Rc<RefCell<Environment>>,
    is_initializer: bool,
}

impl LoxFunction {
    pub fn new(
        declaration: Rc<FunctionDecl>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    ) -> Self {
        LoxFunction {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &str {
        &self.declaration.name.lexeme
    }

    pub fn arity(&self) -> usize {
        self.declaration.params.len()
    }

    /// Produces the bound form of a method: same declaration, but the
    /// closure gains one scope in which `this` names the instance.  The
    /// method table itself never holds a bound function, so instances do not
    /// leak into their own class.
    pub fn bind(&self, instance: Rc<RefCell<LoxInstance>>) -> LoxFunction {
        debug!("Binding method '{}'", self.name());

        let mut environment = Environment::with_enclosing(Rc::clone(&self.closure));

        environment.define("this", Value::Instance(instance));

        LoxFunction {
            declaration: Rc::clone(&self.declaration),
            closure: Rc::new(RefCell::new(environment)),
            is_initializer: self.is_initializer,
        }
    }

    /// The call protocol: a fresh environment extending the closure, one
    /// binding per parameter, then the body.  A `Return` unwinding out of
    /// the body is consumed here; anything else keeps propagating.
    ///
    /// Initializers ignore the body's result and hand back the bound
    /// instance, even on an explicit bare `return`.
    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
    ) -> Result<Value, Unwind> {
        debug!(
            "Calling '{}' with {} argument(s)",
            self.name(),
            arguments.len()
        );

        let environment = Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            &self.closure,
        ))));

        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            environment.borrow_mut().define(&param.lexeme, argument);
        }

        match interpreter.execute_block(&self.declaration.body, environment) {
            Ok(()) => {
                if self.is_initializer {
                    Ok(Environment::get_at(&self.closure, 0, "this"))
                } else {
                    Ok(Value::Nil)
                }
            }

            Err(Unwind::Return(value)) => {
                if self.is_initializer {
                    Ok(Environment::get_at(&self.closure, 0, "this"))
                } else {
                    Ok(value)
                }
            }

            Err(other) => Err(other),
        }
    }
}
