//! Lexically chained name→value maps.
//!
//! Environments form a tree rooted at the interpreter's single global
//! environment; each closure holds a strong reference to the environment it
//! was defined in, so a node lives as long as the longest-living closure
//! that can still see it.  Shared ownership is `Rc<RefCell<_>>` throughout:
//! the interpreter is single-threaded and environment/instance graphs may be
//! cyclic, so nodes are simply released when the run ends.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::error::LoxError;
use crate::value::Value;

#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Defining never fails: a `var` statement may redefine an existing
    /// name in the same scope.
    pub fn define(&mut self, name: &str, value: Value) {
        debug!("Defining '{}'", name);

        self.values.insert(name.to_string(), value);
    }

    /// Dynamic lookup walking the enclosing chain.  Only the global
    /// environment is ever consulted this way once the resolver has run.
    pub fn get(&self, name: &str, line: usize) -> Result<Value, LoxError> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }

    /// Dynamic assignment walking the enclosing chain.
    pub fn assign(&mut self, name: &str, value: Value, line: usize) -> Result<(), LoxError> {
        if self.values.contains_key(name) {
            self.values.insert(name.to_string(), value);

            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value, line)
        } else {
            Err(LoxError::runtime(
                line,
                format!("Undefined variable '{}'.", name),
            ))
        }
    }

    /// The environment exactly `distance` hops up the enclosing chain.
    ///
    /// The resolver guarantees the chain is at least that deep for every
    /// distance it records, which is why the walk may `expect`.
    pub fn ancestor(env: &Rc<RefCell<Environment>>, distance: usize) -> Rc<RefCell<Environment>> {
        let mut current: Rc<RefCell<Environment>> = Rc::clone(env);

        for _ in 0..distance {
            let next = current
                .borrow()
                .enclosing
                .clone()
                .expect("resolved distance never exceeds the environment chain");

            current = next;
        }

        current
    }

    /// Read from the scope at a resolved distance.
    pub fn get_at(env: &Rc<RefCell<Environment>>, distance: usize, name: &str) -> Value {
        Self::ancestor(env, distance)
            .borrow()
            .values
            .get(name)
            .cloned()
            .expect("resolved variable exists in its resolved scope")
    }

    /// Write to the scope at a resolved distance.
    pub fn assign_at(env: &Rc<RefCell<Environment>>, distance: usize, name: &str, value: Value) {
        Self::ancestor(env, distance)
            .borrow_mut()
            .values
            .insert(name.to_string(), value);
    }
}
