//! Host-owned fiber tokens.
//!
//! A [`Fiber`] backs module-scoped `$`-prefixed variables with storage that
//! belongs to an external execution context. The engine never creates or
//! destroys fibers; it only dereferences `fiber.data(module)[index]` when a
//! fiber variable is read or written. Hosts pass a fiber into
//! [`Instance::execute`](crate::Instance::execute) and may keep any number
//! of them, each with its own view of the same module's fiber variables.

use std::{cell::RefCell, rc::Rc};

use ahash::AHashMap;

use crate::{module::ModuleId, value::Value};

#[derive(Debug, Default)]
pub struct Fiber {
    data: RefCell<AHashMap<ModuleId, Vec<Value>>>,
}

impl Fiber {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub(crate) fn get(&self, module: ModuleId, index: u32) -> Value {
        self.data
            .borrow()
            .get(&module)
            .and_then(|slots| slots.get(index as usize))
            .cloned()
            .unwrap_or(Value::Undefined)
    }

    pub(crate) fn set(&self, module: ModuleId, index: u32, value: Value) {
        let mut data = self.data.borrow_mut();
        let slots = data.entry(module).or_default();
        let index = index as usize;
        if index >= slots.len() {
            slots.resize(index + 1, Value::Undefined);
        }
        slots[index] = value;
    }
}
