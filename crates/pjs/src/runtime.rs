//! The [`Runtime`]: an explicit handle around the two pieces of otherwise
//! process-global state — the string interner and the class registry.
//!
//! Keeping them behind a handle instead of hidden statics means several
//! independent runtimes can coexist in one process and the pool is trivial
//! to inspect from tests. Registry keys are append-only during startup and
//! read-only afterwards; steady-state lookups take no locks (the engine is
//! single-threaded per instance).

use std::{
    cell::{OnceCell, RefCell},
    rc::Rc,
};

use ahash::AHashMap;

use crate::{
    builtins::{self, CoreClasses},
    class::{ClassRef, Method},
    intern::{Interner, StringId},
    object::{ArrayData, FunctionData, ObjRef, Payload},
    scope::Frame,
    value::Value,
};

pub struct Runtime {
    interner: RefCell<Interner>,
    classes: RefCell<AHashMap<String, ClassRef>>,
    core: OnceCell<CoreClasses>,
}

impl Runtime {
    /// Creates a runtime with the core classes (`Object`, `Array`,
    /// `Boolean`, `Number`, `String`, `Function`, `Int`) registered.
    pub fn new() -> Rc<Self> {
        let rt = Rc::new(Self {
            interner: RefCell::new(Interner::new()),
            classes: RefCell::new(AHashMap::new()),
            core: OnceCell::new(),
        });
        let core = builtins::install(&rt);
        assert!(rt.core.set(core).is_ok(), "core classes installed twice");
        rt
    }

    pub fn intern(&self, text: &str) -> StringId {
        self.interner.borrow_mut().intern(text)
    }

    pub fn str(&self, id: StringId) -> Rc<str> {
        self.interner.borrow().get(id)
    }

    /// Number of interned strings, for diagnostics.
    pub fn interned_count(&self) -> usize {
        self.interner.borrow().len()
    }

    pub(crate) fn register_class(&self, class: &ClassRef) {
        self.classes.borrow_mut().insert(class.name().to_owned(), Rc::clone(class));
    }

    /// Looks a class up by its registered name.
    pub fn class_named(&self, name: &str) -> Option<ClassRef> {
        self.classes.borrow().get(name).cloned()
    }

    fn core(&self) -> &CoreClasses {
        self.core.get().expect("runtime core classes not installed")
    }

    pub fn object_class(&self) -> ClassRef {
        Rc::clone(&self.core().object)
    }

    pub fn array_class(&self) -> ClassRef {
        Rc::clone(&self.core().array)
    }

    pub fn boolean_class(&self) -> ClassRef {
        Rc::clone(&self.core().boolean)
    }

    pub fn number_class(&self) -> ClassRef {
        Rc::clone(&self.core().number)
    }

    pub fn string_class(&self) -> ClassRef {
        Rc::clone(&self.core().string)
    }

    pub fn function_class(&self) -> ClassRef {
        Rc::clone(&self.core().function)
    }

    pub fn int_class(&self) -> ClassRef {
        Rc::clone(&self.core().int)
    }

    /// A plain `{}` object.
    pub fn new_object(&self) -> ObjRef {
        ObjRef::new(&self.core().object)
    }

    /// An array over the given elements.
    pub fn new_array(&self, elems: Vec<Value>) -> ObjRef {
        ObjRef::with_payload(&self.core().array, Payload::Array(ArrayData::from_values(elems)))
    }

    pub(crate) fn new_array_with(&self, data: ArrayData) -> ObjRef {
        ObjRef::with_payload(&self.core().array, Payload::Array(data))
    }

    pub(crate) fn new_int(&self, n: num_bigint::BigInt) -> ObjRef {
        ObjRef::with_payload(&self.core().int, Payload::Int(n))
    }

    pub(crate) fn box_boolean(&self, b: bool) -> ObjRef {
        ObjRef::with_payload(&self.core().boolean, Payload::Boolean(b))
    }

    pub(crate) fn box_number(&self, n: f64) -> ObjRef {
        ObjRef::with_payload(&self.core().number, Payload::Number(n))
    }

    pub(crate) fn box_string(&self, s: StringId) -> ObjRef {
        ObjRef::with_payload(&self.core().string, Payload::String(s))
    }

    /// A function object dispatching to `method` with a fixed `this`
    /// (how method fields materialise on property access).
    pub(crate) fn make_bound_function(&self, method: &Rc<Method>, this: Value) -> ObjRef {
        self.make_function(method, this, None)
    }

    /// A function object with an explicit captured scope (closures).
    pub(crate) fn make_function(&self, method: &Rc<Method>, this: Value, scope: Option<Rc<Frame>>) -> ObjRef {
        ObjRef::with_payload(
            &self.core().function,
            Payload::Function(FunctionData {
                method: Rc::clone(method),
                this,
                scope,
            }),
        )
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("interned", &self.interner.borrow().len())
            .field("classes", &self.classes.borrow().len())
            .finish()
    }
}
