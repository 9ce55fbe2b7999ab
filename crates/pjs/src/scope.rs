//! Compile-time scopes and runtime frames.
//!
//! A [`TreeScope`] is the per-lexical-region descriptor built during the
//! declaration pass: ordered argument and variable names, fiber-variable
//! indices, and the hoisted function initialisers that run when the scope
//! is instantiated. All of a module's scopes live in one [`ScopeArena`]
//! shared (via `Rc`) with every function the module defines, so closures
//! keep their descriptors alive after the call returns.
//!
//! A [`Frame`] is the runtime instantiation: one slot per argument and
//! local. Slots flagged as closure-captured survive [`Frame::clear`]; the
//! rest reset to `undefined` when the call unwinds.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use crate::{expr::FunctionNode, intern::StringId, value::Value};

/// Index of a scope inside its module's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ScopeId(u32);

impl ScopeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScopeKind {
    Module,
    Function,
    Catch,
    Block,
    Label,
    Switch,
    Loop,
}

impl ScopeKind {
    /// Scopes that materialise a runtime frame and act as hoisting roots.
    pub fn is_root(self) -> bool {
        matches!(self, Self::Module | Self::Function)
    }
}

/// One variable slot descriptor, shared between the compile-time scope and
/// the frames it stamps out.
#[derive(Debug)]
pub(crate) struct VarDesc {
    pub name: StringId,
    /// Set during resolution when the variable is read from below its
    /// defining function scope; such slots survive `Frame::clear`.
    pub is_closure: Cell<bool>,
    /// For fiber variables: index into the module's fiber-variable table.
    /// Fiber descriptors sit past the frame slot range.
    pub fiber_index: Option<u32>,
}

/// A hoisted initialiser: a function declaration whose value is installed
/// when the owning scope is instantiated, before the body runs.
#[derive(Debug)]
pub(crate) struct HoistedInit {
    pub name: StringId,
    pub func: Rc<FunctionNode>,
    /// Slot index, computed at finalisation.
    pub slot: Cell<usize>,
}

#[derive(Debug)]
pub(crate) struct TreeScope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub label: Option<StringId>,
    args: Vec<StringId>,
    vars: Vec<StringId>,
    fiber_vars: Vec<(StringId, u32)>,
    hoisted: Vec<HoistedInit>,
    variables: Vec<VarDesc>,
    size: usize,
    finalized: bool,
}

impl TreeScope {
    fn new(kind: ScopeKind, parent: Option<ScopeId>, label: Option<StringId>) -> Self {
        Self {
            kind,
            parent,
            label,
            args: Vec::new(),
            vars: Vec::new(),
            fiber_vars: Vec::new(),
            hoisted: Vec::new(),
            variables: Vec::new(),
            size: 0,
            finalized: false,
        }
    }

    /// Declares the next positional argument. Destructuring parameters
    /// reserve their slot under the empty-string sentinel.
    pub fn add_arg(&mut self, name: StringId) -> usize {
        debug_assert!(!self.finalized);
        let index = self.args.len();
        self.args.push(name);
        index
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    /// Declares a variable, merging silently with an existing declaration
    /// of the same name (the later hoisted initialiser wins).
    pub fn declare_var(&mut self, name: StringId, init: Option<Rc<FunctionNode>>) {
        debug_assert!(!self.finalized);
        if let Some(func) = init {
            if let Some(existing) = self.hoisted.iter_mut().find(|h| h.name == name) {
                existing.func = func;
            } else {
                self.hoisted.push(HoistedInit {
                    name,
                    func,
                    slot: Cell::new(0),
                });
            }
        }
        if !self.vars.contains(&name) && !self.args.contains(&name) {
            self.vars.push(name);
        }
    }

    /// Declares a `$`-prefixed variable backed by fiber storage. The
    /// caller allocates the module fiber index only when
    /// [`TreeScope::binds`] reports the name as new.
    pub fn declare_fiber_var(&mut self, name: StringId, index: u32) {
        debug_assert!(!self.finalized);
        debug_assert!(!self.binds(name));
        self.fiber_vars.push((name, index));
    }

    /// Whether this scope already binds `name` as an argument, variable or
    /// fiber variable.
    pub fn binds(&self, name: StringId) -> bool {
        self.vars.contains(&name)
            || self.args.contains(&name)
            || self.fiber_vars.iter().any(|(n, _)| *n == name)
    }

    /// Freezes the name lists into slot descriptors: arguments first, then
    /// locals, with fiber descriptors appended past the frame range.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.size = self.args.len() + self.vars.len();
        self.variables = self
            .args
            .iter()
            .chain(self.vars.iter())
            .map(|&name| VarDesc {
                name,
                is_closure: Cell::new(false),
                fiber_index: None,
            })
            .collect();
        for &(name, index) in &self.fiber_vars {
            self.variables.push(VarDesc {
                name,
                is_closure: Cell::new(false),
                fiber_index: Some(index),
            });
        }
        for init in &self.hoisted {
            let slot = self
                .args
                .iter()
                .chain(self.vars.iter())
                .position(|&n| n == init.name)
                .expect("hoisted initialiser names a declared variable");
            init.slot.set(slot);
        }
        self.finalized = true;
    }

    pub fn size(&self) -> usize {
        debug_assert!(self.finalized);
        self.size
    }

    pub fn variables(&self) -> &[VarDesc] {
        debug_assert!(self.finalized);
        &self.variables
    }

    pub fn hoisted(&self) -> &[HoistedInit] {
        &self.hoisted
    }
}

/// All compile-time scopes of one module, shared with its functions.
#[derive(Debug, Default)]
pub(crate) struct ScopeArena {
    scopes: RefCell<Vec<TreeScope>>,
}

impl ScopeArena {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn alloc(&self, kind: ScopeKind, parent: Option<ScopeId>, label: Option<StringId>) -> ScopeId {
        let mut scopes = self.scopes.borrow_mut();
        let id = ScopeId(u32::try_from(scopes.len()).expect("scope arena overflow"));
        scopes.push(TreeScope::new(kind, parent, label));
        id
    }

    pub fn with<R>(&self, id: ScopeId, f: impl FnOnce(&TreeScope) -> R) -> R {
        f(&self.scopes.borrow()[id.index()])
    }

    pub fn with_mut<R>(&self, id: ScopeId, f: impl FnOnce(&mut TreeScope) -> R) -> R {
        f(&mut self.scopes.borrow_mut()[id.index()])
    }

    /// Finalises every scope; called once between declaration and
    /// resolution.
    pub fn finalize_all(&self) {
        for scope in self.scopes.borrow_mut().iter_mut() {
            scope.finalize();
        }
    }

    /// Walks the parent chain from `id` looking for the nearest scope
    /// matching the predicate.
    pub fn climb(&self, id: ScopeId, pred: impl Fn(&TreeScope) -> bool) -> Option<ScopeId> {
        let scopes = self.scopes.borrow();
        let mut current = Some(id);
        while let Some(sid) = current {
            let scope = &scopes[sid.index()];
            if pred(scope) {
                return Some(sid);
            }
            current = scope.parent;
        }
        None
    }
}

/// A runtime call frame.
pub(crate) struct Frame {
    parent: Option<Rc<Frame>>,
    values: RefCell<Vec<Value>>,
    shape: Option<(Rc<ScopeArena>, ScopeId)>,
}

impl Frame {
    pub fn new(parent: Option<Rc<Frame>>, size: usize, shape: Option<(Rc<ScopeArena>, ScopeId)>) -> Rc<Self> {
        Rc::new(Self {
            parent,
            values: RefCell::new(vec![Value::Undefined; size]),
            shape,
        })
    }

    pub fn parent(&self) -> Option<&Rc<Frame>> {
        self.parent.as_ref()
    }

    /// The frame `level` lexical hops above this one.
    pub fn at_level(self: &Rc<Self>, level: u32) -> Rc<Frame> {
        let mut frame = Rc::clone(self);
        for _ in 0..level {
            let parent = frame.parent.as_ref().expect("resolved level exceeds frame depth");
            frame = Rc::clone(parent);
        }
        frame
    }

    pub fn get(&self, index: usize) -> Value {
        self.values.borrow()[index].clone()
    }

    pub fn set(&self, index: usize, value: Value) {
        self.values.borrow_mut()[index] = value;
    }

    pub fn size(&self) -> usize {
        self.values.borrow().len()
    }

    /// Resets slots on function return. Slots flagged as closure-captured
    /// keep their values: a surviving function object still references
    /// this frame.
    pub fn clear(&self) {
        let Some((arena, id)) = &self.shape else {
            return;
        };
        arena.with(*id, |scope| {
            let mut values = self.values.borrow_mut();
            for (i, value) in values.iter_mut().enumerate() {
                if !scope.variables()[i].is_closure.get() {
                    *value = Value::Undefined;
                }
            }
        });
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("size", &self.values.borrow().len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}
