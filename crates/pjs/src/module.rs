//! Modules, the instance that owns them, and the linker.
//!
//! A module's life has three phases:
//!
//! 1. **compile** — parse the source and run the declaration pass against a
//!    fresh module scope. No code executes.
//! 2. **link** — build the exports class (one variable field per direct
//!    export, one forwarding accessor per re-export), then resolve every
//!    import through the host's resolver callback, linking dependencies
//!    recursively and rejecting cyclic re-export chains.
//! 3. **execute** — resolve identifiers against the live scopes, stamp the
//!    module frame, initialise exported functions, and run the body.

use std::{
    cell::{Cell, RefCell},
    rc::Rc,
};

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::{
    class::{ClassBuilder, PropertyCache},
    context::{Context, install_hoisted},
    error::{Exception, ParseError, RunResult},
    expr::{Declarer, FunctionNode, Resolver},
    fiber::Fiber,
    intern::StringId,
    object::ObjRef,
    parser,
    runtime::Runtime,
    scope::{Frame, ScopeArena, ScopeId, ScopeKind},
    stmt::{Completion, Stmt},
    value::Value,
};

/// Identifies a module within its [`Instance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModuleId(u32);

impl ModuleId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A compilation unit's input.
#[derive(Debug, Clone)]
pub struct Source {
    pub filename: String,
    pub content: String,
}

/// One `import` binding.
#[derive(Debug)]
pub(crate) struct Import {
    /// Local name; `None` for a bare side-effect import.
    pub alias: Option<StringId>,
    /// Name in the source module; `None` imports the whole exports object.
    pub name: Option<StringId>,
    pub path: StringId,
    pub module: Cell<Option<ModuleId>>,
    pub exports: RefCell<Option<ObjRef>>,
    cache: PropertyCache,
}

impl Import {
    /// The import's current value: a live read through the source module's
    /// exports object.
    pub fn get(&self, rt: &Runtime) -> Value {
        let exports = self.exports.borrow();
        let Some(exports) = exports.as_ref() else {
            return Value::Undefined;
        };
        match self.name {
            Some(name) => self.cache.get(rt, exports, name),
            None => Value::Object(exports.clone()),
        }
    }
}

/// One `export` binding. Forwarded exports (`export { x } from "m"`) point
/// at an [`Import`] instead of carrying a field of their own.
#[derive(Debug)]
pub(crate) struct Export {
    pub alias: StringId,
    /// Module-internal name; `None` on forwarded exports.
    pub name: Option<StringId>,
    /// Field id in the exports class, assigned at link time.
    pub id: Cell<i32>,
    /// Initialiser for exported function declarations.
    pub value: RefCell<Option<Rc<FunctionNode>>>,
    pub import: Option<usize>,
}

pub struct Module {
    id: ModuleId,
    source: Source,
    scopes: Rc<ScopeArena>,
    root_scope: ScopeId,
    tree: RefCell<Option<Stmt>>,
    imports: RefCell<Vec<Rc<Import>>>,
    exports: RefCell<Vec<Export>>,
    exports_class: RefCell<Option<crate::class::ClassRef>>,
    exports_object: RefCell<Option<ObjRef>>,
    fiber_var_count: Cell<u32>,
    resolved: Cell<bool>,
    linked: Cell<bool>,
    linking: Cell<bool>,
}

impl Module {
    fn new(id: ModuleId, filename: &str, content: &str) -> Self {
        let scopes = ScopeArena::new();
        let root_scope = scopes.alloc(ScopeKind::Module, None, None);
        Self {
            id,
            source: Source {
                filename: filename.to_owned(),
                content: content.to_owned(),
            },
            scopes,
            root_scope,
            tree: RefCell::new(None),
            imports: RefCell::new(Vec::new()),
            exports: RefCell::new(Vec::new()),
            exports_class: RefCell::new(None),
            exports_object: RefCell::new(None),
            fiber_var_count: Cell::new(0),
            resolved: Cell::new(false),
            linked: Cell::new(false),
            linking: Cell::new(false),
        }
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.source.filename
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// The module's exports object, available once linked.
    pub fn exports_object(&self) -> Option<ObjRef> {
        self.exports_object.borrow().clone()
    }

    /// How many fiber-variable slots this module's `$`-prefixed variables
    /// occupy; hosts size fiber storage with it.
    pub fn fiber_variable_count(&self) -> u32 {
        self.fiber_var_count.get()
    }

    pub(crate) fn add_fiber_variable(&self) -> u32 {
        let index = self.fiber_var_count.get();
        self.fiber_var_count.set(index + 1);
        index
    }

    pub(crate) fn add_import(&self, alias: Option<StringId>, name: Option<StringId>, path: StringId) -> usize {
        let mut imports = self.imports.borrow_mut();
        imports.push(Rc::new(Import {
            alias,
            name,
            path,
            module: Cell::new(None),
            exports: RefCell::new(None),
            cache: PropertyCache::new(),
        }));
        imports.len() - 1
    }

    /// Adds a direct export; returns its index. Field ids are assigned at
    /// link time.
    pub(crate) fn add_export(&self, alias: StringId, name: Option<StringId>) -> u32 {
        let mut exports = self.exports.borrow_mut();
        exports.push(Export {
            alias,
            name,
            id: Cell::new(-1),
            value: RefCell::new(None),
            import: None,
        });
        u32::try_from(exports.len() - 1).expect("export index fits u32")
    }

    pub(crate) fn add_export_with_value(&self, alias: StringId, name: Option<StringId>, value: Rc<FunctionNode>) {
        let index = self.add_export(alias, name);
        *self.exports.borrow()[index as usize].value.borrow_mut() = Some(value);
    }

    pub(crate) fn add_forwarded_export(&self, alias: StringId, import: usize) {
        self.exports.borrow_mut().push(Export {
            alias,
            name: None,
            id: Cell::new(-1),
            value: RefCell::new(None),
            import: Some(import),
        });
    }

    pub(crate) fn find_import(&self, alias: StringId) -> Option<usize> {
        self.imports.borrow().iter().position(|i| i.alias == Some(alias))
    }

    /// Field id of a named export, for identifier resolution.
    pub(crate) fn find_export(&self, name: StringId) -> Option<u32> {
        self.exports.borrow().iter().find_map(|e| {
            if e.name == Some(name) && e.id.get() >= 0 {
                Some(e.id.get() as u32)
            } else {
                None
            }
        })
    }

    pub(crate) fn import_value(&self, rt: &Runtime, index: usize) -> Value {
        let import = Rc::clone(&self.imports.borrow()[index]);
        import.get(rt)
    }

    pub(crate) fn export_value(&self, id: u32) -> Value {
        let class = self.exports_class.borrow().clone().expect("module linked");
        let object = self.exports_object.borrow().clone().expect("module linked");
        object.slot(class.slot_of_id(id))
    }

    pub(crate) fn set_export_value(&self, id: u32, value: Value) {
        let class = self.exports_class.borrow().clone().expect("module linked");
        let object = self.exports_object.borrow().clone().expect("module linked");
        object.set_slot(class.slot_of_id(id), value);
    }

    pub(crate) fn set_export_value_by_index(&self, index: u32, value: Value) {
        let id = self.exports.borrow()[index as usize].id.get();
        if id >= 0 {
            self.set_export_value(id as u32, value);
        }
    }

    /// Registers an auxiliary import created by a legacy name table and
    /// returns its index.
    pub(crate) fn adopt_legacy_import(&self, instance: &Instance, module: ModuleId, name: StringId) -> u32 {
        let target = instance.module(module);
        let path = instance.runtime().intern(target.name());
        let index = self.add_import(None, Some(name), path);
        let imports = self.imports.borrow();
        let import = &imports[index];
        import.module.set(Some(module));
        *import.exports.borrow_mut() = target.exports_object();
        u32::try_from(index).expect("import index fits u32")
    }

    fn compile(&self, rt: &Runtime) -> Result<(), ParseError> {
        let tree = parser::parse_program(rt, &self.source.content)?;
        let mut declarer = Declarer {
            rt,
            scopes: Rc::clone(&self.scopes),
            module: self,
        };
        tree.declare(&mut declarer, self.root_scope)
            .map_err(|e| ParseError::at(e.message, e.loc))?;
        *self.tree.borrow_mut() = Some(tree);
        Ok(())
    }

    fn compile_expression(&self, rt: &Runtime) -> Result<(), ParseError> {
        let tree = parser::parse_expression_program(rt, &self.source.content)?;
        let mut declarer = Declarer {
            rt,
            scopes: Rc::clone(&self.scopes),
            module: self,
        };
        tree.declare(&mut declarer, self.root_scope)
            .map_err(|e| ParseError::at(e.message, e.loc))?;
        *self.tree.borrow_mut() = Some(tree);
        Ok(())
    }

    /// Builds the exports class and object and assigns export field ids.
    fn build_exports(&self, rt: &Rc<Runtime>) {
        self.scopes.finalize_all();
        let mut builder = ClassBuilder::new(rt, "");
        let mut field_id: u32 = 0;
        let exports = self.exports.borrow();
        let imports = self.imports.borrow();
        for export in exports.iter() {
            let name = rt.str(export.alias).to_string();
            match export.import {
                Some(i) => {
                    let import = Rc::clone(&imports[i]);
                    builder = builder.accessor(
                        &name,
                        Rc::new(move |rt: &Runtime, _obj: &ObjRef| import.get(rt)),
                        None,
                    );
                }
                None => {
                    builder = builder.variable_with_id(&name, field_id, crate::class::FieldOptions::NONE);
                    export.id.set(field_id as i32);
                    field_id += 1;
                }
            }
        }
        drop(exports);
        drop(imports);
        let class = builder.finish();
        *self.exports_object.borrow_mut() = Some(ObjRef::new(&class));
        *self.exports_class.borrow_mut() = Some(class);
    }

    /// Runs the module body against a fresh module frame.
    pub(crate) fn execute(&self, ctx: &mut Context, legacy: Option<&LegacyImports>) -> RunResult<Value> {
        if !self.resolved.get() {
            let rt = Rc::clone(&ctx.rt);
            let instance = Rc::clone(&ctx.instance);
            let mut resolver = Resolver {
                rt: rt.as_ref(),
                scopes: Rc::clone(&self.scopes),
                module: self,
                instance: instance.as_ref(),
                globals: ctx.globals.clone(),
                frames: vec![self.root_scope],
                legacy,
            };
            if let Some(tree) = self.tree.borrow().as_ref() {
                tree.resolve(&mut resolver);
            }
            self.resolved.set(true);
        }

        let size = self.scopes.with(self.root_scope, crate::scope::TreeScope::size);
        let frame = Frame::new(None, size, Some((Rc::clone(&self.scopes), self.root_scope)));
        let saved = ctx.frame.replace(Rc::clone(&frame));
        let result = (|| {
            install_hoisted(ctx, &self.scopes, self.root_scope, &frame)?;

            // Exported function declarations initialise their fields
            // before the body runs.
            for export in self.exports.borrow().iter() {
                let node = export.value.borrow();
                if let Some(node) = node.as_ref() {
                    let method = node.method.borrow().clone().expect("exported function resolved");
                    let value = ctx.rt.make_function(&method, Value::Undefined, Some(Rc::clone(&frame)));
                    if export.id.get() >= 0 {
                        self.set_export_value(export.id.get() as u32, Value::Object(value));
                    }
                }
            }

            let tree = self.tree.borrow();
            let tree = tree.as_ref().expect("module compiled");
            match tree.execute(ctx)? {
                Completion::Normal(Some(v)) | Completion::Return(v) => Ok(v),
                _ => Ok(Value::Undefined),
            }
        })();
        ctx.frame = saved;
        result
    }

    /// Writes the module's tree dump, for debugging.
    pub fn tree_dump(&self, rt: &Runtime) -> String {
        let mut out = String::new();
        if let Some(tree) = self.tree.borrow().as_ref() {
            tree.dump(rt, &mut out, 0);
        }
        out
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.id)
            .field("name", &self.source.filename)
            .finish()
    }
}

/// Auxiliary name table for embedders that predate module syntax: maps a
/// bare identifier to an export of another module. Consulted during
/// resolution after scopes, imports, exports and globals all miss.
#[derive(Debug, Default)]
pub struct LegacyImports {
    map: AHashMap<StringId, (ModuleId, StringId)>,
}

impl LegacyImports {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, rt: &Runtime, name: &str, module: ModuleId, original_name: &str) {
        self.map
            .insert(rt.intern(name), (module, rt.intern(original_name)));
    }

    pub(crate) fn get(&self, name: StringId) -> Option<(ModuleId, StringId)> {
        self.map.get(&name).copied()
    }
}

/// Resolver callback: `(instance, importer, path) -> module`. Returning
/// `None` fails the link with "cannot load module".
pub type ModuleResolver<'a> = dyn FnMut(&Instance, ModuleId, &str) -> Option<ModuleId> + 'a;

/// An isolated runtime environment owning a set of modules, their global
/// object, and per-execution state.
pub struct Instance {
    rt: Rc<Runtime>,
    modules: RefCell<Vec<Rc<Module>>>,
    globals: ObjRef,
}

impl Instance {
    pub fn new(rt: &Rc<Runtime>) -> Rc<Self> {
        let globals = rt.new_object();
        crate::builtins::install_globals(rt, &globals);
        Rc::new(Self {
            rt: Rc::clone(rt),
            modules: RefCell::new(Vec::new()),
            globals,
        })
    }

    pub fn runtime(&self) -> &Rc<Runtime> {
        &self.rt
    }

    pub fn globals(&self) -> &ObjRef {
        &self.globals
    }

    /// Defines (or replaces) a global seen by every module of this
    /// instance.
    pub fn set_global(&self, name: &str, value: Value) {
        let key = self.rt.intern(name);
        self.globals.set(&self.rt, key, value);
    }

    pub fn module(&self, id: ModuleId) -> Rc<Module> {
        Rc::clone(&self.modules.borrow()[id.index()])
    }

    pub fn module_count(&self) -> usize {
        self.modules.borrow().len()
    }

    /// Parses and declares a module; no code runs.
    pub fn compile(&self, filename: &str, source: &str) -> Result<ModuleId, ParseError> {
        let id = self.register(filename, source);
        self.module(id).compile(&self.rt)?;
        Ok(id)
    }

    /// Like [`compile`](Self::compile), but the source is a single
    /// expression instead of a statement list.
    pub fn compile_expression(&self, filename: &str, source: &str) -> Result<ModuleId, ParseError> {
        let id = self.register(filename, source);
        self.module(id).compile_expression(&self.rt)?;
        Ok(id)
    }

    fn register(&self, filename: &str, source: &str) -> ModuleId {
        let mut modules = self.modules.borrow_mut();
        let id = ModuleId(u32::try_from(modules.len()).expect("module table overflow"));
        modules.push(Rc::new(Module::new(id, filename, source)));
        id
    }

    /// Links a module: builds its exports object and wires every import
    /// through `resolver`, linking dependencies recursively. Cyclic
    /// re-export chains are rejected; cycles through plain value imports
    /// are fine because they resolve lazily through the exports object.
    pub fn link(&self, id: ModuleId, mut resolver: impl FnMut(&Self, ModuleId, &str) -> Option<ModuleId>) -> Result<(), Exception> {
        self.link_inner(id, &mut resolver)
    }

    fn link_inner(&self, id: ModuleId, resolver: &mut ModuleResolver<'_>) -> Result<(), Exception> {
        let module = self.module(id);
        if module.linked.get() || module.linking.get() {
            return Ok(());
        }
        module.linking.set(true);
        module.build_exports(&self.rt);

        let import_count = module.imports.borrow().len();
        for i in 0..import_count {
            let import = Rc::clone(&module.imports.borrow()[i]);
            let path = self.rt.str(import.path).to_string();
            let Some(target) = resolver(self, id, &path) else {
                module.linking.set(false);
                return Err(Exception::message(format!("cannot load module: {path}")));
            };
            self.link_inner(target, resolver)?;
            import.module.set(Some(target));
            *import.exports.borrow_mut() = self.module(target).exports_object();
            self.check_cyclic_import(&import, &import, &mut Vec::new())?;
        }

        module.linking.set(false);
        module.linked.set(true);
        Ok(())
    }

    /// Depth-first search over re-export chains; a chain that reaches back
    /// to the original import is unresolvable.
    fn check_cyclic_import(
        &self,
        root: &Rc<Import>,
        current: &Rc<Import>,
        seen: &mut Vec<*const Import>,
    ) -> Result<(), Exception> {
        let Some(target) = current.module.get() else {
            return Ok(());
        };
        if seen.contains(&Rc::as_ptr(current)) {
            return Ok(());
        }
        seen.push(Rc::as_ptr(current));
        let module = self.module(target);
        let exports = module.exports.borrow();
        let imports = module.imports.borrow();
        for export in exports.iter() {
            if current.name.is_none() || current.name == Some(export.alias) {
                if let Some(i) = export.import {
                    let next = &imports[i];
                    if Rc::ptr_eq(next, root) {
                        return Err(Exception::message("cyclic import"));
                    }
                    self.check_cyclic_import(root, next, seen)?;
                }
            }
        }
        Ok(())
    }

    /// Runs a module to completion, returning the value of its trailing
    /// expression.
    ///
    /// Recursion depth during evaluation is bounded only by the host
    /// stack; deeply recursive scripts can exhaust it.
    pub fn execute(self: &Rc<Self>, id: ModuleId, fiber: Option<&Rc<Fiber>>) -> Result<Value, Exception> {
        self.execute_with(id, fiber, None, None)
    }

    /// [`execute`](Self::execute) with an optional legacy import table and
    /// per-execution state object `l`.
    pub fn execute_with(
        self: &Rc<Self>,
        id: ModuleId,
        fiber: Option<&Rc<Fiber>>,
        legacy: Option<&LegacyImports>,
        locals: Option<&ObjRef>,
    ) -> Result<Value, Exception> {
        let module = self.module(id);
        if !module.linked.get() {
            // A module without imports can run unlinked; anything else
            // must have been linked through a resolver first.
            self.link(id, |_, _, _| None)?;
        }
        let mut ctx = Context::new(self, fiber.map(Rc::clone));
        ctx.locals = locals.cloned();
        module
            .execute(&mut ctx, legacy)
            .map_err(|e| e.in_function("(root)").into_exception(&self.rt))
    }

    /// Compiles, links (no imports allowed) and runs a standalone script.
    pub fn eval(self: &Rc<Self>, source: &str) -> Result<Value, Exception> {
        let id = self
            .compile("(eval)", source)
            .map_err(|e| Exception::message(e.to_string()))?;
        self.execute(id, None)
    }

    /// Parses and evaluates a single expression.
    pub fn eval_expression(self: &Rc<Self>, source: &str) -> Result<Value, Exception> {
        let id = self
            .compile_expression("(eval)", source)
            .map_err(|e| Exception::message(e.to_string()))?;
        self.execute(id, None)
    }
}

impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("modules", &self.modules.borrow().len())
            .finish()
    }
}
