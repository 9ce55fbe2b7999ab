//! Expression nodes.
//!
//! The tree is a sum type with four uniform operations:
//!
//! * `declare` — bottom-up compile pass; populates the enclosing scope with
//!   arguments and hoisted variables, and validates left-value patterns.
//! * `resolve` — top-down pass that binds every identifier to a concrete
//!   variable kind (local, import, export, global or fiber).
//! * `eval` — runtime evaluation against a [`Context`].
//! * `assign` — the store operation of left-values; destructuring patterns
//!   recurse through it.
//!
//! Nodes mutate nothing after resolution except through interior-mutable
//! caches (property caches, lazily bound identifiers), so evaluation works
//! on a shared `&` tree.

use std::{
    cell::{Cell, RefCell},
    fmt::Write,
    rc::Rc,
};

use num_bigint::BigInt;
use smallvec::SmallVec;
use strum::IntoStaticStr;

use crate::{
    class::{ClassBuilder, ClassRef, FieldOptions, Method, PropertyCache},
    context::{Context, construct_function, invoke_function},
    error::{CodeLoc, RunError, RunResult},
    intern::{StaticStrings, StringId},
    lexer::Op,
    module::{Module, ModuleId},
    scope::{ScopeArena, ScopeId, ScopeKind},
    stmt::Stmt,
    value::{Value, number_to_string},
};

/// An expression with its source position.
#[derive(Debug)]
pub(crate) struct Expr {
    pub kind: ExprKind,
    pub loc: CodeLoc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum UnaryOp {
    Pos,
    Neg,
    BitNot,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    Ne,
    StrictEq,
    StrictNe,
    Gt,
    Ge,
    Lt,
    Le,
    InstanceOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub(crate) enum LogicalOp {
    And,
    Or,
    Nullish,
}

/// One `key: value` entry of an object literal; `key == None` is a spread
/// (`...expr`) entry.
#[derive(Debug)]
pub(crate) struct ObjEntry {
    pub key: Option<Expr>,
    pub value: Expr,
}

#[derive(Debug)]
pub(crate) enum ExprKind {
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    Str(StringId),
    /// `void x` and expression statements: evaluate, yield `undefined`.
    Discard(Box<Expr>),
    /// Comma expression. `comma_ended` marks a trailing comma, which is
    /// only legal in an arrow-function parameter list.
    Compound {
        exprs: Vec<Expr>,
        comma_ended: bool,
    },
    /// Template literal: string fragments and embedded expressions joined
    /// by string concatenation.
    Concat(Vec<Expr>),
    Object {
        entries: Vec<ObjEntry>,
        shape: RefCell<Option<ObjectShape>>,
    },
    Array(Vec<Expr>),
    /// `...expr` inside an array literal.
    Expand(Box<Expr>),
    Function(Rc<FunctionNode>),
    Identifier(IdentNode),
    Property {
        obj: Box<Expr>,
        key: Box<Expr>,
        optional: bool,
        cache: PropertyCache,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        optional: bool,
    },
    New {
        func: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        x: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        a: Box<Expr>,
        b: Box<Expr>,
    },
    Logical {
        op: LogicalOp,
        a: Box<Expr>,
        b: Box<Expr>,
    },
    In {
        key: Box<Expr>,
        obj: Box<Expr>,
        cache: PropertyCache,
    },
    TypeOf(Box<Expr>),
    Delete(Box<Expr>),
    IncDec {
        inc: bool,
        prefix: bool,
        x: Box<Expr>,
    },
    Assign {
        target: Box<Expr>,
        value: Box<Expr>,
    },
    OpAssign {
        op: BinaryOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    LogicalAssign {
        op: LogicalOp,
        target: Box<Expr>,
        value: Box<Expr>,
    },
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
}

/// Cached shape of an object literal: a one-off class with a variable
/// field per string-keyed entry, so literal construction fills slots
/// instead of hashing.
#[derive(Debug)]
pub(crate) struct ObjectShape {
    pub class: ClassRef,
    /// Slot index per entry; `None` for computed keys and spreads.
    pub slots: Vec<Option<usize>>,
}

/// What an identifier was bound to by the resolution pass.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Resolved {
    Local { index: u32, level: u32 },
    Fiber { index: u32, module: ModuleId },
    Import { index: u32, module: ModuleId },
    Export { id: u32, module: ModuleId },
    Global { key: StringId },
}

#[derive(Debug)]
pub(crate) struct IdentNode {
    pub key: StringId,
    /// Bound during resolution; identifiers that could not be bound then
    /// retry against the globals at first evaluation (REPL-style hosts add
    /// globals late).
    pub resolved: Cell<Option<Resolved>>,
    pub cache: PropertyCache,
}

impl IdentNode {
    pub fn new(key: StringId) -> Self {
        Self {
            key,
            resolved: Cell::new(None),
            cache: PropertyCache::new(),
        }
    }
}

/// A function literal's compile-time half, shared between the expression
/// node that evaluates it and the hoisted initialiser that installs it.
#[derive(Debug)]
pub(crate) struct FunctionNode {
    pub def: RefCell<FunctionDef>,
    pub method: RefCell<Option<Rc<Method>>>,
}

#[derive(Debug)]
pub(crate) struct FunctionDef {
    pub name: String,
    pub params: Vec<Expr>,
    pub body: Stmt,
    pub scope: Cell<Option<ScopeId>>,
    pub loc: CodeLoc,
}

/// What a script [`Method`] executes: the function's shared node plus the
/// scope arena its descriptors live in.
pub(crate) struct ScriptBody {
    pub node: Rc<FunctionNode>,
    pub scopes: Rc<ScopeArena>,
}

impl std::fmt::Debug for ScriptBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptBody").finish()
    }
}

/// State of the declaration pass.
pub(crate) struct Declarer<'a> {
    pub rt: &'a crate::runtime::Runtime,
    pub scopes: Rc<ScopeArena>,
    pub module: &'a Module,
}

/// A declaration failure, reported with the offending node's position.
#[derive(Debug)]
pub(crate) struct DeclareError {
    pub message: String,
    pub loc: CodeLoc,
}

pub(crate) type DeclResult = Result<(), DeclareError>;

impl DeclareError {
    pub fn new(message: impl Into<String>, loc: CodeLoc) -> Self {
        Self {
            message: message.into(),
            loc,
        }
    }
}

/// State of the resolution pass: the lexical frame stack plus the module
/// whose imports/exports and globals identifiers fall back to.
pub(crate) struct Resolver<'a> {
    pub rt: &'a crate::runtime::Runtime,
    pub scopes: Rc<ScopeArena>,
    pub module: &'a Module,
    pub instance: &'a crate::module::Instance,
    pub globals: crate::object::ObjRef,
    pub frames: Vec<ScopeId>,
    pub legacy: Option<&'a crate::module::LegacyImports>,
}

impl Expr {
    pub fn new(kind: ExprKind, loc: CodeLoc) -> Self {
        Self { kind, loc }
    }

    fn error(&self, message: impl Into<String>) -> RunError {
        RunError::msg(message).at(self.loc)
    }

    pub fn is_identifier(&self) -> bool {
        matches!(self.kind, ExprKind::Identifier(_))
    }

    /// Can this expression be stored through?
    pub fn is_left_value(&self) -> bool {
        match &self.kind {
            ExprKind::Identifier(_) | ExprKind::Property { optional: false, .. } => true,
            ExprKind::Object { entries, .. } => entries.iter().all(|e| {
                matches!(&e.key, Some(k) if matches!(k.kind, ExprKind::Str(_))) && e.value.is_left_value()
            }),
            ExprKind::Array(items) => items.iter().all(Self::is_left_value),
            ExprKind::Assign { target, .. } => target.is_left_value(),
            _ => false,
        }
    }

    /// Can this expression appear in a parameter list?
    pub fn is_argument(&self) -> bool {
        match &self.kind {
            ExprKind::Identifier(_) => true,
            ExprKind::Object { entries, .. } => entries.iter().all(|e| {
                matches!(&e.key, Some(k) if matches!(k.kind, ExprKind::Str(_))) && e.value.is_argument()
            }),
            ExprKind::Array(items) => items.iter().all(Self::is_argument),
            ExprKind::Assign { target, .. } => target.is_argument(),
            _ => false,
        }
    }

    pub fn is_argument_list(&self) -> bool {
        match &self.kind {
            ExprKind::Compound { exprs, .. } => exprs.iter().all(Self::is_argument),
            _ => self.is_argument(),
        }
    }

    /// Collects the identifiers a pattern binds, in unpack order.
    pub fn collect_pattern_names(&self, out: &mut Vec<(StringId, CodeLoc)>) {
        match &self.kind {
            ExprKind::Identifier(ident) => out.push((ident.key, self.loc)),
            ExprKind::Object { entries, .. } => {
                for e in entries {
                    e.value.collect_pattern_names(out);
                }
            }
            ExprKind::Array(items) => {
                for item in items {
                    item.collect_pattern_names(out);
                }
            }
            ExprKind::Assign { target, .. } => target.collect_pattern_names(out),
            _ => {}
        }
    }

    // ----------------------------------------------------------------
    // declare
    // ----------------------------------------------------------------

    pub fn declare(&self, d: &mut Declarer<'_>, scope: ScopeId, is_lval: bool) -> DeclResult {
        match &self.kind {
            ExprKind::Undefined | ExprKind::Null | ExprKind::Boolean(_) | ExprKind::Number(_) | ExprKind::Str(_) => {
                Ok(())
            }
            ExprKind::Identifier(_) => Ok(()),
            ExprKind::Discard(x) | ExprKind::Expand(x) | ExprKind::TypeOf(x) | ExprKind::Delete(x) => {
                x.declare(d, scope, false)
            }
            ExprKind::Unary { x, .. } | ExprKind::IncDec { x, .. } => x.declare(d, scope, false),
            ExprKind::Compound { exprs, .. } | ExprKind::Concat(exprs) => {
                for e in exprs {
                    e.declare(d, scope, false)?;
                }
                Ok(())
            }
            ExprKind::Object { entries, .. } => {
                if is_lval {
                    if !self.is_left_value() {
                        return Err(DeclareError::new("illegal object destruction", self.loc));
                    }
                    for e in entries {
                        e.value.declare(d, scope, true)?;
                    }
                } else {
                    for e in entries {
                        if let Some(k) = &e.key {
                            k.declare(d, scope, false)?;
                        }
                        e.value.declare(d, scope, false)?;
                    }
                }
                Ok(())
            }
            ExprKind::Array(items) => {
                if is_lval {
                    if !self.is_left_value() {
                        return Err(DeclareError::new("illegal array destruction", self.loc));
                    }
                    for item in items {
                        item.declare(d, scope, true)?;
                    }
                } else {
                    for item in items {
                        item.declare(d, scope, false)?;
                    }
                }
                Ok(())
            }
            ExprKind::Function(node) => node.declare(d, self.loc),
            ExprKind::Property { obj, key, .. } => {
                obj.declare(d, scope, false)?;
                key.declare(d, scope, false)
            }
            ExprKind::Call { func, args, .. } | ExprKind::New { func, args } => {
                func.declare(d, scope, false)?;
                for a in args {
                    a.declare(d, scope, false)?;
                }
                Ok(())
            }
            ExprKind::Binary { a, b, .. } | ExprKind::Logical { a, b, .. } => {
                a.declare(d, scope, false)?;
                b.declare(d, scope, false)
            }
            ExprKind::In { key, obj, .. } => {
                key.declare(d, scope, false)?;
                obj.declare(d, scope, false)
            }
            ExprKind::Assign { target, value } => {
                target.declare(d, scope, true)?;
                value.declare(d, scope, false)
            }
            ExprKind::OpAssign { target, value, .. } | ExprKind::LogicalAssign { target, value, .. } => {
                target.declare(d, scope, false)?;
                value.declare(d, scope, false)
            }
            ExprKind::Conditional { cond, then, otherwise } => {
                cond.declare(d, scope, false)?;
                then.declare(d, scope, false)?;
                otherwise.declare(d, scope, false)
            }
        }
    }

    // ----------------------------------------------------------------
    // resolve
    // ----------------------------------------------------------------

    pub fn resolve(&self, r: &mut Resolver<'_>) {
        match &self.kind {
            ExprKind::Undefined | ExprKind::Null | ExprKind::Boolean(_) | ExprKind::Number(_) | ExprKind::Str(_) => {}
            ExprKind::Identifier(ident) => ident.resolve(r),
            ExprKind::Discard(x) | ExprKind::Expand(x) | ExprKind::TypeOf(x) | ExprKind::Delete(x) => x.resolve(r),
            ExprKind::Unary { x, .. } | ExprKind::IncDec { x, .. } => x.resolve(r),
            ExprKind::Compound { exprs, .. } | ExprKind::Concat(exprs) => {
                for e in exprs {
                    e.resolve(r);
                }
            }
            ExprKind::Object { entries, .. } => {
                for e in entries {
                    if let Some(k) = &e.key {
                        k.resolve(r);
                    }
                    e.value.resolve(r);
                }
            }
            ExprKind::Array(items) => {
                for item in items {
                    item.resolve(r);
                }
            }
            ExprKind::Function(node) => FunctionNode::resolve(node, r),
            ExprKind::Property { obj, key, .. } => {
                obj.resolve(r);
                key.resolve(r);
            }
            ExprKind::Call { func, args, .. } | ExprKind::New { func, args } => {
                func.resolve(r);
                for a in args {
                    a.resolve(r);
                }
            }
            ExprKind::Binary { a, b, .. } | ExprKind::Logical { a, b, .. } => {
                a.resolve(r);
                b.resolve(r);
            }
            ExprKind::In { key, obj, .. } => {
                key.resolve(r);
                obj.resolve(r);
            }
            ExprKind::Assign { target, value }
            | ExprKind::OpAssign { target, value, .. }
            | ExprKind::LogicalAssign { target, value, .. } => {
                target.resolve(r);
                value.resolve(r);
            }
            ExprKind::Conditional { cond, then, otherwise } => {
                cond.resolve(r);
                then.resolve(r);
                otherwise.resolve(r);
            }
        }
    }

    // ----------------------------------------------------------------
    // eval
    // ----------------------------------------------------------------

    pub fn eval(&self, ctx: &mut Context) -> RunResult<Value> {
        match &self.kind {
            ExprKind::Undefined => Ok(Value::Undefined),
            ExprKind::Null => Ok(Value::Null),
            ExprKind::Boolean(b) => Ok(Value::Bool(*b)),
            ExprKind::Number(n) => Ok(Value::Number(*n)),
            ExprKind::Str(s) => Ok(Value::String(*s)),
            ExprKind::Discard(x) => {
                x.eval(ctx)?;
                Ok(Value::Undefined)
            }
            ExprKind::Compound { exprs, .. } => {
                let mut result = Value::Undefined;
                for e in exprs {
                    result = e.eval(ctx)?;
                }
                Ok(result)
            }
            ExprKind::Concat(exprs) => {
                let mut text = String::new();
                for e in exprs {
                    let v = e.eval(ctx)?;
                    let s = v.to_string_value(ctx.rt());
                    text.push_str(&ctx.rt().str(s));
                }
                let id = ctx.rt().intern(&text);
                Ok(Value::String(id))
            }
            ExprKind::Object { entries, shape } => self.eval_object_literal(ctx, entries, shape),
            ExprKind::Array(items) => self.eval_array_literal(ctx, items),
            ExprKind::Expand(x) => x.eval(ctx),
            ExprKind::Function(node) => {
                let method = node.method.borrow().clone().expect("function resolved before eval");
                let rt = ctx.rt_rc();
                Ok(Value::Object(rt.make_function(&method, Value::Undefined, ctx.frame.clone())))
            }
            ExprKind::Identifier(ident) => ident.eval(ctx).map_err(|e| e.at(self.loc)),
            ExprKind::Property { obj, key, optional, cache } => {
                let obj_val = obj.eval(ctx)?;
                let key_val = key.eval(ctx)?;
                if obj_val.is_nullish() {
                    if *optional {
                        return Ok(Value::Undefined);
                    }
                    let what = if obj_val.is_undefined() { "undefined" } else { "null" };
                    return Err(self.error(format!("cannot read property of {what}")));
                }
                let rt = ctx.rt_rc();
                let o = obj_val.to_object(&rt).expect("non-nullish value boxes");
                let class = o.class();
                if class.has_seti() {
                    let i = key_val.to_number(&rt);
                    if i.is_finite() {
                        return Ok(class.geti(&o, i));
                    }
                }
                let k = key_val.to_string_value(&rt);
                Ok(cache.get(&rt, &o, k))
            }
            ExprKind::Call { func, args, optional } => {
                let f = func.eval(ctx)?;
                if *optional && f.is_nullish() {
                    return Ok(Value::Undefined);
                }
                let Some(fobj) = f.as_object().filter(|o| o.is_function()) else {
                    return Err(self.error("not a function"));
                };
                let fobj = fobj.clone();
                let mut argv: SmallVec<[Value; 4]> = SmallVec::with_capacity(args.len());
                for a in args {
                    argv.push(a.eval(ctx)?);
                }
                invoke_function(ctx, &fobj, &argv).map_err(|e| e.at(self.loc))
            }
            ExprKind::New { func, args } => {
                let f = func.eval(ctx)?;
                let Some(fobj) = f.as_object().filter(|o| o.is_function()) else {
                    return Err(self.error("not a function"));
                };
                let fobj = fobj.clone();
                let mut argv: SmallVec<[Value; 4]> = SmallVec::with_capacity(args.len());
                for a in args {
                    argv.push(a.eval(ctx)?);
                }
                construct_function(ctx, &fobj, &argv).map_err(|e| e.at(self.loc))
            }
            ExprKind::Unary { op, x } => {
                let v = x.eval(ctx)?;
                let rt = ctx.rt_rc();
                match op {
                    UnaryOp::Pos => Ok(Value::Number(v.to_number(&rt))),
                    UnaryOp::Neg => {
                        if let Some(n) = as_int(&v) {
                            return Ok(Value::Object(rt.new_int(-n)));
                        }
                        Ok(Value::Number(-v.to_number(&rt)))
                    }
                    UnaryOp::BitNot => {
                        if let Some(n) = as_int(&v) {
                            // Two's-complement: ~n == -(n + 1).
                            return Ok(Value::Object(rt.new_int(-(n + 1i32))));
                        }
                        Ok(Value::Number(f64::from(!v.to_int32(&rt))))
                    }
                    UnaryOp::Not => Ok(Value::Bool(!v.to_boolean(&rt))),
                }
            }
            ExprKind::Binary { op, a, b } => {
                let va = a.eval(ctx)?;
                let vb = b.eval(ctx)?;
                binary_values(ctx, *op, &va, &vb).map_err(|e| e.at(self.loc))
            }
            ExprKind::Logical { op, a, b } => {
                let va = a.eval(ctx)?;
                let rt = ctx.rt_rc();
                let take_b = match op {
                    LogicalOp::And => va.to_boolean(&rt),
                    LogicalOp::Or => !va.to_boolean(&rt),
                    LogicalOp::Nullish => va.is_nullish(),
                };
                if take_b { b.eval(ctx) } else { Ok(va) }
            }
            ExprKind::In { key, obj, cache } => {
                let k = key.eval(ctx)?;
                let o = obj.eval(ctx)?;
                let Some(o) = o.as_object() else {
                    return Err(self.error("cannot use 'in' operator on non-objects"));
                };
                if o.class().has_geti() {
                    // Index membership on arrays is intentionally
                    // unsupported, matching long-standing engine behaviour.
                    return Err(self.error("checking index membership on an array is not supported"));
                }
                let rt = ctx.rt_rc();
                let s = k.to_string_value(&rt);
                Ok(Value::Bool(cache.has(o, s)))
            }
            ExprKind::TypeOf(x) => {
                let v = x.eval(ctx)?;
                let name = match &v {
                    Value::Empty | Value::Undefined => "undefined",
                    Value::Bool(_) => "boolean",
                    Value::Number(_) => "number",
                    Value::String(_) => "string",
                    Value::Object(o) if o.is_function() => "function",
                    Value::Null | Value::Object(_) => "object",
                };
                Ok(Value::String(ctx.rt().intern(name)))
            }
            ExprKind::Delete(x) => x.clear(ctx),
            ExprKind::IncDec { inc, prefix, x } => {
                let v = x.eval(ctx)?;
                let rt = ctx.rt_rc();
                if let Some(n) = as_int(&v) {
                    let stepped = if *inc { n + 1 } else { n - 1 };
                    let stepped = Value::Object(rt.new_int(stepped));
                    x.assign(ctx, &stepped)?;
                    return Ok(if *prefix { stepped } else { v });
                }
                let n = v.to_number(&rt);
                let stepped = Value::Number(if *inc { n + 1.0 } else { n - 1.0 });
                x.assign(ctx, &stepped)?;
                Ok(if *prefix { stepped } else { Value::Number(n) })
            }
            ExprKind::Assign { target, value } => {
                let v = value.eval(ctx)?;
                target.assign(ctx, &v)?;
                Ok(v)
            }
            ExprKind::OpAssign { op, target, value } => {
                let a = target.eval(ctx)?;
                let b = value.eval(ctx)?;
                let result = binary_values(ctx, *op, &a, &b).map_err(|e| e.at(self.loc))?;
                target.assign(ctx, &result)?;
                Ok(result)
            }
            ExprKind::LogicalAssign { op, target, value } => {
                let a = target.eval(ctx)?;
                let rt = ctx.rt_rc();
                let take_b = match op {
                    LogicalOp::And => a.to_boolean(&rt),
                    LogicalOp::Or => !a.to_boolean(&rt),
                    LogicalOp::Nullish => a.is_nullish(),
                };
                if !take_b {
                    return Ok(a);
                }
                let v = value.eval(ctx)?;
                target.assign(ctx, &v)?;
                Ok(v)
            }
            ExprKind::Conditional { cond, then, otherwise } => {
                let c = cond.eval(ctx)?;
                if c.to_boolean(ctx.rt()) {
                    then.eval(ctx)
                } else {
                    otherwise.eval(ctx)
                }
            }
        }
    }

    /// The store operation of left-values; everything else reports
    /// "cannot assign to a right-value".
    pub fn assign(&self, ctx: &mut Context, value: &Value) -> RunResult<()> {
        match &self.kind {
            ExprKind::Identifier(ident) => ident.assign(ctx, value).map_err(|e| e.at(self.loc)),
            ExprKind::Property { obj, key, optional: false, cache } => {
                let obj_val = obj.eval(ctx)?;
                let key_val = key.eval(ctx)?;
                if obj_val.is_nullish() {
                    let what = if obj_val.is_undefined() { "undefined" } else { "null" };
                    return Err(self.error(format!("cannot set property of {what}")));
                }
                let rt = ctx.rt_rc();
                let o = obj_val.to_object(&rt).expect("non-nullish value boxes");
                let class = o.class();
                if class.has_seti() {
                    let i = key_val.to_number(&rt);
                    if i.is_finite() {
                        class.seti(&o, i, value.clone());
                        return Ok(());
                    }
                }
                let k = key_val.to_string_value(&rt);
                cache.set(&rt, &o, k, value.clone());
                Ok(())
            }
            // Destructuring patterns.
            ExprKind::Object { entries, .. } => {
                let rt = ctx.rt_rc();
                let Some(src) = value.to_object(&rt) else {
                    return Err(self.error("cannot destruct null"));
                };
                for e in entries {
                    let Some(key) = &e.key else {
                        return Err(self.error("illegal object destruction"));
                    };
                    let ExprKind::Str(k) = key.kind else {
                        return Err(self.error("illegal object destruction"));
                    };
                    let member = src.get(&rt, k);
                    e.value.assign(ctx, &member)?;
                }
                Ok(())
            }
            ExprKind::Array(items) => {
                let Some(src) = value.as_object().filter(|o| o.is_array()) else {
                    return Err(self.error("cannot destruct"));
                };
                let src = src.clone();
                for (i, item) in items.iter().enumerate() {
                    let member = src.array_get(i as f64);
                    item.assign(ctx, &member)?;
                }
                Ok(())
            }
            // A default inside a pattern: `{c = 20}`.
            ExprKind::Assign { target, value: default } => {
                if value.is_undefined() {
                    let v = default.eval(ctx)?;
                    target.assign(ctx, &v)
                } else {
                    target.assign(ctx, value)
                }
            }
            _ => Err(self.error("cannot assign to a right-value")),
        }
    }

    /// The `delete` operation.
    pub fn clear(&self, ctx: &mut Context) -> RunResult<Value> {
        match &self.kind {
            ExprKind::Identifier(ident) => Err(ident.clear_error()).map_err(|e: RunError| e.at(self.loc)),
            ExprKind::Property { obj, key, optional: false, cache } => {
                let obj_val = obj.eval(ctx)?;
                let key_val = key.eval(ctx)?;
                if obj_val.is_nullish() {
                    let what = if obj_val.is_undefined() { "undefined" } else { "null" };
                    return Err(self.error(format!("cannot delete property of {what}")));
                }
                let rt = ctx.rt_rc();
                let o = obj_val.to_object(&rt).expect("non-nullish value boxes");
                let class = o.class();
                if class.has_seti() {
                    let i = key_val.to_number(&rt);
                    if i.is_finite() {
                        class.seti(&o, i, Value::Empty);
                        return Ok(Value::Bool(true));
                    }
                }
                let k = key_val.to_string_value(&rt);
                Ok(Value::Bool(cache.del(&o, k)))
            }
            _ => Err(self.error("cannot delete a value")),
        }
    }

    fn eval_object_literal(
        &self,
        ctx: &mut Context,
        entries: &[ObjEntry],
        shape: &RefCell<Option<ObjectShape>>,
    ) -> RunResult<Value> {
        let rt = ctx.rt_rc();
        if shape.borrow().is_none() {
            let mut builder = ClassBuilder::new(&rt, "").extends(&rt.object_class());
            for e in entries {
                if let Some(key) = &e.key
                    && let ExprKind::Str(k) = key.kind
                {
                    builder = builder.variable(&rt.str(k), Value::Undefined, FieldOptions::DATA);
                }
            }
            let class = builder.finish();
            let slots = entries
                .iter()
                .map(|e| match &e.key {
                    Some(key) => match key.kind {
                        ExprKind::Str(k) => class.find_field(k),
                        _ => None,
                    },
                    None => None,
                })
                .collect();
            *shape.borrow_mut() = Some(ObjectShape { class, slots });
        }

        let shape_ref = shape.borrow();
        let shape = shape_ref.as_ref().expect("object shape built");
        let obj = crate::object::ObjRef::new(&shape.class);
        for (e, slot) in entries.iter().zip(&shape.slots) {
            match (&e.key, slot) {
                (Some(_), Some(i)) => {
                    let v = e.value.eval(ctx)?;
                    obj.set_slot(*i, v);
                }
                (Some(key), None) => {
                    let k = key.eval(ctx)?;
                    let v = e.value.eval(ctx)?;
                    let ks = k.to_string_value(&rt);
                    obj.ht_set(ks, v);
                }
                (None, _) => {
                    // Spread entry: copy the enumerable properties.
                    let v = e.value.eval(ctx)?;
                    match &v {
                        Value::Object(src) => src.iterate_enumerable(|k, val| obj.set(&rt, k, val)),
                        Value::String(_) => {
                            return Err(self.error("cannot spread a string into an object"));
                        }
                        _ => {}
                    }
                }
            }
        }
        Ok(Value::Object(obj))
    }

    fn eval_array_literal(&self, ctx: &mut Context, items: &[Expr]) -> RunResult<Value> {
        let rt = ctx.rt_rc();
        let mut data = crate::object::ArrayData::default();
        let mut i = 0f64;
        for item in items {
            if let ExprKind::Expand(inner) = &item.kind {
                let v = inner.eval(ctx)?;
                match &v {
                    Value::String(s) => {
                        for c in rt.str(*s).chars() {
                            data.set(i, Value::String(rt.intern(&c.to_string())));
                            i += 1.0;
                        }
                    }
                    Value::Object(o) if o.is_array() => {
                        let n = o.array_length();
                        for j in 0..n {
                            data.set(i, o.array_get(j as f64));
                            i += 1.0;
                        }
                    }
                    _ => return Err(self.error("object is not iterable")),
                }
            } else {
                let v = item.eval(ctx)?;
                data.set(i, v);
                i += 1.0;
            }
        }
        data.set_length(i as usize);
        Ok(Value::Object(rt.new_array_with(data)))
    }

    /// Writes an indented description of the tree, mainly for debugging
    /// and structural comparison in tests.
    pub fn dump(&self, rt: &crate::runtime::Runtime, out: &mut String, indent: usize) {
        let pad = "  ".repeat(indent);
        match &self.kind {
            ExprKind::Undefined => _ = writeln!(out, "{pad}undefined"),
            ExprKind::Null => _ = writeln!(out, "{pad}null"),
            ExprKind::Boolean(b) => _ = writeln!(out, "{pad}{b}"),
            ExprKind::Number(n) => _ = writeln!(out, "{pad}number {}", rt.str(number_to_string(*n, rt))),
            ExprKind::Str(s) => _ = writeln!(out, "{pad}string \"{}\"", rt.str(*s)),
            ExprKind::Discard(x) => {
                _ = writeln!(out, "{pad}discard");
                x.dump(rt, out, indent + 1);
            }
            ExprKind::Compound { exprs, .. } => {
                _ = writeln!(out, "{pad}compound");
                for e in exprs {
                    e.dump(rt, out, indent + 1);
                }
            }
            ExprKind::Concat(exprs) => {
                _ = writeln!(out, "{pad}concatenation");
                for e in exprs {
                    e.dump(rt, out, indent + 1);
                }
            }
            ExprKind::Object { entries, .. } => {
                _ = writeln!(out, "{pad}object");
                for e in entries {
                    match &e.key {
                        Some(k) => k.dump(rt, out, indent + 1),
                        None => _ = writeln!(out, "{pad}  ..."),
                    }
                    e.value.dump(rt, out, indent + 1);
                }
            }
            ExprKind::Array(items) => {
                _ = writeln!(out, "{pad}array");
                for item in items {
                    item.dump(rt, out, indent + 1);
                }
            }
            ExprKind::Expand(x) => {
                _ = writeln!(out, "{pad}expand");
                x.dump(rt, out, indent + 1);
            }
            ExprKind::Function(node) => {
                let def = node.def.borrow();
                _ = writeln!(out, "{pad}function");
                for p in &def.params {
                    p.dump(rt, out, indent + 1);
                }
                def.body.dump(rt, out, indent + 1);
            }
            ExprKind::Identifier(ident) => _ = writeln!(out, "{pad}identifier {}", rt.str(ident.key)),
            ExprKind::Property { obj, key, optional, .. } => {
                _ = writeln!(out, "{pad}{}property", if *optional { "optional " } else { "" });
                obj.dump(rt, out, indent + 1);
                key.dump(rt, out, indent + 1);
            }
            ExprKind::Call { func, args, optional } => {
                _ = writeln!(out, "{pad}{}invocation", if *optional { "optional " } else { "" });
                func.dump(rt, out, indent + 1);
                for a in args {
                    a.dump(rt, out, indent + 1);
                }
            }
            ExprKind::New { func, args } => {
                _ = writeln!(out, "{pad}construction");
                func.dump(rt, out, indent + 1);
                for a in args {
                    a.dump(rt, out, indent + 1);
                }
            }
            ExprKind::Unary { op, x } => {
                let name: &'static str = (*op).into();
                _ = writeln!(out, "{pad}{name}");
                x.dump(rt, out, indent + 1);
            }
            ExprKind::Binary { op, a, b } => {
                let name: &'static str = (*op).into();
                _ = writeln!(out, "{pad}{name}");
                a.dump(rt, out, indent + 1);
                b.dump(rt, out, indent + 1);
            }
            ExprKind::Logical { op, a, b } => {
                let name: &'static str = (*op).into();
                _ = writeln!(out, "{pad}logical {name}");
                a.dump(rt, out, indent + 1);
                b.dump(rt, out, indent + 1);
            }
            ExprKind::In { key, obj, .. } => {
                _ = writeln!(out, "{pad}in");
                key.dump(rt, out, indent + 1);
                obj.dump(rt, out, indent + 1);
            }
            ExprKind::TypeOf(x) => {
                _ = writeln!(out, "{pad}typeof");
                x.dump(rt, out, indent + 1);
            }
            ExprKind::Delete(x) => {
                _ = writeln!(out, "{pad}delete");
                x.dump(rt, out, indent + 1);
            }
            ExprKind::IncDec { inc, prefix, x } => {
                let name = match (inc, prefix) {
                    (true, true) => "pre-increment",
                    (true, false) => "post-increment",
                    (false, true) => "pre-decrement",
                    (false, false) => "post-decrement",
                };
                _ = writeln!(out, "{pad}{name}");
                x.dump(rt, out, indent + 1);
            }
            ExprKind::Assign { target, value } => {
                _ = writeln!(out, "{pad}assignment");
                target.dump(rt, out, indent + 1);
                value.dump(rt, out, indent + 1);
            }
            ExprKind::OpAssign { op, target, value } => {
                let name: &'static str = (*op).into();
                _ = writeln!(out, "{pad}{name} assignment");
                target.dump(rt, out, indent + 1);
                value.dump(rt, out, indent + 1);
            }
            ExprKind::LogicalAssign { op, target, value } => {
                let name: &'static str = (*op).into();
                _ = writeln!(out, "{pad}logical {name} assignment");
                target.dump(rt, out, indent + 1);
                value.dump(rt, out, indent + 1);
            }
            ExprKind::Conditional { cond, then, otherwise } => {
                _ = writeln!(out, "{pad}conditional");
                cond.dump(rt, out, indent + 1);
                then.dump(rt, out, indent + 1);
                otherwise.dump(rt, out, indent + 1);
            }
        }
    }
}

impl IdentNode {
    /// Binds this identifier, searching the lexical frames outward, then
    /// the module's imports and exports, then the globals.
    ///
    /// A local found above the innermost frame flags its slot as
    /// closure-captured so it survives frame clearing.
    pub fn resolve(&self, r: &mut Resolver<'_>) {
        if self.resolved.get().is_some() {
            return;
        }
        for (level, &sid) in r.frames.iter().rev().enumerate() {
            let found = r.scopes.with(sid, |scope| {
                scope.variables().iter().enumerate().find_map(|(i, v)| {
                    if v.name != self.key {
                        return None;
                    }
                    Some(match v.fiber_index {
                        Some(fi) => Resolved::Fiber {
                            index: fi,
                            module: r.module.id(),
                        },
                        None => {
                            if level > 0 {
                                v.is_closure.set(true);
                            }
                            Resolved::Local {
                                index: u32::try_from(i).expect("slot index fits u32"),
                                level: u32::try_from(level).expect("scope level fits u32"),
                            }
                        }
                    })
                })
            });
            if let Some(binding) = found {
                self.resolved.set(Some(binding));
                return;
            }
        }

        if let Some(index) = r.module.find_import(self.key) {
            self.resolved.set(Some(Resolved::Import {
                index: u32::try_from(index).expect("import index fits u32"),
                module: r.module.id(),
            }));
            return;
        }
        if let Some(id) = r.module.find_export(self.key) {
            self.resolved.set(Some(Resolved::Export {
                id,
                module: r.module.id(),
            }));
            return;
        }
        if let Some(legacy) = r.legacy
            && let Some((module, name)) = legacy.get(self.key)
        {
            self.resolved.set(Some(Resolved::Import {
                index: r.module.adopt_legacy_import(r.instance, module, name),
                module: r.module.id(),
            }));
            return;
        }
        if r.globals.has(self.key) {
            self.resolved.set(Some(Resolved::Global { key: self.key }));
        }
    }

    /// Late binding for identifiers the resolution pass could not place:
    /// the host may have added the global since.
    fn late_resolve(&self, ctx: &Context) -> Option<Resolved> {
        if let Some(r) = self.resolved.get() {
            return Some(r);
        }
        if ctx.globals.has(self.key) {
            let binding = Resolved::Global { key: self.key };
            self.resolved.set(Some(binding));
            return Some(binding);
        }
        None
    }

    pub fn eval(&self, ctx: &mut Context) -> RunResult<Value> {
        let Some(binding) = self.late_resolve(ctx) else {
            return Err(RunError::msg("unresolved identifier"));
        };
        match binding {
            Resolved::Local { index, level } => {
                let frame = ctx.frame.as_ref().expect("local variable outside a frame");
                Ok(frame.at_level(level).get(index as usize))
            }
            Resolved::Fiber { index, module } => match &ctx.fiber {
                Some(fiber) => Ok(fiber.get(module, index)),
                None => Err(RunError::msg("referencing fiber variable without a fiber")),
            },
            Resolved::Import { index, module } => {
                let module = ctx.instance.module(module);
                Ok(module.import_value(ctx.rt(), index as usize))
            }
            Resolved::Export { id, module } => {
                let module = ctx.instance.module(module);
                Ok(module.export_value(id))
            }
            Resolved::Global { key } => {
                let globals = ctx.globals.clone();
                Ok(self.cache.get(ctx.rt(), &globals, key))
            }
        }
    }

    pub fn assign(&self, ctx: &mut Context, value: &Value) -> RunResult<()> {
        let Some(binding) = self.late_resolve(ctx) else {
            return Err(RunError::msg("unresolved identifier"));
        };
        match binding {
            Resolved::Local { index, level } => {
                let frame = ctx.frame.as_ref().expect("local variable outside a frame");
                frame.at_level(level).set(index as usize, value.clone());
                Ok(())
            }
            Resolved::Fiber { index, module } => match &ctx.fiber {
                Some(fiber) => {
                    fiber.set(module, index, value.clone());
                    Ok(())
                }
                None => Err(RunError::msg("referencing fiber variable without a fiber")),
            },
            Resolved::Import { .. } => Err(RunError::msg("cannot assign to an imported variable")),
            Resolved::Export { id, module } => {
                let module = ctx.instance.module(module);
                module.set_export_value(id, value.clone());
                Ok(())
            }
            Resolved::Global { key } => {
                let globals = ctx.globals.clone();
                self.cache.set(ctx.rt(), &globals, key, value.clone());
                Ok(())
            }
        }
    }

    fn clear_error(&self) -> RunError {
        let what = match self.resolved.get() {
            Some(Resolved::Local { .. }) => "a local variable",
            Some(Resolved::Fiber { .. }) => "a fiber variable",
            Some(Resolved::Import { .. }) => "an imported variable",
            Some(Resolved::Export { .. }) => "an exported variable",
            Some(Resolved::Global { .. }) => "a global variable",
            None => return RunError::msg("unresolved identifier"),
        };
        RunError::msg(format!("cannot delete {what}"))
    }
}

impl FunctionNode {
    pub fn new(name: String, params: Vec<Expr>, body: Stmt, loc: CodeLoc) -> Rc<Self> {
        Rc::new(Self {
            def: RefCell::new(FunctionDef {
                name,
                params,
                body,
                scope: Cell::new(None),
                loc,
            }),
            method: RefCell::new(None),
        })
    }

    /// Builds the function's own scope (arguments and pattern-bound
    /// locals), then declares the parameter expressions and the body
    /// against it. The scope has no parent during declaration: `var`
    /// hoisting and `break` legality stop at the function boundary.
    fn declare(&self, d: &mut Declarer<'_>, _loc: CodeLoc) -> DeclResult {
        let def = self.def.borrow();
        let scope = d.scopes.alloc(ScopeKind::Function, None, None);
        def.scope.set(Some(scope));
        declare_params(d, scope, &def.params)?;
        def.body.declare(d, scope)
    }

    /// Synthesises the [`Method`] executing this function's body, then
    /// resolves parameters and body one frame deeper.
    pub(crate) fn resolve(node: &Rc<Self>, r: &mut Resolver<'_>) {
        let def = node.def.borrow();
        let scope = def.scope.get().expect("function declared before resolve");
        if node.method.borrow().is_none() {
            let name = if def.name.is_empty() {
                format!("(anonymous function at line {} column {})", def.loc.line, def.loc.column)
            } else {
                def.name.clone()
            };
            *node.method.borrow_mut() = Some(Method::script(
                name,
                ScriptBody {
                    node: Rc::clone(node),
                    scopes: Rc::clone(&r.scopes),
                },
            ));
        }

        r.frames.push(scope);
        for param in &def.params {
            param.resolve(r);
        }
        def.body.resolve(r);
        r.frames.pop();
    }
}

/// Declares a parameter list into `scope`: named parameters become
/// arguments, destructuring parameters reserve an anonymous argument slot
/// and bind their leaf names as locals. Shared by function literals and
/// catch clauses.
pub(crate) fn declare_params(d: &mut Declarer<'_>, scope: ScopeId, params: &[Expr]) -> DeclResult {
    let empty: StringId = StaticStrings::Empty.into();
    let mut pattern_names = Vec::new();
    for param in params {
        match &param.kind {
            ExprKind::Identifier(ident) => {
                check_argument_name(d, ident.key, param.loc)?;
                d.scopes.with_mut(scope, |s| s.add_arg(ident.key));
            }
            ExprKind::Assign { target, .. } if target.is_identifier() => {
                let ExprKind::Identifier(ident) = &target.kind else {
                    unreachable!()
                };
                check_argument_name(d, ident.key, target.loc)?;
                d.scopes.with_mut(scope, |s| s.add_arg(ident.key));
            }
            ExprKind::Assign { target, .. } => {
                d.scopes.with_mut(scope, |s| s.add_arg(empty));
                target.collect_pattern_names(&mut pattern_names);
            }
            ExprKind::Object { .. } | ExprKind::Array(_) => {
                d.scopes.with_mut(scope, |s| s.add_arg(empty));
                param.collect_pattern_names(&mut pattern_names);
            }
            _ => return Err(DeclareError::new("invalid argument list", param.loc)),
        }
    }
    for &(name, name_loc) in &pattern_names {
        check_argument_name(d, name, name_loc)?;
        d.scopes.with_mut(scope, |s| s.declare_var(name, None));
    }
    for param in params {
        param.declare(d, scope, true)?;
    }
    Ok(())
}

/// Parameter and local names may not start with `$` (a bare `$` is fine);
/// those names are fiber variables, which only exist at module scope.
fn check_argument_name(d: &Declarer<'_>, name: StringId, loc: CodeLoc) -> DeclResult {
    let text = d.rt.str(name);
    if text.starts_with('$') && text.len() > 1 {
        return Err(DeclareError::new(format!("reserved argument name '{text}'"), loc));
    }
    Ok(())
}

/// The `Int` payload of a value, when it has one.
fn as_int(v: &Value) -> Option<BigInt> {
    match v {
        Value::Object(o) => match &o.borrow().payload {
            crate::object::Payload::Int(n) => Some(n.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Coerces a value to a big integer for `Int` delegation.
fn to_bigint(ctx: &Context, v: &Value) -> RunResult<BigInt> {
    crate::builtins::int_from_value(ctx.rt(), v)
}

/// Applies a binary operator to two evaluated operands.
///
/// `+` concatenates when either side is a string. Arithmetic, equality and
/// ordering delegate to the `Int` class when either operand is an `Int`
/// object; everything else runs on IEEE-754 doubles (division by zero
/// yields an infinity, not an error).
pub(crate) fn binary_values(ctx: &mut Context, op: BinaryOp, a: &Value, b: &Value) -> RunResult<Value> {
    use num_traits::Zero;

    let rt = ctx.rt_rc();

    if op == BinaryOp::Add && (a.is_string() || b.is_string()) {
        let sa = a.to_string_value(&rt);
        let sb = b.to_string_value(&rt);
        let joined = format!("{}{}", rt.str(sa), rt.str(sb));
        return Ok(Value::String(rt.intern(&joined)));
    }

    let int_operands = a.is_int() || b.is_int();
    if int_operands {
        match op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem
            | BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
                let ia = to_bigint(ctx, a)?;
                let ib = to_bigint(ctx, b)?;
                let n = match op {
                    BinaryOp::Add => ia + ib,
                    BinaryOp::Sub => ia - ib,
                    BinaryOp::Mul => ia * ib,
                    BinaryOp::Div => {
                        if ib.is_zero() {
                            return Err(RunError::msg("division by zero"));
                        }
                        ia / ib
                    }
                    BinaryOp::Rem => {
                        if ib.is_zero() {
                            return Err(RunError::msg("division by zero"));
                        }
                        ia % ib
                    }
                    BinaryOp::BitAnd => ia & ib,
                    BinaryOp::BitOr => ia | ib,
                    BinaryOp::BitXor => ia ^ ib,
                    _ => unreachable!(),
                };
                return Ok(Value::Object(rt.new_int(n)));
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                let ia = to_bigint(ctx, a)?;
                let ib = to_bigint(ctx, b)?;
                let eq = ia == ib;
                return Ok(Value::Bool(if op == BinaryOp::Eq { eq } else { !eq }));
            }
            BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Lt | BinaryOp::Le => {
                if !a.is_undefined() && !b.is_undefined() {
                    let ia = to_bigint(ctx, a)?;
                    let ib = to_bigint(ctx, b)?;
                    let ord = ia.cmp(&ib);
                    let result = match op {
                        BinaryOp::Gt => ord.is_gt(),
                        BinaryOp::Ge => ord.is_ge(),
                        BinaryOp::Lt => ord.is_lt(),
                        BinaryOp::Le => ord.is_le(),
                        _ => unreachable!(),
                    };
                    return Ok(Value::Bool(result));
                }
            }
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr if a.is_int() => {
                let ia = as_int(a).expect("checked is_int");
                let shift = (b.to_int32(&rt) & 63) as usize;
                let n = match op {
                    BinaryOp::Shl => ia << shift,
                    _ => ia >> shift,
                };
                return Ok(Value::Object(rt.new_int(n)));
            }
            _ => {}
        }
    }

    match op {
        BinaryOp::Add => Ok(Value::Number(a.to_number(&rt) + b.to_number(&rt))),
        BinaryOp::Sub => Ok(Value::Number(a.to_number(&rt) - b.to_number(&rt))),
        BinaryOp::Mul => Ok(Value::Number(a.to_number(&rt) * b.to_number(&rt))),
        BinaryOp::Div => Ok(Value::Number(a.to_number(&rt) / b.to_number(&rt))),
        BinaryOp::Rem => Ok(Value::Number(a.to_number(&rt) % b.to_number(&rt))),
        BinaryOp::Pow => Ok(Value::Number(a.to_number(&rt).powf(b.to_number(&rt)))),
        BinaryOp::Shl => Ok(Value::Number(f64::from(a.to_int32(&rt) << (b.to_int32(&rt) & 31)))),
        BinaryOp::Shr => Ok(Value::Number(f64::from(a.to_int32(&rt) >> (b.to_int32(&rt) & 31)))),
        BinaryOp::UShr => Ok(Value::Number(f64::from(
            (a.to_int32(&rt) as u32) >> (b.to_int32(&rt) & 31),
        ))),
        BinaryOp::BitAnd => Ok(Value::Number(f64::from(a.to_int32(&rt) & b.to_int32(&rt)))),
        BinaryOp::BitOr => Ok(Value::Number(f64::from(a.to_int32(&rt) | b.to_int32(&rt)))),
        BinaryOp::BitXor => Ok(Value::Number(f64::from(a.to_int32(&rt) ^ b.to_int32(&rt)))),
        BinaryOp::Eq => Ok(Value::Bool(a.loose_eq(b))),
        BinaryOp::Ne => Ok(Value::Bool(!a.loose_eq(b))),
        BinaryOp::StrictEq => Ok(Value::Bool(a.strict_eq(b))),
        BinaryOp::StrictNe => Ok(Value::Bool(!a.strict_eq(b))),
        BinaryOp::Gt | BinaryOp::Ge | BinaryOp::Lt | BinaryOp::Le => {
            if a.is_undefined() || b.is_undefined() {
                return Ok(Value::Bool(false));
            }
            if let (Value::String(sa), Value::String(sb)) = (a, b) {
                let sa = rt.str(*sa);
                let sb = rt.str(*sb);
                let ord = sa.cmp(&sb);
                return Ok(Value::Bool(match op {
                    BinaryOp::Gt => ord.is_gt(),
                    BinaryOp::Ge => ord.is_ge(),
                    BinaryOp::Lt => ord.is_lt(),
                    _ => ord.is_le(),
                }));
            }
            let na = a.to_number(&rt);
            let nb = b.to_number(&rt);
            Ok(Value::Bool(match op {
                BinaryOp::Gt => na > nb,
                BinaryOp::Ge => na >= nb,
                BinaryOp::Lt => na < nb,
                _ => na <= nb,
            }))
        }
        BinaryOp::InstanceOf => {
            let Some(fobj) = b.as_object().filter(|o| o.is_function()) else {
                return Err(RunError::msg("right-hand side of 'instanceof' is not callable"));
            };
            let method = match &fobj.borrow().payload {
                crate::object::Payload::Function(f) => Rc::clone(&f.method),
                _ => unreachable!("function object has a function payload"),
            };
            let Some(class) = method.constructor_class() else {
                return Err(RunError::msg("right-hand side of 'instanceof' is not a constructor"));
            };
            match a.as_object() {
                Some(o) => Ok(Value::Bool(o.class().is_derived_from(&class))),
                None => Ok(Value::Bool(false)),
            }
        }
    }
}

/// Parser-side constructors, one per operator token, so the reduction
/// step of the expression parser reads like the precedence table.
pub(crate) fn make_binary(op: Op, a: Expr, b: Expr, loc: CodeLoc) -> Expr {
    let kind = match op {
        Op::Plus => bin(BinaryOp::Add, a, b),
        Op::Minus => bin(BinaryOp::Sub, a, b),
        Op::Star => bin(BinaryOp::Mul, a, b),
        Op::Slash => bin(BinaryOp::Div, a, b),
        Op::Percent => bin(BinaryOp::Rem, a, b),
        Op::Pow => bin(BinaryOp::Pow, a, b),
        Op::Shl => bin(BinaryOp::Shl, a, b),
        Op::Shr => bin(BinaryOp::Shr, a, b),
        Op::UShr => bin(BinaryOp::UShr, a, b),
        Op::BitAnd => bin(BinaryOp::BitAnd, a, b),
        Op::BitOr => bin(BinaryOp::BitOr, a, b),
        Op::BitXor => bin(BinaryOp::BitXor, a, b),
        Op::Eq => bin(BinaryOp::Eq, a, b),
        Op::Ne => bin(BinaryOp::Ne, a, b),
        Op::StrictEq => bin(BinaryOp::StrictEq, a, b),
        Op::StrictNe => bin(BinaryOp::StrictNe, a, b),
        Op::Gt => bin(BinaryOp::Gt, a, b),
        Op::Ge => bin(BinaryOp::Ge, a, b),
        Op::Lt => bin(BinaryOp::Lt, a, b),
        Op::Le => bin(BinaryOp::Le, a, b),
        Op::InstanceOf => bin(BinaryOp::InstanceOf, a, b),
        Op::In => ExprKind::In {
            key: Box::new(a),
            obj: Box::new(b),
            cache: PropertyCache::new(),
        },
        Op::And => logical(LogicalOp::And, a, b),
        Op::Or => logical(LogicalOp::Or, a, b),
        Op::Nullish => logical(LogicalOp::Nullish, a, b),
        Op::Assign => ExprKind::Assign {
            target: Box::new(a),
            value: Box::new(b),
        },
        Op::PlusAssign => op_assign(BinaryOp::Add, a, b),
        Op::MinusAssign => op_assign(BinaryOp::Sub, a, b),
        Op::StarAssign => op_assign(BinaryOp::Mul, a, b),
        Op::SlashAssign => op_assign(BinaryOp::Div, a, b),
        Op::PercentAssign => op_assign(BinaryOp::Rem, a, b),
        Op::PowAssign => op_assign(BinaryOp::Pow, a, b),
        Op::ShlAssign => op_assign(BinaryOp::Shl, a, b),
        Op::ShrAssign => op_assign(BinaryOp::Shr, a, b),
        Op::UShrAssign => op_assign(BinaryOp::UShr, a, b),
        Op::BitAndAssign => op_assign(BinaryOp::BitAnd, a, b),
        Op::BitOrAssign => op_assign(BinaryOp::BitOr, a, b),
        Op::BitXorAssign => op_assign(BinaryOp::BitXor, a, b),
        Op::AndAssign => logical_assign(LogicalOp::And, a, b),
        Op::OrAssign => logical_assign(LogicalOp::Or, a, b),
        Op::NullishAssign => logical_assign(LogicalOp::Nullish, a, b),
        other => unreachable!("not a binary operator: {other:?}"),
    };
    Expr::new(kind, loc)
}

fn bin(op: BinaryOp, a: Expr, b: Expr) -> ExprKind {
    ExprKind::Binary {
        op,
        a: Box::new(a),
        b: Box::new(b),
    }
}

fn logical(op: LogicalOp, a: Expr, b: Expr) -> ExprKind {
    ExprKind::Logical {
        op,
        a: Box::new(a),
        b: Box::new(b),
    }
}

fn op_assign(op: BinaryOp, target: Expr, value: Expr) -> ExprKind {
    ExprKind::OpAssign {
        op,
        target: Box::new(target),
        value: Box::new(value),
    }
}

fn logical_assign(op: LogicalOp, target: Expr, value: Expr) -> ExprKind {
    ExprKind::LogicalAssign {
        op,
        target: Box::new(target),
        value: Box::new(value),
    }
}
