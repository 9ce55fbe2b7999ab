//! Statement nodes and the completion protocol.
//!
//! Statements execute to a [`Completion`]: `Normal` (optionally carrying a
//! value, so a script's trailing expression becomes the module result),
//! `Return`, `Break` or `Continue`. Thrown values and runtime errors travel
//! as `Err(RunError)` and are converted back to values by `try/catch`.

use std::{fmt::Write, rc::Rc};

use crate::{
    context::Context,
    error::{CodeLoc, RunError, RunResult},
    expr::{DeclResult, DeclareError, Declarer, Expr, ExprKind, Resolver},
    intern::{StaticStrings, StringId},
    module::ModuleId,
    scope::{Frame, ScopeArena, ScopeId, ScopeKind},
    value::Value,
};

/// How a statement finished.
#[derive(Debug, Clone)]
pub(crate) enum Completion {
    /// Sequential execution continues. The value, when present, becomes
    /// the surrounding block's current value.
    Normal(Option<Value>),
    Return(Value),
    Break(Option<StringId>),
    Continue(Option<StringId>),
}

#[derive(Debug)]
pub(crate) struct Stmt {
    pub kind: StmtKind,
    pub loc: CodeLoc,
}

/// A `catch (param) { ... }` clause: a one-argument function scope whose
/// parameter binds the thrown value.
#[derive(Debug)]
pub(crate) struct CatchClause {
    pub param: Option<Expr>,
    pub body: Box<Stmt>,
    pub scope: std::cell::Cell<Option<ScopeId>>,
    /// The arena the catch scope lives in, captured at declaration so the
    /// handler can stamp out frames at runtime.
    pub scopes: std::cell::RefCell<Option<Rc<ScopeArena>>>,
}

#[derive(Debug)]
pub(crate) enum StmtKind {
    Block(Vec<Stmt>),
    Label {
        name: StringId,
        body: Box<Stmt>,
    },
    /// An expression statement. `export_id` is set when this is the value
    /// of an `export default` declaration.
    Eval {
        expr: Expr,
        export_id: std::cell::Cell<Option<(ModuleId, u32)>>,
    },
    Var {
        decls: Vec<Expr>,
    },
    Func {
        name: Box<Expr>,
        func: Expr,
        is_definition: std::cell::Cell<bool>,
    },
    If {
        cond: Expr,
        then: Box<Stmt>,
        otherwise: Option<Box<Stmt>>,
    },
    Switch {
        cond: Expr,
        /// `None` test marks the `default` clause.
        cases: Vec<(Option<Expr>, Vec<Stmt>)>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: Option<Expr>,
        is_var_init: bool,
        cond: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
    },
    Break {
        label: Option<StringId>,
    },
    Continue {
        label: Option<StringId>,
    },
    Return {
        expr: Option<Expr>,
    },
    Throw {
        expr: Expr,
    },
    Try {
        body: Box<Stmt>,
        catch: Option<CatchClause>,
        finally: Option<Box<Stmt>>,
    },
    Import {
        /// `(exported name or None for the whole module, local alias)`.
        list: Vec<(Option<String>, String)>,
        from: String,
    },
    Export {
        decl: Option<Box<Stmt>>,
        is_default: bool,
        list: Vec<(String, Option<String>)>,
        from: Option<String>,
    },
}

impl Stmt {
    pub fn new(kind: StmtKind, loc: CodeLoc) -> Self {
        Self { kind, loc }
    }

    // ----------------------------------------------------------------
    // declare
    // ----------------------------------------------------------------

    pub fn declare(&self, d: &mut Declarer<'_>, scope: ScopeId) -> DeclResult {
        match &self.kind {
            StmtKind::Block(stmts) => {
                let block = d.scopes.alloc(ScopeKind::Block, Some(scope), None);
                for s in stmts {
                    s.declare(d, block)?;
                }
                Ok(())
            }
            StmtKind::Label { name, body } => {
                let label = d.scopes.alloc(ScopeKind::Label, Some(scope), Some(*name));
                body.declare(d, label)
            }
            StmtKind::Eval { expr, .. } => expr.declare(d, scope, false),
            StmtKind::Var { decls } => self.declare_var(d, scope, decls, None),
            StmtKind::Func { name, func, is_definition } => {
                let ExprKind::Identifier(ident) = &name.kind else {
                    unreachable!("function statement names an identifier")
                };
                let text = d.rt.str(ident.key);
                if text.starts_with('$') {
                    return Err(DeclareError::new(format!("reserved function name '{text}'"), self.loc));
                }
                let parent_is_root = d
                    .scopes
                    .with(scope, |s| s.parent.map(|p| d.scopes.with(p, |ps| ps.parent.is_none())));
                is_definition.set(parent_is_root.unwrap_or(false));
                let root = hoisting_root(d, scope);
                let init = if is_definition.get() {
                    match &func.kind {
                        ExprKind::Function(node) => Some(Rc::clone(node)),
                        _ => None,
                    }
                } else {
                    None
                };
                d.scopes.with_mut(root, |s| s.declare_var(ident.key, init));
                func.declare(d, scope, false)
            }
            StmtKind::If { cond, then, otherwise } => {
                cond.declare(d, scope, false)?;
                then.declare(d, scope)?;
                if let Some(e) = otherwise {
                    e.declare(d, scope)?;
                }
                Ok(())
            }
            StmtKind::Switch { cond, cases } => {
                let switch = d.scopes.alloc(ScopeKind::Switch, Some(scope), None);
                cond.declare(d, switch, false)?;
                for (test, body) in cases {
                    if let Some(test) = test {
                        test.declare(d, switch, false)?;
                    }
                    for s in body {
                        s.declare(d, switch)?;
                    }
                }
                Ok(())
            }
            StmtKind::While { cond, body } => {
                let loop_scope = d.scopes.alloc(ScopeKind::Loop, Some(scope), None);
                cond.declare(d, loop_scope, false)?;
                body.declare(d, loop_scope)
            }
            StmtKind::DoWhile { body, cond } => {
                let loop_scope = d.scopes.alloc(ScopeKind::Loop, Some(scope), None);
                body.declare(d, loop_scope)?;
                cond.declare(d, loop_scope, false)
            }
            StmtKind::For { init, is_var_init, cond, step, body } => {
                if *is_var_init
                    && let Some(init) = init
                {
                    let decls: Vec<&Expr> = match &init.kind {
                        ExprKind::Compound { exprs, .. } => exprs.iter().collect(),
                        _ => vec![init],
                    };
                    let mut names = Vec::new();
                    for decl in &decls {
                        match &decl.kind {
                            ExprKind::Identifier(ident) => names.push((ident.key, decl.loc)),
                            ExprKind::Assign { target, .. } if target.is_identifier() => {
                                target.collect_pattern_names(&mut names);
                            }
                            ExprKind::Assign { target, .. } => {
                                return Err(DeclareError::new("illegal left-value in assignment", target.loc));
                            }
                            _ => {}
                        }
                    }
                    self.hoist_names(d, scope, &names)?;
                }
                let loop_scope = d.scopes.alloc(ScopeKind::Loop, Some(scope), None);
                if let Some(e) = init {
                    e.declare(d, loop_scope, false)?;
                }
                if let Some(e) = cond {
                    e.declare(d, loop_scope, false)?;
                }
                if let Some(e) = step {
                    e.declare(d, loop_scope, false)?;
                }
                body.declare(d, loop_scope)
            }
            StmtKind::Break { label } => {
                let target = match label {
                    Some(name) => d
                        .scopes
                        .climb(scope, |s| s.kind == ScopeKind::Label && s.label == Some(*name)),
                    None => d
                        .scopes
                        .climb(scope, |s| matches!(s.kind, ScopeKind::Switch | ScopeKind::Loop)),
                };
                if target.is_none() {
                    return Err(DeclareError::new("illegal break", self.loc));
                }
                Ok(())
            }
            StmtKind::Continue { label } => {
                let target = match label {
                    Some(name) => d
                        .scopes
                        .climb(scope, |s| s.kind == ScopeKind::Label && s.label == Some(*name)),
                    None => d.scopes.climb(scope, |s| s.kind == ScopeKind::Loop),
                };
                if target.is_none() {
                    return Err(DeclareError::new("illegal continue", self.loc));
                }
                Ok(())
            }
            StmtKind::Return { expr } => {
                if d.scopes.climb(scope, |s| s.kind == ScopeKind::Function).is_none() {
                    return Err(DeclareError::new("illegal return", self.loc));
                }
                if let Some(e) = expr {
                    e.declare(d, scope, false)?;
                }
                Ok(())
            }
            StmtKind::Throw { expr } => expr.declare(d, scope, false),
            StmtKind::Try { body, catch, finally } => {
                body.declare(d, scope)?;
                if let Some(catch) = catch {
                    let catch_scope = d.scopes.alloc(ScopeKind::Catch, Some(scope), None);
                    catch.scope.set(Some(catch_scope));
                    *catch.scopes.borrow_mut() = Some(Rc::clone(&d.scopes));
                    if let Some(param) = &catch.param {
                        crate::expr::declare_params(d, catch_scope, std::slice::from_ref(param))?;
                    }
                    catch.body.declare(d, catch_scope)?;
                }
                if let Some(finally) = finally {
                    finally.declare(d, scope)?;
                }
                Ok(())
            }
            StmtKind::Import { list, from } => {
                if !self.at_module_scope(d, scope) {
                    return Err(DeclareError::new("illegal import", self.loc));
                }
                let path = d.rt.intern(from);
                if list.is_empty() {
                    d.module.add_import(None, None, path);
                    return Ok(());
                }
                for (name, alias) in list {
                    let alias = d.rt.intern(alias);
                    let name = name.as_deref().map(|n| d.rt.intern(n));
                    d.module.add_import(Some(alias), name, path);
                }
                Ok(())
            }
            StmtKind::Export { decl, is_default, list, from } => {
                if !self.at_module_scope(d, scope) {
                    return Err(DeclareError::new("illegal export", self.loc));
                }
                if let Some(decl) = decl {
                    return self.declare_export_decl(d, scope, decl, *is_default);
                }
                match from {
                    None => {
                        for (name, alias) in list {
                            let name = d.rt.intern(name);
                            let alias = alias.as_deref().map_or(name, |a| d.rt.intern(a));
                            d.module.add_export(alias, Some(name));
                        }
                    }
                    Some(from) => {
                        let path = d.rt.intern(from);
                        for (name, alias) in list {
                            let name = d.rt.intern(name);
                            let alias = alias.as_deref().map_or(name, |a| d.rt.intern(a));
                            let import = d.module.add_import(None, Some(name), path);
                            d.module.add_forwarded_export(alias, import);
                        }
                    }
                }
                Ok(())
            }
        }
    }

    /// `var` declarations hoist their names to the nearest module or
    /// function scope; `$`-prefixed names go to the module's fiber table.
    fn declare_var(&self, d: &mut Declarer<'_>, scope: ScopeId, decls: &[Expr], export: Option<bool>) -> DeclResult {
        let mut names = Vec::new();
        for decl in decls {
            match &decl.kind {
                ExprKind::Identifier(_) => decl.collect_pattern_names(&mut names),
                ExprKind::Assign { target, .. }
                    if matches!(
                        target.kind,
                        ExprKind::Identifier(_) | ExprKind::Object { .. } | ExprKind::Array(_)
                    ) && target.is_left_value() =>
                {
                    if export.is_some() && !target.is_identifier() {
                        return Err(DeclareError::new("illegal export", decl.loc));
                    }
                    target.collect_pattern_names(&mut names);
                }
                _ => {
                    let message = if export.is_some() {
                        "illegal export"
                    } else {
                        "illegal variable declaration"
                    };
                    return Err(DeclareError::new(message, decl.loc));
                }
            }
        }

        if let Some(is_default) = export {
            for &(name, name_loc) in &names {
                self.check_reserved(d, name, name_loc)?;
                if is_fiber_name(d, name) {
                    return Err(DeclareError::new("cannot export a fiber variable", self.loc));
                }
                if is_default {
                    d.module.add_export(StaticStrings::Default.into(), Some(name));
                } else {
                    d.module.add_export(name, Some(name));
                }
            }
        } else {
            self.hoist_names(d, scope, &names)?;
        }

        for decl in decls {
            if matches!(decl.kind, ExprKind::Assign { .. }) {
                decl.declare(d, scope, false)?;
            }
        }
        Ok(())
    }

    fn hoist_names(&self, d: &mut Declarer<'_>, scope: ScopeId, names: &[(StringId, CodeLoc)]) -> DeclResult {
        let root = hoisting_root(d, scope);
        for &(name, name_loc) in names {
            if is_fiber_name(d, name) {
                self.check_reserved(d, name, name_loc)?;
                if !d.scopes.with(root, |s| s.binds(name)) {
                    let index = d.module.add_fiber_variable();
                    d.scopes.with_mut(root, |s| s.declare_fiber_var(name, index));
                }
            } else {
                d.scopes.with_mut(root, |s| s.declare_var(name, None));
            }
        }
        Ok(())
    }

    /// A name of one or more `$` characters only is reserved.
    fn check_reserved(&self, d: &Declarer<'_>, name: StringId, loc: CodeLoc) -> DeclResult {
        let text = d.rt.str(name);
        if !text.is_empty() && text.chars().all(|c| c == '$') {
            return Err(DeclareError::new(format!("reserved variable name '{text}'"), loc));
        }
        Ok(())
    }

    fn at_module_scope(&self, d: &Declarer<'_>, scope: ScopeId) -> bool {
        d.scopes.with(scope, |s| {
            s.parent
                .is_some_and(|p| d.scopes.with(p, |ps| ps.kind == ScopeKind::Module))
        })
    }

    fn declare_export_decl(&self, d: &mut Declarer<'_>, scope: ScopeId, decl: &Stmt, is_default: bool) -> DeclResult {
        match &decl.kind {
            StmtKind::Var { decls } => self.declare_var(d, scope, decls, Some(is_default)),
            StmtKind::Func { name, func, is_definition } => {
                let ExprKind::Identifier(ident) = &name.kind else {
                    unreachable!("function statement names an identifier")
                };
                let text = d.rt.str(ident.key);
                if text.starts_with('$') {
                    return Err(DeclareError::new(format!("reserved function name '{text}'"), self.loc));
                }
                let node = match &func.kind {
                    ExprKind::Function(node) => Rc::clone(node),
                    _ => unreachable!("function statement holds a function literal"),
                };
                let alias = if is_default {
                    StaticStrings::Default.into()
                } else {
                    ident.key
                };
                d.module.add_export_with_value(alias, Some(ident.key), node);
                is_definition.set(true);
                func.declare(d, scope, false)
            }
            StmtKind::Eval { expr, export_id } => {
                let index = d
                    .module
                    .add_export(StaticStrings::Default.into(), Some(StaticStrings::Empty.into()));
                export_id.set(Some((d.module.id(), index)));
                expr.declare(d, scope, false)
            }
            _ => Err(DeclareError::new("cannot export", self.loc)),
        }
    }

    // ----------------------------------------------------------------
    // resolve
    // ----------------------------------------------------------------

    pub fn resolve(&self, r: &mut Resolver<'_>) {
        match &self.kind {
            StmtKind::Block(stmts) => {
                for s in stmts {
                    s.resolve(r);
                }
            }
            StmtKind::Label { body, .. } => body.resolve(r),
            StmtKind::Eval { expr, .. } => expr.resolve(r),
            StmtKind::Var { decls } => {
                for decl in decls {
                    if matches!(decl.kind, ExprKind::Assign { .. }) {
                        decl.resolve(r);
                    }
                }
            }
            StmtKind::Func { name, func, .. } => {
                name.resolve(r);
                func.resolve(r);
            }
            StmtKind::If { cond, then, otherwise } => {
                cond.resolve(r);
                then.resolve(r);
                if let Some(e) = otherwise {
                    e.resolve(r);
                }
            }
            StmtKind::Switch { cond, cases } => {
                cond.resolve(r);
                for (test, body) in cases {
                    if let Some(test) = test {
                        test.resolve(r);
                    }
                    for s in body {
                        s.resolve(r);
                    }
                }
            }
            StmtKind::While { cond, body } => {
                cond.resolve(r);
                body.resolve(r);
            }
            StmtKind::DoWhile { body, cond } => {
                body.resolve(r);
                cond.resolve(r);
            }
            StmtKind::For { init, cond, step, body, .. } => {
                if let Some(e) = init {
                    e.resolve(r);
                }
                if let Some(e) = cond {
                    e.resolve(r);
                }
                if let Some(e) = step {
                    e.resolve(r);
                }
                body.resolve(r);
            }
            StmtKind::Break { .. } | StmtKind::Continue { .. } | StmtKind::Import { .. } => {}
            StmtKind::Return { expr } => {
                if let Some(e) = expr {
                    e.resolve(r);
                }
            }
            StmtKind::Throw { expr } => expr.resolve(r),
            StmtKind::Try { body, catch, finally } => {
                body.resolve(r);
                if let Some(catch) = catch {
                    let scope = catch.scope.get().expect("catch scope declared");
                    r.frames.push(scope);
                    if let Some(param) = &catch.param {
                        param.resolve(r);
                    }
                    catch.body.resolve(r);
                    r.frames.pop();
                }
                if let Some(finally) = finally {
                    finally.resolve(r);
                }
            }
            StmtKind::Export { decl, .. } => {
                if let Some(decl) = decl {
                    decl.resolve(r);
                }
            }
        }
    }

    // ----------------------------------------------------------------
    // execute
    // ----------------------------------------------------------------

    pub fn execute(&self, ctx: &mut Context) -> RunResult<Completion> {
        match &self.kind {
            StmtKind::Block(stmts) => {
                let mut value = None;
                for s in stmts {
                    match s.execute(ctx)? {
                        Completion::Normal(v) => {
                            if v.is_some() {
                                value = v;
                            }
                        }
                        other => return Ok(other),
                    }
                }
                Ok(Completion::Normal(value))
            }
            StmtKind::Label { name, body } => match body.execute(ctx)? {
                Completion::Break(Some(label)) if label == *name => Ok(Completion::Normal(None)),
                other => Ok(other),
            },
            StmtKind::Eval { expr, export_id } => {
                let value = expr.eval(ctx)?;
                if let Some((module, index)) = export_id.get() {
                    ctx.instance.module(module).set_export_value_by_index(index, value.clone());
                }
                Ok(Completion::Normal(Some(value)))
            }
            StmtKind::Var { decls } => {
                for decl in decls {
                    if matches!(decl.kind, ExprKind::Assign { .. }) {
                        decl.eval(ctx)?;
                    }
                }
                Ok(Completion::Normal(None))
            }
            StmtKind::Func { name, func, is_definition } => {
                if !is_definition.get() {
                    let value = func.eval(ctx)?;
                    name.assign(ctx, &value)?;
                }
                Ok(Completion::Normal(None))
            }
            StmtKind::If { cond, then, otherwise } => {
                let c = cond.eval(ctx)?;
                if c.to_boolean(ctx.rt()) {
                    then.execute(ctx)
                } else if let Some(e) = otherwise {
                    e.execute(ctx)
                } else {
                    Ok(Completion::Normal(None))
                }
            }
            StmtKind::Switch { cond, cases } => self.execute_switch(ctx, cond, cases),
            StmtKind::While { cond, body } => loop {
                let c = cond.eval(ctx)?;
                if !c.to_boolean(ctx.rt()) {
                    return Ok(Completion::Normal(None));
                }
                match body.execute(ctx)? {
                    Completion::Break(None) => return Ok(Completion::Normal(None)),
                    Completion::Break(Some(label)) => return Ok(Completion::Break(Some(label))),
                    Completion::Continue(_) | Completion::Normal(_) => {}
                    ret @ Completion::Return(_) => return Ok(ret),
                }
            },
            StmtKind::DoWhile { body, cond } => loop {
                match body.execute(ctx)? {
                    Completion::Break(None) => return Ok(Completion::Normal(None)),
                    Completion::Break(Some(label)) => return Ok(Completion::Break(Some(label))),
                    Completion::Continue(_) | Completion::Normal(_) => {}
                    ret @ Completion::Return(_) => return Ok(ret),
                }
                let c = cond.eval(ctx)?;
                if !c.to_boolean(ctx.rt()) {
                    return Ok(Completion::Normal(None));
                }
            },
            StmtKind::For { init, cond, step, body, .. } => {
                if let Some(init) = init {
                    init.eval(ctx)?;
                }
                loop {
                    if let Some(cond) = cond {
                        let c = cond.eval(ctx)?;
                        if !c.to_boolean(ctx.rt()) {
                            break;
                        }
                    }
                    match body.execute(ctx)? {
                        Completion::Break(None) => break,
                        Completion::Break(Some(label)) => return Ok(Completion::Break(Some(label))),
                        Completion::Continue(_) | Completion::Normal(_) => {}
                        ret @ Completion::Return(_) => return Ok(ret),
                    }
                    if let Some(step) = step {
                        step.eval(ctx)?;
                    }
                }
                Ok(Completion::Normal(None))
            }
            StmtKind::Break { label } => Ok(Completion::Break(*label)),
            StmtKind::Continue { label } => Ok(Completion::Continue(*label)),
            StmtKind::Return { expr } => {
                let value = match expr {
                    Some(e) => e.eval(ctx)?,
                    None => Value::Undefined,
                };
                Ok(Completion::Return(value))
            }
            StmtKind::Throw { expr } => {
                let value = expr.eval(ctx)?;
                Err(RunError::throw(value).at(self.loc))
            }
            StmtKind::Try { body, catch, finally } => self.execute_try(ctx, body, catch.as_ref(), finally.as_deref()),
            StmtKind::Import { .. } | StmtKind::Export { decl: None, .. } => Ok(Completion::Normal(None)),
            StmtKind::Export { decl: Some(decl), .. } => decl.execute(ctx),
        }
    }

    /// `switch`: linear loose-equality match against the scrutinee, then
    /// fall through subsequent case bodies until a break or the end. The
    /// `default` clause runs only when nothing matched.
    fn execute_switch(&self, ctx: &mut Context, cond: &Expr, cases: &[(Option<Expr>, Vec<Stmt>)]) -> RunResult<Completion> {
        let scrutinee = cond.eval(ctx)?;
        let mut taken = None;
        let mut default = None;
        for (i, (test, _)) in cases.iter().enumerate() {
            match test {
                Some(test) => {
                    let v = test.eval(ctx)?;
                    if scrutinee.loose_eq(&v) {
                        taken = Some(i);
                        break;
                    }
                }
                None => default = Some(i),
            }
        }
        let Some(start) = taken.or(default) else {
            return Ok(Completion::Normal(None));
        };
        for (_, body) in &cases[start..] {
            for s in body {
                match s.execute(ctx)? {
                    Completion::Normal(_) => {}
                    Completion::Break(None) => return Ok(Completion::Normal(None)),
                    other => return Ok(other),
                }
            }
        }
        Ok(Completion::Normal(None))
    }

    /// `try/catch/finally`. The catch clause runs as a one-argument
    /// function whose parameter binds the thrown value; the finally clause
    /// runs unconditionally, and an abrupt finally completion supersedes
    /// whatever the try produced.
    fn execute_try(
        &self,
        ctx: &mut Context,
        body: &Stmt,
        catch: Option<&CatchClause>,
        finally: Option<&Stmt>,
    ) -> RunResult<Completion> {
        let mut result = body.execute(ctx);
        if let Err(error) = &result
            && let Some(catch) = catch
        {
            let thrown = error.to_value(ctx.rt());
            result = self.execute_catch(ctx, catch, thrown);
        }
        if let Some(finally) = finally {
            match finally.execute(ctx)? {
                Completion::Normal(_) => {}
                abrupt => return Ok(abrupt),
            }
        }
        result
    }

    fn execute_catch(&self, ctx: &mut Context, catch: &CatchClause, thrown: Value) -> RunResult<Completion> {
        let scope = catch.scope.get().expect("catch scope declared");
        let scopes = catch.scopes.borrow().clone().expect("catch scope declared");
        let size = scopes.with(scope, crate::scope::TreeScope::size);
        let frame = Frame::new(ctx.frame.clone(), size, Some((Rc::clone(&scopes), scope)));
        if size > 0 && catch.param.is_some() {
            frame.set(0, thrown);
        }
        let saved = ctx.frame.replace(Rc::clone(&frame));
        let result = (|| {
            if let Some(param) = &catch.param {
                crate::context::init_param(ctx, param, 0, &frame)?;
            }
            catch.body.execute(ctx)
        })();
        ctx.frame = saved;
        frame.clear();
        result
    }

    /// Indented tree description, mirroring the expression dump.
    pub fn dump(&self, rt: &crate::runtime::Runtime, out: &mut String, indent: usize) {
        let pad = "  ".repeat(indent);
        match &self.kind {
            StmtKind::Block(stmts) => {
                _ = writeln!(out, "{pad}block");
                for s in stmts {
                    s.dump(rt, out, indent + 1);
                }
            }
            StmtKind::Label { name, body } => {
                _ = writeln!(out, "{pad}label {}", rt.str(*name));
                body.dump(rt, out, indent + 1);
            }
            StmtKind::Eval { expr, .. } => {
                _ = writeln!(out, "{pad}eval");
                expr.dump(rt, out, indent + 1);
            }
            StmtKind::Var { decls } => {
                _ = writeln!(out, "{pad}var");
                for decl in decls {
                    decl.dump(rt, out, indent + 1);
                }
            }
            StmtKind::Func { name, func, .. } => {
                let ExprKind::Identifier(ident) = &name.kind else {
                    unreachable!()
                };
                _ = writeln!(out, "{pad}function {}", rt.str(ident.key));
                func.dump(rt, out, indent + 1);
            }
            StmtKind::If { cond, then, otherwise } => {
                _ = writeln!(out, "{pad}if");
                cond.dump(rt, out, indent + 1);
                _ = writeln!(out, "{pad}then");
                then.dump(rt, out, indent + 1);
                if let Some(e) = otherwise {
                    _ = writeln!(out, "{pad}else");
                    e.dump(rt, out, indent + 1);
                }
            }
            StmtKind::Switch { cond, cases } => {
                _ = writeln!(out, "{pad}switch");
                cond.dump(rt, out, indent + 1);
                for (test, body) in cases {
                    match test {
                        Some(test) => {
                            _ = writeln!(out, "{pad}case");
                            test.dump(rt, out, indent + 1);
                        }
                        None => _ = writeln!(out, "{pad}default"),
                    }
                    for s in body {
                        s.dump(rt, out, indent + 1);
                    }
                }
            }
            StmtKind::While { cond, body } => {
                _ = writeln!(out, "{pad}while");
                cond.dump(rt, out, indent + 1);
                body.dump(rt, out, indent + 1);
            }
            StmtKind::DoWhile { body, cond } => {
                _ = writeln!(out, "{pad}do-while");
                body.dump(rt, out, indent + 1);
                cond.dump(rt, out, indent + 1);
            }
            StmtKind::For { init, cond, step, body, .. } => {
                _ = writeln!(out, "{pad}for");
                _ = writeln!(out, "{pad}  init");
                if let Some(e) = init {
                    e.dump(rt, out, indent + 2);
                }
                _ = writeln!(out, "{pad}  cond");
                if let Some(e) = cond {
                    e.dump(rt, out, indent + 2);
                }
                _ = writeln!(out, "{pad}  step");
                if let Some(e) = step {
                    e.dump(rt, out, indent + 2);
                }
                _ = writeln!(out, "{pad}  body");
                body.dump(rt, out, indent + 2);
            }
            StmtKind::Break { label } => match label {
                Some(l) => _ = writeln!(out, "{pad}break {}", rt.str(*l)),
                None => _ = writeln!(out, "{pad}break"),
            },
            StmtKind::Continue { label } => match label {
                Some(l) => _ = writeln!(out, "{pad}continue {}", rt.str(*l)),
                None => _ = writeln!(out, "{pad}continue"),
            },
            StmtKind::Return { expr } => {
                _ = writeln!(out, "{pad}return");
                if let Some(e) = expr {
                    e.dump(rt, out, indent + 1);
                }
            }
            StmtKind::Throw { expr } => {
                _ = writeln!(out, "{pad}throw");
                expr.dump(rt, out, indent + 1);
            }
            StmtKind::Try { body, catch, finally } => {
                _ = writeln!(out, "{pad}try");
                body.dump(rt, out, indent + 1);
                if let Some(catch) = catch {
                    _ = writeln!(out, "{pad}catch");
                    if let Some(param) = &catch.param {
                        param.dump(rt, out, indent + 1);
                    }
                    catch.body.dump(rt, out, indent + 1);
                }
                if let Some(finally) = finally {
                    _ = writeln!(out, "{pad}finally");
                    finally.dump(rt, out, indent + 1);
                }
            }
            StmtKind::Import { list, from } => {
                _ = writeln!(out, "{pad}import from '{from}'");
                for (name, alias) in list {
                    match name {
                        Some(name) => _ = writeln!(out, "{pad}  '{name}' as {alias}"),
                        None => _ = writeln!(out, "{pad}  * as {alias}"),
                    }
                }
            }
            StmtKind::Export { decl, is_default, list, from } => {
                let head = if *is_default { "export default" } else { "export" };
                match from {
                    Some(from) => _ = writeln!(out, "{pad}{head} from '{from}'"),
                    None => _ = writeln!(out, "{pad}{head}"),
                }
                if let Some(decl) = decl {
                    decl.dump(rt, out, indent + 1);
                }
                for (name, alias) in list {
                    match alias {
                        Some(alias) => _ = writeln!(out, "{pad}  {name} as '{alias}'"),
                        None => _ = writeln!(out, "{pad}  {name}"),
                    }
                }
            }
        }
    }
}

fn is_fiber_name(d: &Declarer<'_>, name: StringId) -> bool {
    d.rt.str(name).starts_with('$')
}

/// The nearest enclosing module or function scope, where `var` names land.
fn hoisting_root(d: &Declarer<'_>, scope: ScopeId) -> ScopeId {
    d.scopes
        .climb(scope, |s| s.kind.is_root() || s.parent.is_none())
        .expect("every scope chain ends at a root")
}
