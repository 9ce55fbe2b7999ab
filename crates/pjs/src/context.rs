//! The evaluator context: what the tree walker carries through a run.
//!
//! A [`Context`] references the instance (for module lookup), the globals
//! object `g`, optional per-execution state `l`, the active fiber, and the
//! current runtime [`Frame`]. Function calls swap the frame in and out;
//! errors travel as `Err(RunError)` and accumulate backtrace frames at
//! call sites on the way up.

use std::rc::Rc;

use crate::{
    class::{Method, MethodBody},
    error::{RunError, RunResult},
    expr::{Expr, ExprKind, ScriptBody},
    fiber::Fiber,
    module::Instance,
    object::{ObjRef, Payload},
    runtime::Runtime,
    scope::Frame,
    value::Value,
};

pub struct Context {
    pub(crate) rt: Rc<Runtime>,
    pub(crate) instance: Rc<Instance>,
    pub(crate) globals: ObjRef,
    pub(crate) locals: Option<ObjRef>,
    pub(crate) fiber: Option<Rc<Fiber>>,
    pub(crate) frame: Option<Rc<Frame>>,
}

impl Context {
    pub(crate) fn new(instance: &Rc<Instance>, fiber: Option<Rc<Fiber>>) -> Self {
        Self {
            rt: Rc::clone(instance.runtime()),
            instance: Rc::clone(instance),
            globals: instance.globals().clone(),
            locals: None,
            fiber,
            frame: None,
        }
    }

    pub fn rt(&self) -> &Runtime {
        &self.rt
    }

    pub(crate) fn rt_rc(&self) -> Rc<Runtime> {
        Rc::clone(&self.rt)
    }

    /// The per-execution state object `l`, if the host provided one.
    pub fn locals(&self) -> Option<&ObjRef> {
        self.locals.as_ref()
    }
}

/// Calls a function value with the given arguments.
///
/// The callee's name is stamped onto any escaping error so backtraces read
/// as a call stack.
pub(crate) fn invoke_function(ctx: &mut Context, f: &ObjRef, args: &[Value]) -> RunResult<Value> {
    let (method, this, scope) = match &f.borrow().payload {
        Payload::Function(data) => (Rc::clone(&data.method), data.this.clone(), data.scope.clone()),
        _ => return Err(RunError::msg("not a function")),
    };
    invoke_method(ctx, &method, &this, scope, args)
}

pub(crate) fn invoke_method(
    ctx: &mut Context,
    method: &Rc<Method>,
    this: &Value,
    scope: Option<Rc<Frame>>,
    args: &[Value],
) -> RunResult<Value> {
    match &method.body {
        MethodBody::Native(body) => body(ctx, this, args).map_err(|e| e.in_function(&method.name())),
        MethodBody::Script(script) => {
            script_call(ctx, script, scope, args).map_err(|e| e.in_function(&method.name()))
        }
    }
}

/// `new f(...)`: requires the callee's method to carry a constructor
/// class, then runs that class's native constructor.
pub(crate) fn construct_function(ctx: &mut Context, f: &ObjRef, args: &[Value]) -> RunResult<Value> {
    let method = match &f.borrow().payload {
        Payload::Function(data) => Rc::clone(&data.method),
        _ => return Err(RunError::msg("not a function")),
    };
    let Some(class) = method.constructor_class() else {
        return Err(RunError::msg("function is not a constructor"));
    };
    let constructed = class
        .construct(ctx, args)
        .map_err(|e| e.in_function(&method.name()))?;
    Ok(match constructed {
        Some(obj) => Value::Object(obj),
        None => Value::Null,
    })
}

/// Runs a script function: stamps a frame from the function's scope
/// descriptor, fills argument slots, applies defaults and destructuring,
/// installs hoisted function declarations, then executes the body.
fn script_call(ctx: &mut Context, script: &ScriptBody, captured: Option<Rc<Frame>>, args: &[Value]) -> RunResult<Value> {
    let def = script.node.def.borrow();
    let scope_id = def.scope.get().expect("function declared before call");
    let (size, nargs) = script.scopes.with(scope_id, |s| (s.size(), s.arg_count()));

    let frame = Frame::new(captured, size, Some((Rc::clone(&script.scopes), scope_id)));
    for (i, arg) in args.iter().take(nargs).enumerate() {
        frame.set(i, arg.clone());
    }

    let saved = ctx.frame.replace(Rc::clone(&frame));
    let result = (|| {
        for (i, param) in def.params.iter().enumerate() {
            init_param(ctx, param, i, &frame)?;
        }
        install_hoisted(ctx, &script.scopes, scope_id, &frame)?;
        match def.body.execute(ctx)? {
            crate::stmt::Completion::Return(v) => Ok(v),
            _ => Ok(Value::Undefined),
        }
    })();
    ctx.frame = saved;
    frame.clear();
    result
}

/// Installs hoisted function declarations into their slots when a scope is
/// instantiated, before its body runs.
pub(crate) fn install_hoisted(
    ctx: &mut Context,
    scopes: &Rc<crate::scope::ScopeArena>,
    scope_id: crate::scope::ScopeId,
    frame: &Rc<Frame>,
) -> RunResult<()> {
    scopes.with(scope_id, |s| {
        for init in s.hoisted() {
            let method = init
                .func
                .method
                .borrow()
                .clone()
                .expect("hoisted function resolved");
            let value = Value::Object(ctx.rt.make_function(&method, Value::Undefined, Some(Rc::clone(frame))));
            frame.set(init.slot.get(), value);
        }
    });
    Ok(())
}

/// Initialises one parameter slot: evaluates the default when the incoming
/// argument is `undefined`, then unpacks destructuring patterns through
/// the regular assignment path.
pub(crate) fn init_param(ctx: &mut Context, param: &Expr, index: usize, frame: &Rc<Frame>) -> RunResult<()> {
    match &param.kind {
        ExprKind::Identifier(_) => Ok(()),
        ExprKind::Assign { target, value } => {
            let mut current = frame.get(index);
            if current.is_undefined() {
                current = value.eval(ctx)?;
                frame.set(index, current.clone());
            }
            if target.is_identifier() {
                // The argument slot is the identifier's own slot.
                Ok(())
            } else {
                target.assign(ctx, &current)
            }
        }
        ExprKind::Object { .. } | ExprKind::Array(_) => {
            let current = frame.get(index);
            param.assign(ctx, &current)
        }
        _ => Err(RunError::msg("invalid argument list")),
    }
}

/// Declarative typed access to native-method arguments.
///
/// Required arguments (`index < required`) fail with an arity error when
/// missing; optional ones fall back to a default when absent or nullish.
pub struct Args<'a> {
    values: &'a [Value],
    required: usize,
}

impl<'a> Args<'a> {
    pub fn new(values: &'a [Value], required: usize) -> RunResult<Self> {
        if values.len() < required {
            return Err(RunError::msg(format!("requires {required} or more arguments")));
        }
        Ok(Self { values, required })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn present(&self, index: usize) -> Option<&Value> {
        match self.values.get(index) {
            None => None,
            Some(v) if index >= self.required && v.is_nullish() => None,
            Some(v) => Some(v),
        }
    }

    pub fn value(&self, index: usize) -> Value {
        self.values.get(index).cloned().unwrap_or(Value::Undefined)
    }

    pub fn number(&self, index: usize) -> RunResult<f64> {
        match self.present(index) {
            Some(Value::Number(n)) => Ok(*n),
            Some(_) => Err(type_error(index, "a number")),
            None => Err(type_error(index, "a number")),
        }
    }

    pub fn opt_number(&self, index: usize) -> RunResult<Option<f64>> {
        match self.present(index) {
            Some(Value::Number(n)) => Ok(Some(*n)),
            Some(_) => Err(type_error(index, "a number")),
            None => Ok(None),
        }
    }

    pub fn string(&self, index: usize) -> RunResult<crate::intern::StringId> {
        match self.present(index) {
            Some(Value::String(s)) => Ok(*s),
            Some(_) => Err(type_error(index, "a string")),
            None => Err(type_error(index, "a string")),
        }
    }

    pub fn opt_string(&self, index: usize) -> RunResult<Option<crate::intern::StringId>> {
        match self.present(index) {
            Some(Value::String(s)) => Ok(Some(*s)),
            Some(_) => Err(type_error(index, "a string")),
            None => Ok(None),
        }
    }

    pub fn function(&self, index: usize) -> RunResult<ObjRef> {
        match self.present(index) {
            Some(Value::Object(o)) if o.is_function() => Ok(o.clone()),
            Some(_) => Err(type_error(index, "a function")),
            None => Err(type_error(index, "a function")),
        }
    }

    pub fn object(&self, index: usize) -> RunResult<ObjRef> {
        match self.present(index) {
            Some(Value::Object(o)) => Ok(o.clone()),
            Some(_) => Err(type_error(index, "an object")),
            None => Err(type_error(index, "an object")),
        }
    }
}

fn type_error(index: usize, expected: &str) -> RunError {
    RunError::msg(format!("argument #{} expects {expected}", index + 1))
}
