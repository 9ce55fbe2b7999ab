//! Core class bindings: `Object`, `Array`, `Boolean`, `Number`, `String`,
//! `Function` and `Int`, registered through the same class registry any
//! host binding uses.
//!
//! Only behaviour the evaluator depends on lives here: `typeof` and
//! `instanceof` classification, array indexed get/set with length
//! semantics, string autoboxing method dispatch, and the `Int` class that
//! arithmetic delegates to. Domain objects (`Date`, `RegExp`, streams) are
//! host bindings registered the same way, outside this crate.

use std::rc::Rc;

use num_bigint::BigInt;
use num_traits::FromPrimitive;

use crate::{
    class::{ClassBuilder, ClassRef, Method, NativeMethod},
    context::{Args, Context, invoke_function},
    error::{RunError, RunResult},
    intern::{StaticStrings, StringId},
    object::{ArrayData, ObjRef, Payload},
    runtime::Runtime,
    value::Value,
};

/// Handles to the always-present classes, owned by the [`Runtime`].
pub(crate) struct CoreClasses {
    pub object: ClassRef,
    pub array: ClassRef,
    pub boolean: ClassRef,
    pub number: ClassRef,
    pub string: ClassRef,
    pub function: ClassRef,
    pub int: ClassRef,
}

pub(crate) fn install(rt: &Rc<Runtime>) -> CoreClasses {
    let object = object_class(rt);
    let array = array_class(rt, &object);
    let boolean = boxed_class(rt, &object, "Boolean");
    let number = boxed_class(rt, &object, "Number");
    let string = string_class(rt, &object);
    let function = ClassBuilder::new(rt, "Function").extends(&object).finish();
    let int = int_class(rt, &object);
    CoreClasses {
        object,
        array,
        boolean,
        number,
        string,
        function,
        int,
    }
}

fn this_object(this: &Value) -> RunResult<ObjRef> {
    match this {
        Value::Object(o) => Ok(o.clone()),
        _ => Err(RunError::msg("requires an object")),
    }
}

fn this_string(rt: &Runtime, this: &Value) -> RunResult<StringId> {
    match this {
        Value::String(s) => Ok(*s),
        Value::Object(o) => match &o.borrow().payload {
            Payload::String(s) => Ok(*s),
            _ => Err(RunError::msg("requires a string")),
        },
        _ => Ok(this.to_string_value(rt)),
    }
}

fn object_class(rt: &Rc<Runtime>) -> ClassRef {
    ClassBuilder::new(rt, "Object")
        .ctor(Rc::new(|ctx: &mut Context, _args: &[Value]| Ok(ctx.rt().new_object())))
        .method(
            "toString",
            method(|ctx, this, _args| {
                let o = this_object(this)?;
                Ok(Value::String(o.to_string_value(ctx.rt())))
            }),
        )
        .method(
            "valueOf",
            method(|_ctx, this, _args| {
                let o = this_object(this)?;
                Ok(o.value_of())
            }),
        )
        .finish()
}

fn boxed_class(rt: &Rc<Runtime>, object: &ClassRef, name: &str) -> ClassRef {
    let is_boolean = name == "Boolean";
    ClassBuilder::new(rt, name)
        .extends(object)
        .ctor(Rc::new(move |ctx: &mut Context, args: &[Value]| {
            let rt = ctx.rt_rc();
            let value = args.first().cloned().unwrap_or(Value::Undefined);
            Ok(if is_boolean {
                let b = !args.is_empty() && value.to_boolean(&rt);
                rt.box_boolean(b)
            } else {
                let n = if args.is_empty() { 0.0 } else { value.to_number(&rt) };
                rt.box_number(n)
            })
        }))
        .method(
            "valueOf",
            method(|_ctx, this, _args| {
                let o = this_object(this)?;
                Ok(o.value_of())
            }),
        )
        .method(
            "toString",
            method(|ctx, this, _args| {
                let o = this_object(this)?;
                Ok(Value::String(o.to_string_value(ctx.rt())))
            }),
        )
        .finish()
}

/// Shorthand for wrapping a closure as a native method body.
fn method(
    f: impl Fn(&mut Context, &Value, &[Value]) -> RunResult<Value> + 'static,
) -> NativeMethod {
    Rc::new(f)
}

// ------------------------------------------------------------------
// Array
// ------------------------------------------------------------------

fn this_array(this: &Value) -> RunResult<ObjRef> {
    match this {
        Value::Object(o) if o.is_array() => Ok(o.clone()),
        _ => Err(RunError::msg("requires an array")),
    }
}

fn array_class(rt: &Rc<Runtime>, object: &ClassRef) -> ClassRef {
    ClassBuilder::new(rt, "Array")
        .extends(object)
        .ctor(Rc::new(|ctx: &mut Context, args: &[Value]| {
            let rt = ctx.rt_rc();
            let mut data = ArrayData::default();
            match args {
                [Value::Number(n)] if n.fract() == 0.0 && *n >= 0.0 => {
                    data.set_length(*n as usize);
                }
                _ => {
                    for (i, v) in args.iter().enumerate() {
                        data.set(i as f64, v.clone());
                    }
                }
            }
            Ok(rt.new_array_with(data))
        }))
        .geti(Rc::new(|obj: &ObjRef, index: f64| obj.array_get(index)))
        .seti(Rc::new(|obj: &ObjRef, index: f64, value: Value| obj.array_set(index, value)))
        .accessor(
            "length",
            Rc::new(|_rt: &Runtime, obj: &ObjRef| Value::Number(obj.array_length() as f64)),
            Some(Rc::new(|_rt: &Runtime, obj: &ObjRef, value: Value| {
                if let Value::Number(n) = value
                    && n.fract() == 0.0
                    && n >= 0.0
                    && let Payload::Array(a) = &mut obj.borrow_mut().payload
                {
                    a.set_length(n as usize);
                }
            })),
        )
        .method(
            "push",
            method(|_ctx, this, args| {
                let arr = this_array(this)?;
                if let Payload::Array(a) = &mut arr.borrow_mut().payload {
                    for v in args {
                        a.push(v.clone());
                    }
                }
                Ok(Value::Number(arr.array_length() as f64))
            }),
        )
        .method(
            "pop",
            method(|_ctx, this, _args| {
                let arr = this_array(this)?;
                let popped = match &mut arr.borrow_mut().payload {
                    Payload::Array(a) => a.pop(),
                    _ => Value::Undefined,
                };
                Ok(popped)
            }),
        )
        .method(
            "forEach",
            method(|ctx, this, args| {
                let arr = this_array(this)?;
                let args = Args::new(args, 1)?;
                let callback = args.function(0)?;
                for (i, elem) in present_elements(&arr) {
                    invoke_function(ctx, &callback, &[elem, Value::Number(i as f64), Value::Object(arr.clone())])?;
                }
                Ok(Value::Undefined)
            }),
        )
        .method(
            "filter",
            method(|ctx, this, args| {
                let arr = this_array(this)?;
                let args = Args::new(args, 1)?;
                let callback = args.function(0)?;
                let mut out = ArrayData::default();
                for (i, elem) in present_elements(&arr) {
                    let keep = invoke_function(
                        ctx,
                        &callback,
                        &[elem.clone(), Value::Number(i as f64), Value::Object(arr.clone())],
                    )?;
                    if keep.to_boolean(ctx.rt()) {
                        out.push(elem);
                    }
                }
                Ok(Value::Object(ctx.rt_rc().new_array_with(out)))
            }),
        )
        .method(
            "map",
            method(|ctx, this, args| {
                let arr = this_array(this)?;
                let args = Args::new(args, 1)?;
                let callback = args.function(0)?;
                let length = arr.array_length();
                let mut out = ArrayData::default();
                out.set_length(length);
                for (i, elem) in present_elements(&arr) {
                    let mapped = invoke_function(
                        ctx,
                        &callback,
                        &[elem, Value::Number(i as f64), Value::Object(arr.clone())],
                    )?;
                    out.set(i as f64, mapped);
                }
                out.set_length(length);
                Ok(Value::Object(ctx.rt_rc().new_array_with(out)))
            }),
        )
        .method(
            "reduce",
            method(|ctx, this, args| {
                let arr = this_array(this)?;
                let parsed = Args::new(args, 1)?;
                let callback = parsed.function(0)?;
                let mut acc = None;
                if parsed.len() > 1 {
                    acc = Some(parsed.value(1));
                }
                for (i, elem) in present_elements(&arr) {
                    acc = Some(match acc {
                        None => elem,
                        Some(acc) => invoke_function(
                            ctx,
                            &callback,
                            &[acc, elem, Value::Number(i as f64), Value::Object(arr.clone())],
                        )?,
                    });
                }
                acc.ok_or_else(|| RunError::msg("reduce of empty array with no initial value"))
            }),
        )
        .method(
            "join",
            method(|ctx, this, args| {
                let arr = this_array(this)?;
                let args = Args::new(args, 0)?;
                let rt = ctx.rt_rc();
                let separator = match args.opt_string(0)? {
                    Some(s) => rt.str(s).to_string(),
                    None => ",".to_owned(),
                };
                let joined = arr.join_array(&rt, &separator);
                Ok(Value::String(rt.intern(&joined)))
            }),
        )
        .method(
            "indexOf",
            method(|_ctx, this, args| {
                let arr = this_array(this)?;
                let needle = args.first().cloned().unwrap_or(Value::Undefined);
                for i in 0..arr.array_length() {
                    if arr.array_get(i as f64).strict_eq(&needle) {
                        return Ok(Value::Number(i as f64));
                    }
                }
                Ok(Value::Number(-1.0))
            }),
        )
        .method(
            "includes",
            method(|_ctx, this, args| {
                let arr = this_array(this)?;
                let needle = args.first().cloned().unwrap_or(Value::Undefined);
                for i in 0..arr.array_length() {
                    if arr.array_get(i as f64).identical(&needle) {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }),
        )
        .method(
            "slice",
            method(|ctx, this, args| {
                let arr = this_array(this)?;
                let parsed = Args::new(args, 0)?;
                let length = arr.array_length() as f64;
                let start = clamp_index(parsed.opt_number(0)?.unwrap_or(0.0), length);
                let end = clamp_index(parsed.opt_number(1)?.unwrap_or(length), length);
                let mut out = ArrayData::default();
                let mut i = start;
                while i < end {
                    out.push(arr.array_get(i));
                    i += 1.0;
                }
                Ok(Value::Object(ctx.rt_rc().new_array_with(out)))
            }),
        )
        .method(
            "concat",
            method(|ctx, this, args| {
                let arr = this_array(this)?;
                let mut out = ArrayData::default();
                for i in 0..arr.array_length() {
                    out.push(arr.array_get(i as f64));
                }
                for arg in args {
                    match arg {
                        Value::Object(o) if o.is_array() => {
                            for i in 0..o.array_length() {
                                out.push(o.array_get(i as f64));
                            }
                        }
                        other => out.push(other.clone()),
                    }
                }
                Ok(Value::Object(ctx.rt_rc().new_array_with(out)))
            }),
        )
        .finish()
}

/// Materialised elements of an array in index order; holes are absent.
fn present_elements(arr: &ObjRef) -> Vec<(usize, Value)> {
    let data = arr.borrow();
    match &data.payload {
        Payload::Array(a) => (0..a.length)
            .filter(|&i| a.is_present(i))
            .map(|i| (i, a.get(i as f64)))
            .collect(),
        _ => Vec::new(),
    }
}

/// Relative-index clamping shared by `slice` and friends.
fn clamp_index(i: f64, length: f64) -> f64 {
    if i < 0.0 {
        (length + i).max(0.0)
    } else {
        i.min(length)
    }
}

// ------------------------------------------------------------------
// String
// ------------------------------------------------------------------

fn string_class(rt: &Rc<Runtime>, object: &ClassRef) -> ClassRef {
    ClassBuilder::new(rt, "String")
        .extends(object)
        .ctor(Rc::new(|ctx: &mut Context, args: &[Value]| {
            let rt = ctx.rt_rc();
            let s = match args.first() {
                Some(v) => v.to_string_value(&rt),
                None => StaticStrings::Empty.into(),
            };
            Ok(rt.box_string(s))
        }))
        .accessor(
            "length",
            Rc::new(|rt: &Runtime, obj: &ObjRef| match &obj.borrow().payload {
                Payload::String(s) => Value::Number(rt.str(*s).chars().count() as f64),
                _ => Value::Undefined,
            }),
            None,
        )
        .method(
            "valueOf",
            method(|_ctx, this, _args| {
                let o = this_object(this)?;
                Ok(o.value_of())
            }),
        )
        .method(
            "toString",
            method(|ctx, this, _args| Ok(Value::String(this_string(ctx.rt(), this)?))),
        )
        .method(
            "split",
            method(|ctx, this, args| {
                let rt = ctx.rt_rc();
                let text = rt.str(this_string(&rt, this)?).to_string();
                let parsed = Args::new(args, 0)?;
                let mut out = ArrayData::default();
                match parsed.opt_string(0)? {
                    None => out.push(Value::String(rt.intern(&text))),
                    Some(sep) => {
                        let sep = rt.str(sep).to_string();
                        if sep.is_empty() {
                            for c in text.chars() {
                                out.push(Value::String(rt.intern(&c.to_string())));
                            }
                        } else {
                            for piece in text.split(&sep) {
                                out.push(Value::String(rt.intern(piece)));
                            }
                        }
                    }
                }
                Ok(Value::Object(rt.new_array_with(out)))
            }),
        )
        .method(
            "toUpperCase",
            method(|ctx, this, _args| {
                let rt = ctx.rt_rc();
                let text = rt.str(this_string(&rt, this)?).to_uppercase();
                Ok(Value::String(rt.intern(&text)))
            }),
        )
        .method(
            "toLowerCase",
            method(|ctx, this, _args| {
                let rt = ctx.rt_rc();
                let text = rt.str(this_string(&rt, this)?).to_lowercase();
                Ok(Value::String(rt.intern(&text)))
            }),
        )
        .method(
            "charAt",
            method(|ctx, this, args| {
                let rt = ctx.rt_rc();
                let text = rt.str(this_string(&rt, this)?);
                let parsed = Args::new(args, 0)?;
                let i = parsed.opt_number(0)?.unwrap_or(0.0);
                let out = if i >= 0.0 && i.fract() == 0.0 {
                    text.chars().nth(i as usize).map(|c| c.to_string()).unwrap_or_default()
                } else {
                    String::new()
                };
                Ok(Value::String(rt.intern(&out)))
            }),
        )
        .method(
            "charCodeAt",
            method(|ctx, this, args| {
                let rt = ctx.rt_rc();
                let text = rt.str(this_string(&rt, this)?);
                let parsed = Args::new(args, 0)?;
                let i = parsed.opt_number(0)?.unwrap_or(0.0);
                let code = if i >= 0.0 && i.fract() == 0.0 {
                    text.chars().nth(i as usize).map(|c| f64::from(c as u32))
                } else {
                    None
                };
                Ok(Value::Number(code.unwrap_or(f64::NAN)))
            }),
        )
        .method(
            "indexOf",
            method(|ctx, this, args| {
                let rt = ctx.rt_rc();
                let text = rt.str(this_string(&rt, this)?);
                let parsed = Args::new(args, 1)?;
                let needle = rt.str(parsed.string(0)?);
                let found = text
                    .find(&*needle)
                    .map_or(-1.0, |byte| text[..byte].chars().count() as f64);
                Ok(Value::Number(found))
            }),
        )
        .method(
            "includes",
            method(|ctx, this, args| {
                let rt = ctx.rt_rc();
                let text = rt.str(this_string(&rt, this)?);
                let parsed = Args::new(args, 1)?;
                let needle = rt.str(parsed.string(0)?);
                Ok(Value::Bool(text.contains(&*needle)))
            }),
        )
        .method(
            "startsWith",
            method(|ctx, this, args| {
                let rt = ctx.rt_rc();
                let text = rt.str(this_string(&rt, this)?);
                let parsed = Args::new(args, 1)?;
                let needle = rt.str(parsed.string(0)?);
                let position = parsed.opt_number(1)?.unwrap_or(0.0).max(0.0) as usize;
                let tail: String = text.chars().skip(position).collect();
                Ok(Value::Bool(tail.starts_with(&*needle)))
            }),
        )
        .method(
            "endsWith",
            method(|ctx, this, args| {
                let rt = ctx.rt_rc();
                let text = rt.str(this_string(&rt, this)?);
                let parsed = Args::new(args, 1)?;
                let needle = rt.str(parsed.string(0)?);
                let head: String = match parsed.opt_number(1)? {
                    Some(end) if end >= 0.0 => text.chars().take(end as usize).collect(),
                    _ => text.to_string(),
                };
                Ok(Value::Bool(head.ends_with(&*needle)))
            }),
        )
        .method(
            "slice",
            method(|ctx, this, args| {
                let rt = ctx.rt_rc();
                let text = rt.str(this_string(&rt, this)?);
                let length = text.chars().count() as f64;
                let parsed = Args::new(args, 0)?;
                let start = clamp_index(parsed.opt_number(0)?.unwrap_or(0.0), length);
                let end = clamp_index(parsed.opt_number(1)?.unwrap_or(length), length);
                let out: String = if end > start {
                    text.chars().skip(start as usize).take((end - start) as usize).collect()
                } else {
                    String::new()
                };
                Ok(Value::String(rt.intern(&out)))
            }),
        )
        .method(
            "substring",
            method(|ctx, this, args| {
                let rt = ctx.rt_rc();
                let text = rt.str(this_string(&rt, this)?);
                let length = text.chars().count() as f64;
                let parsed = Args::new(args, 0)?;
                let mut start = parsed.opt_number(0)?.unwrap_or(0.0).clamp(0.0, length);
                let mut end = parsed.opt_number(1)?.unwrap_or(length).clamp(0.0, length);
                if start > end {
                    std::mem::swap(&mut start, &mut end);
                }
                let out: String = text.chars().skip(start as usize).take((end - start) as usize).collect();
                Ok(Value::String(rt.intern(&out)))
            }),
        )
        .method(
            "repeat",
            method(|ctx, this, args| {
                let rt = ctx.rt_rc();
                let text = rt.str(this_string(&rt, this)?);
                let parsed = Args::new(args, 1)?;
                let count = parsed.number(0)?;
                if count < 0.0 || !count.is_finite() {
                    return Err(RunError::msg("invalid repeat count"));
                }
                Ok(Value::String(rt.intern(&text.repeat(count as usize))))
            }),
        )
        .method(
            "trim",
            method(|ctx, this, _args| {
                let rt = ctx.rt_rc();
                let text = rt.str(this_string(&rt, this)?);
                Ok(Value::String(rt.intern(text.trim())))
            }),
        )
        .method(
            "concat",
            method(|ctx, this, args| {
                let rt = ctx.rt_rc();
                let mut text = rt.str(this_string(&rt, this)?).to_string();
                for arg in args {
                    text.push_str(&rt.str(arg.to_string_value(&rt)));
                }
                Ok(Value::String(rt.intern(&text)))
            }),
        )
        .finish()
}

// ------------------------------------------------------------------
// Int
// ------------------------------------------------------------------

fn int_class(rt: &Rc<Runtime>, object: &ClassRef) -> ClassRef {
    ClassBuilder::new(rt, "Int")
        .extends(object)
        .ctor(Rc::new(|ctx: &mut Context, args: &[Value]| {
            let rt = ctx.rt_rc();
            let n = int_from_value(&rt, args.first().unwrap_or(&Value::Undefined))?;
            Ok(rt.new_int(n))
        }))
        .method(
            "toString",
            method(|ctx, this, _args| {
                let o = this_object(this)?;
                Ok(Value::String(o.to_string_value(ctx.rt())))
            }),
        )
        .method(
            "valueOf",
            method(|_ctx, this, _args| {
                let o = this_object(this)?;
                Ok(o.value_of())
            }),
        )
        .finish()
}

pub(crate) fn int_from_value(rt: &Runtime, v: &Value) -> RunResult<BigInt> {
    match v {
        Value::Number(n) => BigInt::from_f64(n.trunc()).ok_or_else(|| RunError::msg("cannot convert to an integer")),
        Value::Bool(b) => Ok(BigInt::from(i32::from(*b))),
        Value::String(s) => rt
            .str(*s)
            .trim()
            .parse()
            .map_err(|_| RunError::msg("cannot convert to an integer")),
        Value::Object(o) => match &o.borrow().payload {
            Payload::Int(n) => Ok(n.clone()),
            _ => Err(RunError::msg("cannot convert to an integer")),
        },
        _ => Err(RunError::msg("cannot convert to an integer")),
    }
}

// ------------------------------------------------------------------
// Globals
// ------------------------------------------------------------------

/// Populates an instance's global object with the constructor functions
/// and numeric constants every script can see.
pub(crate) fn install_globals(rt: &Rc<Runtime>, globals: &ObjRef) {
    globals.set(rt, rt.intern("NaN"), Value::Number(f64::NAN));
    globals.set(rt, rt.intern("Infinity"), Value::Number(f64::INFINITY));

    install_constructor(rt, globals, "Object", rt.object_class(), |ctx, _this, _args| {
        Ok(Value::Object(ctx.rt().new_object()))
    });
    install_constructor(rt, globals, "Array", rt.array_class(), |ctx, _this, args| {
        let class = ctx.rt().array_class();
        let constructed = class.construct(ctx, args)?;
        Ok(constructed.map_or(Value::Null, Value::Object))
    });
    install_constructor(rt, globals, "Boolean", rt.boolean_class(), |ctx, _this, args| {
        let rt = ctx.rt_rc();
        let b = args.first().is_some_and(|v| v.to_boolean(&rt));
        Ok(Value::Bool(b))
    });
    install_constructor(rt, globals, "Number", rt.number_class(), |ctx, _this, args| {
        let rt = ctx.rt_rc();
        let n = args.first().map_or(0.0, |v| v.to_number(&rt));
        Ok(Value::Number(n))
    });
    install_constructor(rt, globals, "String", rt.string_class(), |ctx, _this, args| {
        let rt = ctx.rt_rc();
        let s = match args.first() {
            Some(v) => v.to_string_value(&rt),
            None => StaticStrings::Empty.into(),
        };
        Ok(Value::String(s))
    });
    install_constructor(rt, globals, "Int", rt.int_class(), |ctx, _this, args| {
        let rt = ctx.rt_rc();
        let n = int_from_value(&rt, args.first().unwrap_or(&Value::Undefined))?;
        Ok(Value::Object(rt.new_int(n)))
    });

    // Object statics.
    let object_fn = globals.get(rt, rt.intern("Object"));
    if let Value::Object(object_fn) = object_fn {
        install_static(rt, &object_fn, "keys", |ctx, _this, args| {
            let parsed = Args::new(args, 1)?;
            let obj = parsed.object(0)?;
            let rt = ctx.rt_rc();
            let mut out = ArrayData::default();
            obj.iterate_enumerable(|k, _v| out.push(Value::String(k)));
            Ok(Value::Object(rt.new_array_with(out)))
        });
        install_static(rt, &object_fn, "values", |ctx, _this, args| {
            let parsed = Args::new(args, 1)?;
            let obj = parsed.object(0)?;
            let rt = ctx.rt_rc();
            let mut out = ArrayData::default();
            obj.iterate_enumerable(|_k, v| out.push(v));
            Ok(Value::Object(rt.new_array_with(out)))
        });
        install_static(rt, &object_fn, "entries", |ctx, _this, args| {
            let parsed = Args::new(args, 1)?;
            let obj = parsed.object(0)?;
            let rt = ctx.rt_rc();
            let mut out = ArrayData::default();
            obj.iterate_enumerable(|k, v| {
                let pair = rt.new_array(vec![Value::String(k), v]);
                out.push(Value::Object(pair));
            });
            Ok(Value::Object(rt.new_array_with(out)))
        });
        install_static(rt, &object_fn, "assign", |ctx, _this, args| {
            let parsed = Args::new(args, 1)?;
            let target = parsed.object(0)?;
            let rt = ctx.rt_rc();
            for source in args.iter().skip(1) {
                if let Value::Object(source) = source {
                    source.iterate_enumerable(|k, v| target.set(&rt, k, v));
                }
            }
            Ok(Value::Object(target))
        });
    }
}

fn install_constructor(
    rt: &Rc<Runtime>,
    globals: &ObjRef,
    name: &str,
    class: ClassRef,
    call: impl Fn(&mut Context, &Value, &[Value]) -> RunResult<Value> + 'static,
) {
    let ctor = Method::constructor(name, Rc::new(call), class);
    let function = rt.make_bound_function(&ctor, Value::Undefined);
    globals.set(rt, rt.intern(name), Value::Object(function));
}

fn install_static(
    rt: &Rc<Runtime>,
    target: &ObjRef,
    name: &str,
    body: impl Fn(&mut Context, &Value, &[Value]) -> RunResult<Value> + 'static,
) {
    let m = Method::native(name, Rc::new(body));
    let function = rt.make_bound_function(&m, Value::Undefined);
    target.set(rt, rt.intern(name), Value::Object(function));
}
