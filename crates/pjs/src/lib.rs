#![doc = include_str!("../../../README.md")]
#![expect(clippy::cast_possible_truncation, reason = "numeric narrowing is checked")]
#![expect(clippy::cast_sign_loss, reason = "sign-changing casts are intentional")]
#![expect(clippy::float_cmp, reason = "value semantics require exact float comparison")]

mod builtins;
mod class;
mod context;
mod error;
mod expr;
mod fiber;
mod intern;
mod lexer;
mod module;
mod object;
mod parser;
mod runtime;
mod scope;
mod stmt;
mod value;

pub use crate::{
    class::{
        AccessorGet, AccessorSet, Class, ClassBuilder, ClassRef, Field, FieldKind, FieldOptions, IndexedGet,
        IndexedSet, Method, NativeCtor, NativeMethod,
    },
    context::{Args, Context},
    error::{CodeLoc, Exception, ParseError, RunError, RunResult, StackFrame, Thrown},
    fiber::Fiber,
    intern::{StaticStrings, StringId},
    module::{Instance, LegacyImports, Module, ModuleId, ModuleResolver, Source},
    object::ObjRef,
    runtime::Runtime,
    value::Value,
};
