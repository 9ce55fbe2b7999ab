//! Object layout: class-described slots plus an insertion-ordered overflow
//! table for expando keys, and the native payloads behind boxed primitives,
//! arrays, functions and big integers.

use std::{
    cell::{Ref, RefCell, RefMut},
    fmt::Write,
    rc::Rc,
};

use ahash::RandomState;
use indexmap::IndexMap;
use num_bigint::BigInt;

use crate::{
    class::{ClassRef, FieldKind, Method},
    intern::StringId,
    runtime::Runtime,
    scope::Frame,
    value::{Value, bigint_to_f64, number_to_string},
};

/// Reference-counted object handle.
///
/// Identity is pointer identity. The `Rc` is the lifetime policy: when the
/// last handle drops, slots and overflow entries release their own handles
/// in turn. Reference cycles (a closure capturing its own function) are
/// never reclaimed; hosts that care tear down the owning `Instance`.
#[derive(Debug, Clone)]
pub struct ObjRef(Rc<RefCell<ObjectData>>);

#[derive(Debug)]
pub(crate) struct ObjectData {
    pub class: ClassRef,
    pub slots: Vec<Value>,
    pub overflow: IndexMap<StringId, Value, RandomState>,
    pub payload: Payload,
}

/// Native payload of an object, populated by the core bindings.
#[derive(Debug, Default)]
pub(crate) enum Payload {
    #[default]
    None,
    Boolean(bool),
    Number(f64),
    String(StringId),
    Array(ArrayData),
    Function(FunctionData),
    Int(BigInt),
}

/// Array backing storage.
///
/// `length` may exceed `elems.len()`; unmaterialised tail positions and
/// `Empty` entries are holes, which read as `undefined` but are skipped by
/// enumeration.
#[derive(Debug, Default)]
pub(crate) struct ArrayData {
    pub elems: Vec<Value>,
    pub length: usize,
}

impl ArrayData {
    pub fn from_values(elems: Vec<Value>) -> Self {
        let length = elems.len();
        Self { elems, length }
    }

    pub fn get(&self, index: f64) -> Value {
        if index < 0.0 || index.fract() != 0.0 || !index.is_finite() {
            return Value::Undefined;
        }
        match self.elems.get(index as usize) {
            Some(Value::Empty) | None => Value::Undefined,
            Some(v) => v.clone(),
        }
    }

    pub fn set(&mut self, index: f64, value: Value) {
        if index < 0.0 || index.fract() != 0.0 || !index.is_finite() {
            return;
        }
        let i = index as usize;
        if i >= self.elems.len() {
            self.elems.resize(i + 1, Value::Empty);
        }
        self.elems[i] = value;
        if i >= self.length {
            self.length = i + 1;
        }
    }

    pub fn set_length(&mut self, length: usize) {
        self.length = length;
        if self.elems.len() > length {
            self.elems.truncate(length);
        }
    }

    pub fn push(&mut self, value: Value) {
        self.set(self.length as f64, value);
    }

    pub fn pop(&mut self) -> Value {
        if self.length == 0 {
            return Value::Undefined;
        }
        let last = self.length - 1;
        let value = if last < self.elems.len() {
            std::mem::replace(&mut self.elems[last], Value::Empty)
        } else {
            Value::Empty
        };
        self.set_length(last);
        match value {
            Value::Empty => Value::Undefined,
            v => v,
        }
    }

    /// True when position `i` holds a materialised element.
    pub fn is_present(&self, i: usize) -> bool {
        matches!(self.elems.get(i), Some(v) if !v.is_empty())
    }
}

/// A function value: a callable bound to its `this` and, for closures, the
/// lexical frame captured at creation.
pub(crate) struct FunctionData {
    pub method: Rc<Method>,
    pub this: Value,
    pub scope: Option<Rc<Frame>>,
}

impl std::fmt::Debug for FunctionData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionData").field("method", &self.method).finish()
    }
}

impl ObjRef {
    /// Allocates an object of `class` with default-initialised slots.
    pub fn new(class: &ClassRef) -> Self {
        Self::with_payload(class, Payload::None)
    }

    pub(crate) fn with_payload(class: &ClassRef, payload: Payload) -> Self {
        Self(Rc::new(RefCell::new(ObjectData {
            class: Rc::clone(class),
            slots: class.default_slots(),
            overflow: IndexMap::default(),
            payload,
        })))
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn class(&self) -> ClassRef {
        Rc::clone(&self.0.borrow().class)
    }

    pub(crate) fn borrow(&self) -> Ref<'_, ObjectData> {
        self.0.borrow()
    }

    pub(crate) fn borrow_mut(&self) -> RefMut<'_, ObjectData> {
        self.0.borrow_mut()
    }

    pub fn is_function(&self) -> bool {
        matches!(self.0.borrow().payload, Payload::Function(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self.0.borrow().payload, Payload::Array(_))
    }

    pub fn is_instance_of(&self, class: &ClassRef) -> bool {
        self.class().is_derived_from(class)
    }

    /// Reads a slot; holes surface as `undefined`.
    pub(crate) fn slot(&self, i: usize) -> Value {
        match &self.0.borrow().slots[i] {
            Value::Empty => Value::Undefined,
            v => v.clone(),
        }
    }

    pub(crate) fn set_slot(&self, i: usize, value: Value) {
        self.0.borrow_mut().slots[i] = value;
    }

    pub(crate) fn ht_get(&self, key: StringId) -> Value {
        match self.0.borrow().overflow.get(&key) {
            Some(Value::Empty) | None => Value::Undefined,
            Some(v) => v.clone(),
        }
    }

    pub(crate) fn ht_set(&self, key: StringId, value: Value) {
        self.0.borrow_mut().overflow.insert(key, value);
    }

    pub(crate) fn ht_has(&self, key: StringId) -> bool {
        self.0.borrow().overflow.contains_key(&key)
    }

    pub(crate) fn ht_delete(&self, key: StringId) -> bool {
        self.0.borrow_mut().overflow.shift_remove(&key).is_some()
    }

    /// Uncached property read through the class shape then the overflow
    /// table. Call-site reads go through [`PropertyCache`] instead.
    pub fn get(&self, rt: &Runtime, key: StringId) -> Value {
        let class = self.class();
        match class.find_field(key) {
            Some(i) => match class.field(i).kind() {
                FieldKind::Variable { .. } => self.slot(i),
                FieldKind::Accessor { get, .. } => get(rt, self),
                FieldKind::Method(method) => Value::Object(rt.make_bound_function(method, Value::Object(self.clone()))),
            },
            None => self.ht_get(key),
        }
    }

    pub fn set(&self, rt: &Runtime, key: StringId, value: Value) {
        let class = self.class();
        if let Some(i) = class.find_field(key) {
            let field = class.field(i);
            match field.kind() {
                FieldKind::Accessor { set, .. } => {
                    if let Some(set) = set {
                        set(rt, self, value);
                    }
                    return;
                }
                _ if field.options().writable => {
                    self.set_slot(i, value);
                    return;
                }
                _ => {}
            }
        }
        self.ht_set(key, value);
    }

    pub fn has(&self, key: StringId) -> bool {
        self.class().find_field(key).is_some() || self.ht_has(key)
    }

    /// Visits enumerable variable fields in slot order, then overflow
    /// entries in insertion order.
    pub fn iterate_enumerable(&self, mut callback: impl FnMut(StringId, Value)) {
        let class = self.class();
        for i in 0..class.field_count() {
            let field = class.field(i);
            if field.options().enumerable && field.is_variable() {
                callback(field.key(), self.slot(i));
            }
        }
        let entries: Vec<(StringId, Value)> = self
            .0
            .borrow()
            .overflow
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        for (k, v) in entries {
            if !v.is_empty() {
                callback(k, v);
            }
        }
    }

    /// The primitive behind a boxed object, or the object itself.
    pub(crate) fn value_of(&self) -> Value {
        match &self.0.borrow().payload {
            Payload::Boolean(b) => Value::Bool(*b),
            Payload::Number(n) => Value::Number(*n),
            Payload::String(s) => Value::String(*s),
            Payload::Int(n) => Value::Number(bigint_to_f64(n)),
            _ => Value::Object(self.clone()),
        }
    }

    pub(crate) fn to_string_value(&self, rt: &Runtime) -> StringId {
        let data = self.0.borrow();
        match &data.payload {
            Payload::Boolean(b) => {
                let b = *b;
                drop(data);
                Value::Bool(b).to_string_value(rt)
            }
            Payload::Number(n) => {
                let n = *n;
                drop(data);
                number_to_string(n, rt)
            }
            Payload::String(s) => *s,
            Payload::Int(n) => {
                let text = n.to_string();
                drop(data);
                rt.intern(&text)
            }
            Payload::Function(f) => {
                let name = f.method.name();
                drop(data);
                rt.intern(&format!("[Function: {name}]"))
            }
            Payload::Array(_) => {
                drop(data);
                let joined = self.join_array(rt, ",");
                rt.intern(&joined)
            }
            Payload::None => {
                let name = data.class.name().to_owned();
                drop(data);
                rt.intern(&format!("[object {name}]"))
            }
        }
    }

    /// `Array.prototype.join` semantics: nullish elements and holes print
    /// as empty strings.
    pub(crate) fn join_array(&self, rt: &Runtime, separator: &str) -> String {
        let length = match &self.0.borrow().payload {
            Payload::Array(a) => a.length,
            _ => return String::new(),
        };
        let mut out = String::new();
        for i in 0..length {
            if i > 0 {
                out.push_str(separator);
            }
            let elem = self.array_get(i as f64);
            if !elem.is_nullish() {
                let _ = write!(out, "{}", rt.str(elem.to_string_value(rt)));
            }
        }
        out
    }

    pub(crate) fn array_get(&self, index: f64) -> Value {
        match &self.0.borrow().payload {
            Payload::Array(a) => a.get(index),
            _ => Value::Undefined,
        }
    }

    pub(crate) fn array_set(&self, index: f64, value: Value) {
        if let Payload::Array(a) = &mut self.0.borrow_mut().payload {
            a.set(index, value);
        }
    }

    pub(crate) fn array_length(&self) -> usize {
        match &self.0.borrow().payload {
            Payload::Array(a) => a.length,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn array_growth_and_holes() {
        let mut a = ArrayData::default();
        a.set(0.0, Value::Number(1.0));
        a.set(4.0, Value::Number(5.0));
        assert_eq!(a.length, 5);
        assert!(matches!(a.get(4.0), Value::Number(n) if n == 5.0));
        assert!(a.get(2.0).is_undefined());
        assert!(!a.is_present(2));
        assert!(a.is_present(4));
    }

    #[test]
    fn array_length_shrinks_storage() {
        let mut a = ArrayData::from_values(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]);
        a.set_length(1);
        assert_eq!(a.length, 1);
        assert!(a.get(1.0).is_undefined());
        a.set_length(3);
        assert_eq!(a.length, 3);
        assert!(a.get(2.0).is_undefined());
    }

    #[test]
    fn array_pop_returns_last_and_shrinks() {
        let mut a = ArrayData::from_values(vec![Value::Number(1.0), Value::Number(2.0)]);
        assert!(matches!(a.pop(), Value::Number(n) if n == 2.0));
        assert_eq!(a.length, 1);
        assert!(matches!(a.pop(), Value::Number(n) if n == 1.0));
        assert!(a.pop().is_undefined());
    }

    #[test]
    fn negative_and_fractional_indices_are_ignored() {
        let mut a = ArrayData::default();
        a.set(-1.0, Value::Number(9.0));
        a.set(1.5, Value::Number(9.0));
        assert_eq!(a.length, 0);
        assert!(a.get(-1.0).is_undefined());
        assert!(a.get(1.5).is_undefined());
    }
}
