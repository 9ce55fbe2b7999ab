//! Class metadata: the shape registry native objects and module exports
//! describe themselves through.
//!
//! A [`Class`] is a frozen, ordered list of [`Field`]s plus optional hooks:
//! a constructor (what `new` invokes), and indexed accessors (`geti`/`seti`)
//! that let array-like classes intercept numeric keys before the property
//! path runs. Subclasses inherit their superclass's fields in the same slot
//! order, so a slot index is valid across the whole derivation chain.

use std::{cell::RefCell, fmt, rc::Rc};

use ahash::AHashMap;

use crate::{
    context::Context,
    error::RunResult,
    intern::{StaticStrings, StringId},
    object::ObjRef,
    runtime::Runtime,
    value::Value,
};

pub type ClassRef = Rc<Class>;

/// Callback types through which host code plugs into the engine.
pub type NativeMethod = Rc<dyn Fn(&mut Context, &Value, &[Value]) -> RunResult<Value>>;
pub type NativeCtor = Rc<dyn Fn(&mut Context, &[Value]) -> RunResult<ObjRef>>;
pub type AccessorGet = Rc<dyn Fn(&Runtime, &ObjRef) -> Value>;
pub type AccessorSet = Rc<dyn Fn(&Runtime, &ObjRef, Value)>;
pub type IndexedGet = Rc<dyn Fn(&ObjRef, f64) -> Value>;
pub type IndexedSet = Rc<dyn Fn(&ObjRef, f64, Value)>;

/// Per-field option bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldOptions {
    pub enumerable: bool,
    pub writable: bool,
    pub configurable: bool,
}

impl FieldOptions {
    pub const NONE: Self = Self {
        enumerable: false,
        writable: false,
        configurable: false,
    };

    /// The usual options of a plain data field.
    pub const DATA: Self = Self {
        enumerable: true,
        writable: true,
        configurable: false,
    };
}

/// What a field is: a stored slot, a computed accessor, or a callable.
pub enum FieldKind {
    Variable {
        default: Value,
        /// External id for hosts that address slots without a name lookup
        /// (module exports use this).
        id: Option<u32>,
    },
    Accessor {
        get: AccessorGet,
        set: Option<AccessorSet>,
    },
    Method(Rc<Method>),
}

pub struct Field {
    key: StringId,
    options: FieldOptions,
    kind: FieldKind,
}

impl Field {
    pub fn key(&self) -> StringId {
        self.key
    }

    pub fn options(&self) -> FieldOptions {
        self.options
    }

    pub fn kind(&self) -> &FieldKind {
        &self.kind
    }

    pub fn is_variable(&self) -> bool {
        matches!(self.kind, FieldKind::Variable { .. })
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            FieldKind::Variable { .. } => "variable",
            FieldKind::Accessor { .. } => "accessor",
            FieldKind::Method(_) => "method",
        };
        f.debug_struct("Field").field("key", &self.key).field("kind", &kind).finish()
    }
}

/// A callable held on a class or bound into a function object.
///
/// The body is either a host callback or a script function compiled from a
/// function literal; `constructor_class` is what `new f(...)` instantiates
/// and is absent on plain functions ("not a constructor").
pub struct Method {
    name: RefCell<String>,
    constructor_class: RefCell<Option<ClassRef>>,
    pub(crate) body: MethodBody,
}

pub(crate) enum MethodBody {
    Native(NativeMethod),
    Script(crate::expr::ScriptBody),
}

impl Method {
    pub fn native(name: impl Into<String>, body: NativeMethod) -> Rc<Self> {
        Rc::new(Self {
            name: RefCell::new(name.into()),
            constructor_class: RefCell::new(None),
            body: MethodBody::Native(body),
        })
    }

    pub(crate) fn script(name: String, body: crate::expr::ScriptBody) -> Rc<Self> {
        Rc::new(Self {
            name: RefCell::new(name),
            constructor_class: RefCell::new(None),
            body: MethodBody::Script(body),
        })
    }

    pub fn constructor(name: impl Into<String>, body: NativeMethod, class: ClassRef) -> Rc<Self> {
        Rc::new(Self {
            name: RefCell::new(name.into()),
            constructor_class: RefCell::new(Some(class)),
            body: MethodBody::Native(body),
        })
    }

    pub fn name(&self) -> String {
        self.name.borrow().clone()
    }

    pub fn constructor_class(&self) -> Option<ClassRef> {
        self.constructor_class.borrow().clone()
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method").field("name", &self.name.borrow()).finish()
    }
}

/// Frozen object shape. See the module docs.
pub struct Class {
    name: String,
    super_class: Option<ClassRef>,
    fields: Vec<Rc<Field>>,
    field_map: AHashMap<StringId, usize>,
    /// Maps external field ids to slot indices.
    field_index: Vec<usize>,
    ctor: Option<NativeCtor>,
    geti: Option<IndexedGet>,
    seti: Option<IndexedSet>,
}

impl Class {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    pub fn field(&self, i: usize) -> &Rc<Field> {
        &self.fields[i]
    }

    pub fn find_field(&self, key: StringId) -> Option<usize> {
        self.field_map.get(&key).copied()
    }

    pub fn has_ctor(&self) -> bool {
        self.ctor.is_some()
    }

    pub fn has_geti(&self) -> bool {
        self.geti.is_some()
    }

    pub fn has_seti(&self) -> bool {
        self.seti.is_some()
    }

    pub(crate) fn geti(&self, obj: &ObjRef, index: f64) -> Value {
        self.geti.as_ref().expect("class has no indexed getter")(obj, index)
    }

    pub(crate) fn seti(&self, obj: &ObjRef, index: f64, value: Value) {
        self.seti.as_ref().expect("class has no indexed setter")(obj, index, value);
    }

    pub(crate) fn construct(&self, ctx: &mut Context, args: &[Value]) -> RunResult<Option<ObjRef>> {
        match &self.ctor {
            Some(ctor) => ctor(ctx, args).map(Some),
            None => Ok(None),
        }
    }

    /// Slot index of a field addressed by external id.
    pub fn slot_of_id(&self, id: u32) -> usize {
        self.field_index[id as usize]
    }

    /// Walks the superclass chain looking for `other`.
    pub fn is_derived_from(self: &Rc<Self>, other: &ClassRef) -> bool {
        let mut current = Some(Rc::clone(self));
        while let Some(c) = current {
            if Rc::ptr_eq(&c, other) {
                return true;
            }
            current = c.super_class.clone();
        }
        false
    }

    /// Default slot values for a freshly initialised object of this class.
    pub(crate) fn default_slots(&self) -> Vec<Value> {
        self.fields
            .iter()
            .map(|f| match f.kind() {
                FieldKind::Variable { default, .. } => default.clone(),
                _ => Value::Undefined,
            })
            .collect()
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.name)
            .field("fields", &self.fields.len())
            .finish()
    }
}

/// Incremental [`Class`] construction.
///
/// Inherited fields land first so slot indices stay compatible with the
/// superclass; redefining an inherited key replaces the field in place.
pub struct ClassBuilder<'rt> {
    rt: &'rt Runtime,
    name: String,
    super_class: Option<ClassRef>,
    fields: Vec<Rc<Field>>,
    field_map: AHashMap<StringId, usize>,
    field_index: Vec<usize>,
    ctor: Option<NativeCtor>,
    geti: Option<IndexedGet>,
    seti: Option<IndexedSet>,
}

impl<'rt> ClassBuilder<'rt> {
    pub fn new(rt: &'rt Runtime, name: impl Into<String>) -> Self {
        Self {
            rt,
            name: name.into(),
            super_class: None,
            fields: Vec::new(),
            field_map: AHashMap::new(),
            field_index: Vec::new(),
            ctor: None,
            geti: None,
            seti: None,
        }
    }

    #[must_use]
    pub fn extends(mut self, super_class: &ClassRef) -> Self {
        self.fields = super_class.fields.clone();
        self.field_map = super_class.field_map.clone();
        self.field_index = super_class.field_index.clone();
        self.super_class = Some(Rc::clone(super_class));
        self
    }

    fn push(&mut self, key: StringId, options: FieldOptions, kind: FieldKind) {
        let external_id = match &kind {
            FieldKind::Variable { id, .. } => *id,
            _ => None,
        };
        let field = Rc::new(Field { key, options, kind });
        let slot = match self.field_map.get(&key) {
            Some(&i) => {
                self.fields[i] = field;
                i
            }
            None => {
                let i = self.fields.len();
                self.field_map.insert(key, i);
                self.fields.push(field);
                i
            }
        };
        if let Some(id) = external_id {
            let id = id as usize;
            if id >= self.field_index.len() {
                self.field_index.resize(id + 1, 0);
            }
            self.field_index[id] = slot;
        }
    }

    #[must_use]
    pub fn variable(mut self, name: &str, default: Value, options: FieldOptions) -> Self {
        let key = self.rt.intern(name);
        self.push(key, options, FieldKind::Variable { default, id: None });
        self
    }

    #[must_use]
    pub fn variable_with_id(mut self, name: &str, id: u32, options: FieldOptions) -> Self {
        let key = self.rt.intern(name);
        self.push(key, options, FieldKind::Variable { default: Value::Undefined, id: Some(id) });
        self
    }

    #[must_use]
    pub fn accessor(mut self, name: &str, get: AccessorGet, set: Option<AccessorSet>) -> Self {
        let key = self.rt.intern(name);
        self.push(key, FieldOptions::NONE, FieldKind::Accessor { get, set });
        self
    }

    #[must_use]
    pub fn method(mut self, name: &str, body: NativeMethod) -> Self {
        let key = self.rt.intern(name);
        let method = Method::native(name, body);
        self.push(key, FieldOptions::NONE, FieldKind::Method(method));
        self
    }

    #[must_use]
    pub fn ctor(mut self, ctor: NativeCtor) -> Self {
        self.ctor = Some(ctor);
        self
    }

    #[must_use]
    pub fn geti(mut self, geti: IndexedGet) -> Self {
        self.geti = Some(geti);
        self
    }

    #[must_use]
    pub fn seti(mut self, seti: IndexedSet) -> Self {
        self.seti = Some(seti);
        self
    }

    /// Freezes the field list and registers the class (anonymous classes,
    /// such as object-literal shapes and module export shapes, stay out of
    /// the registry).
    pub fn finish(self) -> ClassRef {
        let class = Rc::new(Class {
            name: self.name,
            super_class: self.super_class,
            fields: self.fields,
            field_map: self.field_map,
            field_index: self.field_index,
            ctor: self.ctor,
            geti: self.geti,
            seti: self.seti,
        });
        if !class.name.is_empty() {
            self.rt.register_class(&class);
        }
        class
    }
}

/// Single-slot memoisation of a property lookup, keyed on `(class, key)`.
///
/// Call sites own one cache per property access; a hit skips the field-map
/// lookup entirely. A stale entry is harmless — it just misses and
/// re-resolves.
#[derive(Debug, Default)]
pub(crate) struct PropertyCache {
    slot: RefCell<CacheSlot>,
}

#[derive(Debug)]
struct CacheSlot {
    class: Option<ClassRef>,
    key: StringId,
    index: Option<usize>,
}

impl Default for CacheSlot {
    fn default() -> Self {
        Self {
            class: None,
            key: StaticStrings::Empty.into(),
            index: None,
        }
    }
}

impl PropertyCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn find(&self, class: &ClassRef, key: StringId) -> Option<usize> {
        let mut slot = self.slot.borrow_mut();
        let hit = slot.key == key && slot.class.as_ref().is_some_and(|c| Rc::ptr_eq(c, class));
        if !hit {
            slot.class = Some(Rc::clone(class));
            slot.key = key;
            slot.index = class.find_field(key);
        }
        slot.index
    }

    pub fn get(&self, rt: &Runtime, obj: &ObjRef, key: StringId) -> Value {
        let class = obj.class();
        match self.find(&class, key) {
            Some(i) => match class.field(i).kind() {
                FieldKind::Variable { .. } => obj.slot(i),
                FieldKind::Accessor { get, .. } => get(rt, obj),
                FieldKind::Method(method) => Value::Object(rt.make_bound_function(method, Value::Object(obj.clone()))),
            },
            None => obj.ht_get(key),
        }
    }

    pub fn set(&self, rt: &Runtime, obj: &ObjRef, key: StringId, value: Value) {
        let class = obj.class();
        if let Some(i) = self.find(&class, key) {
            let field = class.field(i);
            match field.kind() {
                FieldKind::Accessor { set, .. } => {
                    if let Some(set) = set {
                        set(rt, obj, value);
                    }
                    return;
                }
                _ if field.options().writable => {
                    obj.set_slot(i, value);
                    return;
                }
                _ => {}
            }
        }
        obj.ht_set(key, value);
    }

    pub fn has(&self, obj: &ObjRef, key: StringId) -> bool {
        let class = obj.class();
        self.find(&class, key).is_some() || obj.ht_has(key)
    }

    /// Deletes an overflow property; class fields are not deletable.
    pub fn del(&self, obj: &ObjRef, key: StringId) -> bool {
        let class = obj.class();
        if self.find(&class, key).is_some() {
            return false;
        }
        obj.ht_delete(key);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inherited_fields_keep_slot_order() {
        let rt = Runtime::new();
        let base = ClassBuilder::new(&rt, "")
            .variable("a", Value::Number(1.0), FieldOptions::DATA)
            .variable("b", Value::Number(2.0), FieldOptions::DATA)
            .finish();
        let derived = ClassBuilder::new(&rt, "")
            .extends(&base)
            .variable("c", Value::Number(3.0), FieldOptions::DATA)
            .finish();
        let a = rt.intern("a");
        let c = rt.intern("c");
        assert_eq!(base.find_field(a), Some(0));
        assert_eq!(derived.find_field(a), Some(0));
        assert_eq!(derived.find_field(c), Some(2));
        assert!(derived.is_derived_from(&base));
        assert!(!base.is_derived_from(&derived));
    }

    #[test]
    fn redefined_field_replaces_in_place() {
        let rt = Runtime::new();
        let base = ClassBuilder::new(&rt, "")
            .variable("x", Value::Number(1.0), FieldOptions::DATA)
            .finish();
        let derived = ClassBuilder::new(&rt, "")
            .extends(&base)
            .variable("x", Value::Number(9.0), FieldOptions::DATA)
            .finish();
        assert_eq!(derived.field_count(), 1);
        let x = rt.intern("x");
        assert_eq!(derived.find_field(x), Some(0));
    }

    #[test]
    fn property_cache_tracks_class_changes() {
        let rt = Runtime::new();
        let class_a = ClassBuilder::new(&rt, "")
            .variable("v", Value::Number(1.0), FieldOptions::DATA)
            .finish();
        let class_b = ClassBuilder::new(&rt, "").finish();
        let key = rt.intern("v");
        let obj_a = ObjRef::new(&class_a);
        let obj_b = ObjRef::new(&class_b);
        obj_b.ht_set(key, Value::Number(7.0));

        let cache = PropertyCache::new();
        assert!(matches!(cache.get(&rt, &obj_a, key), Value::Number(n) if n == 1.0));
        // Different class through the same cache slot: must re-resolve.
        assert!(matches!(cache.get(&rt, &obj_b, key), Value::Number(n) if n == 7.0));
        assert!(matches!(cache.get(&rt, &obj_a, key), Value::Number(n) if n == 1.0));
    }
}
