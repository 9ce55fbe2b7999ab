//! String interning.
//!
//! Every string the engine touches — literals, identifiers, property keys,
//! coercion results — is interned into a [`Runtime`]-owned pool and handled
//! by a [`StringId`]. Two interned strings are byte-equal exactly when their
//! ids are equal, so all hot-path comparisons are integer compares.
//!
//! Ids are laid out as follows:
//! * the pinned sentinel table below, at fixed low ids
//! * everything after — strings interned at parse time or runtime
//!
//! [`Runtime`]: crate::runtime::Runtime

use std::{fmt, rc::Rc};

use ahash::AHashMap;
use strum::{EnumIter, EnumString, IntoEnumIterator, IntoStaticStr};

/// Index into the interner's storage.
///
/// Uses `u32` to keep [`Value`](crate::value::Value) small; four billion
/// unique strings is far more than any script will produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct StringId(u32);

impl StringId {
    #[inline]
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<StaticStrings> for StringId {
    fn from(s: StaticStrings) -> Self {
        Self(s as u32)
    }
}

/// Strings the engine needs at fixed ids, pinned for the life of the pool.
///
/// The coercion sentinels (`"undefined"`, `"NaN"`, ...) come first; the rest
/// are property and method names hot enough to deserve compile-time ids.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, IntoStaticStr)]
pub enum StaticStrings {
    #[strum(serialize = "")]
    Empty,
    #[strum(serialize = "NaN")]
    NaN,
    #[strum(serialize = "Infinity")]
    Infinity,
    #[strum(serialize = "-Infinity")]
    NegInfinity,
    #[strum(serialize = "undefined")]
    Undefined,
    #[strum(serialize = "null")]
    Null,
    #[strum(serialize = "true")]
    True,
    #[strum(serialize = "false")]
    False,

    // Hot property keys
    #[strum(serialize = "length")]
    Length,
    #[strum(serialize = "default")]
    Default,
    #[strum(serialize = "*")]
    Star,
    #[strum(serialize = "toString")]
    ToString,
    #[strum(serialize = "valueOf")]
    ValueOf,
    #[strum(serialize = "name")]
    Name,
    #[strum(serialize = "message")]
    Message,
}

/// Content-addressed string pool.
///
/// Entries are never removed: the pool lives exactly as long as its
/// `Runtime`, and scripts intern a bounded set of strings. Storage is
/// `Rc<str>` so lookups hand out cheap clones instead of borrow guards.
#[derive(Debug)]
pub(crate) struct Interner {
    map: AHashMap<Rc<str>, StringId>,
    storage: Vec<Rc<str>>,
}

impl Interner {
    pub fn new() -> Self {
        let mut interner = Self {
            map: AHashMap::new(),
            storage: Vec::with_capacity(64),
        };
        for s in StaticStrings::iter() {
            let text: &'static str = s.into();
            let id = interner.intern(text);
            debug_assert_eq!(id, StringId::from(s));
        }
        interner
    }

    /// Interns `text`, returning the id of the unique pooled copy.
    pub fn intern(&mut self, text: &str) -> StringId {
        if let Some(&id) = self.map.get(text) {
            return id;
        }
        let id = StringId(u32::try_from(self.storage.len()).expect("interner overflow"));
        let rc: Rc<str> = Rc::from(text);
        self.storage.push(Rc::clone(&rc));
        self.map.insert(rc, id);
        id
    }

    /// Looks up the text of an interned string.
    pub fn get(&self, id: StringId) -> Rc<str> {
        Rc::clone(&self.storage[id.index()])
    }

    /// Number of interned strings, sentinels included.
    pub fn len(&self) -> usize {
        self.storage.len()
    }
}

impl fmt::Display for StaticStrings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s: &'static str = (*self).into();
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn interning_is_content_addressed() {
        let mut interner = Interner::new();
        let a = interner.intern("hello");
        let b = interner.intern("hello");
        let c = interner.intern("world");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(&*interner.get(a), "hello");
        assert_eq!(&*interner.get(c), "world");
    }

    #[test]
    fn distinct_content_gets_distinct_ids() {
        let mut interner = Interner::new();
        let ids: Vec<_> = ["a", "b", "ab", "a b", "A"].iter().map(|s| interner.intern(s)).collect();
        for (i, &x) in ids.iter().enumerate() {
            for (j, &y) in ids.iter().enumerate() {
                assert_eq!(x == y, i == j);
            }
        }
    }

    #[test]
    fn sentinels_sit_at_fixed_ids() {
        let mut interner = Interner::new();
        assert_eq!(interner.intern(""), StaticStrings::Empty.into());
        assert_eq!(interner.intern("NaN"), StaticStrings::NaN.into());
        assert_eq!(interner.intern("-Infinity"), StaticStrings::NegInfinity.into());
        assert_eq!(interner.intern("undefined"), StaticStrings::Undefined.into());
        assert_eq!(interner.intern("length"), StaticStrings::Length.into());
    }

    #[test]
    fn static_strings_round_trip_through_strum() {
        for s in StaticStrings::iter() {
            let text: &'static str = s.into();
            if !text.is_empty() {
                assert_eq!(StaticStrings::from_str(text).unwrap(), s);
            }
        }
    }
}
