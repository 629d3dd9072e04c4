//! Typed per-node attributes.
//!
//! Rewrite passes annotate nodes with facts they derive (scopes, inferred
//! types, "already guarded" markers). Each fact has an [`AttributeKey`] that
//! fixes the type of its value, so reads never need a cast.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;

/// Names an attribute and the type of its value.
///
/// Keys are usually declared as constants:
///
/// ```
/// use ward_tree::AttributeKey;
///
/// const GUARDED: AttributeKey<bool> = AttributeKey::new("guarded");
/// assert_eq!(GUARDED.name(), "guarded");
/// ```
pub struct AttributeKey<T> {
    name: &'static str,
    _value: PhantomData<fn() -> T>,
}

impl<T> AttributeKey<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _value: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> Clone for AttributeKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for AttributeKey<T> {}

impl<T> fmt::Debug for AttributeKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AttributeKey({:?})", self.name)
    }
}

/// The attribute map of one node.
///
/// Read through [`Tree::attributes`](crate::Tree::attributes); written through
/// [`Tree::set_attribute`](crate::Tree::set_attribute), which refuses once the
/// node is frozen.
#[derive(Default)]
pub struct Attributes {
    values: HashMap<&'static str, Box<dyn Any>>,
    frozen: bool,
}

impl Attributes {
    /// The value stored under `key`, if it has the key's type.
    pub fn get<T: Any>(&self, key: AttributeKey<T>) -> Option<&T> {
        self.values.get(key.name)?.downcast_ref()
    }

    pub fn contains<T: Any>(&self, key: AttributeKey<T>) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Attribute names in sorted order.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.values.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Stores `value`, returning the previous value if it had the same type.
    pub(crate) fn insert<T: Any>(&mut self, key: AttributeKey<T>, value: T) -> Option<T> {
        let previous = self.values.insert(key.name, Box::new(value))?;
        previous.downcast().ok().map(|boxed| *boxed)
    }

    pub(crate) fn remove<T: Any>(&mut self, key: AttributeKey<T>) -> Option<T> {
        if !self.contains(key) {
            return None;
        }
        let removed = self.values.remove(key.name)?;
        removed.downcast().ok().map(|boxed| *boxed)
    }

    pub(crate) fn freeze(&mut self) {
        self.frozen = true;
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attributes")
            .field("names", &self.names())
            .field("frozen", &self.frozen)
            .finish()
    }
}
