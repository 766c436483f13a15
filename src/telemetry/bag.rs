//! Property and measurement bags attached to analytics events.

use std::collections::btree_map::{BTreeMap, IntoIter, Iter};
use std::ops::{Deref, DerefMut};

/// Ordered string-keyed mapping with last-write-wins merge.
///
/// Merging never removes keys that are absent from the source.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueBag<T> {
    values: BTreeMap<String, T>,
}

/// String-valued properties of an event.
pub type PropertyBag = ValueBag<String>;

/// Numeric measurements of an event.
pub type MeasurementBag = ValueBag<f64>;

impl<T> ValueBag<T> {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    /// Insert or overwrite a value, returning `self` for chaining.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<T>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Insert only if the key is not present yet.
    ///
    /// Returns `true` if the value was inserted.
    pub fn try_add(&mut self, key: impl Into<String>, value: T) -> bool {
        let key = key.into();
        if self.values.contains_key(&key) {
            return false;
        }
        self.values.insert(key, value);
        true
    }
}

impl<T: Clone> ValueBag<T> {
    /// Copy every entry of `other` into this bag, overwriting on collision.
    pub fn add_all(&mut self, other: &ValueBag<T>) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    /// Same as [`add_all`](Self::add_all) for an optional source.
    pub fn add_all_opt(&mut self, other: Option<&ValueBag<T>>) {
        if let Some(other) = other {
            self.add_all(other);
        }
    }

    /// Build a new bag from `base` with `overlay` merged on top.
    pub fn merged(base: &ValueBag<T>, overlay: Option<&ValueBag<T>>) -> Self {
        let mut bag = base.clone();
        bag.add_all_opt(overlay);
        bag
    }
}

impl<T> Deref for ValueBag<T> {
    type Target = BTreeMap<String, T>;

    fn deref(&self) -> &Self::Target {
        &self.values
    }
}

impl<T> DerefMut for ValueBag<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.values
    }
}

impl<K: Into<String>, T> FromIterator<(K, T)> for ValueBag<T> {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl<T> IntoIterator for ValueBag<T> {
    type Item = (String, T);
    type IntoIter = IntoIter<String, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a ValueBag<T> {
    type Item = (&'a String, &'a T);
    type IntoIter = Iter<'a, String, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.iter()
    }
}
