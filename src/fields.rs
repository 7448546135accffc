//! Named field storage, the time levels of a time loop and fields shared with equation terms.
use crate::Real;
use nalgebra::DVector;
use rustc_hash::FxHashMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// A collection of named field vectors in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldStore<T: Real> {
    names: Vec<String>,
    values: Vec<DVector<T>>,
    index: FxHashMap<String, usize>,
}

impl<T: Real> Default for FieldStore<T> {
    fn default() -> Self {
        Self {
            names: Vec::new(),
            values: Vec::new(),
            index: FxHashMap::default(),
        }
    }
}

impl<T: Real> FieldStore<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_field(mut self, name: impl Into<String>, value: DVector<T>) -> Self {
        self.insert(name, value);
        self
    }

    /// Inserts a field, returning the previous value if the name was already taken.
    ///
    /// Replacing a field keeps its original position.
    pub fn insert(&mut self, name: impl Into<String>, value: DVector<T>) -> Option<DVector<T>> {
        let name = name.into();
        if let Some(&i) = self.index.get(&name) {
            Some(std::mem::replace(&mut self.values[i], value))
        } else {
            self.index.insert(name.clone(), self.values.len());
            self.names.push(name);
            self.values.push(value);
            None
        }
    }

    pub fn get(&self, name: &str) -> Option<&DVector<T>> {
        self.index.get(name).map(|&i| &self.values[i])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut DVector<T>> {
        let i = *self.index.get(name)?;
        Some(&mut self.values[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DVector<T>)> {
        self.names.iter().map(String::as_str).zip(&self.values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// A store with the same fields, all set to zero.
    pub fn zeros_like(&self) -> Self {
        Self {
            names: self.names.clone(),
            values: self
                .values
                .iter()
                .map(|v| DVector::zeros(v.len()))
                .collect(),
            index: self.index.clone(),
        }
    }

    /// Copies the values of every field of `self` from the field of the same name in `other`.
    ///
    /// Panics if `other` lacks one of the fields or a field has a different length.
    pub fn assign_from(&mut self, other: &FieldStore<T>) {
        for (name, value) in self.names.iter().zip(&mut self.values) {
            let source = other
                .get(name)
                .unwrap_or_else(|| panic!("field {} missing from source store", name));
            value.copy_from(source);
        }
    }
}

/// The fields of a time loop at the time levels `n - 1`, `n` and `n + 1`, plus scheme-specific
/// intermediate levels.
#[derive(Debug, Clone)]
pub struct TimeLevelFields<T: Real> {
    pub nm1: FieldStore<T>,
    pub n: FieldStore<T>,
    pub np1: FieldStore<T>,
    extra: Vec<(String, FieldStore<T>)>,
}

impl<T: Real> TimeLevelFields<T> {
    /// Creates zero-initialised levels with the layout of `template`.
    pub fn new(template: &FieldStore<T>) -> Self {
        Self::with_extra_levels(template, &[])
    }

    pub fn with_extra_levels(template: &FieldStore<T>, extra_levels: &[&str]) -> Self {
        Self {
            nm1: template.zeros_like(),
            n: template.zeros_like(),
            np1: template.zeros_like(),
            extra: extra_levels
                .iter()
                .map(|&name| (name.to_string(), template.zeros_like()))
                .collect(),
        }
    }

    pub fn level(&self, name: &str) -> Option<&FieldStore<T>> {
        match name {
            "nm1" => Some(&self.nm1),
            "n" => Some(&self.n),
            "np1" => Some(&self.np1),
            _ => self
                .extra
                .iter()
                .find(|(level, _)| level == name)
                .map(|(_, store)| store),
        }
    }

    pub fn level_mut(&mut self, name: &str) -> Option<&mut FieldStore<T>> {
        match name {
            "nm1" => Some(&mut self.nm1),
            "n" => Some(&mut self.n),
            "np1" => Some(&mut self.np1),
            _ => self
                .extra
                .iter_mut()
                .find(|(level, _)| level == name)
                .map(|(_, store)| store),
        }
    }

    /// Sets levels `n` and `n + 1` from the model state.
    pub fn initialise(&mut self, state: &FieldStore<T>) {
        self.n.assign_from(state);
        self.np1.assign_from(state);
    }

    /// Shifts the levels at the start of a step: `nm1 <- n`, `n <- np1`.
    pub fn update(&mut self) {
        std::mem::swap(&mut self.nm1, &mut self.n);
        self.n.assign_from(&self.np1);
    }
}

/// A field value read by equation terms and written by the stepper that prescribes it.
///
/// Clones share the same value.
#[derive(Debug, Clone)]
pub struct SharedField<T: Real> {
    value: Arc<RwLock<DVector<T>>>,
}

impl<T: Real> SharedField<T> {
    pub fn new(value: DVector<T>) -> Self {
        Self {
            value: Arc::new(RwLock::new(value)),
        }
    }

    pub fn len(&self) -> usize {
        self.read(|value| value.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Calls `f` with the current value.
    pub fn read<R>(&self, f: impl FnOnce(&DVector<T>) -> R) -> R {
        f(&self.value.read())
    }

    pub fn get(&self) -> DVector<T> {
        self.read(|value| value.clone())
    }

    /// Replaces the value. The length may change.
    pub fn set(&self, value: &DVector<T>) {
        let mut guard = self.value.write();
        if guard.len() == value.len() {
            guard.copy_from(value);
        } else {
            *guard = value.clone();
        }
    }
}
