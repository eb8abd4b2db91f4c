//! Parameters and the per-node parameter store.
//!
//! Writers serialize on a single mutex and publish a fresh snapshot; readers
//! load the current snapshot without locking, so a reader never observes a
//! partially inserted entry.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use arc_swap::ArcSwap;

/// Parameter value kinds.
#[derive(Clone)]
pub enum ParameterValue {
    Text(String),
    /// Structured XML fragment, kept as its serialized form.
    Xml(String),
    Object(Arc<dyn Any + Send + Sync>),
}

impl ParameterValue {
    pub fn param_type(&self) -> ParameterType {
        match self {
            ParameterValue::Text(_) => ParameterType::Text,
            ParameterValue::Xml(_) => ParameterType::Xml,
            ParameterValue::Object(_) => ParameterType::Object,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ParameterValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Downcast an opaque object value.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<&T> {
        match self {
            ParameterValue::Object(o) => o.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// "true", "yes" and "1" (any case) count as true.
    pub fn is_true(&self) -> bool {
        match self {
            ParameterValue::Text(s) => {
                let s = s.trim();
                s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("yes") || s == "1"
            }
            ParameterValue::Object(o) => o.downcast_ref::<bool>().copied().unwrap_or(false),
            ParameterValue::Xml(_) => false,
        }
    }
}

impl fmt::Debug for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Text(s) => f.debug_tuple("Text").field(s).finish(),
            ParameterValue::Xml(s) => f.debug_tuple("Xml").field(s).finish(),
            ParameterValue::Object(_) => f.write_str("Object(..)"),
        }
    }
}

impl From<&str> for ParameterValue {
    fn from(s: &str) -> Self {
        ParameterValue::Text(s.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(s: String) -> Self {
        ParameterValue::Text(s)
    }
}

/// Type tag derived from the value kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterType {
    Text,
    Xml,
    Object,
}

/// A named configuration value.
#[derive(Debug, Clone)]
pub struct Parameter {
    name: String,
    value: ParameterValue,
    locked: bool,
    editable: bool,
}

impl Parameter {
    pub fn new(name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            locked: false,
            editable: true,
        }
    }

    pub fn locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn value(&self) -> &ParameterValue {
        &self.value
    }
    pub fn param_type(&self) -> ParameterType {
        self.value.param_type()
    }
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Set at lookup time: true only when found in the queried node's own store.
    pub fn is_editable(&self) -> bool {
        self.editable
    }

    pub fn with_editable(mut self, editable: bool) -> Self {
        self.editable = editable;
        self
    }
}

/// Notified synchronously, in registration order, after a parameter is added.
pub trait ParameterObserver: Send + Sync {
    fn parameter_changed(&self, name: &str, value: &ParameterValue);
}

/// Local parameter storage of one node. Parent fallback and lock inheritance
/// live in the description tree, which knows the ancestor chain.
#[derive(Default)]
pub struct ParameterStore {
    snapshot: ArcSwap<HashMap<String, Parameter>>,
    write: Mutex<()>,
    observers: RwLock<Vec<Arc<dyn ParameterObserver>>>,
}

impl ParameterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace, then notify observers.
    pub fn add(&self, param: Parameter) {
        let name = param.name.clone();
        let value = param.value.clone();
        {
            let _w = self.write.lock().unwrap_or_else(PoisonError::into_inner);
            let mut next = HashMap::clone(&self.snapshot.load());
            next.insert(name.clone(), param);
            self.snapshot.store(Arc::new(next));
        }

        let observers = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for o in observers {
            o.parameter_changed(&name, &value);
        }
    }

    pub fn remove(&self, name: &str) -> Option<Parameter> {
        let _w = self.write.lock().unwrap_or_else(PoisonError::into_inner);
        let cur = self.snapshot.load();
        if !cur.contains_key(name) {
            return None;
        }
        let mut next = HashMap::clone(&cur);
        let removed = next.remove(name);
        self.snapshot.store(Arc::new(next));
        removed
    }

    pub fn get(&self, name: &str) -> Option<Parameter> {
        self.snapshot.load().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.snapshot.load().contains_key(name)
    }

    /// All local parameters (order unspecified).
    pub fn parameters(&self) -> Vec<Parameter> {
        self.snapshot.load().values().cloned().collect()
    }

    pub fn add_observer(&self, observer: Arc<dyn ParameterObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Remove a previously registered observer (pointer identity).
    pub fn remove_observer(&self, observer: &Arc<dyn ParameterObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|o| !Arc::ptr_eq(o, observer));
    }
}
