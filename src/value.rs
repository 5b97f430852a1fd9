// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Caliper Project Contributors

//! Module exports representation.
//!
//! Loaded modules, manual mocks, and synthesized mocks all trade in [`Value`].
//! Objects and functions are shared by reference with interior mutability,
//! which is what lets a cyclic import observe the pre-allocated exports
//! object while its counterpart is still evaluating.

use crate::error::Result;
use rustc_hash::FxHashMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

/// A value flowing between evaluated modules.
#[derive(Clone)]
pub enum Value {
    /// undefined
    Undefined,
    /// null
    Null,
    /// Boolean value
    Boolean(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// String
    String(String),
    /// Shared mutable object
    Object(JsObject),
    /// Native callable, optionally carrying mock state
    Function(JsFunction),
}

impl Value {
    /// Returns true if this value is undefined.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Converts the value to a boolean (ToBoolean).
    pub fn truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => !n.is_nan() && *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Object(_) | Value::Function(_) => true,
        }
    }

    /// Returns the type of this value as a string.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object", // Historical quirk
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// Borrow the object if this value is one.
    pub fn as_object(&self) -> Option<&JsObject> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Borrow the function if this value is one.
    pub fn as_function(&self) -> Option<&JsFunction> {
        match self {
            Value::Function(f) => Some(f),
            _ => None,
        }
    }

    /// Borrow the string if this value is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Convert parsed JSON into a value.
    ///
    /// Arrays become objects with index keys and a `length` property, which
    /// is all the loader needs to hand a `.json` module's contents to a test.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(arr) => {
                let obj = JsObject::new();
                for (i, item) in arr.iter().enumerate() {
                    obj.set(i.to_string(), Value::from_json(item));
                }
                obj.set("length", Value::Number(arr.len() as f64));
                Value::Object(obj)
            }
            serde_json::Value::Object(map) => {
                let obj = JsObject::new();
                for (key, item) in map {
                    obj.set(key.clone(), Value::from_json(item));
                }
                Value::Object(obj)
            }
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => {
                if a.is_nan() && b.is_nan() {
                    false
                } else {
                    a == b
                }
            }
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Object(_) => write!(f, "[object Object]"),
            Value::Function(func) => match func.name() {
                Some(name) => write!(f, "[Function: {}]", name),
                None => write!(f, "[Function (anonymous)]"),
            },
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::String(s) => write!(f, "{:?}", s),
            Value::Object(obj) => write!(f, "{:?}", obj),
            Value::Function(func) => write!(f, "{:?}", func),
            other => write!(f, "{}", other),
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Undefined
    }
}

/// A shared mutable property map with object identity.
///
/// Cloning a `JsObject` clones the handle, not the properties; all clones
/// observe the same mutations. A frozen object silently rejects writes.
#[derive(Clone)]
pub struct JsObject {
    inner: Rc<ObjectData>,
}

struct ObjectData {
    props: RefCell<FxHashMap<String, Value>>,
    frozen: Cell<bool>,
}

impl JsObject {
    /// Create a new empty object.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ObjectData {
                props: RefCell::new(FxHashMap::default()),
                frozen: Cell::new(false),
            }),
        }
    }

    /// Get a property value.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.props.borrow().get(key).cloned()
    }

    /// Set a property. Returns false if the object is frozen.
    pub fn set(&self, key: impl Into<String>, value: Value) -> bool {
        if self.inner.frozen.get() {
            return false;
        }
        self.inner.props.borrow_mut().insert(key.into(), value);
        true
    }

    /// Remove a property. Returns false if the object is frozen.
    pub fn delete(&self, key: &str) -> bool {
        if self.inner.frozen.get() {
            return false;
        }
        self.inner.props.borrow_mut().remove(key);
        true
    }

    /// Check whether a property exists.
    pub fn has(&self, key: &str) -> bool {
        self.inner.props.borrow().contains_key(key)
    }

    /// All property names, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.props.borrow().keys().cloned().collect()
    }

    /// Number of own properties.
    pub fn len(&self) -> usize {
        self.inner.props.borrow().len()
    }

    /// True when the object has no properties.
    pub fn is_empty(&self) -> bool {
        self.inner.props.borrow().is_empty()
    }

    /// Reject all further writes.
    pub fn freeze(&self) {
        self.inner.frozen.set(true);
    }

    /// Whether the object has been frozen.
    pub fn is_frozen(&self) -> bool {
        self.inner.frozen.get()
    }

    /// A fresh unfrozen object with the same top-level properties.
    pub fn shallow_copy(&self) -> JsObject {
        let copy = JsObject::new();
        for (key, value) in self.inner.props.borrow().iter() {
            copy.set(key.clone(), value.clone());
        }
        copy
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &JsObject) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Stable identity token for cycle detection.
    pub(crate) fn identity(&self) -> usize {
        Rc::as_ptr(&self.inner) as usize
    }

    /// A weak handle that does not keep the object alive.
    pub fn downgrade(&self) -> WeakJsObject {
        WeakJsObject {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

impl Default for JsObject {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for JsObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Property values may cycle back to this object; print names only.
        let mut keys = self.keys();
        keys.sort();
        f.debug_struct("JsObject").field("keys", &keys).finish()
    }
}

/// Weak counterpart of [`JsObject`].
#[derive(Clone)]
pub struct WeakJsObject {
    inner: Weak<ObjectData>,
}

impl WeakJsObject {
    /// Upgrade back to a strong handle if the object is still alive.
    pub fn upgrade(&self) -> Option<JsObject> {
        self.inner.upgrade().map(|inner| JsObject { inner })
    }
}

/// Arguments of one native function invocation.
pub struct CallContext {
    /// The `this` binding.
    pub this: Value,
    /// Positional arguments.
    pub args: Vec<Value>,
}

impl CallContext {
    /// The argument at `index`, or undefined past the end.
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or(Value::Undefined)
    }
}

type NativeBody = dyn Fn(&CallContext) -> Result<Value>;

/// A callable native function.
///
/// Functions carry their own property map (a function is an object), and a
/// function created through the mock constructors additionally records every
/// invocation's arguments until [`JsFunction::clear_mock`] is called.
#[derive(Clone)]
pub struct JsFunction {
    inner: Rc<FunctionData>,
}

struct FunctionData {
    name: Option<String>,
    body: Box<NativeBody>,
    props: RefCell<FxHashMap<String, Value>>,
    mock_calls: Option<RefCell<Vec<Vec<Value>>>>,
}

impl JsFunction {
    /// Create a function with an optional name.
    pub fn new<F>(name: Option<String>, body: F) -> Self
    where
        F: Fn(&CallContext) -> Result<Value> + 'static,
    {
        Self {
            inner: Rc::new(FunctionData {
                name,
                body: Box::new(body),
                props: RefCell::new(FxHashMap::default()),
                mock_calls: None,
            }),
        }
    }

    /// Create a named function.
    pub fn native<F>(name: &str, body: F) -> Self
    where
        F: Fn(&CallContext) -> Result<Value> + 'static,
    {
        Self::new(Some(name.to_string()), body)
    }

    /// Create a mock function with the given body and call recording.
    pub fn mock<F>(name: Option<String>, body: F) -> Self
    where
        F: Fn(&CallContext) -> Result<Value> + 'static,
    {
        Self {
            inner: Rc::new(FunctionData {
                name,
                body: Box::new(body),
                props: RefCell::new(FxHashMap::default()),
                mock_calls: Some(RefCell::new(Vec::new())),
            }),
        }
    }

    /// A bare mock function that records calls and returns undefined.
    pub fn mock_fn() -> Self {
        Self::mock(None, |_| Ok(Value::Undefined))
    }

    /// Invoke the function.
    pub fn call(&self, this: Value, args: Vec<Value>) -> Result<Value> {
        if let Some(calls) = &self.inner.mock_calls {
            calls.borrow_mut().push(args.clone());
        }
        let ctx = CallContext { this, args };
        (self.inner.body)(&ctx)
    }

    /// The function's name, if any.
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    /// Whether this function records calls.
    pub fn is_mock(&self) -> bool {
        self.inner.mock_calls.is_some()
    }

    /// Recorded call arguments, oldest first. Empty for non-mocks.
    pub fn calls(&self) -> Vec<Vec<Value>> {
        match &self.inner.mock_calls {
            Some(calls) => calls.borrow().clone(),
            None => Vec::new(),
        }
    }

    /// Discard recorded calls. No-op for non-mocks.
    pub fn clear_mock(&self) {
        if let Some(calls) = &self.inner.mock_calls {
            calls.borrow_mut().clear();
        }
    }

    /// Get an own property of the function.
    pub fn get_prop(&self, key: &str) -> Option<Value> {
        self.inner.props.borrow().get(key).cloned()
    }

    /// Set an own property of the function.
    pub fn set_prop(&self, key: impl Into<String>, value: Value) {
        self.inner.props.borrow_mut().insert(key.into(), value);
    }

    /// Own property names.
    pub fn prop_keys(&self) -> Vec<String> {
        self.inner.props.borrow().keys().cloned().collect()
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &JsFunction) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for JsFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JsFunction")
            .field("name", &self.inner.name)
            .field("mock", &self.is_mock())
            .finish()
    }
}
