// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Caliper Project Contributors

//! Mock shape extraction and stub construction.
//!
//! The automocker describes a real module's exports as a [`MockShape`] and
//! later reconstructs fresh stubs from it, so the expensive introspection
//! happens once per path per loader.

use crate::value::{JsFunction, JsObject, Value};
use rustc_hash::FxHashMap;

/// Descriptor of an exported value's shape.
#[derive(Debug, Clone)]
pub enum MockShape {
    /// A callable, with any properties hung off the function itself.
    Function {
        /// The original function's name, carried onto the stub.
        name: Option<String>,
        /// Own properties of the function.
        members: FxHashMap<String, MockShape>,
    },
    /// A plain object.
    Object {
        /// Own properties of the object.
        members: FxHashMap<String, MockShape>,
    },
    /// A primitive carried into the stub unchanged.
    Constant(Value),
}

impl MockShape {
    /// The sentinel shape pre-inserted while extraction is in flight.
    pub fn empty_object() -> Self {
        MockShape::Object {
            members: FxHashMap::default(),
        }
    }
}

/// Extracts shapes from values and reconstructs stubs from shapes.
pub trait MockSynthesizer {
    /// Describe a value's shape, or `None` when there is nothing to mock.
    fn get_metadata(&self, value: &Value) -> Option<MockShape>;

    /// Build a fresh stub from a shape descriptor.
    fn generate_from_metadata(&self, shape: &MockShape) -> Value;

    /// A bare mock function.
    fn get_mock_function(&self) -> Value;
}

/// The crate's reflective synthesizer.
///
/// Functions become call-recording stubs returning undefined; objects are
/// rebuilt member by member; primitives pass through. Extraction cuts
/// object cycles by identity, so self-referential exports terminate.
#[derive(Debug, Default)]
pub struct ShapeSynthesizer;

impl ShapeSynthesizer {
    fn extract(&self, value: &Value, seen: &mut Vec<usize>) -> MockShape {
        match value {
            Value::Object(obj) => {
                if seen.contains(&obj.identity()) {
                    return MockShape::empty_object();
                }
                seen.push(obj.identity());
                let mut members = FxHashMap::default();
                for key in obj.keys() {
                    if let Some(member) = obj.get(&key) {
                        members.insert(key, self.extract(&member, seen));
                    }
                }
                seen.pop();
                MockShape::Object { members }
            }
            Value::Function(func) => {
                let mut members = FxHashMap::default();
                for key in func.prop_keys() {
                    if let Some(member) = func.get_prop(&key) {
                        members.insert(key, self.extract(&member, seen));
                    }
                }
                MockShape::Function {
                    name: func.name().map(str::to_string),
                    members,
                }
            }
            primitive => MockShape::Constant(primitive.clone()),
        }
    }
}

impl MockSynthesizer for ShapeSynthesizer {
    fn get_metadata(&self, value: &Value) -> Option<MockShape> {
        match value {
            Value::Undefined => None,
            other => Some(self.extract(other, &mut Vec::new())),
        }
    }

    fn generate_from_metadata(&self, shape: &MockShape) -> Value {
        match shape {
            MockShape::Constant(value) => value.clone(),
            MockShape::Object { members } => {
                let obj = JsObject::new();
                for (key, member) in members {
                    obj.set(key.clone(), self.generate_from_metadata(member));
                }
                Value::Object(obj)
            }
            MockShape::Function { name, members } => {
                let func = JsFunction::mock(name.clone(), |_| Ok(Value::Undefined));
                for (key, member) in members {
                    func.set_prop(key.clone(), self.generate_from_metadata(member));
                }
                Value::Function(func)
            }
        }
    }

    fn get_mock_function(&self) -> Value {
        Value::Function(JsFunction::mock_fn())
    }
}
