// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Caliper Project Contributors

//! Evaluated-module registries.
//!
//! Two mappings keyed by absolute path: real modules and mock modules.
//! A real module's record is inserted empty before its source runs, so a
//! cyclic import observes the partially populated exports instead of
//! recursing forever.

use crate::error::Result;
use crate::value::{JsObject, Value};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

/// One evaluation of a real module.
pub struct ModuleRecord {
    filename: PathBuf,
    module: JsObject,
    require: RefCell<Option<Value>>,
}

impl ModuleRecord {
    /// A fresh record with an empty exports object, ready to be evaluated.
    pub fn new(filename: PathBuf) -> Rc<Self> {
        let module = JsObject::new();
        module.set("id", Value::String(filename.display().to_string()));
        module.set("exports", Value::Object(JsObject::new()));
        Rc::new(Self {
            filename,
            module,
            require: RefCell::new(None),
        })
    }

    /// Absolute path of the file this record evaluates.
    pub fn filename(&self) -> &Path {
        &self.filename
    }

    /// The `module` object handed to the evaluated source.
    pub fn module_object(&self) -> &JsObject {
        &self.module
    }

    /// Current exports. Reads through the module object, so wholesale
    /// `module.exports` reassignment is honored.
    pub fn exports(&self) -> Value {
        self.module.get("exports").unwrap_or(Value::Undefined)
    }

    /// Install the synthetic parent object.
    pub fn set_parent(&self, parent: Value) {
        self.module.set("parent", parent);
    }

    /// Attach the require bound to this file.
    pub fn set_require(&self, require: Value) {
        *self.require.borrow_mut() = Some(require);
    }

    /// The require bound to this file, once attached.
    pub fn require(&self) -> Option<Value> {
        self.require.borrow().clone()
    }
}

/// Saved registry contents, taken while the automocker isolates evaluation.
pub struct RegistrySnapshot {
    real: FxHashMap<PathBuf, Rc<ModuleRecord>>,
    mocks: FxHashMap<PathBuf, Value>,
}

/// The per-loader pair of real and mock registries.
#[derive(Default)]
pub struct ModuleRegistry {
    real: RefCell<FxHashMap<PathBuf, Rc<ModuleRecord>>>,
    mocks: RefCell<FxHashMap<PathBuf, Value>>,
}

impl ModuleRegistry {
    /// Create an empty registry pair.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an evaluated (or currently evaluating) real module.
    pub fn real_get(&self, path: &Path) -> Option<Rc<ModuleRecord>> {
        self.real.borrow().get(path).cloned()
    }

    /// Insert a real module record. Called before the record is evaluated.
    pub fn real_insert(&self, record: Rc<ModuleRecord>) {
        self.real
            .borrow_mut()
            .insert(record.filename().to_path_buf(), record);
    }

    /// Look up a mock module's exports.
    pub fn mock_get(&self, path: &Path) -> Option<Value> {
        self.mocks.borrow().get(path).cloned()
    }

    /// Insert or replace a mock module's exports.
    pub fn mock_insert(&self, path: PathBuf, exports: Value) {
        self.mocks.borrow_mut().insert(path, exports);
    }

    /// Number of cached real modules.
    pub fn real_len(&self) -> usize {
        self.real.borrow().len()
    }

    /// Number of cached mock modules.
    pub fn mock_len(&self) -> usize {
        self.mocks.borrow().len()
    }

    /// Take both registries, leaving fresh empty ones behind.
    pub fn isolate(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            real: self.real.take(),
            mocks: self.mocks.take(),
        }
    }

    /// Put back registries taken by [`ModuleRegistry::isolate`].
    pub fn restore(&self, snapshot: RegistrySnapshot) {
        *self.real.borrow_mut() = snapshot.real;
        *self.mocks.borrow_mut() = snapshot.mocks;
    }

    /// Start a new registry generation.
    ///
    /// Both mappings are emptied, every mock function hanging off the
    /// environment's global has its recorded calls cleared, and a
    /// `mockClearTimers` hook on the global, when present, is invoked.
    /// Explicit overrides and explicitly set mocks are user intent and are
    /// not touched here.
    pub fn reset(&self, global: Option<JsObject>) -> Result<()> {
        debug!(
            real = self.real_len(),
            mocks = self.mock_len(),
            "resetting module registries"
        );
        self.real.replace(FxHashMap::default());
        self.mocks.replace(FxHashMap::default());

        if let Some(global) = global {
            for key in global.keys() {
                if let Some(Value::Function(func)) = global.get(&key) {
                    if func.is_mock() {
                        func.clear_mock();
                    }
                }
            }
            if let Some(Value::Function(hook)) = global.get("mockClearTimers") {
                hook.call(Value::Object(global.clone()), Vec::new())?;
            }
        }
        Ok(())
    }
}
