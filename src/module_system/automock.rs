// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Caliper Project Contributors

//! Automatic mock synthesis.
//!
//! To know a module's shape the real module has to run, but running it must
//! not contaminate the caller's module graph. Evaluation happens under
//! temporarily emptied registries; the extracted shape is cached per path
//! so each real module is introspected at most once per loader.

use crate::error::{LoaderError, Result};
use crate::mocking::MockShape;
use crate::module_system::loader::Loader;
use crate::value::Value;
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::debug;

pub(crate) struct Automocker {
    /// Shape cache keyed by real path. An empty-object sentinel is
    /// pre-inserted before extraction so reentrant requests terminate.
    shapes: RefCell<FxHashMap<PathBuf, Rc<MockShape>>>,
}

impl Automocker {
    pub(crate) fn new() -> Self {
        Self {
            shapes: RefCell::new(FxHashMap::default()),
        }
    }

    /// Produce a fresh stub for the named module, extracting and caching
    /// its shape on first use.
    pub(crate) fn generate(
        &self,
        loader: &Loader,
        importer: &Path,
        name: &str,
        real_path: &Path,
    ) -> Result<Value> {
        let cached = self.shapes.borrow().contains_key(real_path);
        if !cached {
            debug!(module = %real_path.display(), "extracting mock shape");
            self.shapes
                .borrow_mut()
                .insert(real_path.to_path_buf(), Rc::new(MockShape::empty_object()));

            // Evaluate the real module under isolated registries so its
            // side effects stay out of the caller's module graph.
            let snapshot = loader.registry().isolate();
            let evaluated = loader.require_module(importer, name);
            loader.registry().restore(snapshot);

            let exports = evaluated?;
            let shape = loader
                .synthesizer()
                .get_metadata(&exports)
                .ok_or_else(|| LoaderError::MockExtractionFailed(real_path.to_path_buf()))?;
            self.shapes
                .borrow_mut()
                .insert(real_path.to_path_buf(), Rc::new(shape));
        }

        let shape = self.shapes.borrow().get(real_path).cloned();
        match shape {
            Some(shape) => Ok(loader.synthesizer().generate_from_metadata(&shape)),
            None => Err(LoaderError::MockExtractionFailed(real_path.to_path_buf())),
        }
    }
}
