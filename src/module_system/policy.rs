// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Caliper Project Contributors

//! Mock delivery policy.
//!
//! For each import the engine decides whether the requester receives the
//! real module or a mock. Explicit per-identity overrides set through the
//! runtime API always win; after that, built-ins and disabled auto-mocking
//! short-circuit to real, and the unmock patterns decide the rest.

use crate::config::{compile_pattern, LoaderConfig};
use crate::error::Result;
use crate::module_system::resolver::{ModuleKind, Resolver};
use regex::Regex;
use rustc_hash::FxHashMap;
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

/// Decides, per import, whether a mock or the real module is delivered.
pub struct MockPolicy {
    auto_mock: Cell<bool>,
    /// Per-identity user overrides. Survive registry resets.
    explicit_should_mock: RefCell<FxHashMap<String, bool>>,
    /// Cached verdicts keyed by requested name: unmock patterns are written
    /// against names and paths, and identical names from different
    /// importers share policy.
    should_mock_cache: RefCell<FxHashMap<String, bool>>,
    unmock_patterns: Option<Vec<Arc<Regex>>>,
    vendor_path: Option<PathBuf>,
}

impl MockPolicy {
    /// Build the policy engine for one configuration.
    pub fn new(config: &LoaderConfig) -> Result<Self> {
        let unmock_patterns = match &config.unmocked_module_path_patterns {
            Some(patterns) => Some(
                patterns
                    .iter()
                    .map(|p| compile_pattern(p))
                    .collect::<Result<Vec<_>>>()?,
            ),
            None => None,
        };
        Ok(Self {
            auto_mock: Cell::new(config.automock),
            explicit_should_mock: RefCell::new(FxHashMap::default()),
            should_mock_cache: RefCell::new(FxHashMap::default()),
            unmock_patterns,
            vendor_path: config.vendor_path.clone(),
        })
    }

    /// Whether auto-mocking is currently on.
    pub fn auto_mock(&self) -> bool {
        self.auto_mock.get()
    }

    /// Toggle auto-mocking for the rest of the test file.
    pub fn set_auto_mock(&self, enabled: bool) {
        self.auto_mock.set(enabled);
    }

    /// Install an explicit per-identity override. The last call wins.
    pub fn set_explicit(&self, identity_key: String, mock: bool) {
        self.explicit_should_mock
            .borrow_mut()
            .insert(identity_key, mock);
    }

    /// Decide whether the request should be served a mock.
    pub fn should_mock(&self, resolver: &Resolver, importer: &Path, name: &str) -> bool {
        let identity = resolver.resolve_identity(importer, name);

        if let Some(explicit) = self.explicit_should_mock.borrow().get(&identity.key()) {
            return *explicit;
        }
        if identity.kind == ModuleKind::Core {
            return false;
        }
        if !self.auto_mock.get() {
            return false;
        }
        if let Some(cached) = self.should_mock_cache.borrow().get(name) {
            return *cached;
        }
        let Some(patterns) = &self.unmock_patterns else {
            return true;
        };

        let Some(real) = identity.real_path else {
            // Resolution failed; a manual mock, if any, stands in.
            return true;
        };
        if let Some(vendor) = &self.vendor_path {
            if real.starts_with(vendor) {
                self.cache_verdict(name, false);
                return false;
            }
        }

        // Match both the path as resolved and its realpath, so symlinked
        // sources unmock under either spelling.
        let resolved = real.to_string_lossy().into_owned();
        let canonical = std::fs::canonicalize(&real)
            .unwrap_or_else(|_| real.clone())
            .to_string_lossy()
            .into_owned();
        let unmocked = patterns
            .iter()
            .any(|re| re.is_match(&canonical) || re.is_match(&resolved));
        self.cache_verdict(name, !unmocked);
        !unmocked
    }

    fn cache_verdict(&self, name: &str, mock: bool) {
        trace!(name, mock, "caching mock verdict");
        self.should_mock_cache
            .borrow_mut()
            .insert(name.to_string(), mock);
    }
}
