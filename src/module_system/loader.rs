// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Caliper Project Contributors

//! The per-test-file module loader.
//!
//! One loader serves one evaluation environment. Each import request runs
//! through the mock policy, then either evaluates the real module into the
//! real registry or delivers a manual or synthesized mock from the mock
//! registry.

use crate::config::{LoaderConfig, MODULE_PATHS_ENV};
use crate::coverage::{CoverageCollector, CoverageInstrumenter, COVERAGE_SINK_NAME};
use crate::environment::Environment;
use crate::error::{LoaderError, Result};
use crate::mocking::{MockSynthesizer, ShapeSynthesizer};
use crate::module_system::automock::Automocker;
use crate::module_system::policy::MockPolicy;
use crate::module_system::registry::{ModuleRecord, ModuleRegistry};
use crate::module_system::resolver::{ModuleKind, Resolver};
use crate::module_system::runtime_api;
use crate::resource_map::{ResourceKind, ResourceMap};
use crate::transform::{PassthroughTransformer, Transformer};
use crate::value::{JsFunction, JsObject, Value};
use rustc_hash::FxHashMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::{Rc, Weak};
use tracing::debug;

/// Property name the module wrapper evaluates to, chosen so evaluated
/// frames read as an anonymous function in stack traces.
const MODULE_WRAPPER_KEY: &str = "Object.<anonymous>";

/// The module loader bound to one environment and one resource map.
pub struct Loader {
    config: Rc<LoaderConfig>,
    environment: Rc<dyn Environment>,
    resource_map: Rc<ResourceMap>,
    transformer: Rc<dyn Transformer>,
    synthesizer: Rc<dyn MockSynthesizer>,
    instrumenter: Option<Rc<dyn CoverageInstrumenter>>,
    resolver: Resolver,
    policy: MockPolicy,
    registry: ModuleRegistry,
    automocker: Automocker,
    /// User-supplied exports per identity key. Survive registry resets.
    explicitly_set_mocks: RefCell<FxHashMap<String, Value>>,
    /// Path of the module whose top level is currently executing.
    current_module_path: RefCell<Option<PathBuf>>,
    /// Same, tracked separately for manual-mock self-require detection.
    current_manual_mock: RefCell<Option<PathBuf>>,
    /// Synthetic parent installed on every evaluated module.
    parent_sentinel: JsObject,
    coverage_collectors: RefCell<FxHashMap<PathBuf, Rc<dyn CoverageCollector>>>,
    /// Inverted dependency index, built on first use.
    dependents_index: RefCell<Option<FxHashMap<PathBuf, Vec<PathBuf>>>>,
    weak_self: Weak<Loader>,
}

impl Loader {
    /// Create a loader with the crate's default transformer and mock
    /// synthesizer and no coverage instrumentation.
    pub fn new(
        config: LoaderConfig,
        environment: Rc<dyn Environment>,
        resource_map: Rc<ResourceMap>,
    ) -> Result<Rc<Self>> {
        Self::with_collaborators(
            config,
            environment,
            resource_map,
            Rc::new(PassthroughTransformer),
            Rc::new(ShapeSynthesizer),
            None,
        )
    }

    /// Create a loader with explicit collaborators.
    pub fn with_collaborators(
        config: LoaderConfig,
        environment: Rc<dyn Environment>,
        resource_map: Rc<ResourceMap>,
        transformer: Rc<dyn Transformer>,
        synthesizer: Rc<dyn MockSynthesizer>,
        instrumenter: Option<Rc<dyn CoverageInstrumenter>>,
    ) -> Result<Rc<Self>> {
        let config = Rc::new(config);
        let extra_search_roots = std::env::var_os(MODULE_PATHS_ENV)
            .map(|paths| std::env::split_paths(&paths).collect())
            .unwrap_or_default();
        let resolver = Resolver::new(
            Rc::clone(&config),
            Rc::clone(&resource_map),
            extra_search_roots,
        )?;
        let policy = MockPolicy::new(&config)?;

        let parent_sentinel = JsObject::new();
        parent_sentinel.set("id", Value::String("mockParent".to_string()));
        parent_sentinel.set("exports", Value::Object(JsObject::new()));

        Ok(Rc::new_cyclic(|weak| Self {
            config,
            environment,
            resource_map,
            transformer,
            synthesizer,
            instrumenter,
            resolver,
            policy,
            registry: ModuleRegistry::new(),
            automocker: Automocker::new(),
            explicitly_set_mocks: RefCell::new(FxHashMap::default()),
            current_module_path: RefCell::new(None),
            current_manual_mock: RefCell::new(None),
            parent_sentinel,
            coverage_collectors: RefCell::new(FxHashMap::default()),
            dependents_index: RefCell::new(None),
            weak_self: weak.clone(),
        }))
    }

    /// Deliver either the real module or a mock, as the policy decides.
    pub fn require_module_or_mock(&self, importer: &Path, name: &str) -> Result<Value> {
        if self.policy.should_mock(&self.resolver, importer, name) {
            self.require_mock(importer, name)
        } else {
            self.require_module(importer, name)
        }
    }

    /// Deliver the real module, bypassing mock policy.
    pub fn require_module(&self, importer: &Path, name: &str) -> Result<Value> {
        let identity = self.resolver.resolve_identity(importer, name);
        if identity.kind == ModuleKind::Core {
            // Built-ins pass through to the host and are never cached.
            let specifier = identity
                .real_path
                .as_deref()
                .and_then(Path::to_str)
                .unwrap_or(name);
            return self.environment.host_require(specifier);
        }

        let path = match identity.real_path {
            Some(path) => path,
            // Legacy compatibility: a manual mock stands in for a module
            // with no real implementation.
            None => match identity.mock_path {
                Some(mock) => mock,
                None => return Err(LoaderError::module_not_found(name, importer)),
            },
        };

        if let Some(record) = self.registry.real_get(&path) {
            return Ok(record.exports());
        }
        // Insert before evaluating: recursive requests for this path must
        // observe the partially populated exports.
        let record = ModuleRecord::new(path);
        self.registry.real_insert(Rc::clone(&record));
        self.execute(&record)?;
        Ok(record.exports())
    }

    /// Deliver a mock: an explicitly set one, a manual mock file, or a
    /// synthesized automock, in that order.
    pub fn require_mock(&self, importer: &Path, name: &str) -> Result<Value> {
        let identity = self.resolver.resolve_identity(importer, name);
        let identity_key = identity.key();
        if let Some(exports) = self.explicitly_set_mocks.borrow().get(&identity_key) {
            return Ok(exports.clone());
        }

        if let Some(mock_path) = &identity.mock_path {
            let self_require =
                self.current_manual_mock.borrow().as_deref() == Some(mock_path.as_path());
            if !self_require {
                if let Some(exports) = self.registry.mock_get(mock_path) {
                    return Ok(exports);
                }
                let record = ModuleRecord::new(mock_path.clone());
                self.registry
                    .mock_insert(mock_path.clone(), record.exports());
                self.execute(&record)?;
                let exports = record.exports();
                self.registry.mock_insert(mock_path.clone(), exports.clone());
                return Ok(exports);
            }
        }

        let real_path = identity
            .real_path
            .ok_or_else(|| LoaderError::module_not_found(name, importer))?;
        if let Some(exports) = self.registry.mock_get(&real_path) {
            return Ok(exports);
        }
        let stub = self.automocker.generate(self, importer, name, &real_path)?;
        self.registry.mock_insert(real_path, stub.clone());
        Ok(stub)
    }

    /// Evaluate a module record's file inside the environment.
    pub(crate) fn execute(&self, record: &Rc<ModuleRecord>) -> Result<()> {
        // The environment may have been torn down while asynchronous test
        // callbacks were still in flight; nothing can observe the result.
        let Some(global) = self.environment.global() else {
            debug!(file = %record.filename().display(), "environment gone, skipping execution");
            return Ok(());
        };
        let filename = record.filename().to_path_buf();
        debug!(file = %filename.display(), "executing module");

        match filename.extension().and_then(|e| e.to_str()) {
            Some("json") => {
                let text = std::fs::read_to_string(&filename)?;
                let parsed: serde_json::Value = serde_json::from_str(&text)?;
                record
                    .module_object()
                    .set("exports", Value::from_json(&parsed));
                return Ok(());
            }
            Some("node") => {
                let exports = self
                    .environment
                    .host_require(&filename.display().to_string())?;
                record.module_object().set("exports", exports);
                return Ok(());
            }
            _ => {}
        }

        let raw = std::fs::read_to_string(&filename)?;
        let mut source = self.transformer.transform(&raw, &filename, &self.config)?;

        let mut sink = Value::Undefined;
        if self.config.should_instrument(&filename) {
            if let Some(instrumenter) = &self.instrumenter {
                let collector = {
                    let mut collectors = self.coverage_collectors.borrow_mut();
                    Rc::clone(
                        collectors
                            .entry(filename.clone())
                            .or_insert_with(|| instrumenter.create(&source, &filename)),
                    )
                };
                sink = collector.coverage_data_store();
                source = collector.instrumented_source(COVERAGE_SINK_NAME);
            }
        }

        let _guard = ExecutionGuard::enter(self, filename.clone());
        record.set_parent(Value::Object(self.parent_sentinel.clone()));
        let require = runtime_api::build_require(self, record);
        record.set_require(require.clone());
        let api = runtime_api::build_runtime_api(self, &filename);

        let wrapper = format!(
            "({{\"{}\": function(module, exports, require, __dirname, __filename, \
             global, caliper, {}) {{{}\n}}}})",
            MODULE_WRAPPER_KEY, COVERAGE_SINK_NAME, source
        );
        let evaluated = self.environment.run_source_text(&wrapper, &filename)?;
        let factory = extract_factory(evaluated, &filename)?;

        let dirname = filename
            .parent()
            .unwrap_or(Path::new("."))
            .display()
            .to_string();
        let exports = record.exports();
        factory.call(
            exports.clone(),
            vec![
                Value::Object(record.module_object().clone()),
                exports,
                require,
                Value::String(dirname),
                Value::String(filename.display().to_string()),
                Value::Object(global),
                api,
                sink,
            ],
        )?;
        Ok(())
    }

    /// Absolute paths of the modules directly required by the named file,
    /// per the resource map's declared requires.
    pub fn get_dependencies_from_path(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let resource = self
            .resource_map
            .get_resource_by_path(path)
            .ok_or_else(|| LoaderError::UnknownModulePath(path.to_path_buf()))?;
        if matches!(
            resource.kind,
            ResourceKind::ProjectConfig | ResourceKind::Other
        ) {
            return Err(LoaderError::InvalidResourceKind {
                path: path.to_path_buf(),
                kind: resource.kind,
            });
        }
        let mut dependencies = Vec::new();
        for name in &resource.required_modules {
            match self.resolver.resolve_real(path, name) {
                Ok(dependency) => dependencies.push(dependency),
                Err(err) => {
                    debug!(
                        name = %name,
                        from = %path.display(),
                        error = %err,
                        "skipping unresolvable declared require"
                    );
                }
            }
        }
        Ok(dependencies)
    }

    /// Absolute paths of the modules that directly require the named file.
    /// The inverted index is built on first call and cached for the
    /// loader's lifetime.
    pub fn get_dependents_from_path(&self, path: &Path) -> Vec<PathBuf> {
        let mut index = self.dependents_index.borrow_mut();
        let index = index.get_or_insert_with(|| {
            debug!("building dependents index");
            let mut map: FxHashMap<PathBuf, Vec<PathBuf>> = FxHashMap::default();
            for resource in self.resource_map.all_resources() {
                if !matches!(
                    resource.kind,
                    ResourceKind::Source | ResourceKind::ManualMock
                ) {
                    continue;
                }
                for name in &resource.required_modules {
                    if let Ok(dependency) = self.resolver.resolve_real(&resource.path, name) {
                        map.entry(dependency).or_default().push(resource.path.clone());
                    }
                }
            }
            map
        });
        index.get(path).cloned().unwrap_or_default()
    }

    /// Runtime coverage data for every instrumented file.
    pub fn get_all_coverage_info(&self) -> Result<HashMap<PathBuf, Value>> {
        if !self.config.coverage_enabled() {
            return Err(LoaderError::CoverageDisabled);
        }
        Ok(self
            .coverage_collectors
            .borrow()
            .iter()
            .map(|(path, collector)| {
                (path.clone(), collector.extract_runtime_coverage_info())
            })
            .collect())
    }

    /// Runtime coverage data for one file.
    pub fn get_coverage_for_file_path(&self, path: &Path) -> Result<Value> {
        if !self.config.coverage_enabled() {
            return Err(LoaderError::CoverageDisabled);
        }
        self.coverage_collectors
            .borrow()
            .get(path)
            .map(|collector| collector.extract_runtime_coverage_info())
            .ok_or_else(|| LoaderError::UnknownModulePath(path.to_path_buf()))
    }

    /// Turn auto-mocking on for subsequent resolutions.
    pub fn auto_mock_on(&self) -> &Self {
        self.policy.set_auto_mock(true);
        self
    }

    /// Turn auto-mocking off for subsequent resolutions.
    pub fn auto_mock_off(&self) -> &Self {
        self.policy.set_auto_mock(false);
        self
    }

    /// Force the named module to be mocked on its next resolution.
    pub fn mock_module(&self, importer: &Path, name: &str) -> &Self {
        let key = self.resolver.resolve_identity(importer, name).key();
        self.policy.set_explicit(key, true);
        self
    }

    /// Force the named module to be delivered real on its next resolution.
    pub fn dont_mock_module(&self, importer: &Path, name: &str) -> &Self {
        let key = self.resolver.resolve_identity(importer, name).key();
        self.policy.set_explicit(key, false);
        self
    }

    /// Force-mock the named module and install the given exports for it.
    pub fn set_mock(&self, importer: &Path, name: &str, exports: Value) -> &Self {
        let key = self.resolver.resolve_identity(importer, name).key();
        self.policy.set_explicit(key.clone(), true);
        self.explicitly_set_mocks.borrow_mut().insert(key, exports);
        self
    }

    /// Synthesize a fresh mock of the named module without caching it in
    /// the mock registry.
    pub fn gen_mock_from_module(&self, importer: &Path, name: &str) -> Result<Value> {
        let real_path = self.resolver.resolve_real(importer, name)?;
        self.automocker.generate(self, importer, name, &real_path)
    }

    /// A bare mock function from the synthesizer.
    pub fn gen_mock_function(&self) -> Value {
        self.synthesizer.get_mock_function()
    }

    /// Start a new registry generation. Explicit overrides and explicitly
    /// set mocks are preserved.
    pub fn reset_module_registry(&self) -> Result<()> {
        self.registry.reset(self.environment.global())
    }

    /// A frozen shallow copy of the configured test environment data.
    pub fn get_test_env_data(&self) -> Value {
        let data = match Value::from_json(&self.config.test_env_data) {
            Value::Object(obj) => obj,
            _ => JsObject::new(),
        };
        data.freeze();
        Value::Object(data)
    }

    /// Path of the module whose top level is currently executing.
    pub fn current_module_path(&self) -> Option<PathBuf> {
        self.current_module_path.borrow().clone()
    }

    pub(crate) fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub(crate) fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub(crate) fn synthesizer(&self) -> &dyn MockSynthesizer {
        self.synthesizer.as_ref()
    }

    pub(crate) fn environment(&self) -> &dyn Environment {
        self.environment.as_ref()
    }

    pub(crate) fn weak(&self) -> Weak<Loader> {
        self.weak_self.clone()
    }
}

/// Saves and restores the currently-executing module markers around one
/// evaluation, on both normal and exceptional completion.
struct ExecutionGuard<'a> {
    loader: &'a Loader,
    previous_path: Option<PathBuf>,
    previous_manual_mock: Option<PathBuf>,
}

impl<'a> ExecutionGuard<'a> {
    fn enter(loader: &'a Loader, path: PathBuf) -> Self {
        let previous_path = loader.current_module_path.replace(Some(path.clone()));
        let previous_manual_mock = loader.current_manual_mock.replace(Some(path));
        Self {
            loader,
            previous_path,
            previous_manual_mock,
        }
    }
}

impl Drop for ExecutionGuard<'_> {
    fn drop(&mut self) {
        self.loader
            .current_module_path
            .replace(self.previous_path.take());
        self.loader
            .current_manual_mock
            .replace(self.previous_manual_mock.take());
    }
}

/// The wrapper evaluates to a single-entry object holding the module
/// factory; anything else is an environment defect.
fn extract_factory(evaluated: Value, filename: &Path) -> Result<JsFunction> {
    if let Value::Object(obj) = &evaluated {
        let keys = obj.keys();
        if keys.len() == 1 {
            if let Some(Value::Function(factory)) = obj.get(&keys[0]) {
                return Ok(factory);
            }
        }
    }
    Err(LoaderError::execution(format!(
        "module wrapper for '{}' did not evaluate to a module factory",
        filename.display()
    )))
}
