//! Collaborator doubles shared by the integration tests.
//!
//! The fake environment dispenses registered native module bodies by
//! filename instead of parsing JavaScript, which keeps the loader's full
//! resolve/policy/execute pipeline observable without an engine.

#![allow(dead_code)]

use caliper_loader::coverage::{CoverageCollector, CoverageInstrumenter};
use caliper_loader::environment::{Environment, FakeTimers};
use caliper_loader::error::{LoaderError, Result};
use caliper_loader::value::{CallContext, JsFunction, JsObject, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

pub type ModuleBody = Rc<dyn Fn(&CallContext) -> Result<Value>>;

/// Records which timer operations the runtime API delegated.
#[derive(Default)]
pub struct TimerLog {
    calls: RefCell<Vec<&'static str>>,
}

impl TimerLog {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.borrow().clone()
    }

    fn record(&self, op: &'static str) {
        self.calls.borrow_mut().push(op);
    }
}

impl FakeTimers for TimerLog {
    fn use_fake_timers(&self) {
        self.record("useFakeTimers");
    }
    fn use_real_timers(&self) {
        self.record("useRealTimers");
    }
    fn run_all_ticks(&self) {
        self.record("runAllTicks");
    }
    fn run_all_immediates(&self) {
        self.record("runAllImmediates");
    }
    fn run_all_timers(&self) {
        self.record("runAllTimers");
    }
    fn run_only_pending_timers(&self) {
        self.record("runOnlyPendingTimers");
    }
    fn clear_all_timers(&self) {
        self.record("clearAllTimers");
    }
}

/// An environment whose evaluator returns pre-registered module factories.
pub struct FakeEnvironment {
    global: RefCell<Option<JsObject>>,
    bodies: RefCell<HashMap<PathBuf, ModuleBody>>,
    builtins: RefCell<HashMap<String, Value>>,
    timers: TimerLog,
    test_path: PathBuf,
    matchers: RefCell<Vec<Value>>,
}

impl FakeEnvironment {
    pub fn new(test_path: impl Into<PathBuf>) -> Rc<Self> {
        Rc::new(Self {
            global: RefCell::new(Some(JsObject::new())),
            bodies: RefCell::new(HashMap::new()),
            builtins: RefCell::new(HashMap::new()),
            timers: TimerLog::default(),
            test_path: test_path.into(),
            matchers: RefCell::new(Vec::new()),
        })
    }

    /// Register the native body evaluated for a file.
    pub fn register_body<F>(&self, path: impl Into<PathBuf>, body: F)
    where
        F: Fn(&CallContext) -> Result<Value> + 'static,
    {
        self.bodies.borrow_mut().insert(path.into(), Rc::new(body));
    }

    /// Register a host-provided built-in module.
    pub fn register_builtin(&self, name: impl Into<String>, exports: Value) {
        self.builtins.borrow_mut().insert(name.into(), exports);
    }

    /// Drop the global, as the test runner does when a file finishes.
    pub fn teardown(&self) {
        *self.global.borrow_mut() = None;
    }

    pub fn timer_calls(&self) -> Vec<&'static str> {
        self.timers.calls()
    }

    pub fn matchers_added(&self) -> usize {
        self.matchers.borrow().len()
    }
}

impl Environment for FakeEnvironment {
    fn global(&self) -> Option<JsObject> {
        self.global.borrow().clone()
    }

    fn run_source_text(&self, _source: &str, filename: &Path) -> Result<Value> {
        let body = self
            .bodies
            .borrow()
            .get(filename)
            .cloned()
            .ok_or_else(|| {
                LoaderError::execution(format!(
                    "no registered module body for {}",
                    filename.display()
                ))
            })?;
        let factory = JsFunction::native("Object.<anonymous>", move |ctx| body(ctx));
        let wrapper = JsObject::new();
        wrapper.set("Object.<anonymous>", Value::Function(factory));
        Ok(Value::Object(wrapper))
    }

    fn fake_timers(&self) -> &dyn FakeTimers {
        &self.timers
    }

    fn test_file_path(&self) -> PathBuf {
        self.test_path.clone()
    }

    fn host_require(&self, specifier: &str) -> Result<Value> {
        self.builtins
            .borrow()
            .get(specifier)
            .cloned()
            .ok_or_else(|| LoaderError::execution(format!("host cannot import '{specifier}'")))
    }

    fn add_matchers(&self, matchers: Value) {
        self.matchers.borrow_mut().push(matchers);
    }
}

/// A collector that passes source through and reports how often its file
/// was executed.
pub struct CountingCollector {
    store: JsObject,
    source: String,
    filename: PathBuf,
}

impl CoverageCollector for CountingCollector {
    fn coverage_data_store(&self) -> Value {
        Value::Object(self.store.clone())
    }

    fn instrumented_source(&self, sink_name: &str) -> String {
        format!("/* instrumented via {} */ {}", sink_name, self.source)
    }

    fn extract_runtime_coverage_info(&self) -> Value {
        let info = JsObject::new();
        info.set("path", Value::String(self.filename.display().to_string()));
        info.set(
            "hits",
            self.store.get("hits").unwrap_or(Value::Number(0.0)),
        );
        Value::Object(info)
    }
}

#[derive(Default)]
pub struct CountingInstrumenter;

impl CoverageInstrumenter for CountingInstrumenter {
    fn create(&self, source: &str, filename: &Path) -> Rc<dyn CoverageCollector> {
        Rc::new(CountingCollector {
            store: JsObject::new(),
            source: source.to_string(),
            filename: filename.to_path_buf(),
        })
    }
}

/// A throwaway project directory plus a fake environment for it.
pub struct Project {
    pub dir: tempfile::TempDir,
    pub env: Rc<FakeEnvironment>,
}

impl Project {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let test_path = dir.path().join("suite-test.js");
        fs::write(&test_path, "// test file").unwrap();
        let env = FakeEnvironment::new(&test_path);
        Self { dir, env }
    }

    /// Write a file under the project root, returning its absolute path.
    pub fn file(&self, relative: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, contents).unwrap();
        path
    }

    pub fn test_path(&self) -> PathBuf {
        self.dir.path().join("suite-test.js")
    }
}

/// `module` argument of an executing body.
pub fn module_of(ctx: &CallContext) -> JsObject {
    ctx.arg(0).as_object().cloned().expect("module argument")
}

/// `exports` argument of an executing body.
pub fn exports_of(ctx: &CallContext) -> JsObject {
    ctx.arg(1).as_object().cloned().expect("exports argument")
}

/// Invoke the body's bound `require` with a module name.
pub fn require_from(ctx: &CallContext, name: &str) -> Result<Value> {
    match ctx.arg(2) {
        Value::Function(require) => {
            require.call(Value::Undefined, vec![Value::String(name.to_string())])
        }
        _ => Err(LoaderError::execution("body has no require argument")),
    }
}

/// The body's bound `require` function itself.
pub fn require_fn_of(ctx: &CallContext) -> JsFunction {
    ctx.arg(2).as_function().cloned().expect("require argument")
}

/// `caliper` argument of an executing body.
pub fn caliper_of(ctx: &CallContext) -> JsObject {
    ctx.arg(6).as_object().cloned().expect("caliper argument")
}

/// Call a method on an object with `this` bound to the object.
pub fn call_method(target: &JsObject, name: &str, args: Vec<Value>) -> Result<Value> {
    match target.get(name) {
        Some(Value::Function(method)) => method.call(Value::Object(target.clone()), args),
        _ => Err(LoaderError::execution(format!("no method '{name}'"))),
    }
}

/// Call a property of a function object (e.g. `require.requireActual`).
pub fn call_fn_prop(target: &JsFunction, name: &str, args: Vec<Value>) -> Result<Value> {
    match target.get_prop(name) {
        Some(Value::Function(method)) => method.call(Value::Undefined, args),
        _ => Err(LoaderError::execution(format!("no property '{name}'"))),
    }
}
