//! End-to-end loader behavior: policy, registries, cycles, mocks.

mod common;

use caliper_loader::error::LoaderError;
use caliper_loader::mocking::ShapeSynthesizer;
use caliper_loader::resource_map::{Manifest, Resource, ResourceKind, ResourceMap};
use caliper_loader::transform::PassthroughTransformer;
use caliper_loader::value::{JsFunction, JsObject, Value};
use caliper_loader::{Loader, LoaderConfig};
use common::*;
use std::cell::Cell;
use std::path::PathBuf;
use std::rc::Rc;

fn loader_for(project: &Project, config: LoaderConfig, map: ResourceMap) -> Rc<Loader> {
    Loader::new(config, project.env.clone(), Rc::new(map)).unwrap()
}

fn no_automock() -> LoaderConfig {
    LoaderConfig {
        automock: false,
        ..LoaderConfig::default()
    }
}

fn get_str(obj: &JsObject, key: &str) -> String {
    match obj.get(key) {
        Some(Value::String(s)) => s,
        other => panic!("expected string at '{key}', got {other:?}"),
    }
}

#[test]
fn core_module_passes_through_to_host() {
    let project = Project::new();
    let path_module = JsObject::new();
    path_module.set("sep", Value::String("/".to_string()));
    project
        .env
        .register_builtin("path", Value::Object(path_module.clone()));

    // Auto-mock is on by default; built-ins are real regardless.
    let loader = loader_for(&project, LoaderConfig::default(), ResourceMap::new());
    let first = loader
        .require_module_or_mock(&project.test_path(), "path")
        .unwrap();
    assert!(first.as_object().unwrap().ptr_eq(&path_module));

    let second = loader
        .require_module_or_mock(&project.test_path(), "path")
        .unwrap();
    assert!(second.as_object().unwrap().ptr_eq(&path_module));
}

#[test]
fn manual_mock_sibling_respects_dont_mock() {
    let project = Project::new();
    let importer = project.file("a/b/c.js", "// importer");
    let real = project.file("a/b/d.js", "module.exports.source = 'real';");
    let mock = project.file("a/b/__mocks__/d.js", "module.exports.source = 'mock';");
    project.env.register_body(&real, |ctx| {
        exports_of(ctx).set("source", Value::String("real".to_string()));
        Ok(Value::Undefined)
    });
    project.env.register_body(&mock, |ctx| {
        exports_of(ctx).set("source", Value::String("mock".to_string()));
        Ok(Value::Undefined)
    });

    let loader = loader_for(&project, LoaderConfig::default(), ResourceMap::new());

    let mocked = loader.require_module_or_mock(&importer, "./d").unwrap();
    assert_eq!(get_str(mocked.as_object().unwrap(), "source"), "mock");

    loader.dont_mock_module(&importer, "./d");
    let real_exports = loader.require_module_or_mock(&importer, "./d").unwrap();
    assert_eq!(get_str(real_exports.as_object().unwrap(), "source"), "real");
}

#[test]
fn unmock_patterns_split_logical_names() {
    let project = Project::new();
    let x = project.file("proj/vendor-ok/x.js", "exports.tag = 'real-x';");
    let y = project.file("proj/other/y.js", "exports.compute = () => 3;");
    project.env.register_body(&x, |ctx| {
        exports_of(ctx).set("tag", Value::String("real-x".to_string()));
        Ok(Value::Undefined)
    });
    project.env.register_body(&y, |ctx| {
        exports_of(ctx).set(
            "compute",
            Value::Function(JsFunction::native("compute", |_| Ok(Value::Number(3.0)))),
        );
        Ok(Value::Undefined)
    });

    let mut map = ResourceMap::new();
    map.insert(Resource::new(ResourceKind::Source, "x", &x));
    map.insert(Resource::new(ResourceKind::Source, "y", &y));

    let config = LoaderConfig {
        unmocked_module_path_patterns: Some(vec!["/vendor-ok/".to_string()]),
        ..LoaderConfig::default()
    };
    let loader = loader_for(&project, config, map);

    let x_exports = loader
        .require_module_or_mock(&project.test_path(), "x")
        .unwrap();
    assert_eq!(get_str(x_exports.as_object().unwrap(), "tag"), "real-x");

    let y_exports = loader
        .require_module_or_mock(&project.test_path(), "y")
        .unwrap();
    let compute = y_exports.as_object().unwrap().get("compute").unwrap();
    let compute = compute.as_function().unwrap();
    assert!(compute.is_mock());
    assert!(compute.call(Value::Undefined, vec![]).unwrap().is_undefined());
}

#[test]
fn cyclic_imports_complete_with_shared_exports() {
    let project = Project::new();
    let a = project.file("a.js", "const b = require('./b');");
    let b = project.file("b.js", "const a = require('./a');");

    project.env.register_body(&a, |ctx| {
        let b_exports = require_from(ctx, "./b")?;
        let b_obj = b_exports.as_object().unwrap().clone();
        exports_of(ctx).set(
            "fromA",
            Value::Function(JsFunction::native("fromA", move |_| {
                match b_obj.get("fromB") {
                    Some(Value::Function(from_b)) => from_b.call(Value::Undefined, vec![]),
                    _ => Ok(Value::String("missing".to_string())),
                }
            })),
        );
        Ok(Value::Undefined)
    });
    project.env.register_body(&b, |ctx| {
        let a_exports = require_from(ctx, "./a")?;
        let a_obj = a_exports.as_object().unwrap().clone();
        let exports = exports_of(ctx);
        // During our top level the cycle partner has not finished yet.
        exports.set("sawPartialA", Value::Boolean(!a_obj.has("fromA")));
        exports.set(
            "fromB",
            Value::Function(JsFunction::native("fromB", move |_| {
                let state = if a_obj.has("fromA") { "ok" } else { "partial" };
                Ok(Value::String(state.to_string()))
            })),
        );
        Ok(Value::Undefined)
    });

    let loader = loader_for(&project, no_automock(), ResourceMap::new());
    let a_exports = loader.require_module(&project.test_path(), "./a").unwrap();
    let b_exports = loader.require_module(&project.test_path(), "./b").unwrap();

    assert_eq!(
        b_exports.as_object().unwrap().get("sawPartialA"),
        Some(Value::Boolean(true))
    );
    let from_a = a_exports.as_object().unwrap().get("fromA").unwrap();
    let out = from_a
        .as_function()
        .unwrap()
        .call(Value::Undefined, vec![])
        .unwrap();
    assert_eq!(out, Value::String("ok".to_string()));
}

#[test]
fn modules_evaluate_once_per_generation() {
    let project = Project::new();
    let m = project.file("m.js", "exports.n = 1;");
    let evaluations = Rc::new(Cell::new(0));
    {
        let evaluations = Rc::clone(&evaluations);
        project.env.register_body(&m, move |_| {
            evaluations.set(evaluations.get() + 1);
            Ok(Value::Undefined)
        });
    }

    let loader = loader_for(&project, no_automock(), ResourceMap::new());
    loader.require_module(&project.test_path(), "./m").unwrap();
    loader.require_module(&project.test_path(), "./m").unwrap();
    assert_eq!(evaluations.get(), 1);

    loader.reset_module_registry().unwrap();
    loader.require_module(&project.test_path(), "./m").unwrap();
    assert_eq!(evaluations.get(), 2);
}

#[test]
fn explicit_override_order_determines_result() {
    let project = Project::new();
    let real = project.file("m.js", "");
    let _mock = project.file("__mocks__/m.js", "");
    project.env.register_body(&real, |ctx| {
        exports_of(ctx).set("source", Value::String("real".to_string()));
        Ok(Value::Undefined)
    });
    project
        .env
        .register_body(project.dir.path().join("__mocks__/m.js"), |ctx| {
            exports_of(ctx).set("source", Value::String("mock".to_string()));
            Ok(Value::Undefined)
        });

    let loader = loader_for(&project, LoaderConfig::default(), ResourceMap::new());
    let test = project.test_path();

    loader.mock_module(&test, "./m").dont_mock_module(&test, "./m");
    let exports = loader.require_module_or_mock(&test, "./m").unwrap();
    assert_eq!(get_str(exports.as_object().unwrap(), "source"), "real");

    loader.dont_mock_module(&test, "./m").mock_module(&test, "./m");
    let exports = loader.require_module_or_mock(&test, "./m").unwrap();
    assert_eq!(get_str(exports.as_object().unwrap(), "source"), "mock");
}

#[test]
fn set_mock_survives_registry_reset() {
    let project = Project::new();
    let _lib = project.file("lib.js", "");
    let slot = JsObject::new();
    slot.set("answer", Value::Number(42.0));

    let loader = loader_for(&project, LoaderConfig::default(), ResourceMap::new());
    let test = project.test_path();
    loader.set_mock(&test, "./lib", Value::Object(slot.clone()));

    let first = loader.require_module_or_mock(&test, "./lib").unwrap();
    assert!(first.as_object().unwrap().ptr_eq(&slot));
    assert_eq!(
        first.as_object().unwrap().get("answer"),
        Some(Value::Number(42.0))
    );

    loader.reset_module_registry().unwrap();
    let second = loader.require_module_or_mock(&test, "./lib").unwrap();
    assert!(second.as_object().unwrap().ptr_eq(&slot));
}

#[test]
fn name_mapping_rewrites_before_resolution() {
    let project = Project::new();
    let real = project.file("realmod.js", "exports.kind = 'mapped';");
    project.env.register_body(&real, |ctx| {
        exports_of(ctx).set("kind", Value::String("mapped".to_string()));
        Ok(Value::Undefined)
    });

    let mut map = ResourceMap::new();
    map.insert(Resource::new(ResourceKind::Source, "realmod", &real));

    let config = LoaderConfig {
        automock: false,
        module_name_mapper: vec![("^alias/".to_string(), "realmod".to_string())],
        ..LoaderConfig::default()
    };
    let loader = loader_for(&project, config, map);
    let exports = loader
        .require_module_or_mock(&project.test_path(), "alias/foo")
        .unwrap();
    assert_eq!(get_str(exports.as_object().unwrap(), "kind"), "mapped");
}

#[test]
fn require_actual_bypasses_mock_policy() {
    let project = Project::new();
    let probe = project.file("probe.js", "");
    let real = project.file("d.js", "");
    let mock = project.file("__mocks__/d.js", "");
    project.env.register_body(&real, |ctx| {
        exports_of(ctx).set("source", Value::String("real".to_string()));
        Ok(Value::Undefined)
    });
    project.env.register_body(&mock, |ctx| {
        exports_of(ctx).set("source", Value::String("mock".to_string()));
        Ok(Value::Undefined)
    });
    project.env.register_body(&probe, |ctx| {
        let require = require_fn_of(ctx);
        let actual = call_fn_prop(&require, "requireActual", vec![Value::String("./d".into())])?;
        let forced_mock =
            call_fn_prop(&require, "requireMock", vec![Value::String("./d".into())])?;
        let resolved = call_fn_prop(&require, "resolve", vec![Value::String("./d".into())])?;
        let exports = exports_of(ctx);
        exports.set("actual", actual);
        exports.set("forcedMock", forced_mock);
        exports.set("resolved", resolved);
        Ok(Value::Undefined)
    });

    // Auto-mock on: plain require of ./d would deliver the mock, but
    // requireActual still reaches the real module.
    let loader = loader_for(&project, LoaderConfig::default(), ResourceMap::new());
    loader.dont_mock_module(&project.test_path(), "./probe");
    let exports = loader
        .require_module_or_mock(&project.test_path(), "./probe")
        .unwrap();
    let exports = exports.as_object().unwrap();

    let actual = exports.get("actual").unwrap();
    assert_eq!(get_str(actual.as_object().unwrap(), "source"), "real");
    let forced = exports.get("forcedMock").unwrap();
    assert_eq!(get_str(forced.as_object().unwrap(), "source"), "mock");
    assert_eq!(
        exports.get("resolved"),
        Some(Value::String(real.display().to_string()))
    );
}

#[test]
fn automock_evaluation_is_isolated_from_caller_registries() {
    let project = Project::new();
    let n = project.file("n.js", "");
    let m = project.file("m.js", "");
    project.env.register_body(&n, |ctx| {
        exports_of(ctx).set("label", Value::String("real-n".to_string()));
        Ok(Value::Undefined)
    });
    project.env.register_body(&m, |ctx| {
        // Top level mutates another module's exports.
        let n_exports = require_from(ctx, "./n")?;
        n_exports
            .as_object()
            .unwrap()
            .set("mutated", Value::Boolean(true));
        exports_of(ctx).set(
            "api",
            Value::Function(JsFunction::native("api", |_| Ok(Value::Null))),
        );
        Ok(Value::Undefined)
    });

    let config = LoaderConfig {
        unmocked_module_path_patterns: Some(vec!["n\\.js".to_string()]),
        ..LoaderConfig::default()
    };
    let loader = loader_for(&project, config, ResourceMap::new());
    let test = project.test_path();

    let n_first = loader.require_module_or_mock(&test, "./n").unwrap();
    let n_obj = n_first.as_object().unwrap().clone();
    assert!(!n_obj.has("mutated"));

    let m_mock = loader.require_module_or_mock(&test, "./m").unwrap();
    let api = m_mock.as_object().unwrap().get("api").unwrap();
    assert!(api.as_function().unwrap().is_mock());

    // The caller's registry entry for ./n was untouched by the automock's
    // isolated evaluation.
    assert!(!n_obj.has("mutated"));
    let n_again = loader.require_module_or_mock(&test, "./n").unwrap();
    assert!(n_again.as_object().unwrap().ptr_eq(&n_obj));
}

#[test]
fn manual_mock_requiring_its_own_name_gets_the_automock() {
    let project = Project::new();
    let real = project.file("impl/d.js", "");
    let mock = project.file("mocks/d.js", "");
    project.env.register_body(&real, |ctx| {
        exports_of(ctx).set("tag", Value::String("real".to_string()));
        Ok(Value::Undefined)
    });
    project.env.register_body(&mock, |ctx| {
        let inner = require_from(ctx, "d")?;
        let exports = exports_of(ctx);
        exports.set("inner", inner);
        exports.set("tag", Value::String("mock".to_string()));
        Ok(Value::Undefined)
    });

    let mut map = ResourceMap::new();
    map.insert(Resource::new(ResourceKind::Source, "d", &real));
    map.insert(Resource::new(ResourceKind::ManualMock, "d", &mock));

    let loader = loader_for(&project, LoaderConfig::default(), map);
    let exports = loader
        .require_module_or_mock(&project.test_path(), "d")
        .unwrap();
    let exports = exports.as_object().unwrap();
    assert_eq!(get_str(exports, "tag"), "mock");

    // The self-require inside the manual mock fell through to the
    // synthesized mock of the real module.
    let inner = exports.get("inner").unwrap();
    assert_eq!(get_str(inner.as_object().unwrap(), "tag"), "real");
}

#[test]
fn manual_mock_stands_in_for_absent_real_module() {
    let project = Project::new();
    let ghost_mock = project.file("mocks/ghost.js", "");
    project.env.register_body(&ghost_mock, |ctx| {
        exports_of(ctx).set("ghost", Value::Boolean(true));
        Ok(Value::Undefined)
    });

    let mut map = ResourceMap::new();
    map.insert(Resource::new(ResourceKind::ManualMock, "ghost", &ghost_mock));

    let loader = loader_for(&project, LoaderConfig::default(), map);
    let via_policy = loader
        .require_module_or_mock(&project.test_path(), "ghost")
        .unwrap();
    assert_eq!(
        via_policy.as_object().unwrap().get("ghost"),
        Some(Value::Boolean(true))
    );

    // Legacy compatibility: requireModule also falls back to the manual
    // mock when no real implementation exists.
    let via_real = loader
        .require_module(&project.test_path(), "ghost")
        .unwrap();
    assert!(via_real.as_object().is_some());
}

#[test]
fn missing_module_reports_module_not_found() {
    let project = Project::new();
    let loader = loader_for(&project, LoaderConfig::default(), ResourceMap::new());
    let err = loader
        .require_module_or_mock(&project.test_path(), "./nope")
        .unwrap_err();
    assert!(matches!(err, LoaderError::ModuleNotFound { .. }));
}

#[test]
fn undefined_exports_fail_mock_extraction() {
    let project = Project::new();
    let m = project.file("m.js", "");
    project.env.register_body(&m, |ctx| {
        module_of(ctx).set("exports", Value::Undefined);
        Ok(Value::Undefined)
    });

    let loader = loader_for(&project, LoaderConfig::default(), ResourceMap::new());
    let err = loader
        .require_module_or_mock(&project.test_path(), "./m")
        .unwrap_err();
    assert!(matches!(err, LoaderError::MockExtractionFailed(_)));
}

#[test]
fn json_modules_parse_without_a_wrapper() {
    let project = Project::new();
    project.file("data.json", r#"{"version": 3, "tags": ["a", "b"]}"#);

    let loader = loader_for(&project, no_automock(), ResourceMap::new());
    let exports = loader
        .require_module(&project.test_path(), "./data")
        .unwrap();
    let exports = exports.as_object().unwrap();
    assert_eq!(exports.get("version"), Some(Value::Number(3.0)));
    let tags = exports.get("tags").unwrap();
    assert_eq!(
        tags.as_object().unwrap().get("length"),
        Some(Value::Number(2.0))
    );
}

#[test]
fn gen_mock_from_module_returns_fresh_uncached_stubs() {
    let project = Project::new();
    let m = project.file("m.js", "");
    project.env.register_body(&m, |ctx| {
        exports_of(ctx).set(
            "go",
            Value::Function(JsFunction::native("go", |_| Ok(Value::Number(1.0)))),
        );
        Ok(Value::Undefined)
    });

    let loader = loader_for(&project, no_automock(), ResourceMap::new());
    let first = loader
        .gen_mock_from_module(&project.test_path(), "./m")
        .unwrap();
    let second = loader
        .gen_mock_from_module(&project.test_path(), "./m")
        .unwrap();

    let first = first.as_object().unwrap();
    let second = second.as_object().unwrap();
    assert!(!first.ptr_eq(second));
    assert!(first
        .get("go")
        .unwrap()
        .as_function()
        .unwrap()
        .is_mock());
    assert!(second
        .get("go")
        .unwrap()
        .as_function()
        .unwrap()
        .is_mock());
}

#[test]
fn runtime_api_chains_and_delegates_timers() {
    let project = Project::new();
    let probe = project.file("probe.js", "");
    project.env.register_body(&probe, |ctx| {
        let caliper = caliper_of(ctx);
        let chained = call_method(&caliper, "useFakeTimers", vec![])?;
        let chained = chained.as_object().unwrap().clone();
        exports_of(ctx).set("chainIsSelf", Value::Boolean(chained.ptr_eq(&caliper)));
        call_method(&chained, "runAllTimers", vec![])?;
        call_method(&caliper, "runOnlyPendingTimers", vec![])?;
        call_method(&caliper, "clearAllTimers", vec![])?;
        Ok(Value::Undefined)
    });

    let loader = loader_for(&project, no_automock(), ResourceMap::new());
    let exports = loader
        .require_module(&project.test_path(), "./probe")
        .unwrap();
    assert_eq!(
        exports.as_object().unwrap().get("chainIsSelf"),
        Some(Value::Boolean(true))
    );
    assert_eq!(
        project.env.timer_calls(),
        vec![
            "useFakeTimers",
            "runAllTimers",
            "runOnlyPendingTimers",
            "clearAllTimers"
        ]
    );
}

#[test]
fn runtime_api_surfaces_test_path_matchers_and_env_data() {
    let project = Project::new();
    let probe = project.file("probe.js", "");
    project.env.register_body(&probe, |ctx| {
        let caliper = caliper_of(ctx);
        let exports = exports_of(ctx);
        exports.set("testPath", call_method(&caliper, "currentTestPath", vec![])?);
        let matchers = JsObject::new();
        call_method(&caliper, "addMatchers", vec![Value::Object(matchers)])?;
        exports.set("envData", call_method(&caliper, "getTestEnvData", vec![])?);
        Ok(Value::Undefined)
    });

    let config = LoaderConfig {
        automock: false,
        test_env_data: serde_json::json!({"flag": true}),
        ..LoaderConfig::default()
    };
    let loader = loader_for(&project, config, ResourceMap::new());
    let exports = loader
        .require_module(&project.test_path(), "./probe")
        .unwrap();
    let exports = exports.as_object().unwrap();

    assert_eq!(
        exports.get("testPath"),
        Some(Value::String(project.test_path().display().to_string()))
    );
    assert_eq!(project.env.matchers_added(), 1);

    let env_data = exports.get("envData").unwrap();
    let env_data = env_data.as_object().unwrap();
    assert_eq!(env_data.get("flag"), Some(Value::Boolean(true)));
    assert!(env_data.is_frozen());
    assert!(!env_data.set("flag", Value::Boolean(false)));
}

#[test]
fn runtime_api_set_mock_from_inside_a_module() {
    let project = Project::new();
    let probe = project.file("probe.js", "");
    let _lib = project.file("lib.js", "");
    project.env.register_body(&probe, |ctx| {
        let caliper = caliper_of(ctx);
        let slot = JsObject::new();
        slot.set("answer", Value::Number(42.0));
        let chained = call_method(
            &caliper,
            "setMock",
            vec![Value::String("./lib".to_string()), Value::Object(slot)],
        )?;
        exports_of(ctx).set("chained", chained);
        exports_of(ctx).set("lib", require_from(ctx, "./lib")?);
        Ok(Value::Undefined)
    });

    let loader = loader_for(&project, LoaderConfig::default(), ResourceMap::new());
    loader.dont_mock_module(&project.test_path(), "./probe");
    let exports = loader
        .require_module_or_mock(&project.test_path(), "./probe")
        .unwrap();
    let exports = exports.as_object().unwrap();

    let lib = exports.get("lib").unwrap();
    assert_eq!(
        lib.as_object().unwrap().get("answer"),
        Some(Value::Number(42.0))
    );
    assert!(exports.get("chained").unwrap().as_object().is_some());
}

#[test]
fn torn_down_environment_makes_execution_a_no_op() {
    let project = Project::new();
    let m = project.file("m.js", "");
    let evaluations = Rc::new(Cell::new(0));
    {
        let evaluations = Rc::clone(&evaluations);
        project.env.register_body(&m, move |_| {
            evaluations.set(evaluations.get() + 1);
            Ok(Value::Undefined)
        });
    }

    let loader = loader_for(&project, no_automock(), ResourceMap::new());
    project.env.teardown();

    let exports = loader.require_module(&project.test_path(), "./m").unwrap();
    assert!(exports.as_object().unwrap().is_empty());
    assert_eq!(evaluations.get(), 0);
}

#[test]
fn dependency_queries_resolve_declared_requires() {
    let project = Project::new();
    let x = project.file("x.js", "");
    let y = project.file("y.js", "");
    let z = project.file("z.js", "");
    let manifest = project.file("package.json", r#"{"name": "proj"}"#);

    let mut map = ResourceMap::new();
    map.insert(
        Resource::new(ResourceKind::Source, "x", &x)
            .with_requires(vec!["./y".to_string(), "missing-name".to_string()]),
    );
    map.insert(
        Resource::new(ResourceKind::Source, "y", &y).with_requires(vec!["./z".to_string()]),
    );
    map.insert(Resource::new(ResourceKind::Source, "z", &z));
    map.insert(
        Resource::new(ResourceKind::ProjectConfig, "proj", &manifest).with_manifest(Manifest {
            name: "proj".to_string(),
            main: None,
        }),
    );

    let loader = loader_for(&project, no_automock(), map);

    let deps = loader.get_dependencies_from_path(&x).unwrap();
    assert_eq!(deps, vec![y.clone()]);

    let err = loader.get_dependencies_from_path(&manifest).unwrap_err();
    assert!(matches!(err, LoaderError::InvalidResourceKind { .. }));

    let err = loader
        .get_dependencies_from_path(&PathBuf::from("/nope.js"))
        .unwrap_err();
    assert!(matches!(err, LoaderError::UnknownModulePath(_)));

    assert_eq!(loader.get_dependents_from_path(&z), vec![y.clone()]);
    assert_eq!(loader.get_dependents_from_path(&y), vec![x.clone()]);
    assert!(loader.get_dependents_from_path(&x).is_empty());
}

#[test]
fn coverage_getters_require_configuration() {
    let project = Project::new();
    let loader = loader_for(&project, no_automock(), ResourceMap::new());
    assert!(matches!(
        loader.get_all_coverage_info().unwrap_err(),
        LoaderError::CoverageDisabled
    ));
    assert!(matches!(
        loader
            .get_coverage_for_file_path(&project.test_path())
            .unwrap_err(),
        LoaderError::CoverageDisabled
    ));
}

#[test]
fn coverage_collectors_record_instrumented_runs() {
    let project = Project::new();
    let m = project.file("m.js", "");
    project.env.register_body(&m, |ctx| {
        // The coverage sink is the eighth wrapper argument.
        let sink = ctx.arg(7).as_object().unwrap().clone();
        let hits = match sink.get("hits") {
            Some(Value::Number(n)) => n,
            _ => 0.0,
        };
        sink.set("hits", Value::Number(hits + 1.0));
        Ok(Value::Undefined)
    });

    let config = LoaderConfig {
        automock: false,
        collect_coverage: true,
        ..LoaderConfig::default()
    };
    let loader = Loader::with_collaborators(
        config,
        project.env.clone(),
        Rc::new(ResourceMap::new()),
        Rc::new(PassthroughTransformer),
        Rc::new(ShapeSynthesizer),
        Some(Rc::new(CountingInstrumenter)),
    )
    .unwrap();

    loader.require_module(&project.test_path(), "./m").unwrap();
    let info = loader.get_coverage_for_file_path(&m).unwrap();
    assert_eq!(
        info.as_object().unwrap().get("hits"),
        Some(Value::Number(1.0))
    );
    let all = loader.get_all_coverage_info().unwrap();
    assert_eq!(all.len(), 1);
    assert!(all.contains_key(&m));
}
