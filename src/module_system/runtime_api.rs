// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Caliper Project Contributors

//! Per-module require and the `caliper` runtime control object.
//!
//! Every evaluated file receives a require bound to its own path and a
//! `caliper` object steering mock policy and timers. Mutating methods
//! return the `caliper` object itself so calls chain.

use crate::error::{LoaderError, Result};
use crate::module_system::loader::Loader;
use crate::module_system::registry::ModuleRecord;
use crate::value::{CallContext, JsFunction, JsObject, Value, WeakJsObject};
use std::path::Path;
use std::rc::{Rc, Weak};

fn upgrade(weak: &Weak<Loader>) -> Result<Rc<Loader>> {
    weak.upgrade()
        .ok_or_else(|| LoaderError::execution("module loader is no longer alive"))
}

fn module_name_arg(ctx: &CallContext) -> Result<String> {
    match ctx.arg(0) {
        Value::String(name) => Ok(name),
        other => Err(LoaderError::execution(format!(
            "expected a module name string, got {}",
            other.type_of()
        ))),
    }
}

/// The `caliper` object, or undefined if it has been collected.
fn chained(api: &WeakJsObject) -> Value {
    api.upgrade().map(Value::Object).unwrap_or(Value::Undefined)
}

fn install<F>(target: &JsObject, name: &'static str, body: F)
where
    F: Fn(&CallContext) -> Result<Value> + 'static,
{
    target.set(name, Value::Function(JsFunction::native(name, body)));
}

/// Build the require function bound to one module record.
pub(crate) fn build_require(loader: &Loader, record: &Rc<ModuleRecord>) -> Value {
    let weak = loader.weak();
    let importer = record.filename().to_path_buf();

    let require = {
        let weak = weak.clone();
        let importer = importer.clone();
        JsFunction::native("require", move |ctx| {
            let loader = upgrade(&weak)?;
            let name = module_name_arg(ctx)?;
            loader.require_module_or_mock(&importer, &name)
        })
    };

    {
        let weak = weak.clone();
        let importer = importer.clone();
        require.set_prop(
            "resolve",
            Value::Function(JsFunction::native("resolve", move |ctx| {
                let loader = upgrade(&weak)?;
                let name = module_name_arg(ctx)?;
                let path = loader.resolver().resolve_real(&importer, &name)?;
                Ok(Value::String(path.display().to_string()))
            })),
        );
    }
    {
        let weak = weak.clone();
        let importer = importer.clone();
        require.set_prop(
            "requireMock",
            Value::Function(JsFunction::native("requireMock", move |ctx| {
                let loader = upgrade(&weak)?;
                let name = module_name_arg(ctx)?;
                loader.require_mock(&importer, &name)
            })),
        );
    }
    {
        let weak = weak.clone();
        let importer = importer.clone();
        require.set_prop(
            "requireActual",
            Value::Function(JsFunction::native("requireActual", move |ctx| {
                let loader = upgrade(&weak)?;
                let name = module_name_arg(ctx)?;
                loader.require_module(&importer, &name)
            })),
        );
    }
    // Present for code that enumerates them; the loader's own caches are
    // not exposed.
    require.set_prop("cache", Value::Object(JsObject::new()));
    require.set_prop("extensions", Value::Object(JsObject::new()));

    Value::Function(require)
}

/// Build the `caliper` control object handed to one evaluated module.
pub(crate) fn build_runtime_api(loader: &Loader, importer: &Path) -> Value {
    let api = JsObject::new();
    let weak = loader.weak();
    let chain = api.downgrade();
    let importer = importer.to_path_buf();

    install(&api, "autoMockOn", {
        let weak = weak.clone();
        let chain = chain.clone();
        move |_| {
            upgrade(&weak)?.auto_mock_on();
            Ok(chained(&chain))
        }
    });
    install(&api, "autoMockOff", {
        let weak = weak.clone();
        let chain = chain.clone();
        move |_| {
            upgrade(&weak)?.auto_mock_off();
            Ok(chained(&chain))
        }
    });
    install(&api, "mock", {
        let weak = weak.clone();
        let chain = chain.clone();
        let importer = importer.clone();
        move |ctx| {
            let loader = upgrade(&weak)?;
            let name = module_name_arg(ctx)?;
            loader.mock_module(&importer, &name);
            Ok(chained(&chain))
        }
    });
    install(&api, "dontMock", {
        let weak = weak.clone();
        let chain = chain.clone();
        let importer = importer.clone();
        move |ctx| {
            let loader = upgrade(&weak)?;
            let name = module_name_arg(ctx)?;
            loader.dont_mock_module(&importer, &name);
            Ok(chained(&chain))
        }
    });
    install(&api, "setMock", {
        let weak = weak.clone();
        let chain = chain.clone();
        let importer = importer.clone();
        move |ctx| {
            let loader = upgrade(&weak)?;
            let name = module_name_arg(ctx)?;
            loader.set_mock(&importer, &name, ctx.arg(1));
            Ok(chained(&chain))
        }
    });
    install(&api, "genMockFromModule", {
        let weak = weak.clone();
        let importer = importer.clone();
        move |ctx| {
            let loader = upgrade(&weak)?;
            let name = module_name_arg(ctx)?;
            // Resolve from the module whose top level is running, not the
            // module this object was created for.
            let from = loader
                .current_module_path()
                .unwrap_or_else(|| importer.clone());
            loader.gen_mock_from_module(&from, &name)
        }
    });
    install(&api, "genMockFunction", {
        let weak = weak.clone();
        move |_| Ok(upgrade(&weak)?.gen_mock_function())
    });
    // Alias kept for older test suites.
    install(&api, "genMockFn", {
        let weak = weak.clone();
        move |_| Ok(upgrade(&weak)?.gen_mock_function())
    });
    install(&api, "resetModuleRegistry", {
        let weak = weak.clone();
        let chain = chain.clone();
        move |_| {
            upgrade(&weak)?.reset_module_registry()?;
            Ok(chained(&chain))
        }
    });

    install(&api, "useFakeTimers", {
        let weak = weak.clone();
        let chain = chain.clone();
        move |_| {
            upgrade(&weak)?.environment().fake_timers().use_fake_timers();
            Ok(chained(&chain))
        }
    });
    install(&api, "useRealTimers", {
        let weak = weak.clone();
        let chain = chain.clone();
        move |_| {
            upgrade(&weak)?.environment().fake_timers().use_real_timers();
            Ok(chained(&chain))
        }
    });
    install(&api, "runAllTicks", {
        let weak = weak.clone();
        let chain = chain.clone();
        move |_| {
            upgrade(&weak)?.environment().fake_timers().run_all_ticks();
            Ok(chained(&chain))
        }
    });
    install(&api, "runAllImmediates", {
        let weak = weak.clone();
        let chain = chain.clone();
        move |_| {
            upgrade(&weak)?
                .environment()
                .fake_timers()
                .run_all_immediates();
            Ok(chained(&chain))
        }
    });
    install(&api, "runAllTimers", {
        let weak = weak.clone();
        let chain = chain.clone();
        move |_| {
            upgrade(&weak)?.environment().fake_timers().run_all_timers();
            Ok(chained(&chain))
        }
    });
    install(&api, "runOnlyPendingTimers", {
        let weak = weak.clone();
        let chain = chain.clone();
        move |_| {
            upgrade(&weak)?
                .environment()
                .fake_timers()
                .run_only_pending_timers();
            Ok(chained(&chain))
        }
    });
    install(&api, "clearAllTimers", {
        let weak = weak.clone();
        let chain = chain.clone();
        move |_| {
            upgrade(&weak)?.environment().fake_timers().clear_all_timers();
            Ok(chained(&chain))
        }
    });

    install(&api, "currentTestPath", {
        let weak = weak.clone();
        move |_| {
            let loader = upgrade(&weak)?;
            Ok(Value::String(
                loader.environment().test_file_path().display().to_string(),
            ))
        }
    });
    install(&api, "addMatchers", {
        let weak = weak.clone();
        let chain = chain.clone();
        move |ctx| {
            upgrade(&weak)?.environment().add_matchers(ctx.arg(0));
            Ok(chained(&chain))
        }
    });
    install(&api, "getTestEnvData", {
        let weak = weak.clone();
        move |_| Ok(upgrade(&weak)?.get_test_env_data())
    });

    Value::Object(api)
}
