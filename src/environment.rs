// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Caliper Project Contributors

//! Evaluation sandbox contract.
//!
//! One environment hosts one test file. The loader drives it through this
//! trait and never assumes anything about the engine behind it.

use crate::error::Result;
use crate::value::{JsObject, Value};
use std::path::{Path, PathBuf};

/// The evaluation sandbox hosting one test file.
pub trait Environment {
    /// The sandbox's global object, or `None` once the environment has been
    /// torn down. Module execution requested after teardown is a no-op.
    fn global(&self) -> Option<JsObject>;

    /// Evaluate source text under the given filename and return its value.
    fn run_source_text(&self, source: &str, filename: &Path) -> Result<Value>;

    /// The timer facility tests steer through the runtime API.
    fn fake_timers(&self) -> &dyn FakeTimers;

    /// Absolute path of the test file this environment hosts.
    fn test_file_path(&self) -> PathBuf;

    /// Import through the host mechanism: platform built-in modules and
    /// native-extension files. Never cached by the loader.
    fn host_require(&self, specifier: &str) -> Result<Value>;

    /// Register additional matchers with the environment's assertion library.
    fn add_matchers(&self, matchers: Value);
}

/// Timer control delegated from the per-module runtime API.
pub trait FakeTimers {
    /// Install fake timers in the environment.
    fn use_fake_timers(&self);
    /// Restore real timers.
    fn use_real_timers(&self);
    /// Exhaust the microtask queue.
    fn run_all_ticks(&self);
    /// Run every scheduled immediate.
    fn run_all_immediates(&self);
    /// Run every pending timer, including ones scheduled while running.
    fn run_all_timers(&self);
    /// Run only the timers pending right now.
    fn run_only_pending_timers(&self);
    /// Drop all scheduled timers without running them.
    fn clear_all_timers(&self);
}
