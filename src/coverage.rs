// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Caliper Project Contributors

//! Coverage instrumentation contract

use crate::value::Value;
use std::path::Path;
use std::rc::Rc;

/// Parameter name the instrumented source writes its counters through.
pub const COVERAGE_SINK_NAME: &str = "$__cov__";

/// Builds one collector per instrumented file.
pub trait CoverageInstrumenter {
    /// Create a collector for the given file's transformed source.
    fn create(&self, source: &str, filename: &Path) -> Rc<dyn CoverageCollector>;
}

/// Per-file instrumented execution data.
pub trait CoverageCollector {
    /// The value passed to the module as its coverage sink.
    fn coverage_data_store(&self) -> Value;

    /// The instrumented form of the source, referencing `sink_name`.
    fn instrumented_source(&self, sink_name: &str) -> String;

    /// Runtime coverage data accumulated so far.
    fn extract_runtime_coverage_info(&self) -> Value;
}
