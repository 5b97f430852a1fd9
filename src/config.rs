// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Caliper Project Contributors

//! Per-test loader configuration

use dashmap::DashMap;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::error::Result;

/// Environment variable naming additional module search roots, delimited
/// like the platform's `PATH`. Read once when a loader is constructed.
pub const MODULE_PATHS_ENV: &str = "NODE_PATH";

/// Immutable configuration supplied to a loader at construction.
///
/// Field names deserialize from the camelCase keys of the framework's
/// project configuration file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoaderConfig {
    /// Ordered candidate extensions for filesystem resolution, without dots.
    pub module_file_extensions: Vec<String>,
    /// Ordered `(pattern, canonical name)` rewrites applied before resolution.
    pub module_name_mapper: Vec<(String, String)>,
    /// Paths matching any of these are excluded from resource-map scanning.
    /// Surfaced here for the resource indexer; the loader itself never
    /// consults them.
    pub module_path_ignore_patterns: Vec<String>,
    /// Paths matching any of these resolve to the real module even when
    /// auto-mocking is on. `None` means every non-exempt module is mocked.
    pub unmocked_module_path_patterns: Option<Vec<String>>,
    /// Default-on policy replacing every non-exempt module with a stub.
    pub automock: bool,
    /// Collect coverage for every executed file.
    pub collect_coverage: bool,
    /// Collect coverage only for the listed files.
    pub collect_coverage_only_from: Option<Vec<PathBuf>>,
    /// Directory holding the resource-map cache file.
    pub cache_directory: PathBuf,
    /// Configuration name, distinguishing cache files of different projects.
    pub name: String,
    /// Roots the resource indexer scanned for test files.
    pub test_path_dirs: Vec<PathBuf>,
    /// The framework's own vendored libraries; always delivered real.
    pub vendor_path: Option<PathBuf>,
    /// Arbitrary data surfaced to tests as a frozen object.
    pub test_env_data: serde_json::Value,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            module_file_extensions: vec!["js".to_string(), "json".to_string()],
            module_name_mapper: Vec::new(),
            module_path_ignore_patterns: Vec::new(),
            unmocked_module_path_patterns: None,
            automock: true,
            collect_coverage: false,
            collect_coverage_only_from: None,
            cache_directory: std::env::temp_dir(),
            name: "caliper".to_string(),
            test_path_dirs: Vec::new(),
            vendor_path: None,
            test_env_data: serde_json::Value::Null,
        }
    }
}

impl LoaderConfig {
    /// Path of the resource-map cache file for this configuration.
    ///
    /// The file's format belongs to the resource indexer; the loader only
    /// derives where it lives.
    pub fn cache_file_path(&self) -> PathBuf {
        self.cache_directory.join(format!("cache-{}", self.name))
    }

    /// Whether any form of coverage collection is configured.
    pub fn coverage_enabled(&self) -> bool {
        self.collect_coverage || self.collect_coverage_only_from.is_some()
    }

    /// Whether the given file should be instrumented for coverage.
    pub(crate) fn should_instrument(&self, path: &Path) -> bool {
        match &self.collect_coverage_only_from {
            Some(selected) => selected.iter().any(|p| p == path),
            None => self.collect_coverage,
        }
    }
}

fn pattern_cache() -> &'static DashMap<String, Arc<Regex>> {
    static CACHE: OnceLock<DashMap<String, Arc<Regex>>> = OnceLock::new();
    CACHE.get_or_init(DashMap::new)
}

/// Compile a configured pattern, sharing compiled regexes process-wide.
///
/// Worker processes reuse identical configurations across many loaders;
/// the table keeps each pattern compiled once per process.
pub(crate) fn compile_pattern(pattern: &str) -> Result<Arc<Regex>> {
    if let Some(compiled) = pattern_cache().get(pattern) {
        return Ok(Arc::clone(compiled.value()));
    }
    let compiled = Arc::new(Regex::new(pattern)?);
    pattern_cache().insert(pattern.to_string(), Arc::clone(&compiled));
    Ok(compiled)
}
