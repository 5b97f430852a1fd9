// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Caliper Project Contributors

//! Source transformation contract

use crate::config::LoaderConfig;
use crate::error::Result;
use std::path::Path;

/// Rewrites file contents before evaluation.
///
/// The executor reads the raw source and hands it here together with the
/// filename; transpilers key their behavior off the extension.
pub trait Transformer {
    /// Produce the source text to evaluate.
    fn transform(&self, source: &str, filename: &Path, config: &LoaderConfig) -> Result<String>;
}

/// A transformer that evaluates files as written.
#[derive(Debug, Default)]
pub struct PassthroughTransformer;

impl Transformer for PassthroughTransformer {
    fn transform(&self, source: &str, _filename: &Path, _config: &LoaderConfig) -> Result<String> {
        Ok(source.to_string())
    }
}
