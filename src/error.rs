// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Caliper Project Contributors

//! Error types for the module loader

use crate::resource_map::ResourceKind;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for loader operations
pub type Result<T> = std::result::Result<T, LoaderError>;

/// Errors that can occur while resolving, evaluating, or mocking modules
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Every resolution strategy was exhausted and no manual mock exists
    #[error("Cannot find module '{name}' from '{}'", .importer.display())]
    ModuleNotFound {
        /// The requested module identifier
        name: String,
        /// The file the request came from
        importer: PathBuf,
    },

    /// The mock synthesizer returned no shape for a real module's exports
    #[error("Failed to extract mock metadata from '{}'", .0.display())]
    MockExtractionFailed(PathBuf),

    /// A coverage getter was called though coverage was not configured
    #[error("Coverage information requested but coverage collection is not enabled")]
    CoverageDisabled,

    /// A dependency-graph query named a path absent from the resource map
    #[error("Unknown module path '{}'", .0.display())]
    UnknownModulePath(PathBuf),

    /// A dependency-graph query named a resource that carries no dependency data
    #[error("Resource at '{}' is of kind {kind:?} and has no module dependencies", .path.display())]
    InvalidResourceKind {
        /// The queried path
        path: PathBuf,
        /// The resource's actual kind
        kind: ResourceKind,
    },

    /// File system error
    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// A configured pattern failed to compile
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// An exception raised by evaluated source or by the environment
    #[error("{0}")]
    Execution(String),
}

impl LoaderError {
    /// Create a module-not-found error
    pub fn module_not_found(name: impl Into<String>, importer: impl Into<PathBuf>) -> Self {
        Self::ModuleNotFound {
            name: name.into(),
            importer: importer.into(),
        }
    }

    /// Create an execution error from any message
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }
}
