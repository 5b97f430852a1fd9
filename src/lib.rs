// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Caliper Project Contributors

//! # caliper-loader
//!
//! The module loader core of the Caliper JavaScript unit-testing framework.
//!
//! Every test file runs inside a fresh evaluation environment. Inside it,
//! this loader intercepts each `require` and decides whether to deliver the
//! real module, a user-written manual mock, or a stub synthesized from the
//! real module's shape:
//!
//! - **Resolver**: identifiers (relative paths, logical names, package
//!   names) resolve to concrete real and manual-mock paths.
//! - **Mock policy**: explicit per-module overrides, the auto-mock flag,
//!   and configured unmock patterns pick real or mock per request.
//! - **Registries**: real and mock evaluations are cached per absolute
//!   path; records are pre-allocated so cyclic imports resolve.
//! - **Executor**: sources are transformed, wrapped, and run inside the
//!   environment with a require bound to the importing file and a
//!   `caliper` runtime-control object.
//! - **Automocker**: real modules are evaluated under isolated registries
//!   and their exported shape is turned into a stub.
//!
//! The evaluation sandbox, source transformer, resource indexer, mock
//! synthesizer, and coverage instrumenter are collaborators behind traits;
//! the loader assumes nothing about what drives them.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use caliper_loader::{Loader, LoaderConfig};
//! use std::rc::Rc;
//!
//! let loader = Loader::new(LoaderConfig::default(), environment, resource_map)?;
//! let exports = loader.require_module_or_mock(&test_file, "./banana")?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod coverage;
pub mod environment;
pub mod error;
pub mod mocking;
pub mod module_system;
pub mod resource_map;
pub mod transform;
pub mod value;

// Re-exports
pub use config::{LoaderConfig, MODULE_PATHS_ENV};
pub use error::{LoaderError, Result};
pub use module_system::{Loader, ModuleIdentity, ModuleKind, Resolver};
pub use resource_map::{Manifest, Resource, ResourceKind, ResourceMap};
pub use value::{CallContext, JsFunction, JsObject, Value};

/// Version of the loader core
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
