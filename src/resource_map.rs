// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Caliper Project Contributors

//! Read-only index of the project's source files.
//!
//! The map is produced by the resource indexer (optionally materialized
//! from the cache file named by [`crate::LoaderConfig::cache_file_path`])
//! and may be shared between loaders; the loader core only reads it.

use rustc_hash::FxHashMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// What kind of file a resource describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum ResourceKind {
    /// A source module, addressable by logical id.
    Source,
    /// A user-authored mock, addressable by the id of the module it replaces.
    ManualMock,
    /// A project manifest (`package.json`).
    ProjectConfig,
    /// Anything else the indexer scanned.
    Other,
}

/// Manifest data carried by [`ResourceKind::ProjectConfig`] resources.
#[derive(Debug, Clone, Deserialize)]
pub struct Manifest {
    /// The package's declared name.
    pub name: String,
    /// The package's declared entry point, relative to the manifest.
    pub main: Option<String>,
}

/// One indexed file.
#[derive(Debug, Clone)]
pub struct Resource {
    /// Canonical logical id.
    pub id: String,
    /// Resource kind.
    pub kind: ResourceKind,
    /// Absolute path on disk.
    pub path: PathBuf,
    /// Module identifiers this file requires, as written in its source.
    pub required_modules: Vec<String>,
    /// Manifest data, present on `ProjectConfig` resources.
    pub manifest: Option<Manifest>,
}

impl Resource {
    /// A resource with no declared requires and no manifest.
    pub fn new(kind: ResourceKind, id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            kind,
            path: path.into(),
            required_modules: Vec::new(),
            manifest: None,
        }
    }

    /// Attach declared requires.
    pub fn with_requires(mut self, requires: Vec<String>) -> Self {
        self.required_modules = requires;
        self
    }

    /// Attach manifest data.
    pub fn with_manifest(mut self, manifest: Manifest) -> Self {
        self.manifest = Some(manifest);
        self
    }
}

/// The index itself: resources addressable by `(kind, id)` and by path.
#[derive(Debug, Default)]
pub struct ResourceMap {
    resources: Vec<Resource>,
    by_kind_and_id: FxHashMap<(ResourceKind, String), usize>,
    by_path: FxHashMap<PathBuf, usize>,
}

impl ResourceMap {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource. Later insertions win on id or path collisions.
    pub fn insert(&mut self, resource: Resource) {
        let index = self.resources.len();
        self.by_kind_and_id
            .insert((resource.kind, resource.id.clone()), index);
        self.by_path.insert(resource.path.clone(), index);
        self.resources.push(resource);
    }

    /// Look up a resource by kind and logical id.
    pub fn get_resource(&self, kind: ResourceKind, id: &str) -> Option<&Resource> {
        self.by_kind_and_id
            .get(&(kind, id.to_string()))
            .map(|&i| &self.resources[i])
    }

    /// Look up a resource by absolute path.
    pub fn get_resource_by_path(&self, path: &Path) -> Option<&Resource> {
        self.by_path.get(path).map(|&i| &self.resources[i])
    }

    /// Every indexed resource.
    pub fn all_resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }

    /// Every resource of one kind.
    pub fn resources_by_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(move |r| r.kind == kind)
    }

    /// Number of indexed resources.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// True when nothing has been indexed.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
