// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Caliper Project Contributors

//! Module path resolution

use crate::config::{compile_pattern, LoaderConfig};
use crate::error::{LoaderError, Result};
use crate::resource_map::{ResourceKind, ResourceMap};
use regex::Regex;
use serde::Deserialize;
use std::cell::RefCell;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use tracing::trace;

use rustc_hash::FxHashMap;

/// Platform built-in module names. Requests for these bypass both
/// registries and go straight to the host import mechanism.
pub const CORE_MODULES: &[&str] = &[
    "assert",
    "buffer",
    "child_process",
    "cluster",
    "console",
    "constants",
    "crypto",
    "dgram",
    "dns",
    "domain",
    "events",
    "fs",
    "http",
    "https",
    "module",
    "net",
    "os",
    "path",
    "perf_hooks",
    "process",
    "punycode",
    "querystring",
    "readline",
    "repl",
    "stream",
    "string_decoder",
    "sys",
    "timers",
    "tls",
    "tty",
    "url",
    "util",
    "v8",
    "vm",
    "worker_threads",
    "zlib",
];

/// Separator used inside identity keys: the host's path list separator,
/// which never appears inside a path component.
pub const PATH_LIST_SEPARATOR: char = if cfg!(windows) { ';' } else { ':' };

/// Whether a resolved import names a built-in or a user module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// Platform built-in; delivered by the host, never cached.
    Core,
    /// Project module, subject to mock policy and registries.
    User,
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleKind::Core => write!(f, "core"),
            ModuleKind::User => write!(f, "user"),
        }
    }
}

/// Canonical identity of a resolved import: the real module's path and the
/// manual mock's path, either of which may be absent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleIdentity {
    /// Built-in or user module.
    pub kind: ModuleKind,
    /// Absolute path of the real module, if one resolved.
    pub real_path: Option<PathBuf>,
    /// Absolute path of a manual mock, if one exists.
    pub mock_path: Option<PathBuf>,
}

impl ModuleIdentity {
    fn core(name: &str) -> Self {
        Self {
            kind: ModuleKind::Core,
            real_path: Some(PathBuf::from(name)),
            mock_path: None,
        }
    }

    /// Encode the identity as a single string key.
    pub fn key(&self) -> String {
        let sep = PATH_LIST_SEPARATOR;
        let real = self
            .real_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        let mock = self
            .mock_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        format!("{}{}{}{}{}", self.kind, sep, real, sep, mock)
    }
}

/// Minimal manifest structure for resolution
#[derive(Debug, Deserialize)]
struct PackageJson {
    #[allow(dead_code)]
    name: Option<String>,
    main: Option<String>,
}

/// Maps an importer path plus a requested identifier to the identity of a
/// concrete module: a real path, a manual-mock path, or both.
pub struct Resolver {
    config: Rc<LoaderConfig>,
    resource_map: Rc<ResourceMap>,
    /// Additional search roots, read once from the environment.
    extra_search_roots: Vec<PathBuf>,
    /// Compiled name-mapper rewrites, in declaration order.
    name_mapper: Vec<(Arc<Regex>, String)>,
    /// Lazily built manifest-name to (directory, main) index.
    package_index: RefCell<Option<FxHashMap<String, (PathBuf, Option<String>)>>>,
}

impl Resolver {
    /// Create a resolver over one configuration and resource map.
    pub fn new(
        config: Rc<LoaderConfig>,
        resource_map: Rc<ResourceMap>,
        extra_search_roots: Vec<PathBuf>,
    ) -> Result<Self> {
        let name_mapper = config
            .module_name_mapper
            .iter()
            .map(|(pattern, canonical)| Ok((compile_pattern(pattern)?, canonical.clone())))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            config,
            resource_map,
            extra_search_roots,
            name_mapper,
            package_index: RefCell::new(None),
        })
    }

    /// Check if a name is a platform built-in
    pub fn is_core_module(name: &str) -> bool {
        let name = name.strip_prefix("node:").unwrap_or(name);
        CORE_MODULES.iter().any(|m| *m == name)
    }

    /// Apply the configured name-mapper rewrites. The first matching
    /// pattern replaces the request with its canonical name.
    pub fn apply_name_mapping(&self, name: &str) -> String {
        for (pattern, canonical) in &self.name_mapper {
            if pattern.is_match(name) {
                trace!(from = name, to = %canonical, "name mapping applied");
                return canonical.clone();
            }
        }
        name.to_string()
    }

    /// Resolve a request to its module identity. Resolution failures show
    /// up as absent paths; only callers needing the real path turn that
    /// into an error.
    pub fn resolve_identity(&self, importer: &Path, requested: &str) -> ModuleIdentity {
        if Self::is_core_module(requested) {
            let name = requested.strip_prefix("node:").unwrap_or(requested);
            return ModuleIdentity::core(name);
        }
        let name = self.apply_name_mapping(requested);

        let path_form =
            name.starts_with("./") || name.starts_with("../") || name.starts_with('/');
        let source = self.resource_map.get_resource(ResourceKind::Source, &name);
        let manual = self
            .resource_map
            .get_resource(ResourceKind::ManualMock, &name);

        let mut real_path = None;
        let mut mock_path = None;
        if path_form || (source.is_none() && manual.is_none()) {
            real_path = self.resolve_on_disk(importer, &name);
            if real_path.is_none() && !path_form {
                real_path = self.resolve_via_package(importer, &name);
            }
            if let Some(real) = &real_path {
                mock_path = sibling_manual_mock(real);
            }
        } else {
            real_path = source.map(|r| r.path.clone());
            mock_path = manual.map(|r| r.path.clone());
        }

        trace!(
            from = %importer.display(),
            request = requested,
            ?real_path,
            ?mock_path,
            "resolved"
        );
        ModuleIdentity {
            kind: ModuleKind::User,
            real_path,
            mock_path,
        }
    }

    /// Resolve the real module path, failing when none exists.
    pub fn resolve_real(&self, importer: &Path, requested: &str) -> Result<PathBuf> {
        self.resolve_identity(importer, requested)
            .real_path
            .ok_or_else(|| LoaderError::module_not_found(requested, importer))
    }

    /// Filesystem resolution from the importer's directory, then from each
    /// extra search root.
    fn resolve_on_disk(&self, importer: &Path, request: &str) -> Option<PathBuf> {
        let base = importer.parent().unwrap_or(Path::new("."));
        let mut candidates = vec![base.join(request)];
        for root in &self.extra_search_roots {
            candidates.push(root.join(request));
        }
        candidates.into_iter().find_map(|c| self.lookup(&c))
    }

    /// Try a candidate as a file, with each configured extension appended,
    /// then as a directory.
    fn lookup(&self, candidate: &Path) -> Option<PathBuf> {
        if is_loadable_file(candidate) {
            return Some(normalize_path(candidate));
        }
        for ext in &self.config.module_file_extensions {
            let with_ext = append_extension(candidate, ext);
            if is_loadable_file(&with_ext) {
                return Some(normalize_path(&with_ext));
            }
        }
        if candidate.is_dir() {
            return self.resolve_directory(candidate);
        }
        None
    }

    /// Resolve a directory through its manifest's `main`, falling back to
    /// `index` with each configured extension.
    fn resolve_directory(&self, dir: &Path) -> Option<PathBuf> {
        let manifest_path = dir.join("package.json");
        if manifest_path.is_file() {
            if let Ok(content) = std::fs::read_to_string(&manifest_path) {
                if let Ok(manifest) = serde_json::from_str::<PackageJson>(&content) {
                    if let Some(main) = manifest.main {
                        let main_path = dir.join(&main);
                        if is_loadable_file(&main_path) {
                            return Some(normalize_path(&main_path));
                        }
                        for ext in &self.config.module_file_extensions {
                            let with_ext = append_extension(&main_path, ext);
                            if is_loadable_file(&with_ext) {
                                return Some(normalize_path(&with_ext));
                            }
                        }
                    }
                }
            }
        }
        for ext in &self.config.module_file_extensions {
            let index = dir.join(format!("index.{}", ext));
            if is_loadable_file(&index) {
                return Some(normalize_path(&index));
            }
        }
        None
    }

    /// Fallback for logical names: a project manifest whose declared name
    /// matches the first path segment of the request. The manifest's
    /// directory must not sit under the importer's directory, so a package
    /// can never shadow a local file.
    fn resolve_via_package(&self, importer: &Path, request: &str) -> Option<PathBuf> {
        let (first, rest) = split_first_segment(request);
        let (dir, main) = self.package_lookup(first)?;
        let importer_dir = importer.parent().unwrap_or(Path::new("."));
        if dir.starts_with(importer_dir) {
            return None;
        }
        let relative = match rest {
            Some(sub) => format!("./{}", sub),
            None => match main {
                Some(main) => format!("./{}", main),
                None => ".".to_string(),
            },
        };
        let pseudo_importer = dir.join("package.json");
        self.resolve_on_disk(&pseudo_importer, &relative)
    }

    fn package_lookup(&self, name: &str) -> Option<(PathBuf, Option<String>)> {
        let mut index = self.package_index.borrow_mut();
        let index = index.get_or_insert_with(|| {
            let mut map = FxHashMap::default();
            for resource in self
                .resource_map
                .resources_by_kind(ResourceKind::ProjectConfig)
            {
                if let Some(manifest) = &resource.manifest {
                    let dir = resource
                        .path
                        .parent()
                        .unwrap_or(Path::new("/"))
                        .to_path_buf();
                    map.insert(manifest.name.clone(), (dir, manifest.main.clone()));
                }
            }
            map
        });
        index.get(name).cloned()
    }
}

/// Split a request into its first path segment and the rest.
fn split_first_segment(request: &str) -> (&str, Option<&str>) {
    match request.find('/') {
        Some(pos) => (&request[..pos], Some(&request[pos + 1..])),
        None => (request, None),
    }
}

/// A sibling `__mocks__/<basename>` of the resolved real path, if present.
fn sibling_manual_mock(real: &Path) -> Option<PathBuf> {
    let file_name = real.file_name()?;
    let mock = real.parent()?.join("__mocks__").join(file_name);
    if is_loadable_file(&mock) {
        Some(mock)
    } else {
        None
    }
}

/// A path is loadable if it names a regular file or a FIFO.
fn is_loadable_file(path: &Path) -> bool {
    let Ok(meta) = std::fs::metadata(path) else {
        return false;
    };
    let file_type = meta.file_type();
    if file_type.is_file() {
        return true;
    }
    #[cfg(unix)]
    if std::os::unix::fs::FileTypeExt::is_fifo(&file_type) {
        return true;
    }
    false
}

/// Append an extension without replacing an existing one.
fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".");
    os.push(ext);
    PathBuf::from(os)
}

/// Lexically remove `.` and resolve `..` components. Symlinks are left
/// alone; the policy engine resolves them separately when matching
/// unmock patterns.
fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
