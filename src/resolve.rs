//! Virtual Module Resolver
//!
//! Builds the import map the sandbox resolves every specifier through. There is
//! no package manager and no file server: bare package names point at pinned
//! CDN builds, and every project script or stylesheet points at the handle of
//! its compiled module. The map is rebuilt from scratch on every pass.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::project::FileKind;
use crate::resources::{HandleRegistry, ResourceHandle, ResourceHost, JAVASCRIPT_MIME};
use crate::transpile::TranspiledModule;

/// Pinned locations for the bare package names project code may import.
pub const EXTERNAL_IMPORTS: &[(&str, &str)] = &[
    ("react", "https://esm.sh/react@18.3.1"),
    ("react-dom/client", "https://esm.sh/react-dom@18.3.1/client"),
    ("react/jsx-runtime", "https://esm.sh/react@18.3.1/jsx-runtime"),
    ("@google/genai", "https://esm.sh/@google/genai"),
    ("marked", "https://esm.sh/marked@12.0.2"),
];

pub fn is_external_specifier(specifier: &str) -> bool {
    EXTERNAL_IMPORTS.iter().any(|(name, _)| *name == specifier)
}

/// Import map key for a project file.
pub fn internal_specifier(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportMap {
    imports: IndexMap<String, String>,
}

impl ImportMap {
    /// A map holding only the external table.
    pub fn with_externals() -> Self {
        let mut map = Self::default();
        for (name, url) in EXTERNAL_IMPORTS {
            map.imports.insert(name.to_string(), url.to_string());
        }
        map
    }

    pub fn insert_internal(&mut self, path: &str, handle: &ResourceHandle) {
        self.imports
            .insert(internal_specifier(path), handle.as_str().to_string());
    }

    pub fn get(&self, specifier: &str) -> Option<&str> {
        self.imports.get(specifier).map(String::as_str)
    }

    pub fn contains(&self, specifier: &str) -> bool {
        self.imports.contains_key(specifier)
    }

    pub fn len(&self) -> usize {
        self.imports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.imports.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.imports.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// `{"imports": {...}}`, ready for a `<script type="importmap">`.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A transpiled file bound to the handle the sandbox loads it from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledModule {
    pub path: String,
    pub kind: FileKind,
    pub code: String,
    pub handle: ResourceHandle,
}

/// Give every module one fresh handle and build the complete import map.
pub fn resolve_modules<H: ResourceHost + ?Sized>(
    modules: Vec<TranspiledModule>,
    registry: &mut HandleRegistry,
    host: &mut H,
) -> (ImportMap, Vec<CompiledModule>) {
    let mut import_map = ImportMap::with_externals();
    let mut compiled = Vec::with_capacity(modules.len());

    for module in modules {
        let handle = registry.allocate(host, module.code.clone(), JAVASCRIPT_MIME);
        import_map.insert_internal(&module.path, &handle);
        tracing::trace!(path = %module.path, handle = %handle, "registered module");
        compiled.push(CompiledModule {
            path: module.path,
            kind: module.kind,
            code: module.code,
            handle,
        });
    }

    (import_map, compiled)
}
