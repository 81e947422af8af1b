//! Loader facade: reads a map document, builds the graph and runs the
//! post-load hooks.

pub mod json_loader;
pub mod xml_loader;

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, info};

use crate::builder;
use crate::error::{MapError, RegistryError};
use crate::map::Map;
use crate::project;
use crate::properties::PropertyTypes;
use crate::registry::{self, EntityKind, Specialization, TypeRegistry};
use crate::tree::Element;

/// Source of document text: the filesystem, an archive, memory.
pub trait ResourceReader: Send + Sync {
    fn read_to_string(&self, path: &Path) -> io::Result<String>;
}

/// Filesystem reader. A missing file is retried with a case-insensitive
/// match of its file name inside the same directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsReader;

impl ResourceReader for FsReader {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        match fs::read_to_string(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => match find_case_insensitive(path) {
                Some(found) => {
                    debug!(requested = %path.display(), found = %found.display(), "case-insensitive match");
                    fs::read_to_string(found)
                }
                None => Err(e),
            },
            other => other,
        }
    }
}

fn find_case_insensitive(path: &Path) -> Option<PathBuf> {
    let wanted = path.file_name()?.to_string_lossy().to_lowercase();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .find(|entry| entry.file_name().to_string_lossy().to_lowercase() == wanted)
        .map(|entry| entry.path())
}

/// In-memory documents keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryReader {
    files: HashMap<PathBuf, String>,
}

impl MemoryReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl AsRef<Path>, text: impl Into<String>) {
        self.files.insert(normalize(path.as_ref()), text.into());
    }

    pub fn with(mut self, path: impl AsRef<Path>, text: impl Into<String>) -> Self {
        self.insert(path, text);
        self
    }
}

impl ResourceReader for MemoryReader {
    fn read_to_string(&self, path: &Path) -> io::Result<String> {
        let path = normalize(path);
        if let Some(text) = self.files.get(&path) {
            return Ok(text.clone());
        }
        let wanted = path.to_string_lossy().to_lowercase();
        self.files
            .iter()
            .find(|(k, _)| k.to_string_lossy().to_lowercase() == wanted)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path.display())))
    }
}

/// Lexically resolves `.` and `..` components.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
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

/// Resolves `relative` against the directory of `document`.
pub(crate) fn resolve_relative(document: &Path, relative: &str) -> PathBuf {
    let dir = document.parent().unwrap_or_else(|| Path::new(""));
    normalize(&dir.join(relative))
}

/// Per-loader switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Turn the first recorded anomaly into a load error.
    pub strict: bool,
}

/// Owns the type registry, the custom property types and the resource
/// reader. Loads are independent of each other; a loader can be shared
/// between threads.
pub struct Loader {
    pub(crate) registry: TypeRegistry,
    pub(crate) property_types: PropertyTypes,
    reader: Box<dyn ResourceReader>,
    pub(crate) options: LoadOptions,
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("registry", &self.registry)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Loader {
    /// Filesystem-backed loader with an empty registry.
    pub fn new() -> Self {
        Self::with_reader(FsReader)
    }

    pub fn with_reader(reader: impl ResourceReader + 'static) -> Self {
        Self {
            registry: TypeRegistry::new(),
            property_types: PropertyTypes::new(),
            reader: Box::new(reader),
            options: LoadOptions::default(),
        }
    }

    pub fn with_options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_property_types(mut self, types: PropertyTypes) -> Self {
        self.property_types = types;
        self
    }

    pub fn options(&self) -> LoadOptions {
        self.options
    }

    pub fn property_types(&self) -> &PropertyTypes {
        &self.property_types
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }

    /// Shorthand for [`TypeRegistry::register`].
    pub fn register(
        &mut self,
        kind: EntityKind,
        implementation: Arc<dyn Specialization>,
        type_names: &[&str],
        as_base: bool,
    ) -> Result<(), RegistryError> {
        self.registry
            .register(kind, implementation, type_names, as_base)
    }

    /// Reads the custom property types of an editor project file and adds
    /// them to this loader's.
    pub fn load_project(&mut self, path: impl AsRef<Path>) -> Result<(), MapError> {
        let path = path.as_ref();
        let text = self.read(path)?;
        let types = project::parse_project(&text, path)?;
        info!(path = %path.display(), "loaded project property types");
        self.property_types.extend(types);
        Ok(())
    }

    /// Loads the map at `path`.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Map, MapError> {
        let path = path.as_ref();
        let text = self.read(path)?;
        self.load_from_str(&text, path)
    }

    /// Loads a map from document text; `path` locates relative resources
    /// and selects the front-end.
    pub fn load_from_str(&self, text: &str, path: impl AsRef<Path>) -> Result<Map, MapError> {
        let path = path.as_ref();
        let root = parse_document(text, path)?;
        self.load_tree(&root, path)
    }

    /// Builds a map from an already ingested tree.
    pub fn load_tree(&self, root: &Element, path: impl AsRef<Path>) -> Result<Map, MapError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading map");
        let mut map = builder::build_map(self, root, path)?;
        registry::run_post_load(&mut map);
        info!(
            path = %path.display(),
            tilesets = map.tilesets.len(),
            layers = map.layers.len(),
            anomalies = map.anomalies.len(),
            "map loaded"
        );
        Ok(map)
    }

    pub(crate) fn read(&self, path: &Path) -> Result<String, MapError> {
        self.reader
            .read_to_string(path)
            .map_err(|source| MapError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Reads and ingests a referenced document (external tileset, template).
    pub(crate) fn read_document(&self, path: &Path) -> Result<Element, MapError> {
        let text = self.read(path)?;
        parse_document(&text, path)
    }
}

/// Picks the front-end from the file extension: `json`, `tmj`, `tsj` and
/// `tj` are JSON, anything else is XML.
pub fn parse_document(text: &str, path: &Path) -> Result<Element, MapError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("json" | "tmj" | "tsj" | "tj") => json_loader::parse_document(text, path),
        _ => xml_loader::parse_document(text, path),
    }
}
