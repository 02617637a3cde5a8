use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;

use super::document::SchemaDocument;
use crate::error::SchemaLoadError;

/// Where raw schema bytes come from.
pub trait SchemaSource: Send + Sync {
    fn load(&self, id: &str) -> Result<Vec<u8>, String>;

    /// Identifiers this source can enumerate, if any.
    fn identifiers(&self) -> Result<Vec<String>, String> {
        Ok(Vec::new())
    }
}

/// Reads `<root>/<id>.json`.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, String> {
        let relative = Path::new(id);
        let plain = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if id.is_empty() || !plain || relative.components().count() != 1 {
            return Err(format!("schema identifier `{id}` must be a plain file name"));
        }

        if id.ends_with(".json") {
            Ok(self.root.join(id))
        } else {
            Ok(self.root.join(format!("{id}.json")))
        }
    }
}

impl SchemaSource for DirectorySource {
    fn load(&self, id: &str) -> Result<Vec<u8>, String> {
        let path = self.path_for(id)?;
        fs::read(&path).map_err(|err| format!("failed to read `{}`: {err}", path.display()))
    }

    fn identifiers(&self) -> Result<Vec<String>, String> {
        let entries = fs::read_dir(&self.root)
            .map_err(|err| format!("failed to list `{}`: {err}", self.root.display()))?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| format!("failed to list `{}`: {err}", self.root.display()))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// Schemas registered in code.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    documents: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: impl Into<String>, document: impl Into<Vec<u8>>) -> Self {
        self.documents.insert(id.into(), document.into());
        self
    }
}

impl SchemaSource for MemorySource {
    fn load(&self, id: &str) -> Result<Vec<u8>, String> {
        self.documents
            .get(id)
            .cloned()
            .ok_or_else(|| format!("no embedded schema named `{id}`"))
    }

    fn identifiers(&self) -> Result<Vec<String>, String> {
        let mut ids: Vec<String> = self.documents.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

type Slot = Arc<OnceCell<Arc<SchemaDocument>>>;

/// Load-once cache of schema documents keyed by identifier.
///
/// Concurrent first use of an identifier blocks on a per-identifier cell, so
/// the source is read at most once per successful load. Failed loads are not
/// cached.
pub struct SchemaStore {
    source: Box<dyn SchemaSource>,
    slots: Mutex<HashMap<String, Slot>>,
    loads: AtomicUsize,
}

impl SchemaStore {
    pub fn new(source: impl SchemaSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            slots: Mutex::new(HashMap::new()),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn from_dir(root: impl Into<PathBuf>) -> Self {
        Self::new(DirectorySource::new(root))
    }

    /// `Foo` and `Foo.json` name the same schema.
    pub fn resolve(&self, id: &str) -> Result<Arc<SchemaDocument>, SchemaLoadError> {
        let id = id.strip_suffix(".json").unwrap_or(id);
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            slots.entry(id.to_string()).or_default().clone()
        };

        slot.get_or_try_init(|| self.load(id)).cloned()
    }

    /// Resolve every identifier in `ids`, collecting failures instead of
    /// stopping at the first.
    pub fn preload<'a>(
        &self,
        ids: impl IntoIterator<Item = &'a str>,
    ) -> Vec<Result<Arc<SchemaDocument>, SchemaLoadError>> {
        ids.into_iter().map(|id| self.resolve(id)).collect()
    }

    pub fn available(&self) -> Result<Vec<String>, String> {
        self.source.identifiers()
    }

    /// Number of loads performed against the source.
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    fn load(&self, id: &str) -> Result<Arc<SchemaDocument>, SchemaLoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        let bytes = self.source.load(id).map_err(|reason| SchemaLoadError::NotFound {
            id: id.to_string(),
            reason,
        })?;

        let document = SchemaDocument::parse(id, &bytes)?;
        tracing::debug!(schema = id, "schema loaded");
        Ok(Arc::new(document))
    }
}
