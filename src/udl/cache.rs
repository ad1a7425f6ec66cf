//! Shared definition cache
//!
//! Every lexer instance for the same language shares one loaded
//! [`DefinitionStore`]. Identifiers arrive percent-encoded from the host
//! and are decoded before lookup; each distinct identifier is loaded at
//! most once, failures included.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

use super::loader::load_or_not_ready;
use super::store::DefinitionStore;
use crate::error::{LoadError, LoadErrorKind};

/// File name suffix of compiled descriptions
pub const LEXRES_EXTENSION: &str = "lexres";

/// Where description text comes from
pub trait DefinitionSource: Send + Sync {
    /// Text of the description named `identifier` (already decoded)
    fn read(&self, identifier: &str) -> Result<String, LoadError>;
}

/// Reads `.lexres` files from disk.
///
/// An identifier that is an absolute path or ends in `.lexres` is used as a
/// path; anything else resolves to `<root>/<identifier>.lexres`.
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn resolve(&self, identifier: &str) -> PathBuf {
        let path = Path::new(identifier);
        let is_file = path
            .extension()
            .is_some_and(|ext| ext == LEXRES_EXTENSION);
        if path.is_absolute() || is_file {
            path.to_path_buf()
        } else {
            self.root.join(format!("{identifier}.{LEXRES_EXTENSION}"))
        }
    }
}

impl DefinitionSource for FileSource {
    fn read(&self, identifier: &str) -> Result<String, LoadError> {
        let path = self.resolve(identifier);
        fs::read_to_string(&path).map_err(|_| LoadError::new(0, LoadErrorKind::MissingFile(path.display().to_string())))
    }
}

/// In-memory descriptions, for embedding and tests
#[derive(Debug, Default)]
pub struct MemorySource {
    sources: FxHashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, identifier: &str, source: &str) -> Self {
        self.insert(identifier, source);
        self
    }

    pub fn insert(&mut self, identifier: &str, source: &str) {
        self.sources.insert(identifier.to_string(), source.to_string());
    }
}

impl DefinitionSource for MemorySource {
    fn read(&self, identifier: &str) -> Result<String, LoadError> {
        self.sources
            .get(identifier)
            .cloned()
            .ok_or_else(|| LoadError::new(0, LoadErrorKind::MissingFile(identifier.to_string())))
    }
}

/// Decode `%XX` escapes; malformed escapes are kept literally.
pub fn percent_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = |b: u8| (b as char).to_digit(16);
            if let (Some(hi), Some(lo)) = (hex(bytes[i + 1]), hex(bytes[i + 2])) {
                out.push((hi * 16 + lo) as u8);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// A store, or the load that will produce it
type Slot = Arc<OnceLock<Arc<DefinitionStore>>>;

/// Identifier-keyed cache of loaded stores
pub struct DefinitionCache {
    source: Box<dyn DefinitionSource>,
    stores: Mutex<FxHashMap<String, Slot>>,
}

impl DefinitionCache {
    pub fn new(source: impl DefinitionSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            stores: Mutex::new(FxHashMap::default()),
        }
    }

    /// Cache reading `.lexres` files under `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self::new(FileSource::new(root))
    }

    /// The store for `identifier`, loading it on first use.
    ///
    /// Concurrent first requests for one identifier wait on a single load;
    /// other identifiers are not held up by it. A failed load yields a
    /// store that is not ready and is cached all the same.
    pub fn get(&self, identifier: &str) -> Arc<DefinitionStore> {
        let identifier = percent_decode(identifier);
        let slot = Arc::clone(self.stores.lock().entry(identifier.clone()).or_default());
        let store = slot.get_or_init(|| {
            let store = match self.source.read(&identifier) {
                Ok(text) => load_or_not_ready(&identifier, &text),
                Err(err) => {
                    info!(identifier = %identifier, error = %err, "definition unavailable");
                    DefinitionStore::not_ready(&identifier, err)
                }
            };
            debug!(identifier = %identifier, ready = store.is_ready(), "definition cached");
            Arc::new(store)
        });
        Arc::clone(store)
    }

    /// Forget a store so the next request reloads it; `true` if it was cached.
    /// Lexers that already hold the old store keep using it.
    pub fn invalidate(&self, identifier: &str) -> bool {
        let identifier = percent_decode(identifier);
        self.stores.lock().remove(&identifier).is_some()
    }

    /// Decoded identifiers currently cached, sorted
    pub fn identifiers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.stores.lock().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.stores.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
