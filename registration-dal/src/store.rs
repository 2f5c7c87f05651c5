//! In-process document session with unique indexes and optional persistence.
//!
//! Documents are JSON objects grouped in named collections and keyed by
//! their `_id`. A session can live purely in memory or be backed by a JSON
//! snapshot file that is rewritten atomically on save.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use registration_core::constants::DOCUMENT_ID_FIELD;
use registration_core::types::ObjectId;

/// A stored document.
pub type Document = Map<String, Value>;

/// Current snapshot format version
const SNAPSHOT_VERSION: u8 = 1;

/// Errors raised by a [`DocumentSession`].
#[derive(Debug, Error)]
pub enum DocumentError {
    /// An insert or index build would duplicate a unique value.
    #[error("duplicate key error collection: {collection} index: {field}_1 dup key: {value}")]
    DuplicateKey {
        /// Collection name
        collection: String,
        /// Indexed field
        field: String,
        /// Rendered duplicate value
        value: String,
    },

    /// The value handed to `insert_one` was not a JSON object.
    #[error("document must be a JSON object")]
    NotAnObject,

    /// `_id` present but not a string.
    #[error("document _id must be a string")]
    InvalidId,

    /// Snapshot file is corrupt or of another version.
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias for document session operations.
pub type DocumentResult<T> = std::result::Result<T, DocumentError>;

/// Index declaration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Indexed field
    pub field: String,
    /// Whether values must be unique
    pub unique: bool,
}

/// One collection: documents by id plus unique lookups.
#[derive(Debug, Default)]
struct Collection {
    /// Primary storage: _id → document
    documents: BTreeMap<String, Document>,
    /// Declared indexes
    indexes: Vec<IndexSpec>,
    /// Unique lookups: field → (rendered value → _id)
    unique: HashMap<String, HashMap<String, String>>,
}

impl Collection {
    /// Renders an indexed value. Missing or null fields are not indexed.
    fn index_key(document: &Document, field: &str) -> Option<String> {
        match document.get(field) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
        }
    }

    fn ensure_index(&mut self, name: &str, spec: IndexSpec) -> DocumentResult<()> {
        if self.indexes.contains(&spec) {
            return Ok(());
        }

        if spec.unique {
            let mut lookup = HashMap::with_capacity(self.documents.len());
            for (id, document) in &self.documents {
                if let Some(key) = Self::index_key(document, &spec.field) {
                    if lookup.insert(key.clone(), id.clone()).is_some() {
                        return Err(DocumentError::DuplicateKey {
                            collection: name.to_string(),
                            field: spec.field,
                            value: key,
                        });
                    }
                }
            }
            self.unique.insert(spec.field.clone(), lookup);
        }

        self.indexes.push(spec);
        Ok(())
    }

    fn insert(&mut self, name: &str, id: String, document: Document) -> DocumentResult<()> {
        if self.documents.contains_key(&id) {
            return Err(DocumentError::DuplicateKey {
                collection: name.to_string(),
                field: DOCUMENT_ID_FIELD.to_string(),
                value: id,
            });
        }

        // Check every unique index before touching any of them
        for (field, lookup) in &self.unique {
            if let Some(key) = Self::index_key(&document, field) {
                if lookup.contains_key(&key) {
                    return Err(DocumentError::DuplicateKey {
                        collection: name.to_string(),
                        field: field.clone(),
                        value: key,
                    });
                }
            }
        }

        for (field, lookup) in self.unique.iter_mut() {
            if let Some(key) = Self::index_key(&document, field) {
                lookup.insert(key, id.clone());
            }
        }
        self.documents.insert(id, document);
        Ok(())
    }

    fn find_one(&self, field: &str, value: &Value) -> Option<Document> {
        if field == DOCUMENT_ID_FIELD {
            return value
                .as_str()
                .and_then(|id| self.documents.get(id))
                .cloned();
        }

        if let Some(lookup) = self.unique.get(field) {
            let key = match value {
                Value::String(s) => s.clone(),
                Value::Null => return None,
                other => other.to_string(),
            };
            return lookup
                .get(&key)
                .and_then(|id| self.documents.get(id))
                .cloned();
        }

        self.documents
            .values()
            .find(|doc| doc.get(field) == Some(value))
            .cloned()
    }
}

/// On-disk snapshot of a session.
#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u8,
    collections: BTreeMap<String, CollectionSnapshot>,
}

#[derive(Serialize, Deserialize)]
struct CollectionSnapshot {
    indexes: Vec<IndexSpec>,
    documents: Vec<Document>,
}

/// Handle to a document store, owned by the host application.
///
/// # Thread Safety
///
/// Collections live in a concurrent map; an insert holds its collection's
/// entry exclusively, so unique checks and the write are atomic.
///
/// # File Format
///
/// ```text
/// { "version": 1, "collections": { "<name>": { "indexes": [...], "documents": [...] } } }
/// ```
pub struct DocumentSession {
    /// Collections by name
    collections: DashMap<String, Collection>,
    /// Snapshot file, if persistent
    path: Option<PathBuf>,
    /// Bumped by every write
    generation: AtomicU64,
    /// Generation covered by the last snapshot on disk
    saved_generation: AtomicU64,
    /// Auto-save threshold (save after N writes)
    auto_save_threshold: u64,
    /// Writes since last save
    writes_since_save: AtomicU64,
}

impl DocumentSession {
    /// Creates an empty, purely in-memory session.
    pub fn in_memory() -> Self {
        Self {
            collections: DashMap::new(),
            path: None,
            generation: AtomicU64::new(0),
            saved_generation: AtomicU64::new(0),
            auto_save_threshold: u64::MAX,
            writes_since_save: AtomicU64::new(0),
        }
    }

    /// Opens a session backed by `path`.
    ///
    /// If the file exists it is loaded. Otherwise the session starts empty and
    /// the file is created on first save.
    pub async fn open(path: impl AsRef<Path>) -> DocumentResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut session = Self::in_memory();
        session.auto_save_threshold = 100;

        if fs::try_exists(&path).await? {
            session.load(&path).await?;
        }
        session.path = Some(path);

        Ok(session)
    }

    /// Opens a persistent session with a custom auto-save threshold.
    pub async fn with_auto_save(path: impl AsRef<Path>, threshold: u64) -> DocumentResult<Self> {
        let mut session = Self::open(path).await?;
        session.auto_save_threshold = threshold;
        Ok(session)
    }

    #[instrument(skip(self))]
    async fn load(&self, path: &Path) -> DocumentResult<()> {
        let contents = fs::read(path).await?;
        let snapshot: Snapshot = serde_json::from_slice(&contents)
            .map_err(|e| DocumentError::InvalidSnapshot(e.to_string()))?;

        if snapshot.version != SNAPSHOT_VERSION {
            return Err(DocumentError::InvalidSnapshot(format!(
                "version mismatch: expected {}, got {}",
                SNAPSHOT_VERSION, snapshot.version
            )));
        }

        for (name, stored) in snapshot.collections {
            let mut collection = Collection::default();
            for document in stored.documents {
                let id = match document.get(DOCUMENT_ID_FIELD) {
                    Some(Value::String(id)) => id.clone(),
                    _ => return Err(DocumentError::InvalidId),
                };
                collection.insert(&name, id, document)?;
            }
            for spec in stored.indexes {
                collection.ensure_index(&name, spec)?;
            }
            info!(collection = %name, count = collection.documents.len(), "Loaded collection");
            self.collections.insert(name, collection);
        }

        self.saved_generation
            .store(self.generation.load(Ordering::SeqCst), Ordering::SeqCst);
        Ok(())
    }

    /// Declares an index on `collection.field`, building it from existing documents.
    ///
    /// Declaring the same index twice is a no-op.
    pub fn ensure_index(&self, collection: &str, field: &str, unique: bool) -> DocumentResult<()> {
        let mut entry = self.collections.entry(collection.to_string()).or_default();
        entry.ensure_index(
            collection,
            IndexSpec {
                field: field.to_string(),
                unique,
            },
        )?;
        debug!(collection, field, unique, "Index ensured");
        Ok(())
    }

    /// Inserts a document and returns its `_id`.
    ///
    /// A missing `_id` is filled with a fresh [`ObjectId`].
    pub async fn insert_one(&self, collection: &str, document: Value) -> DocumentResult<String> {
        let mut document = match document {
            Value::Object(map) => map,
            _ => return Err(DocumentError::NotAnObject),
        };

        let id = match document.get(DOCUMENT_ID_FIELD) {
            Some(Value::String(id)) => id.clone(),
            Some(_) => return Err(DocumentError::InvalidId),
            None => {
                let id = ObjectId::new().to_hex();
                document.insert(DOCUMENT_ID_FIELD.to_string(), Value::String(id.clone()));
                id
            }
        };

        {
            let mut entry = self.collections.entry(collection.to_string()).or_default();
            entry.insert(collection, id.clone(), document)?;
        }

        debug!(collection, id = %id, "Inserted document");
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.maybe_auto_save().await?;
        Ok(id)
    }

    /// Finds a document by `_id`.
    pub fn find_by_id(&self, collection: &str, id: &str) -> Option<Document> {
        self.collections
            .get(collection)
            .and_then(|c| c.documents.get(id).cloned())
    }

    /// Finds the first document whose `field` equals `value`.
    pub fn find_one(&self, collection: &str, field: &str, value: &Value) -> Option<Document> {
        self.collections
            .get(collection)
            .and_then(|c| c.find_one(field, value))
    }

    /// Number of documents in `collection`.
    pub fn count(&self, collection: &str) -> u64 {
        self.collections
            .get(collection)
            .map(|c| c.documents.len() as u64)
            .unwrap_or(0)
    }

    /// Indexes declared on `collection`.
    pub fn indexes(&self, collection: &str) -> Vec<IndexSpec> {
        self.collections
            .get(collection)
            .map(|c| c.indexes.clone())
            .unwrap_or_default()
    }

    /// Drops every collection.
    pub fn drop_all(&self) {
        self.collections.clear();
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Writes the snapshot file. A no-op for in-memory sessions.
    #[instrument(skip(self))]
    pub async fn save(&self) -> DocumentResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        // Read before snapshotting: a write racing the snapshot keeps the session dirty
        let generation = self.generation.load(Ordering::SeqCst);
        let pending_writes = self.writes_since_save.load(Ordering::SeqCst);

        let collections = self
            .collections
            .iter()
            .map(|entry| {
                let stored = CollectionSnapshot {
                    indexes: entry.indexes.clone(),
                    documents: entry.documents.values().cloned().collect(),
                };
                (entry.key().clone(), stored)
            })
            .collect();
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            collections,
        };
        let serialized = serde_json::to_vec_pretty(&snapshot)?;

        info!(path = ?path, "Saving document session");

        // Write atomically (write to temp, then rename)
        let temp_path = path.with_extension("tmp");
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(&serialized).await?;
        file.sync_all().await?;

        fs::rename(&temp_path, path).await?;

        self.saved_generation.fetch_max(generation, Ordering::SeqCst);
        let _ = self
            .writes_since_save
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |w| {
                Some(w.saturating_sub(pending_writes))
            });
        Ok(())
    }

    /// Saves if there are unsaved changes.
    pub async fn flush(&self) -> DocumentResult<()> {
        if self.is_dirty() {
            self.save().await?;
        }
        Ok(())
    }

    /// Checks if there are unsaved changes.
    pub fn is_dirty(&self) -> bool {
        self.generation.load(Ordering::SeqCst) != self.saved_generation.load(Ordering::SeqCst)
    }

    /// Returns the snapshot path, if persistent.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn maybe_auto_save(&self) -> DocumentResult<()> {
        if self.path.is_none() {
            return Ok(());
        }
        let writes = self.writes_since_save.fetch_add(1, Ordering::SeqCst);
        if writes >= self.auto_save_threshold {
            self.save().await?;
        }
        Ok(())
    }
}

impl Default for DocumentSession {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for DocumentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentSession")
            .field("collections", &self.collections.len())
            .field("path", &self.path)
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

impl Drop for DocumentSession {
    fn drop(&mut self) {
        if self.path.is_some() && self.is_dirty() {
            warn!("DocumentSession dropped with unsaved changes");
        }
    }
}
