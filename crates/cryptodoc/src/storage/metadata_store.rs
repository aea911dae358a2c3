//! Durable registry of document records
//!
//! The whole registry lives in memory behind one `RwLock` and is rewritten to
//! a single JSON file on every mutation. Writes go to a temporary file in the
//! same directory which is then renamed over the registry, so a crash never
//! leaves a torn file behind.

use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::DocumentRecord;

/// Durable, concurrency-safe registry of [`DocumentRecord`]s keyed by id
pub struct MetadataStore {
    path: PathBuf,
    records: RwLock<HashMap<String, DocumentRecord>>,
}

impl MetadataStore {
    /// Open the registry at `path`
    ///
    /// A missing file yields an empty registry. A file that exists but cannot
    /// be decoded is reported as [`Error::CorruptStore`].
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let records = Self::read_registry(&path)?;

        tracing::info!(
            "Loaded {} document records from {}",
            records.len(),
            path.display()
        );

        Ok(Self {
            path,
            records: RwLock::new(records),
        })
    }

    fn read_registry(path: &Path) -> Result<HashMap<String, DocumentRecord>> {
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&raw).map_err(|e| Error::CorruptStore {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Path of the backing registry file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or overwrite a record by id
    ///
    /// Returns only after the full registry is on disk. The preview URL is
    /// derived data and is dropped before storing. If the write fails the
    /// in-memory map is restored to its previous state.
    pub fn add_or_update(&self, mut record: DocumentRecord) -> Result<()> {
        record.preview_url = None;
        let id = record.id.clone();

        let mut records = self.records.write();
        let previous = records.insert(id.clone(), record);

        if let Err(e) = self.write_registry(&records) {
            match previous {
                Some(previous) => records.insert(id.clone(), previous),
                None => records.remove(&id),
            };
            tracing::error!("Failed to persist record {}: {}", id, e);
            return Err(e);
        }

        Ok(())
    }

    /// Point lookup by id
    ///
    /// Deleted records ARE returned: a caller holding an id can still read a
    /// tombstoned record, e.g. to confirm that a deletion happened. Use
    /// [`MetadataStore::get_all`] for the live set.
    pub fn get(&self, id: &str) -> Option<DocumentRecord> {
        self.records.read().get(id).cloned()
    }

    /// Snapshot of all non-deleted records, in no particular order
    pub fn get_all(&self) -> Vec<DocumentRecord> {
        self.records
            .read()
            .values()
            .filter(|r| !r.deleted)
            .cloned()
            .collect()
    }

    /// Non-deleted records whose name matches, ignoring case
    pub fn find_by_name(&self, name: &str) -> Vec<DocumentRecord> {
        let needle = name.to_lowercase();
        self.records
            .read()
            .values()
            .filter(|r| !r.deleted && r.name.to_lowercase() == needle)
            .cloned()
            .collect()
    }

    /// Ledger ids referenced by any record, deleted ones included
    pub fn ledger_ids(&self) -> HashSet<String> {
        self.records
            .read()
            .values()
            .filter_map(|r| r.ledger_id.clone())
            .collect()
    }

    /// Non-deleted records pointing at one of the given ledger ids
    pub fn find_by_ledger_ids(&self, ledger_ids: &HashSet<String>) -> Vec<DocumentRecord> {
        self.records
            .read()
            .values()
            .filter(|r| {
                !r.deleted
                    && r
                        .ledger_id
                        .as_ref()
                        .is_some_and(|id| ledger_ids.contains(id))
            })
            .cloned()
            .collect()
    }

    /// Soft-delete a record; unknown ids are a no-op
    pub fn delete(&self, id: &str) -> Result<()> {
        let mut records = self.records.write();

        let Some(record) = records.get_mut(id) else {
            return Ok(());
        };
        if record.deleted {
            return Ok(());
        }
        record.deleted = true;

        if let Err(e) = self.write_registry(&records) {
            if let Some(record) = records.get_mut(id) {
                record.deleted = false;
            }
            tracing::error!("Failed to persist deletion of {}: {}", id, e);
            return Err(e);
        }

        Ok(())
    }

    /// Number of records, including deleted ones
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Serialize and atomically replace the registry file
    fn write_registry(&self, records: &HashMap<String, DocumentRecord>) -> Result<()> {
        let data = serde_json::to_vec_pretty(records)?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| Error::Persist(e.to_string()))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .map_err(|e| Error::Persist(format!("temp file in {}: {}", dir.display(), e)))?;
        tmp.write_all(&data)
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| Error::Persist(e.to_string()))?;
        tmp.persist(&self.path)
            .map_err(|e| Error::Persist(format!("replace {}: {}", self.path.display(), e.error)))?;

        Ok(())
    }
}
