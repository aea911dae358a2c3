//! Local provider implementations backed by the filesystem
//!
//! `LocalObjectStore` keeps document bytes under a root directory and hands
//! out signed, expiring URLs for them. `LocalLedger` is an append-only journal
//! whose entries are chained by SHA-256 so tampering with history is visible.

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::{LedgerConfig, ObjectStoreConfig};
use crate::error::{Error, Result};

use super::ledger::{LedgerClient, LedgerDocument, LedgerReceipt};
use super::object_store::ObjectStore;

/// Filesystem object store
pub struct LocalObjectStore {
    root: PathBuf,
    public_base_url: String,
    signing_secret: String,
}

impl LocalObjectStore {
    /// Create a new store rooted at `root`
    pub fn new(
        root: PathBuf,
        public_base_url: impl Into<String>,
        signing_secret: impl Into<String>,
    ) -> Result<Self> {
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            public_base_url: public_base_url.into(),
            signing_secret: signing_secret.into(),
        })
    }

    /// Create from config
    pub fn from_config(config: &ObjectStoreConfig) -> Result<Self> {
        Self::new(
            config.root_dir.clone(),
            config.public_base_url.clone(),
            config.signing_secret.clone(),
        )
    }

    /// Map a key to a path under the root; keys are relative, `/`-separated
    fn object_path(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && !key.contains('\\')
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(Error::storage(format!("Invalid object key: {}", key)));
        }
        Ok(self.root.join(relative))
    }

    fn signature(&self, key: &str, expires: i64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.signing_secret.as_bytes());
        hasher.update(b"\n");
        hasher.update(key.as_bytes());
        hasher.update(b"\n");
        hasher.update(expires.to_string().as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Check a presigned URL's expiry and signature
    pub fn verify_signature(&self, key: &str, expires: i64, signature: &str) -> bool {
        expires >= Utc::now().timestamp() && self.signature(key, expires) == signature
    }
}

#[async_trait]
impl ObjectStore for LocalObjectStore {
    async fn put(&self, key: &str, data: &[u8], _content_type: &str) -> Result<()> {
        let path = self.object_path(key)?;
        let parent = path
            .parent()
            .ok_or_else(|| Error::storage(format!("Invalid object key: {}", key)))?;
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| Error::storage(format!("Failed to create {}: {}", parent.display(), e)))?;

        let tmp = parent.join(format!(".{}.tmp", Uuid::new_v4()));
        let written = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(data).await?;
            file.sync_all().await?;
            tokio::fs::rename(&tmp, &path).await
        }
        .await;

        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::storage(format!("Failed to write {}: {}", key, e)));
        }

        tracing::debug!("Stored object {} ({} bytes)", key, data.len());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(key)?;
        tokio::fs::read(&path)
            .await
            .map_err(|e| Error::storage(format!("Failed to read object {}: {}", key, e)))
    }

    async fn presigned_url(&self, key: &str, ttl: Duration) -> Result<String> {
        self.object_path(key)?;
        let expires = Utc::now().timestamp() + ttl.as_secs() as i64;
        Ok(format!(
            "{}/{}?expires={}&signature={}",
            self.public_base_url.trim_end_matches('/'),
            key,
            expires,
            self.signature(key, expires)
        ))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.root.is_dir())
    }

    fn name(&self) -> &str {
        "local-filesystem"
    }
}

const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// One line of the ledger journal
#[derive(Debug, Clone, Serialize, Deserialize)]
struct JournalEntry {
    #[serde(flatten)]
    document: LedgerDocument,
    /// Fingerprint of the key that signed the registration
    signer: String,
    prev_hash: String,
    tx_hash: String,
}

impl JournalEntry {
    fn compute_hash(document: &LedgerDocument, signer: &str, prev_hash: &str) -> String {
        let id = document.id.to_string();
        let timestamp = document.timestamp.to_rfc3339();
        let fields: [&str; 8] = [
            prev_hash,
            &id,
            &document.filename,
            &document.hash,
            &document.storage_key,
            &document.tag,
            signer,
            &timestamp,
        ];

        let mut hasher = Sha256::new();
        for field in fields {
            hasher.update(field.as_bytes());
            hasher.update([0u8]);
        }
        hex::encode(hasher.finalize())
    }
}

/// Append-only hash-chained ledger journal
pub struct LocalLedger {
    path: PathBuf,
    entries: Mutex<Vec<JournalEntry>>,
    /// Journal length covering `entries`; only changed under the `entries` lock
    committed_len: AtomicU64,
}

impl LocalLedger {
    /// Open the journal at `path`, replaying and checking existing entries
    pub async fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let (entries, committed_len) = match tokio::fs::read_to_string(&path).await {
            Ok(content) => {
                let (entries, valid_len) = Self::replay(&path, &content)?;
                if valid_len < content.len() {
                    tracing::warn!(
                        "Dropping torn trailing entry from ledger journal {}",
                        path.display()
                    );
                    Self::truncate(&path, valid_len as u64).await?;
                }
                (entries, valid_len as u64)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => (Vec::new(), 0),
            Err(e) => return Err(e.into()),
        };

        tracing::info!("Opened ledger journal {} ({} entries)", path.display(), entries.len());

        Ok(Self {
            path,
            entries: Mutex::new(entries),
            committed_len: AtomicU64::new(committed_len),
        })
    }

    /// Create from config
    pub async fn from_config(config: &LedgerConfig) -> Result<Self> {
        Self::open(config.journal_path.clone()).await
    }

    /// Replay journal lines, checking the hash chain
    ///
    /// A final line without its newline is a torn append; it is left out and
    /// the returned length stops before it.
    fn replay(path: &Path, content: &str) -> Result<(Vec<JournalEntry>, usize)> {
        let corrupt = |message: String| Error::CorruptStore {
            path: path.to_path_buf(),
            message,
        };

        let mut entries: Vec<JournalEntry> = Vec::new();
        let mut offset = 0;
        for (line_no, raw) in content.split_inclusive('\n').enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                offset += raw.len();
                continue;
            }
            if !raw.ends_with('\n') {
                break;
            }
            let entry: JournalEntry = serde_json::from_str(line)
                .map_err(|e| corrupt(format!("line {}: {}", line_no + 1, e)))?;

            let prev_hash = entries
                .last()
                .map(|e| e.tx_hash.as_str())
                .unwrap_or(GENESIS_HASH);
            let expected = JournalEntry::compute_hash(&entry.document, &entry.signer, prev_hash);
            if entry.document.id != entries.len() as u64 + 1
                || entry.prev_hash != prev_hash
                || entry.tx_hash != expected
            {
                return Err(corrupt(format!("line {}: broken hash chain", line_no + 1)));
            }
            entries.push(entry);
            offset += raw.len();
        }
        Ok((entries, offset))
    }

    async fn truncate(path: &Path, len: u64) -> Result<()> {
        let file = tokio::fs::OpenOptions::new().write(true).open(path).await?;
        file.set_len(len).await?;
        file.sync_all().await?;
        Ok(())
    }

    fn fingerprint(signer_key: &str) -> String {
        let digest = hex::encode(Sha256::digest(signer_key.as_bytes()));
        digest[..16].to_string()
    }
}

#[async_trait]
impl LedgerClient for LocalLedger {
    async fn register_document(
        &self,
        signer_key: &str,
        filename: &str,
        hash: &str,
        storage_key: &str,
        tag: &str,
    ) -> Result<LedgerReceipt> {
        if signer_key.trim().is_empty() {
            return Err(Error::ledger("Signer key is empty"));
        }

        let mut entries = self.entries.lock().await;

        let document = LedgerDocument {
            id: entries.len() as u64 + 1,
            filename: filename.to_string(),
            hash: hash.to_string(),
            storage_key: storage_key.to_string(),
            tag: tag.to_string(),
            timestamp: Utc::now(),
        };
        let signer = Self::fingerprint(signer_key);
        let prev_hash = entries
            .last()
            .map(|e| e.tx_hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());
        let tx_hash = JournalEntry::compute_hash(&document, &signer, &prev_hash);

        let entry = JournalEntry {
            document,
            signer,
            prev_hash,
            tx_hash,
        };

        let mut line = serde_json::to_string(&entry)?;
        line.push('\n');

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| Error::ledger(format!("Failed to open journal: {}", e)))?;
        let len_before = self.committed_len.load(Ordering::SeqCst);
        let on_disk = file
            .metadata()
            .await
            .map_err(|e| Error::ledger(format!("Failed to stat journal: {}", e)))?
            .len();
        if on_disk != len_before {
            // Left over from an append that was cancelled or failed
            tracing::warn!(
                "Trimming {} stray bytes from ledger journal",
                on_disk.abs_diff(len_before)
            );
            file.set_len(len_before)
                .await
                .map_err(|e| Error::ledger(format!("Failed to trim journal: {}", e)))?;
        }

        let appended = async {
            file.write_all(line.as_bytes()).await?;
            file.sync_data().await
        }
        .await;
        if let Err(e) = appended {
            // Cut the partial line so the journal still replays
            if let Err(trunc) = file.set_len(len_before).await {
                tracing::error!("Failed to roll back torn journal append: {}", trunc);
            }
            return Err(Error::ledger(format!("Failed to append to journal: {}", e)));
        }

        let tx_ref = format!("0x{}", entry.tx_hash);
        tracing::info!(
            "Registered {} on ledger as #{} ({})",
            entry.document.filename,
            entry.document.id,
            tx_ref
        );
        let receipt = LedgerReceipt {
            tx_ref,
            document_id: entry.document.id,
        };
        self.committed_len
            .store(len_before + line.len() as u64, Ordering::SeqCst);
        entries.push(entry);

        Ok(receipt)
    }

    async fn document_count(&self) -> Result<u64> {
        Ok(self.entries.lock().await.len() as u64)
    }

    async fn get_document(&self, id: u64) -> Result<LedgerDocument> {
        let entries = self.entries.lock().await;
        id.checked_sub(1)
            .and_then(|index| entries.get(index as usize))
            .map(|e| e.document.clone())
            .ok_or_else(|| Error::ledger(format!("Ledger document #{} not found", id)))
    }

    async fn verify_document(&self, id: u64, hash: &str) -> Result<bool> {
        let document = self.get_document(id).await?;
        Ok(document.hash.eq_ignore_ascii_case(hash))
    }

    fn name(&self) -> &str {
        "local-ledger"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_object_put_get() {
        let dir = tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().join("objects"), "http://h/objects", "s").unwrap();

        store
            .put("docs/1-report.pdf", b"%PDF-1.4", "application/pdf")
            .await
            .unwrap();
        assert_eq!(store.get("docs/1-report.pdf").await.unwrap(), b"%PDF-1.4");

        store.put("docs/1-report.pdf", b"v2", "application/pdf").await.unwrap();
        assert_eq!(store.get("docs/1-report.pdf").await.unwrap(), b"v2");
    }

    #[tokio::test]
    async fn test_object_rejects_escaping_keys() {
        let dir = tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().to_path_buf(), "http://h", "s").unwrap();

        for key in ["../etc/passwd", "/abs", "", "docs/../../x"] {
            assert!(matches!(
                store.put(key, b"x", "text/plain").await,
                Err(Error::Storage(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_object_missing_is_storage_error() {
        let dir = tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().to_path_buf(), "http://h", "s").unwrap();
        assert!(matches!(store.get("docs/none").await, Err(Error::Storage(_))));
    }

    #[tokio::test]
    async fn test_presigned_url_verifies() {
        let dir = tempdir().unwrap();
        let store = LocalObjectStore::new(dir.path().to_path_buf(), "http://h/objects/", "secret").unwrap();

        let url = store
            .presigned_url("docs/a.pdf", Duration::from_secs(60))
            .await
            .unwrap();
        assert!(url.starts_with("http://h/objects/docs/a.pdf?expires="));

        let query = url.split('?').nth(1).unwrap();
        let mut expires = 0;
        let mut signature = "";
        for pair in query.split('&') {
            let (name, value) = pair.split_once('=').unwrap();
            match name {
                "expires" => expires = value.parse().unwrap(),
                "signature" => signature = value,
                _ => {}
            }
        }

        assert!(store.verify_signature("docs/a.pdf", expires, signature));
        assert!(!store.verify_signature("docs/b.pdf", expires, signature));
        assert!(!store.verify_signature("docs/a.pdf", expires - 3600, signature));
    }

    #[tokio::test]
    async fn test_ledger_register_and_verify() {
        let dir = tempdir().unwrap();
        let ledger = LocalLedger::open(dir.path().join("ledger.jsonl")).await.unwrap();

        let first = ledger
            .register_document("key", "a.pdf", "abc123", "docs/1-a.pdf", "Legal")
            .await
            .unwrap();
        assert!(first.tx_ref.starts_with("0x"));
        assert_eq!(first.tx_ref.len(), 66);
        assert_eq!(first.document_id, 1);

        let second = ledger
            .register_document("key", "b.pdf", "def456", "docs/2-b.pdf", "General")
            .await
            .unwrap();
        assert_eq!(second.document_id, 2);

        assert_eq!(ledger.document_count().await.unwrap(), 2);
        assert_eq!(ledger.get_document(2).await.unwrap().filename, "b.pdf");
        assert!(matches!(ledger.get_document(0).await, Err(Error::Ledger(_))));
        assert!(ledger.verify_document(1, "ABC123").await.unwrap());
        assert!(!ledger.verify_document(1, "def456").await.unwrap());
        assert!(matches!(ledger.get_document(7).await, Err(Error::Ledger(_))));
    }

    #[tokio::test]
    async fn test_ledger_rejects_empty_signer() {
        let dir = tempdir().unwrap();
        let ledger = LocalLedger::open(dir.path().join("ledger.jsonl")).await.unwrap();

        let result = ledger.register_document("", "a.pdf", "h", "k", "t").await;
        assert!(matches!(result, Err(Error::Ledger(_))));
        assert_eq!(ledger.document_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ledger_replays_journal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");

        {
            let ledger = LocalLedger::open(path.clone()).await.unwrap();
            ledger.register_document("k", "a.pdf", "h1", "docs/a", "t").await.unwrap();
            ledger.register_document("k", "b.pdf", "h2", "docs/b", "t").await.unwrap();
        }

        let reopened = LocalLedger::open(path).await.unwrap();
        assert_eq!(reopened.document_count().await.unwrap(), 2);
        assert!(reopened.verify_document(2, "h2").await.unwrap());
    }

    #[tokio::test]
    async fn test_ledger_detects_tampering() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");

        {
            let ledger = LocalLedger::open(path.clone()).await.unwrap();
            ledger.register_document("k", "a.pdf", "h1", "docs/a", "t").await.unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, content.replace("\"h1\"", "\"forged\"")).unwrap();

        assert!(matches!(
            LocalLedger::open(path).await,
            Err(Error::CorruptStore { .. })
        ));
    }

    #[tokio::test]
    async fn test_ledger_drops_torn_trailing_entry() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");

        {
            let ledger = LocalLedger::open(path.clone()).await.unwrap();
            ledger.register_document("k", "a.pdf", "h1", "docs/a", "t").await.unwrap();
        }
        let mut content = std::fs::read_to_string(&path).unwrap();
        content.push_str("{\"id\":2,\"filena");
        std::fs::write(&path, &content).unwrap();

        let reopened = LocalLedger::open(path.clone()).await.unwrap();
        assert_eq!(reopened.document_count().await.unwrap(), 1);

        let receipt = reopened
            .register_document("k", "b.pdf", "h2", "docs/b", "t")
            .await
            .unwrap();
        assert_eq!(receipt.document_id, 2);
        drop(reopened);

        let again = LocalLedger::open(path).await.unwrap();
        assert_eq!(again.document_count().await.unwrap(), 2);
        assert!(again.verify_document(2, "h2").await.unwrap());
    }

    #[tokio::test]
    async fn test_ledger_rejects_garbage_before_the_end() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");

        {
            let ledger = LocalLedger::open(path.clone()).await.unwrap();
            ledger.register_document("k", "a.pdf", "h1", "docs/a", "t").await.unwrap();
        }
        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::write(&path, format!("not json\n{}", content)).unwrap();

        assert!(matches!(
            LocalLedger::open(path).await,
            Err(Error::CorruptStore { .. })
        ));
    }

    #[tokio::test]
    async fn test_ledger_trims_stray_bytes_before_appending() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let ledger = LocalLedger::open(path.clone()).await.unwrap();
        ledger.register_document("k", "a.pdf", "h1", "docs/a", "t").await.unwrap();

        // A cancelled append left half a line behind
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        std::io::Write::write_all(&mut file, b"{\"id\":2,").unwrap();
        drop(file);

        ledger.register_document("k", "b.pdf", "h2", "docs/b", "t").await.unwrap();
        drop(ledger);

        let reopened = LocalLedger::open(path).await.unwrap();
        assert_eq!(reopened.document_count().await.unwrap(), 2);
        assert!(reopened.verify_document(2, "h2").await.unwrap());
    }
}
