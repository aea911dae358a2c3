//! Cache of extracted document text, one file per document id

use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};

/// Directory-backed store of extracted plain text
///
/// Entries never expire; they are removed only together with their document.
/// Saves are written to a temporary file and renamed into place, so a reader
/// racing a save sees either the old or the new text in full.
pub struct TextCache {
    dir: PathBuf,
}

impl TextCache {
    /// Open (and create if needed) the cache directory
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, id: &str) -> Result<PathBuf> {
        let safe = !id.is_empty()
            && id != "."
            && id != ".."
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if !safe {
            return Err(Error::InvalidDocumentId(id.to_string()));
        }
        Ok(self.dir.join(format!("{}.txt", id)))
    }

    /// Store `text` for `id`, replacing any previous entry
    pub async fn save(&self, id: &str, text: &str) -> Result<()> {
        let path = self.entry_path(id)?;
        let tmp_path = self.dir.join(format!(".{}.{}.tmp", id, uuid::Uuid::new_v4()));

        let write = async {
            let mut file = tokio::fs::File::create(&tmp_path).await?;
            file.write_all(text.as_bytes()).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&tmp_path, &path).await
        };

        if let Err(e) = write.await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e.into());
        }

        tracing::debug!("Cached {} chars of text for document {}", text.len(), id);
        Ok(())
    }

    /// Cached text for `id`, or [`Error::CacheMiss`]
    pub async fn get(&self, id: &str) -> Result<String> {
        let path = self.entry_path(id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::CacheMiss(id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove the entry for `id`; absent entries are a no-op
    pub async fn delete(&self, id: &str) -> Result<()> {
        let path = self.entry_path(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
