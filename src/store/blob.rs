//! Single-document JSON persistence.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::error::Result;

/// One JSON document on disk, read whole and replaced whole.
///
/// Replacement writes a sibling temp file and renames it over the target, so a
/// reader never sees a half-written document.
#[derive(Debug, Clone)]
pub struct JsonBlobStore<T> {
    path: PathBuf,
    _doc: PhantomData<fn() -> T>,
}

impl<T> JsonBlobStore<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _doc: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current document, or `T::default()` when none has been written.
    pub async fn read(&self) -> Result<T> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn replace(&self, doc: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let bytes = serde_json::to_vec_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, &bytes).await?;
        fs::rename(&tmp, &self.path).await?;

        debug!("Wrote {} bytes to {}", bytes.len(), self.path.display());
        Ok(())
    }

    /// Delete the document. Missing documents are not an error.
    pub async fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Doc {
        items: Vec<String>,
    }

    #[tokio::test]
    async fn test_missing_document_reads_default() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonBlobStore<Doc> = JsonBlobStore::new(dir.path().join("doc.json"));
        assert_eq!(store.read().await.unwrap(), Doc::default());
    }

    #[tokio::test]
    async fn test_replace_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonBlobStore<Doc> = JsonBlobStore::new(dir.path().join("nested/doc.json"));

        let doc = Doc {
            items: vec!["a".into(), "b".into()],
        };
        store.replace(&doc).await.unwrap();
        assert_eq!(store.read().await.unwrap(), doc);
        assert!(!store.path().with_extension("json.tmp").exists());

        store.remove().await.unwrap();
        assert!(!store.path().exists());
        store.remove().await.unwrap();
    }

    #[tokio::test]
    async fn test_corrupt_document_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.json");
        std::fs::write(&path, b"{not json").unwrap();

        let store: JsonBlobStore<Doc> = JsonBlobStore::new(path);
        assert!(matches!(store.read().await, Err(crate::Error::Json(_))));
    }
}
