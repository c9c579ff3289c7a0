//! Whole-document JSON stores
//!
//! Each persisted concern (run analytics, emoji archive, job queue)
//! lives in its own JSON document. Reads return the full document and
//! writes replace it wholesale; there is no partial-update primitive.
//! Callers follow a read, mutate-in-memory, write-back discipline, and
//! runs are sequenced so that no two writers touch a document at once.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::Result;
use crate::models::EmojiRecord;

/// Analytics document: run id -> run record
pub type AnalyticsDoc = BTreeMap<String, crate::analytics::RunRecord>;

/// Emoji document: emoji id -> record
pub type EmojiDoc = BTreeMap<String, EmojiRecord>;

/// A single JSON document on disk
pub struct JsonStore<T> {
    path: PathBuf,
    _doc: PhantomData<T>,
}

impl<T> JsonStore<T>
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

    /// Read the full document; a missing file reads as the empty
    /// document
    pub async fn read(&self) -> Result<T> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the document wholesale
    pub async fn write(&self, doc: &T) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(doc)?;
        tokio::fs::write(&self.path, json).await?;
        debug!("wrote {}", self.path.display());
        Ok(())
    }
}

impl<T> Clone for JsonStore<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            _doc: PhantomData,
        }
    }
}
