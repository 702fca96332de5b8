//! File-backed reference store.
//!
//! Each region is one JSON document, `<dir>/<region>.json`, mapping keys to
//! their current [`PublishedReference`]. Writes go to a temporary file in the
//! same directory and are renamed over the document, so a reader sees either
//! the previous document or the new one, never a partial write. Writers take
//! an exclusive advisory lock on `<dir>/<region>.json.lock` for the whole
//! read-modify-write, so handles in separate processes never lose each
//! other's updates.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use edgestack_core::{AwsRegion, ReferenceKey};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::ReferenceError;
use crate::store::{Publish, PublishedReference, ReferenceStore};

#[derive(Debug, Default, Serialize, Deserialize)]
struct RegionDocument {
    references: BTreeMap<ReferenceKey, PublishedReference>,
}

/// Exclusive lock on one region's document, released on drop.
#[derive(Debug)]
struct DocumentLock(File);

impl DocumentLock {
    fn acquire(path: &Path) -> Result<Self, ReferenceError> {
        let io_err = |source| ReferenceError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(io_err)?;
        FileExt::lock_exclusive(&file).map_err(io_err)?;
        Ok(Self(file))
    }
}

impl Drop for DocumentLock {
    fn drop(&mut self) {
        // Closing the descriptor releases the lock as well.
        let _ = FileExt::unlock(&self.0);
    }
}

/// Durable store rooted at a directory, shared by independent deployment runs.
#[derive(Debug)]
pub struct FileReferenceStore {
    dir: PathBuf,
}

impl FileReferenceStore {
    /// Open (and create if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::Io`] if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ReferenceError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| ReferenceError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Root directory of the store.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document holding `region`'s references.
    ///
    /// # Errors
    ///
    /// Returns [`ReferenceError::InvalidRegion`] if the region name is not a
    /// plain lowercase identifier, which keeps it from escaping the directory.
    pub fn document_path(&self, region: &AwsRegion) -> Result<PathBuf, ReferenceError> {
        let name = region.as_str();
        let valid = !name.is_empty()
            && name
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
        if !valid {
            return Err(ReferenceError::InvalidRegion(name.to_owned()));
        }
        Ok(self.dir.join(format!("{name}.json")))
    }

    fn load(&self, path: &Path) -> Result<RegionDocument, ReferenceError> {
        match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|source| ReferenceError::Corrupt {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(RegionDocument::default()),
            Err(source) => Err(ReferenceError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    fn commit(&self, path: &Path, document: &RegionDocument) -> Result<(), ReferenceError> {
        let io_err = |source| ReferenceError::Io {
            path: path.to_path_buf(),
            source,
        };
        let bytes = serde_json::to_vec_pretty(document).map_err(|source| ReferenceError::Corrupt {
            path: path.to_path_buf(),
            source,
        })?;

        let mut temp = NamedTempFile::new_in(&self.dir).map_err(io_err)?;
        temp.write_all(&bytes).map_err(io_err)?;
        temp.as_file().sync_all().map_err(io_err)?;
        temp.persist(path).map_err(|e| io_err(e.error))?;
        Ok(())
    }
}

impl ReferenceStore for FileReferenceStore {
    fn put(
        &self,
        region: &AwsRegion,
        key: &ReferenceKey,
        value: &str,
    ) -> Result<PublishedReference, ReferenceError> {
        let path = self.document_path(region)?;
        let _lock = DocumentLock::acquire(&path.with_extension("json.lock"))?;

        let mut document = self.load(&path)?;
        match PublishedReference::publish(document.references.get(key), region, key, value) {
            Publish::Unchanged(existing) => Ok(existing),
            Publish::Written(record) => {
                document.references.insert(key.clone(), record.clone());
                self.commit(&path, &document)?;
                tracing::debug!(
                    %region,
                    %key,
                    version = record.version,
                    path = %path.display(),
                    "committed reference"
                );
                Ok(record)
            }
        }
    }

    fn get(
        &self,
        region: &AwsRegion,
        key: &ReferenceKey,
    ) -> Result<PublishedReference, ReferenceError> {
        let path = self.document_path(region)?;
        self.load(&path)?
            .references
            .remove(key)
            .ok_or_else(|| ReferenceError::NotFound {
                region: region.clone(),
                key: key.clone(),
            })
    }
}
