//! Snapshot: save/load the full session pair (vectors + metadata) to/from disk.

use crate::buffer::VectorBuffer;
use crate::error::{Result, SessionError};
use crate::metadata::MetadataRecord;
use crate::persistence::{commit, discard_temp, flat_file, remove_if_exists, serialization, stage};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const VECTORS_FILE: &str = "vectors.idx";
pub const METADATA_FILE: &str = "metadata.bin";

/// A session as read back from disk.
#[derive(Debug)]
pub struct LoadedSession {
    pub vectors: VectorBuffer,
    pub records: Vec<MetadataRecord>,
}

/// Manages the two co-located artifacts of a session directory.
#[derive(Debug, Clone)]
pub struct SessionFiles {
    dir: PathBuf,
}

impl SessionFiles {
    /// Point at a session directory. Nothing is created until the first save.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn vectors_path(&self) -> PathBuf {
        self.dir.join(VECTORS_FILE)
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    /// Rewrite both files from the given state.
    ///
    /// Both temp files are written and synced before either rename, so a
    /// failed write leaves the previous pair intact. A crash between the two
    /// renames is caught on load by the count check.
    pub fn save(&self, vectors: &VectorBuffer, records: &[MetadataRecord]) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| SessionError::persistence(&self.dir, e))?;

        let index_bytes = flat_file::encode(vectors)?;
        let meta_bytes = serialization::encode_frame(&records)?;

        let vectors_path = self.vectors_path();
        let metadata_path = self.metadata_path();

        let vectors_tmp = stage(&vectors_path, &index_bytes)?;
        let metadata_tmp = match stage(&metadata_path, &meta_bytes) {
            Ok(tmp) => tmp,
            Err(e) => {
                discard_temp(&vectors_tmp);
                return Err(e);
            }
        };

        if let Err(e) = commit(&metadata_tmp, &metadata_path) {
            discard_temp(&vectors_tmp);
            return Err(e);
        }
        commit(&vectors_tmp, &vectors_path)?;

        debug!(
            dir = %self.dir.display(),
            count = records.len(),
            bytes = index_bytes.len() + meta_bytes.len(),
            "session snapshot written"
        );
        Ok(())
    }

    /// Load the persisted pair, or `None` if the directory holds no session.
    pub fn load(&self) -> Result<Option<LoadedSession>> {
        let vectors_path = self.vectors_path();
        let metadata_path = self.metadata_path();

        match (vectors_path.exists(), metadata_path.exists()) {
            (false, false) => return Ok(None),
            (true, false) | (false, true) => {
                return Err(SessionError::CorruptState(format!(
                    "incomplete session in {}: expected both {} and {}",
                    self.dir.display(),
                    VECTORS_FILE,
                    METADATA_FILE
                )));
            }
            (true, true) => {}
        }

        let vectors = flat_file::read(&vectors_path)?;
        let meta_bytes =
            fs::read(&metadata_path).map_err(|e| SessionError::persistence(&metadata_path, e))?;
        let records: Vec<MetadataRecord> = serialization::decode_frame(&meta_bytes)?;

        if vectors.size() != records.len() {
            return Err(SessionError::CorruptState(format!(
                "{} vectors but {} metadata records",
                vectors.size(),
                records.len()
            )));
        }

        debug!(dir = %self.dir.display(), count = records.len(), "session snapshot loaded");
        Ok(Some(LoadedSession { vectors, records }))
    }

    /// Delete both files. Files that are already gone are not an error.
    ///
    /// Both deletions are attempted; the first failure is returned.
    pub fn delete(&self) -> Result<()> {
        let vectors = remove_if_exists(&self.vectors_path());
        let metadata = remove_if_exists(&self.metadata_path());
        vectors.and(metadata)
    }

    /// Check if any session artifact exists.
    pub fn exists(&self) -> bool {
        self.vectors_path().exists() || self.metadata_path().exists()
    }
}
