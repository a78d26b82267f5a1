//! Persistence layer: flat index file, framed metadata, atomic replacement.

pub mod flat_file;
pub mod serialization;
pub mod snapshot;

pub use snapshot::{LoadedSession, SessionFiles, METADATA_FILE, VECTORS_FILE};

use crate::error::{Result, SessionError};
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Write `bytes` to a fsynced sibling temp file of `path` and return the
/// temp path. `path` itself is untouched until [`commit`].
pub fn stage(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
    let tmp = temp_path(path);

    let written = File::create(&tmp).and_then(|mut file| {
        file.write_all(bytes)?;
        file.sync_all()
    });
    if let Err(e) = written {
        discard_temp(&tmp);
        return Err(SessionError::persistence(&tmp, e));
    }
    Ok(tmp)
}

/// Move a staged temp file over `path`. A reader sees either the old file or
/// the new one, never a partial write.
pub fn commit(tmp: &Path, path: &Path) -> Result<()> {
    if let Err(e) = fs::rename(tmp, path) {
        discard_temp(tmp);
        return Err(SessionError::persistence(path, e));
    }
    Ok(())
}

/// Remove `path`, treating "already gone" as success.
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(SessionError::persistence(path, e)),
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

// Cleanup of a failed write: report, never propagate.
pub(crate) fn discard_temp(tmp: &Path) {
    if let Err(e) = remove_if_exists(tmp) {
        warn!(path = %tmp.display(), error = %e, "failed to remove temporary file");
    }
}
