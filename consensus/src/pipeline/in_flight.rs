//! In-flight marker
//!
//! The hash of the block being applied is written to a small file before any
//! of its effects reach the database and removed once they all did. Finding
//! the file on startup means the previous run stopped mid-write.

use consensus_core::Hash;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::errors::{ChainError, ChainResult};

pub struct InFlightMarker {
    path: PathBuf,
}

impl InFlightMarker {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes to a temporary file and renames it so a torn write never leaves
    /// an unreadable marker.
    pub fn set(&self, hash: &Hash) -> ChainResult<()> {
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, hash.to_string())?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    pub fn clear(&self) -> ChainResult<()> {
        match fs::remove_file(&self.path) {
            Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }

    pub fn read(&self) -> ChainResult<Option<Hash>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        Hash::from_str(content.trim())
            .map(Some)
            .map_err(|_| ChainError::Fatal(format!("in-flight marker {} is corrupt", self.path.display())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_read_clear() {
        let dir = tempfile::tempdir().unwrap();
        let marker = InFlightMarker::new(dir.path().join("inflight.block"));
        assert_eq!(marker.read().unwrap(), None);
        let hash = Hash::from_u64_word(77);
        marker.set(&hash).unwrap();
        assert_eq!(marker.read().unwrap(), Some(hash));
        marker.clear().unwrap();
        marker.clear().unwrap();
        assert_eq!(marker.read().unwrap(), None);

        fs::write(marker.path(), "not a hash").unwrap();
        assert!(marker.read().unwrap_err().is_fatal());
    }
}
