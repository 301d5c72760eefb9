use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot directory missing or not writable: {0}")]
    Dir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Deterministic snapshot name: `{kind}--{short_hash(url)}.html`.
pub fn snapshot_filename(kind: &str, url: &str) -> String {
    let kind: String = kind
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let kind = if kind.is_empty() { "page".to_string() } else { kind };
    format!("{kind}--{}.html", short_hash(url))
}

fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}

fn ensure_dir(dir: &Path) -> Result<(), SnapshotError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| SnapshotError::Dir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(SnapshotError::Dir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| SnapshotError::Dir(e.to_string()))?;
    }
    Ok(())
}

/// Writes pages that failed to parse to disk for later inspection.
///
/// Files are written to a temp file in the same directory and renamed into
/// place, so a reader never sees a partial snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn write(&self, kind: &str, url: &str, document: &str) -> Result<PathBuf, SnapshotError> {
        ensure_dir(&self.dir)?;

        let target = self.dir.join(snapshot_filename(kind, url));
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(document.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        if target.exists() {
            fs::remove_file(&target)?;
        }
        tmp.persist(&target).map_err(|e| SnapshotError::Io(e.error))?;
        Ok(target)
    }
}
