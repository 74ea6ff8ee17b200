//! Staged file writes
//!
//! Every artifact is first written to a hidden temporary sibling of its final
//! path and renamed into place once complete. A crash leaves at most a stray
//! `.<name>.*.part` file, never a truncated file under the final name.

use crate::error::{CommonError, Result};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempPath;

/// Suffix used for staged (not yet committed) files
pub const STAGED_SUFFIX: &str = ".part";

/// A temporary file that becomes `target` on [`StagedFile::commit`].
///
/// Dropping an uncommitted `StagedFile` removes the temporary file.
#[derive(Debug)]
pub struct StagedFile {
    temp: TempPath,
    target: PathBuf,
}

impl StagedFile {
    /// Create an empty staged file next to `target`, creating parent directories
    pub fn new(target: impl Into<PathBuf>) -> Result<Self> {
        let target = target.into();
        let parent = parent_dir(&target)?;
        std::fs::create_dir_all(parent)?;

        let prefix = format!(
            ".{}.",
            target
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        );
        let temp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(STAGED_SUFFIX)
            .tempfile_in(parent)?
            .into_temp_path();

        Ok(Self { temp, target })
    }

    /// Path of the temporary file (pass this to external tools)
    pub fn path(&self) -> &Path {
        &self.temp
    }

    /// Atomically rename the staged file onto its target
    pub fn commit(self) -> Result<PathBuf> {
        let Self { temp, target } = self;
        temp.persist(&target).map_err(|e| CommonError::Persist {
            path: target.clone(),
            source: e.error,
        })?;
        Ok(target)
    }
}

/// Write `content` to `path` through a staged file
pub fn atomic_write(path: impl AsRef<Path>, content: &[u8]) -> Result<()> {
    let staged = StagedFile::new(path.as_ref())?;
    {
        let mut file = std::fs::OpenOptions::new().write(true).open(staged.path())?;
        file.write_all(content)?;
        file.sync_all()?;
    }
    staged.commit()?;
    Ok(())
}

/// Whether `path` is a regular file with at least one byte
pub fn is_nonempty_file(path: impl AsRef<Path>) -> bool {
    std::fs::metadata(path.as_ref())
        .map(|m| m.is_file() && m.len() > 0)
        .unwrap_or(false)
}

fn parent_dir(path: &Path) -> Result<&Path> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Ok(parent),
        Some(_) => Ok(Path::new(".")),
        None => Err(CommonError::NoParent(path.to_path_buf())),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_atomic_write() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("out.txt");
        atomic_write(&path, b"hello world").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"hello world");
    }

    #[test]
    fn test_atomic_write_replaces_existing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        atomic_write(&path, b"first").unwrap();
        atomic_write(&path, b"second").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"second");
    }

    #[test]
    fn test_uncommitted_staged_file_is_removed() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("42.opus");
        let staged_path = {
            let staged = StagedFile::new(&target).unwrap();
            std::fs::write(staged.path(), b"partial").unwrap();
            staged.path().to_path_buf()
        };
        assert!(!staged_path.exists());
        assert!(!target.exists());
    }

    #[test]
    fn test_staged_file_is_hidden_sibling() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("42.opus");
        let staged = StagedFile::new(&target).unwrap();
        let name = staged.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(".42.opus."));
        assert!(name.ends_with(STAGED_SUFFIX));
        assert_eq!(staged.path().parent(), target.parent());
    }

    #[test]
    fn test_is_nonempty_file() {
        let dir = tempdir().unwrap();
        let empty = dir.path().join("empty");
        let full = dir.path().join("full");
        std::fs::write(&empty, b"").unwrap();
        std::fs::write(&full, b"x").unwrap();

        assert!(!is_nonempty_file(&empty));
        assert!(is_nonempty_file(&full));
        assert!(!is_nonempty_file(dir.path()));
        assert!(!is_nonempty_file(dir.path().join("missing")));
    }
}
