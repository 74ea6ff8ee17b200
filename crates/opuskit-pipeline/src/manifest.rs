//! Failure manifest
//!
//! Plain text, one failed unit id per line in ascending order. It doubles as
//! input for `--retry-from` on the next run.

use crate::error::{PipelineError, Result};
use opuskit_common::fs::atomic_write;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::info;

/// Write `ids` (sorted and deduplicated) to `path` atomically
///
/// An empty id list produces an empty file.
pub fn write_failure_manifest(path: &Path, ids: &[u64]) -> Result<()> {
    let ids: BTreeSet<u64> = ids.iter().copied().collect();
    let mut content = String::with_capacity(ids.len() * 8);
    for id in &ids {
        content.push_str(&id.to_string());
        content.push('\n');
    }
    atomic_write(path, content.as_bytes())?;
    info!(path = %path.display(), failed = ids.len(), "Failure manifest written");
    Ok(())
}

/// Read the ids listed in a failure manifest; blank lines are ignored
pub fn read_failure_manifest(path: &Path) -> Result<BTreeSet<u64>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        PipelineError::setup(format!("cannot read manifest '{}': {}", path.display(), e))
    })?;

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            line.trim().parse::<u64>().map_err(|_| {
                PipelineError::setup(format!(
                    "manifest '{}' line {}: '{}' is not a track id",
                    path.display(),
                    index + 1,
                    line.trim()
                ))
            })
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_manifest_lists_ids_ascending() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing-tasks.txt");
        write_failure_manifest(&path, &[7, 3, 7]).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "3\n7\n");
        assert_eq!(read_failure_manifest(&path).unwrap(), BTreeSet::from([3, 7]));
    }

    #[test]
    fn test_empty_manifest() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing-tasks.txt");
        write_failure_manifest(&path, &[]).unwrap();

        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
        assert!(read_failure_manifest(&path).unwrap().is_empty());
    }

    #[test]
    fn test_bad_line_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.txt");
        std::fs::write(&path, "3\n\nseven\n").unwrap();
        let err = read_failure_manifest(&path).unwrap_err();
        assert!(err.to_string().contains("line 3"));
    }
}
