use super::{Operation, Outcome};
use crate::error::ItemError;
use crate::item::WorkItem;
use async_trait::async_trait;
use opuskit_common::checksum::verify_sha256;
use opuskit_common::CommonError;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Checks that each source file exists and matches its catalogued SHA-256
#[derive(Debug, Clone)]
pub struct Verify {
    input_dir: PathBuf,
}

impl Verify {
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
        }
    }
}

/// Verify one file; without an expected digest only existence is checked
pub fn verify_file(path: &Path, expected: Option<&str>) -> Result<Outcome, ItemError> {
    if !path.is_file() {
        return Err(ItemError::MissingArtifact(path.to_path_buf()));
    }

    let Some(expected) = expected.filter(|e| !e.is_empty()) else {
        debug!(path = %path.display(), "No checksum catalogued, existence only");
        return Ok(Outcome::Completed);
    };

    match verify_sha256(path, expected) {
        Ok(()) => Ok(Outcome::Completed),
        Err(CommonError::ChecksumMismatch {
            path,
            expected,
            actual,
        }) => Err(ItemError::IntegrityMismatch {
            path,
            expected,
            actual,
        }),
        Err(other) => Err(other.into()),
    }
}

#[async_trait]
impl Operation<WorkItem> for Verify {
    fn name(&self) -> &'static str {
        "verify"
    }

    async fn apply(&self, item: &WorkItem) -> Result<Outcome, ItemError> {
        let path = item.source_path(&self.input_dir);
        let expected = item.sha256.clone();
        tokio::task::spawn_blocking(move || verify_file(&path, expected.as_deref())).await?
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::item::tests::item;
    use opuskit_common::checksum::sha256_hex;
    use tempfile::tempdir;

    fn with_source(dir: &Path, id: u64, content: &[u8]) -> WorkItem {
        let mut track = item(id, 2);
        let path = track.source_path(dir);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();
        track.sha256 = Some(sha256_hex(content));
        track
    }

    #[tokio::test]
    async fn test_matching_checksum_is_idempotent() {
        let dir = tempdir().unwrap();
        let track = with_source(dir.path(), 1, b"mp3 bytes");
        let verify = Verify::new(dir.path());

        assert_eq!(verify.apply(&track).await.unwrap(), Outcome::Completed);
        assert_eq!(verify.apply(&track).await.unwrap(), Outcome::Completed);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let dir = tempdir().unwrap();
        let track = item(2, 0);
        let result = Verify::new(dir.path()).apply(&track).await;
        assert!(matches!(result, Err(ItemError::MissingArtifact(p)) if p.ends_with("00/2.mp3")));
    }

    #[tokio::test]
    async fn test_mismatch() {
        let dir = tempdir().unwrap();
        let mut track = with_source(dir.path(), 3, b"mp3 bytes");
        track.sha256 = Some(sha256_hex(b"other bytes"));

        let result = Verify::new(dir.path()).apply(&track).await;
        match result {
            Err(ItemError::IntegrityMismatch { expected, actual, .. }) => {
                assert_eq!(expected, sha256_hex(b"other bytes"));
                assert_eq!(actual, sha256_hex(b"mp3 bytes"));
            }
            other => panic!("expected IntegrityMismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_no_checksum_means_existence_only() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.mp3");
        std::fs::write(&path, b"anything").unwrap();
        assert_eq!(verify_file(&path, None).unwrap(), Outcome::Completed);
        assert_eq!(verify_file(&path, Some("")).unwrap(), Outcome::Completed);
    }
}
