use super::{Operation, Outcome};
use crate::archive::{extract_archive, ExtractionReport};
use crate::error::ItemError;
use crate::fetcher::BlobFetcher;
use crate::item::WorkItem;
use async_trait::async_trait;
use opuskit_common::fs::{atomic_write, StagedFile};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Directory under the input root holding one completion marker per blob
pub const FETCH_MARKER_DIR: &str = ".fetched";

/// Downloads and unpacks the blob holding an item's source file
///
/// A blob is fetched at most once: after every member has been extracted a
/// marker `<input>/.fetched/<blob_id>` is written. An item whose file is
/// absent although its blob is marked complete fails with `MissingSource`
/// instead of downloading again.
pub struct Fetch {
    input_dir: PathBuf,
    fetcher: Arc<dyn BlobFetcher>,
}

impl Fetch {
    pub fn new(input_dir: impl Into<PathBuf>, fetcher: Arc<dyn BlobFetcher>) -> Self {
        Self {
            input_dir: input_dir.into(),
            fetcher,
        }
    }

    pub fn marker_path(&self, blob_id: &str) -> PathBuf {
        self.input_dir.join(FETCH_MARKER_DIR).join(blob_id)
    }

    /// Download `blob_id`, extract it into the input directory and mark it complete
    pub async fn fetch_blob(&self, blob_id: &str) -> Result<ExtractionReport, ItemError> {
        if !is_safe_blob_id(blob_id) {
            return Err(ItemError::download(blob_id, "blob id is not a plain name"));
        }

        let download = StagedFile::new(self.input_dir.join(format!("{blob_id}.blob")))?;
        let bytes = self.fetcher.fetch(blob_id, download.path()).await?;
        info!(blob_id, bytes, fetcher = self.fetcher.name(), "Blob downloaded");

        let archive = download.path().to_path_buf();
        let destination = self.input_dir.clone();
        let report =
            tokio::task::spawn_blocking(move || extract_archive(&archive, &destination)).await??;
        drop(download);

        atomic_write(
            self.marker_path(blob_id),
            format!("{} files, {} bytes\n", report.files, report.bytes).as_bytes(),
        )?;
        info!(blob_id, files = report.files, "Blob extracted");
        Ok(report)
    }
}

fn is_safe_blob_id(blob_id: &str) -> bool {
    !blob_id.is_empty()
        && blob_id != "."
        && blob_id != ".."
        && blob_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

#[async_trait]
impl Operation<WorkItem> for Fetch {
    fn name(&self) -> &'static str {
        "fetch"
    }

    async fn apply(&self, item: &WorkItem) -> Result<Outcome, ItemError> {
        let source = item.source_path(&self.input_dir);
        if source.is_file() {
            debug!(item_id = item.id, "Source present, skipping download");
            return Ok(Outcome::Skipped);
        }

        if self.marker_path(&item.blob_id).exists() {
            return Err(ItemError::MissingSource(source));
        }

        self.fetch_blob(&item.blob_id).await?;

        if source.is_file() {
            Ok(Outcome::Completed)
        } else {
            Err(ItemError::MissingSource(source))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod tests {
    use super::*;
    use crate::archive::tests::tar_bytes;
    use crate::item::tests::item;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    /// Serves a fixed payload for every blob and counts calls
    pub(crate) struct StaticFetcher {
        pub payload: Vec<u8>,
        pub calls: AtomicUsize,
    }

    impl StaticFetcher {
        pub(crate) fn new(payload: Vec<u8>) -> Arc<Self> {
            Arc::new(Self {
                payload,
                calls: AtomicUsize::new(0),
            })
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BlobFetcher for StaticFetcher {
        fn name(&self) -> &'static str {
            "static"
        }

        async fn fetch(&self, _blob_id: &str, destination: &Path) -> Result<u64, ItemError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::fs::write(destination, &self.payload)
                .await
                .map_err(|e| ItemError::io(destination, e))?;
            Ok(self.payload.len() as u64)
        }
    }

    #[tokio::test]
    async fn test_fetch_is_idempotent() {
        let input = tempdir().unwrap();
        let fetcher = StaticFetcher::new(tar_bytes(&[("00/1.mp3", "one"), ("00/2.mp3", "two")]));
        let op = Fetch::new(input.path(), fetcher.clone());
        let first = item(1, 0);
        let second = item(2, 0);

        assert_eq!(op.apply(&first).await.unwrap(), Outcome::Completed);
        assert_eq!(op.apply(&first).await.unwrap(), Outcome::Skipped);
        // sibling already extracted from the same blob
        assert_eq!(op.apply(&second).await.unwrap(), Outcome::Skipped);

        assert_eq!(fetcher.calls(), 1);
        assert!(op.marker_path("blob-0").is_file());
        assert_eq!(std::fs::read(input.path().join("00/2.mp3")).unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_marked_blob_without_file_is_missing_source() {
        let input = tempdir().unwrap();
        let fetcher = StaticFetcher::new(tar_bytes(&[("00/1.mp3", "one")]));
        let op = Fetch::new(input.path(), fetcher.clone());

        let result = op.apply(&item(5, 0)).await;
        assert!(matches!(result, Err(ItemError::MissingSource(_))));

        let again = op.apply(&item(5, 0)).await;
        assert!(matches!(again, Err(ItemError::MissingSource(_))));
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_blob_leaves_no_marker() {
        let input = tempdir().unwrap();
        let fetcher = StaticFetcher::new(vec![0xAB; 1024]);
        let op = Fetch::new(input.path(), fetcher.clone());

        let result = op.apply(&item(1, 0)).await;
        assert!(matches!(result, Err(ItemError::ArchiveFailure { .. })));
        assert!(!op.marker_path("blob-0").exists());

        // the staged download is gone as well
        let leftovers: Vec<_> = std::fs::read_dir(input.path()).unwrap().collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_truncated_blob_is_refetched_on_rerun() {
        let input = tempdir().unwrap();
        let big = "x".repeat(4000);
        let full = tar_bytes(&[("00/1.mp3", "one"), ("00/2.mp3", &big)]);
        // cut 1000 bytes into the data of 00/2.mp3
        let fetcher = StaticFetcher::new(full[..3 * 512 + 1000].to_vec());
        let op = Fetch::new(input.path(), fetcher.clone());

        let result = op.apply(&item(2, 0)).await;
        assert!(matches!(result, Err(ItemError::ArchiveFailure { .. })));
        assert!(!input.path().join("00/2.mp3").exists());
        assert!(!op.marker_path("blob-0").exists());

        let rerun = op.apply(&item(2, 0)).await;
        assert!(matches!(rerun, Err(ItemError::ArchiveFailure { .. })));
        assert_eq!(fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_unsafe_blob_id_rejected() {
        let input = tempdir().unwrap();
        let fetcher = StaticFetcher::new(Vec::new());
        let op = Fetch::new(input.path(), fetcher.clone());

        let mut track = item(1, 0);
        track.blob_id = "../escape".to_string();
        let result = op.apply(&track).await;

        assert!(matches!(result, Err(ItemError::DownloadFailure { .. })));
        assert_eq!(fetcher.calls(), 0);
    }
}
