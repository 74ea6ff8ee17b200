use super::{Operation, Outcome};
use crate::archive::create_tar;
use crate::error::ItemError;
use crate::item::{WorkItem, WorkUnit};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, warn};

/// All catalogued items of one shard
#[derive(Debug, Clone)]
pub struct ShardBundle {
    pub shard_nr: u32,
    pub items: Vec<WorkItem>,
}

impl ShardBundle {
    /// Group items by `shard_nr`, ascending; items keep catalog order
    pub fn group(items: Vec<WorkItem>) -> Vec<ShardBundle> {
        let mut shards: BTreeMap<u32, Vec<WorkItem>> = BTreeMap::new();
        for item in items {
            shards.entry(item.shard_nr).or_default().push(item);
        }
        shards
            .into_iter()
            .map(|(shard_nr, items)| ShardBundle { shard_nr, items })
            .collect()
    }
}

impl WorkUnit for ShardBundle {
    fn unit_id(&self) -> u64 {
        u64::from(self.shard_nr)
    }

    fn group_key(&self) -> u64 {
        u64::from(self.shard_nr)
    }
}

/// Packs converted files into `<to>[/<split>]/<shard>.tar`
#[derive(Debug, Clone)]
pub struct Pack {
    opus_dir: PathBuf,
    archive_dir: PathBuf,
}

impl Pack {
    pub fn new(opus_dir: impl Into<PathBuf>, to: impl Into<PathBuf>, split: Option<&str>) -> Self {
        let to = to.into();
        let archive_dir = match split.filter(|s| !s.is_empty()) {
            Some(split) => to.join(split),
            None => to,
        };
        Self {
            opus_dir: opus_dir.into(),
            archive_dir,
        }
    }

    pub fn archive_path(&self, shard_nr: u32) -> PathBuf {
        self.archive_dir.join(format!("{shard_nr}.tar"))
    }
}

#[async_trait]
impl Operation<ShardBundle> for Pack {
    fn name(&self) -> &'static str {
        "pack"
    }

    async fn apply(&self, bundle: &ShardBundle) -> Result<Outcome, ItemError> {
        let target = self.archive_path(bundle.shard_nr);
        if target.is_file() {
            debug!(shard = bundle.shard_nr, "Shard archive exists, skipping");
            return Ok(Outcome::Skipped);
        }

        let members: Vec<(PathBuf, String)> = bundle
            .items
            .iter()
            .map(|item| (item.target_path(&self.opus_dir), item.target_file_name()))
            .collect();

        let missing: Vec<&PathBuf> = members
            .iter()
            .map(|(path, _)| path)
            .filter(|path| !path.is_file())
            .collect();
        if let Some(first) = missing.first() {
            warn!(shard = bundle.shard_nr, missing = missing.len(), "Shard is incomplete");
            return Err(ItemError::MissingSource((*first).clone()));
        }

        let size = tokio::task::spawn_blocking(move || create_tar(&members, &target)).await??;
        debug!(shard = bundle.shard_nr, members = bundle.items.len(), bytes = size, "Shard packed");
        Ok(Outcome::Completed)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::archive::extract_archive;
    use crate::item::tests::item;
    use tempfile::tempdir;

    fn shard_item(id: u64, shard_nr: u32) -> WorkItem {
        let mut track = item(id, 0);
        track.shard_nr = shard_nr;
        track
    }

    #[test]
    fn test_group_by_shard() {
        let bundles = ShardBundle::group(vec![
            shard_item(1, 2),
            shard_item(2, 0),
            shard_item(3, 2),
        ]);
        assert_eq!(bundles.len(), 2);
        assert_eq!(bundles[0].shard_nr, 0);
        assert_eq!(
            bundles[1].items.iter().map(|i| i.id).collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert_eq!(bundles[1].unit_id(), 2);
    }

    #[test]
    fn test_archive_path_with_split() {
        let pack = Pack::new("/opus", "/shards", Some("train"));
        assert_eq!(pack.archive_path(4), PathBuf::from("/shards/train/4.tar"));
        let pack = Pack::new("/opus", "/shards", None);
        assert_eq!(pack.archive_path(4), PathBuf::from("/shards/4.tar"));
    }

    #[tokio::test]
    async fn test_pack_is_idempotent() {
        let opus = tempdir().unwrap();
        let to = tempdir().unwrap();
        for id in [1, 2] {
            std::fs::write(opus.path().join(format!("{id}.opus")), format!("OggS{id}")).unwrap();
        }
        let bundle = ShardBundle {
            shard_nr: 0,
            items: vec![shard_item(1, 0), shard_item(2, 0)],
        };
        let pack = Pack::new(opus.path(), to.path(), Some("test"));

        assert_eq!(pack.apply(&bundle).await.unwrap(), Outcome::Completed);
        assert_eq!(pack.apply(&bundle).await.unwrap(), Outcome::Skipped);

        let restored = tempdir().unwrap();
        let report = extract_archive(&pack.archive_path(0), restored.path()).unwrap();
        assert_eq!(report.files, 2);
        assert_eq!(std::fs::read(restored.path().join("2.opus")).unwrap(), b"OggS2");
    }

    #[tokio::test]
    async fn test_incomplete_shard_is_not_packed() {
        let opus = tempdir().unwrap();
        let to = tempdir().unwrap();
        std::fs::write(opus.path().join("1.opus"), b"OggS").unwrap();
        let bundle = ShardBundle {
            shard_nr: 3,
            items: vec![shard_item(1, 3), shard_item(2, 3)],
        };
        let pack = Pack::new(opus.path(), to.path(), None);

        let result = pack.apply(&bundle).await;
        assert!(matches!(result, Err(ItemError::MissingSource(p)) if p.ends_with("2.opus")));
        assert!(!pack.archive_path(3).exists());
    }
}
