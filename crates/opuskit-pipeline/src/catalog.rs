//! Track catalog loading
//!
//! The catalog is a static table of [`WorkItem`]s in CSV (header row), JSON
//! Lines, or a single JSON array. The format is picked from the file
//! extension.

use crate::error::{PipelineError, Result};
use crate::item::WorkItem;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// On-disk catalog encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogFormat {
    Csv,
    JsonLines,
    Json,
}

impl CatalogFormat {
    /// Detect the format from a file extension
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "jsonl" | "ndjson" => Some(Self::JsonLines),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Handle to a catalog file
#[derive(Debug, Clone)]
pub struct Catalog {
    path: PathBuf,
    format: CatalogFormat,
}

impl Catalog {
    /// Open a catalog, detecting its format from the extension
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let format = CatalogFormat::from_path(&path).ok_or_else(|| {
            PipelineError::catalog_load(
                &path,
                "unsupported file extension (expected .csv, .jsonl, .ndjson or .json)",
            )
        })?;
        Ok(Self { path, format })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every record, in file order
    pub fn load(&self) -> Result<Vec<WorkItem>> {
        if !self.path.is_file() {
            return Err(PipelineError::catalog_load(&self.path, "file not found"));
        }

        let items = match self.format {
            CatalogFormat::Csv => self.read_csv()?,
            CatalogFormat::JsonLines => self.read_json_lines()?,
            CatalogFormat::Json => self.read_json()?,
        };

        let mut seen = HashSet::with_capacity(items.len());
        for item in &items {
            if item.has_unsafe_path() {
                return Err(PipelineError::catalog_load(
                    &self.path,
                    format!(
                        "track {}: path '{}' leaves the input directory",
                        item.id,
                        item.path.as_deref().unwrap_or_default()
                    ),
                ));
            }
            if !seen.insert(item.id) {
                return Err(PipelineError::catalog_load(
                    &self.path,
                    format!("duplicate track id {}", item.id),
                ));
            }
        }

        info!(path = %self.path.display(), tracks = items.len(), "Catalog loaded");
        Ok(items)
    }

    /// Load and keep only records matching `predicate`
    pub fn load_filtered<F>(&self, predicate: F) -> Result<Vec<WorkItem>>
    where
        F: Fn(&WorkItem) -> bool,
    {
        let items = self.load()?;
        let total = items.len();
        let kept = apply_filter(items, predicate);
        debug!(total, kept = kept.len(), "Catalog filtered");
        Ok(kept)
    }

    fn read_csv(&self) -> Result<Vec<WorkItem>> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.path)
            .map_err(|e| PipelineError::catalog_load(&self.path, e.to_string()))?;

        reader
            .deserialize::<WorkItem>()
            .map(|record| record.map_err(|e| PipelineError::catalog_load(&self.path, e.to_string())))
            .collect()
    }

    fn open_file(&self) -> Result<BufReader<File>> {
        File::open(&self.path)
            .map(BufReader::new)
            .map_err(|e| PipelineError::catalog_load(&self.path, e.to_string()))
    }

    fn read_json_lines(&self) -> Result<Vec<WorkItem>> {
        let mut items = Vec::new();
        for (index, line) in self.open_file()?.lines().enumerate() {
            let line = line.map_err(|e| {
                PipelineError::catalog_load(&self.path, format!("line {}: {}", index + 1, e))
            })?;
            if line.trim().is_empty() {
                continue;
            }
            let item = serde_json::from_str(&line).map_err(|e| {
                PipelineError::catalog_load(&self.path, format!("line {}: {}", index + 1, e))
            })?;
            items.push(item);
        }
        Ok(items)
    }

    fn read_json(&self) -> Result<Vec<WorkItem>> {
        serde_json::from_reader(self.open_file()?)
            .map_err(|e| PipelineError::catalog_load(&self.path, e.to_string()))
    }
}

/// Keep the items matching `predicate`, preserving their order
pub fn apply_filter<F>(items: Vec<WorkItem>, predicate: F) -> Vec<WorkItem>
where
    F: Fn(&WorkItem) -> bool,
{
    items.into_iter().filter(|item| predicate(item)).collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const CSV: &str = "\
id,artist_id,album_id,durationInSec,genres,instruments,moods,main_genre,main_instrument,main_mood,gdrive_nr,gdrive_id,gdrive_size_in_gb,chunk_nr,mp3_sha256
10,1,100,200.5,rock;pop,guitar,happy,rock,guitar,happy,0,blobA,1.5,0,aa
11,1,100,180.0,jazz,,,jazz,,,1,blobB,1.5,0,
12,2,101,95.25,rock,piano;voice,sad,rock,piano,sad,0,blobA,1.5,1,cc
";

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(CatalogFormat::from_path(Path::new("t.CSV")), Some(CatalogFormat::Csv));
        assert_eq!(
            CatalogFormat::from_path(Path::new("t.ndjson")),
            Some(CatalogFormat::JsonLines)
        );
        assert_eq!(CatalogFormat::from_path(Path::new("t.parquet")), None);
        assert!(Catalog::open("tracks.parquet").is_err());
    }

    #[test]
    fn test_load_csv() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "tracks.csv", CSV);
        let items = Catalog::open(&path).unwrap().load().unwrap();

        assert_eq!(items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![10, 11, 12]);
        assert!(items[0].genres.contains("pop"));
        assert_eq!(items[1].sha256, None);
        assert!(items[1].instruments.is_empty());
        assert_eq!(items[2].instruments.len(), 2);
        assert_eq!(items[2].shard_nr, 1);
        assert_eq!(items[1].archive_nr, 1);
    }

    #[test]
    fn test_load_json_lines_skips_blank_lines() {
        let dir = tempdir().unwrap();
        let content = "\
{\"id\": 1, \"archive_nr\": 0, \"blob_id\": \"x\", \"genres\": [\"rock\"]}

{\"id\": 2, \"archive_nr\": 1, \"blob_id\": \"y\", \"path\": \"custom/2.mp3\"}
";
        let path = write(dir.path(), "tracks.jsonl", content);
        let items = Catalog::open(&path).unwrap().load().unwrap();

        assert_eq!(items.len(), 2);
        assert_eq!(items[1].path.as_deref(), Some("custom/2.mp3"));
    }

    #[test]
    fn test_load_json_array() {
        let dir = tempdir().unwrap();
        let content = r#"[{"id": 5, "gdrive_nr": 3, "gdrive_id": "z"}]"#;
        let path = write(dir.path(), "tracks.json", content);
        let items = Catalog::open(&path).unwrap().load().unwrap();
        assert_eq!(items[0].archive_nr, 3);
    }

    #[test]
    fn test_missing_catalog() {
        let dir = tempdir().unwrap();
        let result = Catalog::open(dir.path().join("nope.csv")).unwrap().load();
        assert!(matches!(result, Err(PipelineError::CatalogLoad { .. })));
    }

    #[test]
    fn test_malformed_json_line_reports_line() {
        let dir = tempdir().unwrap();
        let path = write(
            dir.path(),
            "tracks.jsonl",
            "{\"id\": 1, \"archive_nr\": 0, \"blob_id\": \"x\"}\n{not json}\n",
        );
        let err = Catalog::open(&path).unwrap().load().unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_invalid_utf8_is_catalog_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tracks.jsonl");
        let mut bytes = b"{\"id\": 1, \"archive_nr\": 0, \"blob_id\": \"x\"}\n".to_vec();
        bytes.extend_from_slice(b"{\"id\": 2, \"archive_nr\": 0, \"blob_id\": \"");
        bytes.push(0xff);
        bytes.extend_from_slice(b"\"}\n");
        std::fs::write(&path, bytes).unwrap();

        let err = Catalog::open(&path).unwrap().load().unwrap_err();
        assert!(matches!(err, PipelineError::CatalogLoad { .. }));
        assert!(err.to_string().contains("line 2"));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_catalog_is_catalog_error() {
        let dir = tempdir().unwrap();
        // a directory named like a catalog passes the extension check but cannot be parsed
        let path = dir.path().join("tracks.json");
        std::fs::create_dir(&path).unwrap();
        let catalog = Catalog::open(&path).unwrap();
        assert!(matches!(catalog.read_json(), Err(PipelineError::CatalogLoad { .. })));
    }

    #[test]
    fn test_escaping_track_path_rejected() {
        let dir = tempdir().unwrap();
        for bad in ["../outside/1.mp3", "/etc/passwd"] {
            let path = write(
                dir.path(),
                "tracks.jsonl",
                &format!("{{\"id\": 1, \"archive_nr\": 0, \"blob_id\": \"x\", \"path\": \"{bad}\"}}\n"),
            );
            let err = Catalog::open(&path).unwrap().load().unwrap_err();
            assert!(matches!(err, PipelineError::CatalogLoad { .. }));
            assert!(err.to_string().contains("leaves the input directory"));
        }
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let dir = tempdir().unwrap();
        let path = write(
            dir.path(),
            "tracks.jsonl",
            "{\"id\": 1, \"archive_nr\": 0, \"blob_id\": \"x\"}\n{\"id\": 1, \"archive_nr\": 2, \"blob_id\": \"y\"}\n",
        );
        let err = Catalog::open(&path).unwrap().load().unwrap_err();
        assert!(err.to_string().contains("duplicate track id 1"));
    }

    #[test]
    fn test_load_filtered_preserves_order() {
        let dir = tempdir().unwrap();
        let path = write(dir.path(), "tracks.csv", CSV);
        let items = Catalog::open(&path)
            .unwrap()
            .load_filtered(|item| item.main_genre == "rock")
            .unwrap();
        assert_eq!(items.iter().map(|i| i.id).collect::<Vec<_>>(), vec![10, 12]);
    }
}
