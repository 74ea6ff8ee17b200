//! Track records and the work unit abstraction

use crate::archive::sanitize_member_path;
use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

/// Anything the executor can schedule.
///
/// `unit_id` identifies the unit in results and the failure manifest;
/// `group_key` decides which partition it lands in.
pub trait WorkUnit: Send + Sync + 'static {
    fn unit_id(&self) -> u64;
    fn group_key(&self) -> u64;
}

/// One track of the dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkItem {
    pub id: u64,
    #[serde(default)]
    pub artist_id: u64,
    #[serde(default)]
    pub album_id: u64,
    #[serde(alias = "durationInSec", default)]
    pub duration_in_sec: f64,
    #[serde(default)]
    pub genres: TagSet,
    #[serde(default)]
    pub instruments: TagSet,
    #[serde(default)]
    pub moods: TagSet,
    #[serde(default)]
    pub main_genre: String,
    #[serde(default)]
    pub main_instrument: String,
    #[serde(default)]
    pub main_mood: String,
    /// Remote archive number; the grouping field for partitioning
    #[serde(alias = "gdrive_nr")]
    pub archive_nr: u32,
    #[serde(alias = "gdrive_id")]
    pub blob_id: String,
    #[serde(alias = "gdrive_size_in_gb", default)]
    pub blob_size_gb: f64,
    #[serde(alias = "chunk_nr", default)]
    pub shard_nr: u32,
    /// Lower-case hex SHA-256 of the source file
    #[serde(alias = "mp3_sha256", default)]
    pub sha256: Option<String>,
    /// Source path relative to the input directory
    #[serde(default)]
    pub path: Option<String>,
}

impl WorkItem {
    /// Catalogued path, normalized; `None` when absent or when it would leave the input directory
    pub fn catalogued_path(&self) -> Option<PathBuf> {
        self.path
            .as_deref()
            .filter(|p| !p.is_empty())
            .and_then(|p| sanitize_member_path(Path::new(p)))
    }

    /// Whether a catalogued path is absolute or climbs out with `..`
    pub fn has_unsafe_path(&self) -> bool {
        self.path.as_deref().is_some_and(|p| !p.is_empty()) && self.catalogued_path().is_none()
    }

    /// Source path relative to the input directory (`NN/<id>.mp3` unless catalogued)
    pub fn source_relative_path(&self) -> PathBuf {
        self.catalogued_path().unwrap_or_else(|| {
            PathBuf::from(format!("{:02}", self.archive_nr)).join(format!("{}.mp3", self.id))
        })
    }

    pub fn source_path(&self, input_dir: &Path) -> PathBuf {
        input_dir.join(self.source_relative_path())
    }

    /// File name of the converted artifact
    pub fn target_file_name(&self) -> String {
        format!("{}.opus", self.id)
    }

    pub fn target_path(&self, output_dir: &Path) -> PathBuf {
        output_dir.join(self.target_file_name())
    }
}

impl WorkUnit for WorkItem {
    fn unit_id(&self) -> u64 {
        self.id
    }

    fn group_key(&self) -> u64 {
        u64::from(self.archive_nr)
    }
}

/// Unordered set of tags (genres, instruments, moods)
///
/// Deserializes from a JSON array or from a single string joined with `;`
/// (commas are accepted too), which is how tags travel through CSV.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet(BTreeSet<String>);

impl TagSet {
    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    fn from_joined(raw: &str) -> Self {
        raw.split([';', ','])
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl FromIterator<String> for TagSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for TagSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(str::to_string).collect())
    }
}

impl Serialize for TagSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

impl<'de> Deserialize<'de> for TagSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(TagSetVisitor)
    }
}

struct TagSetVisitor;

impl<'de> Visitor<'de> for TagSetVisitor {
    type Value = TagSet;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a list of tags or a ';'-separated string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<TagSet, E> {
        Ok(TagSet::from_joined(v))
    }

    fn visit_unit<E: de::Error>(self) -> Result<TagSet, E> {
        Ok(TagSet::default())
    }

    fn visit_none<E: de::Error>(self) -> Result<TagSet, E> {
        Ok(TagSet::default())
    }

    // CSV infers numeric-looking fields
    fn visit_u64<E: de::Error>(self, v: u64) -> Result<TagSet, E> {
        Ok(TagSet::from_joined(&v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<TagSet, E> {
        Ok(TagSet::from_joined(&v.to_string()))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<TagSet, E> {
        Ok(TagSet::from_joined(&v.to_string()))
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<TagSet, E> {
        Ok(TagSet::from_joined(&v.to_string()))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<TagSet, A::Error> {
        let mut tags = BTreeSet::new();
        while let Some(tag) = seq.next_element::<String>()? {
            let tag = tag.trim();
            if !tag.is_empty() {
                tags.insert(tag.to_string());
            }
        }
        Ok(TagSet(tags))
    }
}
