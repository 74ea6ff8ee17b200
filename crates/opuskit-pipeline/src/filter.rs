//! Typed track filters
//!
//! A filter expression is a comma-separated list of clauses that must all
//! hold, e.g. `archive_nr<10,genre=rock,duration>=30`. Each clause compiles
//! to a predicate over a known [`WorkItem`] field; nothing is evaluated as
//! code.

use crate::item::{TagSet, WorkItem};
use regex::Regex;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

static CLAUSE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z_]+)\s*(<=|>=|!=|==|=|<|>)\s*(.*?)\s*$")
        .unwrap_or_else(|e| panic!("invalid clause regex: {e}"))
});

/// Errors raised while parsing a filter expression
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("malformed clause '{0}' (expected <field><op><value>)")]
    Malformed(String),

    #[error("unknown field '{0}'")]
    UnknownField(String),

    #[error("operator '{op}' is not supported for field '{field}'")]
    UnsupportedOperator { field: String, op: String },

    #[error("field '{field}' expects a number, got '{value}'")]
    InvalidNumber { field: String, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FieldKind {
    Integer,
    Float,
    /// Scalar text or tag set; equality only
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Id,
    ArtistId,
    AlbumId,
    ArchiveNr,
    ShardNr,
    Duration,
    BlobId,
    MainGenre,
    MainInstrument,
    MainMood,
    Genre,
    Instrument,
    Mood,
}

impl Field {
    fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "id" => Self::Id,
            "artist_id" => Self::ArtistId,
            "album_id" => Self::AlbumId,
            "archive_nr" | "gdrive_nr" => Self::ArchiveNr,
            "shard_nr" | "chunk_nr" => Self::ShardNr,
            "duration" | "duration_in_sec" => Self::Duration,
            "blob_id" | "gdrive_id" => Self::BlobId,
            "main_genre" => Self::MainGenre,
            "main_instrument" => Self::MainInstrument,
            "main_mood" => Self::MainMood,
            "genre" | "genres" => Self::Genre,
            "instrument" | "instruments" => Self::Instrument,
            "mood" | "moods" => Self::Mood,
            _ => return None,
        })
    }

    fn kind(self) -> FieldKind {
        match self {
            Self::Id | Self::ArtistId | Self::AlbumId | Self::ArchiveNr | Self::ShardNr => {
                FieldKind::Integer
            }
            Self::Duration => FieldKind::Float,
            _ => FieldKind::Text,
        }
    }

    fn integer(self, item: &WorkItem) -> Option<u64> {
        match self {
            Self::Id => Some(item.id),
            Self::ArtistId => Some(item.artist_id),
            Self::AlbumId => Some(item.album_id),
            Self::ArchiveNr => Some(u64::from(item.archive_nr)),
            Self::ShardNr => Some(u64::from(item.shard_nr)),
            _ => None,
        }
    }

    fn number(self, item: &WorkItem) -> Option<f64> {
        match self {
            Self::Duration => Some(item.duration_in_sec),
            _ => None,
        }
    }

    fn text(self, item: &WorkItem) -> Option<&str> {
        match self {
            Self::BlobId => Some(&item.blob_id),
            Self::MainGenre => Some(&item.main_genre),
            Self::MainInstrument => Some(&item.main_instrument),
            Self::MainMood => Some(&item.main_mood),
            _ => None,
        }
    }

    fn tags(self, item: &WorkItem) -> Option<&TagSet> {
        match self {
            Self::Genre => Some(&item.genres),
            Self::Instrument => Some(&item.instruments),
            Self::Mood => Some(&item.moods),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Op {
    fn parse(op: &str) -> Option<Self> {
        Some(match op {
            "=" | "==" => Self::Eq,
            "!=" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            _ => return None,
        })
    }

    fn compare<T: PartialOrd>(self, left: T, right: T) -> bool {
        match self {
            Self::Eq => left == right,
            Self::Ne => left != right,
            Self::Lt => left < right,
            Self::Le => left <= right,
            Self::Gt => left > right,
            Self::Ge => left >= right,
        }
    }
}

#[derive(Debug, Clone)]
enum Value {
    Integer(u64),
    Number(f64),
    Text(String),
}

#[derive(Debug, Clone)]
struct Clause {
    field: Field,
    op: Op,
    value: Value,
}

impl Clause {
    fn parse(raw: &str) -> Result<Self, FilterError> {
        let caps = CLAUSE_RE
            .captures(raw)
            .ok_or_else(|| FilterError::Malformed(raw.trim().to_string()))?;
        let name = &caps[1];
        let op_text = &caps[2];
        let value = unquote(&caps[3]);

        let field = Field::parse(&name.to_ascii_lowercase())
            .ok_or_else(|| FilterError::UnknownField(name.to_string()))?;
        let op = Op::parse(op_text).ok_or_else(|| FilterError::Malformed(raw.trim().to_string()))?;

        let invalid = || FilterError::InvalidNumber {
            field: name.to_string(),
            value: value.to_string(),
        };
        let value = match field.kind() {
            FieldKind::Integer => Value::Integer(value.parse().map_err(|_| invalid())?),
            FieldKind::Float => Value::Number(value.parse().map_err(|_| invalid())?),
            FieldKind::Text if matches!(op, Op::Eq | Op::Ne) => Value::Text(value.to_string()),
            FieldKind::Text => {
                return Err(FilterError::UnsupportedOperator {
                    field: name.to_string(),
                    op: op_text.to_string(),
                })
            }
        };

        Ok(Self { field, op, value })
    }

    fn matches(&self, item: &WorkItem) -> bool {
        match &self.value {
            Value::Integer(expected) => self
                .field
                .integer(item)
                .is_some_and(|actual| self.op.compare(actual, *expected)),
            Value::Number(expected) => self
                .field
                .number(item)
                .is_some_and(|actual| self.op.compare(actual, *expected)),
            Value::Text(expected) => {
                let hit = match (self.field.text(item), self.field.tags(item)) {
                    (Some(text), _) => text == expected,
                    (None, Some(tags)) => tags.contains(expected),
                    (None, None) => false,
                };
                match self.op {
                    Op::Ne => !hit,
                    _ => hit,
                }
            }
        }
    }
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

/// Conjunction of field clauses, optionally restricted to a set of ids
#[derive(Debug, Clone, Default)]
pub struct TrackFilter {
    clauses: Vec<Clause>,
    ids: Option<BTreeSet<u64>>,
    source: String,
}

impl TrackFilter {
    /// Filter that accepts every track
    pub fn all() -> Self {
        Self::default()
    }

    /// Parse a filter expression; an empty expression accepts everything
    pub fn parse(expr: &str) -> Result<Self, FilterError> {
        let clauses = expr
            .split(',')
            .filter(|c| !c.trim().is_empty())
            .map(Clause::parse)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            clauses,
            ids: None,
            source: expr.trim().to_string(),
        })
    }

    /// Restrict to `ids`, intersecting with any earlier restriction
    pub fn with_ids(mut self, ids: BTreeSet<u64>) -> Self {
        self.ids = Some(match self.ids.take() {
            Some(existing) => existing.intersection(&ids).copied().collect(),
            None => ids,
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty() && self.ids.is_none()
    }

    pub fn matches(&self, item: &WorkItem) -> bool {
        if let Some(ids) = &self.ids {
            if !ids.contains(&item.id) {
                return false;
            }
        }
        self.clauses.iter().all(|clause| clause.matches(item))
    }
}

impl FromStr for TrackFilter {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for TrackFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.source.is_empty() {
            parts.push(self.source.clone());
        }
        if let Some(ids) = &self.ids {
            parts.push(format!("{} listed ids", ids.len()));
        }
        if parts.is_empty() {
            f.write_str("all tracks")
        } else {
            f.write_str(&parts.join(" and "))
        }
    }
}
