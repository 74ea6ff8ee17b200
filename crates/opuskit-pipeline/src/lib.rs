//! opuskit Pipeline Library
//!
//! Idempotent fan-out batch processing for converting an audio dataset:
//! download source archives, verify them, transcode to Opus and pack the
//! results into shard archives.
//!
//! # Flow
//!
//! 1. [`Catalog`] loads the static list of [`WorkItem`]s, optionally narrowed
//!    by a [`TrackFilter`].
//! 2. [`partition`] assigns every unit to exactly one of `worker_count`
//!    partitions by `group_key % worker_count`.
//! 3. [`Executor`] runs one worker per partition, applying an [`Operation`]
//!    to each unit and isolating failures per unit.
//! 4. The [`RunReport`] gives the counts and writes the failure manifest.
//!
//! # Example
//!
//! ```no_run
//! use opuskit_pipeline::{partition, Catalog, Executor, Verify};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> opuskit_pipeline::Result<()> {
//!     let items = Catalog::open("tracks.csv")?.load()?;
//!     let report = Executor::new()
//!         .run(partition(items, 4)?, Arc::new(Verify::new("./mp3")))
//!         .await;
//!     println!("{}", report.summary());
//!     report.write_failure_manifest(Path::new("missing-tasks.txt"))?;
//!     Ok(())
//! }
//! ```
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod aggregator;
pub mod archive;
pub mod catalog;
pub mod config;
pub mod error;
pub mod executor;
pub mod fetcher;
pub mod filter;
pub mod item;
pub mod manifest;
pub mod operation;
pub mod partition;
pub mod process;

pub use aggregator::{OperationResult, ResultAggregator, RunReport};
pub use catalog::{apply_filter, Catalog, CatalogFormat};
pub use config::{FetcherConfig, FetcherKind, PipelineConfig};
pub use error::{ItemError, PipelineError, Result};
pub use executor::{Executor, WorkerState, WorkerSummary};
pub use fetcher::{build_fetcher, BlobFetcher, CommandBlobFetcher, HttpBlobFetcher};
pub use filter::{FilterError, TrackFilter};
pub use item::{TagSet, WorkItem, WorkUnit};
pub use manifest::{read_failure_manifest, write_failure_manifest};
pub use operation::{Chain, Fetch, Operation, Outcome, Pack, ShardBundle, Transcode, Verify};
pub use partition::{partition, Partition, Partitions};
