//! Idempotent per-unit operations
//!
//! Every operation checks its target before doing any work, so applying it
//! twice to the same unit yields the same on-disk state and the second call
//! touches neither the network nor an external tool.

mod chain;
mod fetch;
mod pack;
mod transcode;
mod verify;

pub use chain::Chain;
pub use fetch::{Fetch, FETCH_MARKER_DIR};
pub use pack::{Pack, ShardBundle};
pub use transcode::{is_ogg_stream, Transcode};
pub use verify::{verify_file, Verify};

use crate::error::ItemError;
use crate::item::WorkUnit;
use async_trait::async_trait;

/// Successful result of applying an operation to one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Work was performed
    Completed,
    /// Target already present; nothing was done
    Skipped,
}

/// A unit of work applied by the executor
#[async_trait]
pub trait Operation<U: WorkUnit>: Send + Sync {
    /// Name used in logs and summaries
    fn name(&self) -> &'static str;

    async fn apply(&self, unit: &U) -> Result<Outcome, ItemError>;
}
