//! Deterministic assignment of work units to workers
//!
//! Unit `u` lands in partition `u.group_key() % worker_count`. Units keep
//! their input order inside a partition, and there are always exactly
//! `worker_count` partitions, some of which may be empty.

use crate::error::{PipelineError, Result};
use crate::item::WorkUnit;

/// Ordered units sharing one partition key
#[derive(Debug, Clone)]
pub struct Partition<U> {
    pub key: usize,
    pub units: Vec<U>,
}

impl<U> Partition<U> {
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

/// All partitions of one run, indexed by key `0..worker_count`
#[derive(Debug, Clone)]
pub struct Partitions<U> {
    partitions: Vec<Partition<U>>,
}

impl<U: WorkUnit> Partitions<U> {
    /// Number of partitions (equals the worker count)
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn get(&self, key: usize) -> Option<&Partition<U>> {
        self.partitions.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Partition<U>> {
        self.partitions.iter()
    }

    /// Total units across all partitions
    pub fn total_units(&self) -> usize {
        self.partitions.iter().map(Partition::len).sum()
    }

    /// `(unit_id, partition key)` pairs in partition order
    pub fn assignments(&self) -> Vec<(u64, usize)> {
        self.partitions
            .iter()
            .flat_map(|p| p.units.iter().map(move |u| (u.unit_id(), p.key)))
            .collect()
    }
}

impl<U> IntoIterator for Partitions<U> {
    type Item = Partition<U>;
    type IntoIter = std::vec::IntoIter<Partition<U>>;

    fn into_iter(self) -> Self::IntoIter {
        self.partitions.into_iter()
    }
}

/// Split `units` into exactly `worker_count` partitions
pub fn partition<U: WorkUnit>(units: Vec<U>, worker_count: usize) -> Result<Partitions<U>> {
    if worker_count == 0 {
        return Err(PipelineError::setup("worker count must be at least 1"));
    }

    let mut partitions: Vec<Partition<U>> = (0..worker_count)
        .map(|key| Partition {
            key,
            units: Vec::new(),
        })
        .collect();

    // u64 % usize fits in usize
    let modulus = worker_count as u64;
    for unit in units {
        let key = (unit.group_key() % modulus) as usize;
        partitions[key].units.push(unit);
    }

    Ok(Partitions { partitions })
}
