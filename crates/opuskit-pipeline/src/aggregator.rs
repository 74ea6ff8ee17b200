//! Per-unit results and the run report

use crate::error::{ItemError, Result};
use crate::executor::WorkerSummary;
use crate::manifest::write_failure_manifest;
use crate::operation::Outcome;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::time::Duration;
use tracing::warn;

/// Result of applying one operation to one unit
#[derive(Debug)]
pub struct OperationResult {
    pub unit_id: u64,
    pub worker: usize,
    pub outcome: std::result::Result<Outcome, ItemError>,
    pub elapsed: Duration,
}

impl OperationResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.outcome, Ok(Outcome::Skipped))
    }

    pub fn error(&self) -> Option<&ItemError> {
        self.outcome.as_ref().err()
    }
}

/// Collects results as workers stream them in
#[derive(Debug)]
pub struct ResultAggregator {
    operation: &'static str,
    results: Vec<OperationResult>,
    seen: HashSet<u64>,
}

impl ResultAggregator {
    pub fn new(operation: &'static str) -> Self {
        Self {
            operation,
            results: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Keep the first result per unit; returns `false` for a duplicate
    pub fn record(&mut self, result: OperationResult) -> bool {
        if !self.seen.insert(result.unit_id) {
            warn!(
                operation = self.operation,
                item_id = result.unit_id,
                "Dropping duplicate result"
            );
            return false;
        }
        self.results.push(result);
        true
    }

    /// Whether a result for `unit_id` has been recorded
    pub fn has_result(&self, unit_id: u64) -> bool {
        self.seen.contains(&unit_id)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn finish(self, workers: Vec<WorkerSummary>) -> RunReport {
        RunReport {
            operation: self.operation,
            results: self.results,
            workers,
        }
    }
}

/// Everything a finished run produced
#[derive(Debug)]
pub struct RunReport {
    pub operation: &'static str,
    /// Results in arrival order; per worker this is processing order
    pub results: Vec<OperationResult>,
    pub workers: Vec<WorkerSummary>,
}

impl RunReport {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    /// Completed plus skipped
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    pub fn skipped(&self) -> usize {
        self.results.iter().filter(|r| r.is_skipped()).count()
    }

    pub fn completed(&self) -> usize {
        self.succeeded() - self.skipped()
    }

    pub fn failed(&self) -> usize {
        self.total() - self.succeeded()
    }

    /// Ids of failed units, ascending
    pub fn failed_ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self
            .results
            .iter()
            .filter(|r| !r.is_success())
            .map(|r| r.unit_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Failure counts keyed by [`ItemError::kind`]
    pub fn failures_by_kind(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for err in self.results.iter().filter_map(OperationResult::error) {
            *counts.entry(err.kind()).or_insert(0) += 1;
        }
        counts
    }

    pub fn results_for_worker(&self, worker: usize) -> impl Iterator<Item = &OperationResult> {
        self.results.iter().filter(move |r| r.worker == worker)
    }

    /// `"<s> succeeded, <f> failed"`
    pub fn summary(&self) -> String {
        format!("{} succeeded, {} failed", self.succeeded(), self.failed())
    }

    pub fn write_failure_manifest(&self, path: &Path) -> Result<()> {
        write_failure_manifest(path, &self.failed_ids())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod tests {
    use super::*;
    use std::path::PathBuf;

    pub(crate) fn ok(unit_id: u64, worker: usize, outcome: Outcome) -> OperationResult {
        OperationResult {
            unit_id,
            worker,
            outcome: Ok(outcome),
            elapsed: Duration::from_millis(1),
        }
    }

    pub(crate) fn failed(unit_id: u64, worker: usize) -> OperationResult {
        OperationResult {
            unit_id,
            worker,
            outcome: Err(ItemError::MissingArtifact(PathBuf::from(format!("{unit_id}.mp3")))),
            elapsed: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_counts_and_summary() {
        let mut agg = ResultAggregator::new("verify");
        agg.record(ok(1, 0, Outcome::Completed));
        agg.record(failed(7, 1));
        agg.record(ok(2, 0, Outcome::Skipped));
        agg.record(failed(3, 0));
        let report = agg.finish(Vec::new());

        assert_eq!(report.total(), 4);
        assert_eq!(report.succeeded(), 2);
        assert_eq!(report.completed(), 1);
        assert_eq!(report.skipped(), 1);
        assert_eq!(report.failed(), 2);
        assert_eq!(report.failed_ids(), vec![3, 7]);
        assert_eq!(report.summary(), "2 succeeded, 2 failed");
        assert_eq!(report.failures_by_kind().get("missing_artifact"), Some(&2));
    }

    #[test]
    fn test_duplicate_results_are_dropped() {
        let mut agg = ResultAggregator::new("verify");
        assert!(agg.record(failed(3, 0)));
        assert!(!agg.record(ok(3, 1, Outcome::Completed)));
        assert_eq!(agg.len(), 1);

        let report = agg.finish(Vec::new());
        assert_eq!(report.total(), 1);
        assert_eq!(report.summary(), "0 succeeded, 1 failed");
    }

    #[test]
    fn test_results_for_worker_keep_order() {
        let mut agg = ResultAggregator::new("verify");
        agg.record(ok(4, 1, Outcome::Completed));
        agg.record(ok(1, 0, Outcome::Completed));
        agg.record(ok(2, 1, Outcome::Completed));
        assert!(agg.has_result(2));
        assert!(!agg.has_result(9));

        let report = agg.finish(Vec::new());
        let ids: Vec<u64> = report.results_for_worker(1).map(|r| r.unit_id).collect();
        assert_eq!(ids, vec![4, 2]);
    }
}
