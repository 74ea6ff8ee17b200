//! Fan-out executor
//!
//! One tokio task per partition, each applying the operation to its units
//! sequentially. Errors and panics are caught per unit, so one bad item never
//! stops its worker. Results stream to a single collector over an mpsc
//! channel, which feeds the optional observer and the [`ResultAggregator`].

use crate::aggregator::{OperationResult, ResultAggregator, RunReport};
use crate::error::ItemError;
use crate::item::WorkUnit;
use crate::operation::{Operation, Outcome};
use crate::partition::Partitions;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Worker lifecycle: `Idle -> Running -> Completed | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    Completed,
    Failed,
}

impl WorkerState {
    pub fn as_str(&self) -> &str {
        match self {
            WorkerState::Idle => "idle",
            WorkerState::Running => "running",
            WorkerState::Completed => "completed",
            WorkerState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkerState::Completed | WorkerState::Failed)
    }
}

/// Final state of one worker
#[derive(Debug, Clone)]
pub struct WorkerSummary {
    pub worker: usize,
    pub state: WorkerState,
    pub assigned: usize,
    pub processed: usize,
}

type Observer = Arc<dyn Fn(&OperationResult) + Send + Sync>;

/// Runs an operation over every partition with one worker per partition
#[derive(Clone, Default)]
pub struct Executor {
    observer: Option<Observer>,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `observer` for every result as it arrives
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&OperationResult) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Apply `operation` to all units and wait until every worker is terminal
    pub async fn run<U: WorkUnit>(
        &self,
        partitions: Partitions<U>,
        operation: Arc<dyn Operation<U>>,
    ) -> RunReport {
        let operation_name = operation.name();
        let worker_count = partitions.len();
        let total = partitions.total_units();
        info!(operation = operation_name, workers = worker_count, units = total, "Starting run");

        let (tx, mut rx) = mpsc::unbounded_channel::<OperationResult>();

        let mut handles = Vec::with_capacity(worker_count);
        for partition in partitions {
            let worker = partition.key;
            let assigned: Vec<u64> = partition.units.iter().map(WorkUnit::unit_id).collect();
            debug!(worker, state = WorkerState::Idle.as_str(), units = assigned.len(), "Worker assigned");

            let handle = tokio::spawn(
                run_worker(worker, partition.units, Arc::clone(&operation), tx.clone())
                    .instrument(info_span!("worker", worker, operation = operation_name)),
            );
            handles.push((worker, assigned, handle));
        }
        drop(tx);

        let mut aggregator = ResultAggregator::new(operation_name);
        let observer = self.observer.clone();
        let collect = async {
            while let Some(result) = rx.recv().await {
                if aggregator.has_result(result.unit_id) {
                    aggregator.record(result);
                    continue;
                }
                if let Some(observer) = &observer {
                    observer(&result);
                }
                aggregator.record(result);
            }
        };
        let join = futures::future::join_all(
            handles
                .into_iter()
                .map(|(worker, assigned, handle)| async move { (worker, assigned, handle.await) }),
        );
        let ((), joined) = tokio::join!(collect, join);

        let mut workers = Vec::with_capacity(worker_count);
        for (worker, assigned, joined) in joined {
            let summary = match joined {
                Ok(processed) => WorkerSummary {
                    worker,
                    state: WorkerState::Completed,
                    assigned: assigned.len(),
                    processed,
                },
                Err(join_error) => {
                    error!(worker, error = %join_error, "Worker died");
                    let mut processed = 0;
                    for unit_id in &assigned {
                        if aggregator.has_result(*unit_id) {
                            processed += 1;
                            continue;
                        }
                        let result = OperationResult {
                            unit_id: *unit_id,
                            worker,
                            outcome: Err(ItemError::Panicked(format!(
                                "worker {} died before processing this unit: {}",
                                worker, join_error
                            ))),
                            elapsed: std::time::Duration::ZERO,
                        };
                        if let Some(observer) = &self.observer {
                            observer(&result);
                        }
                        aggregator.record(result);
                    }
                    WorkerSummary {
                        worker,
                        state: WorkerState::Failed,
                        assigned: assigned.len(),
                        processed,
                    }
                }
            };
            debug!(worker, state = summary.state.as_str(), processed = summary.processed, "Worker finished");
            workers.push(summary);
        }

        let report = aggregator.finish(workers);
        info!(
            operation = operation_name,
            succeeded = report.succeeded(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Run finished"
        );
        report
    }
}

async fn run_worker<U: WorkUnit>(
    worker: usize,
    units: Vec<U>,
    operation: Arc<dyn Operation<U>>,
    results: mpsc::UnboundedSender<OperationResult>,
) -> usize {
    let total = units.len();
    info!(state = WorkerState::Running.as_str(), units = total, "Worker running");

    for (index, unit) in units.iter().enumerate() {
        let unit_id = unit.unit_id();
        let started = Instant::now();
        let outcome = match AssertUnwindSafe(operation.apply(unit)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => Err(ItemError::Panicked(panic_message(panic.as_ref()))),
        };
        let elapsed = started.elapsed();
        let remaining = total - index - 1;

        match &outcome {
            Ok(Outcome::Completed) => {
                info!(item_id = unit_id, remaining, elapsed_ms = elapsed.as_millis() as u64, "Item completed")
            }
            Ok(Outcome::Skipped) => debug!(item_id = unit_id, remaining, "Item skipped"),
            Err(e) => warn!(item_id = unit_id, remaining, kind = e.kind(), error = %e, "Item failed"),
        }

        let result = OperationResult {
            unit_id,
            worker,
            outcome,
            elapsed,
        };
        if results.send(result).is_err() {
            warn!("Result collector is gone, stopping worker");
            return index + 1;
        }
    }

    info!(state = WorkerState::Completed.as_str(), "Worker completed");
    total
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
