use super::{Operation, Outcome};
use crate::error::ItemError;
use crate::item::WorkUnit;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Applies several operations to one unit in order, stopping at the first failure
///
/// The chain reports `Completed` if any stage did work and `Skipped` if every
/// stage skipped.
pub struct Chain<U: WorkUnit> {
    name: &'static str,
    stages: Vec<Arc<dyn Operation<U>>>,
}

impl<U: WorkUnit> Chain<U> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            stages: Vec::new(),
        }
    }

    pub fn then(mut self, stage: impl Operation<U> + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }
}

#[async_trait]
impl<U: WorkUnit> Operation<U> for Chain<U> {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn apply(&self, unit: &U) -> Result<Outcome, ItemError> {
        let mut worked = false;
        for stage in &self.stages {
            match stage.apply(unit).await {
                Ok(Outcome::Completed) => worked = true,
                Ok(Outcome::Skipped) => {}
                Err(e) => {
                    debug!(unit_id = unit.unit_id(), stage = stage.name(), "Stage failed");
                    return Err(e);
                }
            }
        }
        Ok(if worked {
            Outcome::Completed
        } else {
            Outcome::Skipped
        })
    }
}
