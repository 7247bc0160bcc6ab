//! Single-threaded pipeline driver.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::{ExecError, Result};
use crate::memory::MemoryPool;
use crate::vector::RowBatch;

use super::{Operator, OperatorState};

/// Runs a linear pipeline of operators to completion.
///
/// The first operator is the source and the last one the sink. Between
/// protocol calls the driver checks the memory pool; operators never block.
pub struct Driver {
    operators: Vec<Box<dyn Operator>>,
    pool: Arc<MemoryPool>,
}

impl Driver {
    /// Creates a driver over `operators`, source first.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `operators` is empty.
    pub fn try_new(operators: Vec<Box<dyn Operator>>, pool: Arc<MemoryPool>) -> Result<Self> {
        if operators.is_empty() {
            return Err(ExecError::Validation(
                "a pipeline needs at least one operator".to_string(),
            ));
        }
        Ok(Driver { operators, pool })
    }

    /// Operator names, source first.
    #[must_use]
    pub fn operator_names(&self) -> Vec<&str> {
        self.operators.iter().map(|op| op.name()).collect()
    }

    /// Pulls every batch through the pipeline and returns the sink's output.
    ///
    /// # Errors
    ///
    /// Propagates operator errors, returns `MemoryLimitExceeded` when the pool
    /// goes over its limit, and `ExecutionError` if no operator can make
    /// progress before the sink finishes.
    pub fn run(&mut self) -> Result<Vec<RowBatch>> {
        debug!(pipeline = ?self.operator_names(), "driver started");
        let last = self.operators.len() - 1;
        let mut closed = vec![false; self.operators.len()];
        let mut output = Vec::new();

        loop {
            let mut progressed = false;

            for i in 0..last {
                let (head, tail) = self.operators.split_at_mut(i + 1);
                let upstream = &mut head[i];
                let downstream = &mut tail[0];

                if upstream.is_finished() {
                    if !closed[i + 1] {
                        trace!(operator = downstream.name(), "no more input");
                        downstream.no_more_input();
                        closed[i + 1] = true;
                        progressed = true;
                    }
                    continue;
                }
                if !downstream.needs_input() {
                    continue;
                }
                let was_filled = upstream.state() == OperatorState::Filled;
                if let Some(batch) = upstream.get_output()? {
                    trace!(
                        from = upstream.name(),
                        to = downstream.name(),
                        rows = batch.num_rows(),
                        "moving batch"
                    );
                    downstream.add_input(batch)?;
                    progressed = true;
                } else if was_filled {
                    progressed = true;
                }
            }

            let sink = &mut self.operators[last];
            while sink.state() == OperatorState::Filled {
                progressed = true;
                if let Some(batch) = sink.get_output()? {
                    output.push(batch);
                }
            }

            self.pool.check_limit()?;

            if self.operators[last].is_finished() {
                break;
            }
            if !progressed {
                return Err(ExecError::ExecutionError(
                    "pipeline stalled before the sink finished".to_string(),
                ));
            }
        }

        debug!(
            batches = output.len(),
            memory_used = self.pool.used(),
            "driver finished"
        );
        Ok(output)
    }
}
