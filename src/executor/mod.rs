//! Executor module for pipeline execution.
//!
//! Operators follow a single-threaded pull protocol: the [`Driver`] asks an
//! operator whether it [`needs_input`](Operator::needs_input), hands it a
//! batch with [`add_input`](Operator::add_input), drains it with
//! [`get_output`](Operator::get_output) and finally signals
//! [`no_more_input`](Operator::no_more_input).

mod driver;
mod expand;
mod filter;
mod project;
mod values;

use arrow::datatypes::SchemaRef;
use tracing::trace;

use crate::error::{ExecError, Result};
use crate::vector::RowBatch;

pub use driver::Driver;
pub use expand::ExpandOperator;
pub use filter::FilterOperator;
pub use project::ProjectOperator;
pub use values::ValuesOperator;

/// Observable state of an operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorState {
    /// No buffered input; ready for the next batch.
    Idle,
    /// Input buffered and not yet fully drained.
    Filled,
    /// No buffered input and upstream is done.
    Finished,
}

/// Pipeline stage driven through the pull protocol.
pub trait Operator: Send {
    /// Operator name for logs and errors.
    fn name(&self) -> &str;

    /// Schema of every batch returned by [`Operator::get_output`].
    fn output_schema(&self) -> SchemaRef;

    /// Returns true iff the operator is idle and upstream has not finished.
    fn needs_input(&self) -> bool;

    /// Buffers one input batch, forcing every lazy column first.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` unless the operator needs input, and
    /// `LazyLoad` if a column cannot be forced.
    fn add_input(&mut self, batch: RowBatch) -> Result<()>;

    /// Produces the next output batch, or None when nothing is ready.
    ///
    /// # Errors
    ///
    /// Returns an error if evaluating the buffered input fails.
    fn get_output(&mut self) -> Result<Option<RowBatch>>;

    /// Records that no further input will arrive.
    fn no_more_input(&mut self);

    /// Returns true once all input has been drained after `no_more_input`.
    fn is_finished(&self) -> bool {
        self.state() == OperatorState::Finished
    }

    /// Current protocol state.
    fn state(&self) -> OperatorState;
}

/// Pull-protocol bookkeeping shared by operators that consume input.
///
/// Each buffered batch is drained by `multiplicity` calls to
/// [`PullState::advance`]; the last one releases the batch.
#[derive(Debug)]
pub struct PullState {
    operator: String,
    input: Option<RowBatch>,
    no_more_input: bool,
    progress: usize,
    multiplicity: usize,
}

impl PullState {
    /// Creates an idle state; `multiplicity` is raised to at least 1.
    #[must_use]
    pub fn new(operator: impl Into<String>, multiplicity: usize) -> Self {
        PullState {
            operator: operator.into(),
            input: None,
            no_more_input: false,
            progress: 0,
            multiplicity: multiplicity.max(1),
        }
    }

    #[must_use]
    pub fn state(&self) -> OperatorState {
        match (&self.input, self.no_more_input) {
            (Some(_), _) => OperatorState::Filled,
            (None, true) => OperatorState::Finished,
            (None, false) => OperatorState::Idle,
        }
    }

    #[must_use]
    pub fn needs_input(&self) -> bool {
        self.state() == OperatorState::Idle
    }

    /// Buffers `batch` after forcing its lazy columns.
    ///
    /// # Errors
    ///
    /// Returns `ProtocolViolation` when not idle, or the load error.
    pub fn add_input(&mut self, batch: RowBatch) -> Result<()> {
        match self.state() {
            OperatorState::Idle => {}
            OperatorState::Filled => {
                return Err(ExecError::protocol(
                    &self.operator,
                    "add_input called while input is still buffered",
                ))
            }
            OperatorState::Finished => {
                return Err(ExecError::protocol(
                    &self.operator,
                    "add_input called after no_more_input",
                ))
            }
        }
        let batch = batch.loaded()?;
        trace!(operator = %self.operator, rows = batch.num_rows(), "input buffered");
        self.input = Some(batch);
        self.progress = 0;
        Ok(())
    }

    /// The buffered batch, if any.
    #[must_use]
    pub fn input(&self) -> Option<&RowBatch> {
        self.input.as_ref()
    }

    /// Index of the next derived output for the buffered batch.
    #[must_use]
    pub fn progress(&self) -> usize {
        self.progress
    }

    #[must_use]
    pub fn multiplicity(&self) -> usize {
        self.multiplicity
    }

    /// Records one derived output; releases the input after the last one.
    pub fn advance(&mut self) {
        if self.input.is_none() {
            return;
        }
        self.progress += 1;
        if self.progress >= self.multiplicity {
            trace!(operator = %self.operator, "input drained");
            self.progress = 0;
            self.input = None;
        }
    }

    pub fn no_more_input(&mut self) {
        self.no_more_input = true;
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state() == OperatorState::Finished
    }
}
