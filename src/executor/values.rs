//! Source operator over an in-memory list of batches.

use std::collections::VecDeque;

use arrow::datatypes::SchemaRef;

use crate::error::{ExecError, Result};
use crate::vector::RowBatch;

use super::{Operator, OperatorState};

/// Emits a fixed list of batches, one per `get_output` call.
pub struct ValuesOperator {
    schema: SchemaRef,
    batches: VecDeque<RowBatch>,
}

impl ValuesOperator {
    /// Creates a source over `batches`, all of which must use `schema`.
    ///
    /// # Errors
    ///
    /// Returns `SchemaError` if a batch's schema differs from `schema`.
    pub fn try_new(schema: SchemaRef, batches: Vec<RowBatch>) -> Result<Self> {
        if let Some(batch) = batches.iter().find(|b| b.schema().fields() != schema.fields()) {
            return Err(ExecError::SchemaError(format!(
                "values batch schema {:?} does not match {:?}",
                batch.schema().fields(),
                schema.fields()
            )));
        }
        Ok(ValuesOperator {
            schema,
            batches: batches.into(),
        })
    }

    /// Number of batches not yet emitted.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.batches.len()
    }
}

impl Operator for ValuesOperator {
    fn name(&self) -> &str {
        "Values"
    }

    fn output_schema(&self) -> SchemaRef {
        SchemaRef::clone(&self.schema)
    }

    fn needs_input(&self) -> bool {
        false
    }

    fn add_input(&mut self, _batch: RowBatch) -> Result<()> {
        Err(ExecError::protocol(self.name(), "source operator takes no input"))
    }

    fn get_output(&mut self) -> Result<Option<RowBatch>> {
        Ok(self.batches.pop_front())
    }

    fn no_more_input(&mut self) {}

    fn state(&self) -> OperatorState {
        if self.batches.is_empty() {
            OperatorState::Finished
        } else {
            OperatorState::Filled
        }
    }
}
