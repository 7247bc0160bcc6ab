//! Filter operator over a compiled boolean predicate.

use std::sync::Arc;

use arrow::array::{Array, AsArray};
use arrow::compute::{filter, prep_null_mask_filter};
use arrow::datatypes::SchemaRef;

use crate::error::{ExecError, Result};
use crate::expr::ExprPtr;
use crate::types::DataType;
use crate::vector::{RowBatch, Vector, VectorRef};

use super::{Operator, OperatorState, PullState};

/// Keeps the rows for which the predicate is true; null counts as false.
pub struct FilterOperator {
    predicate: ExprPtr,
    schema: SchemaRef,
    state: PullState,
}

impl FilterOperator {
    /// Creates a filter over batches of `schema`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if the predicate is not boolean.
    pub fn try_new(predicate: ExprPtr, schema: SchemaRef) -> Result<Self> {
        if predicate.data_type() != DataType::Bool {
            return Err(ExecError::Validation(format!(
                "filter predicate must be BOOL, got {}",
                predicate.data_type()
            )));
        }
        Ok(FilterOperator {
            predicate,
            schema,
            state: PullState::new("Filter", 1),
        })
    }

    fn apply(&self, input: &RowBatch) -> Result<Option<RowBatch>> {
        let result = self.predicate.eval(input)?.to_array()?;
        let mut mask = result
            .as_boolean_opt()
            .cloned()
            .ok_or_else(|| ExecError::ExecutionError("filter predicate must be boolean".into()))?;
        if mask.null_count() > 0 {
            mask = prep_null_mask_filter(&mask);
        }

        let selected = mask.true_count();
        if selected == 0 {
            return Ok(None);
        }
        if selected == input.num_rows() {
            return Ok(Some(input.clone()));
        }
        let columns = input
            .columns()
            .iter()
            .map(|column| -> Result<VectorRef> {
                let filtered = filter(column.to_array()?.as_ref(), &mask)?;
                Ok(Arc::new(Vector::from_array(filtered)?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(RowBatch::try_new_with_row_count(
            Arc::clone(&self.schema),
            columns,
            selected,
        )?))
    }
}

impl Operator for FilterOperator {
    fn name(&self) -> &str {
        "Filter"
    }

    fn output_schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    fn needs_input(&self) -> bool {
        self.state.needs_input()
    }

    fn add_input(&mut self, batch: RowBatch) -> Result<()> {
        self.state.add_input(batch)
    }

    fn get_output(&mut self) -> Result<Option<RowBatch>> {
        let Some(input) = self.state.input() else {
            return Ok(None);
        };
        let output = self.apply(input)?;
        self.state.advance();
        Ok(output)
    }

    fn no_more_input(&mut self) {
        self.state.no_more_input();
    }

    fn state(&self) -> OperatorState {
        self.state.state()
    }
}
