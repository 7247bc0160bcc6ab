//! Projection operator over compiled expressions.

use std::sync::Arc;

use arrow::datatypes::{Field, Schema, SchemaRef};

use crate::error::{ExecError, Result};
use crate::expr::ExprPtr;
use crate::vector::RowBatch;

use super::{Operator, OperatorState, PullState};

/// Evaluates one expression per output column.
pub struct ProjectOperator {
    exprs: Vec<ExprPtr>,
    schema: SchemaRef,
    state: PullState,
}

impl ProjectOperator {
    /// Creates a projection producing `names[i] = exprs[i]`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `names` and `exprs` differ in length.
    pub fn try_new(names: Vec<String>, exprs: Vec<ExprPtr>) -> Result<Self> {
        if names.len() != exprs.len() {
            return Err(ExecError::Validation(format!(
                "projection has {} names but {} expressions",
                names.len(),
                exprs.len()
            )));
        }
        let fields = names
            .iter()
            .zip(&exprs)
            .map(|(name, expr)| Field::new(name, expr.data_type().to_arrow(), true))
            .collect::<Vec<_>>();
        Ok(ProjectOperator {
            exprs,
            schema: Arc::new(Schema::new(fields)),
            state: PullState::new("Project", 1),
        })
    }

    /// Output column names.
    #[must_use]
    pub fn output_columns(&self) -> Vec<String> {
        self.schema
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }
}

impl Operator for ProjectOperator {
    fn name(&self) -> &str {
        "Project"
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
        let columns = self
            .exprs
            .iter()
            .map(|expr| expr.eval(input))
            .collect::<Result<Vec<_>>>()?;
        let output =
            RowBatch::try_new_with_row_count(Arc::clone(&self.schema), columns, input.num_rows())?;
        self.state.advance();
        Ok(Some(output))
    }

    fn no_more_input(&mut self) {
        self.state.no_more_input();
    }

    fn state(&self) -> OperatorState {
        self.state.state()
    }
}
