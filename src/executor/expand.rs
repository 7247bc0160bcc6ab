//! Expand operator for grouping-set style row multiplication.
//!
//! Each input batch is emitted once per projection set. Field cells alias the
//! input column, constant cells become constant vectors, so no row data is
//! copied.

use std::sync::Arc;

use arrow::datatypes::{Schema, SchemaRef};
use tracing::debug;

use crate::error::{ExecError, Result};
use crate::expr::TypedExpr;
use crate::memory::MemoryPool;
use crate::plan::ExpandNode;
use crate::types::{DataType, Value};
use crate::vector::{make_constant, make_null_constant, RowBatch, VectorRef};

use super::{Operator, OperatorState, PullState};

/// One output column of one projection set.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectionCell {
    /// Alias of the input column at this index.
    Column(usize),
    /// Repeated literal, possibly null.
    Constant { value: Value, data_type: DataType },
}

impl ProjectionCell {
    /// Resolves a cell against the input schema.
    ///
    /// # Errors
    ///
    /// - `Validation` if a field is not in `schema`, or a constant's value is
    ///   not of its declared type
    /// - `SchemaError` if a field's declared type disagrees with `schema`
    /// - `UnsupportedExpression` for anything but a field or constant
    pub fn resolve(expr: &TypedExpr, schema: &Schema) -> Result<Self> {
        match expr {
            TypedExpr::Field { name, data_type } => {
                let index = schema.index_of(name).map_err(|_| {
                    ExecError::Validation(format!("field '{name}' not found in expand input"))
                })?;
                if DataType::from_arrow(schema.field(index).data_type()) != Some(*data_type) {
                    return Err(ExecError::SchemaError(format!(
                        "field '{name}' is declared {data_type} but the input has {}",
                        schema.field(index).data_type()
                    )));
                }
                Ok(ProjectionCell::Column(index))
            }
            TypedExpr::Constant { value, data_type } => {
                if !value.is_null() && value.data_type() != Some(*data_type) {
                    return Err(ExecError::Validation(format!(
                        "expand constant {value} is not a {data_type}"
                    )));
                }
                Ok(ProjectionCell::Constant {
                    value: value.clone(),
                    data_type: *data_type,
                })
            }
            TypedExpr::Call { .. } => Err(ExecError::UnsupportedExpression {
                message: "Expand only supports field reference and constant expressions"
                    .to_string(),
                expression: expr.to_string(),
            }),
        }
    }

    fn materialize(&self, input: &RowBatch, pool: &MemoryPool) -> VectorRef {
        match self {
            ProjectionCell::Column(index) => Arc::clone(input.column(*index)),
            ProjectionCell::Constant { value, data_type } if value.is_null() => {
                make_null_constant(*data_type, input.num_rows(), pool)
            }
            ProjectionCell::Constant { value, data_type } => {
                make_constant(*data_type, value.clone(), input.num_rows(), pool)
            }
        }
    }
}

/// Emits every input batch once per projection set.
///
/// Exactly one batch is returned per `get_output` call; the input is released
/// after the last projection set.
pub struct ExpandOperator {
    id: String,
    projections: Vec<Vec<ProjectionCell>>,
    source_schema: SchemaRef,
    output_schema: SchemaRef,
    pool: Arc<MemoryPool>,
    state: PullState,
}

impl ExpandOperator {
    /// Creates an expand operator for `node`.
    ///
    /// # Errors
    ///
    /// Fails if any projection cell cannot be resolved; see
    /// [`ProjectionCell::resolve`].
    pub fn new(node: &ExpandNode, pool: Arc<MemoryPool>) -> Result<Self> {
        let source = node.source_schema();
        let projections = node
            .projections()
            .iter()
            .map(|set| {
                set.iter()
                    .map(|cell| ProjectionCell::resolve(cell, &source))
                    .collect::<Result<Vec<_>>>()
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            id = node.id(),
            projection_sets = projections.len(),
            columns = node.names().len(),
            "created expand operator"
        );
        Ok(ExpandOperator {
            id: node.id().to_string(),
            state: PullState::new(format!("Expand[{}]", node.id()), projections.len()),
            projections,
            source_schema: source,
            output_schema: node.output_schema(),
            pool,
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Resolved projection sets.
    #[must_use]
    pub fn projections(&self) -> &[Vec<ProjectionCell>] {
        &self.projections
    }

    /// Column indices were resolved against the node's source schema, so
    /// every input must carry the same names and logical types.
    fn check_source(&self, batch: &RowBatch) -> Result<()> {
        let schema = batch.schema();
        let expected = self.source_schema.fields();
        let actual = schema.fields();
        let matches = expected.len() == actual.len()
            && expected.iter().zip(actual.iter()).all(|(want, got)| {
                want.name() == got.name()
                    && DataType::from_arrow(want.data_type())
                        == DataType::from_arrow(got.data_type())
            });
        if matches {
            return Ok(());
        }
        Err(ExecError::SchemaError(format!(
            "expand '{}' expects input columns [{}], got [{}]",
            self.id,
            describe(&self.source_schema),
            describe(&schema)
        )))
    }
}

fn describe(schema: &Schema) -> String {
    schema
        .fields()
        .iter()
        .map(|field| format!("{}: {}", field.name(), field.data_type()))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Operator for ExpandOperator {
    fn name(&self) -> &str {
        "Expand"
    }

    fn output_schema(&self) -> SchemaRef {
        Arc::clone(&self.output_schema)
    }

    fn needs_input(&self) -> bool {
        self.state.needs_input()
    }

    fn add_input(&mut self, batch: RowBatch) -> Result<()> {
        self.check_source(&batch)?;
        self.state.add_input(batch)
    }

    fn get_output(&mut self) -> Result<Option<RowBatch>> {
        let Some(input) = self.state.input() else {
            return Ok(None);
        };
        let columns = self.projections[self.state.progress()]
            .iter()
            .map(|cell| cell.materialize(input, &self.pool))
            .collect::<Vec<_>>();
        let output = RowBatch::new_unchecked(
            Arc::clone(&self.output_schema),
            columns,
            input.num_rows(),
        );
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
