//! Plan nodes consumed by operator construction.

use std::collections::HashSet;
use std::sync::Arc;

use arrow::datatypes::{Field, Schema, SchemaRef};
use serde::{Deserialize, Serialize};

use crate::error::{ExecError, Result};
use crate::expr::TypedExpr;
use crate::types::DataType;

/// Row-expansion plan node.
///
/// Every input row is emitted once per projection set. Each projection set
/// lists one expression per output column; a cell is either a field of the
/// source or a constant.
#[derive(Debug, Clone)]
pub struct ExpandNode {
    id: String,
    names: Vec<String>,
    projections: Vec<Vec<TypedExpr>>,
    source_schema: SchemaRef,
    output_schema: SchemaRef,
}

impl ExpandNode {
    /// Creates a validated expand node.
    ///
    /// # Errors
    ///
    /// - `Validation` if there are no projection sets, a set's width differs
    ///   from the number of output names, names repeat, a constant's value is
    ///   not of its declared type, or two sets disagree on a column's type
    /// - `UnsupportedExpression` if no set gives a column a field or constant
    pub fn try_new(
        id: impl Into<String>,
        names: Vec<String>,
        projections: Vec<Vec<TypedExpr>>,
        source_schema: SchemaRef,
    ) -> Result<Self> {
        let id = id.into();
        if projections.is_empty() {
            return Err(ExecError::Validation(format!(
                "expand node '{id}' needs at least one projection set"
            )));
        }
        if let Some((set, width)) = projections
            .iter()
            .map(Vec::len)
            .enumerate()
            .find(|(_, width)| *width != names.len())
        {
            return Err(ExecError::Validation(format!(
                "projection set {set} of expand node '{id}' has {width} columns, expected {}",
                names.len()
            )));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = names.iter().find(|name| !seen.insert(name.as_str())) {
            return Err(ExecError::Validation(format!(
                "expand node '{id}' has duplicate output name '{duplicate}'"
            )));
        }

        let fields = names
            .iter()
            .enumerate()
            .map(|(column, name)| {
                let data_type = column_type(&id, &projections, column)?;
                Ok(Field::new(name, data_type.to_arrow(), true))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ExpandNode {
            id,
            names,
            projections,
            source_schema,
            output_schema: Arc::new(Schema::new(fields)),
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Output column names.
    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Projection sets, one per emitted batch.
    #[must_use]
    pub fn projections(&self) -> &[Vec<TypedExpr>] {
        &self.projections
    }

    /// Schema of the node's input.
    #[must_use]
    pub fn source_schema(&self) -> SchemaRef {
        Arc::clone(&self.source_schema)
    }

    /// Schema of every emitted batch.
    #[must_use]
    pub fn output_schema(&self) -> SchemaRef {
        Arc::clone(&self.output_schema)
    }
}

/// Declared type of one cell; calls carry no declared type.
fn cell_type(cell: &TypedExpr) -> Option<DataType> {
    match cell {
        TypedExpr::Field { data_type, .. } | TypedExpr::Constant { data_type, .. } => {
            Some(*data_type)
        }
        TypedExpr::Call { .. } => None,
    }
}

fn column_type(id: &str, projections: &[Vec<TypedExpr>], column: usize) -> Result<DataType> {
    let mut resolved: Option<DataType> = None;
    for (set, projection) in projections.iter().enumerate() {
        let cell = &projection[column];
        if let TypedExpr::Constant { value, data_type } = cell {
            if !value.is_null() && value.data_type() != Some(*data_type) {
                return Err(ExecError::Validation(format!(
                    "projection set {set} of expand node '{id}' has constant {value} declared {data_type}"
                )));
            }
        }
        let Some(data_type) = cell_type(cell) else {
            continue;
        };
        match resolved {
            Some(expected) if expected != data_type => {
                return Err(ExecError::Validation(format!(
                    "column {column} of expand node '{id}' is {expected}, but projection set {set} gives {data_type}"
                )));
            }
            _ => resolved = Some(data_type),
        }
    }
    resolved.ok_or_else(|| ExecError::UnsupportedExpression {
        message: "Expand only supports field reference and constant expressions".to_string(),
        expression: projections[0][column].to_string(),
    })
}
