//! Generic executable nodes: column reference, constant, function call.

use std::fmt;
use std::sync::Arc;

use crate::error::{ExecError, Result};
use crate::memory::MemoryPool;
use crate::types::{DataType, Value};
use crate::vector::{make_constant, RowBatch, Vector, VectorRef};

use super::functions::ScalarFunction;
use super::{CostTracker, Expr, ExprPtr, ExprStats};

/// Reads one input column without copying it.
#[derive(Debug)]
pub struct FieldReference {
    name: String,
    index: usize,
    data_type: DataType,
}

impl FieldReference {
    /// Creates a reference to column `index`.
    #[must_use]
    pub fn new(name: impl Into<String>, index: usize, data_type: DataType) -> Self {
        FieldReference {
            name: name.into(),
            index,
            data_type,
        }
    }

    /// Column index in the input schema.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Expr for FieldReference {
    fn name(&self) -> &str {
        &self.name
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn eval(&self, batch: &RowBatch) -> Result<VectorRef> {
        batch.columns().get(self.index).cloned().ok_or_else(|| {
            ExecError::SchemaError(format!(
                "field '{}' refers to column {} of a {}-column batch",
                self.name,
                self.index,
                batch.num_columns()
            ))
        })
    }
}

/// Produces a constant vector as long as the input batch.
#[derive(Debug)]
pub struct ConstantExpr {
    value: Value,
    data_type: DataType,
    pool: Arc<MemoryPool>,
}

impl ConstantExpr {
    /// Creates a constant node.
    #[must_use]
    pub fn new(value: Value, data_type: DataType, pool: Arc<MemoryPool>) -> Self {
        ConstantExpr {
            value,
            data_type,
            pool,
        }
    }
}

impl Expr for ConstantExpr {
    fn name(&self) -> &str {
        "constant"
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn eval(&self, batch: &RowBatch) -> Result<VectorRef> {
        Ok(make_constant(
            self.data_type,
            self.value.clone(),
            batch.num_rows(),
            &self.pool,
        ))
    }

    fn constant_value(&self) -> Option<&Value> {
        Some(&self.value)
    }
}

/// Uniform per-row application of an ordinary scalar function.
pub struct CallExpr {
    function: Arc<dyn ScalarFunction>,
    args: Vec<ExprPtr>,
    data_type: DataType,
    tracker: CostTracker,
}

impl CallExpr {
    /// Creates a call node over compiled arguments.
    #[must_use]
    pub fn new(
        function: Arc<dyn ScalarFunction>,
        args: Vec<ExprPtr>,
        data_type: DataType,
        track_cpu_usage: bool,
    ) -> Self {
        CallExpr {
            function,
            args,
            data_type,
            tracker: CostTracker::new(track_cpu_usage),
        }
    }
}

impl fmt::Debug for CallExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallExpr")
            .field("function", &self.function.name())
            .field("args", &self.args)
            .field("data_type", &self.data_type)
            .finish()
    }
}

impl Expr for CallExpr {
    fn name(&self) -> &str {
        self.function.name()
    }

    fn data_type(&self) -> DataType {
        self.data_type
    }

    fn eval(&self, batch: &RowBatch) -> Result<VectorRef> {
        self.tracker.track(|| -> Result<VectorRef> {
            let arrays = self
                .args
                .iter()
                .map(|arg| arg.eval(batch)?.to_array())
                .collect::<Result<Vec<_>>>()?;
            let result = self.function.invoke(&arrays)?;
            Ok(Arc::new(Vector::from_array(result)?))
        })
    }

    fn stats(&self) -> Option<ExprStats> {
        self.tracker.stats()
    }
}
