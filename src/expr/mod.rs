//! Typed expressions and their compiled, executable form.
//!
//! A [`TypedExpr`] is the planner-facing tree: field access, constant, or
//! call. [`ExprCompiler`] turns it into a tree of [`Expr`] nodes, consulting
//! the special-form registry before ordinary function dispatch.

pub mod compiler;
pub mod functions;
mod nodes;
mod stats;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{DataType, Value};
use crate::vector::{RowBatch, VectorRef};

pub use compiler::ExprCompiler;
pub use functions::{FunctionCatalog, FunctionRegistry, ScalarFunction};
pub use nodes::{CallExpr, ConstantExpr, FieldReference};
pub use stats::{CostTracker, ExprStats};

/// Planner-level expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypedExpr {
    /// Reference to an input column by name.
    Field { name: String, data_type: DataType },
    /// Typed literal, possibly null.
    Constant { value: Value, data_type: DataType },
    /// Function or special-form call.
    Call { name: String, args: Vec<TypedExpr> },
}

impl TypedExpr {
    /// Creates a field access expression.
    #[must_use]
    pub fn field(name: impl Into<String>, data_type: DataType) -> Self {
        TypedExpr::Field {
            name: name.into(),
            data_type,
        }
    }

    /// Creates a constant of an explicit type.
    #[must_use]
    pub fn constant(value: Value, data_type: DataType) -> Self {
        TypedExpr::Constant { value, data_type }
    }

    /// Creates a non-null literal typed after its value.
    ///
    /// A `Value::Null` literal is typed as STRING; use [`TypedExpr::null`]
    /// for a typed null.
    #[must_use]
    pub fn literal(value: Value) -> Self {
        let data_type = value.data_type().unwrap_or(DataType::String);
        TypedExpr::Constant { value, data_type }
    }

    /// Creates a typed null constant.
    #[must_use]
    pub fn null(data_type: DataType) -> Self {
        TypedExpr::Constant {
            value: Value::Null,
            data_type,
        }
    }

    /// Creates a call expression.
    #[must_use]
    pub fn call(name: impl Into<String>, args: Vec<TypedExpr>) -> Self {
        TypedExpr::Call {
            name: name.into(),
            args,
        }
    }

    /// Returns the constant value for constant expressions.
    #[must_use]
    pub fn constant_value(&self) -> Option<&Value> {
        match self {
            TypedExpr::Constant { value, .. } => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for TypedExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedExpr::Field { name, .. } => write!(f, "\"{name}\""),
            TypedExpr::Constant { value, data_type } => write!(f, "{value}:{data_type}"),
            TypedExpr::Call { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// A sub-expression together with its resolved type.
///
/// Handed to special forms whose result type depends on a literal argument.
#[derive(Debug, Clone, Copy)]
pub struct TypedInput<'a> {
    pub expr: &'a TypedExpr,
    pub data_type: DataType,
}

impl TypedInput<'_> {
    /// Returns the literal value when the input is a constant.
    #[must_use]
    pub fn constant_value(&self) -> Option<&Value> {
        self.expr.constant_value()
    }
}

/// Executable expression node.
pub trait Expr: Send + Sync + fmt::Debug {
    /// Name of the node (function or form name, or node kind).
    fn name(&self) -> &str;

    /// Result type.
    fn data_type(&self) -> DataType;

    /// Evaluates the node over every row of `batch`.
    ///
    /// # Errors
    ///
    /// Returns an error if a child or kernel fails.
    fn eval(&self, batch: &RowBatch) -> Result<VectorRef>;

    /// Literal value for constant nodes.
    fn constant_value(&self) -> Option<&Value> {
        None
    }

    /// Invocation statistics when cost tracking is enabled.
    fn stats(&self) -> Option<ExprStats> {
        None
    }
}

/// Owned executable expression.
pub type ExprPtr = Box<dyn Expr>;
