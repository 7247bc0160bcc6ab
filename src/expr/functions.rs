//! Ordinary scalar functions.
//!
//! The full function catalog lives outside this crate; [`FunctionCatalog`] is
//! the seam the compiler calls through. [`FunctionRegistry`] is a small
//! in-memory catalog with a handful of built-ins.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use arrow::array::{ArrayRef, AsArray};
use arrow::compute::kernels::cmp::{eq, gt, lt};
use arrow::compute::kernels::numeric::{add, mul, sub};
use arrow::compute::{is_null, not};

use crate::error::{ExecError, Result};
use crate::types::DataType;

/// Runtime scalar function contract.
pub trait ScalarFunction: Send + Sync {
    /// Function name as it appears in calls.
    fn name(&self) -> &str;

    /// Return type inference from argument types.
    ///
    /// # Errors
    ///
    /// Returns `TypeResolution` if the argument types are not accepted.
    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType>;

    /// Batch-wise invocation over flat Arrow arrays.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying kernel fails.
    fn invoke(&self, args: &[ArrayRef]) -> Result<ArrayRef>;
}

/// Lookup of ordinary functions by name.
pub trait FunctionCatalog: Send + Sync {
    /// Returns the function registered under `name`.
    fn get(&self, name: &str) -> Option<Arc<dyn ScalarFunction>>;
}

/// In-memory function catalog.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn ScalarFunction>>,
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}

impl FunctionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in functions.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for op in [Arithmetic::Plus, Arithmetic::Minus, Arithmetic::Multiply] {
            registry.register(Arc::new(op));
        }
        for op in [Comparison::Eq, Comparison::Lt, Comparison::Gt] {
            registry.register(Arc::new(op));
        }
        registry.register(Arc::new(Not));
        registry.register(Arc::new(IsNull));
        registry
    }

    /// Registers or replaces a function.
    ///
    /// Returns `true` when an existing function with the same name was replaced.
    pub fn register(&mut self, function: Arc<dyn ScalarFunction>) -> bool {
        self.functions
            .insert(function.name().to_string(), function)
            .is_some()
    }

    /// Registered names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names = self.functions.keys().cloned().collect::<Vec<_>>();
        names.sort();
        names
    }
}

impl FunctionCatalog for FunctionRegistry {
    fn get(&self, name: &str) -> Option<Arc<dyn ScalarFunction>> {
        self.functions.get(name).cloned()
    }
}

fn expect_arity(name: &str, arg_types: &[DataType], arity: usize) -> Result<()> {
    if arg_types.len() != arity {
        return Err(ExecError::type_resolution(
            name,
            format!("expected {arity} arguments, got {}", arg_types.len()),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy)]
enum Arithmetic {
    Plus,
    Minus,
    Multiply,
}

impl ScalarFunction for Arithmetic {
    fn name(&self) -> &str {
        match self {
            Arithmetic::Plus => "plus",
            Arithmetic::Minus => "minus",
            Arithmetic::Multiply => "multiply",
        }
    }

    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType> {
        expect_arity(self.name(), arg_types, 2)?;
        match (arg_types[0], arg_types[1]) {
            (l, r) if l == r && matches!(l, DataType::Int64 | DataType::Float32 | DataType::Float64) => {
                Ok(l)
            }
            (l, r) => Err(ExecError::type_resolution(
                self.name(),
                format!("unsupported arithmetic between {l} and {r}"),
            )),
        }
    }

    fn invoke(&self, args: &[ArrayRef]) -> Result<ArrayRef> {
        let (left, right) = (&args[0], &args[1]);
        let result = match self {
            Arithmetic::Plus => add(left, right)?,
            Arithmetic::Minus => sub(left, right)?,
            Arithmetic::Multiply => mul(left, right)?,
        };
        Ok(result)
    }
}

#[derive(Debug, Clone, Copy)]
enum Comparison {
    Eq,
    Lt,
    Gt,
}

impl ScalarFunction for Comparison {
    fn name(&self) -> &str {
        match self {
            Comparison::Eq => "eq",
            Comparison::Lt => "lt",
            Comparison::Gt => "gt",
        }
    }

    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType> {
        expect_arity(self.name(), arg_types, 2)?;
        if arg_types[0] != arg_types[1] {
            return Err(ExecError::type_resolution(
                self.name(),
                format!("cannot compare {} with {}", arg_types[0], arg_types[1]),
            ));
        }
        Ok(DataType::Bool)
    }

    fn invoke(&self, args: &[ArrayRef]) -> Result<ArrayRef> {
        let (left, right) = (&args[0], &args[1]);
        let result = match self {
            Comparison::Eq => eq(left, right)?,
            Comparison::Lt => lt(left, right)?,
            Comparison::Gt => gt(left, right)?,
        };
        Ok(Arc::new(result))
    }
}

#[derive(Debug, Clone, Copy)]
struct Not;

impl ScalarFunction for Not {
    fn name(&self) -> &str {
        "not"
    }

    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType> {
        expect_arity(self.name(), arg_types, 1)?;
        if arg_types[0] != DataType::Bool {
            return Err(ExecError::type_resolution(
                self.name(),
                format!("expected BOOL, got {}", arg_types[0]),
            ));
        }
        Ok(DataType::Bool)
    }

    fn invoke(&self, args: &[ArrayRef]) -> Result<ArrayRef> {
        let input = args[0].as_boolean_opt().ok_or_else(|| {
            ExecError::ExecutionError("NOT operand must be boolean".to_string())
        })?;
        Ok(Arc::new(not(input)?))
    }
}

#[derive(Debug, Clone, Copy)]
struct IsNull;

impl ScalarFunction for IsNull {
    fn name(&self) -> &str {
        "is_null"
    }

    fn return_type(&self, arg_types: &[DataType]) -> Result<DataType> {
        expect_arity(self.name(), arg_types, 1)?;
        Ok(DataType::Bool)
    }

    fn invoke(&self, args: &[ArrayRef]) -> Result<ArrayRef> {
        Ok(Arc::new(is_null(args[0].as_ref())?))
    }
}
