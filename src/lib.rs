//! colexec - columnar execution core
//!
//! Pull-based operators over Arrow-backed row batches, an expression compiler
//! with pluggable special forms, and the row-expansion operator.

pub mod config;
pub mod error;
pub mod executor;
pub mod expr;
pub mod memory;
pub mod plan;
pub mod special_form;
pub mod types;
pub mod vector;

pub use config::QueryConfig;
pub use error::{ExecError, Result};
pub use executor::{
    Driver, ExpandOperator, FilterOperator, Operator, OperatorState, ProjectOperator, PullState,
    ValuesOperator,
};
pub use expr::{Expr, ExprCompiler, ExprPtr, FunctionCatalog, FunctionRegistry, TypedExpr};
pub use memory::{MemoryPool, Reservation};
pub use plan::ExpandNode;
pub use special_form::{
    initialize_special_forms, is_special_form_registered, SpecialForm, SpecialFormRegistry,
    SpecialFormRegistryBuilder,
};
pub use types::{DataType, Value};
pub use vector::{force, make_constant, make_null_constant, RowBatch, Vector, VectorRef};
